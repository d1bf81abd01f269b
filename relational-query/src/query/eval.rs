//! Evaluating bound filters against rows.

use super::filter::{Operand, Operator, Quantifier};
use super::validate::{BoundFilter, BoundPredicate};
use crate::schema::{EntityCatalog, Relation};
use crate::value::{Record, Value};
use std::borrow::Cow;
use std::collections::HashMap;

/// Access to the rows related to a row.
pub trait RowGraph {
    /// The rows related to `row` through `relation`.
    fn related<'a>(&'a self, relation: &Relation, row: &Record) -> Vec<&'a Record>;
}

/// The rows of every entity needed to evaluate a query.
///
/// Rows are normalized to their entity's catalog when they are inserted. Lookups through a
/// relation use an index on the relation's target key once [`index`](Self::index) has been
/// called for it, and a scan of the target rows otherwise.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    rows: HashMap<String, Vec<Record>>,
    indexes: HashMap<(String, String), HashMap<Value, Vec<usize>>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rows of `entity`.
    pub fn insert(&mut self, entity: &EntityCatalog, rows: impl IntoIterator<Item = Record>) {
        let table = self.rows.entry(entity.name().into()).or_default();
        table.extend(rows.into_iter().map(|row| entity.conform(row)));
        // Any index over this table is now stale.
        self.indexes.retain(|(target, _), _| target != entity.name());
    }

    /// The rows of `entity`, in the order they were inserted.
    pub fn rows(&self, entity: &str) -> &[Record] {
        self.rows.get(entity).map(Vec::as_slice).unwrap_or_default()
    }

    /// Index the target rows of `relation` by its target key.
    pub fn index(&mut self, relation: &Relation) {
        let key = (relation.target().to_string(), relation.target_key().to_string());
        if self.indexes.contains_key(&key) {
            return;
        }
        let mut index: HashMap<Value, Vec<usize>> = HashMap::new();
        for (i, row) in self.rows(relation.target()).iter().enumerate() {
            let value = row.get(relation.target_key());
            if !value.is_null() {
                index.entry(value.clone()).or_default().push(i);
            }
        }
        self.indexes.insert(key, index);
    }
}

impl RowGraph for Dataset {
    fn related<'a>(&'a self, relation: &Relation, row: &Record) -> Vec<&'a Record> {
        let key = row.get(relation.local_key());
        // Null keys relate to nothing.
        if key.is_null() {
            return vec![];
        }
        let targets = self.rows(relation.target());
        let index = self
            .indexes
            .get(&(relation.target().to_string(), relation.target_key().to_string()));
        match index {
            Some(index) => index
                .get(key)
                .map(|rows| rows.iter().map(|&i| &targets[i]).collect())
                .unwrap_or_default(),
            None => targets
                .iter()
                .filter(|target| target.get(relation.target_key()) == key)
                .collect(),
        }
    }
}

/// Does `row` satisfy `filter`?
pub(crate) fn matches<G: RowGraph + ?Sized>(filter: &BoundFilter, row: &Record, graph: &G) -> bool {
    match filter {
        BoundFilter::And(filters) => filters.iter().all(|f| matches(f, row, graph)),
        BoundFilter::Or(filters) => filters.iter().any(|f| matches(f, row, graph)),
        BoundFilter::Not(filter) => !matches(filter, row, graph),
        BoundFilter::Predicate(pred) => pred.test(row.get(&pred.field)),
        BoundFilter::Relation {
            relation,
            quantifier,
            filter,
        } => {
            let mut related = graph.related(relation, row).into_iter();
            match quantifier {
                Quantifier::Some => related.any(|r| matches(filter, r, graph)),
                Quantifier::Every => related.all(|r| matches(filter, r, graph)),
                Quantifier::None => !related.any(|r| matches(filter, r, graph)),
            }
        }
    }
}

impl BoundPredicate {
    /// Does the field value `value` satisfy this predicate?
    ///
    /// Null satisfies only `IS NULL`. Every comparison with a null field value is false, including
    /// `!=` and `NOT IN`.
    pub(crate) fn test(&self, value: &Value) -> bool {
        match self.op {
            Operator::IsNull => return value.is_null(),
            Operator::IsNotNull => return !value.is_null(),
            _ if value.is_null() => return false,
            _ => {}
        }

        let value = self.fold(value);
        match (&self.op, &self.operand) {
            (Operator::Equals, Operand::Value(operand)) => *value == *operand,
            (Operator::NotEquals, Operand::Value(operand)) => *value != *operand,
            (Operator::In, Operand::List(operands)) => operands.contains(&*value),
            (Operator::NotIn, Operand::List(operands)) => !operands.contains(&*value),
            (Operator::Lt, Operand::Value(operand)) => *value < *operand,
            (Operator::Lte, Operand::Value(operand)) => *value <= *operand,
            (Operator::Gt, Operand::Value(operand)) => *value > *operand,
            (Operator::Gte, Operand::Value(operand)) => *value >= *operand,
            (Operator::Contains, Operand::Value(operand)) => {
                text(&value, operand, |value, operand| value.contains(operand))
            }
            (Operator::StartsWith, Operand::Value(operand)) => {
                text(&value, operand, |value, operand| value.starts_with(operand))
            }
            (Operator::EndsWith, Operand::Value(operand)) => {
                text(&value, operand, |value, operand| value.ends_with(operand))
            }
            // Validation pairs every operator with an operand of the right shape.
            _ => false,
        }
    }

    /// Lower-case text values for case-insensitive comparison.
    fn fold<'a>(&self, value: &'a Value) -> Cow<'a, Value> {
        match value {
            Value::String(s) if self.insensitive => Cow::Owned(Value::String(s.to_lowercase())),
            Value::Enum(s) if self.insensitive => Cow::Owned(Value::Enum(s.to_lowercase())),
            value => Cow::Borrowed(value),
        }
    }
}

fn text(value: &Value, operand: &Value, f: impl FnOnce(&str, &str) -> bool) -> bool {
    match (value.as_str(), operand.as_str()) {
        (Some(value), Some(operand)) => f(value, operand),
        _ => false,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::query::filter::{field, relation, FilterExpression};
    use crate::query::validate::bind;
    use crate::record;
    use crate::schema::{Catalog, EntityField, FieldType};
    use crate::Config;

    fn catalog() -> Catalog {
        Catalog::builder()
            .entity(
                EntityCatalog::new("User")
                    .with_field(EntityField::new("id", FieldType::Int))
                    .with_field(EntityField::new("name", FieldType::String))
                    .with_relation(Relation::to_many("posts", "Post", "id", "authorId")),
            )
            .entity(
                EntityCatalog::new("Post")
                    .with_field(EntityField::new("id", FieldType::Int))
                    .with_field(EntityField::new("title", FieldType::String))
                    .with_field(EntityField::new("upvoteCount", FieldType::Int).nullable())
                    .with_field(EntityField::new("status", FieldType::Enum))
                    .with_field(EntityField::new("authorId", FieldType::Int).nullable())
                    .with_relation(Relation::to_one("author", "User", "authorId", "id")),
            )
            .build()
            .unwrap()
    }

    fn dataset(catalog: &Catalog, indexed: bool) -> Dataset {
        let mut data = Dataset::new();
        data.insert(
            catalog.entity("User").unwrap(),
            [
                record! { "id" => 1, "name" => "alice" },
                record! { "id" => 2, "name" => "bob" },
                record! { "id" => 3, "name" => "carol" },
            ],
        );
        data.insert(
            catalog.entity("Post").unwrap(),
            [
                record! {
                    "id" => 1, "title" => "Rust in Action", "upvoteCount" => 10,
                    "status" => "PUBLISHED", "authorId" => 1,
                },
                record! {
                    "id" => 2, "title" => "Async Rust", "upvoteCount" => 5,
                    "status" => "DRAFT", "authorId" => 1,
                },
                record! {
                    "id" => 3, "title" => "Gardening", "upvoteCount" => Value::Null,
                    "status" => "PUBLISHED", "authorId" => 2,
                },
                record! {
                    "id" => 4, "title" => "Orphan", "upvoteCount" => 1,
                    "status" => "DRAFT", "authorId" => Value::Null,
                },
            ],
        );
        if indexed {
            for entity in catalog.entities() {
                for relation in entity.relations() {
                    data.index(relation);
                }
            }
        }
        data
    }

    fn ids(catalog: &Catalog, data: &Dataset, entity: &str, filter: FilterExpression) -> Vec<i64> {
        let filter = bind(
            catalog,
            catalog.entity(entity).unwrap(),
            &filter,
            &Config::default(),
        )
        .unwrap();
        data.rows(entity)
            .iter()
            .filter(|row| matches(&filter, row, data))
            .map(|row| match row.get("id") {
                Value::Int(id) => *id,
                id => panic!("bad id {id}"),
            })
            .collect()
    }

    #[test]
    fn test_predicates() {
        let catalog = catalog();
        let data = dataset(&catalog, false);
        let posts = |filter| ids(&catalog, &data, "Post", filter);

        assert_eq!(posts(field("upvoteCount").equals(10)), [1]);
        // Comparisons never match null fields.
        assert_eq!(posts(field("upvoteCount").not_equals(10)), [2, 4]);
        assert_eq!(posts(field("upvoteCount").none_of([10])), [2, 4]);
        assert_eq!(posts(field("upvoteCount").one_of([1, 5])), [2, 4]);
        assert_eq!(posts(field("upvoteCount").one_of(Vec::<i64>::new())), Vec::<i64>::new());
        assert_eq!(posts(field("upvoteCount").lt(5)), [4]);
        assert_eq!(posts(field("upvoteCount").lte(5)), [2, 4]);
        assert_eq!(posts(field("upvoteCount").gt(5)), [1]);
        assert_eq!(posts(field("upvoteCount").gte(5)), [1, 2]);
        assert_eq!(posts(field("upvoteCount").is_null()), [3]);
        assert_eq!(posts(field("upvoteCount").is_not_null()), [1, 2, 4]);
        assert_eq!(posts(field("title").contains("Rust")), [1, 2]);
        assert_eq!(posts(field("title").contains("rust")), Vec::<i64>::new());
        assert_eq!(posts(field("title").insensitive().contains("rust")), [1, 2]);
        assert_eq!(posts(field("title").starts_with("Rust")), [1]);
        assert_eq!(posts(field("title").insensitive().ends_with("RUST")), [2]);
        assert_eq!(posts(field("status").equals("DRAFT")), [2, 4]);
        assert_eq!(posts(field("status").insensitive().equals("draft")), [2, 4]);
        assert_eq!(posts(field("status").gt("DRAFT")), [1, 3]);
    }

    #[test]
    fn test_combinators() {
        let catalog = catalog();
        let data = dataset(&catalog, false);
        let posts = |filter| ids(&catalog, &data, "Post", filter);

        assert_eq!(posts(FilterExpression::always()), [1, 2, 3, 4]);
        assert_eq!(posts(FilterExpression::never()), Vec::<i64>::new());
        assert_eq!(
            posts(field("status").equals("DRAFT") & field("upvoteCount").gt(1)),
            [2]
        );
        assert_eq!(
            posts(field("id").equals(1) | field("upvoteCount").is_null()),
            [1, 3]
        );
        // NOT complements the whole row set, including rows with null fields.
        assert_eq!(posts(!field("upvoteCount").gt(4)), [3, 4]);
    }

    fn test_relations(indexed: bool) {
        let catalog = catalog();
        let data = dataset(&catalog, indexed);
        let posts = |filter| ids(&catalog, &data, "Post", filter);
        let users = |filter| ids(&catalog, &data, "User", filter);

        // To-many.
        let drafts = || field("status").equals("DRAFT");
        assert_eq!(users(relation("posts").some(drafts())), [1]);
        assert_eq!(users(relation("posts").every(drafts())), [3]);
        assert_eq!(users(relation("posts").none(drafts())), [2, 3]);
        assert_eq!(users(relation("posts").matches(drafts())), [1]);
        let popular = || field("upvoteCount").gte(5);
        assert_eq!(users(relation("posts").every(popular())), [1, 3]);

        // To-one. A row with no related row has an empty relation.
        let alice = || field("name").equals("alice");
        assert_eq!(posts(relation("author").some(alice())), [1, 2]);
        assert_eq!(posts(relation("author").every(alice())), [1, 2, 4]);
        assert_eq!(posts(relation("author").none(alice())), [3, 4]);

        // Nested traversal.
        assert_eq!(
            posts(relation("author").some(relation("posts").some(drafts()))),
            [1, 2]
        );
    }

    #[test]
    fn test_relations_scan() {
        test_relations(false);
    }

    #[test]
    fn test_relations_indexed() {
        test_relations(true);
    }

    #[test]
    fn test_insert_invalidates_index() {
        let catalog = catalog();
        let mut data = dataset(&catalog, true);
        data.insert(
            catalog.entity("Post").unwrap(),
            [record! { "id" => 5, "title" => "New", "status" => "DRAFT", "authorId" => 3 }],
        );
        let user = data.rows("User")[2].clone();
        let relation = catalog.entity("User").unwrap().relation("posts").unwrap();
        assert_eq!(data.related(relation, &user).len(), 1);
    }
}
