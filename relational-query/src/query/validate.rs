//! Checking filters against the catalog.
//!
//! Validation turns a [`FilterExpression`], which names fields and relations with strings and
//! carries untyped operands, into a [`BoundFilter`], in which every relation has been resolved,
//! every operand has been coerced to the type of its field, and every quantifier has been decided.
//! Evaluating a bound filter cannot fail.

use super::filter::{FilterExpression, Operand, Operator, Predicate, QueryMode, Quantifier};
use crate::error::{Error, Mismatch};
use crate::schema::{Catalog, EntityCatalog, FieldType, Relation};
use crate::value::Value;
use crate::Config;

/// A filter which has been checked against the catalog.
#[derive(Clone, Debug)]
pub(crate) enum BoundFilter {
    And(Vec<BoundFilter>),
    Or(Vec<BoundFilter>),
    Not(Box<BoundFilter>),
    Predicate(BoundPredicate),
    Relation {
        relation: Relation,
        quantifier: Quantifier,
        filter: Box<BoundFilter>,
    },
}

impl BoundFilter {
    /// Every relation traversed by this filter, in order of first appearance.
    pub(crate) fn relations(&self) -> Vec<&Relation> {
        let mut relations = vec![];
        self.collect_relations(&mut relations);
        relations
    }

    fn collect_relations<'a>(&'a self, relations: &mut Vec<&'a Relation>) {
        match self {
            Self::And(filters) | Self::Or(filters) => {
                for filter in filters {
                    filter.collect_relations(relations);
                }
            }
            Self::Not(filter) => filter.collect_relations(relations),
            Self::Predicate(_) => {}
            Self::Relation {
                relation, filter, ..
            } => {
                relations.push(relation);
                filter.collect_relations(relations);
            }
        }
    }
}

/// A predicate whose operand has the type of its field.
///
/// In [insensitive](QueryMode::Insensitive) mode, text operands are stored in lower case.
#[derive(Clone, Debug)]
pub(crate) struct BoundPredicate {
    pub(crate) field: String,
    pub(crate) op: Operator,
    pub(crate) operand: Operand,
    pub(crate) insensitive: bool,
}

/// Check `filter` against the catalog entry of the entity it applies to.
pub(crate) fn bind(
    catalog: &Catalog,
    entity: &EntityCatalog,
    filter: &FilterExpression,
    config: &Config,
) -> Result<BoundFilter, Error> {
    if filter.depth() > config.max_depth() {
        return Err(entity.mismatch(Mismatch::TooDeep {
            max: config.max_depth(),
        }));
    }
    Binder { catalog, config }.bind(entity, filter)
}

struct Binder<'a> {
    catalog: &'a Catalog,
    config: &'a Config,
}

impl<'a> Binder<'a> {
    fn bind(&self, entity: &EntityCatalog, filter: &FilterExpression) -> Result<BoundFilter, Error> {
        Ok(match filter {
            FilterExpression::And(filters) => BoundFilter::And(self.bind_all(entity, filters)?),
            FilterExpression::Or(filters) => BoundFilter::Or(self.bind_all(entity, filters)?),
            FilterExpression::Not(filter) => BoundFilter::Not(Box::new(self.bind(entity, filter)?)),
            FilterExpression::Predicate(pred) => {
                BoundFilter::Predicate(bind_predicate(entity, pred)?)
            }
            FilterExpression::Relation(rel) => {
                let relation = entity.require_relation(rel.relation())?;
                let target = self.catalog.require(relation.target())?;
                let quantifier = rel
                    .quantifier()
                    .unwrap_or_else(|| self.config.default_quantifier(relation.cardinality()));
                BoundFilter::Relation {
                    relation: relation.clone(),
                    quantifier,
                    filter: Box::new(self.bind(target, rel.filter())?),
                }
            }
        })
    }

    fn bind_all(
        &self,
        entity: &EntityCatalog,
        filters: &[FilterExpression],
    ) -> Result<Vec<BoundFilter>, Error> {
        filters
            .iter()
            .map(|filter| self.bind(entity, filter))
            .collect()
    }
}

fn bind_predicate(entity: &EntityCatalog, pred: &Predicate) -> Result<BoundPredicate, Error> {
    let field = entity.require_field(pred.field())?;
    let op = pred.op();
    let operand_type = |expected: String, given: String| {
        entity.mismatch(Mismatch::OperandType {
            field: field.name().into(),
            op,
            expected,
            given,
        })
    };

    if op.arity() != pred.operand().arity() {
        return Err(operand_type(
            op.arity().to_string(),
            pred.operand().arity().to_string(),
        ));
    }
    if op.is_ordering() && !field.ty().is_orderable() {
        return Err(operand_type(
            "an orderable field".into(),
            format!("a {} field", field.ty()),
        ));
    }
    if op.is_text() && field.ty() != FieldType::String {
        return Err(operand_type(
            "a string field".into(),
            format!("a {} field", field.ty()),
        ));
    }
    let insensitive = pred.mode() == QueryMode::Insensitive;
    if insensitive && !field.ty().is_text() {
        return Err(operand_type(
            "a string or enum field for case-insensitive comparison".into(),
            format!("a {} field", field.ty()),
        ));
    }

    let coerce = |value: &Value| -> Result<Value, Error> {
        if value.is_null() {
            return Err(entity.mismatch(Mismatch::NullOperand {
                field: field.name().into(),
                op,
            }));
        }
        let coerced = value.clone().coerce(field.ty()).ok_or_else(|| {
            operand_type(
                field.ty().to_string(),
                value.ty().map(|ty| ty.to_string()).unwrap_or_default(),
            )
        })?;
        Ok(if insensitive { lowercase(coerced) } else { coerced })
    };

    let operand = match pred.operand() {
        Operand::None => {
            if !field.is_nullable() {
                return Err(entity.mismatch(Mismatch::NotNullable(field.name().into())));
            }
            Operand::None
        }
        Operand::Value(value) => Operand::Value(coerce(value)?),
        Operand::List(values) => {
            Operand::List(values.iter().map(&coerce).collect::<Result<_, _>>()?)
        }
    };

    Ok(BoundPredicate {
        field: field.name().into(),
        op,
        operand,
        insensitive,
    })
}

fn lowercase(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_lowercase()),
        Value::Enum(s) => Value::Enum(s.to_lowercase()),
        value => value,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::query::filter::{field, relation};
    use crate::schema::EntityField;

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
                    .with_field(EntityField::new("score", FieldType::Float).nullable())
                    .with_field(EntityField::new("published", FieldType::Boolean))
                    .with_field(EntityField::new("status", FieldType::Enum))
                    .with_field(EntityField::new("createdAt", FieldType::DateTime))
                    .with_field(EntityField::new("authorId", FieldType::Int))
                    .with_relation(Relation::to_one("author", "User", "authorId", "id")),
            )
            .build()
            .unwrap()
    }

    fn bind_post(filter: FilterExpression) -> Result<BoundFilter, Error> {
        let catalog = catalog();
        let post = catalog.entity("Post").unwrap().clone();
        bind(&catalog, &post, &filter, &Config::default())
    }

    fn mismatch(filter: FilterExpression) -> Mismatch {
        match bind_post(filter) {
            Err(Error::SchemaMismatch { reason, .. }) => reason,
            res => panic!("expected schema mismatch, got {res:?}"),
        }
    }

    #[test]
    fn test_unknown_names() {
        assert_eq!(
            mismatch(field("unknownField").equals(1)),
            Mismatch::UnknownField("unknownField".into())
        );
        assert_eq!(
            mismatch(relation("comments").some(FilterExpression::always())),
            Mismatch::UnknownRelation("comments".into())
        );
        // Names inside a relation filter resolve against the target entity.
        assert_eq!(
            mismatch(relation("author").some(field("title").equals("x"))),
            Mismatch::UnknownField("title".into())
        );
        bind_post(relation("author").some(field("name").equals("x"))).unwrap();
    }

    #[test]
    fn test_operand_types() {
        assert!(matches!(
            mismatch(field("id").equals("one")),
            Mismatch::OperandType { .. }
        ));
        assert!(matches!(
            mismatch(field("id").contains("1")),
            Mismatch::OperandType { .. }
        ));
        assert!(matches!(
            mismatch(field("published").gt(false)),
            Mismatch::OperandType { .. }
        ));
        assert!(matches!(
            mismatch(field("id").one_of([Value::Int(1), Value::from("2")])),
            Mismatch::OperandType { .. }
        ));
        assert!(matches!(
            mismatch(field("id").insensitive().equals(1)),
            Mismatch::OperandType { .. }
        ));
        assert!(matches!(
            mismatch(
                Predicate::new("id", Operator::In, Operand::Value(Value::Int(1))).into()
            ),
            Mismatch::OperandType { .. }
        ));
    }

    #[test]
    fn test_nulls() {
        assert_eq!(
            mismatch(field("score").equals(Value::Null)),
            Mismatch::NullOperand {
                field: "score".into(),
                op: Operator::Equals
            }
        );
        assert_eq!(
            mismatch(field("title").is_null()),
            Mismatch::NotNullable("title".into())
        );
        bind_post(field("score").is_null()).unwrap();
    }

    #[test]
    fn test_coercion() {
        let BoundFilter::Predicate(pred) = bind_post(field("score").gte(3)).unwrap() else {
            panic!("expected predicate");
        };
        assert_eq!(pred.operand, Operand::Value(Value::Float(3.0)));

        let BoundFilter::Predicate(pred) =
            bind_post(field("status").insensitive().one_of(["Draft"])).unwrap()
        else {
            panic!("expected predicate");
        };
        assert_eq!(pred.operand, Operand::List(vec![Value::Enum("draft".into())]));

        bind_post(field("createdAt").lt("2023-01-01T00:00:00Z")).unwrap();
        assert!(matches!(
            mismatch(field("createdAt").lt("January")),
            Mismatch::OperandType { .. }
        ));
    }

    #[test]
    fn test_default_quantifier() {
        let catalog = catalog();
        let user = catalog.entity("User").unwrap();
        let filter = relation("posts").matches(field("id").equals(1));

        let config = Config::default();
        let BoundFilter::Relation { quantifier, .. } =
            bind(&catalog, user, &filter, &config).unwrap()
        else {
            panic!("expected relation");
        };
        assert_eq!(quantifier, Quantifier::Some);

        let config = Config::default().with_to_many_quantifier(Quantifier::Every);
        let BoundFilter::Relation { quantifier, .. } =
            bind(&catalog, user, &filter, &config).unwrap()
        else {
            panic!("expected relation");
        };
        assert_eq!(quantifier, Quantifier::Every);
    }

    #[test]
    fn test_depth() {
        let mut filter = field("id").equals(1);
        for _ in 0..3 {
            filter = !filter;
        }
        let catalog = catalog();
        let post = catalog.entity("Post").unwrap();
        bind(&catalog, post, &filter, &Config::default().with_max_depth(4)).unwrap();
        let err = bind(&catalog, post, &filter, &Config::default().with_max_depth(3)).unwrap_err();
        assert!(
            matches!(&err, Error::SchemaMismatch { reason: Mismatch::TooDeep { max: 3 }, .. }),
            "{err}"
        );

        // Relation filters count toward the limit like combinators.
        let filter = relation("author").some(
            relation("posts").every(field("id").equals(1) | field("title").contains("a")),
        );
        let depth = filter.depth();
        bind(&catalog, post, &filter, &Config::default().with_max_depth(depth)).unwrap();
        let err = bind(&catalog, post, &filter, &Config::default().with_max_depth(depth - 1))
            .unwrap_err();
        assert!(
            matches!(&err, Error::SchemaMismatch { reason: Mismatch::TooDeep { .. }, .. }),
            "{err}"
        );
    }
}
