//! GraphQL input types for the query language.
//!
//! The shapes follow the familiar `where`/`orderBy` conventions of relational GraphQL APIs:
//!
//! ```graphql
//! {
//!   findMany(entity: "Post", args: {
//!     where: {
//!       and: [
//!         { field: { field: "title", op: CONTAINS, value: { string: "rust" }, mode: INSENSITIVE } }
//!         { relation: { relation: "comments", quantifier: NONE, where: [
//!           { field: { field: "flagged", op: EQUALS, value: { boolean: true } } }
//!         ] } }
//!       ]
//!     }
//!     orderBy: [{ key: { field: "upvoteCount" }, direction: DESC }]
//!     take: 10
//!   })
//! }
//! ```

use super::async_graphql as gql;
use crate::query::{
    AggregateSpec, Direction, FilterExpression, NullsOrder, Operand, Operator, Predicate, Query,
    QueryMode, Quantifier, RelationFilter, SortEntry, SortKey, SortSpec,
};
use crate::value::Value;
use chrono::{DateTime, Utc};

/// A literal operand.
#[derive(Clone, Debug, PartialEq, gql::OneofObject)]
pub enum ScalarInput {
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    /// The name of an enum variant.
    Enum(String),
}

impl From<ScalarInput> for Value {
    fn from(input: ScalarInput) -> Self {
        match input {
            ScalarInput::Int(i) => Self::Int(i),
            ScalarInput::Float(f) => Self::from(f),
            ScalarInput::String(s) => Self::String(s),
            ScalarInput::Boolean(b) => Self::Boolean(b),
            ScalarInput::DateTime(t) => Self::DateTime(t),
            ScalarInput::Enum(s) => Self::Enum(s),
        }
    }
}

/// A comparison on a field.
#[derive(Clone, Debug, PartialEq, gql::InputObject)]
pub struct FieldFilterInput {
    pub field: String,
    pub op: Operator,
    /// The operand of a single-value comparison.
    pub value: Option<ScalarInput>,
    /// The operands of `IN` and `NOT_IN`.
    pub values: Option<Vec<ScalarInput>>,
    #[graphql(default)]
    pub mode: QueryMode,
}

impl TryFrom<FieldFilterInput> for Predicate {
    type Error = gql::Error;

    fn try_from(input: FieldFilterInput) -> gql::Result<Self> {
        let operand = match (input.value, input.values) {
            (None, None) => Operand::None,
            (Some(value), None) => Operand::Value(value.into()),
            (None, Some(values)) => Operand::List(values.into_iter().map(Value::from).collect()),
            (Some(_), Some(_)) => {
                return Err(gql::Error::new(format!(
                    "filter on {} has both `value` and `values`",
                    input.field
                )))
            }
        };
        Ok(Predicate::new(input.field, input.op, operand).with_mode(input.mode))
    }
}

/// A filter on the rows related through a relation.
#[derive(Clone, Debug, PartialEq, gql::InputObject)]
pub struct RelationFilterInput {
    pub relation: String,
    /// Defaults to the configured quantifier for the relation's cardinality.
    pub quantifier: Option<Quantifier>,
    /// Conditions on related rows, all of which must hold.
    #[graphql(name = "where", default)]
    pub filter: Vec<FilterInput>,
}

/// A boolean filter expression.
#[derive(Clone, Debug, PartialEq, gql::OneofObject)]
pub enum FilterInput {
    /// All of the filters hold.
    And(Vec<FilterInput>),
    /// Any of the filters holds.
    Or(Vec<FilterInput>),
    /// Not all of the filters hold.
    Not(Vec<FilterInput>),
    Field(FieldFilterInput),
    Relation(RelationFilterInput),
}

impl TryFrom<FilterInput> for FilterExpression {
    type Error = gql::Error;

    fn try_from(input: FilterInput) -> gql::Result<Self> {
        Ok(match input {
            FilterInput::And(filters) => Self::And(convert_all(filters)?),
            FilterInput::Or(filters) => Self::Or(convert_all(filters)?),
            FilterInput::Not(filters) => !Self::And(convert_all(filters)?),
            FilterInput::Field(field) => Predicate::try_from(field)?.into(),
            FilterInput::Relation(rel) => {
                let filter = RelationFilter::new(rel.relation, Self::And(convert_all(rel.filter)?));
                let filter = match rel.quantifier {
                    Some(quantifier) => filter.with_quantifier(quantifier),
                    None => filter,
                };
                filter.into()
            }
        })
    }
}

fn convert_all(filters: Vec<FilterInput>) -> gql::Result<Vec<FilterExpression>> {
    filters.into_iter().map(FilterExpression::try_from).collect()
}

/// What to order by.
#[derive(Clone, Debug, PartialEq, Eq, gql::OneofObject)]
pub enum SortKeyInput {
    /// The value of a field.
    Field(String),
    /// The number of rows related through a relation.
    RelationCount(String),
    /// A field of the row related through a to-one relation.
    RelationField(RelationFieldInput),
}

#[derive(Clone, Debug, PartialEq, Eq, gql::InputObject)]
pub struct RelationFieldInput {
    pub relation: String,
    pub field: String,
}

/// One sort key.
#[derive(Clone, Debug, PartialEq, Eq, gql::InputObject)]
pub struct SortInput {
    pub key: SortKeyInput,
    #[graphql(default)]
    pub direction: Direction,
    /// Defaults to nulls first when ascending and nulls last when descending.
    pub nulls: Option<NullsOrder>,
}

impl From<SortInput> for SortEntry {
    fn from(input: SortInput) -> Self {
        let key = match input.key {
            SortKeyInput::Field(field) => SortKey::Field(field),
            SortKeyInput::RelationCount(relation) => SortKey::RelationCount(relation),
            SortKeyInput::RelationField(RelationFieldInput { relation, field }) => {
                SortKey::RelationField(relation, field)
            }
        };
        let entry = SortEntry::new(key, input.direction);
        match input.nulls {
            Some(nulls) => entry.nulls(nulls),
            None => entry,
        }
    }
}

/// Aggregates to compute over the selected rows.
#[derive(Clone, Debug, Default, PartialEq, Eq, gql::InputObject)]
pub struct AggregateInput {
    #[graphql(default)]
    pub group_by: Vec<String>,
    /// Fields whose non-null values to count, or `_all` to count rows.
    #[graphql(default)]
    pub count: Vec<String>,
    #[graphql(default)]
    pub sum: Vec<String>,
    #[graphql(default)]
    pub avg: Vec<String>,
    #[graphql(default)]
    pub min: Vec<String>,
    #[graphql(default)]
    pub max: Vec<String>,
}

impl From<AggregateInput> for AggregateSpec {
    fn from(input: AggregateInput) -> Self {
        let spec = AggregateSpec::new().group_by(input.group_by);
        let spec = input.count.into_iter().fold(spec, AggregateSpec::count);
        let spec = input.sum.into_iter().fold(spec, AggregateSpec::sum);
        let spec = input.avg.into_iter().fold(spec, AggregateSpec::avg);
        let spec = input.min.into_iter().fold(spec, AggregateSpec::min);
        input.max.into_iter().fold(spec, AggregateSpec::max)
    }
}

/// Which rows to select, and in what order.
#[derive(Clone, Debug, Default, PartialEq, gql::InputObject)]
pub struct QueryArgs {
    #[graphql(name = "where")]
    pub filter: Option<FilterInput>,
    #[graphql(default)]
    pub order_by: Vec<SortInput>,
    pub skip: Option<u32>,
    pub take: Option<u32>,
}

impl QueryArgs {
    /// Build a query on `entity` from these arguments.
    pub fn into_query(self, entity: impl Into<String>) -> gql::Result<Query> {
        let mut query = Query::new(entity)
            .sort(self.order_by.into_iter().map(SortEntry::from).collect::<SortSpec>());
        if let Some(filter) = self.filter {
            query = query.filter(FilterExpression::try_from(filter)?);
        }
        if let Some(skip) = self.skip {
            query = query.skip(skip as usize);
        }
        if let Some(take) = self.take {
            query = query.take(take as usize);
        }
        Ok(query)
    }
}
