//! The filter language.
//!
//! A [`FilterExpression`] is a boolean tree whose leaves are [`Predicate`]s on the fields of the
//! entity being queried, or [`RelationFilter`]s which apply a nested expression to the rows of a
//! related entity. Expressions are plain values: they refer to fields and relations by name and
//! carry untyped operands. They are checked against the [`Catalog`](crate::schema::Catalog) when a
//! query is [prepared](super::QueryEvaluator::prepare).
//!
//! Expressions are most easily built with [`field`] and [`relation`]:
//!
//! ```
//! use relational_query::query::{field, relation, FilterExpression};
//!
//! // Posts titled "rust..." with no flagged comments, or with more than 10 upvotes.
//! let filter = FilterExpression::or([
//!     FilterExpression::and([
//!         field("title").insensitive().starts_with("rust"),
//!         relation("comments").none(field("flagged").equals(true)),
//!     ]),
//!     field("upvoteCount").gt(10),
//! ]);
//! assert_eq!(filter.depth(), 4);
//! ```

use crate::value::Value;
use async_graphql as gql;
use derive_more::{Display, From};
use std::ops::{BitAnd, BitOr, Not};

/// A comparison between a field and an operand.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, gql::Enum)]
pub enum Operator {
    #[display(fmt = "=")]
    Equals,
    #[display(fmt = "!=")]
    NotEquals,
    #[display(fmt = "IN")]
    In,
    #[display(fmt = "NOT IN")]
    NotIn,
    #[display(fmt = "<")]
    Lt,
    #[display(fmt = "<=")]
    Lte,
    #[display(fmt = ">")]
    Gt,
    #[display(fmt = ">=")]
    Gte,
    #[display(fmt = "CONTAINS")]
    Contains,
    #[display(fmt = "STARTS WITH")]
    StartsWith,
    #[display(fmt = "ENDS WITH")]
    EndsWith,
    #[display(fmt = "IS NULL")]
    IsNull,
    #[display(fmt = "IS NOT NULL")]
    IsNotNull,
}

impl Operator {
    /// The shape of operand this operator takes.
    pub fn arity(self) -> Arity {
        match self {
            Self::IsNull | Self::IsNotNull => Arity::Nullary,
            Self::In | Self::NotIn => Arity::List,
            _ => Arity::Unary,
        }
    }

    /// Does this operator compare by order?
    pub fn is_ordering(self) -> bool {
        matches!(self, Self::Lt | Self::Lte | Self::Gt | Self::Gte)
    }

    /// Does this operator match substrings?
    pub fn is_text(self) -> bool {
        matches!(self, Self::Contains | Self::StartsWith | Self::EndsWith)
    }
}

/// The shape of operand taken by an [`Operator`].
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Arity {
    #[display(fmt = "no operand")]
    Nullary,
    #[display(fmt = "a single value")]
    Unary,
    #[display(fmt = "a list of values")]
    List,
}

/// The right-hand side of a [`Predicate`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Operand {
    #[default]
    None,
    Value(Value),
    List(Vec<Value>),
}

impl Operand {
    pub fn arity(&self) -> Arity {
        match self {
            Self::None => Arity::Nullary,
            Self::Value(_) => Arity::Unary,
            Self::List(_) => Arity::List,
        }
    }
}

/// How strings are compared.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, gql::Enum)]
pub enum QueryMode {
    #[default]
    Default,
    /// Compare strings ignoring case.
    Insensitive,
}

/// A single comparison between one field and an operand.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Predicate {
    field: String,
    op: Operator,
    operand: Operand,
    mode: QueryMode,
}

impl Predicate {
    pub fn new(field: impl Into<String>, op: Operator, operand: Operand) -> Self {
        Self {
            field: field.into(),
            op,
            operand,
            mode: QueryMode::Default,
        }
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn op(&self) -> Operator {
        self.op
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }
}

/// How many related rows must satisfy a [`RelationFilter`].
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, gql::Enum)]
#[cfg_attr(feature = "examples", derive(clap::ValueEnum))]
pub enum Quantifier {
    /// At least one related row matches.
    #[display(fmt = "some")]
    Some,
    /// Every related row matches. True when there are no related rows.
    #[display(fmt = "every")]
    Every,
    /// No related row matches.
    #[display(fmt = "none")]
    None,
}

/// A filter on the rows related to a row through a named relation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RelationFilter {
    relation: String,
    quantifier: Option<Quantifier>,
    filter: Box<FilterExpression>,
}

impl RelationFilter {
    /// Filter on `relation`, using the configured default quantifier for its cardinality.
    pub fn new(relation: impl Into<String>, filter: impl Into<FilterExpression>) -> Self {
        Self {
            relation: relation.into(),
            quantifier: None,
            filter: Box::new(filter.into()),
        }
    }

    pub fn with_quantifier(mut self, quantifier: Quantifier) -> Self {
        self.quantifier = Some(quantifier);
        self
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn quantifier(&self) -> Option<Quantifier> {
        self.quantifier
    }

    pub fn filter(&self) -> &FilterExpression {
        &self.filter
    }
}

/// A boolean combination of predicates.
#[derive(Clone, Debug, PartialEq, Eq, Hash, From)]
pub enum FilterExpression {
    /// True if every child is true. An empty list is true.
    #[from(ignore)]
    And(Vec<FilterExpression>),
    /// True if any child is true. An empty list is false.
    #[from(ignore)]
    Or(Vec<FilterExpression>),
    #[from(ignore)]
    Not(Box<FilterExpression>),
    Predicate(Predicate),
    Relation(RelationFilter),
}

impl FilterExpression {
    pub fn and<I>(exprs: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FilterExpression>,
    {
        Self::And(exprs.into_iter().map(Into::into).collect())
    }

    pub fn or<I>(exprs: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FilterExpression>,
    {
        Self::Or(exprs.into_iter().map(Into::into).collect())
    }

    /// A filter which matches every row.
    pub fn always() -> Self {
        Self::And(vec![])
    }

    /// A filter which matches no rows.
    pub fn never() -> Self {
        Self::Or(vec![])
    }

    /// The number of nested levels in this expression.
    ///
    /// A lone predicate has depth 1. Every combinator, and every relation filter, adds a level.
    pub fn depth(&self) -> usize {
        match self {
            Self::And(exprs) | Self::Or(exprs) => {
                1 + exprs.iter().map(Self::depth).max().unwrap_or(0)
            }
            Self::Not(expr) => 1 + expr.depth(),
            Self::Predicate(_) => 1,
            Self::Relation(rel) => 1 + rel.filter.depth(),
        }
    }
}

impl Not for FilterExpression {
    type Output = Self;

    fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

impl BitAnd for FilterExpression {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self::And(vec![self, rhs])
    }
}

impl BitOr for FilterExpression {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self::Or(vec![self, rhs])
    }
}

/// Start building a predicate on the field `name`.
pub fn field(name: impl Into<String>) -> FieldRef {
    FieldRef {
        name: name.into(),
        mode: QueryMode::Default,
    }
}

/// Start building a filter on the relation `name`.
pub fn relation(name: impl Into<String>) -> RelationRef {
    RelationRef { name: name.into() }
}

/// A field about to be compared. Created by [`field`].
#[derive(Clone, Debug)]
pub struct FieldRef {
    name: String,
    mode: QueryMode,
}

impl FieldRef {
    /// Compare strings ignoring case.
    pub fn insensitive(mut self) -> Self {
        self.mode = QueryMode::Insensitive;
        self
    }

    fn cmp(self, op: Operator, operand: Operand) -> FilterExpression {
        Predicate::new(self.name, op, operand)
            .with_mode(self.mode)
            .into()
    }

    fn cmp_value(self, op: Operator, value: impl Into<Value>) -> FilterExpression {
        self.cmp(op, Operand::Value(value.into()))
    }

    fn cmp_list<I>(self, op: Operator, values: I) -> FilterExpression
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.cmp(op, Operand::List(values.into_iter().map(Into::into).collect()))
    }

    pub fn equals(self, value: impl Into<Value>) -> FilterExpression {
        self.cmp_value(Operator::Equals, value)
    }

    pub fn not_equals(self, value: impl Into<Value>) -> FilterExpression {
        self.cmp_value(Operator::NotEquals, value)
    }

    pub fn one_of<I>(self, values: I) -> FilterExpression
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.cmp_list(Operator::In, values)
    }

    pub fn none_of<I>(self, values: I) -> FilterExpression
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.cmp_list(Operator::NotIn, values)
    }

    pub fn lt(self, value: impl Into<Value>) -> FilterExpression {
        self.cmp_value(Operator::Lt, value)
    }

    pub fn lte(self, value: impl Into<Value>) -> FilterExpression {
        self.cmp_value(Operator::Lte, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> FilterExpression {
        self.cmp_value(Operator::Gt, value)
    }

    pub fn gte(self, value: impl Into<Value>) -> FilterExpression {
        self.cmp_value(Operator::Gte, value)
    }

    pub fn contains(self, text: impl Into<String>) -> FilterExpression {
        self.cmp_value(Operator::Contains, text.into())
    }

    pub fn starts_with(self, text: impl Into<String>) -> FilterExpression {
        self.cmp_value(Operator::StartsWith, text.into())
    }

    pub fn ends_with(self, text: impl Into<String>) -> FilterExpression {
        self.cmp_value(Operator::EndsWith, text.into())
    }

    pub fn is_null(self) -> FilterExpression {
        self.cmp(Operator::IsNull, Operand::None)
    }

    pub fn is_not_null(self) -> FilterExpression {
        self.cmp(Operator::IsNotNull, Operand::None)
    }
}

/// A relation about to be filtered. Created by [`relation`].
#[derive(Clone, Debug)]
pub struct RelationRef {
    name: String,
}

impl RelationRef {
    /// Match rows with at least one related row matching `filter`.
    pub fn some(self, filter: impl Into<FilterExpression>) -> FilterExpression {
        self.quantified(Quantifier::Some, filter)
    }

    /// Match rows all of whose related rows match `filter`.
    pub fn every(self, filter: impl Into<FilterExpression>) -> FilterExpression {
        self.quantified(Quantifier::Every, filter)
    }

    /// Match rows none of whose related rows match `filter`.
    pub fn none(self, filter: impl Into<FilterExpression>) -> FilterExpression {
        self.quantified(Quantifier::None, filter)
    }

    /// Match related rows using the default quantifier for the relation's cardinality.
    pub fn matches(self, filter: impl Into<FilterExpression>) -> FilterExpression {
        RelationFilter::new(self.name, filter).into()
    }

    fn quantified(
        self,
        quantifier: Quantifier,
        filter: impl Into<FilterExpression>,
    ) -> FilterExpression {
        RelationFilter::new(self.name, filter)
            .with_quantifier(quantifier)
            .into()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_builders() {
        assert_eq!(
            field("title").insensitive().contains("Rust"),
            FilterExpression::Predicate(
                Predicate::new(
                    "title",
                    Operator::Contains,
                    Operand::Value(Value::String("Rust".into()))
                )
                .with_mode(QueryMode::Insensitive)
            )
        );
        assert_eq!(
            field("id").one_of([1, 2]),
            FilterExpression::Predicate(Predicate::new(
                "id",
                Operator::In,
                Operand::List(vec![Value::Int(1), Value::Int(2)])
            ))
        );
        assert_eq!(
            relation("comments").every(field("flagged").is_null()),
            FilterExpression::Relation(
                RelationFilter::new("comments", field("flagged").is_null())
                    .with_quantifier(Quantifier::Every)
            )
        );
    }

    #[test]
    fn test_operators() {
        let a = field("a").equals(1);
        let b = field("b").equals(2);
        assert_eq!(
            !(a.clone() & b.clone()) | a.clone(),
            FilterExpression::or([
                FilterExpression::Not(Box::new(FilterExpression::and([a.clone(), b]))),
                a,
            ])
        );
    }

    #[test]
    fn test_depth() {
        assert_eq!(FilterExpression::always().depth(), 1);
        assert_eq!(field("a").is_null().depth(), 1);
        assert_eq!(
            relation("author")
                .matches(!field("name").equals("x"))
                .depth(),
            3
        );
    }
}
