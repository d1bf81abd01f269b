//! Common items that you will always want in scope when using the query engine.

pub use crate::{
    graphql::{
        async_graphql::{self, value},
        Backend, EmptyMutation, EmptySubscription, Object, QueryRoot, QuerySchema, RoleGuard,
        Schema,
    },
    query::{
        field, relation, AggregateSpec, Direction, FilterExpression, NullsOrder, Quantifier,
        Query, QueryEvaluator, QueryOutput, SortEntry, SortSpec,
    },
    record,
    schema::{BelongsTo, Catalog, Entity, HasMany},
    source::{MemorySource, RowSource},
    value::{Record, Value},
    Config, Error,
};
