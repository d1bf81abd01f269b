//! A GraphQL surface for the query engine.
//!
//! The [input types](input) mirror the core query language one to one, so a single set of
//! GraphQL types serves every entity in the [`Catalog`](crate::schema::Catalog). Requests are
//! converted into a [`Query`](crate::query::Query) and go through the normal validation path, so a
//! malformed request is reported as a GraphQL error naming the offending entity and field.
//!
//! [`QueryRoot`] is a ready-made query object with `entities`, `findMany` and `aggregate`
//! resolvers. It expects a [`Backend`] in the schema data, and, for operations which require
//! roles, a [`Principal`](crate::auth::Principal) in the request data.

pub mod catalog;
pub mod guard;
pub mod input;
pub mod root;

pub use catalog::{EntityInfo, FieldInfo, RelationInfo};
pub use guard::RoleGuard;
pub use input::{
    AggregateInput, FieldFilterInput, FilterInput, QueryArgs, RelationFieldInput,
    RelationFilterInput, ScalarInput, SortInput, SortKeyInput,
};
pub use root::{Backend, QueryRoot};

// Re-export commonly used `async_graphql` types.
pub use async_graphql::{
    value, Context, EmptyMutation, EmptySubscription, Guard, Json, Object, Request, Result,
    Schema,
};

// Re-export `async_graphql` directly as an escape hatch.
pub extern crate async_graphql;

/// The schema served by [`QueryRoot`].
pub type QuerySchema = Schema<QueryRoot, EmptyMutation, EmptySubscription>;
