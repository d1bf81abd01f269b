//! Relational Query is a small query engine for relational GraphQL APIs. It evaluates an
//! expressive filter, sort and aggregate language against rows of a set of related entities. It
//! consists of a few layers:
//!
//! * A [schema] layer, which describes the entities in an application's data model. Each entity
//!   has typed fields and [relations](schema::Relation) to other entities. Entities are usually
//!   declared by deriving [`Entity`](schema::Entity) on a plain Rust struct, which replaces the
//!   families of near-identical input and output types that code generators typically emit for
//!   every table.
//! * A [query] layer, which defines the language clients use to describe the rows they want: a
//!   boolean [filter](query::FilterExpression) over field predicates and relations, a
//!   [sort order](query::SortSpec), and [aggregates](query::AggregateSpec) computed over groups of
//!   rows. The [`QueryEvaluator`](query::QueryEvaluator) checks a query against the
//!   [`Catalog`](schema::Catalog) before touching any data, then evaluates it over rows supplied by
//!   a [`RowSource`](source::RowSource).
//! * A [graphql] layer, which exposes the query language through `async_graphql` input types and
//!   a generic query root.
//!
//! The engine never talks to a database itself. A [`RowSource`](source::RowSource) implementation
//! is responsible for producing rows, and the [`MemorySource`](source::MemorySource) provided here
//! is enough for tests and small, fully in-memory applications.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

pub mod auth;
pub mod config;
pub mod error;
pub mod graphql;
pub mod prelude;
pub mod query;
pub mod schema;
pub mod source;
pub mod value;

pub use config::Config;
pub use error::{Error, Mismatch, Result};

/// Initialize tracing.
pub fn init_logging() {
    static ONCE: Once = Once::new();

    ONCE.call_once(|| {
        let _ = color_eyre::install();
        tracing_subscriber::fmt()
            .with_ansi(true)
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    });
}
