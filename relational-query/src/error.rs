//! Errors reported while building catalogs and evaluating queries.
//!
//! Every error is the caller's fault or the row source's. Queries are checked against the
//! [`Catalog`](crate::schema::Catalog) before any row is read, so a query which fails validation
//! never produces partial output, and a query which passes validation cannot fail during
//! evaluation.

use crate::query::{AggregateKind, Operator};
use crate::schema::FieldType;
use derive_more::Display;
use snafu::Snafu;
use std::fmt::Display;

/// The ways a query or catalog can disagree with the schema.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum Mismatch {
    #[display(fmt = "no such entity")]
    UnknownEntity,
    #[display(fmt = "entity is declared more than once")]
    DuplicateEntity,
    #[display(fmt = "no such field {}", _0)]
    UnknownField(String),
    #[display(fmt = "no such relation {}", _0)]
    UnknownRelation(String),
    #[display(fmt = "relation {} is not to-one", _0)]
    NotToOne(String),
    #[display(fmt = "{field} {op} expects {expected}, got {given}")]
    OperandType {
        field: String,
        op: Operator,
        expected: String,
        given: String,
    },
    #[display(fmt = "{field} {op} does not accept null; use IS_NULL or IS_NOT_NULL to test for null")]
    NullOperand { field: String, op: Operator },
    #[display(fmt = "field {} is not nullable", _0)]
    NotNullable(String),
    #[display(fmt = "relation {relation} joins a {local} key to a {target} key")]
    KeyType {
        relation: String,
        local: FieldType,
        target: FieldType,
    },
    #[display(fmt = "filter is nested more than {max} levels deep")]
    TooDeep { max: usize },
}

/// Errors encountered while building catalogs and evaluating queries.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("schema mismatch in {entity}: {reason}"))]
    SchemaMismatch { entity: String, reason: Mismatch },

    #[snafu(display(
        "cannot compute {kind} of {entity}.{field}: expected {required} field, got {ty}"
    ))]
    AggregateType {
        entity: String,
        field: String,
        kind: AggregateKind,
        required: &'static str,
        ty: FieldType,
    },

    #[snafu(display("row source error: {message}"))]
    Source { message: String },

    #[snafu(display("unauthorized: requires one of the roles [{}]", required.join(", ")))]
    Unauthorized { required: Vec<String> },
}

impl Error {
    pub fn mismatch(entity: impl Into<String>, reason: Mismatch) -> Self {
        Self::SchemaMismatch {
            entity: entity.into(),
            reason,
        }
    }

    /// An error reported by a [`RowSource`](crate::source::RowSource).
    pub fn fetch(err: impl Display) -> Self {
        Self::Source {
            message: err.to_string(),
        }
    }

    /// Is this error the caller's fault, as opposed to a failure of the row source?
    pub fn is_invalid_query(&self) -> bool {
        matches!(self, Self::SchemaMismatch { .. } | Self::AggregateType { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
