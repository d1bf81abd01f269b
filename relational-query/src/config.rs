//! Evaluator configuration.

use crate::query::Quantifier;
use crate::schema::Cardinality;

/// Tunable behavior of a [`QueryEvaluator`](crate::query::QueryEvaluator).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    to_one: Quantifier,
    to_many: Quantifier,
    max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            to_one: Quantifier::Some,
            to_many: Quantifier::Some,
            max_depth: 32,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// The quantifier applied to filters on to-one relations which don't specify one.
    pub fn with_to_one_quantifier(mut self, quantifier: Quantifier) -> Self {
        self.to_one = quantifier;
        self
    }

    /// The quantifier applied to filters on to-many relations which don't specify one.
    pub fn with_to_many_quantifier(mut self, quantifier: Quantifier) -> Self {
        self.to_many = quantifier;
        self
    }

    /// The deepest allowed nesting of filter expressions.
    ///
    /// Deeper filters are rejected during validation, which bounds the recursion of the evaluator.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn default_quantifier(&self, cardinality: Cardinality) -> Quantifier {
        match cardinality {
            Cardinality::ToOne => self.to_one,
            Cardinality::ToMany => self.to_many,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}
