//! Queries and their evaluation.
//!
//! A [`Query`] names an entity and optionally carries a [filter](FilterExpression), a
//! [sort](SortSpec), [aggregates](AggregateSpec) and a page window. Queries are evaluated by a
//! [`QueryEvaluator`] in two phases:
//!
//! 1. [`prepare`](QueryEvaluator::prepare) checks the query against the
//!    [`Catalog`](crate::schema::Catalog), producing a [`Plan`]. Any
//!    [schema mismatch](crate::Error::SchemaMismatch) or [aggregate type
//!    error](crate::Error::AggregateType) is reported here, before a single row is read.
//! 2. The plan fetches the rows of every entity it touches from a [`RowSource`], then filters,
//!    sorts, pages and, if requested, aggregates them. This phase cannot fail except in the row
//!    source.
//!
//! The catalog is shared and read-only, and evaluation never mutates its inputs, so any number of
//! queries can be evaluated concurrently by the same evaluator.

use crate::error::Error;
use crate::schema::{Catalog, EntityCatalog, Entity, Relation};
use crate::source::RowSource;
use crate::value::Record;
use crate::Config;
use futures::future::try_join_all;
use itertools::Itertools;
use serde::Serialize;
use std::sync::Arc;

pub mod aggregate;
pub mod eval;
pub mod filter;
pub mod sort;
mod validate;

pub use aggregate::{AggregateKind, AggregateRow, AggregateSpec, COUNT_ALL};
pub use eval::{Dataset, RowGraph};
pub use filter::{
    field, relation, Arity, FieldRef, FilterExpression, Operand, Operator, Predicate, QueryMode,
    Quantifier, RelationFilter, RelationRef,
};
pub use sort::{Direction, NullsOrder, SortEntry, SortKey, SortSpec};

use aggregate::BoundAggregate;
use sort::BoundSort;
use validate::BoundFilter;

/// A request for rows of one entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    entity: String,
    filter: Option<FilterExpression>,
    sort: SortSpec,
    aggregate: Option<AggregateSpec>,
    skip: usize,
    take: Option<usize>,
}

impl Query {
    /// All rows of `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            filter: None,
            sort: SortSpec::default(),
            aggregate: None,
            skip: 0,
            take: None,
        }
    }

    /// All rows of the entity `T`.
    pub fn of<T: Entity>() -> Self {
        Self::new(T::NAME)
    }

    pub fn filter(mut self, filter: impl Into<FilterExpression>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn sort(mut self, sort: impl Into<SortSpec>) -> Self {
        self.sort = sort.into();
        self
    }

    /// Reduce the selected rows instead of returning them.
    pub fn aggregate(mut self, aggregate: AggregateSpec) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    /// Drop the first `skip` rows after sorting.
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Keep at most `take` rows after sorting and skipping.
    pub fn take(mut self, take: usize) -> Self {
        self.take = Some(take);
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }
}

/// The result of a query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryOutput {
    /// Selected rows, in order.
    Rows(Vec<Record>),
    /// One row per aggregate group, in order of first appearance.
    Groups(Vec<AggregateRow>),
}

impl QueryOutput {
    pub fn into_rows(self) -> Option<Vec<Record>> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Groups(_) => None,
        }
    }

    pub fn into_groups(self) -> Option<Vec<AggregateRow>> {
        match self {
            Self::Rows(_) => None,
            Self::Groups(groups) => Some(groups),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Rows(rows) => rows.len(),
            Self::Groups(groups) => groups.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A query which has been checked against the catalog and is ready to run.
#[derive(Clone, Debug)]
pub struct Plan {
    entity: String,
    filter: Option<BoundFilter>,
    sort: BoundSort,
    aggregate: Option<BoundAggregate>,
    skip: usize,
    take: Option<usize>,
    /// Every entity whose rows the plan reads, starting with the queried entity.
    sources: Vec<EntityCatalog>,
    /// Every relation the plan traverses.
    relations: Vec<Relation>,
}

impl Plan {
    /// The entities whose rows this plan reads.
    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(EntityCatalog::name)
    }

    /// Load the rows this plan needs from `source`.
    ///
    /// All entities are fetched concurrently.
    pub async fn fetch<S: RowSource + ?Sized>(&self, source: &S) -> Result<Dataset, Error> {
        let tables = try_join_all(self.sources.iter().map(|entity| async move {
            let rows = source.fetch(entity).await?;
            Ok::<_, Error>((entity, rows))
        }))
        .await?;

        let mut dataset = Dataset::new();
        for (entity, rows) in tables {
            dataset.insert(entity, rows);
        }
        for relation in &self.relations {
            dataset.index(relation);
        }
        Ok(dataset)
    }

    /// Run the plan over rows already loaded into `dataset`.
    pub fn run(&self, dataset: &Dataset) -> QueryOutput {
        let rows = dataset.rows(&self.entity);
        let selected: Vec<Record> = match &self.filter {
            Some(filter) => rows
                .iter()
                .filter(|row| eval::matches(filter, row, dataset))
                .cloned()
                .collect(),
            None => rows.to_vec(),
        };
        tracing::debug!(
            "{} of {} rows of {} selected",
            selected.len(),
            rows.len(),
            self.entity
        );

        let page = self
            .sort
            .apply(selected, dataset)
            .into_iter()
            .skip(self.skip)
            .take(self.take.unwrap_or(usize::MAX))
            .collect_vec();
        match &self.aggregate {
            Some(aggregate) => QueryOutput::Groups(aggregate.apply(&page)),
            None => QueryOutput::Rows(page),
        }
    }
}

/// Evaluates queries against a fixed catalog.
#[derive(Clone, Debug)]
pub struct QueryEvaluator {
    catalog: Arc<Catalog>,
    config: Config,
}

impl QueryEvaluator {
    pub fn new(catalog: impl Into<Arc<Catalog>>) -> Self {
        Self {
            catalog: catalog.into(),
            config: Config::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check `query` against the catalog.
    pub fn prepare(&self, query: &Query) -> Result<Plan, Error> {
        self.bind(query).map_err(|err| {
            tracing::debug!("invalid query on {}: {err}", query.entity);
            err
        })
    }

    fn bind(&self, query: &Query) -> Result<Plan, Error> {
        let entity = self.catalog.require(&query.entity)?;
        let filter = query
            .filter
            .as_ref()
            .map(|filter| validate::bind(&self.catalog, entity, filter, &self.config))
            .transpose()?;
        let sort = query.sort.bind(&self.catalog, entity)?;
        let aggregate = query
            .aggregate
            .as_ref()
            .map(|aggregate| aggregate.bind(entity))
            .transpose()?;

        let relations = filter
            .iter()
            .flat_map(BoundFilter::relations)
            .chain(sort.relations())
            .unique()
            .cloned()
            .collect_vec();
        let mut sources = vec![entity.clone()];
        for relation in &relations {
            if sources.iter().all(|e| e.name() != relation.target()) {
                sources.push(self.catalog.require(relation.target())?.clone());
            }
        }

        Ok(Plan {
            entity: entity.name().into(),
            filter,
            sort,
            aggregate,
            skip: query.skip,
            take: query.take,
            sources,
            relations,
        })
    }

    /// Evaluate `query` against rows loaded from `source`.
    ///
    /// The query is validated before `source` is touched.
    pub async fn evaluate<S: RowSource + ?Sized>(
        &self,
        query: &Query,
        source: &S,
    ) -> Result<QueryOutput, Error> {
        let plan = self.prepare(query)?;
        let dataset = plan.fetch(source).await?;
        let output = plan.run(&dataset);
        tracing::info!("query on {} returned {} rows", query.entity, output.len());
        Ok(output)
    }

    /// Evaluate `query` against rows which have already been loaded.
    pub fn evaluate_loaded(&self, query: &Query, dataset: &Dataset) -> Result<QueryOutput, Error> {
        Ok(self.prepare(query)?.run(dataset))
    }
}

/// Evaluate a filter, sort and aggregate over the rows of `entity` loaded from `source`.
///
/// This is shorthand for building a [`Query`] and evaluating it with a default-configured
/// [`QueryEvaluator`].
pub async fn evaluate<S: RowSource + ?Sized>(
    catalog: &Arc<Catalog>,
    entity: &str,
    filter: Option<FilterExpression>,
    sort: Option<SortSpec>,
    aggregate: Option<AggregateSpec>,
    source: &S,
) -> Result<QueryOutput, Error> {
    let mut query = Query::new(entity);
    query.filter = filter;
    query.sort = sort.unwrap_or_default();
    query.aggregate = aggregate;
    QueryEvaluator::new(catalog.clone())
        .evaluate(&query, source)
        .await
}
