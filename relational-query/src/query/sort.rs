//! Ordering query results.
//!
//! A [`SortSpec`] is a list of [`SortEntry`]s. Earlier entries take priority, later entries break
//! ties, and rows which tie on every entry keep their input order.
//!
//! Null is the smallest value, so by default nulls come first in ascending order and last in
//! descending order. An entry can override this with [`NullsOrder`].

use super::eval::RowGraph;
use crate::error::Error;
use crate::error::Mismatch;
use crate::schema::{Cardinality, Catalog, EntityCatalog, Relation};
use crate::value::{Record, Value};
use async_graphql as gql;
use derive_more::Display;
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash, gql::Enum)]
pub enum Direction {
    #[default]
    #[display(fmt = "ASC")]
    Asc,
    #[display(fmt = "DESC")]
    Desc,
}

/// Where null values go, regardless of direction.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, gql::Enum)]
pub enum NullsOrder {
    #[display(fmt = "NULLS FIRST")]
    First,
    #[display(fmt = "NULLS LAST")]
    Last,
}

/// What a [`SortEntry`] orders by.
#[derive(Clone, Debug, Display, PartialEq, Eq, Hash)]
pub enum SortKey {
    /// The value of a field.
    #[display(fmt = "{}", _0)]
    Field(String),
    /// The number of rows related through a relation.
    #[display(fmt = "COUNT({})", _0)]
    RelationCount(String),
    /// A field of the row related through a to-one relation. Rows with no related row sort as
    /// null.
    #[display(fmt = "{}.{}", _0, _1)]
    RelationField(String, String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SortEntry {
    key: SortKey,
    direction: Direction,
    nulls: Option<NullsOrder>,
}

impl SortEntry {
    pub fn new(key: SortKey, direction: Direction) -> Self {
        Self {
            key,
            direction,
            nulls: None,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(SortKey::Field(field.into()), Direction::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(SortKey::Field(field.into()), Direction::Desc)
    }

    /// Order by the number of rows related through `relation`.
    pub fn by_count(relation: impl Into<String>, direction: Direction) -> Self {
        Self::new(SortKey::RelationCount(relation.into()), direction)
    }

    /// Order by `field` of the row related through the to-one `relation`.
    pub fn by_related(
        relation: impl Into<String>,
        field: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self::new(
            SortKey::RelationField(relation.into(), field.into()),
            direction,
        )
    }

    pub fn nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }

    pub fn key(&self) -> &SortKey {
        &self.key
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Where nulls go for this entry.
    pub fn nulls_order(&self) -> NullsOrder {
        self.nulls.unwrap_or(match self.direction {
            Direction::Asc => NullsOrder::First,
            Direction::Desc => NullsOrder::Last,
        })
    }
}

/// An ordered list of sort keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SortSpec {
    entries: Vec<SortEntry>,
}

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lower priority sort key.
    pub fn then(mut self, entry: SortEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn entries(&self) -> &[SortEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check the sort keys against the catalog entry of the entity being sorted.
    pub(crate) fn bind(
        &self,
        catalog: &Catalog,
        entity: &EntityCatalog,
    ) -> Result<BoundSort, Error> {
        let entries = self
            .entries
            .iter()
            .map(|entry| {
                let key = match &entry.key {
                    SortKey::Field(name) => {
                        BoundSortKey::Field(entity.require_field(name)?.name().into())
                    }
                    SortKey::RelationCount(name) => {
                        BoundSortKey::RelationCount(entity.require_relation(name)?.clone())
                    }
                    SortKey::RelationField(relation, field) => {
                        let relation = entity.require_relation(relation)?;
                        if relation.cardinality() != Cardinality::ToOne {
                            return Err(
                                entity.mismatch(Mismatch::NotToOne(relation.name().into()))
                            );
                        }
                        let field = catalog
                            .require(relation.target())?
                            .require_field(field)?
                            .name()
                            .into();
                        BoundSortKey::RelationField(relation.clone(), field)
                    }
                };
                Ok(BoundSortEntry {
                    key,
                    direction: entry.direction,
                    nulls: entry.nulls_order(),
                })
            })
            .collect::<Result<_, Error>>()?;
        Ok(BoundSort { entries })
    }
}

impl From<SortEntry> for SortSpec {
    fn from(entry: SortEntry) -> Self {
        Self {
            entries: vec![entry],
        }
    }
}

impl From<Vec<SortEntry>> for SortSpec {
    fn from(entries: Vec<SortEntry>) -> Self {
        Self { entries }
    }
}

impl FromIterator<SortEntry> for SortSpec {
    fn from_iter<I: IntoIterator<Item = SortEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A sort which has been checked against the catalog.
#[derive(Clone, Debug, Default)]
pub(crate) struct BoundSort {
    entries: Vec<BoundSortEntry>,
}

#[derive(Clone, Debug)]
struct BoundSortEntry {
    key: BoundSortKey,
    direction: Direction,
    nulls: NullsOrder,
}

#[derive(Clone, Debug)]
enum BoundSortKey {
    Field(String),
    RelationCount(Relation),
    RelationField(Relation, String),
}

impl BoundSort {
    /// Relations whose rows are needed to compute the sort keys.
    pub(crate) fn relations(&self) -> impl Iterator<Item = &Relation> {
        self.entries.iter().filter_map(|entry| match &entry.key {
            BoundSortKey::RelationCount(relation) | BoundSortKey::RelationField(relation, _) => {
                Some(relation)
            }
            BoundSortKey::Field(_) => None,
        })
    }

    /// Sort `rows` stably.
    ///
    /// Each row's keys are computed once, up front, so relation counts are not recomputed on every
    /// comparison.
    pub(crate) fn apply<G: RowGraph + ?Sized>(&self, rows: Vec<Record>, graph: &G) -> Vec<Record> {
        if self.entries.is_empty() {
            return rows;
        }
        let mut keyed: Vec<_> = rows
            .into_iter()
            .map(|row| (self.keys(&row, graph), row))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| self.compare(a, b));
        keyed.into_iter().map(|(_, row)| row).collect()
    }

    fn keys<G: RowGraph + ?Sized>(&self, row: &Record, graph: &G) -> Vec<Value> {
        self.entries
            .iter()
            .map(|entry| match &entry.key {
                BoundSortKey::Field(field) => row.get(field).clone(),
                BoundSortKey::RelationCount(relation) => {
                    Value::Int(graph.related(relation, row).len() as i64)
                }
                BoundSortKey::RelationField(relation, field) => graph
                    .related(relation, row)
                    .first()
                    .map_or(Value::Null, |related| related.get(field).clone()),
            })
            .collect()
    }

    fn compare(&self, a: &[Value], b: &[Value]) -> Ordering {
        self.entries
            .iter()
            .zip(a.iter().zip(b))
            .map(|(entry, (a, b))| entry.compare(a, b))
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl BoundSortEntry {
    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => self.null_ordering(),
            (false, true) => self.null_ordering().reverse(),
            (false, false) => match self.direction {
                Direction::Asc => a.cmp(b),
                Direction::Desc => b.cmp(a),
            },
        }
    }

    /// How a null compares to a non-null value.
    fn null_ordering(&self) -> Ordering {
        match self.nulls {
            NullsOrder::First => Ordering::Less,
            NullsOrder::Last => Ordering::Greater,
        }
    }
}
