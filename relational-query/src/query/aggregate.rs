//! Aggregates over groups of rows.
//!
//! An [`AggregateSpec`] partitions rows into groups which share the values of the `group_by`
//! fields (or treats all rows as a single group if there are none) and computes the requested
//! reductions over each group. Groups are emitted in the order their key is first encountered.
//!
//! Reductions skip null values. A reduction with no non-null input is null, except for counts,
//! which are zero.

use crate::error::Error;
use crate::schema::{EntityCatalog, FieldType};
use crate::value::{Record, Value};
use derive_more::Display;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// The marker which counts rows rather than non-null values of a field.
pub const COUNT_ALL: &str = "_all";

/// A kind of reduction.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    #[display(fmt = "_count")]
    Count,
    #[display(fmt = "_sum")]
    Sum,
    #[display(fmt = "_avg")]
    Avg,
    #[display(fmt = "_min")]
    Min,
    #[display(fmt = "_max")]
    Max,
}

impl AggregateKind {
    /// The property required of the fields this kind can reduce, if any.
    fn requirement(self) -> Option<(&'static str, fn(FieldType) -> bool)> {
        match self {
            Self::Count => None,
            Self::Sum | Self::Avg => Some(("a numeric", FieldType::is_numeric)),
            Self::Min | Self::Max => Some(("an orderable", FieldType::is_orderable)),
        }
    }
}

/// The aggregates requested by a query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AggregateSpec {
    group_by: Vec<String>,
    count: Vec<String>,
    sum: Vec<String>,
    avg: Vec<String>,
    min: Vec<String>,
    max: Vec<String>,
}

impl AggregateSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partition rows by the values of `fields`.
    pub fn group_by<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.group_by.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Count the rows in each group.
    pub fn count_all(self) -> Self {
        self.count(COUNT_ALL)
    }

    /// Count the non-null values of `field` in each group, or the rows if `field` is
    /// [`COUNT_ALL`].
    pub fn count(mut self, field: impl Into<String>) -> Self {
        self.count.push(field.into());
        self
    }

    pub fn sum(mut self, field: impl Into<String>) -> Self {
        self.sum.push(field.into());
        self
    }

    pub fn avg(mut self, field: impl Into<String>) -> Self {
        self.avg.push(field.into());
        self
    }

    pub fn min(mut self, field: impl Into<String>) -> Self {
        self.min.push(field.into());
        self
    }

    pub fn max(mut self, field: impl Into<String>) -> Self {
        self.max.push(field.into());
        self
    }

    pub fn group_by_fields(&self) -> &[String] {
        &self.group_by
    }

    /// The fields requested for each kind of reduction.
    pub fn fields(&self, kind: AggregateKind) -> &[String] {
        match kind {
            AggregateKind::Count => &self.count,
            AggregateKind::Sum => &self.sum,
            AggregateKind::Avg => &self.avg,
            AggregateKind::Min => &self.min,
            AggregateKind::Max => &self.max,
        }
    }

    /// Check the requested aggregates against the catalog entry of the entity being reduced.
    pub(crate) fn bind(&self, entity: &EntityCatalog) -> Result<BoundAggregate, Error> {
        for field in &self.group_by {
            entity.require_field(field)?;
        }
        for kind in [
            AggregateKind::Count,
            AggregateKind::Sum,
            AggregateKind::Avg,
            AggregateKind::Min,
            AggregateKind::Max,
        ] {
            for name in self.fields(kind) {
                if kind == AggregateKind::Count && name == COUNT_ALL {
                    continue;
                }
                let field = entity.require_field(name)?;
                if let Some((required, allowed)) = kind.requirement() {
                    if !allowed(field.ty()) {
                        return Err(Error::AggregateType {
                            entity: entity.name().into(),
                            field: name.clone(),
                            kind,
                            required,
                            ty: field.ty(),
                        });
                    }
                }
            }
        }
        Ok(BoundAggregate {
            spec: self.clone(),
            types: entity
                .fields()
                .iter()
                .map(|field| (field.name().to_string(), field.ty()))
                .collect(),
        })
    }
}

/// One group of an aggregate result.
///
/// Serializes as the group key fields alongside `_count`, `_sum`, `_avg`, `_min` and `_max`
/// objects holding the reductions of each kind that was requested.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AggregateRow {
    #[serde(flatten)]
    group: Record,
    #[serde(rename = "_count", skip_serializing_if = "BTreeMap::is_empty")]
    count: BTreeMap<String, u64>,
    #[serde(rename = "_sum", skip_serializing_if = "BTreeMap::is_empty")]
    sum: BTreeMap<String, Value>,
    #[serde(rename = "_avg", skip_serializing_if = "BTreeMap::is_empty")]
    avg: BTreeMap<String, Value>,
    #[serde(rename = "_min", skip_serializing_if = "BTreeMap::is_empty")]
    min: BTreeMap<String, Value>,
    #[serde(rename = "_max", skip_serializing_if = "BTreeMap::is_empty")]
    max: BTreeMap<String, Value>,
}

impl AggregateRow {
    /// The values of the group-by fields shared by every row in this group.
    pub fn group(&self) -> &Record {
        &self.group
    }

    /// The count of `field` (or of rows, for [`COUNT_ALL`]), if it was requested.
    pub fn count(&self, field: &str) -> Option<u64> {
        self.count.get(field).copied()
    }

    /// A reduction of `field`, if it was requested.
    ///
    /// Use [`count`](Self::count) for [`AggregateKind::Count`].
    pub fn get(&self, kind: AggregateKind, field: &str) -> Option<&Value> {
        match kind {
            AggregateKind::Count => None,
            AggregateKind::Sum => self.sum.get(field),
            AggregateKind::Avg => self.avg.get(field),
            AggregateKind::Min => self.min.get(field),
            AggregateKind::Max => self.max.get(field),
        }
    }

    pub fn sum(&self, field: &str) -> Option<&Value> {
        self.get(AggregateKind::Sum, field)
    }

    pub fn avg(&self, field: &str) -> Option<&Value> {
        self.get(AggregateKind::Avg, field)
    }

    pub fn min(&self, field: &str) -> Option<&Value> {
        self.get(AggregateKind::Min, field)
    }

    pub fn max(&self, field: &str) -> Option<&Value> {
        self.get(AggregateKind::Max, field)
    }
}

/// Aggregates which have been checked against the catalog.
#[derive(Clone, Debug)]
pub(crate) struct BoundAggregate {
    spec: AggregateSpec,
    types: HashMap<String, FieldType>,
}

impl BoundAggregate {
    /// Reduce `rows`, one output row per group.
    pub(crate) fn apply(&self, rows: &[Record]) -> Vec<AggregateRow> {
        let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<Value>, Accumulator)> = vec![];
        if self.spec.group_by.is_empty() {
            // Without group-by there is exactly one group, even when there are no rows.
            groups.push((vec![], Accumulator::new(&self.spec)));
            index.insert(vec![], 0);
        }

        for row in rows {
            let key: Vec<Value> = self
                .spec
                .group_by
                .iter()
                .map(|field| row.get(field).clone())
                .collect();
            let i = match index.get(&key) {
                Some(&i) => i,
                None => {
                    index.insert(key.clone(), groups.len());
                    groups.push((key, Accumulator::new(&self.spec)));
                    groups.len() - 1
                }
            };
            groups[i].1.update(&self.spec, row);
        }

        groups
            .into_iter()
            .map(|(key, acc)| self.finish(key, acc))
            .collect()
    }

    fn finish(&self, key: Vec<Value>, acc: Accumulator) -> AggregateRow {
        let spec = &self.spec;
        let named = |fields: &[String], values: Vec<Value>| -> BTreeMap<String, Value> {
            fields.iter().cloned().zip(values).collect()
        };
        AggregateRow {
            group: spec.group_by.iter().cloned().zip(key).collect(),
            count: spec.count.iter().cloned().zip(acc.counts).collect(),
            sum: named(
                &spec.sum,
                spec.sum
                    .iter()
                    .zip(&acc.sums)
                    .map(|(field, sum)| sum.total(self.types.get(field).copied()))
                    .collect(),
            ),
            avg: named(&spec.avg, acc.avgs.iter().map(Sum::mean).collect()),
            min: named(&spec.min, acc.mins),
            max: named(&spec.max, acc.maxs),
        }
    }
}

/// Running reductions for one group.
struct Accumulator {
    counts: Vec<u64>,
    sums: Vec<Sum>,
    avgs: Vec<Sum>,
    mins: Vec<Value>,
    maxs: Vec<Value>,
}

impl Accumulator {
    fn new(spec: &AggregateSpec) -> Self {
        Self {
            counts: vec![0; spec.count.len()],
            sums: vec![Sum::default(); spec.sum.len()],
            avgs: vec![Sum::default(); spec.avg.len()],
            mins: vec![Value::Null; spec.min.len()],
            maxs: vec![Value::Null; spec.max.len()],
        }
    }

    fn update(&mut self, spec: &AggregateSpec, row: &Record) {
        for (count, field) in self.counts.iter_mut().zip(&spec.count) {
            if field == COUNT_ALL || !row.get(field).is_null() {
                *count += 1;
            }
        }
        for (sum, field) in self.sums.iter_mut().zip(&spec.sum) {
            sum.add(row.get(field));
        }
        for (sum, field) in self.avgs.iter_mut().zip(&spec.avg) {
            sum.add(row.get(field));
        }
        for (min, field) in self.mins.iter_mut().zip(&spec.min) {
            let value = row.get(field);
            if !value.is_null() && (min.is_null() || value < min) {
                *min = value.clone();
            }
        }
        for (max, field) in self.maxs.iter_mut().zip(&spec.max) {
            let value = row.get(field);
            if !value.is_null() && value > max {
                *max = value.clone();
            }
        }
    }
}

/// A running sum of the non-null values of a numeric field.
///
/// Integers are summed exactly, so a sum over an integer field stays an integer unless it
/// overflows.
#[derive(Clone, Copy, Debug, Default)]
struct Sum {
    int: i128,
    float: f64,
    n: u64,
}

impl Sum {
    fn add(&mut self, value: &Value) {
        match value {
            Value::Int(i) => {
                self.int += i128::from(*i);
                self.float += *i as f64;
            }
            Value::Float(f) => self.float += f,
            _ => return,
        }
        self.n += 1;
    }

    fn total(&self, ty: Option<FieldType>) -> Value {
        if self.n == 0 {
            return Value::Null;
        }
        match ty {
            Some(FieldType::Int) => i64::try_from(self.int)
                .map(Value::Int)
                .unwrap_or(Value::Float(self.float)),
            _ => Value::Float(self.float),
        }
    }

    fn mean(&self) -> Value {
        if self.n == 0 {
            Value::Null
        } else {
            Value::Float(self.float / self.n as f64)
        }
    }
}
