//! Values stored in the fields of a row, and the rows themselves.
//!
//! Rows arrive from a [`RowSource`](crate::source::RowSource) as untyped [`Record`]s. Their values
//! are interpreted according to the [`Catalog`](crate::schema::Catalog) of the entity being
//! queried, which is what lets a single generic engine replace a family of per-entity types.
//!
//! [`Value`] has a total order so that rows can be sorted and grouped: `Null` is smaller than every
//! other value, and non-null values of the same type compare naturally. Values of different types
//! never meet in a well-formed query (validation coerces every operand to the type of its field),
//! but they are still ordered, by type, so that the order is total.

use crate::schema::FieldType;
use chrono::{DateTime, SecondsFormat, Utc};
use derive_more::From;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{btree_map, BTreeMap};
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};

/// The value of a single field.
#[derive(Clone, Debug, Default, From)]
pub enum Value {
    #[default]
    #[from(ignore)]
    Null,
    Boolean(bool),
    Int(i64),
    #[from(ignore)]
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    #[from(ignore)]
    Enum(String),
}

impl Value {
    /// The type of this value, or [`None`] if it is null.
    pub fn ty(&self) -> Option<FieldType> {
        match self {
            Self::Null => None,
            Self::Boolean(_) => Some(FieldType::Boolean),
            Self::Int(_) => Some(FieldType::Int),
            Self::Float(_) => Some(FieldType::Float),
            Self::String(_) => Some(FieldType::String),
            Self::DateTime(_) => Some(FieldType::DateTime),
            Self::Enum(_) => Some(FieldType::Enum),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The text of a string or enum value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// The numeric value of an integer or float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Reinterpret this value as a value of type `ty`, if there is a lossless way to do so.
    ///
    /// Integers widen to floats, strings name enum variants, and RFC 3339 strings parse as
    /// datetimes. Null stays null.
    pub fn coerce(self, ty: FieldType) -> Option<Self> {
        match (self, ty) {
            (Self::Null, _) => Some(Self::Null),
            (Self::Int(i), FieldType::Float) => Some(Self::Float(i as f64)),
            (Self::Float(f), FieldType::Float) => Some(Self::from(f)),
            (Self::String(s), FieldType::Enum) => Some(Self::Enum(s)),
            (Self::String(s), FieldType::DateTime) => DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|t| Self::DateTime(t.with_timezone(&Utc))),
            (value, ty) if value.ty() == Some(ty) => Some(value),
            _ => None,
        }
    }

    /// Position of this value's type in the cross-type order.
    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Boolean(_) => 1,
            Self::Int(_) => 2,
            Self::Float(_) => 3,
            Self::String(_) => 4,
            Self::DateTime(_) => 5,
            Self::Enum(_) => 6,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::DateTime(t) => write!(f, "{}", t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Enum(s) => write!(f, "{s}"),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => cmp_floats(*a, *b),
            (Self::String(a), Self::String(b)) | (Self::Enum(a), Self::Enum(b)) => a.cmp(b),
            (Self::DateTime(a), Self::DateTime(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Like `total_cmp`, except that `-0.0` and `0.0` are equal.
fn cmp_floats(a: f64, b: f64) -> Ordering {
    if a == b {
        Ordering::Equal
    } else {
        a.total_cmp(&b)
    }
}

fn positive_zero(f: f64) -> f64 {
    if f == 0.0 {
        0.0
    } else {
        f
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Null => {}
            Self::Boolean(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => positive_zero(*f).to_bits().hash(state),
            Self::String(s) | Self::Enum(s) => s.hash(state),
            Self::DateTime(t) => t.hash(state),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) | Self::Enum(s) => serializer.serialize_str(s),
            Self::DateTime(t) => {
                serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i.into())
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Int(i.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(positive_zero(f))
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        f64::from(f).into()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

/// A single row of an entity.
///
/// Fields which are absent from the record read as [`Value::Null`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// The value of `field` in this row.
    pub fn get(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.0.get(field).unwrap_or(&NULL)
    }

    /// Set the value of `field`, returning the old value if there was one.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    /// Remove `field` from the row, returning its value ([`Value::Null`] if it was absent).
    pub fn take(&mut self, field: &str) -> Value {
        self.0.remove(field).unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Build a [`Record`] from `field => value` pairs.
///
/// # Examples
///
/// ```
/// use relational_query::{record, value::Value};
///
/// let post = record! { "id" => 1, "title" => "Hello", "upvoteCount" => Value::Null };
/// assert_eq!(post.get("id"), &Value::Int(1));
/// assert!(post.get("upvoteCount").is_null());
/// assert!(post.get("missing").is_null());
/// ```
#[macro_export]
macro_rules! record {
    {$($field:expr => $value:expr),* $(,)?} => {{
        #[allow(unused_mut)]
        let mut record = $crate::value::Record::new();
        $(record.insert($field, $value);)*
        record
    }};
}
