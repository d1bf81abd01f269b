//! Sources of rows.
//!
//! The query engine does not store data. It reads the rows of each entity it needs from a
//! [`RowSource`], which might wrap a database, a remote service or, for tests and small
//! applications, the in-memory [`MemorySource`].

use crate::error::Error;
use crate::schema::{Entity, EntityCatalog};
use crate::value::Record;
use async_std::sync::{Arc, RwLock};
use async_trait::async_trait;
use std::collections::HashMap;

/// Supplies the rows of an entity.
///
/// Rows should conform to the entity's catalog. The evaluator normalizes them on arrival (missing
/// fields read as null, and integers in float fields are widened), but values of the wrong type
/// are not rejected, and compare according to the cross-type order of
/// [`Value`](crate::value::Value).
#[async_trait]
pub trait RowSource: Send + Sync {
    /// All the rows of `entity`.
    async fn fetch(&self, entity: &EntityCatalog) -> Result<Vec<Record>, Error>;
}

#[async_trait]
impl<S: RowSource + ?Sized> RowSource for Arc<S> {
    async fn fetch(&self, entity: &EntityCatalog) -> Result<Vec<Record>, Error> {
        (**self).fetch(entity).await
    }
}

/// An in-memory row source.
///
/// Cloning a [`MemorySource`] yields a handle to the same rows. An entity with no rows inserted is
/// empty.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    tables: Arc<RwLock<HashMap<String, Vec<Record>>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append instances of `T` to its table.
    pub async fn insert<T: Entity, I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.insert_records(T::NAME, items.into_iter().map(T::into_record))
            .await
    }

    /// Append rows to the table of `entity`.
    pub async fn insert_records<I>(&self, entity: impl Into<String>, rows: I)
    where
        I: IntoIterator<Item = Record>,
    {
        let entity = entity.into();
        let mut tables = self.tables.write().await;
        let table = tables.entry(entity.clone()).or_default();
        let before = table.len();
        table.extend(rows);
        tracing::info!("INSERT {} rows INTO {}", table.len() - before, entity);
    }

    /// The number of rows of `entity`.
    pub async fn len(&self, entity: &str) -> usize {
        self.tables
            .read()
            .await
            .get(entity)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl RowSource for MemorySource {
    async fn fetch(&self, entity: &EntityCatalog) -> Result<Vec<Record>, Error> {
        let tables = self.tables.read().await;
        let rows = tables.get(entity.name()).cloned().unwrap_or_default();
        tracing::info!("SELECT * FROM {} ({} rows)", entity.name(), rows.len());
        Ok(rows)
    }
}
