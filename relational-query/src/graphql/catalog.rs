//! GraphQL output types describing the catalog.
//!
//! These wrap the core [schema](crate::schema) types so that the catalog can be introspected by
//! clients without the core types depending on GraphQL.

use super::async_graphql::Object;
use crate::schema::{Cardinality, EntityCatalog, EntityField, FieldType, Relation};

/// An entity which can be queried.
#[derive(Clone, Debug)]
pub struct EntityInfo(EntityCatalog);

impl From<EntityCatalog> for EntityInfo {
    fn from(entity: EntityCatalog) -> Self {
        Self(entity)
    }
}

#[Object(name = "Entity")]
impl EntityInfo {
    async fn name(&self) -> &str {
        self.0.name()
    }

    async fn fields(&self) -> Vec<FieldInfo> {
        self.0.fields().iter().cloned().map(FieldInfo).collect()
    }

    async fn relations(&self) -> Vec<RelationInfo> {
        self.0.relations().iter().cloned().map(RelationInfo).collect()
    }
}

/// A queryable field of an entity.
#[derive(Clone, Debug)]
pub struct FieldInfo(EntityField);

#[Object(name = "EntityField")]
impl FieldInfo {
    async fn name(&self) -> &str {
        self.0.name()
    }

    #[graphql(name = "type")]
    async fn ty(&self) -> FieldType {
        self.0.ty()
    }

    async fn nullable(&self) -> bool {
        self.0.is_nullable()
    }

    /// Whether the field is a key of some relation.
    async fn relational(&self) -> bool {
        self.0.is_relational()
    }

    async fn description(&self) -> Option<&str> {
        self.0.description()
    }
}

/// A relationship from rows of one entity to rows of another.
#[derive(Clone, Debug)]
pub struct RelationInfo(Relation);

#[Object(name = "Relation")]
impl RelationInfo {
    async fn name(&self) -> &str {
        self.0.name()
    }

    async fn target(&self) -> &str {
        self.0.target()
    }

    async fn cardinality(&self) -> Cardinality {
        self.0.cardinality()
    }

    async fn local_key(&self) -> &str {
        self.0.local_key()
    }

    async fn target_key(&self) -> &str {
        self.0.target_key()
    }
}
