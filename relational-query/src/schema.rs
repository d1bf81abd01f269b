//! The catalog describing the entities that can be queried.
//!
//! Every entity in an application's data model is described by an [`EntityCatalog`]: its typed
//! [`EntityField`]s and its [`Relation`]s to other entities. The entities of an application are
//! collected into a [`Catalog`], which is checked for consistency once when it is built and is
//! read-only afterwards, so one catalog can be shared by any number of concurrent queries.
//!
//! Catalog entries can be written by hand, but they are usually declared by deriving [`Entity`] on
//! a plain Rust struct:
//!
//! ```
//! use relational_query::schema::{BelongsTo, Catalog, Entity, FieldType, HasMany};
//!
//! #[derive(Clone, Debug, Entity)]
//! struct User {
//!     id: i32,
//!     name: String,
//!     #[entity(inverse(author_id))]
//!     posts: HasMany<Post>,
//! }
//!
//! #[derive(Clone, Debug, Entity)]
//! struct Post {
//!     id: i32,
//!     /// Net votes from readers.
//!     upvote_count: Option<i32>,
//!     author_id: i32,
//!     #[entity(key(author_id))]
//!     author: BelongsTo<User>,
//! }
//!
//! let catalog = Catalog::builder().register::<User>().register::<Post>().build().unwrap();
//! let posts = catalog.entity("Post").unwrap();
//! let votes = posts.field("upvoteCount").unwrap();
//! assert_eq!(votes.ty(), FieldType::Int);
//! assert!(votes.is_nullable());
//! assert_eq!(votes.description(), Some("Net votes from readers."));
//! assert!(posts.field("authorId").unwrap().is_relational());
//! assert_eq!(posts.relation("author").unwrap().target(), "User");
//! ```

use crate::error::{Error, Mismatch};
use crate::value::{Record, Value};
use async_graphql as gql;
use chrono::{DateTime, Utc};
use derivative::Derivative;
use derive_more::Display;
use itertools::Itertools;
use sealed::sealed;
use std::collections::HashMap;
use std::marker::PhantomData;

pub use relational_query_derive::Entity;

/// The semantic type of a field.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, gql::Enum)]
pub enum FieldType {
    #[display(fmt = "string")]
    String,
    #[display(fmt = "int")]
    Int,
    #[display(fmt = "float")]
    Float,
    #[display(fmt = "datetime")]
    DateTime,
    #[display(fmt = "enum")]
    Enum,
    #[display(fmt = "boolean")]
    Boolean,
}

impl FieldType {
    /// Can `sum` and `avg` be computed over fields of this type?
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Can fields of this type be compared with `<` and friends, and reduced with `min`/`max`?
    pub fn is_orderable(self) -> bool {
        !matches!(self, Self::Boolean)
    }

    /// Can fields of this type be matched with the text operators?
    pub fn is_text(self) -> bool {
        matches!(self, Self::String | Self::Enum)
    }
}

/// A queryable field of an entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityField {
    name: String,
    ty: FieldType,
    nullable: bool,
    relational: bool,
    description: Option<String>,
}

impl EntityField {
    /// A non-null, non-relational field.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            relational: false,
            description: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> FieldType {
        self.ty
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Is this field the key of some relation?
    ///
    /// This is set by [`CatalogBuilder::build`], never by hand.
    pub fn is_relational(&self) -> bool {
        self.relational
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// How many target rows a relation can yield for each owner row.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, gql::Enum)]
pub enum Cardinality {
    #[display(fmt = "to-one")]
    ToOne,
    #[display(fmt = "to-many")]
    ToMany,
}

/// A named relationship from rows of one entity to rows of another.
///
/// The rows related to an owner row are the target rows whose `target_key` equals the owner's
/// `local_key`. A to-one relation yields at most one such row.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Relation {
    name: String,
    target: String,
    cardinality: Cardinality,
    local_key: String,
    target_key: String,
}

impl Relation {
    /// A relation to at most one row of `target`, usually through a foreign key on the owner.
    pub fn to_one(
        name: impl Into<String>,
        target: impl Into<String>,
        local_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self::new(name, target, Cardinality::ToOne, local_key, target_key)
    }

    /// A relation to any number of rows of `target`, usually through a foreign key on the target.
    pub fn to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        local_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self::new(name, target, Cardinality::ToMany, local_key, target_key)
    }

    fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        cardinality: Cardinality,
        local_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality,
            local_key: local_key.into(),
            target_key: target_key.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name of the related entity.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn local_key(&self) -> &str {
        &self.local_key
    }

    pub fn target_key(&self) -> &str {
        &self.target_key
    }
}

/// The fields and relations of a single entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityCatalog {
    name: String,
    fields: Vec<EntityField>,
    relations: Vec<Relation>,
}

impl EntityCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: vec![],
            relations: vec![],
        }
    }

    /// Add a field, replacing any existing field with the same name.
    pub fn with_field(mut self, field: EntityField) -> Self {
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
        self
    }

    /// Add a relation, replacing any existing relation with the same name.
    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.retain(|r| r.name != relation.name);
        self.relations.push(relation);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[EntityField] {
        &self.fields
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn field(&self, name: &str) -> Option<&EntityField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Look up a field, failing with [`Error::SchemaMismatch`] if it does not exist.
    pub fn require_field(&self, name: &str) -> Result<&EntityField, Error> {
        self.field(name)
            .ok_or_else(|| self.mismatch(Mismatch::UnknownField(name.into())))
    }

    /// Look up a relation, failing with [`Error::SchemaMismatch`] if it does not exist.
    pub fn require_relation(&self, name: &str) -> Result<&Relation, Error> {
        self.relation(name)
            .ok_or_else(|| self.mismatch(Mismatch::UnknownRelation(name.into())))
    }

    /// A schema mismatch error on this entity.
    pub fn mismatch(&self, reason: Mismatch) -> Error {
        Error::mismatch(&self.name, reason)
    }

    /// Normalize a row to the shape declared by this catalog.
    ///
    /// The result has exactly the fields of the catalog. Missing fields become null, integers in
    /// float fields are widened, and strings in enum or datetime fields are reinterpreted. Values
    /// which cannot be coerced are kept as they are.
    pub fn conform(&self, mut record: Record) -> Record {
        self.fields
            .iter()
            .map(|field| {
                let value = record.take(&field.name);
                let value = value
                    .clone()
                    .coerce(field.ty)
                    .unwrap_or(value);
                (field.name.clone(), value)
            })
            .collect()
    }
}

/// The catalog of every entity in an application.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    entities: HashMap<String, EntityCatalog>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn entity(&self, name: &str) -> Option<&EntityCatalog> {
        self.entities.get(name)
    }

    /// Look up an entity, failing with [`Error::SchemaMismatch`] if it does not exist.
    pub fn require(&self, name: &str) -> Result<&EntityCatalog, Error> {
        self.entity(name)
            .ok_or_else(|| Error::mismatch(name, Mismatch::UnknownEntity))
    }

    /// All the entities in the catalog, ordered by name.
    pub fn entities(&self) -> impl Iterator<Item = &EntityCatalog> {
        self.entities
            .values()
            .sorted_by(|a, b| a.name.cmp(&b.name))
    }
}

/// Collects entities into a [`Catalog`].
#[derive(Clone, Debug, Default)]
pub struct CatalogBuilder {
    entities: Vec<EntityCatalog>,
}

impl CatalogBuilder {
    /// Add the entity described by a Rust type.
    pub fn register<T: Entity>(self) -> Self {
        self.entity(T::describe())
    }

    /// Add an entity described by hand.
    pub fn entity(mut self, entity: EntityCatalog) -> Self {
        self.entities.push(entity);
        self
    }

    /// Check the collected entities for consistency and build the catalog.
    ///
    /// Entity names must be unique, every relation must target a registered entity, and both keys
    /// of a relation must be fields of the same type. Key fields are marked as
    /// [relational](EntityField::is_relational).
    pub fn build(self) -> Result<Catalog, Error> {
        let mut entities = HashMap::new();
        for entity in self.entities {
            if entities.contains_key(&entity.name) {
                return Err(entity.mismatch(Mismatch::DuplicateEntity));
            }
            entities.insert(entity.name.clone(), entity);
        }

        let mut keys = vec![];
        for entity in entities.values() {
            for relation in &entity.relations {
                let target = entities.get(&relation.target).ok_or_else(|| {
                    Error::mismatch(&relation.target, Mismatch::UnknownEntity)
                })?;
                let local = entity.require_field(&relation.local_key)?;
                let remote = target.require_field(&relation.target_key)?;
                if local.ty != remote.ty {
                    return Err(entity.mismatch(Mismatch::KeyType {
                        relation: relation.name.clone(),
                        local: local.ty,
                        target: remote.ty,
                    }));
                }
                keys.push((entity.name.clone(), relation.local_key.clone()));
                keys.push((relation.target.clone(), relation.target_key.clone()));
            }
        }
        for (entity, key) in keys {
            if let Some(field) = entities
                .get_mut(&entity)
                .and_then(|e| e.fields.iter_mut().find(|f| f.name == key))
            {
                field.relational = true;
            }
        }

        tracing::debug!(
            "built catalog with entities {}",
            entities.keys().sorted().join(", ")
        );
        Ok(Catalog { entities })
    }
}

/// A Rust type describing an entity.
///
/// This trait is usually implemented with the [`macro@Entity`] derive macro.
pub trait Entity: Sized {
    /// The name of the entity in queries.
    const NAME: &'static str;

    /// The catalog entry for this entity.
    fn describe() -> EntityCatalog;

    /// Convert an instance into a row.
    fn into_record(self) -> Record;
}

/// A Rust type which can be stored in a field of an [`Entity`].
#[sealed]
pub trait Scalar {
    /// The semantic type of fields of this type.
    const TYPE: FieldType;

    fn into_value(self) -> Value;
}

macro_rules! scalar {
    ($t:ty, $ty:ident, $variant:ident) => {
        #[sealed]
        impl Scalar for $t {
            const TYPE: FieldType = FieldType::$ty;

            fn into_value(self) -> Value {
                Value::$variant(self.into())
            }
        }
    };
}

scalar!(i32, Int, Int);
scalar!(i64, Int, Int);
scalar!(u32, Int, Int);
scalar!(f32, Float, Float);
scalar!(f64, Float, Float);
scalar!(String, String, String);
scalar!(bool, Boolean, Boolean);
scalar!(DateTime<Utc>, DateTime, DateTime);

/// A marker type used in the definition of an [`Entity`] to declare a to-one relation.
///
/// The owner stores the key of the related row in a field named by `#[entity(key(...))]`.
#[derive(Derivative)]
#[derivative(
    Clone(bound = ""),
    Copy(bound = ""),
    Debug(bound = ""),
    Default(bound = ""),
    PartialEq(bound = ""),
    Eq(bound = ""),
    PartialOrd(bound = ""),
    Ord(bound = ""),
    Hash(bound = "")
)]
pub struct BelongsTo<T: Entity>(PhantomData<fn(&T)>);

/// A marker type used in the definition of an [`Entity`] to declare a to-many relation.
///
/// The related rows store the key of the owner in a field named by `#[entity(inverse(...))]`.
#[derive(Derivative)]
#[derivative(
    Clone(bound = ""),
    Copy(bound = ""),
    Debug(bound = ""),
    Default(bound = ""),
    PartialEq(bound = ""),
    Eq(bound = ""),
    PartialOrd(bound = ""),
    Ord(bound = ""),
    Hash(bound = "")
)]
pub struct HasMany<T: Entity>(PhantomData<fn(&T)>);

#[cfg(test)]
mod test {
    use super::*;
    use crate::{record, Error};

    fn users() -> EntityCatalog {
        EntityCatalog::new("User")
            .with_field(EntityField::new("id", FieldType::Int))
            .with_field(EntityField::new("name", FieldType::String))
            .with_relation(Relation::to_many("posts", "Post", "id", "authorId"))
    }

    fn posts() -> EntityCatalog {
        EntityCatalog::new("Post")
            .with_field(EntityField::new("id", FieldType::Int))
            .with_field(EntityField::new("score", FieldType::Float).nullable())
            .with_field(EntityField::new("status", FieldType::Enum))
            .with_field(EntityField::new("authorId", FieldType::Int))
            .with_relation(Relation::to_one("author", "User", "authorId", "id"))
    }

    #[test]
    fn test_build_marks_keys() {
        let catalog = Catalog::builder()
            .entity(users())
            .entity(posts())
            .build()
            .unwrap();
        let post = catalog.entity("Post").unwrap();
        assert!(post.field("authorId").unwrap().is_relational());
        assert!(!post.field("score").unwrap().is_relational());
        assert!(catalog
            .entity("User")
            .unwrap()
            .field("id")
            .unwrap()
            .is_relational());
        assert_eq!(
            catalog.entities().map(|e| e.name()).collect::<Vec<_>>(),
            ["Post", "User"]
        );
    }

    #[test]
    fn test_build_unknown_target() {
        let err = Catalog::builder().entity(posts()).build().unwrap_err();
        assert!(
            matches!(
                &err,
                Error::SchemaMismatch { entity, reason: Mismatch::UnknownEntity } if entity == "User"
            ),
            "{err}"
        );
    }

    #[test]
    fn test_build_unknown_key() {
        let users = users().with_relation(Relation::to_many("posts", "Post", "id", "writerId"));
        let err = Catalog::builder()
            .entity(users)
            .entity(posts())
            .build()
            .unwrap_err();
        assert!(
            matches!(
                &err,
                Error::SchemaMismatch { entity, reason: Mismatch::UnknownField(field) }
                    if entity == "Post" && field == "writerId"
            ),
            "{err}"
        );
    }

    #[test]
    fn test_build_key_type() {
        let users = users().with_relation(Relation::to_many("posts", "Post", "name", "authorId"));
        let err = Catalog::builder()
            .entity(users)
            .entity(posts())
            .build()
            .unwrap_err();
        assert!(
            matches!(&err, Error::SchemaMismatch { reason: Mismatch::KeyType { .. }, .. }),
            "{err}"
        );
    }

    #[test]
    fn test_build_duplicate() {
        let err = Catalog::builder()
            .entity(users())
            .entity(users())
            .entity(posts())
            .build()
            .unwrap_err();
        assert!(
            matches!(&err, Error::SchemaMismatch { reason: Mismatch::DuplicateEntity, .. }),
            "{err}"
        );
    }

    #[test]
    fn test_conform() {
        let row = posts().conform(record! {
            "id" => 1,
            "score" => 3,
            "status" => "DRAFT",
            "extra" => true,
        });
        assert_eq!(
            row,
            record! {
                "id" => 1,
                "score" => 3.0,
                "status" => Value::Enum("DRAFT".into()),
                "authorId" => Value::Null,
            }
        );
    }
}
