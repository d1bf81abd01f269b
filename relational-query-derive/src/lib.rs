//! Derive macros for the `relational_query` crate.

use proc_macro::TokenStream;
use syn::parse_macro_input;

mod entity;
mod helpers;

/// Derive an implementation of `Entity` for a struct.
///
/// The generated `describe` function builds the catalog entry for the entity from the struct's
/// fields:
/// * A field of a supported scalar type (integers, floats, `String`, `bool` and
///   `chrono::DateTime<Utc>`) becomes a queryable field of the corresponding type. Wrapping the
///   type in [`Option`] makes the field nullable.
/// * A field of type `BelongsTo<T>` declares a to-one relation to the entity `T`. The key of the
///   related row is stored in the field named by the [`key`](#field-attributes) attribute.
/// * A field of type `HasMany<T>` declares a to-many relation to the entity `T`. The related rows
///   store the key of this row in the field of `T` named by the [`inverse`](#field-attributes)
///   attribute.
///
/// Field names are converted from snake_case to camelCase, so `upvote_count` is queried as
/// `upvoteCount`. Documentation on a field becomes the description of the catalog field.
///
/// The generated `into_record` function converts an instance of the struct into a row with a value
/// for each queryable field. Relation fields are markers and contribute nothing to the row.
///
/// # Examples
///
/// ```
/// use relational_query::{
///     schema::{BelongsTo, Entity, FieldType, HasMany},
///     value::Value,
/// };
/// use std::fmt::{self, Display, Formatter};
///
/// #[derive(Clone, Debug)]
/// enum Status {
///     Draft,
///     Published,
/// }
///
/// impl Display for Status {
///     fn fmt(&self, f: &mut Formatter) -> fmt::Result {
///         match self {
///             Self::Draft => write!(f, "DRAFT"),
///             Self::Published => write!(f, "PUBLISHED"),
///         }
///     }
/// }
///
/// #[derive(Clone, Debug, Entity)]
/// struct Author {
///     id: i64,
///     #[entity(inverse(author_id))]
///     articles: HasMany<Article>,
/// }
///
/// /// A blog post.
/// #[derive(Clone, Debug, Entity)]
/// #[entity(name("Post"))]
/// struct Article {
///     id: i64,
///     /// The headline.
///     title: String,
///     #[entity(enumeration)]
///     status: Status,
///     #[entity(rename("score"))]
///     upvote_count: Option<i32>,
///     author_id: i64,
///     #[entity(key(author_id))]
///     author: BelongsTo<Author>,
///     #[entity(skip)]
///     cached_html: Vec<u8>,
/// }
///
/// let post = Article::describe();
/// assert_eq!(Article::NAME, "Post");
/// assert_eq!(post.field("title").unwrap().description(), Some("The headline."));
/// assert_eq!(post.field("status").unwrap().ty(), FieldType::Enum);
/// assert!(post.field("score").unwrap().is_nullable());
/// assert!(post.field("cachedHtml").is_none());
/// assert_eq!(post.relation("author").unwrap().target(), "Author");
/// assert_eq!(post.relation("author").unwrap().local_key(), "authorId");
/// assert_eq!(Author::describe().relation("articles").unwrap().target(), "Post");
///
/// let row = Article {
///     id: 1,
///     title: "Hello".into(),
///     status: Status::Published,
///     upvote_count: None,
///     author_id: 7,
///     author: BelongsTo::default(),
///     cached_html: vec![],
/// }
/// .into_record();
/// assert_eq!(row.get("status"), &Value::Enum("PUBLISHED".into()));
/// assert_eq!(row.get("score"), &Value::Null);
/// assert_eq!(row.get("authorId"), &Value::Int(7));
/// assert_eq!(row.len(), 5);
/// ```
///
/// # Struct attributes
///
/// | Attribute     | Description                                             | Arg     | Required |
/// |---------------|---------------------------------------------------------|---------|----------|
/// | name          | Override the name of the entity in queries. The default is the name of the struct. | string | no |
///
/// # Field attributes
///
/// | Attribute     | Description                                             | Arg     | Required |
/// |---------------|---------------------------------------------------------|---------|----------|
/// | skip          | Do not include this field in the catalog or in rows.    | n/a     | no |
/// | rename        | Override the name of the field in queries.              | string  | no |
/// | enumeration   | Declare an enum field. The type of the field must implement `Display`, which gives the name of each variant. | n/a | no |
/// | key           | On a `BelongsTo` relation, the field of this struct holding the key of the related row. | ident | yes |
/// | inverse       | On a `HasMany` relation, the field of the target struct holding the key of this row. | ident | yes |
/// | references    | The key field referred to by `key` or `inverse`. The default is `id`. | ident | no |
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity::derive(parse_macro_input!(input)).into()
}
