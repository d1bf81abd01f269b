//! A generic GraphQL query root over a catalog and a row source.

use super::async_graphql::{self as gql, Context, Guard, Json, Object};
use super::catalog::EntityInfo;
use super::guard::RoleGuard;
use super::input::{AggregateInput, QueryArgs};
use crate::error::Error;
use crate::query::{AggregateRow, Query, QueryEvaluator, QueryOutput};
use crate::source::RowSource;
use crate::value::Record;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// The state shared by every request served by [`QueryRoot`].
#[derive(Clone)]
pub struct Backend {
    evaluator: QueryEvaluator,
    source: Arc<dyn RowSource>,
    guard: RoleGuard,
}

impl Debug for Backend {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Backend")
            .field("evaluator", &self.evaluator)
            .field("guard", &self.guard)
            .finish_non_exhaustive()
    }
}

impl Backend {
    pub fn new(evaluator: QueryEvaluator, source: impl RowSource + 'static) -> Self {
        Self {
            evaluator,
            source: Arc::new(source),
            guard: RoleGuard::default(),
        }
    }

    /// Only admit callers holding one of `roles` to the query resolvers.
    pub fn with_required_roles<I>(mut self, roles: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.guard = RoleGuard::new(roles);
        self
    }

    pub fn evaluator(&self) -> &QueryEvaluator {
        &self.evaluator
    }

    /// Evaluate `query` against the backend's row source.
    pub async fn run(&self, query: &Query) -> Result<QueryOutput, Error> {
        self.evaluator.evaluate(query, &*self.source).await
    }
}

/// The query object: catalog introspection, row selection and aggregation.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryRoot;

impl QueryRoot {
    async fn backend<'a>(ctx: &Context<'a>) -> gql::Result<&'a Backend> {
        let backend = ctx.data::<Backend>()?;
        backend.guard.check(ctx).await?;
        Ok(backend)
    }
}

#[Object]
impl QueryRoot {
    /// The entities which can be queried.
    async fn entities(&self, ctx: &Context<'_>) -> gql::Result<Vec<EntityInfo>> {
        let backend = Self::backend(ctx).await?;
        Ok(backend
            .evaluator
            .catalog()
            .entities()
            .cloned()
            .map(EntityInfo::from)
            .collect())
    }

    /// Rows of `entity` matching `args`.
    async fn find_many(
        &self,
        ctx: &Context<'_>,
        entity: String,
        #[graphql(default)] args: QueryArgs,
    ) -> gql::Result<Json<Vec<Record>>> {
        let backend = Self::backend(ctx).await?;
        let output = backend.run(&args.into_query(entity)?).await?;
        Ok(Json(output.into_rows().unwrap_or_default()))
    }

    /// Aggregates over the rows of `entity` matching `args`.
    async fn aggregate(
        &self,
        ctx: &Context<'_>,
        entity: String,
        #[graphql(default)] args: QueryArgs,
        aggregate: AggregateInput,
    ) -> gql::Result<Json<Vec<AggregateRow>>> {
        let backend = Self::backend(ctx).await?;
        let query = args.into_query(entity)?.aggregate(aggregate.into());
        let output = backend.run(&query).await?;
        Ok(Json(output.into_groups().unwrap_or_default()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::auth::Principal;
    use crate::graphql::{value, EmptyMutation, EmptySubscription, QuerySchema, Request, Schema};
    use crate::query::Quantifier;
    use crate::record;
    use crate::schema::{Catalog, EntityCatalog, EntityField, FieldType, Relation};
    use crate::source::MemorySource;
    use crate::value::Value;
    use crate::{init_logging, Config};
    use async_trait::async_trait;

    fn catalog() -> Catalog {
        Catalog::builder()
            .entity(
                EntityCatalog::new("User")
                    .with_field(EntityField::new("id", FieldType::Int))
                    .with_field(EntityField::new("name", FieldType::String))
                    .with_relation(Relation::to_many("posts", "Post", "id", "authorId")),
            )
            .entity(
                EntityCatalog::new("Post")
                    .with_field(EntityField::new("id", FieldType::Int))
                    .with_field(EntityField::new("upvoteCount", FieldType::Int).nullable())
                    .with_field(EntityField::new("flag", FieldType::Int))
                    .with_field(EntityField::new("authorId", FieldType::Int))
                    .with_relation(Relation::to_one("author", "User", "authorId", "id")),
            )
            .build()
            .unwrap()
    }

    async fn backend(config: Config) -> Backend {
        let source = MemorySource::new();
        source
            .insert_records(
                "User",
                [
                    record! { "id" => 1, "name" => "alice" },
                    record! { "id" => 2, "name" => "bob" },
                ],
            )
            .await;
        source
            .insert_records(
                "Post",
                [
                    record! { "id" => 1, "upvoteCount" => 10, "flag" => 0, "authorId" => 1 },
                    record! { "id" => 2, "upvoteCount" => 5, "flag" => 1, "authorId" => 2 },
                    record! { "id" => 3, "upvoteCount" => Value::Null, "flag" => 0, "authorId" => 1 },
                ],
            )
            .await;

        Backend::new(QueryEvaluator::new(catalog()).with_config(config), source)
    }

    async fn schema(config: Config) -> QuerySchema {
        let backend = backend(config).await;
        Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
            .data(backend)
            .finish()
    }

    #[async_std::test]
    async fn test_find_many() {
        init_logging();
        let schema = schema(Config::default()).await;

        let res = schema
            .execute(
                r#"{
                    findMany(entity: "Post", args: {
                        where: { field: { field: "flag", op: EQUALS, value: { int: 0 } } }
                        orderBy: [{ key: { field: "upvoteCount" }, direction: DESC }]
                    })
                }"#,
            )
            .await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        assert_eq!(
            res.data,
            value!({
                "findMany": [
                    { "id": 1, "upvoteCount": 10, "flag": 0, "authorId": 1 },
                    { "id": 3, "upvoteCount": null, "flag": 0, "authorId": 1 },
                ]
            })
        );
    }

    #[async_std::test]
    async fn test_relation_filter() {
        init_logging();
        let schema = schema(Config::default()).await;

        // Users with no post of 10 or more upvotes.
        let query = r#"{
            findMany(entity: "User", args: {
                where: {
                    relation: {
                        relation: "posts"
                        quantifier: NONE
                        where: [{ field: { field: "upvoteCount", op: GTE, value: { int: 10 } } }]
                    }
                }
            })
        }"#;
        let res = schema.execute(query).await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        assert_eq!(
            res.data,
            value!({ "findMany": [{ "id": 2, "name": "bob" }] })
        );

        // Without a quantifier the configured default applies.
        let query = r#"{
            findMany(entity: "User", args: {
                where: {
                    relation: {
                        relation: "posts"
                        where: [{ field: { field: "upvoteCount", op: IS_NOT_NULL } }]
                    }
                }
            })
        }"#;
        let res = schema.execute(query).await;
        assert_eq!(
            res.data,
            value!({ "findMany": [{ "id": 1, "name": "alice" }, { "id": 2, "name": "bob" }] })
        );
        let schema = schema_with_every().await;
        let res = schema.execute(query).await;
        assert_eq!(
            res.data,
            value!({ "findMany": [{ "id": 2, "name": "bob" }] })
        );
    }

    async fn schema_with_every() -> QuerySchema {
        schema(Config::default().with_to_many_quantifier(Quantifier::Every)).await
    }

    #[async_std::test]
    async fn test_sort_by_author() {
        init_logging();
        let schema = schema(Config::default()).await;

        let res = schema
            .execute(
                r#"{
                    findMany(entity: "Post", args: {
                        orderBy: [
                            { key: { relationField: { relation: "author", field: "name" } }, direction: DESC }
                            { key: { field: "id" } }
                        ]
                    })
                }"#,
            )
            .await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        assert_eq!(
            res.data,
            value!({
                "findMany": [
                    { "id": 2, "upvoteCount": 5, "flag": 1, "authorId": 2 },
                    { "id": 1, "upvoteCount": 10, "flag": 0, "authorId": 1 },
                    { "id": 3, "upvoteCount": null, "flag": 0, "authorId": 1 },
                ]
            })
        );

        let res = schema
            .execute(
                r#"{
                    findMany(entity: "User", args: {
                        orderBy: [{ key: { relationField: { relation: "posts", field: "id" } } }]
                    })
                }"#,
            )
            .await;
        assert_eq!(res.errors.len(), 1);
        assert_eq!(
            res.errors[0].message,
            "schema mismatch in User: relation posts is not to-one"
        );
    }

    #[async_std::test]
    async fn test_aggregate() {
        init_logging();
        let schema = schema(Config::default()).await;

        let res = schema
            .execute(
                r#"{
                    aggregate(
                        entity: "Post",
                        args: { where: { not: [{ field: { field: "flag", op: EQUALS, value: { int: 1 } } }] } },
                        aggregate: { count: ["_all", "upvoteCount"], avg: ["upvoteCount"] }
                    )
                }"#,
            )
            .await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        assert_eq!(
            res.data,
            value!({
                "aggregate": [{
                    "_count": { "_all": 2, "upvoteCount": 1 },
                    "_avg": { "upvoteCount": 10.0 },
                }]
            })
        );

        let res = schema
            .execute(
                r#"{
                    aggregate(entity: "Post", aggregate: { groupBy: ["authorId"], sum: ["upvoteCount"] })
                }"#,
            )
            .await;
        assert_eq!(
            res.data,
            value!({
                "aggregate": [
                    { "authorId": 1, "_sum": { "upvoteCount": 10 } },
                    { "authorId": 2, "_sum": { "upvoteCount": 5 } },
                ]
            })
        );
    }

    #[async_std::test]
    async fn test_errors() {
        init_logging();
        let schema = schema(Config::default()).await;

        let res = schema
            .execute(
                r#"{
                    findMany(entity: "Post", args: {
                        where: { field: { field: "unknownField", op: EQUALS, value: { int: 0 } } }
                    })
                }"#,
            )
            .await;
        assert_eq!(res.errors.len(), 1);
        assert_eq!(
            res.errors[0].message,
            "schema mismatch in Post: no such field unknownField"
        );

        let res = schema
            .execute(r#"{ aggregate(entity: "User", aggregate: { avg: ["name"] }) }"#)
            .await;
        assert_eq!(res.errors.len(), 1);
        assert_eq!(
            res.errors[0].message,
            "cannot compute _avg of User.name: expected a numeric field, got string"
        );
    }

    #[async_std::test]
    async fn test_entities() {
        init_logging();
        let schema = schema(Config::default()).await;

        let res = schema
            .execute(
                r#"{
                    entities {
                        name
                        fields { name type nullable relational }
                        relations { name target cardinality localKey targetKey }
                    }
                }"#,
            )
            .await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        assert_eq!(
            res.data,
            value!({
                "entities": [
                    {
                        "name": "Post",
                        "fields": [
                            { "name": "id", "type": "INT", "nullable": false, "relational": false },
                            { "name": "upvoteCount", "type": "INT", "nullable": true, "relational": false },
                            { "name": "flag", "type": "INT", "nullable": false, "relational": false },
                            { "name": "authorId", "type": "INT", "nullable": false, "relational": true },
                        ],
                        "relations": [{
                            "name": "author",
                            "target": "User",
                            "cardinality": "TO_ONE",
                            "localKey": "authorId",
                            "targetKey": "id",
                        }],
                    },
                    {
                        "name": "User",
                        "fields": [
                            { "name": "id", "type": "INT", "nullable": false, "relational": true },
                            { "name": "name", "type": "STRING", "nullable": false, "relational": false },
                        ],
                        "relations": [{
                            "name": "posts",
                            "target": "Post",
                            "cardinality": "TO_MANY",
                            "localKey": "id",
                            "targetKey": "authorId",
                        }],
                    },
                ]
            })
        );
    }

    /// A row source which cannot reach the users table.
    struct UsersDown;

    #[async_trait]
    impl RowSource for UsersDown {
        async fn fetch(&self, entity: &EntityCatalog) -> Result<Vec<Record>, Error> {
            match entity.name() {
                "User" => Err(Error::fetch("connection refused")),
                _ => Ok(vec![record! { "id" => 1, "flag" => 0, "authorId" => 1 }]),
            }
        }
    }

    #[async_std::test]
    async fn test_source_error() {
        init_logging();
        let schema = Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
            .data(Backend::new(QueryEvaluator::new(catalog()), UsersDown))
            .finish();

        let res = schema
            .execute(
                r#"{
                    findMany(entity: "Post", args: {
                        where: {
                            relation: {
                                relation: "author"
                                where: [{ field: { field: "name", op: EQUALS, value: { string: "alice" } } }]
                            }
                        }
                    })
                }"#,
            )
            .await;
        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].message, "row source error: connection refused");

        let res = schema
            .execute(r#"{ findMany(entity: "Post") }"#)
            .await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        assert_eq!(
            res.data,
            value!({ "findMany": [{ "id": 1, "upvoteCount": null, "flag": 0, "authorId": 1 }] })
        );
    }

    #[async_std::test]
    async fn test_required_roles() {
        init_logging();
        let backend = backend(Config::default()).await;
        let schema = Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
            .data(backend.with_required_roles(["reader"]))
            .finish();

        let query = r#"{ findMany(entity: "User", args: { take: 1 }) }"#;
        let res = schema.execute(query).await;
        assert_eq!(res.errors.len(), 1);
        assert_eq!(
            res.errors[0].message,
            "unauthorized: requires one of the roles [reader]"
        );

        let res = schema
            .execute(Request::new(query).data(Principal::new("u1").with_role("reader")))
            .await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        assert_eq!(
            res.data,
            value!({ "findMany": [{ "id": 1, "name": "alice" }] })
        );
    }
}
