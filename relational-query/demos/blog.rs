use clap::Parser;
use derive_more::Display;
use relational_query::prelude::*;

////////////////////////////////////////////////////////////////////////////////////////////////////
// Schema
//

#[derive(Clone, Debug, Entity)]
pub struct User {
    id: i64,
    name: String,
    #[entity(inverse(author_id))]
    posts: HasMany<Post>,
}

#[derive(Clone, Copy, Debug, Display)]
pub enum Status {
    #[display(fmt = "DRAFT")]
    Draft,
    #[display(fmt = "PUBLISHED")]
    Published,
}

#[derive(Clone, Debug, Entity)]
pub struct Post {
    id: i64,
    title: String,
    #[entity(enumeration)]
    status: Status,
    /// Net votes from readers. Drafts have not been voted on.
    upvote_count: Option<i32>,
    author_id: i64,
    #[entity(key(author_id))]
    author: BelongsTo<User>,
    #[entity(inverse(post_id))]
    comments: HasMany<Comment>,
}

#[derive(Clone, Debug, Entity)]
pub struct Comment {
    id: i64,
    body: String,
    flagged: bool,
    post_id: i64,
    #[entity(key(post_id))]
    post: BelongsTo<Post>,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// Test data
//

#[derive(Clone, Debug, Parser)]
pub struct Options {
    /// The quantifier for filters on to-many relations which don't specify one.
    #[clap(long, env = "BLOG_TO_MANY_QUANTIFIER", value_enum)]
    to_many_quantifier: Option<Quantifier>,
    /// A GraphQL query to run. If not given, the schema is printed instead.
    #[clap(long, env = "BLOG_QUERY")]
    query: Option<String>,
}

pub async fn schema(opt: &Options) -> QuerySchema {
    let catalog = Catalog::builder()
        .register::<User>()
        .register::<Post>()
        .register::<Comment>()
        .build()
        .unwrap();
    let mut config = Config::default();
    if let Some(quantifier) = opt.to_many_quantifier {
        config = config.with_to_many_quantifier(quantifier);
    }
    let backend = Backend::new(
        QueryEvaluator::new(catalog).with_config(config),
        create_db().await,
    );
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .data(backend)
        .finish()
}

pub async fn create_db() -> MemorySource {
    let db = MemorySource::new();
    db.insert([
        User {
            id: 1,
            name: "Jeff".into(),
            posts: Default::default(),
        },
        User {
            id: 2,
            name: "Annie".into(),
            posts: Default::default(),
        },
        User {
            id: 3,
            name: "Abed".into(),
            posts: Default::default(),
        },
    ])
    .await;

    let post = |id, title: &str, status, upvote_count, author_id| Post {
        id,
        title: title.into(),
        status,
        upvote_count,
        author_id,
        author: Default::default(),
        comments: Default::default(),
    };
    db.insert([
        post(1, "History of Something", Status::Published, Some(12), 1),
        post(2, "Principles of Intermediate", Status::Published, Some(30), 2),
        post(3, "Studyology", Status::Draft, None, 2),
        post(4, "Learning!", Status::Published, Some(7), 3),
    ])
    .await;

    let comment = |id, post_id, body: &str, flagged| Comment {
        id,
        body: body.into(),
        flagged,
        post_id,
        post: Default::default(),
    };
    db.insert([
        comment(1, 1, "Great read", false),
        comment(2, 2, "spam spam spam", true),
        comment(3, 2, "Fascinating", false),
        comment(4, 4, "Agreed", false),
    ])
    .await;

    db
}

#[async_std::main]
async fn main() {
    relational_query::init_logging();
    let opt = Options::parse();
    let schema = schema(&opt).await;
    match &opt.query {
        Some(query) => {
            let res = schema.execute(query.as_str()).await;
            println!("{}", serde_json::to_string_pretty(&res).unwrap());
        }
        None => println!("{}", schema.sdl()),
    }
}
