//! Seeds a blog store with a handful of users, an article and a short comment thread.
//!
//! The backend is chosen with `BLOGSTORE_BACKEND` (`memory` or `mongodb`); MongoDB
//! connection settings come from the environment or a `.env` file.
//!
//! Logs go to the terminal and to a daily rotated file:
//!
//! | Variable           | Default   |
//! |--------------------|-----------|
//! | `LOG_LEVEL`        | `info`    |
//! | `LOG_LOG_FILE`     | `app.log` |
//! | `LOG_BACKUP_COUNT` | `3`       |

use std::path::Path;

use anyhow::{Context, bail};
use bson::doc;
use dotenvy::dotenv;
use tracing::info;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use blogstore::{
    memory::InMemoryStore,
    models::{self, Article, Comment, User},
    mongodb::MongoDbSettings,
    prelude::*,
};

const BACKEND_VAR: &str = "BLOGSTORE_BACKEND";
const DEFAULT_LOG_FILE: &str = "app.log";
const DEFAULT_BACKUP_COUNT: usize = 3;

/// Installs the terminal and file log layers. Keep the guard alive until exit so buffered
/// file output is flushed.
fn init_logging() -> anyhow::Result<WorkerGuard> {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let log_file = std::env::var("LOG_LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let backup_count = match std::env::var("LOG_BACKUP_COUNT") {
        Ok(count) => count
            .trim()
            .parse::<usize>()
            .with_context(|| format!("LOG_BACKUP_COUNT must be a number, got {count:?}"))?,
        Err(_) => DEFAULT_BACKUP_COUNT,
    };

    let path = Path::new(&log_file);
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("LOG_LOG_FILE must name a file, got {log_file:?}"))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name)
        .max_log_files(backup_count + 1)
        .build(directory)
        .with_context(|| format!("opening log file {log_file}"))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();

    Ok(guard)
}

async fn connect() -> anyhow::Result<DynDocumentStore> {
    let backend = std::env::var(BACKEND_VAR).unwrap_or_else(|_| "memory".to_string());

    match backend.trim().to_lowercase().as_str() {
        "memory" => {
            info!("Using in-memory store");

            Ok(DocumentStore::new(InMemoryStore::new()).into_dyn())
        },
        "mongodb" => {
            let settings = MongoDbSettings::from_env()?;
            let store = settings
                .builder()
                .build()
                .await
                .with_context(|| format!("connecting to MongoDB at {}:{}", settings.host, settings.port))?;

            info!(host = %settings.host, port = settings.port, database = %settings.database, "Connected to MongoDB");

            Ok(DocumentStore::new(store).into_dyn())
        },
        other => bail!("{BACKEND_VAR} must be `memory` or `mongodb`, got {other:?}"),
    }
}

/// Drops the blog collections left over from a previous run.
async fn reset(store: &DynDocumentStore) -> anyhow::Result<()> {
    let existing = store.list_collections().await?;

    for name in [User::collection_name(), Article::collection_name(), Comment::collection_name()] {
        if existing.iter().any(|collection| collection == name) {
            store.drop_collection(name).await?;
            info!(collection = name, "Dropped collection");
        }
    }

    Ok(())
}

fn print_json<D: DocumentExt>(label: &str, documents: &[D]) -> anyhow::Result<()> {
    let values = documents
        .iter()
        .map(DocumentExt::to_json)
        .collect::<DocumentStoreResult<Vec<_>>>()?;

    println!("{label}: {}", serde_json::to_string_pretty(&values)?);

    Ok(())
}

async fn seed(store: &DynDocumentStore) -> anyhow::Result<()> {
    let users = store.crud::<User>();

    let devops = users
        .create_one(doc! {
            "username": "devops_ninja",
            "email": "devops.ninja@example.com",
            "age": 34,
            "bio": "DevOps engineer specializing in CI/CD pipelines and infrastructure as code.",
        })
        .await?;
    users
        .create_one(doc! {
            "username": "sarahsmith",
            "email": "sarah.smith@example.com",
            "age": 34,
            "bio": "Data scientist with a passion for machine learning and AI.",
        })
        .await?;
    info!(id = %devops.id, "Inserted users");

    let patched = users
        .patch_many(Filter::matching(doc! { "age": 34 }), doc! { "age": 30 })
        .await?;
    println!("patched users aged 34: {patched}");

    let batch = users
        .create_many(vec![
            doc! {
                "username": "alex_developer",
                "email": "alex.dev@example.com",
                "age": 22,
                "bio": "CS student and aspiring full-stack developer.",
            },
            doc! {
                "username": "tech_enthusiast",
                "email": "tech.fan@example.com",
                "age": 45,
                "bio": "Technology enthusiast and blogger.",
            },
        ])
        .await?;
    print_json("inserted", &batch)?;

    let articles = store.crud::<Article>();
    let article = articles
        .insert(
            Article::new(batch[0].id, "Learning document stores", "Notes from my first week with MongoDB.")
                .with_tags(["MongoDB", "databases", "mongodb "]),
        )
        .await?;
    articles.invoke(article.id, "publish").await?;

    let comments = store.crud::<Comment>();
    let question = comments
        .insert(Comment::new(article.id, batch[1].id, "Which driver did you use?"))
        .await?;
    comments
        .insert(Comment::new(article.id, batch[0].id, "The official one.").replying_to(question.id))
        .await?;

    let thread = article.comments(store).fetch().await?;
    print_json("comments", &thread)?;

    let deleted = users
        .delete(DeleteTarget::Filter(Filter::eq("email", "devops.ninja@example.com")))
        .await?;
    println!("deleted devops_ninja: {deleted}");

    let deleted = users
        .delete(DeleteTarget::Filter(Filter::matching(doc! { "age": 34 })))
        .await?;
    println!("deleted users aged 34: {deleted}");

    let remaining = users
        .paginate_sorted(PageRequest::default(), None, Sort::asc("username"))
        .await?;
    println!("{} user(s) remain", remaining.total);
    print_json("users", &remaining.items)?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let _log_guard = init_logging()?;

    let store = connect().await?;

    reset(&store).await?;
    models::init(&store).await?;

    seed(&store).await?;

    store.shutdown().await?;

    Ok(())
}
