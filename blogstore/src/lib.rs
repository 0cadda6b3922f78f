//! A typed data-access layer for a small blogging platform.
//!
//! This crate is the primary entry point of the blogstore project. It re-exports the core
//! types from the sub-crates, defines the blog entity kinds in [`models`], and gives access
//! to the storage backends.
//!
//! # Features
//!
//! - **Entity kinds** - Users, articles and threaded comments with validation and write hooks
//! - **Generic CRUD** - One dispatcher for every kind: create, get, paginate, update, delete
//! - **Pagination** - Bounded windows with totals and page navigation
//! - **Back references** - Lazy article to comments and comment to replies lookups
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use blogstore::{prelude::*, memory::InMemoryStore, models::{self, Article, User}};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::new());
//!     models::init(&store).await?;
//!
//!     let ada = store
//!         .crud::<User>()
//!         .create_one(doc! { "username": "ada", "email": "ada@example.com" })
//!         .await?;
//!
//!     let articles = store.crud::<Article>();
//!     let draft = articles
//!         .insert(Article::new(ada.id, "Notes", "On the analytical engine").with_tags(["Math", "math "]))
//!         .await?;
//!     articles.invoke(draft.id, "publish").await?;
//!
//!     let page = articles
//!         .paginate(PageRequest::new(1, 10)?, Some(Filter::eq("status", "published")))
//!         .await?;
//!     println!("{} published article(s)", page.total);
//!
//!     store.shutdown().await
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! When the backend is only known at runtime, erase it with [`DocumentStore::into_dyn`]:
//!
//! ```ignore
//! let store: DynDocumentStore = if use_mongo {
//!     DocumentStore::new(MongoDbSettings::from_env()?.builder().build().await?).into_dyn()
//! } else {
//!     DocumentStore::new(InMemoryStore::new()).into_dyn()
//! };
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires the `mongodb` feature)
//!
//! [`DocumentStore::into_dyn`]: store::DocumentStore::into_dyn

pub mod models;
pub mod prelude;

pub use blogstore_core::{backend, backref, collection, crud, document, entity, error, page, query, store};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use blogstore_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use blogstore_mongodb::{MongoDbSettings, MongoDbStore, MongoDbStoreBuilder};
}
