//! In-memory document storage backend for blogstore.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development,
//! testing, and small-scale deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Type-erased storage** - Stores documents as BSON, in insertion order
//! - **Full query support** - Filtering, free-text search, sorting and pagination
//! - **Unique indexes** - Enforced on every insert, replace and partial update
//!
//! # Quick Start
//!
//! ```ignore
//! use blogstore::{memory::InMemoryStore, models::{self, User}, store::DocumentStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::new());
//!     models::init(&store).await?;
//!
//!     let users = store.crud::<User>();
//!     let ada = users
//!         .create_one(bson::doc! { "username": "ada", "email": "ada@example.com" })
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod store;
mod evaluator;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
