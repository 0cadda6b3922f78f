//! MongoDB backend implementation for blogstore.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait,
//! enabling persistent document storage using MongoDB's query engine.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! blogstore = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to a self-hosted or managed MongoDB deployment
//! - **Full query support** - Filters, sorting and `$text` search run inside MongoDB
//! - **Indexing** - Entity indexes, including unique and text indexes, become MongoDB indexes
//! - **Environment configuration** - [`MongoDbSettings`] reads the connection from the environment
//!
//! # Example
//!
//! ```ignore
//! use blogstore::{backend::StoreBackendBuilder, mongodb::MongoDbSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbSettings::from_env()?
//!         .builder()
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod store;
mod query;
mod sanitizer;

pub use config::MongoDbSettings;
pub use store::{MongoDbStore, MongoDbStoreBuilder};
