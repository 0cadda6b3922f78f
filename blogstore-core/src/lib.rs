//! A typed data-access layer over JSON document databases.
//!
//! This crate is the core of the blogstore project and provides:
//!
//! - **Document traits** ([`document`]) - Core traits for defining and serializing documents
//! - **Entity kinds** ([`entity`]) - Constraints, write hooks, indexes and lifecycle methods
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different storage backends
//! - **Query and filtering API** ([`query`]) - Type-safe query construction and filtering
//! - **Collections interface** ([`collection`]) - Raw typed access to one collection
//! - **CRUD dispatch** ([`crud`]) - Generic create/read/update/delete over any entity kind
//! - **Back references** ([`backref`]) - Lazy parent to children lookups
//! - **Pagination** ([`page`]) - Page requests and result windows
//! - **Document store** ([`store`]) - Main interface tying the above to one backend
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use blogstore::document::Document;
//! use bson::Uuid;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Tag {
//!     pub id: Uuid,
//!     pub label: String,
//! }
//!
//! impl Document for Tag {
//!     fn id(&self) -> &Uuid {
//!         &self.id
//!     }
//!
//!     fn collection_name() -> &'static str {
//!         "tags"
//!     }
//! }
//! ```

pub mod backend;
pub mod backref;
pub mod collection;
pub mod crud;
pub mod document;
pub mod entity;
pub mod error;
pub mod page;
pub mod query;
pub mod store;
