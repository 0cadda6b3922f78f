//! Convenient re-exports of commonly used types from blogstore.
//!
//! ```ignore
//! use blogstore::prelude::*;
//! ```
//!
//! This provides access to:
//! - Document and entity traits
//! - The store, its CRUD dispatcher and back references
//! - Store backends and builders
//! - Query construction, filtering and pagination
//! - Error types

pub use blogstore_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    backref::BackRefs,
    collection::TypedCollection,
    crud::{CreateInput, Created, Crud, DeleteTarget, UpdateRequest},
    document::{Document, DocumentExt},
    entity::{Entity, EntityMethod, IndexKind, IndexSpec, WriteEvent},
    error::{DocumentStoreError, DocumentStoreResult},
    page::{Page, PageRequest},
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    store::{DocumentStore, DynDocumentStore},
};
