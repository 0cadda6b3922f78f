//! Main document store interface for interacting with document backends.
//!
//! [`DocumentStore`] owns a backend and hands out the typed views over it:
//!
//! - [`DocumentStore::typed_collection`] - raw typed reads and writes for one document type
//! - [`DocumentStore::crud`] - the hooked and validated CRUD dispatcher for one entity kind
//! - [`DocumentStore::back_refs`] - lazy one-to-many lookups from a parent to its children
//!
//! Entity kinds must be [registered](DocumentStore::register) once at startup so their
//! collection and indexes exist before the first request.
//!
//! # Example
//!
//! ```ignore
//! use blogstore::store::DocumentStore;
//!
//! let store = DocumentStore::new(backend);
//! store.register::<User>().await?;
//!
//! let user = store.crud::<User>().create_one(doc! { "username": "ada", ... }).await?;
//! ```

use bson::Uuid;
use tracing::{debug, info};

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    backref::BackRefs,
    collection::TypedCollection,
    crud::Crud,
    document::Document,
    entity::Entity,
    error::DocumentStoreResult,
};

/// A document store bound to a specific backend implementation.
///
/// The store is `Send + Sync` whenever the backend is; share it across tasks behind an
/// `Arc`.
///
/// # Type Parameters
///
/// * `B` - The backend implementation type
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

/// A document store whose backend is chosen at runtime.
pub type DynDocumentStore = DocumentStore<Box<dyn DynStoreBackend>>;

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// The backend underneath this store.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gets a typed collection for the specified document type.
    ///
    /// The collection name is determined by the document type's `collection_name()` method.
    pub fn typed_collection<'a, D: Document>(&'a self) -> TypedCollection<'a, B, D> {
        TypedCollection::new(D::collection_name().to_string(), &self.backend)
    }

    /// Gets the CRUD dispatcher for the entity kind `E`.
    pub fn crud<'a, E: Entity>(&'a self) -> Crud<'a, B, E> {
        Crud::new(self.typed_collection::<E>())
    }

    /// Describes the `C` documents whose `field` refers to `parent`.
    ///
    /// Nothing is queried until the returned [`BackRefs`] is consumed.
    pub fn back_refs<'a, C: Document>(&'a self, field: &str, parent: Uuid) -> BackRefs<'a, B, C> {
        BackRefs::new(self.typed_collection::<C>(), field, parent)
    }

    /// Prepares the storage for the entity kind `E`.
    ///
    /// Creates the collection unless it already exists, then creates every index the kind
    /// declares. Safe to call again on an initialized store.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot create the collection or one of its indexes,
    /// e.g. when existing documents already break a unique index.
    pub async fn register<E: Entity>(&self) -> DocumentStoreResult<()> {
        let name = E::collection_name();

        if !self.list_collections().await?.iter().any(|existing| existing == name) {
            self.backend.create_collection(name).await?;
            debug!(collection = name, "Created collection");
        }

        let indexes = E::indexes();
        for index in &indexes {
            self.backend.add_index(name, index).await?;
        }

        info!(collection = name, indexes = indexes.len(), "Registered entity kind");

        Ok(())
    }

    /// Creates a new collection with the given name.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection already exists or creation fails.
    pub async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend
            .create_collection(name)
            .await
    }

    /// Drops a collection with the given name, along with its documents and indexes.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection does not exist or deletion fails.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.backend.drop_collection(name).await
    }

    /// Lists all collections in the store.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Erases the backend type, so stores built on different backends share one type.
    pub fn into_dyn(self) -> DynDocumentStore
    where
        B: 'static,
    {
        DocumentStore::new(Box::new(self.backend))
    }

    /// Shuts down the store and releases backend resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown operation fails.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await?;

        Ok(())
    }
}
