//! Storage backend abstraction for the document store.
//!
//! This module defines the traits that abstract over storage implementations, so the
//! CRUD dispatcher can run unchanged against an in-memory map or a MongoDB deployment.
//!
//! # Overview
//!
//! The [`StoreBackend`] trait provides a unified async interface for every storage operation
//! the core needs: bulk insertion, replacement and partial updates by id, deletion by id or
//! by filter, filtered queries with skip/limit/count, and collection/index management.
//! Implementations are required to be thread-safe (`Send + Sync`) and support concurrent access.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`DynStoreBackend`]: A trait for dynamic dispatch over backend implementations
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use blogstore::backend::StoreBackend;
//! use bson::{Uuid, Bson, doc};
//!
//! let backend = MyBackendImpl::new();
//!
//! let uuid = Uuid::new();
//! let doc = Bson::Document(doc! { "id": uuid, "username": "alice" });
//! backend.insert_documents(vec![(uuid, doc)], "users").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document as FieldMap, Uuid};
use std::fmt::Debug;

use crate::{
    entity::IndexSpec,
    error::DocumentStoreResult,
    query::{Expr, Query},
};

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple
/// async tasks. The core adds no locking of its own: concurrent writes to the same document
/// resolve with whatever semantics the backend offers (typically last write wins).
///
/// # Error Handling
///
/// Operations return [`DocumentStoreResult<T>`](crate::error::DocumentStoreResult).
/// Connectivity and query failures are reported as
/// [`DocumentStoreError::Backend`](crate::error::DocumentStoreError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts new documents into a collection.
    ///
    /// # Arguments
    ///
    /// * `documents` - A vector of (UUID, BSON document) pairs to insert
    /// * `collection` - The name of the collection to insert into. Created automatically if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Fails if a document with the same id exists or a unique index would be violated.
    /// Backends are not required to make the batch atomic; callers that need all-or-nothing
    /// semantics compensate for partial inserts themselves.
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()>;

    /// Replaces existing documents in a collection, matched by id.
    ///
    /// Documents whose id is not present are skipped.
    ///
    /// # Returns
    ///
    /// The number of documents that were replaced.
    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<u64>;

    /// Sets the given fields on one document, leaving every other field untouched.
    ///
    /// # Returns
    ///
    /// `true` if a document with the id exists, `false` otherwise.
    async fn set_fields(
        &self,
        id: Uuid,
        fields: FieldMap,
        collection: &str,
    ) -> DocumentStoreResult<bool>;

    /// Sets fields on several documents, each identified by its id.
    ///
    /// Ids without a stored document are skipped.
    ///
    /// # Returns
    ///
    /// The number of changes that matched a stored document.
    ///
    /// # Note
    ///
    /// The default implementation applies the changes one at a time, so a failing change
    /// leaves the earlier ones written. Backends that can check and apply the whole set at
    /// once should override it.
    async fn set_many(
        &self,
        changes: Vec<(Uuid, FieldMap)>,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        let mut matched = 0;

        for (id, fields) in changes {
            if self.set_fields(id, fields, collection).await? {
                matched += 1;
            }
        }

        Ok(matched)
    }

    /// Deletes documents from a collection by their IDs.
    ///
    /// Missing ids are skipped.
    ///
    /// # Returns
    ///
    /// The number of documents that were deleted.
    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<u64>;

    /// Deletes every document matching the filter.
    ///
    /// # Returns
    ///
    /// The number of documents that were deleted.
    async fn delete_matching(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64>;

    /// Retrieves documents from a collection by their IDs.
    ///
    /// Documents are returned in store order (not request order).
    /// If a document ID doesn't exist, it is simply omitted from the results.
    async fn get_documents(
        &self,
        ids: Vec<Uuid>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Queries documents in a collection using a structured query.
    ///
    /// Without a sort, documents come back in a backend-defined order that is stable
    /// as long as the collection is not modified.
    ///
    /// # See Also
    ///
    /// - [`Query`] for constructing queries
    /// - [`crate::query::Filter`] for building filter expressions
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;

    /// Counts the documents matching the filter, or every document when no filter is given.
    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<u64>;

    /// Runs a query and counts every document matching its filter, ignoring offset and limit.
    ///
    /// The default implementation issues the count and the query back to back. Backends that
    /// can evaluate both against one snapshot should override it.
    async fn query_page(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<(Vec<Bson>, u64)> {
        let total = self
            .count_documents(query.filter.clone(), collection)
            .await?;
        let documents = self
            .query_documents(query, collection)
            .await?;

        Ok((documents, total))
    }

    /// Creates a new, empty collection.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Drops a collection and all its documents.
    ///
    /// # Warning
    ///
    /// This operation is irreversible.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Creates a secondary index on a collection.
    ///
    /// Creating an index that already exists is not an error.
    ///
    /// # Note
    ///
    /// If the index is unique and existing documents violate it, the backend may return an error.
    async fn add_index(&self, collection: &str, index: &IndexSpec) -> DocumentStoreResult<()>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op; backends holding connections override it.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Object-safe mirror of [`StoreBackend`], for choosing a backend at runtime.
///
/// Every [`StoreBackend`] implements it; `Box<dyn DynStoreBackend>` in turn implements
/// [`StoreBackend`], so a boxed backend plugs into the same generic code.
#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()>;
    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<u64>;
    async fn set_fields(
        &self,
        id: Uuid,
        fields: FieldMap,
        collection: &str,
    ) -> DocumentStoreResult<bool>;
    async fn set_many(
        &self,
        changes: Vec<(Uuid, FieldMap)>,
        collection: &str,
    ) -> DocumentStoreResult<u64>;
    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<u64>;
    async fn delete_matching(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64>;
    async fn get_documents(
        &self,
        ids: Vec<Uuid>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>>;
    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<u64>;
    async fn query_page(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<(Vec<Bson>, u64)>;
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;
    async fn add_index(&self, collection: &str, index: &IndexSpec) -> DocumentStoreResult<()>;
    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()>;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        StoreBackend::insert_documents(self, documents, collection).await
    }

    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        StoreBackend::update_documents(self, documents, collection).await
    }

    async fn set_fields(
        &self,
        id: Uuid,
        fields: FieldMap,
        collection: &str,
    ) -> DocumentStoreResult<bool> {
        StoreBackend::set_fields(self, id, fields, collection).await
    }

    async fn set_many(
        &self,
        changes: Vec<(Uuid, FieldMap)>,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        StoreBackend::set_many(self, changes, collection).await
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::delete_documents(self, ids, collection).await
    }

    async fn delete_matching(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        StoreBackend::delete_matching(self, filter, collection).await
    }

    async fn get_documents(
        &self,
        ids: Vec<Uuid>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        StoreBackend::get_documents(self, ids, collection).await
    }

    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        StoreBackend::query_documents(self, query, collection).await
    }

    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        StoreBackend::count_documents(self, filter, collection).await
    }

    async fn query_page(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<(Vec<Bson>, u64)> {
        StoreBackend::query_page(self, query, collection).await
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::create_collection(self, name).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        StoreBackend::drop_collection(self, name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        StoreBackend::list_collections(self).await
    }

    async fn add_index(&self, collection: &str, index: &IndexSpec) -> DocumentStoreResult<()> {
        StoreBackend::add_index(self, collection, index).await
    }

    async fn shutdown_boxed(self: Box<Self>) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(*self).await
    }
}

#[async_trait]
impl StoreBackend for Box<dyn DynStoreBackend> {
    async fn insert_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        DynStoreBackend::insert_documents(self.as_ref(), documents, collection).await
    }

    async fn update_documents(
        &self,
        documents: Vec<(Uuid, Bson)>,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        DynStoreBackend::update_documents(self.as_ref(), documents, collection).await
    }

    async fn set_fields(
        &self,
        id: Uuid,
        fields: FieldMap,
        collection: &str,
    ) -> DocumentStoreResult<bool> {
        DynStoreBackend::set_fields(self.as_ref(), id, fields, collection).await
    }

    async fn set_many(
        &self,
        changes: Vec<(Uuid, FieldMap)>,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        DynStoreBackend::set_many(self.as_ref(), changes, collection).await
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<u64> {
        DynStoreBackend::delete_documents(self.as_ref(), ids, collection).await
    }

    async fn delete_matching(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        DynStoreBackend::delete_matching(self.as_ref(), filter, collection).await
    }

    async fn get_documents(
        &self,
        ids: Vec<Uuid>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        DynStoreBackend::get_documents(self.as_ref(), ids, collection).await
    }

    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Bson>> {
        DynStoreBackend::query_documents(self.as_ref(), query, collection).await
    }

    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        DynStoreBackend::count_documents(self.as_ref(), filter, collection).await
    }

    async fn query_page(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<(Vec<Bson>, u64)> {
        DynStoreBackend::query_page(self.as_ref(), query, collection).await
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        DynStoreBackend::create_collection(self.as_ref(), name).await
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        DynStoreBackend::drop_collection(self.as_ref(), name).await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        DynStoreBackend::list_collections(self.as_ref()).await
    }

    async fn add_index(&self, collection: &str, index: &IndexSpec) -> DocumentStoreResult<()> {
        DynStoreBackend::add_index(self.as_ref(), collection, index).await
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        <dyn DynStoreBackend as DynStoreBackend>::shutdown_boxed(self).await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
