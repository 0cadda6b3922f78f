//! Typed collection handles over a storage backend.
//!
//! A [`TypedCollection`] binds a backend to one [`Document`] type and converts between
//! typed documents and their BSON form. It performs raw reads and writes: entity hooks and
//! validation live one level up, in the [CRUD dispatcher](crate::crud).
//!
//! # Example
//!
//! ```ignore
//! # async fn example(store: &blogstore::store::DocumentStore<impl blogstore::backend::StoreBackend>) -> blogstore::error::DocumentStoreResult<()> {
//! let users = store.typed_collection::<User>();
//! let page = users
//!     .paginate(PageRequest::new(2, 10)?, Some(Filter::eq("is_active", true)), None)
//!     .await?;
//! # Ok(()) }
//! ```

use bson::{Bson, Document as FieldMap, Uuid};
use std::marker::PhantomData;

use crate::{
    backend::StoreBackend,
    document::{Document, DocumentExt},
    error::DocumentStoreResult,
    page::{Page, PageRequest},
    query::{Expr, Filter, Query, Sort},
};

#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, D: Document> {
    name: String,
    backend: &'a B,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend, D: Document> TypedCollection<'a, B, D> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend, _marker: PhantomData }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn encode(documents: &[D]) -> DocumentStoreResult<Vec<(Uuid, Bson)>> {
        documents
            .iter()
            .map(|d| d.to_bson().map(|b| (*d.id(), b)))
            .collect()
    }

    fn decode(documents: Vec<Bson>) -> DocumentStoreResult<Vec<D>> {
        documents
            .into_iter()
            .map(D::from_bson)
            .collect()
    }

    /// Inserts new documents into the collection.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if the operation fails.
    /// The batch may be partially applied when the backend fails part way.
    pub async fn insert(&self, documents: &[D]) -> DocumentStoreResult<()> {
        self.backend
            .insert_documents(Self::encode(documents)?, self.name())
            .await
    }

    /// Replaces existing documents, matched by id.
    ///
    /// # Returns
    ///
    /// The number of documents replaced. Documents that no longer exist are skipped.
    pub async fn replace(&self, documents: &[D]) -> DocumentStoreResult<u64> {
        self.backend
            .update_documents(Self::encode(documents)?, self.name())
            .await
    }

    /// Sets fields on several documents at once, keyed by id.
    ///
    /// # Returns
    ///
    /// The number of changes that matched a stored document.
    pub async fn set_many(&self, changes: Vec<(Uuid, FieldMap)>) -> DocumentStoreResult<u64> {
        self.backend
            .set_many(changes, self.name())
            .await
    }

    /// Deletes documents from the collection by their IDs.
    ///
    /// # Returns
    ///
    /// The number of documents deleted.
    pub async fn delete(&self, ids: Vec<Uuid>) -> DocumentStoreResult<u64> {
        self.backend
            .delete_documents(ids, self.name())
            .await
    }

    /// Deletes every document matching the filter.
    pub async fn delete_matching(&self, filter: Expr) -> DocumentStoreResult<u64> {
        self.backend
            .delete_matching(filter, self.name())
            .await
    }

    /// Retrieves documents by their IDs. Missing ids are omitted from the results.
    pub async fn get(&self, ids: Vec<Uuid>) -> DocumentStoreResult<Vec<D>> {
        Self::decode(
            self.backend
                .get_documents(ids, self.name())
                .await?,
        )
    }

    /// Retrieves one document by id.
    pub async fn find_by_id(&self, id: Uuid) -> DocumentStoreResult<Option<D>> {
        Ok(self
            .get(vec![id])
            .await?
            .into_iter()
            .next())
    }

    /// Retrieves the first document matching the filter.
    pub async fn find_one(&self, filter: Expr) -> DocumentStoreResult<Option<D>> {
        Ok(self
            .query(Query::builder().filter(filter).limit(1).build())
            .await?
            .into_iter()
            .next())
    }

    /// Queries documents in the collection using a structured query.
    pub async fn query(&self, query: Query) -> DocumentStoreResult<Vec<D>> {
        Self::decode(
            self.backend
                .query_documents(query, self.name())
                .await?,
        )
    }

    /// Counts documents matching the filter; `None` counts the whole collection.
    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.backend
            .count_documents(filter, self.name())
            .await
    }

    /// Returns one page of the documents matching `filter`.
    ///
    /// Skips `(page - 1) * limit` documents and returns at most `limit`, together with the
    /// total number of matching documents. A page past the end is empty but still reports
    /// the total. Without `sort` the backend's stable default order is used.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Validation`](crate::error::DocumentStoreError::Validation)
    /// if the request has a zero page or limit.
    pub async fn paginate(
        &self,
        request: PageRequest,
        filter: Option<Expr>,
        sort: Option<Sort>,
    ) -> DocumentStoreResult<Page<D>> {
        request.validate()?;

        let query = Query::builder()
            .maybe_filter(filter.filter(|expr| !expr.matches_all()))
            .maybe_sort(sort)
            .offset(request.offset())
            .limit(request.limit)
            .build();

        let (documents, total) = self.backend
            .query_page(query, self.name())
            .await?;

        Ok(Page::new(Self::decode(documents)?, total, request.page, request.limit))
    }

    /// Checks whether a document with the given id exists.
    pub async fn contains(&self, id: Uuid) -> DocumentStoreResult<bool> {
        Ok(self.count(Some(Filter::id(id))).await? > 0)
    }
}
