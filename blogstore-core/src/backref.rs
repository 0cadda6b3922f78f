//! Lazy one-to-many back references.
//!
//! A child document refers to its parent by storing the parent's id in a field; the
//! parent does not list its children. [`BackRefs`] describes "every child whose `field`
//! equals this parent id" without running anything. The query executes only when one of
//! [`fetch`](BackRefs::fetch), [`count`](BackRefs::count), [`page`](BackRefs::page) or
//! [`stream`](BackRefs::stream) is called, and each call reflects the store at that moment.
//!
//! ```ignore
//! let comments = article.comments(&store);
//! let first = comments.page(PageRequest::new(1, 20)?).await?;
//! let total = comments.count().await?;
//! ```

use bson::Uuid;
use futures::{Stream, TryStreamExt, stream};

use crate::{
    backend::StoreBackend,
    collection::TypedCollection,
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
    page::{Page, PageRequest},
    query::{Expr, Filter, Query, Sort},
};

/// Field every entity stamps with its creation time; the default child order.
pub const CREATED_AT_FIELD: &str = "created_at";

/// The children of one parent, resolved lazily.
#[derive(Debug)]
pub struct BackRefs<'a, B: StoreBackend, C: Document> {
    collection: TypedCollection<'a, B, C>,
    field: String,
    parent: Uuid,
    sort: Sort,
    filter: Option<Expr>,
}

impl<'a, B: StoreBackend, C: Document> BackRefs<'a, B, C> {
    /// Children in `collection` whose `field` holds `parent`, oldest first.
    pub fn new(collection: TypedCollection<'a, B, C>, field: impl Into<String>, parent: Uuid) -> Self {
        Self {
            collection,
            field: field.into(),
            parent,
            sort: Sort::asc(CREATED_AT_FIELD),
            filter: None,
        }
    }

    /// Orders the children by `sort` instead of creation time.
    pub fn sorted_by(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    /// Narrows the children further.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// The id of the parent these children point to.
    pub fn parent(&self) -> Uuid {
        self.parent
    }

    /// The child field holding the parent id.
    pub fn field(&self) -> &str {
        &self.field
    }

    fn expr(&self) -> Expr {
        let link = Filter::eq(self.field.clone(), self.parent);

        match &self.filter {
            Some(filter) => link.and(filter.clone()),
            None => link,
        }
    }

    fn window(&self, offset: usize, limit: usize) -> Query {
        Query::builder()
            .filter(self.expr())
            .sort(self.sort.field.clone(), self.sort.direction)
            .offset(offset)
            .limit(limit)
            .build()
    }

    /// Loads every child.
    pub async fn fetch(&self) -> DocumentStoreResult<Vec<C>> {
        self.collection
            .query(
                Query::builder()
                    .filter(self.expr())
                    .sort(self.sort.field.clone(), self.sort.direction)
                    .build(),
            )
            .await
    }

    /// Counts the children.
    pub async fn count(&self) -> DocumentStoreResult<u64> {
        self.collection
            .count(Some(self.expr()))
            .await
    }

    /// Loads one page of children.
    pub async fn page(&self, request: PageRequest) -> DocumentStoreResult<Page<C>> {
        self.collection
            .paginate(request, Some(self.expr()), Some(self.sort.clone()))
            .await
    }

    /// Streams the children, fetching `batch_size` of them per round trip.
    ///
    /// A `batch_size` of zero is treated as one.
    pub fn stream(self, batch_size: usize) -> impl Stream<Item = DocumentStoreResult<C>> + 'a {
        let batch_size = batch_size.max(1);

        stream::try_unfold((self, 0usize, false), move |(refs, offset, done)| async move {
            if done {
                return Ok::<_, DocumentStoreError>(None);
            }

            let batch = refs.collection
                .query(refs.window(offset, batch_size))
                .await?;

            if batch.is_empty() {
                return Ok(None);
            }

            let exhausted = batch.len() < batch_size;
            let next = offset + batch.len();

            Ok(Some((batch, (refs, next, exhausted))))
        })
        .map_ok(|batch| stream::iter(batch.into_iter().map(Ok)))
        .try_flatten()
    }
}
