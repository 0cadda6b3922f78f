//! In-memory storage implementation for document stores.
//!
//! Documents are kept as BSON values per collection, in insertion order, behind an
//! async-aware read-write lock. Registered indexes are kept alongside: unique indexes
//! are enforced on every write and text indexes drive [`Filter::text`] searches.
//!
//! [`Filter::text`]: blogstore_core::query::Filter::text

use std::{collections::{BTreeMap, HashMap}, sync::Arc};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document as FieldMap, Uuid};
use tracing::debug;

use blogstore_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    entity::IndexSpec,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query, SortDirection},
};

use crate::evaluator::{Comparable, DocumentEvaluator};

type StoreMap = BTreeMap<String, CollectionData>;

/// One collection: documents in insertion order plus its registered indexes.
#[derive(Debug, Default)]
struct CollectionData {
    /// insertion sequence -> document
    documents: BTreeMap<u64, Bson>,
    /// document id -> insertion sequence
    positions: HashMap<String, u64>,
    next_position: u64,
    indexes: Vec<IndexSpec>,
}

impl CollectionData {
    fn iter(&self) -> impl Iterator<Item = &Bson> {
        self.documents.values()
    }

    fn get(&self, key: &str) -> Option<&Bson> {
        self.positions
            .get(key)
            .and_then(|position| self.documents.get(position))
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut Bson> {
        self.positions
            .get(key)
            .and_then(|position| self.documents.get_mut(position))
    }

    fn contains(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    fn push(&mut self, key: String, document: Bson) {
        let position = self.next_position;
        self.next_position += 1;

        self.positions.insert(key, position);
        self.documents.insert(position, document);
    }

    fn remove(&mut self, key: &str) -> Option<Bson> {
        self.positions
            .remove(key)
            .and_then(|position| self.documents.remove(&position))
    }

    fn text_fields(&self) -> Vec<String> {
        self.indexes
            .iter()
            .filter(|index| index.is_text())
            .flat_map(|index| index.field_names().map(str::to_string))
            .collect()
    }

    fn matching(&self, filter: Option<&Expr>) -> DocumentStoreResult<Vec<&Bson>> {
        let Some(filter) = filter else {
            return Ok(self.iter().collect());
        };

        let text_fields = self.text_fields();
        let mut matched = Vec::new();

        for document in self.iter() {
            if DocumentEvaluator::matches(document, filter, &text_fields)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }

    /// Fails if `document` would share the key of a unique index with a stored document
    /// other than itself, or with one of `pending`. Stored documents that `pending`
    /// replaces are compared by their pending version.
    fn check_unique(
        &self,
        collection: &str,
        key: &str,
        document: &Bson,
        pending: &[(String, Bson)],
    ) -> DocumentStoreResult<()> {
        for index in self.indexes.iter().filter(|index| index.unique) {
            let candidate = unique_key(index, document);

            let stored = self.positions
                .iter()
                .filter(|(other, _)| other.as_str() != key)
                .filter(|(other, _)| !pending.iter().any(|(replaced, _)| replaced == *other))
                .filter_map(|(_, position)| self.documents.get(position));
            let batch = pending
                .iter()
                .filter(|(other, _)| other != key)
                .map(|(_, document)| document);

            if stored.chain(batch).any(|other| unique_key(index, other) == candidate) {
                return Err(DocumentStoreError::DuplicateKey(
                    index.field_names().collect::<Vec<_>>().join(", "),
                    collection.to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Values of the indexed fields; a missing field keys as null.
fn unique_key(index: &IndexSpec, document: &Bson) -> Vec<Bson> {
    index
        .field_names()
        .map(|field| {
            document
                .as_document()
                .and_then(|fields| fields.get(field))
                .cloned()
                .unwrap_or(Bson::Null)
        })
        .collect()
}

fn sort_key<'a>(document: &'a Bson, field: &str) -> Comparable<'a> {
    document
        .as_document()
        .and_then(|fields| fields.get(field))
        .map(Comparable::from)
        .unwrap_or(Comparable::Null)
}

fn sort_documents(documents: &mut [&Bson], field: &str, direction: SortDirection) {
    documents.sort_by(|a, b| {
        let (left, right) = (sort_key(a, field), sort_key(b, field));

        match direction {
            SortDirection::Asc => left.sort_cmp(&right),
            SortDirection::Desc => right.sort_cmp(&left),
        }
    });
}

/// Applies sort, offset and limit to the documents matching the query, and reports how
/// many matched before the window was cut.
fn run_query(data: &CollectionData, query: &Query) -> DocumentStoreResult<(Vec<Bson>, u64)> {
    let mut documents = data.matching(query.filter.as_ref())?;
    let total = documents.len() as u64;

    if let Some(sort) = &query.sort {
        sort_documents(&mut documents, &sort.field, sort.direction);
    }

    Ok((
        documents
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect(),
        total,
    ))
}


/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// Without a sort, queries return documents in insertion order.
///
/// # Performance
///
/// Queries and unique checks scan the whole collection. This is meant for development,
/// tests and small datasets; use the MongoDB backend for anything larger.
///
/// # Example
///
/// ```ignore
/// use blogstore_memory::InMemoryStore;
/// use blogstore::backend::StoreBackend;
/// use bson::{Uuid, Bson, doc};
///
/// let store = InMemoryStore::new();
///
/// let id = Uuid::new();
/// let doc = Bson::Document(doc! { "id": id, "username": "alice" });
/// store.insert_documents(vec![(id, doc)], "users").await?;
///
/// let docs = store.get_documents(vec![id], "users").await?;
/// assert_eq!(docs.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection_name -> collection data
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}


#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let data = store
            .entry(collection.to_string())
            .or_default();

        let mut pending: Vec<(String, Bson)> = Vec::with_capacity(documents.len());

        // Check the whole batch first so a rejected batch leaves nothing behind.
        for (id, doc) in documents {
            let key = id.to_string();

            if data.contains(&key) || pending.iter().any(|(other, _)| other == &key) {
                return Err(DocumentStoreError::DocumentAlreadyExists(key, collection.to_string()));
            }

            data.check_unique(collection, &key, &doc, &pending)?;
            pending.push((key, doc));
        }

        debug!(collection, count = pending.len(), "Inserting documents");

        for (key, doc) in pending {
            data.push(key, doc);
        }

        Ok(())
    }

    async fn update_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(0);
        };

        let mut replacements: Vec<(String, Bson)> = Vec::with_capacity(documents.len());

        for (id, doc) in documents {
            let key = id.to_string();

            if data.contains(&key) {
                data.check_unique(collection, &key, &doc, &replacements)?;
                replacements.push((key, doc));
            }
        }

        let replaced = replacements.len() as u64;

        for (key, doc) in replacements {
            if let Some(slot) = data.get_mut(&key) {
                *slot = doc;
            }
        }

        Ok(replaced)
    }

    async fn set_fields(&self, id: Uuid, fields: FieldMap, collection: &str) -> DocumentStoreResult<bool> {
        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(false);
        };

        let key = id.to_string();
        let Some(current) = data.get(&key) else {
            return Ok(false);
        };

        let mut updated = current
            .as_document()
            .cloned()
            .ok_or_else(|| DocumentStoreError::InvalidDocument(format!(
                "stored document {key} in {collection} is not a map"
            )))?;
        for (field, value) in fields {
            updated.insert(field, value);
        }

        let updated = Bson::Document(updated);
        data.check_unique(collection, &key, &updated, &[])?;

        if let Some(slot) = data.get_mut(&key) {
            *slot = updated;
        }

        Ok(true)
    }

    async fn set_many(&self, changes: Vec<(Uuid, FieldMap)>, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(0);
        };

        let mut matched = 0;
        let mut updates: Vec<(String, Bson)> = Vec::with_capacity(changes.len());

        for (id, fields) in changes {
            let key = id.to_string();

            // A later change to the same id applies on top of the earlier one.
            let base = match updates.iter().position(|(other, _)| other == &key) {
                Some(at) => updates.remove(at).1,
                None => match data.get(&key) {
                    Some(current) => current.clone(),
                    None => continue,
                },
            };

            let mut updated = base
                .as_document()
                .cloned()
                .ok_or_else(|| DocumentStoreError::InvalidDocument(format!(
                    "stored document {key} in {collection} is not a map"
                )))?;
            for (field, value) in fields {
                updated.insert(field, value);
            }

            matched += 1;
            updates.push((key, Bson::Document(updated)));
        }

        // Check the whole change set before writing any of it.
        for (key, document) in &updates {
            data.check_unique(collection, key, document, &updates)?;
        }

        debug!(collection, count = updates.len(), "Setting fields");

        for (key, document) in updates {
            if let Some(slot) = data.get_mut(&key) {
                *slot = document;
            }
        }

        Ok(matched)
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(0);
        };

        Ok(ids
            .into_iter()
            .filter(|id| data.remove(&id.to_string()).is_some())
            .count() as u64)
    }

    async fn delete_matching(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(0);
        };

        let text_fields = data.text_fields();
        let mut doomed = Vec::new();

        for (key, position) in &data.positions {
            if let Some(document) = data.documents.get(position) {
                if DocumentEvaluator::matches(document, &filter, &text_fields)? {
                    doomed.push(key.clone());
                }
            }
        }

        for key in &doomed {
            data.remove(key);
        }

        debug!(collection, deleted = doomed.len(), "Deleted matching documents");

        Ok(doomed.len() as u64)
    }

    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let store = self.store.read().await;
        let Some(data) = store.get(collection) else {
            return Ok(vec![]);
        };

        let wanted = ids
            .iter()
            .map(Uuid::to_string)
            .filter_map(|key| data.positions.get(&key).copied())
            .collect::<Vec<_>>();

        Ok(data.documents
            .iter()
            .filter(|(position, _)| wanted.contains(*position))
            .map(|(_, document)| document.clone())
            .collect())
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        Ok(self
            .query_page(query, collection)
            .await?
            .0)
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;

        match store.get(collection) {
            Some(data) => Ok(data.matching(filter.as_ref())?.len() as u64),
            None => Ok(0),
        }
    }

    async fn query_page(&self, query: Query, collection: &str) -> DocumentStoreResult<(Vec<Bson>, u64)> {
        let store = self.store.read().await;

        match store.get(collection) {
            Some(data) => run_query(data, &query),
            None => Ok((vec![], 0)),
        }
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        if store.remove(name).is_none() {
            return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
        }

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        Ok(
            self.store
                .read()
                .await
                .keys()
                .cloned()
                .collect()
        )
    }

    async fn add_index(&self, collection: &str, index: &IndexSpec) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let data = store
            .entry(collection.to_string())
            .or_default();

        if data.indexes.iter().any(|existing| existing.name() == index.name()) {
            return Ok(());
        }

        if index.is_text() && data.indexes.iter().any(IndexSpec::is_text) {
            return Err(DocumentStoreError::Backend(format!(
                "collection {collection} already has a text index"
            )));
        }

        if index.unique {
            let mut seen = Vec::new();

            for document in data.iter() {
                let key = unique_key(index, document);

                if seen.contains(&key) {
                    return Err(DocumentStoreError::DuplicateKey(
                        index.field_names().collect::<Vec<_>>().join(", "),
                        collection.to_string(),
                    ));
                }

                seen.push(key);
            }
        }

        debug!(collection, index = %index.name(), unique = index.unique, "Created index");
        data.indexes.push(index.clone());

        Ok(())
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
///
/// ```ignore
/// use blogstore_memory::InMemoryStore;
/// use blogstore::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogstore_core::query::Filter;
    use bson::doc;

    fn user(username: &str, email: &str) -> (Uuid, Bson) {
        let id = Uuid::new();

        (id, Bson::Document(doc! { "id": id, "username": username, "email": email }))
    }

    async fn users_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.add_index("users", &IndexSpec::unique("email")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn insert_then_get_by_id() {
        let store = InMemoryStore::new();
        let (id, doc) = user("ada", "ada@example.com");

        store.insert_documents(vec![(id, doc.clone())], "users").await.unwrap();

        assert_eq!(store.get_documents(vec![id], "users").await.unwrap(), vec![doc]);
        assert!(store.get_documents(vec![Uuid::new()], "users").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = InMemoryStore::new();
        let (id, doc) = user("ada", "ada@example.com");

        store.insert_documents(vec![(id, doc.clone())], "users").await.unwrap();
        let err = store.insert_documents(vec![(id, doc)], "users").await.unwrap_err();

        assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(..)));
    }

    #[tokio::test]
    async fn unique_index_rejects_whole_batch() {
        let store = users_store().await;
        let batch = vec![
            user("ada", "ada@example.com"),
            user("bob", "bob@example.com"),
            user("ada2", "ada@example.com"),
        ];

        let err = store.insert_documents(batch, "users").await.unwrap_err();

        assert!(matches!(err, DocumentStoreError::DuplicateKey(..)));
        assert_eq!(store.count_documents(None, "users").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unique_index_guards_partial_updates() {
        let store = users_store().await;
        let (ada, ada_doc) = user("ada", "ada@example.com");
        let (bob, bob_doc) = user("bob", "bob@example.com");
        store.insert_documents(vec![(ada, ada_doc), (bob, bob_doc)], "users").await.unwrap();

        let err = store
            .set_fields(bob, doc! { "email": "ada@example.com" }, "users")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::DuplicateKey(..)));

        // Rewriting a document with its own key is fine.
        assert!(store.set_fields(ada, doc! { "email": "ada@example.com", "username": "ada" }, "users").await.unwrap());
    }

    #[tokio::test]
    async fn rejected_change_set_writes_nothing() {
        let store = users_store().await;
        let (ada, ada_doc) = user("ada", "ada@example.com");
        let (bob, bob_doc) = user("bob", "bob@example.com");
        store
            .insert_documents(vec![(ada, ada_doc.clone()), (bob, bob_doc.clone())], "users")
            .await
            .unwrap();

        let changes = vec![
            (ada, doc! { "email": "same@example.com" }),
            (bob, doc! { "email": "same@example.com" }),
        ];
        let err = store.set_many(changes, "users").await.unwrap_err();

        assert!(matches!(err, DocumentStoreError::DuplicateKey(..)));
        assert_eq!(
            store.get_documents(vec![ada, bob], "users").await.unwrap(),
            vec![ada_doc, bob_doc]
        );
    }

    #[tokio::test]
    async fn change_set_may_swap_unique_keys() {
        let store = users_store().await;
        let (ada, ada_doc) = user("ada", "ada@example.com");
        let (bob, bob_doc) = user("bob", "bob@example.com");
        store.insert_documents(vec![(ada, ada_doc), (bob, bob_doc)], "users").await.unwrap();

        let changes = vec![
            (ada, doc! { "email": "bob@example.com" }),
            (bob, doc! { "email": "ada@example.com" }),
            (Uuid::new(), doc! { "email": "ghost@example.com" }),
        ];

        assert_eq!(store.set_many(changes, "users").await.unwrap(), 2);

        let stored = store.get_documents(vec![ada], "users").await.unwrap();
        assert_eq!(stored[0].as_document().unwrap().get_str("email").unwrap(), "bob@example.com");
    }

    #[tokio::test]
    async fn unique_index_creation_fails_on_existing_duplicates() {
        let store = InMemoryStore::new();
        store
            .insert_documents(vec![user("a", "x@example.com"), user("b", "x@example.com")], "users")
            .await
            .unwrap();

        let err = store.add_index("users", &IndexSpec::unique("email")).await.unwrap_err();

        assert!(matches!(err, DocumentStoreError::DuplicateKey(..)));
    }

    #[tokio::test]
    async fn set_fields_keeps_other_fields() {
        let store = InMemoryStore::new();
        let (id, doc) = user("ada", "ada@example.com");
        store.insert_documents(vec![(id, doc)], "users").await.unwrap();

        assert!(store.set_fields(id, doc! { "username": "lovelace" }, "users").await.unwrap());
        assert!(!store.set_fields(Uuid::new(), doc! { "username": "x" }, "users").await.unwrap());

        let stored = store.get_documents(vec![id], "users").await.unwrap();
        let fields = stored[0].as_document().unwrap();
        assert_eq!(fields.get_str("username").unwrap(), "lovelace");
        assert_eq!(fields.get_str("email").unwrap(), "ada@example.com");
    }

    #[tokio::test]
    async fn deletes_report_counts_and_are_idempotent() {
        let store = InMemoryStore::new();
        let (id, doc) = user("ada", "ada@example.com");
        store
            .insert_documents(vec![(id, doc), user("bob", "bob@example.com"), user("bo", "bo@example.com")], "users")
            .await
            .unwrap();

        assert_eq!(store.delete_documents(vec![id], "users").await.unwrap(), 1);
        assert_eq!(store.delete_documents(vec![id], "users").await.unwrap(), 0);
        assert_eq!(store.delete_matching(Filter::starts_with("username", "bo"), "users").await.unwrap(), 2);
        assert_eq!(store.delete_documents(vec![id], "missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unsorted_queries_follow_insertion_order() {
        let store = InMemoryStore::new();
        let batch = (0..5)
            .map(|n| user(&format!("user{n}"), &format!("user{n}@example.com")))
            .collect::<Vec<_>>();
        let expected = batch.iter().map(|(_, doc)| doc.clone()).collect::<Vec<_>>();
        store.insert_documents(batch, "users").await.unwrap();

        let (window, total) = store
            .query_page(Query::builder().offset(1).limit(2).build(), "users")
            .await
            .unwrap();

        assert_eq!(total, 5);
        assert_eq!(window, expected[1..3].to_vec());
    }

    #[tokio::test]
    async fn sorting_puts_missing_values_first() {
        let store = InMemoryStore::new();
        let docs = vec![
            (Uuid::new(), Bson::Document(doc! { "n": 2 })),
            (Uuid::new(), Bson::Document(doc! { "n": Bson::Null })),
            (Uuid::new(), Bson::Document(doc! { "n": 1 })),
        ];
        store.insert_documents(docs, "numbers").await.unwrap();

        let sorted = store
            .query_documents(Query::builder().sort("n", SortDirection::Asc).build(), "numbers")
            .await
            .unwrap();
        let values = sorted
            .iter()
            .map(|doc| doc.as_document().unwrap().get("n").cloned().unwrap())
            .collect::<Vec<_>>();

        assert_eq!(values, vec![Bson::Null, Bson::Int32(1), Bson::Int32(2)]);
    }

    #[tokio::test]
    async fn text_search_uses_text_index_fields() {
        let store = InMemoryStore::new();
        store.add_index("articles", &IndexSpec::text(["title", "content"])).await.unwrap();
        store
            .insert_documents(
                vec![
                    (Uuid::new(), Bson::Document(doc! { "title": "Async Rust", "content": "tasks", "slug": "tokio" })),
                    (Uuid::new(), Bson::Document(doc! { "title": "Gardening", "content": "soil", "slug": "rust" })),
                ],
                "articles",
            )
            .await
            .unwrap();

        assert_eq!(store.count_documents(Some(Filter::text("rust")), "articles").await.unwrap(), 1);
        assert_eq!(store.count_documents(Some(Filter::text("tokio")), "articles").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn collections_can_be_listed_and_dropped() {
        let store = InMemoryStore::builder().build().await.unwrap();
        store.create_collection("users").await.unwrap();
        store.create_collection("articles").await.unwrap();

        assert_eq!(store.list_collections().await.unwrap(), vec!["articles", "users"]);

        store.drop_collection("users").await.unwrap();
        assert!(matches!(
            store.drop_collection("users").await,
            Err(DocumentStoreError::CollectionNotFound(_))
        ));
    }
}
