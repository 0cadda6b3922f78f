use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, Bson, Uuid, doc};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, IndexOptions},
};
use tracing::{debug, info};

use blogstore_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    entity::{IndexKind, IndexSpec},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query, QueryVisitor, SortDirection},
};

use crate::{sanitizer::ValueSanitizer, query::MongoQueryTranslator};

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == DUPLICATE_KEY,
        ErrorKind::InsertMany(insert) => insert
            .write_errors
            .as_ref()
            .is_some_and(|errors| errors.iter().any(|write| write.code == DUPLICATE_KEY)),
        ErrorKind::Command(command) => command.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Maps a driver error, surfacing unique index violations as
/// [`DocumentStoreError::DuplicateKey`].
fn backend_error(collection: &str) -> impl Fn(MongoError) -> DocumentStoreError + '_ {
    move |err| {
        if is_duplicate_key(&err) {
            DocumentStoreError::DuplicateKey(err.to_string(), collection.to_string())
        } else {
            DocumentStoreError::Backend(err.to_string())
        }
    }
}

fn index_keys(index: &IndexSpec) -> Document {
    index
        .fields
        .iter()
        .map(|field| {
            (
                ValueSanitizer::sanitize_string(&field.name),
                match field.kind {
                    IndexKind::Asc => Bson::Int32(1),
                    IndexKind::Desc => Bson::Int32(-1),
                    IndexKind::Text => Bson::String("text".to_string()),
                },
            )
        })
        .collect()
}


/// MongoDB document storage backend.
///
/// Documents are stored with their id duplicated into `_id`, so lookups by id use the
/// primary index. Without a sort, queries are ordered by `_id`.
///
/// Change sets (`set_many`) are applied one document at a time.
#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(&ValueSanitizer::sanitize_string(collection_name))
    }

    fn prepare_document(&self, id: &Uuid, document: &Bson) -> DocumentStoreResult<Document> {
        Ok(Document::from_iter(
            ValueSanitizer::sanitize_value(document)
                .as_document()
                .cloned()
                .ok_or_else(|| DocumentStoreError::InvalidDocument("Expected document".into()))?
                .into_iter()
                .chain([("_id".to_string(), Bson::from(*id))]),
        ))
    }

    fn restore_document(&self, document: Document) -> Bson {
        ValueSanitizer::restore_value(&Bson::Document(
            document
                .into_iter()
                .filter(|(k, _)| k != "_id")
                .collect(),
        ))
    }

    fn filter(expr: Option<&Expr>) -> DocumentStoreResult<Document> {
        match expr {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }

    async fn close(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;
        info!(database = %self.database, "Closed MongoDB client");

        Ok(())
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let result = self.get_collection(collection)
            .insert_many(
                documents
                    .iter()
                    .map(|(id, doc)| self.prepare_document(id, doc))
                    .collect::<DocumentStoreResult<Vec<Document>>>()?,
            )
            .await
            .map_err(backend_error(collection))?;

        debug!(collection, count = result.inserted_ids.len(), "Inserted documents");

        Ok(())
    }

    async fn update_documents(&self, documents: Vec<(Uuid, Bson)>, collection: &str) -> DocumentStoreResult<u64> {
        let target = self.get_collection(collection);
        let mut replaced = 0;

        for (id, doc) in documents {
            replaced += target
                .replace_one(doc! { "_id": id }, self.prepare_document(&id, &doc)?)
                .await
                .map_err(backend_error(collection))?
                .matched_count;
        }

        Ok(replaced)
    }

    async fn set_fields(&self, id: Uuid, fields: Document, collection: &str) -> DocumentStoreResult<bool> {
        Ok(self.get_collection(collection)
            .update_one(
                doc! { "_id": id },
                doc! { "$set": ValueSanitizer::sanitize_document(&fields) },
            )
            .await
            .map_err(backend_error(collection))?
            .matched_count > 0)
    }

    async fn delete_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<u64> {
        Ok(self.get_collection(collection)
            .delete_many(doc! { "_id": { "$in": ids } })
            .await
            .map_err(backend_error(collection))?
            .deleted_count)
    }

    async fn delete_matching(&self, filter: Expr, collection: &str) -> DocumentStoreResult<u64> {
        Ok(self.get_collection(collection)
            .delete_many(Self::filter(Some(&filter))?)
            .await
            .map_err(backend_error(collection))?
            .deleted_count)
    }

    async fn get_documents(&self, ids: Vec<Uuid>, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        Ok(
            self.get_collection(collection)
                .find(doc! { "_id": { "$in": ids } })
                .sort(doc! { "_id": 1 })
                .await
                .map_err(backend_error(collection))?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(backend_error(collection))?
                .into_iter()
                .map(|doc| self.restore_document(doc))
                .collect()
        )
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Bson>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(skip) = query.offset {
            options.skip = Some(skip as u64);
        }
        options.sort = Some(match &query.sort {
            Some(sort) => {
                let field = ValueSanitizer::sanitize_string(&sort.field);

                doc! {
                    field: match sort.direction {
                        SortDirection::Asc => 1,
                        SortDirection::Desc => -1,
                    },
                    "_id": 1,
                }
            },
            None => doc! { "_id": 1 },
        });

        Ok(
            self.get_collection(collection)
                .find(Self::filter(query.filter.as_ref())?)
                .with_options(options)
                .await
                .map_err(backend_error(collection))?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(backend_error(collection))?
                .into_iter()
                .map(|doc| self.restore_document(doc))
                .collect()
        )
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(Self::filter(filter.as_ref())?)
            .await
            .map_err(backend_error(collection))
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.client
            .database(&self.database)
            .create_collection(&ValueSanitizer::sanitize_string(name))
            .await
            .map_err(backend_error(name))?;

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        self.get_collection(name)
            .drop()
            .await
            .map_err(backend_error(name))?;

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        Ok(
            self.client
                .database(&self.database)
                .list_collection_names()
                .await
                .map_err(|e| DocumentStoreError::Backend(e.to_string()))?
                .iter()
                .map(|name| ValueSanitizer::restore_string(name))
                .collect()
        )
    }

    async fn add_index(&self, collection: &str, index: &IndexSpec) -> DocumentStoreResult<()> {
        self.get_collection(collection)
            .create_index(
                IndexModel::builder()
                .keys(index_keys(index))
                .options(
                    IndexOptions::builder()
                    .name(index.name())
                    .unique(index.unique)
                    .build()
                )
                .build()
            )
            .await
            .map_err(backend_error(collection))?;

        debug!(collection, index = %index.name(), unique = index.unique, "Created index");

        Ok(())
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.close().await
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let client = Client::with_options(
            ClientOptions::parse(&self.dsn)
                .await
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
        )
        .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        info!(database = %self.database, "Connected MongoDB client");

        Ok(MongoDbStore::new(client, self.database))
    }
}
