//! Error types and result types for document store operations.
//!
//! This module provides error handling for every layer of the store: entity validation,
//! CRUD dispatch, and the storage backends underneath.
//! Use [`DocumentStoreResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use validator::ValidationErrors;

/// Represents all possible errors that can occur when interacting with a document store.
///
/// Validation, lookup and dispatch failures are raised by the core before anything is
/// written. [`DocumentStoreError::Backend`] carries failures of the underlying store and
/// is surfaced unchanged; the core never retries.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An entity violates its field constraints (length, range, format, required value).
    #[error("Validation error: {0}")]
    Validation(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// A write would break a unique index.
    /// The first argument describes the violated index, the second is the collection name.
    #[error("Duplicate key for unique index ({0}) in collection {1}")]
    DuplicateKey(String, String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// A lifecycle method name is not recognized for the entity kind.
    /// The first argument is the method name, the second is the collection name.
    #[error("Unknown method '{0}' for collection {1}")]
    UnknownMethod(String, String),
    /// An update request does not name an actionable combination of target and change.
    #[error("Invalid update: {0}")]
    InvalidUpdate(String),
    /// The document has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for document store operations.
///
/// This type alias is used throughout the crate to indicate operations that may fail
/// with a [`DocumentStoreError`].
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl DocumentStoreError {
    /// Returns `true` for errors raised by entity constraints.
    pub fn is_validation(&self) -> bool {
        matches!(self, DocumentStoreError::Validation(_))
    }

    /// Returns `true` when a lookup matched nothing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentStoreError::DocumentNotFound(..))
    }
}

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<ValidationErrors> for DocumentStoreError {
    fn from(err: ValidationErrors) -> Self {
        DocumentStoreError::Validation(err.to_string())
    }
}
