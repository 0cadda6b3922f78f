//! Core traits for document representation and serialization.
//!
//! This module provides the fundamental trait that all stored documents implement,
//! as well as utilities for converting documents between BSON, JSON and field maps.

use bson::{Bson, Document as FieldMap, Uuid, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};
use serde_json::{Value, from_value, to_value};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Name of the field every document stores its identifier under.
pub const ID_FIELD: &str = "id";

/// Core trait that all documents stored in a document store must implement.
///
/// Every document has a unique, server-assigned identifier (UUID) and names the collection
/// it belongs to.
///
/// # Example
///
/// ```ignore
/// use blogstore::document::Document;
/// use bson::Uuid;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Tag {
///     pub id: Uuid,
///     pub label: String,
/// }
///
/// impl Document for Tag {
///     fn id(&self) -> &Uuid {
///         &self.id
///     }
///
///     fn collection_name() -> &'static str {
///         "tags"
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns a reference to this document's unique identifier.
    fn id(&self) -> &Uuid;

    /// Returns the name of the collection this document belongs to.
    ///
    /// This should be a static, lowercase identifier (e.g., "users", "articles").
    fn collection_name() -> &'static str;
}

/// Extension trait providing serialization utilities for documents.
///
/// This trait is automatically implemented for all types that implement [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document to a BSON value for storage.
    fn to_bson(&self) -> DocumentStoreResult<Bson>;

    /// Creates a document from a BSON value.
    fn from_bson(bson: Bson) -> DocumentStoreResult<Self>;

    /// Converts this document to its field map.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the document does not serialize
    /// to a BSON document.
    fn to_field_map(&self) -> DocumentStoreResult<FieldMap>;

    /// Converts this document to a JSON value.
    fn to_json(&self) -> DocumentStoreResult<Value>;

    /// Creates a document from a JSON value.
    fn from_json(value: Value) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson(&self) -> DocumentStoreResult<Bson> {
        Ok(serialize_to_bson(self)?)
    }

    fn from_bson(bson: Bson) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(bson)?)
    }

    fn to_field_map(&self) -> DocumentStoreResult<FieldMap> {
        match self.to_bson()? {
            Bson::Document(map) => Ok(map),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "Expected a document for collection {}, got {:?}",
                D::collection_name(),
                other.element_type(),
            ))),
        }
    }

    fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> DocumentStoreResult<Self> {
        Ok(from_value(value)?)
    }
}
