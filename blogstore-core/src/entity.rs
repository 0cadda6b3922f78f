//! Entity kinds: documents with constraints, write hooks, indexes and lifecycle methods.
//!
//! An [`Entity`] is a [`Document`] that the CRUD dispatcher can manage. Each kind declares
//!
//! - its field constraints, through [`validator::Validate`] plus [`Entity::normalize`],
//! - a pre-write hook ([`Entity::before_write`]) run on every insert and update,
//! - the secondary indexes the backend must create ([`Entity::indexes`]),
//! - a closed set of named lifecycle methods ([`Entity::Method`]).
//!
//! # Example
//!
//! ```ignore
//! impl Entity for Tag {
//!     type Method = TagMethod;
//!
//!     fn indexes() -> Vec<IndexSpec> {
//!         vec![IndexSpec::unique("label")]
//!     }
//!
//!     fn before_write(&mut self, event: WriteEvent, now: DateTime) {
//!         stamp_timestamps(&mut self.created_at, &mut self.updated_at, event, now);
//!     }
//! }
//! ```

use bson::DateTime;
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, str::FromStr};
use validator::Validate;

use crate::{
    document::Document,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// The kind of write a pre-write hook runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEvent {
    /// The document is about to be inserted for the first time.
    Insert,
    /// The document already exists and is about to be rewritten.
    Update,
}

/// A document kind managed by the generic CRUD dispatcher.
pub trait Entity: Document + Validate + Debug {
    /// Lifecycle methods callers can invoke by name on a stored entity.
    type Method: EntityMethod<Self>;

    /// Secondary indexes the storage layer must create for this kind.
    fn indexes() -> Vec<IndexSpec>;

    /// Fields a patch may not set, on top of `id` and `created_at`.
    ///
    /// Fields that only lifecycle methods or the pre-write hook may change belong here.
    fn immutable_fields() -> &'static [&'static str] {
        &[]
    }

    /// Brings fields into canonical form before validation.
    ///
    /// Implementations may reject values that cannot be canonicalized.
    fn normalize(&mut self) -> DocumentStoreResult<()> {
        Ok(())
    }

    /// Pre-write hook, invoked by the write path right before a document is committed.
    fn before_write(&mut self, event: WriteEvent, now: DateTime);

    /// Normalizes the entity, then checks its constraints.
    fn check(&mut self) -> DocumentStoreResult<()> {
        self.normalize()?;
        self.validate()?;

        Ok(())
    }

    /// Runs the pre-write hook and checks the result, in the order the write path does.
    fn prepare(&mut self, event: WriteEvent, now: DateTime) -> DocumentStoreResult<()> {
        self.before_write(event, now);
        self.check()
    }
}

/// A closed set of named operations on an entity kind.
///
/// Methods are resolved from their name with [`FromStr`]; unknown names are rejected
/// with [`DocumentStoreError::UnknownMethod`] instead of being ignored.
pub trait EntityMethod<E>:
    FromStr<Err = DocumentStoreError> + Copy + Debug + Send + Sync + 'static
{
    /// The canonical name of this method.
    fn name(&self) -> &'static str;

    /// Applies the method to the entity in place.
    fn apply(&self, entity: &mut E);
}

/// Builds the error returned for an unrecognized method name on `E`.
pub fn unknown_method<E: Document>(name: &str) -> DocumentStoreError {
    DocumentStoreError::UnknownMethod(name.to_string(), E::collection_name().to_string())
}

/// Stamps the created/updated timestamps shared by every entity kind.
///
/// `created_at` is set once, by the first insert, and never changes afterwards.
/// `updated_at` is refreshed on every write.
pub fn stamp_timestamps(
    created_at: &mut Option<DateTime>,
    updated_at: &mut Option<DateTime>,
    event: WriteEvent,
    now: DateTime,
) {
    if event == WriteEvent::Insert && created_at.is_none() {
        *created_at = Some(now);
    }

    *updated_at = Some(now);
}

/// Key direction of one field in an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    Asc,
    Desc,
    /// Part of a free-text index.
    Text,
}

/// One field of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexField {
    pub name: String,
    pub kind: IndexKind,
}

/// A secondary index over one or more fields.
///
/// ```ignore
/// IndexSpec::single("email").with_unique(true);
/// IndexSpec::compound([("author", IndexKind::Asc), ("status", IndexKind::Desc)]);
/// IndexSpec::text(["title", "content"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub fields: Vec<IndexField>,
    pub unique: bool,
}

impl IndexSpec {
    /// An ascending index on a single field.
    pub fn single(field: impl Into<String>) -> Self {
        Self::compound([(field, IndexKind::Asc)])
    }

    /// A unique ascending index on a single field.
    pub fn unique(field: impl Into<String>) -> Self {
        Self::single(field).with_unique(true)
    }

    /// An index over several fields, each with its own direction.
    pub fn compound<S: Into<String>>(fields: impl IntoIterator<Item = (S, IndexKind)>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, kind)| IndexField { name: name.into(), kind })
                .collect(),
            unique: false,
        }
    }

    /// A free-text index over the given fields.
    pub fn text<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self::compound(
            fields
                .into_iter()
                .map(|name| (name, IndexKind::Text)),
        )
    }

    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// Whether this is a free-text index.
    pub fn is_text(&self) -> bool {
        self.fields
            .iter()
            .any(|field| field.kind == IndexKind::Text)
    }

    /// The indexed field names, in key order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(|field| field.name.as_str())
    }

    /// A stable name for the index, e.g. `author_1_status_-1` or `title_text_content_text`.
    pub fn name(&self) -> String {
        self.fields
            .iter()
            .map(|field| match field.kind {
                IndexKind::Asc => format!("{}_1", field.name),
                IndexKind::Desc => format!("{}_-1", field.name),
                IndexKind::Text => format!("{}_text", field.name),
            })
            .collect::<Vec<_>>()
            .join("_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_names_follow_key_order_and_direction() {
        assert_eq!(IndexSpec::single("email").name(), "email_1");
        assert_eq!(
            IndexSpec::compound([("author", IndexKind::Asc), ("status", IndexKind::Desc)]).name(),
            "author_1_status_-1"
        );
        assert_eq!(IndexSpec::text(["title", "content"]).name(), "title_text_content_text");
    }

    #[test]
    fn only_text_indexes_report_text() {
        assert!(IndexSpec::text(["title"]).is_text());
        assert!(!IndexSpec::unique("email").is_text());
        assert!(IndexSpec::unique("email").unique);
    }

    #[test]
    fn created_at_is_stamped_once() {
        let first = DateTime::from_millis(1_000);
        let second = DateTime::from_millis(2_000);
        let (mut created_at, mut updated_at) = (None, None);

        stamp_timestamps(&mut created_at, &mut updated_at, WriteEvent::Insert, first);
        stamp_timestamps(&mut created_at, &mut updated_at, WriteEvent::Update, second);
        stamp_timestamps(&mut created_at, &mut updated_at, WriteEvent::Insert, second);

        assert_eq!(created_at, Some(first));
        assert_eq!(updated_at, Some(second));
    }
}
