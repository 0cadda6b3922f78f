use bson::{DateTime, Uuid};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

use blogstore_core::{
    backend::StoreBackend,
    backref::BackRefs,
    document::Document,
    entity::{Entity, EntityMethod, IndexKind, IndexSpec, WriteEvent, stamp_timestamps, unknown_method},
    error::{DocumentStoreError, DocumentStoreResult},
    store::DocumentStore,
};

/// Content a comment keeps after it has been soft deleted.
pub const DELETED_PLACEHOLDER: &str = "[This comment has been deleted]";

/// A comment on an [`Article`](crate::models::Article), optionally replying to another
/// comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Comment {
    #[serde(default = "Uuid::new")]
    pub id: Uuid,
    pub article: Uuid,
    pub author: Uuid,
    /// The comment this one replies to; `None` for root comments.
    #[serde(default)]
    pub parent_comment: Option<Uuid>,
    #[validate(length(min = 1, max = 1000, message = "content must be 1-1000 characters"))]
    pub content: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default)]
    pub created_at: Option<DateTime>,
    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

impl Comment {
    pub fn new(article: Uuid, author: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new(),
            article,
            author,
            parent_comment: None,
            content: content.into(),
            is_deleted: false,
            is_edited: false,
            created_at: None,
            updated_at: None,
        }
    }

    /// Makes this comment a reply to `parent`.
    pub fn replying_to(mut self, parent: Uuid) -> Self {
        self.parent_comment = Some(parent);
        self
    }

    pub fn is_reply(&self) -> bool {
        self.parent_comment.is_some()
    }

    pub fn is_root_comment(&self) -> bool {
        self.parent_comment.is_none()
    }

    /// Marks the comment deleted and blanks its content. The record and its replies stay.
    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
        self.content = DELETED_PLACEHOLDER.to_string();
    }

    /// Direct replies to this comment, oldest first.
    pub fn replies<'a, B: StoreBackend>(&self, store: &'a DocumentStore<B>) -> BackRefs<'a, B, Comment> {
        store.back_refs::<Comment>("parent_comment", self.id)
    }
}

impl Document for Comment {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "comments"
    }
}

impl Entity for Comment {
    type Method = CommentMethod;

    fn indexes() -> Vec<IndexSpec> {
        vec![
            IndexSpec::single("article"),
            IndexSpec::single("author"),
            IndexSpec::single("created_at"),
            IndexSpec::single("is_deleted"),
            IndexSpec::single("parent_comment"),
            IndexSpec::compound([("article", IndexKind::Asc), ("created_at", IndexKind::Desc)]),
            IndexSpec::compound([("article", IndexKind::Asc), ("is_deleted", IndexKind::Asc)]),
            IndexSpec::compound([("parent_comment", IndexKind::Asc), ("created_at", IndexKind::Asc)]),
        ]
    }

    fn normalize(&mut self) -> DocumentStoreResult<()> {
        let trimmed = self.content.trim();

        if trimmed.is_empty() {
            return Err(DocumentStoreError::Validation(
                "comment content cannot be empty".to_string(),
            ));
        }

        if trimmed.len() != self.content.len() {
            self.content = trimmed.to_string();
        }

        Ok(())
    }

    fn before_write(&mut self, event: WriteEvent, now: DateTime) {
        if event == WriteEvent::Update && self.created_at.is_some() {
            self.is_edited = true;
        }

        stamp_timestamps(&mut self.created_at, &mut self.updated_at, event, now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentMethod {
    /// Rewrites the comment, refreshing `updated_at`.
    UpdateTimestamp,
    SoftDelete,
}

impl FromStr for CommentMethod {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update_timestamp" => Ok(CommentMethod::UpdateTimestamp),
            "soft_delete" => Ok(CommentMethod::SoftDelete),
            other => Err(unknown_method::<Comment>(other)),
        }
    }
}

impl EntityMethod<Comment> for CommentMethod {
    fn name(&self) -> &'static str {
        match self {
            CommentMethod::UpdateTimestamp => "update_timestamp",
            CommentMethod::SoftDelete => "soft_delete",
        }
    }

    fn apply(&self, comment: &mut Comment) {
        match self {
            CommentMethod::UpdateTimestamp => {},
            CommentMethod::SoftDelete => comment.soft_delete(),
        }
    }
}
