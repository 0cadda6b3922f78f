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

use crate::models::Comment;

/// Most tags an article keeps after normalization.
pub const MAX_TAGS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

/// A blog post written by a [`User`](crate::models::User).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Article {
    #[serde(default = "Uuid::new")]
    pub id: Uuid,
    /// Id of the authoring user.
    pub author: Uuid,
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: String,
    #[serde(default)]
    #[validate(length(max = 10, message = "at most 10 tags"))]
    pub tags: Vec<String>,
    #[serde(default)]
    #[validate(length(max = 300, message = "summary must be at most 300 characters"))]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: ArticleStatus,
    #[serde(default)]
    pub published_at: Option<DateTime>,
    #[serde(default)]
    #[validate(range(min = 0, message = "view_count cannot be negative"))]
    pub view_count: i64,
    #[serde(default)]
    pub created_at: Option<DateTime>,
    #[serde(default)]
    pub updated_at: Option<DateTime>,
}

/// Trims and lowercases tags, drops blanks and repeats (first occurrence wins) and keeps
/// at most [`MAX_TAGS`].
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len().min(MAX_TAGS));

    for tag in tags {
        let tag = tag.trim().to_lowercase();

        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
        if normalized.len() == MAX_TAGS {
            break;
        }
    }

    normalized
}

impl Article {
    pub fn new(author: Uuid, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new(),
            author,
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            summary: None,
            status: ArticleStatus::Draft,
            published_at: None,
            view_count: 0,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_status(mut self, status: ArticleStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_published(&self) -> bool {
        self.status == ArticleStatus::Published
    }

    /// Comments on this article, oldest first. Nothing is loaded until the result is used.
    pub fn comments<'a, B: StoreBackend>(&self, store: &'a DocumentStore<B>) -> BackRefs<'a, B, Comment> {
        store.back_refs::<Comment>("article", self.id)
    }
}

impl Document for Article {
    fn id(&self) -> &Uuid {
        &self.id
    }

    fn collection_name() -> &'static str {
        "articles"
    }
}

impl Entity for Article {
    type Method = ArticleMethod;

    fn indexes() -> Vec<IndexSpec> {
        vec![
            IndexSpec::single("author"),
            IndexSpec::single("status"),
            IndexSpec::single("created_at"),
            IndexSpec::single("published_at"),
            IndexSpec::compound([("author", IndexKind::Asc), ("status", IndexKind::Desc)]),
            IndexSpec::compound([("status", IndexKind::Asc), ("published_at", IndexKind::Desc)]),
            IndexSpec::text(["title", "content"]),
        ]
    }

    /// Views only grow through `increment_view_count`; `published_at` is stamped once.
    fn immutable_fields() -> &'static [&'static str] {
        &["view_count", "published_at"]
    }

    fn normalize(&mut self) -> DocumentStoreResult<()> {
        self.tags = normalize_tags(&self.tags);

        Ok(())
    }

    fn before_write(&mut self, event: WriteEvent, now: DateTime) {
        stamp_timestamps(&mut self.created_at, &mut self.updated_at, event, now);

        if self.is_published() && self.published_at.is_none() {
            self.published_at = Some(now);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleMethod {
    /// Rewrites the article, refreshing `updated_at`. Also invocable as `update`.
    UpdateTimestamp,
    IncrementViewCount,
    Publish,
    Archive,
}

impl FromStr for ArticleMethod {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update_timestamp" | "update" => Ok(ArticleMethod::UpdateTimestamp),
            "increment_view_count" => Ok(ArticleMethod::IncrementViewCount),
            "publish" => Ok(ArticleMethod::Publish),
            "archive" => Ok(ArticleMethod::Archive),
            other => Err(unknown_method::<Article>(other)),
        }
    }
}

impl EntityMethod<Article> for ArticleMethod {
    fn name(&self) -> &'static str {
        match self {
            ArticleMethod::UpdateTimestamp => "update_timestamp",
            ArticleMethod::IncrementViewCount => "increment_view_count",
            ArticleMethod::Publish => "publish",
            ArticleMethod::Archive => "archive",
        }
    }

    fn apply(&self, article: &mut Article) {
        match self {
            ArticleMethod::UpdateTimestamp => {},
            ArticleMethod::IncrementViewCount => article.view_count = article.view_count.saturating_add(1),
            ArticleMethod::Publish => article.status = ArticleStatus::Published,
            ArticleMethod::Archive => article.status = ArticleStatus::Archived,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[rstest]
    #[case(&[" Rust ", "rust", "", "Go "], &["rust", "go"])]
    #[case(&["  ", "\t"], &[])]
    #[case(&["B", "a", "b", "A"], &["b", "a"])]
    fn tags_are_normalized(#[case] input: &[&str], #[case] expected: &[&str]) {
        assert_eq!(normalize_tags(&strings(input)), strings(expected));
    }

    #[test]
    fn tags_are_truncated_after_deduplication() {
        let input = (0..15)
            .flat_map(|n| [format!("tag{n}"), format!("TAG{n}")])
            .collect::<Vec<_>>();

        let tags = normalize_tags(&input);

        assert_eq!(tags.len(), MAX_TAGS);
        assert_eq!(tags.first().map(String::as_str), Some("tag0"));
        assert_eq!(tags.last().map(String::as_str), Some("tag9"));
    }

    #[test]
    fn published_at_is_stamped_once() {
        let first = DateTime::from_millis(1_000);
        let later = DateTime::from_millis(5_000);
        let mut article = Article::new(Uuid::new(), "Title", "Body")
            .with_status(ArticleStatus::Published);

        article.prepare(WriteEvent::Insert, first).unwrap();
        article.prepare(WriteEvent::Update, later).unwrap();

        assert_eq!(article.published_at, Some(first));
        assert_eq!(article.updated_at, Some(later));
    }

    #[test]
    fn drafts_are_not_stamped() {
        let mut article = Article::new(Uuid::new(), "Title", "Body");

        article.prepare(WriteEvent::Insert, DateTime::now()).unwrap();

        assert!(article.published_at.is_none());
    }

    #[rstest]
    #[case("update", ArticleMethod::UpdateTimestamp)]
    #[case("update_timestamp", ArticleMethod::UpdateTimestamp)]
    #[case("publish", ArticleMethod::Publish)]
    fn method_aliases(#[case] name: &str, #[case] method: ArticleMethod) {
        assert_eq!(name.parse::<ArticleMethod>().unwrap(), method);
    }

    #[test]
    fn status_is_stored_lowercase() {
        assert_eq!(
            bson::ser::serialize_to_bson(&ArticleStatus::Published).unwrap(),
            bson::Bson::String("published".to_string())
        );
    }
}
