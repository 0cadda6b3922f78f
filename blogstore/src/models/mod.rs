//! The blog entity kinds: users, their articles, and comments on those articles.
//!
//! Articles and comments refer to their author, article and parent comment by id.
//! The reverse direction (an article's comments, a comment's replies) is never stored;
//! it is computed on demand through [`Article::comments`] and [`Comment::replies`].

mod article;
mod comment;
mod user;

use tracing::info;

use blogstore_core::{backend::StoreBackend, error::DocumentStoreResult, store::DocumentStore};

pub use article::{Article, ArticleMethod, ArticleStatus, MAX_TAGS, normalize_tags};
pub use comment::{Comment, CommentMethod, DELETED_PLACEHOLDER};
pub use user::{User, UserMethod};

/// Registers every entity kind with the store, creating collections and indexes.
///
/// Call once at startup, before serving requests. Calling it again is harmless.
pub async fn init<B: StoreBackend>(store: &DocumentStore<B>) -> DocumentStoreResult<()> {
    store.register::<User>().await?;
    store.register::<Article>().await?;
    store.register::<Comment>().await?;

    info!("Blog entity kinds registered");

    Ok(())
}
