use blogstore::{
    bson::{Bson, Uuid},
    memory::InMemoryStore,
    models::{self, Article, Comment, DELETED_PLACEHOLDER, User},
    prelude::*,
};
use futures::TryStreamExt;

struct Thread {
    store: DocumentStore<InMemoryStore>,
    article: Article,
    roots: Vec<Comment>,
}

/// An article with five root comments, the first of which has two replies.
async fn thread() -> Thread {
    let store = DocumentStore::new(InMemoryStore::new());
    models::init(&store).await.unwrap();

    let author = store
        .crud::<User>()
        .insert(User::new("writer", "writer@example.com"))
        .await
        .unwrap();
    let article = store
        .crud::<Article>()
        .insert(Article::new(author.id, "Lifetimes", "Annotated"))
        .await
        .unwrap();

    let comments = store.crud::<Comment>();
    let mut roots = Vec::new();
    for n in 0..5 {
        roots.push(
            comments
                .insert(Comment::new(article.id, author.id, format!("comment {n}")))
                .await
                .unwrap(),
        );
    }

    comments
        .insert_many(vec![
            Comment::new(article.id, author.id, "reply a").replying_to(roots[0].id),
            Comment::new(article.id, author.id, "reply b").replying_to(roots[0].id),
        ])
        .await
        .unwrap();

    // Another article's comment must never leak into this thread.
    comments
        .insert(Comment::new(Uuid::new(), author.id, "elsewhere"))
        .await
        .unwrap();

    Thread { store, article, roots }
}

#[tokio::test]
async fn comments_of_an_article() {
    let Thread { store, article, .. } = thread().await;

    let comments = article.comments(&store);

    assert_eq!(comments.parent(), article.id);
    assert_eq!(comments.field(), "article");
    assert_eq!(comments.count().await.unwrap(), 7);

    let fetched = comments.fetch().await.unwrap();
    assert_eq!(fetched.len(), 7);
    assert!(fetched.iter().all(|comment| comment.article == article.id));
}

#[tokio::test]
async fn root_comments_only() {
    let Thread { store, article, roots } = thread().await;

    let fetched = article
        .comments(&store)
        .filter(Filter::not_exists("parent_comment").or(Filter::eq("parent_comment", Bson::Null)))
        .fetch()
        .await
        .unwrap();

    assert_eq!(
        fetched.iter().map(|comment| comment.id).collect::<Vec<_>>(),
        roots.iter().map(|comment| comment.id).collect::<Vec<_>>()
    );
    assert!(fetched.iter().all(Comment::is_root_comment));
}

#[tokio::test]
async fn replies_of_a_comment() {
    let Thread { store, roots, .. } = thread().await;

    let replies = roots[0].replies(&store).fetch().await.unwrap();

    assert_eq!(
        replies.iter().map(|reply| reply.content.as_str()).collect::<Vec<_>>(),
        vec!["reply a", "reply b"]
    );
    assert!(replies.iter().all(Comment::is_reply));
    assert_eq!(roots[1].replies(&store).count().await.unwrap(), 0);
}

#[tokio::test]
async fn paged_comments() {
    let Thread { store, article, .. } = thread().await;

    let comments = article
        .comments(&store)
        .sorted_by(Sort::desc("created_at"));

    let first = comments.page(PageRequest::new(1, 3).unwrap()).await.unwrap();
    let last = comments.page(PageRequest::new(3, 3).unwrap()).await.unwrap();

    assert_eq!(first.total, 7);
    assert_eq!(first.len(), 3);
    assert_eq!(first.next_page(), Some(2));
    assert_eq!(last.len(), 1);
    assert!(!last.has_more());
}

#[tokio::test]
async fn streamed_comments_arrive_in_order() {
    let Thread { store, article, .. } = thread().await;

    let expected = article
        .comments(&store)
        .fetch()
        .await
        .unwrap()
        .into_iter()
        .map(|comment| comment.id)
        .collect::<Vec<_>>();

    for batch_size in [0, 2, 7, 50] {
        let streamed = article
            .comments(&store)
            .stream(batch_size)
            .map_ok(|comment| comment.id)
            .try_collect::<Vec<_>>()
            .await
            .unwrap();

        assert_eq!(streamed, expected, "batch size {batch_size}");
    }
}

#[tokio::test]
async fn back_refs_see_later_writes() {
    let Thread { store, article, roots } = thread().await;

    let comments = article.comments(&store);
    assert_eq!(comments.count().await.unwrap(), 7);

    store
        .crud::<Comment>()
        .delete(DeleteTarget::Id(roots[4].id))
        .await
        .unwrap();

    assert_eq!(comments.count().await.unwrap(), 6);
}

#[tokio::test]
async fn soft_delete_keeps_replies() {
    let Thread { store, roots, .. } = thread().await;
    let comments = store.crud::<Comment>();

    assert!(comments.invoke(roots[0].id, "soft_delete").await.unwrap());

    let deleted = comments.get(roots[0].id).await.unwrap();
    assert!(deleted.is_deleted);
    assert_eq!(deleted.content, DELETED_PLACEHOLDER);
    assert_eq!(deleted.replies(&store).count().await.unwrap(), 2);

    let visible = comments
        .count(Some(Filter::eq("article", deleted.article).and(Filter::eq("is_deleted", false))))
        .await
        .unwrap();
    assert_eq!(visible, 6);
}

#[tokio::test]
async fn deleting_an_article_leaves_its_comments() {
    let Thread { store, article, .. } = thread().await;

    store
        .crud::<Article>()
        .delete(DeleteTarget::Id(article.id))
        .await
        .unwrap();

    assert_eq!(article.comments(&store).count().await.unwrap(), 7);
}
