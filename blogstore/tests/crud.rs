use blogstore::{
    bson::{Bson, DateTime, Document as FieldMap, Uuid, doc},
    memory::InMemoryStore,
    models::{self, Article, ArticleMethod, ArticleStatus, Comment, User},
    prelude::*,
};
use rstest::rstest;

async fn blog() -> DocumentStore<InMemoryStore> {
    let store = DocumentStore::new(InMemoryStore::new());
    models::init(&store).await.unwrap();
    store
}

fn user_fields(n: usize) -> FieldMap {
    doc! {
        "username": format!("user{n:02}"),
        "email": format!("user{n:02}@example.com"),
    }
}

async fn seed_users(store: &DocumentStore<InMemoryStore>, count: usize) -> Vec<User> {
    store
        .crud::<User>()
        .create_many((0..count).map(user_fields).collect())
        .await
        .unwrap()
}

async fn seed_author(store: &DocumentStore<InMemoryStore>) -> User {
    store
        .crud::<User>()
        .insert(User::new("author", "author@example.com"))
        .await
        .unwrap()
}

#[tokio::test]
async fn create_assigns_ids_and_timestamps() {
    let store = blog().await;

    let created = store
        .crud::<User>()
        .create(doc! { "username": "ada", "email": "ada@example.com", "age": 36 })
        .await
        .unwrap();

    let Created::One(user) = created else {
        panic!("expected a single user");
    };

    assert!(user.is_active);
    assert!(user.created_at.is_some());
    assert_eq!(user.created_at, user.updated_at);
    assert_eq!(store.crud::<User>().get(user.id).await.unwrap(), user);
}

#[tokio::test]
async fn create_rejects_caller_supplied_id() {
    let store = blog().await;

    let err = store
        .crud::<User>()
        .create_one(doc! { "id": Uuid::new(), "username": "ada", "email": "ada@example.com" })
        .await
        .unwrap_err();

    assert!(err.is_validation());
}

#[tokio::test]
async fn create_rejects_unknown_fields() {
    let store = blog().await;

    let err = store
        .crud::<User>()
        .create_one(doc! { "username": "ada", "email": "ada@example.com", "nickname": "countess" })
        .await
        .unwrap_err();

    assert!(err.is_validation());
}

#[tokio::test]
async fn invalid_member_leaves_batch_unpersisted() {
    let store = blog().await;
    let users = store.crud::<User>();

    let mut batch = (0..3).map(user_fields).collect::<Vec<_>>();
    batch.push(doc! { "username": "x", "email": "x@example.com" });

    let err = users.create(batch).await.unwrap_err();

    assert!(err.is_validation());
    assert_eq!(users.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn duplicate_email_in_batch_leaves_batch_unpersisted() {
    let store = blog().await;
    let users = store.crud::<User>();

    let batch = vec![
        doc! { "username": "first", "email": "same@example.com" },
        doc! { "username": "second", "email": "other@example.com" },
        doc! { "username": "third", "email": "same@example.com" },
    ];

    let err = users.create_many(batch).await.unwrap_err();

    assert!(matches!(err, DocumentStoreError::DuplicateKey(..)));
    assert_eq!(users.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn batch_reusing_a_stored_id_keeps_the_stored_entity() {
    let store = blog().await;
    let users = store.crud::<User>();
    let ada = users.insert(User::new("ada", "ada@example.com")).await.unwrap();

    let mut impostor = ada.clone();
    impostor.email = "impostor@example.com".to_string();

    let err = users
        .insert_many(vec![User::new("bob", "bob@example.com"), impostor])
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(..)));
    assert_eq!(users.get(ada.id).await.unwrap(), ada);
    assert_eq!(users.count(None).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_bulk_patch_changes_nothing() {
    let store = blog().await;
    let users = store.crud::<User>();
    let seeded = seed_users(&store, 2).await;

    let err = users
        .patch_many(Filter::all(), doc! { "email": "same@example.com" })
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::DuplicateKey(..)));
    for user in &seeded {
        assert_eq!(&users.get(user.id).await.unwrap(), user);
    }
}

#[tokio::test]
async fn unique_email_is_enforced_across_writes() {
    let store = blog().await;
    let users = store.crud::<User>();
    let seeded = seed_users(&store, 2).await;

    let err = users
        .create_one(doc! { "username": "copycat", "email": "user00@example.com" })
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::DuplicateKey(..)));

    let err = users
        .patch(seeded[1].id, doc! { "email": "user00@example.com" })
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::DuplicateKey(..)));

    assert_eq!(users.get(seeded[1].id).await.unwrap().email, "user01@example.com");
}

#[tokio::test]
async fn create_normalizes_tags() {
    let store = blog().await;
    let author = seed_author(&store).await;

    let article = store
        .crud::<Article>()
        .create_one(doc! {
            "author": author.id,
            "title": "Ownership",
            "content": "Borrowing explained",
            "tags": [" Rust", "rust", "", "Systems "],
        })
        .await
        .unwrap();

    assert_eq!(article.tags, vec!["rust".to_string(), "systems".to_string()]);
    assert_eq!(article.status, ArticleStatus::Draft);
    assert!(article.published_at.is_none());
}

#[rstest]
#[case("   ")]
#[case("\n\t ")]
#[tokio::test]
async fn whitespace_comment_is_rejected(#[case] content: &str) {
    let store = blog().await;
    let comments = store.crud::<Comment>();

    let err = comments
        .create_one(doc! { "article": Uuid::new(), "author": Uuid::new(), "content": content })
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert_eq!(comments.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn get_missing_id_is_not_found() {
    let store = blog().await;

    let err = store.crud::<User>().get(Uuid::new()).await.unwrap_err();

    assert!(err.is_not_found());
}

#[rstest]
#[case(1, 10, 10, true)]
#[case(2, 10, 10, true)]
#[case(3, 10, 5, false)]
#[case(4, 10, 0, false)]
#[case(1, 100, 25, false)]
#[tokio::test]
async fn paginate_windows(
    #[case] page: usize,
    #[case] limit: usize,
    #[case] len: usize,
    #[case] has_more: bool,
) {
    let store = blog().await;
    let seeded = seed_users(&store, 25).await;

    let result = store
        .crud::<User>()
        .paginate(PageRequest::new(page, limit).unwrap(), None)
        .await
        .unwrap();

    assert_eq!(result.total, 25);
    assert_eq!(result.len(), len);
    assert_eq!(result.has_more(), has_more);

    let offset = (page - 1) * limit;
    let expected = seeded
        .iter()
        .skip(offset)
        .take(limit)
        .map(|user| user.id)
        .collect::<Vec<_>>();
    let actual = result.items.iter().map(|user| user.id).collect::<Vec<_>>();

    assert_eq!(actual, expected);
}

#[tokio::test]
async fn paginate_far_past_the_end_is_empty() {
    let store = blog().await;
    seed_users(&store, 5).await;

    let page = store
        .crud::<User>()
        .paginate(PageRequest::new(1_000_000, 10).unwrap(), None)
        .await
        .unwrap();

    assert!(page.is_empty());
    assert_eq!(page.total, 5);
    assert_eq!(page.next_page(), None);
}

#[tokio::test]
async fn paginate_counts_filtered_total() {
    let store = blog().await;
    let users = store.crud::<User>();
    let seeded = seed_users(&store, 6).await;

    for user in seeded.iter().step_by(2) {
        users.invoke(user.id, "deactivate").await.unwrap();
    }

    let page = users
        .paginate_sorted(
            PageRequest::new(1, 2).unwrap(),
            Some(Filter::eq("is_active", true)),
            Sort::desc("username"),
        )
        .await
        .unwrap();

    assert_eq!(page.total, 3);
    assert_eq!(page.pages(), 2);
    assert_eq!(
        page.items.iter().map(|user| user.username.as_str()).collect::<Vec<_>>(),
        vec!["user05", "user03"]
    );
}

#[tokio::test]
async fn patch_by_missing_id_reports_false() {
    let store = blog().await;
    seed_users(&store, 1).await;

    let patched = store
        .crud::<User>()
        .patch(Uuid::new(), doc! { "bio": "ghost" })
        .await
        .unwrap();

    assert!(!patched);
}

#[tokio::test]
async fn patch_by_id_refreshes_updated_at() {
    let store = blog().await;
    let users = store.crud::<User>();
    let user = seed_users(&store, 1).await.remove(0);

    assert!(users.patch(user.id, doc! { "bio": "hello", "age": 40 }).await.unwrap());

    let stored = users.get(user.id).await.unwrap();
    assert_eq!(stored.bio.as_deref(), Some("hello"));
    assert_eq!(stored.age, Some(40));
    assert_eq!(stored.created_at, user.created_at);
    assert!(stored.updated_at >= user.updated_at);
}

#[tokio::test]
async fn patch_by_filter_updates_every_match() {
    let store = blog().await;
    let users = store.crud::<User>();

    users
        .create_many(vec![
            doc! { "username": "ann", "email": "ann@example.com", "age": 34 },
            doc! { "username": "bob", "email": "bob@example.com", "age": 34 },
            doc! { "username": "cat", "email": "cat@example.com", "age": 34 },
            doc! { "username": "dan", "email": "dan@example.com", "age": 50 },
        ])
        .await
        .unwrap();

    let patched = users
        .patch_many(Filter::matching(doc! { "age": 34 }), doc! { "age": 30 })
        .await
        .unwrap();

    assert!(patched);
    assert_eq!(users.count(Some(Filter::eq("age", 30))).await.unwrap(), 3);
    assert_eq!(users.count(Some(Filter::eq("age", 50))).await.unwrap(), 1);
}

#[tokio::test]
async fn patch_by_filter_matching_nothing_reports_false() {
    let store = blog().await;
    seed_users(&store, 2).await;

    let patched = store
        .crud::<User>()
        .patch_many(Filter::eq("age", 99), doc! { "bio": "nobody" })
        .await
        .unwrap();

    assert!(!patched);
}

#[rstest]
#[case(doc! { "id": Uuid::new() })]
#[case(doc! { "created_at": DateTime::now() })]
#[case(doc! { "nickname": "countess" })]
#[case(doc! { "username": "x" })]
#[tokio::test]
async fn rejected_patches_change_nothing(#[case] fields: FieldMap) {
    let store = blog().await;
    let users = store.crud::<User>();
    let user = seed_users(&store, 1).await.remove(0);

    let err = users.patch(user.id, fields).await.unwrap_err();

    assert!(err.is_validation());
    assert_eq!(users.get(user.id).await.unwrap(), user);
}

#[tokio::test]
async fn patch_with_non_matching_filter_reports_false() {
    let store = blog().await;
    let users = store.crud::<User>();
    let user = seed_users(&store, 1).await.remove(0);

    let patched = users
        .update(
            UpdateRequest::by_id(user.id)
                .with_filter(Filter::eq("username", "someone-else"))
                .patch(doc! { "bio": "never" }),
        )
        .await
        .unwrap();

    assert!(!patched);
    assert_eq!(users.get(user.id).await.unwrap().bio, None);
}

#[tokio::test]
async fn incomplete_update_requests_are_invalid() {
    let store = blog().await;
    let articles = store.crud::<Article>();

    let requests = vec![
        UpdateRequest::<Article>::new(),
        UpdateRequest::by_id(Uuid::new()),
        UpdateRequest::by_id(Uuid::new()).patch(doc! {}),
        UpdateRequest::new().patch(doc! { "title": "orphan" }),
        UpdateRequest::new().invoke(ArticleMethod::Publish),
        UpdateRequest::matching(Filter::all()).invoke(ArticleMethod::Archive),
    ];

    for request in requests {
        let err = articles.update(request).await.unwrap_err();
        assert!(matches!(err, DocumentStoreError::InvalidUpdate(_)), "{err}");
    }
}

#[tokio::test]
async fn unknown_method_is_rejected() {
    let store = blog().await;
    let author = seed_author(&store).await;
    let article = store
        .crud::<Article>()
        .insert(Article::new(author.id, "Title", "Body"))
        .await
        .unwrap();

    let err = store
        .crud::<Article>()
        .invoke(article.id, "explode")
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::UnknownMethod(..)));
}

#[tokio::test]
async fn publish_stamps_published_at_once() {
    let store = blog().await;
    let articles = store.crud::<Article>();
    let author = seed_author(&store).await;
    let draft = articles
        .insert(Article::new(author.id, "Title", "Body"))
        .await
        .unwrap();

    assert!(articles.invoke(draft.id, "publish").await.unwrap());
    let published = articles.get(draft.id).await.unwrap();
    assert!(published.is_published());
    let stamped = published.published_at;
    assert!(stamped.is_some());

    assert!(articles.invoke(draft.id, "update").await.unwrap());
    assert!(articles.invoke(draft.id, "increment_view_count").await.unwrap());

    let later = articles.get(draft.id).await.unwrap();
    assert_eq!(later.published_at, stamped);
    assert_eq!(later.view_count, 1);
    assert_eq!(later.created_at, draft.created_at);
}

#[rstest]
#[case(doc! { "view_count": 0 })]
#[case(doc! { "view_count": 100 })]
#[case(doc! { "published_at": Bson::Null })]
#[case(doc! { "title": "Renamed", "published_at": DateTime::now() })]
#[tokio::test]
async fn hook_managed_article_fields_cannot_be_patched(#[case] fields: FieldMap) {
    let store = blog().await;
    let articles = store.crud::<Article>();
    let author = seed_author(&store).await;
    let article = articles
        .insert(Article::new(author.id, "Title", "Body").with_status(ArticleStatus::Published))
        .await
        .unwrap();
    articles.invoke(article.id, "increment_view_count").await.unwrap();
    articles.invoke(article.id, "increment_view_count").await.unwrap();
    let before = articles.get(article.id).await.unwrap();

    let err = articles.patch(article.id, fields).await.unwrap_err();

    assert!(err.is_validation());
    assert_eq!(articles.get(article.id).await.unwrap(), before);
    assert_eq!(before.view_count, 2);
    assert_eq!(before.published_at, article.published_at);
}

#[tokio::test]
async fn method_and_patch_apply_together() {
    let store = blog().await;
    let articles = store.crud::<Article>();
    let author = seed_author(&store).await;
    let draft = articles
        .insert(Article::new(author.id, "Draft title", "Body"))
        .await
        .unwrap();

    let updated = articles
        .update(
            UpdateRequest::by_id(draft.id)
                .invoke(ArticleMethod::Publish)
                .patch(doc! { "title": "Final title" }),
        )
        .await
        .unwrap();

    assert!(updated);

    let stored = articles.get(draft.id).await.unwrap();
    assert_eq!(stored.title, "Final title");
    assert_eq!(stored.status, ArticleStatus::Published);
}

#[tokio::test]
async fn invoking_on_missing_id_reports_false() {
    let store = blog().await;

    let updated = store
        .crud::<Article>()
        .invoke(Uuid::new(), "archive")
        .await
        .unwrap();

    assert!(!updated);
}

#[tokio::test]
async fn editing_a_comment_marks_it_edited() {
    let store = blog().await;
    let comments = store.crud::<Comment>();
    let comment = comments
        .insert(Comment::new(Uuid::new(), Uuid::new(), "first take"))
        .await
        .unwrap();
    assert!(!comment.is_edited);

    assert!(comments.patch(comment.id, doc! { "content": "  second take " }).await.unwrap());

    let stored = comments.get(comment.id).await.unwrap();
    assert!(stored.is_edited);
    assert_eq!(stored.content, "second take");
}

#[tokio::test]
async fn delete_targets() {
    let store = blog().await;
    let users = store.crud::<User>();
    let seeded = seed_users(&store, 4).await;

    assert!(users.delete(DeleteTarget::Id(seeded[0].id)).await.unwrap());
    assert!(!users.delete(DeleteTarget::Id(seeded[0].id)).await.unwrap());
    assert!(!users.collection().contains(seeded[0].id).await.unwrap());

    let by_email = Filter::eq("email", "user01@example.com");
    assert!(users.delete(DeleteTarget::Filter(by_email.clone())).await.unwrap());
    assert!(!users.delete(DeleteTarget::Filter(by_email)).await.unwrap());

    assert!(users.delete(DeleteTarget::Filter(Filter::all())).await.unwrap());
    assert_eq!(users.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn text_search_matches_title_and_content_words() {
    let store = blog().await;
    let articles = store.crud::<Article>();
    let author = seed_author(&store).await;

    articles
        .insert_many(vec![
            Article::new(author.id, "Rust ownership", "Moves and borrows"),
            Article::new(author.id, "Gardening", "Growing rust-resistant roses"),
            Article::new(author.id, "Cooking", "A stew for winter"),
        ])
        .await
        .unwrap();

    let found = articles.find(Filter::text("RUST"), None).await.unwrap();
    assert_eq!(found.len(), 2);

    let found = articles.find(Filter::text("winter roses"), Some(Sort::asc("title"))).await.unwrap();
    assert_eq!(
        found.iter().map(|article| article.title.as_str()).collect::<Vec<_>>(),
        vec!["Cooking", "Gardening"]
    );
}

#[tokio::test]
async fn find_one_and_count_follow_filters() {
    let store = blog().await;
    let articles = store.crud::<Article>();
    let author = seed_author(&store).await;

    articles
        .insert_many(vec![
            Article::new(author.id, "One", "Body").with_status(ArticleStatus::Published),
            Article::new(author.id, "Two", "Body"),
            Article::new(author.id, "Three", "Body").with_tags(["news"]),
        ])
        .await
        .unwrap();

    let published = articles
        .find_one(Filter::eq("status", "published"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(published.title, "One");
    assert!(published.published_at.is_some());

    assert_eq!(articles.count(Some(Filter::eq("author", author.id))).await.unwrap(), 3);
    assert_eq!(articles.count(Some(Filter::contains("tags", "news"))).await.unwrap(), 1);
    assert!(articles.find_one(Filter::eq("title", "Four")).await.unwrap().is_none());
}

#[tokio::test]
async fn registration_is_repeatable() {
    let store = blog().await;
    seed_users(&store, 3).await;

    models::init(&store).await.unwrap();

    let mut collections = store.list_collections().await.unwrap();
    collections.sort();

    assert_eq!(collections, vec!["articles", "comments", "users"]);
    assert_eq!(store.crud::<User>().count(None).await.unwrap(), 3);
}

#[tokio::test]
async fn type_erased_store_behaves_the_same() {
    let store = DocumentStore::new(InMemoryStore::new()).into_dyn();
    models::init(&store).await.unwrap();

    let user = store
        .crud::<User>()
        .create_one(user_fields(7))
        .await
        .unwrap();

    assert_eq!(store.crud::<User>().get(user.id).await.unwrap().username, "user07");

    store.drop_collection("users").await.unwrap();
    assert!(matches!(
        store.drop_collection("users").await.unwrap_err(),
        DocumentStoreError::CollectionNotFound(_)
    ));

    store.shutdown().await.unwrap();
}
