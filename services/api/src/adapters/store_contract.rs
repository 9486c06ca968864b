//! services/api/src/adapters/store_contract.rs
//!
//! Behaviour every `ArticleStore` backend must share. Each case runs against
//! the file store, and against PostgreSQL when `DATABASE_URL` is set and the
//! ignored tests are requested (`cargo test -- --ignored`).

use chrono::{Duration, TimeZone, Utc};
use lorelog_core::domain::{NewArticle, Principal, User};
use lorelog_core::ports::ArticleStore;
use lorelog_core::tag_merge::merge_tags;
use lorelog_core::{IngestMode, IngestionPipeline, TagMergeOutcome};
use std::sync::Arc;
use uuid::Uuid;

use super::OpenAiEmbeddingAdapter;
use async_trait::async_trait;
use lorelog_core::domain::PageMetadata;
use lorelog_core::ports::{MetadataFetcher, PortError, PortResult};

type Store = Arc<dyn ArticleStore>;

async fn new_user(store: &Store) -> Uuid {
    store
        .ensure_user(&Principal::new(Uuid::new_v4()))
        .await
        .unwrap()
        .id
}

/// Tag names are global in the relational store, so every case uses fresh ones.
fn unique_tag(prefix: &str) -> String {
    format!("{}{}", prefix, &Uuid::new_v4().simple().to_string()[..8])
}

fn article(url: &str, title: &str, age_days: i64) -> NewArticle {
    let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    NewArticle {
        url: url.to_string(),
        title: title.to_string(),
        created_at: Some(base - Duration::days(age_days)),
        ..NewArticle::default()
    }
}

struct OfflineFetcher;

#[async_trait]
impl MetadataFetcher for OfflineFetcher {
    async fn fetch(&self, _url: &str) -> PortResult<PageMetadata> {
        Err(PortError::Unavailable("offline".to_string()))
    }
}

/// Saves through the same path as `POST /articles` with `fast: true`.
async fn save_fast(store: &Store, principal: &Principal, url: &str) -> lorelog_core::domain::Article {
    let pipeline = IngestionPipeline::new(
        store.clone(),
        Arc::new(OfflineFetcher),
        Arc::new(OpenAiEmbeddingAdapter::new(None, "embed".to_string())),
    );
    pipeline
        .ingest(principal, url, IngestMode::Fast)
        .await
        .unwrap()
        .article
}

fn titles(articles: &[lorelog_core::domain::Article]) -> Vec<&str> {
    articles.iter().map(|a| a.title.as_str()).collect()
}

async fn ownership_is_isolated(store: Store) {
    let (alice, bob) = (new_user(&store).await, new_user(&store).await);
    let mine = store
        .create_article(alice, article("https://example.com/mine", "Mine", 0))
        .await
        .unwrap();

    assert!(store.list_articles(bob, 50).await.unwrap().is_empty());
    assert!(store.get_article(bob, mine.id).await.is_err());
    assert!(store.find_article_by_url(bob, "https://example.com/mine").await.unwrap().is_none());
    assert!(!store.delete_article(bob, mine.id).await.unwrap());
    assert_eq!(store.list_articles(alice, 50).await.unwrap().len(), 1);
}

async fn lists_newest_first_with_limit(store: Store) {
    let user = new_user(&store).await;
    for (title, age) in [("Middle", 2), ("Oldest", 5), ("Newest", 0)] {
        store
            .create_article(user, article(&format!("https://example.com/{}", title), title, age))
            .await
            .unwrap();
    }

    let all = store.list_articles(user, 50).await.unwrap();
    assert_eq!(titles(&all), vec!["Newest", "Middle", "Oldest"]);
    let top = store.list_articles(user, 2).await.unwrap();
    assert_eq!(titles(&top), vec!["Newest", "Middle"]);
}

async fn lexical_search_covers_tags(store: Store) {
    let user = new_user(&store).await;
    let tag = unique_tag("topic");
    let tagged = store
        .create_article(user, article("https://example.com/t", "Untitled notes", 1))
        .await
        .unwrap();
    store
        .create_article(user, article("https://example.com/p", "100% pure", 0))
        .await
        .unwrap();
    merge_tags(store.as_ref(), user, tagged.id, &[tag.clone()]).await.unwrap();

    let by_tag = store
        .search_articles_lexical(user, &tag.to_uppercase(), 50)
        .await
        .unwrap();
    assert_eq!(titles(&by_tag), vec!["Untitled notes"]);

    let literal = store.search_articles_lexical(user, "0% p", 50).await.unwrap();
    assert_eq!(titles(&literal), vec!["100% pure"]);
    assert_eq!(store.search_articles_lexical(user, "%", 50).await.unwrap().len(), 1);
}

async fn merging_tags_is_idempotent(store: Store) {
    let user = new_user(&store).await;
    let created = store
        .create_article(user, article("https://example.com/m", "Merge", 0))
        .await
        .unwrap();
    let names = vec![unique_tag("a"), unique_tag("b")];

    let first = merge_tags(store.as_ref(), user, created.id, &names).await.unwrap();
    let second = merge_tags(store.as_ref(), user, created.id, &names).await.unwrap();
    assert_eq!(first, TagMergeOutcome { added: 2, total: 2 });
    assert_eq!(second.added, 0);

    let mut attached = store.article_tag_names(user, created.id).await.unwrap();
    attached.sort();
    let mut expected = names.clone();
    expected.sort();
    assert_eq!(attached, expected);
    assert_eq!(store.count_user_associations(user).await.unwrap(), 2);
}

async fn deleting_an_article_releases_its_tags(store: Store) {
    let user = new_user(&store).await;
    let (only, shared) = (unique_tag("only"), unique_tag("shared"));
    let doomed = store
        .create_article(user, article("https://example.com/d", "Doomed", 1))
        .await
        .unwrap();
    let kept = store
        .create_article(user, article("https://example.com/k", "Kept", 0))
        .await
        .unwrap();
    merge_tags(store.as_ref(), user, doomed.id, &[only.clone(), shared.clone()]).await.unwrap();
    merge_tags(store.as_ref(), user, kept.id, &[shared.clone()]).await.unwrap();

    assert!(store.delete_article(user, doomed.id).await.unwrap());

    let remaining: Vec<String> = store
        .user_tags(user)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(remaining, vec![shared.clone()]);
    assert_eq!(store.count_user_associations(user).await.unwrap(), 1);

    // A tag recreated under the same name starts with no articles.
    let recreated = store.get_or_create_tag(&only).await.unwrap();
    assert!(store.delete_tag_if_unused(&recreated).await.unwrap());
}

async fn email_upsert_ignores_case(store: Store) {
    let email = format!("{}@example.com", Uuid::new_v4().simple());
    let first = store.upsert_user_by_email(&email.to_uppercase(), Some("Ada")).await.unwrap();
    store
        .create_article(
            first.id,
            NewArticle {
                owner_email: Some(email.clone()),
                owner_name: Some("Ada".to_string()),
                ..article("https://example.com/e", "Emailed", 0)
            },
        )
        .await
        .unwrap();

    let again = store.upsert_user_by_email(&email, None).await.unwrap();
    assert_eq!(again.id, first.id);
    assert_eq!(again.email.as_deref(), Some(email.as_str()));
}

async fn imported_user_is_claimed_by_identity(store: Store) {
    let email = format!("{}@example.com", Uuid::new_v4().simple());
    let imported = store.upsert_user_by_email(&email, Some("Ada")).await.unwrap();
    assert_eq!(imported.id, User::imported_id(&email));
    store
        .create_article(
            imported.id,
            NewArticle {
                owner_email: Some(email.clone()),
                owner_name: Some("Ada".to_string()),
                ..article("https://example.com/imported", "Imported", 1)
            },
        )
        .await
        .unwrap();

    let principal = Principal {
        user_id: Uuid::new_v4(),
        email: Some(email.clone()),
        name: None,
    };
    let fresh = save_fast(&store, &principal, "https://fresh.example.org/post").await;
    assert_eq!(fresh.owner_id, principal.user_id);

    let user = store.ensure_user(&principal).await.unwrap();
    assert_eq!(user.id, principal.user_id);
    assert_eq!(user.email.as_deref(), Some(email.as_str()));

    let listed = store.list_articles(user.id, 50).await.unwrap();
    assert_eq!(titles(&listed), vec!["fresh.example.org", "Imported"]);
    assert!(store.list_articles(imported.id, 50).await.unwrap().is_empty());

    // Later imports for the same email land on the claiming user.
    let reimport = store.upsert_user_by_email(&email, None).await.unwrap();
    assert_eq!(reimport.id, user.id);
}

async fn email_held_by_another_identity_does_not_block(store: Store) {
    let email = format!("{}@example.com", Uuid::new_v4().simple());
    let first = Principal {
        user_id: Uuid::new_v4(),
        email: Some(email.clone()),
        name: None,
    };
    let holder = store.ensure_user(&first).await.unwrap();
    store
        .create_article(
            holder.id,
            NewArticle {
                owner_email: Some(email.clone()),
                ..article("https://example.com/held", "Held", 0)
            },
        )
        .await
        .unwrap();

    let second = Principal {
        user_id: Uuid::new_v4(),
        email: Some(email.clone()),
        name: Some("Twin".to_string()),
    };
    let saved = save_fast(&store, &second, "https://twin.example.org/").await;
    assert_eq!(saved.owner_id, second.user_id);
    let twin = store.ensure_user(&second).await.unwrap();
    assert_eq!(twin.id, second.user_id);

    assert_eq!(titles(&store.list_articles(holder.id, 50).await.unwrap()), vec!["Held"]);
    assert_eq!(titles(&store.list_articles(twin.id, 50).await.unwrap()), vec!["twin.example.org"]);
}

async fn untagged_articles_are_listed_and_counted(store: Store) {
    let user = new_user(&store).await;
    let tagged = store
        .create_article(user, article("https://example.com/1", "Tagged", 2))
        .await
        .unwrap();
    for (title, age) in [("Bare old", 1), ("Bare new", 0)] {
        store
            .create_article(user, article(&format!("https://example.com/{}", age), title, age))
            .await
            .unwrap();
    }
    merge_tags(store.as_ref(), user, tagged.id, &[unique_tag("t")]).await.unwrap();

    assert_eq!(store.count_untagged_articles(user).await.unwrap(), 2);
    let untagged = store.list_untagged_articles(user, 1).await.unwrap();
    assert_eq!(titles(&untagged), vec!["Bare new"]);
}

macro_rules! contract_tests {
    ($($(#[$attr:meta])* $backend:ident => $store:expr;)+) => {$(
        mod $backend {
            use super::*;

            #[tokio::test] $(#[$attr])*
            async fn ownership_is_isolated() {
                let (store, _guard) = $store;
                super::ownership_is_isolated(store).await;
            }

            #[tokio::test] $(#[$attr])*
            async fn lists_newest_first_with_limit() {
                let (store, _guard) = $store;
                super::lists_newest_first_with_limit(store).await;
            }

            #[tokio::test] $(#[$attr])*
            async fn lexical_search_covers_tags() {
                let (store, _guard) = $store;
                super::lexical_search_covers_tags(store).await;
            }

            #[tokio::test] $(#[$attr])*
            async fn merging_tags_is_idempotent() {
                let (store, _guard) = $store;
                super::merging_tags_is_idempotent(store).await;
            }

            #[tokio::test] $(#[$attr])*
            async fn deleting_an_article_releases_its_tags() {
                let (store, _guard) = $store;
                super::deleting_an_article_releases_its_tags(store).await;
            }

            #[tokio::test] $(#[$attr])*
            async fn email_upsert_ignores_case() {
                let (store, _guard) = $store;
                super::email_upsert_ignores_case(store).await;
            }

            #[tokio::test] $(#[$attr])*
            async fn imported_user_is_claimed_by_identity() {
                let (store, _guard) = $store;
                super::imported_user_is_claimed_by_identity(store).await;
            }

            #[tokio::test] $(#[$attr])*
            async fn email_held_by_another_identity_does_not_block() {
                let (store, _guard) = $store;
                super::email_held_by_another_identity_does_not_block(store).await;
            }

            #[tokio::test] $(#[$attr])*
            async fn untagged_articles_are_listed_and_counted() {
                let (store, _guard) = $store;
                super::untagged_articles_are_listed_and_counted(store).await;
            }
        }
    )+};
}

fn file_store() -> (Store, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store: Store = Arc::new(super::FileArticleStore::new(dir.path().join("articles.json")));
    (store, dir)
}

async fn db_store() -> (Store, ()) {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this test");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("connect to DATABASE_URL");
    let adapter = super::DbAdapter::new(pool);
    adapter.run_migrations().await.expect("migrations");
    (Arc::new(adapter), ())
}

contract_tests! {
    file_backend => file_store();
    #[ignore = "requires DATABASE_URL pointing at a disposable PostgreSQL database"]
    db_backend => db_store().await;
}
