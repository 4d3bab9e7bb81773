//! Integration tests for `SqliteStore` against an in-memory database.

use recs_core::{
  ErrorKind, ProductId, UserId,
  keyword::{DELETION_MARKER, SENTINEL_KEYWORD},
  store::KeywordStore,
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn user(id: i64) -> UserId { UserId::new(id).unwrap() }

fn product(id: i64) -> ProductId { ProductId::new(id).unwrap() }

fn kws(items: &[&str]) -> Vec<String> { items.iter().map(|s| s.to_string()).collect() }

// ─── Schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reserved_keywords_are_seeded() {
  let s = store().await;
  assert!(s.keyword_id(SENTINEL_KEYWORD).await.unwrap().is_some());
  assert!(s.keyword_id(DELETION_MARKER).await.unwrap().is_some());
}

#[tokio::test]
async fn reopening_file_store_keeps_data() {
  let dir = std::env::temp_dir().join(format!("recs-store-{}", std::process::id()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("reopen.sqlite");
  let _ = std::fs::remove_file(&path);

  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.upsert_user(user(1)).await.unwrap();
    s.replace_user_keywords(user(1), kws(&["cars"])).await.unwrap();
  }

  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(s.user_keywords(user(1)).await.unwrap(), ["cars"]);

  let _ = std::fs::remove_dir_all(&dir);
}

// ─── Upserts ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_is_idempotent() {
  let s = store().await;
  s.upsert_user(user(1)).await.unwrap();
  s.upsert_user(user(1)).await.unwrap();
  s.upsert_product(product(10)).await.unwrap();
  s.upsert_product(product(10)).await.unwrap();
}

#[tokio::test]
async fn upsert_does_not_touch_existing_keywords() {
  let s = store().await;
  s.upsert_user(user(1)).await.unwrap();
  s.replace_user_keywords(user(1), kws(&["cars"])).await.unwrap();

  s.upsert_user(user(1)).await.unwrap();
  assert_eq!(s.user_keywords(user(1)).await.unwrap(), ["cars"]);
}

// ─── Keyword replacement ─────────────────────────────────────────────────────

#[tokio::test]
async fn replace_user_keywords_replaces_whole_set() {
  let s = store().await;
  s.upsert_user(user(1)).await.unwrap();

  s.replace_user_keywords(user(1), kws(&["cars", "fish"])).await.unwrap();
  assert_eq!(s.user_keywords(user(1)).await.unwrap(), ["cars", "fish"]);

  s.replace_user_keywords(user(1), kws(&["cars"])).await.unwrap();
  assert_eq!(s.user_keywords(user(1)).await.unwrap(), ["cars"]);

  s.replace_user_keywords(user(1), vec![]).await.unwrap();
  assert!(s.user_keywords(user(1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn same_text_maps_to_same_keyword_id() {
  let s = store().await;
  s.upsert_user(user(1)).await.unwrap();
  s.upsert_product(product(10)).await.unwrap();

  s.replace_user_keywords(user(1), kws(&["fish"])).await.unwrap();
  let first = s.keyword_id("fish").await.unwrap().unwrap();

  s.replace_product_keywords(product(10), kws(&["fish", "anchovy"]))
    .await
    .unwrap();
  assert_eq!(s.keyword_id("fish").await.unwrap(), Some(first));
  assert_ne!(s.keyword_id("anchovy").await.unwrap(), Some(first));
}

#[tokio::test]
async fn replace_for_unknown_owner_is_not_found() {
  let s = store().await;

  let err = s
    .replace_user_keywords(user(5), kws(&["cars"]))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UserNotFound(id) if id == user(5)));

  let err = s
    .replace_product_keywords(product(5), kws(&["cars"]))
    .await
    .unwrap_err();
  let core: recs_core::Error = err.into();
  assert_eq!(core.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn failed_replace_rolls_back_entirely() {
  let s = store().await;
  s.upsert_user(user(1)).await.unwrap();
  s.replace_user_keywords(user(1), kws(&["cars", "fish"])).await.unwrap();

  // The duplicate violates the association primary key halfway through.
  let err = s
    .replace_user_keywords(user(1), kws(&["boats", "boats"]))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Database(_)));

  let core: recs_core::Error = err.into();
  assert_eq!(core.kind(), ErrorKind::Storage);

  assert_eq!(s.user_keywords(user(1)).await.unwrap(), ["cars", "fish"]);
  assert_eq!(s.keyword_id("boats").await.unwrap(), None);
}

#[tokio::test]
async fn replace_is_idempotent() {
  let s = store().await;
  s.upsert_user(user(1)).await.unwrap();

  s.replace_user_keywords(user(1), kws(&["cars", "fish"])).await.unwrap();
  let once = s.user_keywords(user(1)).await.unwrap();
  let fish = s.keyword_id("fish").await.unwrap();

  s.replace_user_keywords(user(1), kws(&["cars", "fish"])).await.unwrap();
  assert_eq!(s.user_keywords(user(1)).await.unwrap(), once);
  assert_eq!(s.keyword_id("fish").await.unwrap(), fish);
}

// ─── Matching ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn product_ids_for_unknown_user_is_not_found() {
  let s = store().await;
  let err = s.product_ids_for_user(user(999)).await.unwrap_err();
  assert!(matches!(err, Error::UserNotFound(_)));
}

#[tokio::test]
async fn product_ids_for_user_with_no_keywords_is_empty() {
  let s = store().await;
  s.upsert_user(user(1)).await.unwrap();
  assert!(s.product_ids_for_user(user(1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn product_ids_keep_duplicates_across_keywords() {
  let s = store().await;
  s.upsert_user(user(1)).await.unwrap();
  s.upsert_product(product(10)).await.unwrap();
  s.upsert_product(product(20)).await.unwrap();

  s.replace_user_keywords(user(1), kws(&["fish", "anchovy"])).await.unwrap();
  s.replace_product_keywords(product(10), kws(&["fish", "anchovy"]))
    .await
    .unwrap();
  s.replace_product_keywords(product(20), kws(&["anchovy"]))
    .await
    .unwrap();

  let ids = s.product_ids_for_user(user(1)).await.unwrap();
  assert_eq!(ids, [product(10), product(10), product(20)]);
}

#[tokio::test]
async fn reserved_keywords_never_match() {
  let s = store().await;
  s.upsert_user(user(1)).await.unwrap();
  s.upsert_product(product(10)).await.unwrap();
  s.upsert_product(product(11)).await.unwrap();

  s.replace_user_keywords(user(1), kws(&[SENTINEL_KEYWORD, DELETION_MARKER]))
    .await
    .unwrap();
  s.replace_product_keywords(product(10), kws(&[SENTINEL_KEYWORD]))
    .await
    .unwrap();
  s.replace_product_keywords(product(11), kws(&[DELETION_MARKER]))
    .await
    .unwrap();

  assert!(s.product_ids_for_user(user(1)).await.unwrap().is_empty());
}
