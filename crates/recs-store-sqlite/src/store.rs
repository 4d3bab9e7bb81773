//! The SQLite implementation of [`KeywordStore`].

use std::path::Path;

use recs_core::{
  ProductId, UserId,
  keyword::RESERVED_KEYWORDS,
  store::KeywordStore,
};
use rusqlite::{Connection, OptionalExtension as _, params};

use crate::{
  Error, Result,
  schema::{SCHEMA, SEED_RESERVED},
};

/// Products linked to any non-reserved keyword of user `?1`, one row per
/// (keyword, product) link, in association insertion order.
const MATCH_PRODUCTS: &str = "
SELECT pk.product_id
FROM user_keywords uk
JOIN keywords         k  ON k.keyword_id  = uk.keyword_id
JOIN product_keywords pk ON pk.keyword_id = uk.keyword_id
WHERE uk.user_id = ?1
  AND k.reserved = 0
ORDER BY uk.rowid, pk.rowid
";

// ─── Association owners ──────────────────────────────────────────────────────

/// The entity side of an association table.
#[derive(Debug, Clone, Copy)]
enum Owner {
  User,
  Product,
}

impl Owner {
  fn upsert_sql(self) -> &'static str {
    match self {
      Owner::User => "INSERT INTO users (user_id) VALUES (?1) ON CONFLICT DO NOTHING",
      Owner::Product => {
        "INSERT INTO products (product_id) VALUES (?1) ON CONFLICT DO NOTHING"
      }
    }
  }

  fn exists_sql(self) -> &'static str {
    match self {
      Owner::User => "SELECT 1 FROM users WHERE user_id = ?1",
      Owner::Product => "SELECT 1 FROM products WHERE product_id = ?1",
    }
  }

  fn clear_sql(self) -> &'static str {
    match self {
      Owner::User => "DELETE FROM user_keywords WHERE user_id = ?1",
      Owner::Product => "DELETE FROM product_keywords WHERE product_id = ?1",
    }
  }

  fn link_sql(self) -> &'static str {
    match self {
      Owner::User => "INSERT INTO user_keywords (user_id, keyword_id) VALUES (?1, ?2)",
      Owner::Product => {
        "INSERT INTO product_keywords (product_id, keyword_id) VALUES (?1, ?2)"
      }
    }
  }

  fn keywords_sql(self) -> &'static str {
    match self {
      Owner::User => {
        "SELECT k.text FROM user_keywords a
         JOIN keywords k ON k.keyword_id = a.keyword_id
         WHERE a.user_id = ?1 ORDER BY a.rowid"
      }
      Owner::Product => {
        "SELECT k.text FROM product_keywords a
         JOIN keywords k ON k.keyword_id = a.keyword_id
         WHERE a.product_id = ?1 ORDER BY a.rowid"
      }
    }
  }
}

// ─── Connection-thread helpers ───────────────────────────────────────────────

fn exists(conn: &Connection, owner: Owner, id: i64) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(owner.exists_sql(), params![id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

/// Look up the id of `text`, inserting a new dictionary row if absent.
fn resolve_keyword(conn: &Connection, text: &str) -> rusqlite::Result<i64> {
  let existing: Option<i64> = conn
    .query_row(
      "SELECT keyword_id FROM keywords WHERE text = ?1",
      params![text],
      |row| row.get(0),
    )
    .optional()?;

  match existing {
    Some(id) => Ok(id),
    None => {
      conn.execute("INSERT INTO keywords (text) VALUES (?1)", params![text])?;
      Ok(conn.last_insert_rowid())
    }
  }
}

/// Replace the owner's whole association set inside one transaction.
///
/// Returns `false` without writing anything if the owner row is missing.
fn replace_keywords(
  conn: &mut Connection,
  owner: Owner,
  id: i64,
  keywords: &[String],
) -> rusqlite::Result<bool> {
  let tx = conn.transaction()?;

  if !exists(&tx, owner, id)? {
    return Ok(false);
  }

  tx.execute(owner.clear_sql(), params![id])?;
  for text in keywords {
    let keyword_id = resolve_keyword(&tx, text)?;
    tx.execute(owner.link_sql(), params![id, keyword_id])?;
  }

  tx.commit()?;
  Ok(true)
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A keyword store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        let tx = conn.transaction()?;
        for text in RESERVED_KEYWORDS {
          tx.execute(SEED_RESERVED, params![text])?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn upsert(&self, owner: Owner, id: i64) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(owner.upsert_sql(), params![id])?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn replace(&self, owner: Owner, id: i64, keywords: Vec<String>) -> Result<bool> {
    let found = self
      .conn
      .call(move |conn| Ok(replace_keywords(conn, owner, id, &keywords)?))
      .await?;
    Ok(found)
  }

  async fn keywords_of(&self, owner: Owner, id: i64) -> Result<Vec<String>> {
    let texts = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(owner.keywords_sql())?;
        let rows = stmt
          .query_map(params![id], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(texts)
  }

  /// Keyword texts currently associated with `user`, in insertion order.
  pub async fn user_keywords(&self, user: UserId) -> Result<Vec<String>> {
    self.keywords_of(Owner::User, user.get()).await
  }

  /// Keyword texts currently associated with `product`, in insertion order.
  pub async fn product_keywords(&self, product: ProductId) -> Result<Vec<String>> {
    self.keywords_of(Owner::Product, product.get()).await
  }

  /// Dictionary id of `text`, if it has ever been recorded.
  pub async fn keyword_id(&self, text: &str) -> Result<Option<i64>> {
    let text = text.to_owned();
    let id = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT keyword_id FROM keywords WHERE text = ?1",
              params![text],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(id)
  }
}

// ─── KeywordStore impl ───────────────────────────────────────────────────────

impl KeywordStore for SqliteStore {
  type Error = Error;

  async fn upsert_user(&self, id: UserId) -> Result<()> {
    self.upsert(Owner::User, id.get()).await
  }

  async fn upsert_product(&self, id: ProductId) -> Result<()> {
    self.upsert(Owner::Product, id.get()).await
  }

  async fn replace_user_keywords(&self, id: UserId, keywords: Vec<String>) -> Result<()> {
    let count = keywords.len();
    if !self.replace(Owner::User, id.get(), keywords).await? {
      return Err(Error::UserNotFound(id));
    }
    tracing::debug!(user_id = %id, keywords = count, "replaced user keywords");
    Ok(())
  }

  async fn replace_product_keywords(
    &self,
    id: ProductId,
    keywords: Vec<String>,
  ) -> Result<()> {
    let count = keywords.len();
    if !self.replace(Owner::Product, id.get(), keywords).await? {
      return Err(Error::ProductNotFound(id));
    }
    tracing::debug!(product_id = %id, keywords = count, "replaced product keywords");
    Ok(())
  }

  async fn product_ids_for_user(&self, id: UserId) -> Result<Vec<ProductId>> {
    let raw = id.get();

    let rows: Option<Vec<i64>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !exists(&tx, Owner::User, raw)? {
          return Ok(None);
        }
        let ids = {
          let mut stmt = tx.prepare(MATCH_PRODUCTS)?;
          stmt
            .query_map(params![raw], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?
        };
        tx.commit()?;
        Ok(Some(ids))
      })
      .await?;

    let rows = rows.ok_or(Error::UserNotFound(id))?;
    rows
      .into_iter()
      .map(|raw| ProductId::new(raw).map_err(Error::from))
      .collect()
  }
}
