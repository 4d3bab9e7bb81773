//! Error type for `recs-store-sqlite`.

use recs_core::{Entity, ProductId, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("user not found: {0}")]
  UserNotFound(UserId),

  #[error("product not found: {0}")]
  ProductNotFound(ProductId),

  /// A stored id was not a valid positive identifier.
  #[error("corrupt row: {0}")]
  CorruptRow(#[from] recs_core::id::InvalidId),
}

impl From<Error> for recs_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::UserNotFound(id) => recs_core::Error::NotFound(Entity::User(id)),
      Error::ProductNotFound(id) => recs_core::Error::NotFound(Entity::Product(id)),
      other => recs_core::Error::storage(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
