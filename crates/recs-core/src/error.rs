//! Error taxonomy shared by every layer of the service.
//!
//! Each failure belongs to exactly one [`ErrorKind`]. Backends keep their own
//! error enums and convert into [`Error`] at the trait boundary, so the
//! repository and the dispatcher only ever reason about these five kinds.

use std::fmt;

use thiserror::Error;

use crate::{ProductId, UserId, cache::CacheError, event::DecodeError};

/// The entity a [`Error::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
  User(UserId),
  Product(ProductId),
}

impl fmt::Display for Entity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Entity::User(id) => write!(f, "user {id}"),
      Entity::Product(id) => write!(f, "product {id}"),
    }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0} not found")]
  NotFound(Entity),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("cache unavailable: {0}")]
  CacheUnavailable(#[from] CacheError),

  #[error("decode error: {0}")]
  Decode(#[from] DecodeError),

  #[error("operation cancelled")]
  Cancelled,
}

/// Payload-free discriminant of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  Storage,
  CacheUnavailable,
  Decode,
  Cancelled,
}

impl Error {
  /// Wrap any backend failure as [`Error::Storage`].
  pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Error::Storage(Box::new(err))
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::NotFound(_) => ErrorKind::NotFound,
      Error::Storage(_) => ErrorKind::Storage,
      Error::CacheUnavailable(_) => ErrorKind::CacheUnavailable,
      Error::Decode(_) => ErrorKind::Decode,
      Error::Cancelled => ErrorKind::Cancelled,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn not_found_display_names_entity() {
    let id = UserId::new(999).unwrap();
    let err = Error::NotFound(Entity::User(id));
    assert_eq!(err.to_string(), "user 999 not found");
    assert_eq!(err.kind(), ErrorKind::NotFound);
  }

  #[test]
  fn cache_errors_classify_as_unavailable() {
    let err: Error = CacheError::ConnectionFailed("refused".into()).into();
    assert_eq!(err.kind(), ErrorKind::CacheUnavailable);
  }

  #[test]
  fn storage_wraps_source() {
    let io = std::io::Error::other("disk on fire");
    let err = Error::storage(io);
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(std::error::Error::source(&err).is_some());
  }
}
