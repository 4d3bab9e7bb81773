//! Externally assigned entity identifiers.
//!
//! Users and products are never created with a generated id here; the
//! producing services own id assignment. Both ids are positive integers, and
//! deserialisation rejects anything else.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected raw identifier (zero or negative).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("identifier must be a positive integer, got {0}")]
pub struct InvalidId(pub i64);

macro_rules! positive_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(try_from = "i64", into = "i64")]
    pub struct $name(i64);

    impl $name {
      /// Wrap `raw`, rejecting non-positive values.
      pub fn new(raw: i64) -> Result<Self, InvalidId> {
        if raw > 0 { Ok(Self(raw)) } else { Err(InvalidId(raw)) }
      }

      pub fn get(self) -> i64 { self.0 }
    }

    impl TryFrom<i64> for $name {
      type Error = InvalidId;

      fn try_from(raw: i64) -> Result<Self, Self::Error> { Self::new(raw) }
    }

    impl From<$name> for i64 {
      fn from(id: $name) -> i64 { id.0 }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
      }
    }
  };
}

positive_id! {
  /// Identifier of a user, as assigned by the user service.
  UserId
}

positive_id! {
  /// Identifier of a product, as assigned by the product service.
  ProductId
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_non_positive() {
    assert_eq!(UserId::new(0), Err(InvalidId(0)));
    assert_eq!(ProductId::new(-4), Err(InvalidId(-4)));
    assert_eq!(UserId::new(7).map(UserId::get), Ok(7));
  }

  #[test]
  fn deserialize_validates() {
    let ok: ProductId = serde_json::from_str("10").unwrap();
    assert_eq!(ok.get(), 10);
    assert!(serde_json::from_str::<UserId>("-1").is_err());
  }
}
