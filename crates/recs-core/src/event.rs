//! Update events delivered over the message bus.
//!
//! Each logical stream carries exactly one payload shape. The stream a raw
//! message arrived on decides how it is decoded, and the result is a
//! [`UpdateEvent`] variant: no later code inspects strings to route it.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ProductId, UserId};

// ─── Streams ─────────────────────────────────────────────────────────────────

/// The two logical event streams the dispatcher subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
  UserUpdates,
  ProductUpdates,
}

impl fmt::Display for StreamKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      StreamKind::UserUpdates => "user updates",
      StreamKind::ProductUpdates => "product updates",
    })
  }
}

/// An undecoded message tagged with the stream it was read from.
#[derive(Debug, Clone)]
pub struct RawMessage {
  pub stream:  StreamKind,
  pub payload: Bytes,
}

// ─── Payloads ────────────────────────────────────────────────────────────────

/// A user's complete, current set of declared interests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
  pub user_id:   UserId,
  #[serde(default)]
  pub interests: Vec<String>,
}

/// What happened to a product. Anything other than `"delete"` is an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProductAction {
  #[default]
  Update,
  Delete,
}

impl From<String> for ProductAction {
  fn from(raw: String) -> Self {
    if raw.eq_ignore_ascii_case("delete") {
      ProductAction::Delete
    } else {
      ProductAction::Update
    }
  }
}

impl From<ProductAction> for String {
  fn from(action: ProductAction) -> Self {
    match action {
      ProductAction::Update => "update".to_owned(),
      ProductAction::Delete => "delete".to_owned(),
    }
  }
}

/// A product's complete, current keyword set, or its removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
  pub product_id: ProductId,
  #[serde(default)]
  pub keywords:   Vec<String>,
  #[serde(default)]
  pub action:     ProductAction,
}

// ─── Decoding ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("malformed payload on {stream} stream: {source}")]
pub struct DecodeError {
  pub stream: StreamKind,
  #[source]
  pub source: serde_json::Error,
}

/// A decoded bus message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
  User(UserUpdate),
  Product(ProductUpdate),
}

impl UpdateEvent {
  /// Decode a JSON payload according to the stream it arrived on.
  pub fn decode(stream: StreamKind, payload: &[u8]) -> Result<Self, DecodeError> {
    let wrap = |source| DecodeError { stream, source };
    match stream {
      StreamKind::UserUpdates => {
        serde_json::from_slice(payload).map(UpdateEvent::User).map_err(wrap)
      }
      StreamKind::ProductUpdates => {
        serde_json::from_slice(payload).map(UpdateEvent::Product).map_err(wrap)
      }
    }
  }

  pub fn decode_raw(msg: &RawMessage) -> Result<Self, DecodeError> {
    Self::decode(msg.stream, &msg.payload)
  }
}
