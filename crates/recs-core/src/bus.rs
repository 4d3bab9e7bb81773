//! The `EventSource` trait: the inbound side of the message bus.
//!
//! A source hands out one independent message stream per topic. Payloads
//! stay undecoded here; the dispatcher decodes them according to the stream
//! they were read from.
//!
//! Delivery is at-least-once. A message stays pending until it is
//! acknowledged with [`EventSource::ack`], and every new subscription to a
//! topic starts with the messages still pending there, in publish order.

use std::future::Future;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;

/// Transport-level failures of the bus itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
  #[error("bus connection failed: {0}")]
  ConnectionFailed(String),
  #[error("subscription to {topic:?} failed: {reason}")]
  SubscribeFailed { topic: String, reason: String },
  #[error("bus receive failed: {0}")]
  Receive(String),
  #[error("acknowledging {id} on {topic:?} failed: {reason}")]
  AckFailed { topic: String, id: String, reason: String },
}

/// One message read from a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
  /// Bus-assigned id, passed back to [`EventSource::ack`].
  pub id:      String,
  pub payload: Bytes,
}

/// Stream of deliveries read from one topic. Ends when the topic closes or
/// the connection behind it fails.
pub type MessageStream = BoxStream<'static, Result<Delivery, BusError>>;

pub trait EventSource: Send + Sync + 'static {
  /// Start receiving messages published to `topic`, beginning with those
  /// still pending.
  fn subscribe<'a>(
    &'a self,
    topic: &'a str,
  ) -> impl Future<Output = Result<MessageStream, BusError>> + Send + 'a;

  /// Mark delivery `id` on `topic` as processed so it is never delivered
  /// again.
  fn ack<'a>(
    &'a self,
    topic: &'a str,
    id: &'a str,
  ) -> impl Future<Output = Result<(), BusError>> + Send + 'a;
}
