//! Redis Streams event source.
//!
//! Each topic is a stream whose entries carry the JSON payload in one field.
//! Subscribers read through a consumer group, so an entry stays pending
//! until it is acknowledged with `XACK`. A new subscription first replays
//! the consumer's own pending entries, then blocks for new ones.

use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::{StreamExt as _, stream};
use redis::{
  AsyncCommands as _,
  aio::MultiplexedConnection,
  streams::{StreamId, StreamReadOptions, StreamReadReply},
};

use recs_core::bus::{BusError, Delivery, EventSource, MessageStream};

use crate::{CONNECT_TIMEOUT, error::map_subscribe_error};

/// Stream entry field holding the message payload.
pub const PAYLOAD_FIELD: &str = "payload";

/// Entries fetched per `XREADGROUP`.
const READ_COUNT: usize = 16;

/// How long one `XREADGROUP` waits for new entries before asking again.
const BLOCK_MS: usize = 1_000;

/// Message bus backed by Redis Streams and one consumer group.
#[derive(Clone)]
pub struct RedisBus {
  client:   redis::Client,
  conn:     MultiplexedConnection,
  group:    String,
  consumer: String,
}

impl RedisBus {
  /// Connect to `url` and read as `consumer` within `group`.
  ///
  /// A consumer name should be stable across restarts of the same process,
  /// so that its pending entries are redelivered to it.
  pub async fn new(url: &str, group: &str, consumer: &str) -> Result<Self, BusError> {
    let client =
      redis::Client::open(url).map_err(|e| BusError::ConnectionFailed(e.to_string()))?;
    let conn = connect(&client).await?;

    Ok(Self { client, conn, group: group.to_owned(), consumer: consumer.to_owned() })
  }

  /// Append a raw payload to `topic`; returns the entry id.
  pub async fn publish(&self, topic: &str, payload: &[u8]) -> Result<String, BusError> {
    let mut conn = self.conn.clone();
    conn
      .xadd(topic, "*", &[(PAYLOAD_FIELD, payload)])
      .await
      .map_err(|e| BusError::Receive(e.to_string()))
  }

  /// Create the consumer group on `topic` unless it already exists.
  async fn ensure_group(
    &self,
    conn: &mut MultiplexedConnection,
    topic: &str,
  ) -> Result<(), BusError> {
    let created: Result<(), redis::RedisError> =
      conn.xgroup_create_mkstream(topic, &self.group, "0").await;
    match created {
      Ok(()) => {
        tracing::info!(topic, group = %self.group, "created consumer group");
        Ok(())
      }
      Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
      Err(e) => Err(map_subscribe_error(topic, e)),
    }
  }
}

async fn connect(client: &redis::Client) -> Result<MultiplexedConnection, BusError> {
  tokio::time::timeout(CONNECT_TIMEOUT, client.get_multiplexed_async_connection())
    .await
    .map_err(|_| BusError::ConnectionFailed(format!("no connection within {CONNECT_TIMEOUT:?}")))?
    .map_err(|e| BusError::ConnectionFailed(e.to_string()))
}

impl EventSource for RedisBus {
  async fn subscribe<'a>(&'a self, topic: &'a str) -> Result<MessageStream, BusError> {
    // Blocking reads get their own connection so they never stall acks.
    let mut conn = connect(&self.client).await?;
    self.ensure_group(&mut conn, topic).await?;
    tracing::info!(
      topic,
      group = %self.group,
      consumer = %self.consumer,
      "subscribed to redis stream"
    );

    let reader = Reader {
      conn,
      topic: topic.to_owned(),
      group: self.group.clone(),
      consumer: self.consumer.clone(),
      backlog: Some("0".to_owned()),
      buffered: VecDeque::new(),
      failed: false,
    };
    let deliveries = stream::unfold(reader, |mut reader| async move {
      let item = reader.next().await?;
      Some((item, reader))
    });
    Ok(deliveries.boxed())
  }

  async fn ack<'a>(&'a self, topic: &'a str, id: &'a str) -> Result<(), BusError> {
    let mut conn = self.conn.clone();
    let _: i64 = conn.xack(topic, &self.group, &[id]).await.map_err(|e| BusError::AckFailed {
      topic:  topic.to_owned(),
      id:     id.to_owned(),
      reason: e.to_string(),
    })?;
    Ok(())
  }
}

/// State of one consumer-group subscription.
struct Reader {
  conn:     MultiplexedConnection,
  topic:    String,
  group:    String,
  consumer: String,
  /// Where the pending-entry replay continues; `None` once it is drained.
  backlog:  Option<String>,
  buffered: VecDeque<Delivery>,
  failed:   bool,
}

impl Reader {
  /// Next delivery, or `None` after a read error has been reported.
  async fn next(&mut self) -> Option<Result<Delivery, BusError>> {
    loop {
      if let Some(delivery) = self.buffered.pop_front() {
        return Some(Ok(delivery));
      }
      if self.failed {
        return None;
      }
      if let Err(error) = self.read().await {
        self.failed = true;
        return Some(Err(error));
      }
    }
  }

  async fn read(&mut self) -> Result<(), BusError> {
    let options =
      StreamReadOptions::default().group(&self.group, &self.consumer).count(READ_COUNT);
    let (start, options) = match &self.backlog {
      Some(after) => (after.clone(), options),
      None => (">".to_owned(), options.block(BLOCK_MS)),
    };

    let reply: Option<StreamReadReply> = self
      .conn
      .xread_options(&[&self.topic], &[&start], &options)
      .await
      .map_err(|e| BusError::Receive(e.to_string()))?;

    let entries: Vec<StreamId> =
      reply.into_iter().flat_map(|r| r.keys).flat_map(|key| key.ids).collect();

    if self.backlog.is_some() {
      self.backlog = entries.last().map(|entry| entry.id.clone());
      if self.backlog.is_none() {
        tracing::debug!(topic = %self.topic, "pending entries replayed");
      }
    }

    for entry in entries {
      // Entries deleted while pending come back without fields.
      let payload: Vec<u8> = entry.get(PAYLOAD_FIELD).unwrap_or_default();
      self.buffered.push_back(Delivery { id: entry.id, payload: Bytes::from(payload) });
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
  }

  fn test_topic(name: &str) -> String { format!("recs-test-{}-{name}", std::process::id()) }

  async fn next_delivery(messages: &mut MessageStream) -> Delivery {
    tokio::time::timeout(Duration::from_secs(5), messages.next())
      .await
      .expect("message within timeout")
      .expect("stream still open")
      .unwrap()
  }

  #[tokio::test]
  async fn test_redis_bus_unreachable_server_fails_fast() {
    let result = tokio::time::timeout(
      CONNECT_TIMEOUT * 2,
      RedisBus::new("redis://127.0.0.1:1", "recs", "test"),
    )
    .await
    .expect("connect attempt is bounded");

    assert!(matches!(result, Err(BusError::ConnectionFailed(_))));
  }

  #[tokio::test]
  #[ignore = "needs a Redis server at REDIS_URL"]
  async fn test_redis_bus_delivers_published_payload() {
    let bus = RedisBus::new(&redis_url(), "recs-test", "one").await.unwrap();
    let topic = test_topic("deliver");

    let mut messages = bus.subscribe(&topic).await.unwrap();
    let id = bus.publish(&topic, br#"{"userId":1}"#).await.unwrap();

    let received = next_delivery(&mut messages).await;
    assert_eq!(received.id, id);
    assert_eq!(&received.payload[..], br#"{"userId":1}"#);
    bus.ack(&topic, &received.id).await.unwrap();
  }

  #[tokio::test]
  #[ignore = "needs a Redis server at REDIS_URL"]
  async fn test_redis_bus_redelivers_unacknowledged_entries() {
    let bus = RedisBus::new(&redis_url(), "recs-test", "two").await.unwrap();
    let topic = test_topic("redeliver");

    let mut first = bus.subscribe(&topic).await.unwrap();
    bus.publish(&topic, b"a").await.unwrap();
    bus.publish(&topic, b"b").await.unwrap();
    let a = next_delivery(&mut first).await;
    bus.ack(&topic, &a.id).await.unwrap();
    let b = next_delivery(&mut first).await;
    drop(first);

    let mut second = bus.subscribe(&topic).await.unwrap();
    let again = next_delivery(&mut second).await;
    assert_eq!(again, b);
    bus.ack(&topic, &again.id).await.unwrap();

    bus.publish(&topic, b"c").await.unwrap();
    assert_eq!(&next_delivery(&mut second).await.payload[..], b"c");
  }
}
