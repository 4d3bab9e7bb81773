//! In-process cache and bus backends.
//!
//! [`MemoryCache`] mirrors the Redis cache contract (TTL, single-key and
//! global invalidation) with LRU eviction on top. [`MemoryBus`] is an
//! acknowledged message log for single-process deployments and tests.

use std::{
  collections::HashMap,
  num::NonZeroUsize,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
  time::Duration,
};

use bytes::Bytes;
use futures_util::{StreamExt as _, stream};
use lru::LruCache;
use tokio::{sync::watch, time::Instant};

use recs_core::{
  ProductId, UserId,
  bus::{BusError, Delivery, EventSource, MessageStream},
  cache::{CacheError, RecommendationCache},
};

// ─── Cache ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct CacheEntry {
  products:   Vec<ProductId>,
  expires_at: Instant,
}

/// In-memory recommendation cache with LRU eviction and lazy expiry.
#[derive(Debug, Clone)]
pub struct MemoryCache {
  entries: Arc<tokio::sync::Mutex<LruCache<UserId, CacheEntry>>>,
}

impl MemoryCache {
  /// A cache holding at most `max_entries` users (at least one).
  pub fn new(max_entries: usize) -> Self {
    let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
    Self { entries: Arc::new(tokio::sync::Mutex::new(LruCache::new(capacity))) }
  }

  /// Number of stored entries, including expired ones not yet evicted.
  pub async fn len(&self) -> usize { self.entries.lock().await.len() }

  pub async fn is_empty(&self) -> bool { self.len().await == 0 }
}

impl RecommendationCache for MemoryCache {
  async fn get(&self, user: UserId) -> Result<Option<Vec<ProductId>>, CacheError> {
    let mut entries = self.entries.lock().await;
    match entries.get(&user) {
      Some(entry) if entry.expires_at <= Instant::now() => {
        entries.pop(&user);
        Ok(None)
      }
      Some(entry) => Ok(Some(entry.products.clone())),
      None => Ok(None),
    }
  }

  async fn set(
    &self,
    user: UserId,
    products: Vec<ProductId>,
    ttl: Duration,
  ) -> Result<(), CacheError> {
    let entry = CacheEntry { products, expires_at: Instant::now() + ttl };
    self.entries.lock().await.put(user, entry);
    Ok(())
  }

  async fn invalidate(&self, user: UserId) -> Result<(), CacheError> {
    self.entries.lock().await.pop(&user);
    Ok(())
  }

  async fn invalidate_all(&self) -> Result<(), CacheError> {
    self.entries.lock().await.clear();
    Ok(())
  }
}

// ─── Bus ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Log {
  entries: Vec<Bytes>,
  acked:   Vec<bool>,
}

#[derive(Debug)]
struct Topic {
  log:         Mutex<Log>,
  /// Current log length, bumped on every publish.
  appended:    watch::Sender<usize>,
  /// One clone per live subscription.
  subscribers: Arc<()>,
}

impl Topic {
  fn new() -> Self {
    Self {
      log:         Mutex::default(),
      appended:    watch::channel(0).0,
      subscribers: Arc::new(()),
    }
  }

  fn log(&self) -> MutexGuard<'_, Log> { self.log.lock().unwrap_or_else(PoisonError::into_inner) }

  /// First unacknowledged entry at or after `from`.
  fn next_pending(&self, from: usize) -> Option<(usize, Bytes)> {
    let log = self.log();
    (from..log.entries.len())
      .find(|&index| !log.acked[index])
      .map(|index| (index, log.entries[index].clone()))
  }
}

/// Read position of one subscription.
struct Cursor {
  topic:       Arc<Topic>,
  next:        usize,
  appended:    watch::Receiver<usize>,
  _subscriber: Arc<()>,
}

impl Cursor {
  async fn next_delivery(&mut self) -> Option<Delivery> {
    loop {
      self.appended.borrow_and_update();
      if let Some((index, payload)) = self.topic.next_pending(self.next) {
        self.next = index + 1;
        return Some(Delivery { id: index.to_string(), payload });
      }
      self.appended.changed().await.ok()?;
    }
  }
}

/// In-process message log with per-message acknowledgement, mirroring the
/// consumer-group semantics of the Redis bus.
///
/// Every subscription reads every entry not yet acknowledged, starting from
/// the oldest. Entries are kept for the lifetime of the bus.
#[derive(Debug, Clone, Default)]
pub struct MemoryBus {
  topics: Arc<Mutex<HashMap<String, Arc<Topic>>>>,
}

impl MemoryBus {
  pub fn new() -> Self { Self::default() }

  fn topic(&self, name: &str) -> Arc<Topic> {
    let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
    topics.entry(name.to_owned()).or_insert_with(|| Arc::new(Topic::new())).clone()
  }

  /// Append `payload` to `topic`; returns the delivery id.
  pub fn publish(&self, topic: &str, payload: impl Into<Bytes>) -> String {
    let topic = self.topic(topic);
    let index = {
      let mut log = topic.log();
      log.entries.push(payload.into());
      log.acked.push(false);
      log.entries.len() - 1
    };
    topic.appended.send_replace(index + 1);
    index.to_string()
  }

  /// Entries of `topic` not yet acknowledged.
  pub fn pending(&self, topic: &str) -> usize {
    self.topic(topic).log().acked.iter().filter(|acked| !**acked).count()
  }

  pub fn subscriber_count(&self, topic: &str) -> usize {
    Arc::strong_count(&self.topic(topic).subscribers) - 1
  }
}

impl EventSource for MemoryBus {
  async fn subscribe<'a>(&'a self, topic: &'a str) -> Result<MessageStream, BusError> {
    let topic = self.topic(topic);
    let cursor = Cursor {
      next:        0,
      appended:    topic.appended.subscribe(),
      _subscriber: topic.subscribers.clone(),
      topic,
    };
    let deliveries = stream::unfold(cursor, |mut cursor| async move {
      let delivery = cursor.next_delivery().await?;
      Some((Ok(delivery), cursor))
    });
    Ok(deliveries.boxed())
  }

  async fn ack<'a>(&'a self, topic: &'a str, id: &'a str) -> Result<(), BusError> {
    let failed = |reason: &str| BusError::AckFailed {
      topic:  topic.to_owned(),
      id:     id.to_owned(),
      reason: reason.to_owned(),
    };
    let index: usize = id.parse().map_err(|_| failed("malformed delivery id"))?;
    let topic_log = self.topic(topic);
    let mut log = topic_log.log();
    let acked = log.acked.get_mut(index).ok_or_else(|| failed("unknown delivery id"))?;
    *acked = true;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use futures_util::StreamExt as _;

  use super::*;

  fn user(id: i64) -> UserId { UserId::new(id).unwrap() }

  fn products(ids: &[i64]) -> Vec<ProductId> {
    ids.iter().map(|&id| ProductId::new(id).unwrap()).collect()
  }

  #[tokio::test]
  async fn miss_then_hit() {
    let cache = MemoryCache::new(8);
    assert_eq!(cache.get(user(1)).await.unwrap(), None);

    cache.set(user(1), products(&[10]), Duration::from_secs(60)).await.unwrap();
    assert_eq!(cache.get(user(1)).await.unwrap(), Some(products(&[10])));
  }

  #[tokio::test]
  async fn empty_list_is_a_hit() {
    let cache = MemoryCache::new(8);
    cache.set(user(1), vec![], Duration::from_secs(60)).await.unwrap();
    assert_eq!(cache.get(user(1)).await.unwrap(), Some(vec![]));
  }

  #[tokio::test(start_paused = true)]
  async fn entries_expire_after_ttl() {
    let cache = MemoryCache::new(8);
    cache.set(user(1), products(&[10]), Duration::from_secs(3600)).await.unwrap();

    tokio::time::advance(Duration::from_secs(3599)).await;
    assert!(cache.get(user(1)).await.unwrap().is_some());

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(cache.get(user(1)).await.unwrap().is_none());
    assert!(cache.is_empty().await);
  }

  #[tokio::test]
  async fn invalidation_single_and_all() {
    let cache = MemoryCache::new(8);
    for id in 1..=3 {
      cache.set(user(id), products(&[id]), Duration::from_secs(60)).await.unwrap();
    }

    cache.invalidate(user(2)).await.unwrap();
    cache.invalidate(user(42)).await.unwrap();
    assert_eq!(cache.get(user(2)).await.unwrap(), None);
    assert_eq!(cache.len().await, 2);

    cache.invalidate_all().await.unwrap();
    assert!(cache.is_empty().await);
  }

  #[tokio::test]
  async fn least_recently_used_is_evicted() {
    let cache = MemoryCache::new(2);
    cache.set(user(1), products(&[1]), Duration::from_secs(60)).await.unwrap();
    cache.set(user(2), products(&[2]), Duration::from_secs(60)).await.unwrap();
    cache.get(user(1)).await.unwrap();
    cache.set(user(3), products(&[3]), Duration::from_secs(60)).await.unwrap();

    assert!(cache.get(user(1)).await.unwrap().is_some());
    assert!(cache.get(user(2)).await.unwrap().is_none());
  }

  async fn next_delivery(messages: &mut MessageStream) -> Delivery {
    tokio::time::timeout(Duration::from_secs(1), messages.next())
      .await
      .expect("delivery within timeout")
      .expect("stream open")
      .unwrap()
  }

  #[tokio::test]
  async fn bus_delivers_to_each_subscriber() {
    let bus = MemoryBus::new();
    let mut a = bus.subscribe("t").await.unwrap();
    let mut b = bus.subscribe("t").await.unwrap();
    assert_eq!(bus.subscriber_count("t"), 2);

    let id = bus.publish("t", &b"hello"[..]);
    assert_eq!(next_delivery(&mut a).await, Delivery { id: id.clone(), payload: "hello".into() });
    assert_eq!(next_delivery(&mut b).await.id, id);

    drop(a);
    assert_eq!(bus.subscriber_count("t"), 1);
  }

  #[tokio::test]
  async fn messages_published_before_subscribing_are_delivered() {
    let bus = MemoryBus::new();
    bus.publish("t", &b"early"[..]);

    let mut messages = bus.subscribe("t").await.unwrap();
    assert_eq!(&next_delivery(&mut messages).await.payload[..], b"early");
  }

  #[tokio::test]
  async fn unacknowledged_messages_are_redelivered() {
    let bus = MemoryBus::new();
    let first = bus.publish("t", &b"one"[..]);
    bus.publish("t", &b"two"[..]);

    let mut messages = bus.subscribe("t").await.unwrap();
    assert_eq!(next_delivery(&mut messages).await.id, first);
    bus.ack("t", &first).await.unwrap();
    assert_eq!(&next_delivery(&mut messages).await.payload[..], b"two");
    drop(messages);
    assert_eq!(bus.pending("t"), 1);

    let mut again = bus.subscribe("t").await.unwrap();
    assert_eq!(&next_delivery(&mut again).await.payload[..], b"two");
  }

  #[tokio::test]
  async fn ack_rejects_unknown_ids() {
    let bus = MemoryBus::new();
    assert!(matches!(bus.ack("t", "7").await, Err(BusError::AckFailed { .. })));
    assert!(matches!(bus.ack("t", "x").await, Err(BusError::AckFailed { .. })));
  }

  #[tokio::test]
  async fn bus_topics_are_isolated() {
    let bus = MemoryBus::new();
    let mut other = bus.subscribe("other").await.unwrap();
    bus.publish("t", &b"elsewhere"[..]);

    let waited = tokio::time::timeout(Duration::from_millis(50), other.next()).await;
    assert!(waited.is_err());
    assert_eq!(bus.pending("other"), 0);
  }
}
