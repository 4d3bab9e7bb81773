//! The event dispatcher: turns bus subscriptions into repository writes.
//!
//! One subscriber task per stream pushes raw messages into a shared bounded
//! queue. A single loop drains the queue and applies each message to the
//! repository before taking the next, so writes are totally ordered in queue
//! arrival order. A message is acknowledged on the bus once it has been
//! applied or skipped. A halted message stays unacknowledged, so the next
//! subscription redelivers it along with anything queued behind it. The
//! repository's write path is safe to replay.

use std::{sync::Arc, time::Duration};

use futures_util::StreamExt as _;
use serde::Deserialize;
use thiserror::Error;
use tokio::{
  sync::{mpsc, watch},
  task::{JoinError, JoinSet},
};

use recs_core::{
  Error,
  bus::{BusError, Delivery, EventSource, MessageStream},
  cache::RecommendationCache,
  event::{RawMessage, StreamKind, UpdateEvent},
  store::KeywordStore,
};

use crate::{RecommendationRepository, Shutdown};

/// Capacity of the queue shared by both stream subscribers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

// ─── Configuration ───────────────────────────────────────────────────────────

/// What the dispatch loop does with a message that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
  /// Log, drop the message and continue with the next one.
  Skip,
  /// Log and stop the dispatcher with [`DispatchError::Halted`].
  Halt,
}

/// Failure handling, split by failure origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DispatchPolicy {
  /// Malformed payloads. Replaying them can never succeed.
  pub on_decode_error: OnError,
  /// Store and cache failures while applying a decoded event.
  pub on_write_error:  OnError,
}

impl Default for DispatchPolicy {
  fn default() -> Self {
    Self { on_decode_error: OnError::Skip, on_write_error: OnError::Halt }
  }
}

/// Bus topic names of the two streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
  pub user_updates:    String,
  pub product_updates: String,
}

impl Default for Topics {
  fn default() -> Self {
    Self {
      user_updates:    "user_updates".to_owned(),
      product_updates: "product_updates".to_owned(),
    }
  }
}

impl Topics {
  fn iter(&self) -> [(StreamKind, &str); 2] {
    [
      (StreamKind::UserUpdates, self.user_updates.as_str()),
      (StreamKind::ProductUpdates, self.product_updates.as_str()),
    ]
  }

  fn topic(&self, stream: StreamKind) -> &str {
    match stream {
      StreamKind::UserUpdates => &self.user_updates,
      StreamKind::ProductUpdates => &self.product_updates,
    }
  }
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
  pub topics:         Topics,
  pub queue_capacity: usize,
  pub policy:         DispatchPolicy,
}

impl Default for DispatcherConfig {
  fn default() -> Self {
    Self {
      topics:         Topics::default(),
      queue_capacity: DEFAULT_QUEUE_CAPACITY,
      policy:         DispatchPolicy::default(),
    }
  }
}

// ─── Errors and state ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DispatchError {
  #[error("failed to subscribe: {0}")]
  Subscribe(#[from] BusError),

  #[error("dispatcher halted: {0}")]
  Halted(#[source] Error),

  /// A subscription ended while the dispatcher was still running.
  #[error("{0} stream ended")]
  StreamEnded(StreamKind),

  #[error("subscriber task failed: {0}")]
  Subscriber(#[from] JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
  Running,
  /// Terminal. Reached only through the shutdown signal.
  Stopped,
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

pub struct EventDispatcher<B, S, C> {
  source:   B,
  repo:     Arc<RecommendationRepository<S, C>>,
  config:   DispatcherConfig,
  state:    watch::Sender<DispatcherState>,
  shutdown: Shutdown,
}

impl<B, S, C> EventDispatcher<B, S, C>
where
  B: EventSource,
  S: KeywordStore,
  C: RecommendationCache,
{
  pub fn new(
    source: B,
    repo: Arc<RecommendationRepository<S, C>>,
    config: DispatcherConfig,
    shutdown: Shutdown,
  ) -> Self {
    let (state, _) = watch::channel(DispatcherState::Running);
    Self { source, repo, config, state, shutdown }
  }

  pub fn state(&self) -> DispatcherState { *self.state.borrow() }

  /// Observe state transitions.
  pub fn watch_state(&self) -> watch::Receiver<DispatcherState> { self.state.subscribe() }

  /// Subscribe to both streams and dispatch until shutdown, until either
  /// stream ends, or until a failure the policy says to halt on.
  ///
  /// A message that is being applied when shutdown fires is applied to
  /// completion before this returns.
  pub async fn run(&self) -> Result<(), DispatchError> {
    let (queue, mut inbox) = mpsc::channel(self.config.queue_capacity.max(1));

    let mut subscribers = JoinSet::new();
    for (stream, topic) in self.config.topics.iter() {
      let messages = self.source.subscribe(topic).await?;
      tracing::info!(%stream, topic, "subscribed");
      subscribers.spawn(forward(stream, messages, queue.clone()));
    }
    drop(queue);

    let outcome = loop {
      tokio::select! {
        biased;
        _ = self.shutdown.wait() => break Ok(()),
        Some(joined) = subscribers.join_next() => {
          let error = match joined {
            Ok(stream) => DispatchError::StreamEnded(stream),
            Err(error) => error.into(),
          };
          tracing::error!(%error, "event subscription lost");
          break Err(error);
        }
        next = inbox.recv() => match next {
          Some(queued) => {
            if let Err(error) = self.dispatch(queued).await {
              break Err(error);
            }
          }
          None => break Ok(()),
        },
      }
    };

    subscribers.shutdown().await;
    if self.shutdown.is_triggered() {
      self.state.send_replace(DispatcherState::Stopped);
      tracing::info!("dispatcher stopped");
    }
    outcome
  }

  /// Keep [`run`](Self::run) alive until shutdown, restarting it after
  /// `restart_delay` whenever it halts or a stream ends.
  pub async fn supervise(&self, restart_delay: Duration) {
    loop {
      match self.run().await {
        Ok(()) if self.shutdown.is_triggered() => return,
        Ok(()) => tracing::warn!("dispatcher exited, restarting"),
        Err(error) => tracing::error!(%error, "dispatcher failed, restarting"),
      }

      tokio::select! {
        _ = self.shutdown.wait() => {
          self.state.send_replace(DispatcherState::Stopped);
          return;
        }
        _ = tokio::time::sleep(restart_delay) => {}
      }
    }
  }

  async fn dispatch(&self, queued: Queued) -> Result<(), DispatchError> {
    let Queued { message, id } = queued;
    let stream = message.stream;
    let policy = self.config.policy;

    let outcome = match UpdateEvent::decode_raw(&message) {
      Ok(event) => match self.repo.apply(event).await {
        Ok(()) => Ok(()),
        Err(error) => on_failure(policy.on_write_error, stream, error),
      },
      Err(error) => on_failure(policy.on_decode_error, stream, error.into()),
    };
    outcome?;

    let topic = self.config.topics.topic(stream);
    if let Err(error) = self.source.ack(topic, &id).await {
      // The message was handled; a redelivery is replayed harmlessly.
      tracing::warn!(%stream, %error, "failed to acknowledge message");
    }
    Ok(())
  }
}

fn on_failure(action: OnError, stream: StreamKind, error: Error) -> Result<(), DispatchError> {
  let kind = error.kind();
  match action {
    OnError::Skip => {
      tracing::warn!(%stream, ?kind, %error, "skipping message");
      Ok(())
    }
    OnError::Halt => {
      tracing::error!(%stream, ?kind, %error, "halting dispatcher");
      Err(DispatchError::Halted(error))
    }
  }
}

/// A message waiting in the shared queue, with the id it is acknowledged by.
struct Queued {
  message: RawMessage,
  id:      String,
}

/// Pump one stream into the shared queue until either side closes.
async fn forward(
  stream: StreamKind,
  mut messages: MessageStream,
  queue: mpsc::Sender<Queued>,
) -> StreamKind {
  while let Some(item) = messages.next().await {
    match item {
      Ok(Delivery { id, payload }) => {
        let queued = Queued { message: RawMessage { stream, payload }, id };
        if queue.send(queued).await.is_err() {
          break;
        }
      }
      Err(error) => tracing::warn!(%stream, %error, "failed to receive message"),
    }
  }
  tracing::debug!(%stream, "subscriber finished");
  stream
}
