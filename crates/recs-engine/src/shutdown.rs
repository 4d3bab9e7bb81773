//! Process-wide cancellation signal.

use std::sync::Arc;

use tokio::sync::watch;

/// A latch that flips once from running to shut down.
///
/// Cloning is cheap, and every clone observes the same latch. Waiters that
/// start after [`Shutdown::trigger`] return immediately.
#[derive(Debug, Clone)]
pub struct Shutdown {
  tx: Arc<watch::Sender<bool>>,
}

impl Default for Shutdown {
  fn default() -> Self { Self::new() }
}

impl Shutdown {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(false);
    Self { tx: Arc::new(tx) }
  }

  pub fn trigger(&self) { self.tx.send_replace(true); }

  pub fn is_triggered(&self) -> bool { *self.tx.borrow() }

  /// Resolve once the latch has been triggered.
  pub async fn wait(&self) {
    let mut rx = self.tx.subscribe();
    let _ = rx.wait_for(|triggered| *triggered).await;
  }
}
