//! Cross-component "play this URL" notification.
//!
//! [`PlayBus`] wraps a `tokio::sync::broadcast` channel. The extractor publishes and
//! forgets; the overlay player subscribes and treats every payload as already resolved.

use tokio::sync::broadcast;
use tracing::debug;

/// Name of the play notification, as shown in logs.
pub const START_FLOATING_VIDEO: &str = "START_FLOATING_VIDEO";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayRequest {
  pub url: String,
}

#[derive(Clone)]
pub struct PlayBus {
  tx: broadcast::Sender<PlayRequest>,
}

impl PlayBus {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity.max(1));
    Self { tx }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<PlayRequest> {
    self.tx.subscribe()
  }

  /// Fire-and-forget. Returns how many subscribers will see the request.
  pub fn publish(&self, url: &str) -> usize {
    match self.tx.send(PlayRequest { url: url.to_string() }) {
      Ok(n) => {
        debug!(event = START_FLOATING_VIDEO, url = %url, subscribers = n, "events: published");
        n
      }
      Err(_) => {
        debug!(event = START_FLOATING_VIDEO, url = %url, "events: no subscribers");
        0
      }
    }
  }
}

impl Default for PlayBus {
  fn default() -> Self {
    Self::new(16)
  }
}

/// Drain everything currently queued on `rx`, keeping only the latest request.
/// A lagged receiver just skips the requests it missed.
pub fn latest(rx: &mut broadcast::Receiver<PlayRequest>) -> Option<PlayRequest> {
  let mut latest = None;
  loop {
    match rx.try_recv() {
      Ok(req) => latest = Some(req),
      Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
        debug!(skipped, "events: play receiver lagged");
      }
      Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => return latest,
    }
  }
}
