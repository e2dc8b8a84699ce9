//! Resumable playback positions keyed by resolved URL.
//!
//! Store failures never reach the player: a failed read means "nothing to restore"
//! and a failed write is logged and forgotten.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::constants::constants;
use crate::store::Store;

#[derive(Clone)]
pub struct PlaybackMemory {
  store: Arc<dyn Store>,
  prefix: String,
  end_buffer: f64,
}

impl PlaybackMemory {
  pub fn new(store: Arc<dyn Store>) -> Self {
    let c = constants();
    Self { store, prefix: c.storage_prefix.clone(), end_buffer: c.end_buffer_secs }
  }

  fn key(&self, url: &str) -> String {
    format!("{}{}", self.prefix, url)
  }

  /// Record `current_time` for `url`, or drop the record when playback is inside the end buffer.
  pub fn save(&self, url: &str, current_time: f64, duration: f64) {
    if duration == 0.0 || !duration.is_finite() || !current_time.is_finite() {
      return;
    }
    let key = self.key(url);
    if current_time > duration - self.end_buffer {
      debug!(url = %url, current_time, duration, "memory: near end, dropping record");
      if let Err(e) = self.store.remove(&key) {
        warn!(err = %e, "memory: failed to remove playback record");
      }
      return;
    }
    if let Err(e) = self.store.set(&key, &current_time.to_string()) {
      warn!(err = %e, "memory: failed to save playback record");
    }
  }

  /// Offset to resume from, only when it lies strictly inside `(0, duration)`.
  pub fn load(&self, url: &str, duration: f64) -> Option<f64> {
    let raw = match self.store.get(&self.key(url)) {
      Ok(raw) => raw?,
      Err(e) => {
        warn!(err = %e, "memory: failed to read playback record");
        return None;
      }
    };
    let offset: f64 = raw.trim().parse().ok()?;
    (offset > 0.0 && offset < duration).then_some(offset)
  }

  pub fn clear(&self, url: &str) {
    if let Err(e) = self.store.remove(&self.key(url)) {
      warn!(err = %e, "memory: failed to clear playback record");
    }
  }
}
