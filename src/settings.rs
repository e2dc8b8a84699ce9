//! User-tunable playback settings, persisted in the shared store.

use tracing::warn;

use crate::constants::constants;
use crate::store::Store;

const SKIP_BACKWARD_KEY: &str = "skipBackwardTime";
const SKIP_FORWARD_KEY: &str = "skipForwardTime";
const HOLD_SPEED_KEY: &str = "holdSpeedRate";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
  pub skip_backward: u32,
  pub skip_forward: u32,
  pub hold_speed: f64,
}

impl Default for Settings {
  fn default() -> Self {
    let c = constants();
    Self { skip_backward: c.default_skip_secs, skip_forward: c.default_skip_secs, hold_speed: c.default_hold_speed }
  }
}

impl Settings {
  pub fn load(store: &dyn Store) -> Self {
    let defaults = Self::default();
    let read = |key: &str| match store.get(key) {
      Ok(value) => value,
      Err(e) => {
        warn!(err = %e, key, "settings: read failed, using default");
        None
      }
    };
    Self {
      skip_backward: read(SKIP_BACKWARD_KEY).and_then(|v| v.parse().ok()).unwrap_or(defaults.skip_backward),
      skip_forward: read(SKIP_FORWARD_KEY).and_then(|v| v.parse().ok()).unwrap_or(defaults.skip_forward),
      hold_speed: read(HOLD_SPEED_KEY).and_then(|v| v.parse().ok()).unwrap_or(defaults.hold_speed),
    }
  }

  pub fn save(&self, store: &dyn Store) {
    let writes = [
      (SKIP_BACKWARD_KEY, self.skip_backward.to_string()),
      (SKIP_FORWARD_KEY, self.skip_forward.to_string()),
      (HOLD_SPEED_KEY, self.hold_speed.to_string()),
    ];
    for (key, value) in writes {
      if let Err(e) = store.set(key, &value) {
        warn!(err = %e, key, "settings: write failed");
      }
    }
  }

  /// Apply a `backward,forward,hold_speed` triple, e.g. `10,30,2.5`.
  ///
  /// Each part is applied independently; parts that don't parse or are out of range are
  /// skipped. Returns `None` when the input isn't three comma-separated values, otherwise
  /// whether anything changed.
  pub fn apply_input(&mut self, input: &str) -> Option<bool> {
    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    if parts.len() != 3 {
      return None;
    }
    let mut changed = false;
    if let Ok(backward) = parts[0].parse::<u32>()
      && backward > 0
    {
      self.skip_backward = backward;
      changed = true;
    }
    if let Ok(forward) = parts[1].parse::<u32>()
      && forward > 0
    {
      self.skip_forward = forward;
      changed = true;
    }
    if let Ok(speed) = parts[2].parse::<f64>()
      && speed > 0.1
      && speed.is_finite()
    {
      self.hold_speed = speed;
      changed = true;
    }
    Some(changed)
  }
}

/// Clamp a playback rate into the range the player accepts.
pub fn clamp_rate(rate: f64) -> f64 {
  let c = constants();
  rate.clamp(c.min_playback_rate, c.max_playback_rate)
}

/// Next entry of the speed menu after `current` (wrapping).
pub fn next_speed(current: f64) -> f64 {
  let options = &constants().speed_options;
  options.iter().copied().find(|&s| s > current + 1e-9).or_else(|| options.first().copied()).unwrap_or(1.0)
}
