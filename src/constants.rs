//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!`, so there is no runtime file I/O.
//! Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Discovery
  pub media_extensions: Vec<String>,
  pub exclude_keywords: Vec<String>,
  pub min_best_length: usize,
  pub min_list_length: usize,
  pub signed_url_markers: Vec<String>,

  // Probing
  pub probe_concurrency: usize,
  pub probe_timeout_secs: u64,
  pub user_agent: String,

  // Page observer
  pub rescan_debounce_ms: u64,
  pub refresh_interval_secs: u64,

  // Overlay player
  pub target_aspect_ratio: f64,
  pub max_total_height_ratio: f64,
  pub max_content_height_ratio: f64,
  pub top_offset_ratio: f64,
  pub header_rows: u16,
  pub end_buffer_secs: f64,
  pub long_press_ms: u64,

  // Persistence
  pub storage_prefix: String,

  // Settings
  pub default_skip_secs: u32,
  pub default_hold_speed: f64,
  pub speed_options: Vec<f64>,
  pub min_playback_rate: f64,
  pub max_playback_rate: f64,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
