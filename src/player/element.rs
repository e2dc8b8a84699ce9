use anyhow::Result;

/// Playback notifications from the media element.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
  /// A new source has been opened and demuxed.
  FileLoaded,
  /// Duration is known for the current source.
  MetadataLoaded { duration: f64 },
  TimeUpdate { position: f64 },
  Playing,
  Paused,
  Ended,
  Error(String),
}

/// Readiness signals of an adaptive-streaming decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderSignal {
  /// Manifest parsed; playback may start.
  Ready,
  Fatal(String),
}

/// The overlay's single media element.
pub trait MediaElement: Send {
  fn set_source(&mut self, url: &str) -> Result<()>;
  /// Start playback. An error means the platform refused to start it.
  fn play(&mut self) -> Result<()>;
  fn pause(&mut self);
  fn seek(&mut self, position: f64);
  fn current_time(&self) -> f64;
  /// Zero until metadata has loaded.
  fn duration(&self) -> f64;
  fn is_paused(&self) -> bool;
  fn playback_rate(&self) -> f64;
  fn set_playback_rate(&mut self, rate: f64);
  /// Drain queued events, updating cached time, duration and pause state on the way.
  fn poll_events(&mut self) -> Vec<MediaEvent>;
}

/// External adaptive-streaming engine (HLS/DASH). Given a manifest and the target element
/// it reports when playback can start or has failed for good.
pub trait StreamDecoder: Send {
  fn attach(&mut self, manifest_url: &str, element: &mut dyn MediaElement) -> Result<()>;
  fn detach(&mut self);
  fn is_attached(&self) -> bool;
  /// Translate an element event into a decoder signal, if it is one.
  fn signal(&mut self, event: &MediaEvent) -> Option<DecoderSignal>;
}
