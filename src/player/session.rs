//! The single overlay player and its lifecycle.
//!
//! ```text
//! NotFound -> Searching -> Found -> Open -> Found
//!                            ^        |
//!                            |        +--> Open (new URL)
//! ```
//!
//! The media element is created once and reused. Reopening the same URL shows it again and
//! resumes; a new URL re-attaches the decoder and drops the cached geometry.

use tracing::{debug, error, info, warn};

use super::element::{DecoderSignal, MediaElement, MediaEvent, StreamDecoder};
use super::geometry::{self, Geometry, Viewport};
use crate::dom::HostMedia;
use crate::media::is_manifest;
use crate::memory::PlaybackMemory;
use crate::settings::clamp_rate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
  NotFound,
  /// Identity probe in flight.
  Searching,
  /// Resolved URL cached, overlay closed.
  Found,
  Open,
}

/// What the toggle control shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleIndicator {
  Searching,
  Found,
  PlayingClose,
  NothingFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
  Playing,
  /// Waiting for the stream decoder's ready signal.
  AwaitingDecoder,
  /// Playback refused; the element stays paused and controllable.
  AutoplayRejected,
  /// The source could not be loaded.
  Failed(String),
}

pub struct OverlayPlayer<E: MediaElement, D: StreamDecoder> {
  state: PlayerState,
  current_url: Option<String>,
  /// URL the element currently holds, if any.
  loaded_url: Option<String>,
  element: E,
  decoder: D,
  awaiting_ready: bool,
  restore_pending: bool,
  geometry: Option<Geometry>,
  viewport: Viewport,
  header_height: f64,
  memory: PlaybackMemory,
  host_media: Box<dyn HostMedia>,
  /// Page media paused by the last open.
  host_paused: usize,
  /// Playback failure not yet shown to the user.
  failure: Option<String>,
}

impl<E: MediaElement, D: StreamDecoder> OverlayPlayer<E, D> {
  pub fn new(element: E, decoder: D, memory: PlaybackMemory, host_media: Box<dyn HostMedia>, viewport: Viewport) -> Self {
    Self {
      state: PlayerState::NotFound,
      current_url: None,
      loaded_url: None,
      element,
      decoder,
      awaiting_ready: false,
      restore_pending: false,
      geometry: None,
      viewport,
      header_height: 0.0,
      memory,
      host_media,
      host_paused: 0,
      failure: None,
    }
  }

  pub fn with_header_height(mut self, header_height: f64) -> Self {
    self.header_height = header_height;
    self
  }

  pub fn state(&self) -> PlayerState {
    self.state
  }

  pub fn is_open(&self) -> bool {
    self.state == PlayerState::Open
  }

  pub fn current_url(&self) -> Option<&str> {
    self.current_url.as_deref()
  }

  pub fn geometry(&self) -> Option<Geometry> {
    self.geometry
  }

  /// Where the overlay goes right now: the cached geometry, or one for the current viewport
  /// while the source has not loaded yet.
  pub fn placement(&self) -> Geometry {
    self.geometry.unwrap_or_else(|| geometry::compute(self.viewport, self.header_height))
  }

  pub fn host_media_paused(&self) -> usize {
    self.host_paused
  }

  /// The latest playback failure, once.
  pub fn take_failure(&mut self) -> Option<String> {
    self.failure.take()
  }

  pub fn element(&self) -> &E {
    &self.element
  }

  pub fn element_mut(&mut self) -> &mut E {
    &mut self.element
  }

  pub fn indicator(&self) -> ToggleIndicator {
    match self.state {
      PlayerState::NotFound => ToggleIndicator::NothingFound,
      PlayerState::Searching => ToggleIndicator::Searching,
      PlayerState::Found => ToggleIndicator::Found,
      PlayerState::Open => ToggleIndicator::PlayingClose,
    }
  }

  /// Viewport used for the next geometry computation. A cached geometry is kept.
  pub fn set_viewport(&mut self, viewport: Viewport) {
    self.viewport = viewport;
  }

  /// Swap in the media elements of a freshly parsed page.
  pub fn set_host_media(&mut self, host_media: Box<dyn HostMedia>) {
    self.host_media = host_media;
  }

  /// An identity probe started. While open the player keeps playing; a result will re-enter `Open`.
  pub fn begin_search(&mut self) {
    if self.state != PlayerState::Open {
      self.state = PlayerState::Searching;
    }
  }

  /// Outcome of a discovery + identity probe round.
  pub fn search_finished(&mut self, resolved: Option<String>) -> Option<PlayOutcome> {
    match (self.state, resolved) {
      (PlayerState::Open, Some(url)) if self.current_url.as_deref() != Some(url.as_str()) => {
        info!(url = %url, "player: re-parse found a new source");
        Some(self.open(&url))
      }
      (PlayerState::Open, _) => None,
      (_, Some(url)) => {
        debug!(url = %url, "player: source found");
        self.current_url = Some(url);
        self.state = PlayerState::Found;
        None
      }
      (_, None) => {
        self.state = if self.current_url.is_some() { PlayerState::Found } else { PlayerState::NotFound };
        None
      }
    }
  }

  /// Toggle control: open a found source, close an open one. Nothing to do otherwise.
  pub fn toggle(&mut self) -> Option<PlayOutcome> {
    match self.state {
      PlayerState::Open => {
        self.close();
        None
      }
      PlayerState::Found => {
        let url = self.current_url.clone()?;
        Some(self.open(&url))
      }
      PlayerState::NotFound | PlayerState::Searching => None,
    }
  }

  /// Show the overlay playing `url`, which is taken as already resolved.
  pub fn open(&mut self, url: &str) -> PlayOutcome {
    if self.loaded_url.as_deref() == Some(url) {
      debug!(url = %url, "player: reopening current source");
      self.current_url = Some(url.to_string());
      self.state = PlayerState::Open;
      self.silence_host_media(url);
      if self.awaiting_ready {
        return PlayOutcome::AwaitingDecoder;
      }
      return self.attempt_play();
    }

    if self.state == PlayerState::Open {
      self.remember_position();
    }
    if self.decoder.is_attached() {
      self.decoder.detach();
    }
    self.geometry = None;
    self.awaiting_ready = false;
    self.restore_pending = true;
    self.current_url = Some(url.to_string());
    self.loaded_url = Some(url.to_string());
    self.state = PlayerState::Open;
    info!(url = %url, "player: opening");
    self.silence_host_media(url);

    if is_manifest(url) {
      match self.decoder.attach(url, &mut self.element) {
        Ok(()) => {
          self.awaiting_ready = true;
          PlayOutcome::AwaitingDecoder
        }
        Err(e) => {
          error!(url = %url, err = %e, "player: decoder attach failed");
          self.load_failed();
          PlayOutcome::Failed(format!("{:#}", e))
        }
      }
    } else {
      match self.element.set_source(url) {
        Ok(()) => self.attempt_play(),
        Err(e) => {
          error!(url = %url, err = %e, "player: failed to set source");
          self.load_failed();
          PlayOutcome::Failed(format!("{:#}", e))
        }
      }
    }
  }

  /// Hide the overlay: pause and remember the position.
  pub fn close(&mut self) {
    if self.state != PlayerState::Open {
      return;
    }
    self.element.pause();
    self.remember_position();
    self.state = PlayerState::Found;
    debug!("player: closed");
  }

  /// Host is going away; keep the last few seconds of progress.
  pub fn unload(&mut self) {
    if self.loaded_url.is_some() {
      self.remember_position();
    }
  }

  /// Pump queued element events through the state machine.
  pub fn poll(&mut self) {
    for event in self.element.poll_events() {
      self.handle_event(&event);
    }
  }

  pub fn handle_event(&mut self, event: &MediaEvent) {
    if matches!(event, MediaEvent::FileLoaded | MediaEvent::MetadataLoaded { .. }) && self.geometry.is_none() {
      // Live streams may never report a duration.
      self.geometry = Some(geometry::compute(self.viewport, self.header_height));
    }
    if self.decoder.is_attached()
      && let Some(signal) = self.decoder.signal(event)
    {
      match signal {
        DecoderSignal::Ready => {
          if self.awaiting_ready {
            self.awaiting_ready = false;
            if self.state == PlayerState::Open {
              self.attempt_play();
            }
          }
        }
        DecoderSignal::Fatal(msg) => {
          error!(err = %msg, "player: stream decoder failed");
          self.awaiting_ready = false;
          self.element.pause();
          self.playback_failed(msg);
        }
      }
      return;
    }

    match event {
      MediaEvent::MetadataLoaded { duration } => self.metadata_loaded(*duration),
      MediaEvent::Ended => {
        if let Some(url) = &self.loaded_url {
          debug!(url = %url, "player: ended, clearing position");
          self.memory.clear(url);
        }
      }
      MediaEvent::Error(msg) => {
        error!(err = %msg, "player: playback error");
        self.element.pause();
        self.playback_failed(msg.clone());
      }
      MediaEvent::FileLoaded | MediaEvent::TimeUpdate { .. } | MediaEvent::Playing | MediaEvent::Paused => {}
    }
  }

  pub fn toggle_pause(&mut self) {
    if self.element.is_paused() {
      self.attempt_play();
    } else {
      self.element.pause();
    }
  }

  /// Seek relative to the current position, clamped to the media bounds.
  pub fn skip(&mut self, seconds: f64) {
    let duration = self.element.duration();
    let mut target = (self.element.current_time() + seconds).max(0.0);
    if duration > 0.0 {
      target = target.min(duration);
    }
    self.element.seek(target);
  }

  pub fn set_rate(&mut self, rate: f64) -> f64 {
    let rate = clamp_rate(rate);
    self.element.set_playback_rate(rate);
    rate
  }

  fn metadata_loaded(&mut self, duration: f64) {
    if self.restore_pending {
      self.restore_pending = false;
      if let Some(url) = &self.loaded_url
        && let Some(offset) = self.memory.load(url, duration)
      {
        info!(url = %url, offset, "player: resuming");
        self.element.seek(offset);
      }
    }
  }

  fn attempt_play(&mut self) -> PlayOutcome {
    match self.element.play() {
      Ok(()) => PlayOutcome::Playing,
      Err(e) => {
        warn!(err = %e, "player: autoplay rejected");
        self.element.pause();
        PlayOutcome::AutoplayRejected
      }
    }
  }

  fn silence_host_media(&mut self, url: &str) {
    self.host_paused = self.host_media.pause_all_except(url);
    if self.host_paused > 0 {
      debug!(paused = self.host_paused, "player: paused other page media");
    }
  }

  /// Nothing got loaded: back to `Found` so the toggle can retry.
  fn load_failed(&mut self) {
    self.loaded_url = None;
    self.state = PlayerState::Found;
  }

  /// The element lost its source. Reopening the same URL loads it again.
  fn playback_failed(&mut self, msg: String) {
    self.loaded_url = None;
    self.failure = Some(msg);
  }

  fn remember_position(&mut self) {
    if let Some(url) = &self.loaded_url {
      self.memory.save(url, self.element.current_time(), self.element.duration());
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dom::{PageMedia, PageMediaSet};
  use crate::store::MemoryStore;
  use anyhow::{Result, anyhow};
  use std::sync::{Arc, Mutex};

  #[derive(Default)]
  struct FakeElement {
    calls: Vec<String>,
    time: f64,
    duration: f64,
    paused: bool,
    rate: f64,
    reject_play: bool,
    fail_source: bool,
    queued: Vec<MediaEvent>,
  }

  impl MediaElement for FakeElement {
    fn set_source(&mut self, url: &str) -> Result<()> {
      self.calls.push(format!("src {url}"));
      if self.fail_source {
        return Err(anyhow!("mpv not found"));
      }
      self.time = 0.0;
      self.duration = 0.0;
      Ok(())
    }
    fn play(&mut self) -> Result<()> {
      self.calls.push("play".into());
      if self.reject_play {
        return Err(anyhow!("NotAllowedError"));
      }
      self.paused = false;
      Ok(())
    }
    fn pause(&mut self) {
      self.calls.push("pause".into());
      self.paused = true;
    }
    fn seek(&mut self, position: f64) {
      self.calls.push(format!("seek {position}"));
      self.time = position;
    }
    fn current_time(&self) -> f64 {
      self.time
    }
    fn duration(&self) -> f64 {
      self.duration
    }
    fn is_paused(&self) -> bool {
      self.paused
    }
    fn playback_rate(&self) -> f64 {
      self.rate
    }
    fn set_playback_rate(&mut self, rate: f64) {
      self.rate = rate;
    }
    fn poll_events(&mut self) -> Vec<MediaEvent> {
      std::mem::take(&mut self.queued)
    }
  }

  #[derive(Default)]
  struct FakeDecoder {
    attached: Option<String>,
    log: Arc<Mutex<Vec<String>>>,
  }

  impl StreamDecoder for FakeDecoder {
    fn attach(&mut self, manifest_url: &str, element: &mut dyn MediaElement) -> Result<()> {
      self.log.lock().unwrap().push(format!("attach {manifest_url}"));
      element.set_source(manifest_url)?;
      self.attached = Some(manifest_url.to_string());
      Ok(())
    }
    fn detach(&mut self) {
      self.log.lock().unwrap().push("detach".into());
      self.attached = None;
    }
    fn is_attached(&self) -> bool {
      self.attached.is_some()
    }
    fn signal(&mut self, event: &MediaEvent) -> Option<DecoderSignal> {
      match event {
        MediaEvent::FileLoaded => Some(DecoderSignal::Ready),
        MediaEvent::Error(msg) => Some(DecoderSignal::Fatal(msg.clone())),
        _ => None,
      }
    }
  }

  const MP4: &str = "https://cdn.example/v/real.mp4";
  const HLS: &str = "https://cdn.example/live/master.m3u8";

  struct Rig {
    player: OverlayPlayer<FakeElement, FakeDecoder>,
    memory: PlaybackMemory,
    decoder_log: Arc<Mutex<Vec<String>>>,
  }

  fn rig() -> Rig {
    let memory = PlaybackMemory::new(Arc::new(MemoryStore::default()));
    let decoder = FakeDecoder::default();
    let decoder_log = Arc::clone(&decoder.log);
    let element = FakeElement { paused: true, rate: 1.0, ..FakeElement::default() };
    let host = PageMediaSet {
      items: vec![PageMedia { tag: "video", src: Some("https://site/teaser.mp4".into()), playing: true }],
    };
    let player = OverlayPlayer::new(element, decoder, memory.clone(), Box::new(host), Viewport { width: 1000.0, height: 2000.0 });
    Rig { player, memory, decoder_log }
  }

  #[test]
  fn search_states_drive_the_indicator() {
    let mut r = rig();
    assert_eq!(r.player.indicator(), ToggleIndicator::NothingFound);
    r.player.begin_search();
    assert_eq!(r.player.indicator(), ToggleIndicator::Searching);
    r.player.search_finished(None);
    assert_eq!(r.player.state(), PlayerState::NotFound);
    assert_eq!(r.player.toggle(), None);

    r.player.begin_search();
    r.player.search_finished(Some(MP4.into()));
    assert_eq!(r.player.indicator(), ToggleIndicator::Found);
    assert_eq!(r.player.toggle(), Some(PlayOutcome::Playing));
    assert_eq!(r.player.indicator(), ToggleIndicator::PlayingClose);
  }

  #[test]
  fn open_plays_direct_sources() {
    let mut r = rig();
    assert_eq!(r.player.open(MP4), PlayOutcome::Playing);
    assert_eq!(r.player.element().calls, vec![format!("src {MP4}"), "play".to_string()]);
    assert!(r.decoder_log.lock().unwrap().is_empty());
  }

  #[test]
  fn manifests_wait_for_decoder_ready() {
    let mut r = rig();
    assert_eq!(r.player.open(HLS), PlayOutcome::AwaitingDecoder);
    assert!(!r.player.element().calls.contains(&"play".to_string()));
    r.player.handle_event(&MediaEvent::FileLoaded);
    assert_eq!(r.player.element().calls.last().map(String::as_str), Some("play"));
  }

  #[test]
  fn fatal_decoder_error_pauses_without_retry() {
    let mut r = rig();
    r.player.open(HLS);
    r.player.handle_event(&MediaEvent::Error("manifest 403".into()));
    assert!(r.player.element().is_paused());
    r.player.handle_event(&MediaEvent::FileLoaded);
    assert!(!r.player.element().calls.contains(&"play".to_string()));
    assert_eq!(r.decoder_log.lock().unwrap().iter().filter(|l| l.starts_with("attach")).count(), 1);
  }

  #[test]
  fn autoplay_rejection_leaves_player_open_and_paused() {
    let mut r = rig();
    r.player.element.reject_play = true;
    assert_eq!(r.player.open(MP4), PlayOutcome::AutoplayRejected);
    assert!(r.player.is_open());
    assert!(r.player.element().is_paused());
  }

  #[test]
  fn metadata_restores_position_and_computes_geometry() {
    let mut r = rig();
    r.memory.save(MP4, 50.0, 100.0);
    r.player.open(MP4);
    assert!(r.player.geometry().is_none());
    r.player.element.duration = 100.0;
    r.player.handle_event(&MediaEvent::MetadataLoaded { duration: 100.0 });
    assert_eq!(r.player.element().current_time(), 50.0);
    let g = r.player.geometry().unwrap();
    assert!((g.content_height - 562.5).abs() < 1e-9);
    assert_eq!(g.width, 1000.0);
  }

  #[test]
  fn close_saves_position_unless_near_the_end() {
    let mut r = rig();
    r.player.open(MP4);
    r.player.element.duration = 100.0;
    r.player.element.time = 40.0;
    r.player.close();
    assert_eq!(r.player.state(), PlayerState::Found);
    assert!(r.player.element().is_paused());
    assert_eq!(r.memory.load(MP4, 100.0), Some(40.0));

    r.player.open(MP4);
    r.player.element.time = 97.0;
    r.player.close();
    assert_eq!(r.memory.load(MP4, 100.0), None);
  }

  #[test]
  fn ended_clears_position() {
    let mut r = rig();
    r.memory.save(MP4, 30.0, 100.0);
    r.player.open(MP4);
    r.player.handle_event(&MediaEvent::Ended);
    assert_eq!(r.memory.load(MP4, 100.0), None);
  }

  #[test]
  fn same_url_reopen_reuses_element() {
    let mut r = rig();
    r.player.open(MP4);
    r.player.handle_event(&MediaEvent::MetadataLoaded { duration: 100.0 });
    let cached = r.player.geometry();
    r.player.close();
    r.player.open(MP4);
    let sources = r.player.element().calls.iter().filter(|c| c.starts_with("src")).count();
    assert_eq!(sources, 1);
    assert_eq!(r.player.geometry(), cached);
  }

  #[test]
  fn new_url_reattaches_and_invalidates_geometry() {
    let mut r = rig();
    r.player.open(HLS);
    r.player.handle_event(&MediaEvent::FileLoaded);
    r.player.handle_event(&MediaEvent::MetadataLoaded { duration: 60.0 });
    r.player.open(MP4);
    assert!(r.player.geometry().is_none());
    assert_eq!(r.decoder_log.lock().unwrap().as_slice(), &[format!("attach {HLS}"), "detach".to_string()]);
    assert_eq!(r.player.current_url(), Some(MP4));
  }

  #[test]
  fn reparse_while_open_switches_source() {
    let mut r = rig();
    r.player.open(MP4);
    r.player.begin_search();
    assert_eq!(r.player.state(), PlayerState::Open);
    let other = "https://cdn.example/v/other.mp4";
    assert_eq!(r.player.search_finished(Some(other.into())), Some(PlayOutcome::Playing));
    assert_eq!(r.player.current_url(), Some(other));
    assert_eq!(r.player.search_finished(Some(other.into())), None);
  }

  #[test]
  fn unload_saves_position() {
    let mut r = rig();
    r.player.open(MP4);
    r.player.element.duration = 100.0;
    r.player.element.time = 12.0;
    r.player.unload();
    assert_eq!(r.memory.load(MP4, 100.0), Some(12.0));
  }

  #[test]
  fn skip_and_rate_are_clamped() {
    let mut r = rig();
    r.player.open(MP4);
    r.player.element.duration = 100.0;
    r.player.element.time = 5.0;
    r.player.skip(-10.0);
    assert_eq!(r.player.element().current_time(), 0.0);
    r.player.skip(500.0);
    assert_eq!(r.player.element().current_time(), 100.0);
    assert_eq!(r.player.set_rate(50.0), 16.0);
  }

  #[test]
  fn polled_events_are_handled() {
    let mut r = rig();
    r.memory.save(MP4, 20.0, 100.0);
    r.player.open(MP4);
    r.player.element.queued = vec![MediaEvent::FileLoaded, MediaEvent::MetadataLoaded { duration: 100.0 }];
    r.player.poll();
    assert_eq!(r.player.element().current_time(), 20.0);
  }

  #[test]
  fn live_stream_is_placed_without_a_duration() {
    let mut r = rig();
    r.player.open(HLS);
    let provisional = r.player.placement();
    assert!(r.player.geometry().is_none());
    r.player.handle_event(&MediaEvent::FileLoaded);
    assert_eq!(r.player.geometry(), Some(provisional));
    assert_eq!(r.player.element().calls.last().map(String::as_str), Some("play"));
  }

  #[test]
  fn failed_source_returns_to_found() {
    let mut r = rig();
    r.player.element.fail_source = true;
    assert!(matches!(r.player.open(MP4), PlayOutcome::Failed(_)));
    assert_eq!(r.player.state(), PlayerState::Found);
    assert_eq!(r.player.current_url(), Some(MP4));

    r.player.element.fail_source = false;
    assert_eq!(r.player.toggle(), Some(PlayOutcome::Playing));
    assert!(r.player.is_open());
  }

  #[test]
  fn element_error_is_reported_once_and_reopen_reloads() {
    let mut r = rig();
    r.player.open(MP4);
    r.player.handle_event(&MediaEvent::Error("mpv exited".into()));
    assert!(r.player.element().is_paused());
    assert_eq!(r.player.take_failure().as_deref(), Some("mpv exited"));
    assert_eq!(r.player.take_failure(), None);

    r.player.close();
    r.player.open(MP4);
    let sources = r.player.element().calls.iter().filter(|c| c.starts_with("src")).count();
    assert_eq!(sources, 2);
  }

  #[test]
  fn opening_pauses_other_page_media() {
    let mut r = rig();
    r.player.open(MP4);
    assert_eq!(r.player.host_media_paused(), 1);
    r.player.close();
    r.player.open(MP4);
    assert_eq!(r.player.host_media_paused(), 0);
  }
}
