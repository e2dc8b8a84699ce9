use anyhow::{Context, Result};
use ratatui::{layout::Rect, widgets::ListState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::constants;
use crate::discovery::PageWatcher;
use crate::drag::{DragController, DragOutcome, Point};
use crate::events::{PlayBus, PlayRequest, latest};
use crate::media::MediaCandidate;
use crate::memory::PlaybackMemory;
use crate::page::{self, Page, PageSource};
use crate::pipeline::RankingPipeline;
use crate::player::element::MediaElement;
use crate::player::geometry::{Geometry, Viewport};
use crate::player::mpv::{MpvElement, MpvStreamDecoder};
use crate::player::session::{OverlayPlayer, PlayOutcome, PlayerState};
use crate::ranker::{SelectionPolicy, TieBreak};
use crate::resolver::{HttpProbe, IdentityResolver};
use crate::scanner::LinkScanner;
use crate::settings::{Settings, clamp_rate, next_speed};
use crate::store::Store;
use crate::theme::THEMES;

/// Terminal cells are roughly twice as tall as they are wide.
pub const CELL_ASPECT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  /// Typing a page URL/path or a `/set` command.
  Input,
  /// Keys drive the open overlay player.
  Player,
  Extractor,
}

/// Why a page load was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoadPurpose {
  Discover,
  Extract,
}

#[derive(Default)]
pub(crate) struct AsyncTasks {
  pub(crate) load_rx: Option<oneshot::Receiver<(LoadPurpose, Result<Page>)>>,
  pub(crate) resolve_rx: Option<oneshot::Receiver<String>>,
  pub(crate) ranked_rx: Option<mpsc::UnboundedReceiver<Vec<MediaCandidate>>>,
  /// Best candidate waiting for the resolver's in-flight probe to finish.
  pub(crate) queued_resolve: Option<String>,
  /// Catalog waiting for the running ranking pass to finish.
  pub(crate) queued_catalog: Option<Vec<MediaCandidate>>,
}

pub type Player = OverlayPlayer<MpvElement, MpvStreamDecoder>;

pub struct App {
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  pub mode: AppMode,
  pub theme_index: usize,
  pub player: Player,
  pub drag: DragController,
  pub settings: Settings,
  /// Extractor entries, ranked.
  pub extractor: Vec<MediaCandidate>,
  pub list_state: ListState,
  pub source: Option<PageSource>,
  pub page: Option<Page>,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  pub info_message: Option<String>,
  pub should_quit: bool,
  /// Where the overlay was last drawn, for mouse hit testing.
  pub overlay_area: Option<Rect>,
  config: Config,
  store: Arc<dyn Store>,
  probe: Arc<HttpProbe>,
  resolver: IdentityResolver<HttpProbe>,
  pipeline: RankingPipeline<HttpProbe>,
  scanner: LinkScanner,
  policy: SelectionPolicy,
  bus: PlayBus,
  play_rx: broadcast::Receiver<PlayRequest>,
  watcher: Option<PageWatcher>,
  pub(crate) tasks: AsyncTasks,
  placed_geometry: Option<Geometry>,
  /// Rate to go back to when the hold speed is released.
  held_rate: Option<f64>,
  error_time: Option<Instant>,
}

impl App {
  pub fn new(config: Config, store: Arc<dyn Store>, no_video: bool) -> Result<Self> {
    let c = constants();
    let theme_index =
      if let Some(ref name) = config.theme_name { THEMES.iter().position(|t| t.name == name).unwrap_or(0) } else { 0 };

    let user_agent = config.user_agent.clone().unwrap_or_else(|| c.user_agent.clone());
    let timeout = Duration::from_secs(config.probe_timeout_secs.unwrap_or(c.probe_timeout_secs));
    let probe = Arc::new(HttpProbe::new(&user_agent, timeout).context("Failed to build HTTP client")?);

    let mut policy = SelectionPolicy::default();
    if let Some(min) = config.min_link_length {
      policy.min_length = min;
    }
    if config.prefer_first_seen == Some(true) {
      policy.tie_break = TieBreak::FirstSeen;
    }
    let scanner = LinkScanner::new()?.with_heuristics(config.heuristic_scan.unwrap_or(true));

    let memory = PlaybackMemory::new(Arc::clone(&store));
    let element = MpvElement::new(no_video || config.no_video == Some(true));
    let player = OverlayPlayer::new(
      element,
      MpvStreamDecoder::default(),
      memory,
      Box::new(crate::dom::PageMediaSet::default()),
      Viewport { width: 80.0, height: 24.0 * CELL_ASPECT },
    )
    .with_header_height(f64::from(c.header_rows) * CELL_ASPECT);

    let bus = PlayBus::default();
    let play_rx = bus.subscribe();
    let settings = Settings::load(store.as_ref());

    Ok(Self {
      input: String::new(),
      cursor_position: 0,
      input_scroll: 0,
      mode: AppMode::Input,
      theme_index,
      player,
      drag: DragController::new(Point::default()),
      settings,
      extractor: Vec::new(),
      list_state: ListState::default(),
      source: None,
      page: None,
      last_error: None,
      status_message: None,
      info_message: None,
      should_quit: false,
      overlay_area: None,
      config,
      store,
      resolver: IdentityResolver::new(Arc::clone(&probe)),
      pipeline: RankingPipeline::new(Arc::clone(&probe)),
      probe,
      scanner,
      policy,
      bus,
      play_rx,
      watcher: None,
      tasks: AsyncTasks::default(),
      placed_geometry: None,
      held_rate: None,
      error_time: None,
    })
  }

  pub fn theme(&self) -> &'static crate::theme::Theme {
    &THEMES[self.theme_index]
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after 5 seconds.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(5)
    {
      self.last_error = None;
      self.error_time = None;
    }
  }

  fn save_config(&mut self) {
    self.config.theme_name = Some(self.theme().name.to_string());
    self.config.save();
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.save_config();
  }

  pub fn is_ranking(&self) -> bool {
    self.pipeline.is_running()
  }

  /// Terminal size in cells; the player works in square units.
  pub fn set_terminal_size(&mut self, cols: u16, rows: u16) {
    self.player.set_viewport(Viewport { width: f64::from(cols), height: f64::from(rows) * CELL_ASPECT });
  }

  // --- Discovery ---

  /// Enter pressed in the input bar: a `/set` command or a page to open.
  pub fn submit_input(&mut self) {
    let text = self.input.trim().to_string();
    if let Some(args) = text.strip_prefix("/set") {
      self.apply_settings(args.trim());
      return;
    }
    match PageSource::parse(&text) {
      Ok(source) => self.open_source(source),
      Err(e) => self.set_error(format!("{:#}", e)),
    }
  }

  pub fn apply_settings(&mut self, args: &str) {
    match self.settings.apply_input(args) {
      None => self.set_error("Usage: /set backward,forward,hold_speed (e.g. /set 10,30,2.5)".to_string()),
      Some(false) => self.set_error("No valid values in /set.".to_string()),
      Some(true) => {
        self.settings.save(self.store.as_ref());
        info!(
          back = self.settings.skip_backward,
          fwd = self.settings.skip_forward,
          hold = self.settings.hold_speed,
          "settings: updated"
        );
        self.info_message = Some(format!(
          "Skip -{}s / +{}s, hold speed {}x",
          self.settings.skip_backward, self.settings.skip_forward, self.settings.hold_speed
        ));
        self.input.clear();
        self.cursor_position = 0;
        self.input_scroll = 0;
      }
    }
  }

  /// Navigate to a new page. Results still on their way for the previous page are dropped.
  pub fn open_source(&mut self, source: PageSource) {
    info!(source = %source.label(), "app: opening page");
    self.tasks = AsyncTasks::default();
    self.list_state.select(None);
    self.watcher = match PageWatcher::watch(self.probe.client(), &source) {
      Ok(watcher) => Some(watcher),
      Err(e) => {
        warn!(err = %e, "app: page observer unavailable");
        None
      }
    };
    self.source = Some(source);
    self.page = None;
    self.extractor.clear();
    self.trigger_load(LoadPurpose::Discover);
  }

  /// Forced rediscovery, also from inside the open player.
  pub fn reparse(&mut self) {
    if self.source.is_none() {
      self.set_error("Open a page first.".to_string());
      return;
    }
    if self.resolver.is_busy() {
      self.info_message = Some("Still searching…".to_string());
      return;
    }
    self.trigger_load(LoadPurpose::Discover);
  }

  fn trigger_load(&mut self, purpose: LoadPurpose) {
    let Some(source) = self.source.clone() else { return };
    if purpose == LoadPurpose::Discover {
      self.player.begin_search();
    }
    self.status_message = Some(format!("Loading {}…", source.label()));
    let client = self.probe.client().clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send((purpose, page::load(&client, &source).await));
    });
    self.tasks.load_rx = Some(rx);
  }

  fn page_loaded(&mut self, purpose: LoadPurpose, page: Page) {
    let scan = page::scan(&page, &self.scanner, &self.policy);
    self.player.set_host_media(Box::new(scan.host_media));
    self.page = Some(page);

    if purpose == LoadPurpose::Discover {
      match scan.best {
        Some(best) => self.begin_resolve(&best),
        None => {
          self.player.search_finished(None);
          if !self.player.is_open() {
            self.info_message = Some("No video found on this page.".to_string());
          }
        }
      }
    }
    if purpose == LoadPurpose::Extract || self.mode == AppMode::Extractor {
      self.start_ranking(scan.catalog);
    }
  }

  fn begin_resolve(&mut self, url: &str) {
    self.tasks.resolve_rx = None;
    let Some(resolution) = self.resolver.begin(url) else {
      debug!(url = %url, "app: resolver busy, retrying when it frees up");
      self.tasks.queued_resolve = Some(url.to_string());
      return;
    };
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(resolution.await);
    });
    self.tasks.resolve_rx = Some(rx);
  }

  fn resolved(&mut self, url: String) {
    let was_open = self.player.is_open();
    match self.player.search_finished(Some(url)) {
      Some(outcome) => self.report_outcome(outcome),
      None if !was_open => self.info_message = Some("Video found. ^p to play.".to_string()),
      None => {}
    }
  }

  // --- Extractor ---

  /// Show or hide the extractor. An empty list, or one where nothing has settled, is rebuilt.
  pub fn toggle_extractor(&mut self) {
    if self.mode == AppMode::Extractor {
      self.mode = AppMode::Input;
      return;
    }
    self.mode = AppMode::Extractor;
    let stale = self.extractor.is_empty() || !self.extractor.iter().any(|c| c.size.is_settled());
    if stale {
      self.refresh_extractor();
    }
  }

  pub fn refresh_extractor(&mut self) {
    if self.tasks.load_rx.is_some() {
      // The pending load ranks its catalog once it lands.
      return;
    }
    match &self.page {
      Some(page) => {
        let scan = page::scan(page, &self.scanner, &self.policy);
        self.start_ranking(scan.catalog);
      }
      None if self.source.is_some() => self.trigger_load(LoadPurpose::Extract),
      None => self.set_error("Open a page first.".to_string()),
    }
  }

  fn start_ranking(&mut self, catalog: Vec<MediaCandidate>) {
    if catalog.is_empty() {
      self.extractor.clear();
      self.list_state.select(None);
      self.info_message = Some("No media links found.".to_string());
      return;
    }
    if self.pipeline.is_running() {
      debug!(entries = catalog.len(), "app: ranking pass running, queueing catalog");
      self.tasks.queued_catalog = Some(catalog);
      return;
    }
    let (tx, rx) = mpsc::unbounded_channel();
    let started = self.pipeline.start(catalog, move |list: &[MediaCandidate]| {
      let _ = tx.send(list.to_vec());
    });
    if started {
      self.tasks.ranked_rx = Some(rx);
    }
  }

  /// Publish the selected extractor entry to the player and hide the list.
  pub fn play_selected(&mut self) {
    let Some(entry) = self.list_state.selected().and_then(|i| self.extractor.get(i)) else { return };
    let (playable, url) = (entry.kind.is_playable(), entry.url.clone());
    if !playable {
      self.set_error("Only video entries can be played.".to_string());
      return;
    }
    self.bus.publish(&url);
    self.mode = AppMode::Input;
  }

  // --- Player ---

  pub fn toggle_player(&mut self) {
    match self.player.state() {
      PlayerState::NotFound => self.set_error("Nothing found to play.".to_string()),
      PlayerState::Searching => self.info_message = Some("Still searching…".to_string()),
      PlayerState::Open => {
        self.player.close();
        self.mode = AppMode::Input;
      }
      PlayerState::Found => {
        if let Some(outcome) = self.player.toggle() {
          self.report_outcome(outcome);
        }
      }
    }
  }

  fn report_outcome(&mut self, outcome: PlayOutcome) {
    let paused = self.player.host_media_paused();
    if paused > 0 && !matches!(outcome, PlayOutcome::Failed(_)) {
      self.info_message = Some(format!("Paused {} other media on the page", paused));
    }
    match outcome {
      PlayOutcome::Playing => {
        self.mode = AppMode::Player;
        self.clear_error();
      }
      PlayOutcome::AwaitingDecoder => {
        self.mode = AppMode::Player;
        self.status_message = Some("Loading stream…".to_string());
      }
      PlayOutcome::AutoplayRejected => {
        self.mode = AppMode::Player;
        self.set_error("Playback was blocked. Press Space to play.".to_string());
      }
      PlayOutcome::Failed(msg) => {
        self.mode = AppMode::Input;
        self.set_error(format!("Playback error: {}", msg));
      }
    }
  }

  pub fn skip_backward(&mut self) {
    self.player.skip(-f64::from(self.settings.skip_backward));
  }

  pub fn skip_forward(&mut self) {
    self.player.skip(f64::from(self.settings.skip_forward));
  }

  pub fn cycle_speed(&mut self) {
    self.held_rate = None;
    let rate = next_speed(self.player.element().playback_rate());
    let rate = self.player.set_rate(rate);
    self.info_message = Some(format!("Speed {}x", rate));
  }

  /// Toggle between the hold speed and the previous rate.
  pub fn toggle_hold_speed(&mut self) {
    match self.held_rate.take() {
      Some(previous) => {
        self.player.set_rate(previous);
        self.info_message = Some(format!("Speed {}x", previous));
      }
      None => {
        self.held_rate = Some(self.player.element().playback_rate());
        let rate = self.player.set_rate(clamp_rate(self.settings.hold_speed));
        self.info_message = Some(format!("Holding {}x", rate));
      }
    }
  }

  // --- Drag ---

  pub fn mouse_down(&mut self, col: u16, row: u16) {
    if self.on_overlay_handle(col, row) {
      self.drag.press(Point::new(i32::from(col), i32::from(row)), Instant::now());
    }
  }

  pub fn mouse_drag(&mut self, col: u16, row: u16) {
    self.drag.move_to(Point::new(i32::from(col), i32::from(row)), Instant::now());
  }

  pub fn mouse_up(&mut self) {
    match self.drag.release(Instant::now()) {
      DragOutcome::Click => self.player.toggle_pause(),
      DragOutcome::Dropped { position } => debug!(x = position.x, y = position.y, "app: overlay moved"),
      DragOutcome::None => {}
    }
  }

  /// Pointer moved with no button held: a gesture still open lost its release.
  pub fn mouse_moved(&mut self, col: u16, row: u16) {
    if self.drag.is_pressed() && !self.on_overlay_handle(col, row) {
      self.drag.leave();
    }
  }

  pub fn mouse_cancel(&mut self) {
    self.drag.cancel();
  }

  fn on_overlay_handle(&self, col: u16, row: u16) -> bool {
    self.overlay_area.is_some_and(|area| {
      let handle_rows = constants().header_rows.min(area.height);
      col >= area.x && col < area.x + area.width && row >= area.y && row < area.y + handle_rows
    })
  }

  // --- Event loop ---

  pub async fn check_pending(&mut self) -> Result<()> {
    if let Some(mut rx) = self.tasks.load_rx.take() {
      match rx.try_recv() {
        Ok((purpose, result)) => {
          self.status_message = None;
          match result {
            Ok(page) => self.page_loaded(purpose, page),
            Err(e) => {
              if purpose == LoadPurpose::Discover {
                self.player.search_finished(None);
              }
              self.set_error(format!("Failed to load page: {:#}", e));
            }
          }
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.load_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.status_message = None;
          self.set_error("Page load task failed.".to_string());
        }
      }
    }

    if let Some(mut rx) = self.tasks.resolve_rx.take() {
      match rx.try_recv() {
        Ok(url) => self.resolved(url),
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.resolve_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.player.search_finished(None);
        }
      }
    }
    if self.tasks.resolve_rx.is_none()
      && !self.resolver.is_busy()
      && let Some(url) = self.tasks.queued_resolve.take()
    {
      self.begin_resolve(&url);
    }

    if let Some(ref mut rx) = self.tasks.ranked_rx {
      let mut snapshot = None;
      while let Ok(list) = rx.try_recv() {
        snapshot = Some(list);
      }
      if let Some(list) = snapshot {
        self.extractor = list;
        let selected = self.list_state.selected().unwrap_or(0).min(self.extractor.len().saturating_sub(1));
        self.list_state.select((!self.extractor.is_empty()).then_some(selected));
      }
    }
    if !self.pipeline.is_running()
      && let Some(catalog) = self.tasks.queued_catalog.take()
    {
      self.start_ranking(catalog);
    }

    if let Some(req) = latest(&mut self.play_rx) {
      info!(url = %req.url, "app: play request");
      let outcome = self.player.open(&req.url);
      self.report_outcome(outcome);
    }

    self.player.poll();
    if let Some(msg) = self.player.take_failure() {
      self.status_message = None;
      self.set_error(format!("Playback error: {}", msg));
    }
    if self.status_message.is_some() && self.player.is_open() && !self.player.element().is_paused() {
      self.status_message = None;
    }
    let geometry = self.player.is_open().then(|| self.player.placement());
    if let Some(geometry) = geometry
      && self.placed_geometry != Some(geometry)
    {
      self.placed_geometry = Some(geometry);
      let resting = Point::new(geometry.x.round() as i32, (geometry.y / CELL_ASPECT).round() as i32);
      self.drag.reset(resting);
    }
    self.drag.tick(Instant::now());

    let suppressed = matches!(self.player.state(), PlayerState::Open | PlayerState::Searching);
    let rescan = self.watcher.as_mut().is_some_and(|w| w.poll(Instant::now(), suppressed));
    if rescan {
      debug!("app: page changed, rescanning");
      self.trigger_load(LoadPurpose::Discover);
    }

    self.expire_error();
    Ok(())
  }

  /// Save playback progress and stop mpv.
  pub async fn shutdown(&mut self) -> Result<()> {
    self.player.unload();
    self.player.element_mut().shutdown().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::media::{MediaKind, SizeState};
  use crate::store::MemoryStore;
  use reqwest::Url;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  /// An app whose player can never start mpv, so playback attempts fail fast.
  fn test_app() -> App {
    let mut app = App::new(Config::default(), Arc::new(MemoryStore::default()), true).unwrap();
    *app.player.element_mut() = MpvElement::new(true).with_program("/nonexistent/vidfloat-test-mpv");
    app
  }

  async fn pump_until(app: &mut App, done: impl Fn(&App) -> bool) -> bool {
    for _ in 0..100 {
      app.check_pending().await.unwrap();
      if done(app) {
        return true;
      }
      tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
  }

  fn entry(url: &str, kind: MediaKind, size: SizeState) -> MediaCandidate {
    MediaCandidate { url: url.to_string(), kind, label: "Video".into(), size }
  }

  fn video_page(link: &str) -> String {
    format!(r#"<html><body><video src="{link}"></video></body></html>"#)
  }

  async fn serve_page(server: &MockServer, route: &str, link: &str) {
    Mock::given(method("GET"))
      .and(path(route))
      .respond_with(ResponseTemplate::new(200).set_body_string(video_page(link)))
      .mount(server)
      .await;
  }

  async fn serve_head(server: &MockServer, route: &str, delay_ms: u64) {
    Mock::given(method("HEAD"))
      .and(path(route))
      .respond_with(
        ResponseTemplate::new(200).insert_header("content-length", "1000").set_delay(Duration::from_millis(delay_ms)),
      )
      .mount(server)
      .await;
  }

  #[test]
  fn error_expires() {
    let mut app = test_app();
    app.set_error("boom".to_string());
    app.expire_error();
    assert_eq!(app.last_error.as_deref(), Some("boom"));
    app.error_time = Some(Instant::now() - Duration::from_secs(6));
    app.expire_error();
    assert!(app.last_error.is_none());
  }

  #[test]
  fn set_command_updates_settings() {
    let mut app = test_app();
    app.input = "/set 5,30,1.5".to_string();
    app.submit_input();
    assert_eq!((app.settings.skip_backward, app.settings.skip_forward), (5, 30));
    assert!(app.input.is_empty());
    assert!(app.last_error.is_none());
  }

  #[tokio::test]
  async fn play_selected_only_publishes_video_entries() {
    let mut app = test_app();
    app.mode = AppMode::Extractor;
    app.extractor = vec![
      entry("https://x.example/poster.jpg", MediaKind::Image, SizeState::Known(10)),
      entry("https://x.example/clip.mp4", MediaKind::Video, SizeState::Known(20)),
    ];
    app.list_state.select(Some(0));
    app.play_selected();
    assert!(app.last_error.is_some());
    assert_eq!(app.mode, AppMode::Extractor);

    app.list_state.select(Some(1));
    app.play_selected();
    assert_eq!(app.mode, AppMode::Input);
    app.check_pending().await.unwrap();
    assert_eq!(app.player.current_url(), Some("https://x.example/clip.mp4"));
    // mpv is missing: the overlay closes again and the failure is shown.
    assert_eq!(app.player.state(), PlayerState::Found);
    assert!(app.last_error.as_deref().is_some_and(|e| e.starts_with("Playback error")));
  }

  #[tokio::test]
  async fn extractor_reuses_settled_list_and_rebuilds_stale_one() {
    let mut app = test_app();
    app.extractor = vec![entry("https://x.example/a.mp4", MediaKind::Video, SizeState::Known(5))];
    app.toggle_extractor();
    assert_eq!(app.mode, AppMode::Extractor);
    assert!(!app.is_ranking());
    assert_eq!(app.extractor.len(), 1);
    app.toggle_extractor();
    assert_eq!(app.mode, AppMode::Input);

    app.page = Some(Page {
      url: Url::parse("https://site.example/").unwrap(),
      markup: video_page("http://127.0.0.1:9/media/b.mp4"),
    });
    app.extractor = vec![entry("https://x.example/a.mp4", MediaKind::Video, SizeState::Pending)];
    app.toggle_extractor();
    assert!(pump_until(&mut app, |a| a.extractor.iter().any(|c| c.url.ends_with("/media/b.mp4"))).await);
    assert!(app.extractor.iter().all(|c| !c.url.ends_with("/a.mp4")));
  }

  #[tokio::test]
  async fn navigating_mid_resolve_finds_the_new_page() {
    let server = MockServer::start().await;
    let a_link = format!("{}/page-a/streams/full-episode-1080p-master.mp4", server.uri());
    let b_link = format!("{}/page-b/streams/full-episode-1080p-master.mp4", server.uri());
    serve_page(&server, "/a", &a_link).await;
    serve_page(&server, "/b", &b_link).await;
    serve_head(&server, "/page-a/streams/full-episode-1080p-master.mp4", 800).await;
    serve_head(&server, "/page-b/streams/full-episode-1080p-master.mp4", 0).await;

    let mut app = test_app();
    app.open_source(PageSource::parse(&format!("{}/a", server.uri())).unwrap());
    assert!(pump_until(&mut app, |a| a.resolver.is_busy()).await);

    app.open_source(PageSource::parse(&format!("{}/b", server.uri())).unwrap());
    assert!(pump_until(&mut app, |a| a.player.state() == PlayerState::Found).await);
    assert_eq!(app.player.current_url(), Some(b_link.as_str()));
  }

  #[tokio::test]
  async fn navigating_mid_ranking_lists_only_the_new_page() {
    let server = MockServer::start().await;
    let a_link = format!("{}/a-only.mp4", server.uri());
    let b_link = format!("{}/b-only.mp4", server.uri());
    serve_page(&server, "/a", &a_link).await;
    serve_page(&server, "/b", &b_link).await;
    serve_head(&server, "/a-only.mp4", 800).await;
    serve_head(&server, "/b-only.mp4", 0).await;

    let mut app = test_app();
    app.open_source(PageSource::parse(&format!("{}/a", server.uri())).unwrap());
    assert!(pump_until(&mut app, |a| a.page.is_some()).await);
    app.toggle_extractor();
    assert!(pump_until(&mut app, |a| !a.extractor.is_empty()).await);
    assert!(app.is_ranking());

    app.open_source(PageSource::parse(&format!("{}/b", server.uri())).unwrap());
    assert!(app.extractor.is_empty());
    let mut listed = false;
    for _ in 0..100 {
      app.check_pending().await.unwrap();
      assert!(app.extractor.iter().all(|c| c.url != a_link), "previous page's media in the list");
      if app.extractor.iter().any(|c| c.url == b_link) {
        listed = true;
        break;
      }
      tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(listed);
  }
}
