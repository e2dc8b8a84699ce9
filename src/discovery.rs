//! Page change observation.
//!
//! Local files are watched with `notify`; remote pages are refetched on an interval and
//! compared with the previous body. Either way a change only pokes a [`Debouncer`], and the
//! UI loop asks [`PageWatcher::poll`] whether a rescan is due.

use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::page::{PageSource, load};

/// Trailing-edge debounce: fires once, `delay` after the last poke.
#[derive(Debug, Clone)]
pub struct Debouncer {
  delay: Duration,
  deadline: Option<Instant>,
}

impl Debouncer {
  pub fn new(delay: Duration) -> Self {
    Self { delay, deadline: None }
  }

  pub fn poke(&mut self, now: Instant) {
    self.deadline = Some(now + self.delay);
  }

  pub fn disarm(&mut self) {
    self.deadline = None;
  }

  pub fn fire(&mut self, now: Instant) -> bool {
    match self.deadline {
      Some(deadline) if now >= deadline => {
        self.deadline = None;
        true
      }
      _ => false,
    }
  }
}

pub struct PageWatcher {
  changes: mpsc::UnboundedReceiver<()>,
  debounce: Debouncer,
  _watcher: Option<RecommendedWatcher>,
  refresh_task: Option<JoinHandle<()>>,
}

impl PageWatcher {
  pub fn watch(client: &Client, source: &PageSource) -> Result<Self> {
    let (tx, rx) = mpsc::unbounded_channel();
    let debounce = Debouncer::new(Duration::from_millis(constants().rescan_debounce_ms));

    match source {
      PageSource::File(path) => {
        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| match res {
          Ok(event) => {
            if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
              let _ = tx.send(());
            }
          }
          Err(e) => warn!(err = %e, "discovery: watch error"),
        })
        .context("Failed to create file watcher")?;
        watcher
          .watch(path, RecursiveMode::NonRecursive)
          .with_context(|| format!("Failed to watch {}", path.display()))?;
        info!(path = %path.display(), "discovery: watching file");
        Ok(Self { changes: rx, debounce, _watcher: Some(watcher), refresh_task: None })
      }
      PageSource::Url(_) => {
        let client = client.clone();
        let label = source.label();
        let source = source.clone();
        let interval = Duration::from_secs(constants().refresh_interval_secs.max(1));
        let task = tokio::spawn(async move {
          let mut last: Option<String> = None;
          let mut ticker = tokio::time::interval(interval);
          loop {
            ticker.tick().await;
            match load(&client, &source).await {
              Ok(page) => {
                let changed = last.as_ref().is_some_and(|prev| *prev != page.markup);
                last = Some(page.markup);
                if changed {
                  debug!(url = %page.url, "discovery: page changed");
                  if tx.send(()).is_err() {
                    break;
                  }
                }
              }
              Err(e) => debug!(err = %e, "discovery: refresh failed"),
            }
          }
        });
        info!(url = %label, secs = interval.as_secs(), "discovery: polling page");
        Ok(Self { changes: rx, debounce, _watcher: None, refresh_task: Some(task) })
      }
    }
  }

  /// Whether a debounced rescan is due. Changes seen while `suppressed` are dropped.
  pub fn poll(&mut self, now: Instant, suppressed: bool) -> bool {
    let mut seen = false;
    while self.changes.try_recv().is_ok() {
      seen = true;
    }
    if suppressed {
      self.debounce.disarm();
      return false;
    }
    if seen {
      self.debounce.poke(now);
    }
    self.debounce.fire(now)
  }
}

impl Drop for PageWatcher {
  fn drop(&mut self) {
    if let Some(task) = self.refresh_task.take() {
      task.abort();
    }
  }
}
