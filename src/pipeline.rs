//! Concurrent size probing with incremental re-ranking.
//!
//! A run owns its candidate list. Every probe completion updates one entry, re-sorts the
//! whole list and hands a snapshot to the renderer, so sizes appear as they arrive rather
//! than after the slowest server answers. Runs never overlap: a start request during an
//! active run is ignored, which also keeps a superseded run from touching a newer list.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

use crate::constants::constants;
use crate::media::{MediaCandidate, SizeState, rank};
use crate::resolver::{Probe, SingleFlight, probe_size};

pub struct RankingPipeline<P: Probe> {
  probe: Arc<P>,
  flight: SingleFlight,
  concurrency: usize,
}

impl<P: Probe> RankingPipeline<P> {
  pub fn new(probe: Arc<P>) -> Self {
    Self { probe, flight: SingleFlight::default(), concurrency: constants().probe_concurrency.max(1) }
  }

  pub fn is_running(&self) -> bool {
    self.flight.is_active()
  }

  /// Probe every pending candidate and call `render` with the ranked list: once up front and
  /// again after each completion. Returns `false` (and does nothing) while a run is active.
  pub fn start<R>(&self, candidates: Vec<MediaCandidate>, mut render: R) -> bool
  where
    R: FnMut(&[MediaCandidate]) + Send + 'static,
  {
    let Some(ticket) = self.flight.try_begin() else {
      debug!("pipeline: run already active, ignoring rescan");
      return false;
    };
    let probe = Arc::clone(&self.probe);
    let concurrency = self.concurrency;

    tokio::spawn(async move {
      let _ticket = ticket;
      let mut list = candidates;
      rank(&mut list);
      render(&list);

      let pending: Vec<String> = list.iter().filter(|m| m.size == SizeState::Pending).map(|m| m.url.clone()).collect();
      info!(total = list.len(), probing = pending.len(), "pipeline: run started");

      let mut completions = stream::iter(pending)
        .map(|url| {
          let probe = Arc::clone(&probe);
          async move {
            let size = probe_size(probe.as_ref(), &url).await;
            (url, size)
          }
        })
        .buffer_unordered(concurrency);

      while let Some((url, size)) = completions.next().await {
        if let Some(entry) = list.iter_mut().find(|m| m.url == url) {
          entry.size = size;
        }
        rank(&mut list);
        render(&list);
      }
      info!(total = list.len(), "pipeline: run finished");
    });
    true
  }
}
