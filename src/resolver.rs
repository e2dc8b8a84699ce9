//! Header-only network probes: final-address resolution for the player and content-length
//! sizing for the extractor. No body is ever downloaded.

use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::header::CONTENT_LENGTH;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::media::{SizeState, is_manifest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
  pub status: u16,
  /// Address after following redirects.
  pub final_url: String,
  pub content_length: Option<u64>,
}

impl ProbeResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// Header-only request primitive.
pub trait Probe: Send + Sync + 'static {
  fn head(&self, url: &str) -> impl Future<Output = Result<ProbeResponse>> + Send;
}

pub struct HttpProbe {
  client: Client,
}

impl HttpProbe {
  pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
    let client = Client::builder()
      .user_agent(user_agent)
      .timeout(timeout)
      .referer(false)
      .build()
      .context("Failed to build probe HTTP client")?;
    Ok(Self { client })
  }

  pub fn client(&self) -> &Client {
    &self.client
  }
}

impl Probe for HttpProbe {
  async fn head(&self, url: &str) -> Result<ProbeResponse> {
    let resp = self.client.head(url).send().await.with_context(|| format!("HEAD {} failed", url))?;
    let content_length =
      resp.headers().get(CONTENT_LENGTH).and_then(|v| v.to_str().ok()).and_then(|v| v.trim().parse::<u64>().ok());
    Ok(ProbeResponse { status: resp.status().as_u16(), final_url: resp.url().to_string(), content_length })
  }
}

/// Single-flight guard: at most one holder of a [`FlightTicket`] at a time.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight(Arc<AtomicBool>);

/// Released when dropped.
#[derive(Debug)]
pub struct FlightTicket(Arc<AtomicBool>);

impl SingleFlight {
  pub fn try_begin(&self) -> Option<FlightTicket> {
    self.0.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok()?;
    Some(FlightTicket(Arc::clone(&self.0)))
  }

  pub fn is_active(&self) -> bool {
    self.0.load(Ordering::Acquire)
  }
}

impl Drop for FlightTicket {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}

/// Resolves a decoy candidate to the address the server actually serves it from.
pub struct IdentityResolver<P: Probe> {
  probe: Arc<P>,
  flight: SingleFlight,
  signed_markers: Vec<String>,
}

impl<P: Probe> IdentityResolver<P> {
  pub fn new(probe: Arc<P>) -> Self {
    Self { probe, flight: SingleFlight::default(), signed_markers: constants().signed_url_markers.clone() }
  }

  /// Manifests and signed URLs are already final.
  pub fn needs_network(&self, url: &str) -> bool {
    !(url.to_ascii_lowercase().ends_with(".m3u8") || self.signed_markers.iter().any(|m| url.contains(m.as_str())))
  }

  pub fn is_busy(&self) -> bool {
    self.flight.is_active()
  }

  /// Claim the in-flight slot and return the resolution future, or `None` when a probe is
  /// already running; the request is dropped, not queued. The slot is held until the
  /// returned future completes or is dropped.
  pub fn begin(&self, url: &str) -> Option<impl Future<Output = String> + Send + use<P>> {
    let ticket = self.flight.try_begin();
    if ticket.is_none() {
      debug!(url = %url, "resolver: probe already in flight, dropping request");
    }
    let ticket = ticket?;
    let probe = Arc::clone(&self.probe);
    let network = self.needs_network(url);
    let url = url.to_string();
    Some(async move {
      let _ticket = ticket;
      if !network {
        debug!(url = %url, "resolver: already final");
        return url;
      }
      match probe.head(&url).await {
        Ok(resp) if resp.is_success() => {
          if resp.final_url != url {
            info!(from = %url, to = %resp.final_url, "resolver: redirected");
          }
          resp.final_url
        }
        Ok(resp) => {
          warn!(url = %url, status = resp.status, "resolver: non-success status, keeping candidate");
          url
        }
        Err(e) => {
          warn!(url = %url, err = %e, "resolver: probe failed, keeping candidate");
          url
        }
      }
    })
  }

  pub async fn resolve(&self, url: &str) -> Option<String> {
    match self.begin(url) {
      Some(resolution) => Some(resolution.await),
      None => None,
    }
  }
}

/// Size outcome of a finished probe.
pub fn classify(result: &Result<ProbeResponse>) -> SizeState {
  match result {
    Ok(resp) if !resp.is_success() => SizeState::Failed,
    Ok(ProbeResponse { content_length: Some(len), .. }) if *len > 0 => SizeState::Known(*len),
    Ok(_) => SizeState::UnknownLength,
    Err(_) => SizeState::Failed,
  }
}

/// Content length of `url`. Streaming manifests are skipped without touching the network.
pub async fn probe_size<P: Probe>(probe: &P, url: &str) -> SizeState {
  if is_manifest(url) {
    return SizeState::Skipped;
  }
  let result = probe.head(url).await;
  if let Err(e) = &result {
    debug!(url = %url, err = %e, "resolver: size probe failed");
  }
  classify(&result)
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use anyhow::anyhow;
  use std::sync::atomic::AtomicUsize;
  use wiremock::matchers::path;
  use wiremock::{Mock, MockServer, ResponseTemplate};

  /// Answers every probe with the same canned outcome and counts calls.
  pub(crate) struct CannedProbe {
    pub calls: AtomicUsize,
    pub response: Option<ProbeResponse>,
  }

  impl CannedProbe {
    pub fn ok(status: u16, final_url: &str, content_length: Option<u64>) -> Self {
      Self {
        calls: AtomicUsize::new(0),
        response: Some(ProbeResponse { status, final_url: final_url.to_string(), content_length }),
      }
    }

    pub fn failing() -> Self {
      Self { calls: AtomicUsize::new(0), response: None }
    }

    pub fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  impl Probe for CannedProbe {
    async fn head(&self, _url: &str) -> Result<ProbeResponse> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self.response.clone().ok_or_else(|| anyhow!("connection refused"))
    }
  }

  #[tokio::test]
  async fn signed_url_skips_network() {
    let probe = Arc::new(CannedProbe::ok(200, "https://elsewhere/x.mp4", None));
    let resolver = IdentityResolver::new(Arc::clone(&probe));
    let url = "https://cdn.example/v/clip.mp4?secure=1";
    assert_eq!(resolver.resolve(url).await.as_deref(), Some(url));
    assert_eq!(probe.calls(), 0);
  }

  #[tokio::test]
  async fn manifest_skips_network() {
    let probe = Arc::new(CannedProbe::ok(200, "https://elsewhere/x.mp4", None));
    let resolver = IdentityResolver::new(Arc::clone(&probe));
    assert_eq!(resolver.resolve("https://cdn.example/live/index.m3u8").await.as_deref(), Some("https://cdn.example/live/index.m3u8"));
    assert_eq!(probe.calls(), 0);
  }

  #[tokio::test]
  async fn success_returns_final_url() {
    let probe = Arc::new(CannedProbe::ok(200, "https://real.example/v.mp4", Some(10)));
    let resolver = IdentityResolver::new(Arc::clone(&probe));
    assert_eq!(resolver.resolve("https://decoy.example/v.mp4").await.as_deref(), Some("https://real.example/v.mp4"));
    assert_eq!(probe.calls(), 1);
  }

  #[tokio::test]
  async fn failures_fall_back_to_candidate() {
    let resolver = IdentityResolver::new(Arc::new(CannedProbe::failing()));
    assert_eq!(resolver.resolve("https://decoy.example/v.mp4").await.as_deref(), Some("https://decoy.example/v.mp4"));

    let resolver = IdentityResolver::new(Arc::new(CannedProbe::ok(403, "https://real.example/v.mp4", None)));
    assert_eq!(resolver.resolve("https://decoy.example/v.mp4").await.as_deref(), Some("https://decoy.example/v.mp4"));
  }

  #[tokio::test]
  async fn second_request_is_dropped_while_in_flight() {
    let resolver = IdentityResolver::new(Arc::new(CannedProbe::ok(200, "https://real.example/v.mp4", None)));
    let first = resolver.begin("https://decoy.example/v.mp4").unwrap();
    assert!(resolver.is_busy());
    assert!(resolver.begin("https://decoy.example/other.mp4").is_none());
    assert_eq!(first.await, "https://real.example/v.mp4");
    assert!(!resolver.is_busy());
    assert!(resolver.begin("https://decoy.example/other.mp4").is_some());
  }

  #[tokio::test]
  async fn manifest_size_is_skipped_without_network() {
    let probe = CannedProbe::ok(200, "https://x/a.m3u8", Some(999));
    assert_eq!(probe_size(&probe, "https://x/live/a.m3u8").await, SizeState::Skipped);
    assert_eq!(probe_size(&probe, "https://x/live/a.m3u8?token=abc").await, SizeState::Skipped);
    assert_eq!(probe.calls(), 0);
  }

  #[test]
  fn classify_outcomes() {
    let resp = |status, len| Ok(ProbeResponse { status, final_url: String::new(), content_length: len });
    assert_eq!(classify(&resp(200, Some(500))), SizeState::Known(500));
    assert_eq!(classify(&resp(200, Some(0))), SizeState::UnknownLength);
    assert_eq!(classify(&resp(200, None)), SizeState::UnknownLength);
    assert_eq!(classify(&resp(404, Some(500))), SizeState::Failed);
    assert_eq!(classify(&Err(anyhow!("timeout"))), SizeState::Failed);
  }

  #[tokio::test]
  async fn http_probe_follows_redirects() {
    let server = MockServer::start().await;
    Mock::given(path("/decoy.mp4"))
      .respond_with(ResponseTemplate::new(302).insert_header("Location", format!("{}/real.mp4", server.uri())))
      .mount(&server)
      .await;
    Mock::given(path("/real.mp4")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let probe = Arc::new(HttpProbe::new("vidfloat-test", Duration::from_secs(5)).unwrap());
    let resolver = IdentityResolver::new(probe);
    let resolved = resolver.resolve(&format!("{}/decoy.mp4", server.uri())).await.unwrap();
    assert_eq!(resolved, format!("{}/real.mp4", server.uri()));
  }

  #[tokio::test]
  async fn http_probe_reports_missing_resource() {
    let server = MockServer::start().await;
    Mock::given(path("/gone.mp4")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

    let probe = HttpProbe::new("vidfloat-test", Duration::from_secs(5)).unwrap();
    let url = format!("{}/gone.mp4", server.uri());
    assert_eq!(probe_size(&probe, &url).await, SizeState::Failed);

    let resolver = IdentityResolver::new(Arc::new(probe));
    assert_eq!(resolver.resolve(&url).await, Some(url));
  }
}
