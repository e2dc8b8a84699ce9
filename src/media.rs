use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
  Image,
  Video,
  /// Adaptive-streaming manifest (HLS/DASH) or its segments.
  VideoStream,
  BackgroundImage,
  Unknown,
}

impl MediaKind {
  pub fn is_playable(self) -> bool {
    matches!(self, MediaKind::Video | MediaKind::VideoStream)
  }
}

/// Outcome of a size probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeState {
  /// Probe not yet resolved.
  Pending,
  Known(u64),
  /// Probe succeeded but the server sent no usable Content-Length.
  UnknownLength,
  Failed,
  /// Not probed on purpose (streaming manifests).
  Skipped,
}

impl SizeState {
  /// Sort class: lower sorts first.
  fn class(self) -> u8 {
    match self {
      SizeState::Known(_) => 0,
      SizeState::UnknownLength => 1,
      SizeState::Pending => 2,
      SizeState::Failed | SizeState::Skipped => 3,
    }
  }

  pub fn is_settled(self) -> bool {
    !matches!(self, SizeState::Pending)
  }

  pub fn label(self) -> String {
    match self {
      SizeState::Pending => "loading…".to_string(),
      SizeState::Known(bytes) => format_bytes(bytes),
      SizeState::UnknownLength => "unknown".to_string(),
      SizeState::Failed => "unavailable".to_string(),
      SizeState::Skipped => "stream".to_string(),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaCandidate {
  /// Absolute URL.
  pub url: String,
  pub kind: MediaKind,
  /// Short type tag shown in the list, e.g. `Video:MP4`.
  pub label: String,
  pub size: SizeState,
}

/// Total order for the extractor list: known sizes descending, then unknown-length,
/// then pending, then failed/skipped.
pub fn rank_cmp(a: &MediaCandidate, b: &MediaCandidate) -> Ordering {
  match (a.size, b.size) {
    (SizeState::Known(x), SizeState::Known(y)) => y.cmp(&x),
    (x, y) => x.class().cmp(&y.class()),
  }
}

/// Stable re-sort; entries of the same class keep their relative order.
pub fn rank(list: &mut [MediaCandidate]) {
  list.sort_by(rank_cmp);
}

/// Human-readable byte count, two decimals, binary units.
pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
  if bytes == 0 {
    return "0 B".to_string();
  }
  let exp = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
  let exp = exp.min(UNITS.len() - 1);
  let value = bytes as f64 / 1024f64.powi(exp as i32);
  let rounded = (value * 100.0).round() / 100.0;
  format!("{} {}", rounded, UNITS[exp])
}

/// True for HLS/DASH manifest URLs.
pub fn is_manifest(url: &str) -> bool {
  let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
  path.ends_with(".m3u8") || path.ends_with(".mpd")
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(url: &str, size: SizeState) -> MediaCandidate {
    MediaCandidate { url: url.to_string(), kind: MediaKind::Video, label: "Video".to_string(), size }
  }

  #[test]
  fn rank_orders_known_desc_then_pending_then_failed() {
    let mut list = vec![
      entry("a", SizeState::Failed),
      entry("b", SizeState::Pending),
      entry("c", SizeState::Known(10)),
      entry("d", SizeState::Skipped),
      entry("e", SizeState::Known(500)),
      entry("f", SizeState::UnknownLength),
    ];
    rank(&mut list);
    let order: Vec<&str> = list.iter().map(|m| m.url.as_str()).collect();
    assert_eq!(order, vec!["e", "c", "f", "b", "a", "d"]);
  }

  #[test]
  fn rank_is_stable_within_class() {
    let mut list = vec![entry("p1", SizeState::Pending), entry("p2", SizeState::Pending), entry("p3", SizeState::Pending)];
    rank(&mut list);
    let order: Vec<&str> = list.iter().map(|m| m.url.as_str()).collect();
    assert_eq!(order, vec!["p1", "p2", "p3"]);
  }

  #[test]
  fn format_bytes_units() {
    assert_eq!(format_bytes(0), "0 B");
    assert_eq!(format_bytes(500), "500 B");
    assert_eq!(format_bytes(1024), "1 KB");
    assert_eq!(format_bytes(1536), "1.5 KB");
    assert_eq!(format_bytes(5 * 1024 * 1024), "5 MB");
  }

  #[test]
  fn manifest_detection_ignores_query() {
    assert!(is_manifest("https://x/live/index.m3u8?token=1"));
    assert!(is_manifest("https://x/a.MPD"));
    assert!(!is_manifest("https://x/a.mp4?f=.m3u8x"));
  }

  #[test]
  fn only_video_kinds_play() {
    assert!(MediaKind::Video.is_playable());
    assert!(MediaKind::VideoStream.is_playable());
    assert!(!MediaKind::Image.is_playable());
    assert!(!MediaKind::BackgroundImage.is_playable());
    assert!(!MediaKind::Unknown.is_playable());
  }
}
