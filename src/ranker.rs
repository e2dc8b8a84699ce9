//! Candidate filtering: one best guess for the player, or an exhaustive typed list for the extractor.

use std::collections::HashSet;

use crate::constants::constants;
use crate::media::{MediaCandidate, MediaKind, SizeState, is_manifest};
use crate::scanner::{LinkOrigin, RawLink};

/// How equally-qualified candidates are ordered by the single-best policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
  /// Longest URL, counted in characters, wins. Equal lengths keep page order.
  #[default]
  LongestUrl,
  FirstSeen,
}

#[derive(Debug, Clone)]
pub struct SelectionPolicy {
  pub min_length: usize,
  /// Lowercase substrings that disqualify a URL.
  pub exclude_keywords: Vec<String>,
  pub tie_break: TieBreak,
}

impl Default for SelectionPolicy {
  fn default() -> Self {
    let c = constants();
    Self {
      min_length: c.min_best_length,
      exclude_keywords: c.exclude_keywords.iter().map(|k| k.to_lowercase()).collect(),
      tie_break: TieBreak::default(),
    }
  }
}

impl SelectionPolicy {
  pub fn accepts(&self, url: &str) -> bool {
    let lower = url.to_lowercase();
    if self.exclude_keywords.iter().any(|k| lower.contains(k.as_str())) {
      return false;
    }
    if path_of(&lower).ends_with(".ts") && !lower.contains(".m3u8") {
      return false;
    }
    url_length(url) >= self.min_length
  }

  /// The single best candidate URL, or `None` when nothing qualifies.
  pub fn select_best<'a>(&self, urls: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut seen = HashSet::new();
    let mut survivors = urls.into_iter().filter(|u| seen.insert(*u)).filter(|u| self.accepts(u));
    let best = match self.tie_break {
      TieBreak::FirstSeen => survivors.next(),
      TieBreak::LongestUrl => survivors
        .fold(None, |best: Option<(&str, usize)>, url| {
          let len = url_length(url);
          match best {
            Some((b, best_len)) if best_len >= len => Some((b, best_len)),
            _ => Some((url, len)),
          }
        })
        .map(|(url, _)| url),
    };
    best.map(str::to_string)
  }
}

/// Length in characters, the measure both the minimum and the tie-break use.
fn url_length(url: &str) -> usize {
  url.chars().count()
}

fn path_of(url: &str) -> &str {
  url.split(['?', '#']).next().unwrap_or(url)
}

/// Exhaustive policy: every qualifying link, deduplicated and typed. Manifests are marked
/// `Skipped` so they never reach the size probe; everything else starts `Pending`.
pub fn catalog(links: &[RawLink]) -> Vec<MediaCandidate> {
  let min_length = constants().min_list_length;
  let mut seen = HashSet::new();
  let mut list = Vec::new();
  for link in links {
    if !seen.insert(link.url.as_str()) {
      continue;
    }
    let url = link.url.as_str();
    if url.len() < min_length || url.starts_with("data:") || url.contains("spacer") {
      continue;
    }
    let (kind, label) = classify(&link.origin);
    if kind == MediaKind::Image || kind == MediaKind::BackgroundImage {
      let path = path_of(url).to_ascii_lowercase();
      if path.ends_with(".svg") || path.contains(".ico") {
        continue;
      }
    }
    let candidate = if is_manifest(url) {
      MediaCandidate { url: url.to_string(), kind: MediaKind::VideoStream, label: "Video:M3U8".into(), size: SizeState::Skipped }
    } else {
      MediaCandidate { url: url.to_string(), kind, label, size: SizeState::Pending }
    };
    list.push(candidate);
  }
  list
}

fn classify(origin: &LinkOrigin) -> (MediaKind, String) {
  match origin {
    LinkOrigin::Element { tag, mime, parent } => match tag.as_str() {
      "img" => (MediaKind::Image, "Image".into()),
      "video" | "audio" => (MediaKind::Video, "Video".into()),
      _ => {
        let mime = mime.as_deref().unwrap_or_default().to_ascii_lowercase();
        let parent = parent.as_deref().unwrap_or("source");
        if mime.contains("mp4") {
          (MediaKind::Video, "Video:MP4".into())
        } else if mime.contains("webm") {
          (MediaKind::Video, "Video:WEBM".into())
        } else if parent == "picture" {
          (MediaKind::Image, "Image:PICTURE".into())
        } else {
          let kind = if matches!(parent, "video" | "audio") { MediaKind::Video } else { MediaKind::Unknown };
          (kind, format!("Video:{}", parent.to_ascii_uppercase()))
        }
      }
    },
    LinkOrigin::Srcset => (MediaKind::Image, "Image:SRCSET".into()),
    LinkOrigin::Background => (MediaKind::BackgroundImage, "BG Image".into()),
    LinkOrigin::Markup | LinkOrigin::Attribute | LinkOrigin::Script => (MediaKind::Video, "Video:LINK".into()),
  }
}
