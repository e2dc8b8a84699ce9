//! Media link discovery over a parsed page.
//!
//! Two layers run over the same tree. The structured layer reads well-known element
//! attributes, responsive-image descriptor lists and inline background images. The
//! heuristic layer pattern-matches media URLs in serialized markup, attribute values and
//! inline scripts; it is best-effort by nature and will pick up links from comments,
//! dead code and unrelated JSON blobs. It can be switched off without touching the
//! structured path.

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Url;
use scraper::ElementRef;
use std::collections::HashSet;
use tracing::debug;

use crate::constants::constants;
use crate::dom::{own_text, walk};

/// Where a raw link was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOrigin {
  /// `src`/lazy-load attribute of a media element. `parent` and `mime` are only set for `<source>`.
  Element { tag: String, mime: Option<String>, parent: Option<String> },
  Srcset,
  Background,
  Markup,
  Attribute,
  Script,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLink {
  /// Absolute URL.
  pub url: String,
  pub origin: LinkOrigin,
}

const MEDIA_TAGS: [&str; 4] = ["img", "video", "audio", "source"];
const SOURCE_ATTRS: [&str; 3] = ["src", "data-src", "data-original"];

pub struct LinkScanner {
  media_link: Regex,
  background_url: Regex,
  heuristics: bool,
}

impl LinkScanner {
  pub fn new() -> Result<Self> {
    let extensions = constants().media_extensions.iter().map(|e| regex::escape(e)).collect::<Vec<_>>().join("|");
    let media_link = Regex::new(&format!(r#"(?i)https?://[^\s"'<>\\]+?\.(?:{extensions})\b(?:\?[^\s"'<>\\]*)?"#))
      .context("Invalid media link pattern")?;
    let background_url =
      Regex::new(r#"(?i)url\(\s*['"]?([^)'"]+)['"]?\s*\)"#).context("Invalid background-image pattern")?;
    Ok(Self { media_link, background_url, heuristics: true })
  }

  pub fn with_heuristics(mut self, enabled: bool) -> Self {
    self.heuristics = enabled;
    self
  }

  /// Every link under `root` (attached subtrees included), structured results first.
  /// Not deduplicated; see [`unique`].
  pub fn scan(&self, root: ElementRef<'_>, base: &Url) -> Vec<RawLink> {
    let mut links = Vec::new();
    walk(root, &mut |el: ElementRef<'_>| self.inspect_element(el, base, &mut links));
    let structured = links.len();
    if self.heuristics {
      self.scan_markup(root, base, &mut links);
    }
    debug!(structured, heuristic = links.len() - structured, "scanner: pass complete");
    links
  }

  fn inspect_element(&self, el: ElementRef<'_>, base: &Url, links: &mut Vec<RawLink>) {
    let v = el.value();
    let tag = v.name();

    if MEDIA_TAGS.contains(&tag) {
      if matches!(tag, "img" | "source")
        && let Some(best) = v.attr("srcset").and_then(largest_srcset)
        && let Some(url) = absolutize(base, best)
      {
        links.push(RawLink { url, origin: LinkOrigin::Srcset });
      }

      let (mime, parent) = if tag == "source" {
        let parent = el.parent().and_then(ElementRef::wrap).map(|p| p.value().name().to_string());
        (v.attr("type").map(str::to_string), parent)
      } else {
        (None, None)
      };
      for attr in SOURCE_ATTRS {
        if let Some(raw) = v.attr(attr)
          && let Some(url) = absolutize(base, raw)
        {
          let origin = LinkOrigin::Element { tag: tag.to_string(), mime: mime.clone(), parent: parent.clone() };
          links.push(RawLink { url, origin });
        }
      }
    }

    if let Some(style) = v.attr("style")
      && style.to_ascii_lowercase().contains("background-image")
    {
      for cap in self.background_url.captures_iter(style) {
        if let Some(url) = cap.get(1).and_then(|m| absolutize(base, m.as_str())) {
          links.push(RawLink { url, origin: LinkOrigin::Background });
        }
      }
    }
  }

  fn scan_markup(&self, root: ElementRef<'_>, base: &Url, links: &mut Vec<RawLink>) {
    let markup = decode_entities(&root.html());
    self.match_text(&markup, base, LinkOrigin::Markup, links);

    walk(root, &mut |el: ElementRef<'_>| {
      for (_, value) in el.value().attrs() {
        self.match_text(value, base, LinkOrigin::Attribute, links);
      }
      if el.value().name() == "script" {
        self.match_text(&own_text(el), base, LinkOrigin::Script, links);
      }
    });
  }

  fn match_text(&self, text: &str, base: &Url, origin: LinkOrigin, links: &mut Vec<RawLink>) {
    for m in self.media_link.find_iter(text) {
      if let Some(url) = absolutize(base, m.as_str()) {
        links.push(RawLink { url, origin: origin.clone() });
      }
    }
  }
}

/// Undo the escaping the serializer applies to attribute values and text.
fn decode_entities(markup: &str) -> String {
  markup.replace("&quot;", "\"").replace("&#39;", "'").replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
}

/// Resolve `raw` against `base`. Only http(s) results survive; anything that fails to parse is dropped.
pub fn absolutize(base: &Url, raw: &str) -> Option<String> {
  let raw = raw.trim();
  if raw.is_empty() {
    return None;
  }
  let url = base.join(raw).ok()?;
  matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// URL of the entry with the highest `w`/`x` descriptor. Ties keep the first entry; an entry
/// without a descriptor is only used when no entry has one.
pub fn largest_srcset(srcset: &str) -> Option<&str> {
  let mut best: Option<(&str, f64)> = None;
  let mut fallback = None;
  for part in srcset.split(',') {
    let mut fields = part.split_whitespace();
    let Some(url) = fields.next() else { continue };
    let value = fields.next().and_then(|desc| {
      let number = desc.strip_suffix(['w', 'x', 'W', 'X'])?;
      number.parse::<f64>().ok().filter(|v| v.is_finite())
    });
    match value {
      Some(value) if best.is_none_or(|(_, current)| value > current) => best = Some((url, value)),
      Some(_) => {}
      None => {
        fallback.get_or_insert(url);
      }
    }
  }
  best.map(|(url, _)| url).or(fallback)
}

/// Drop repeated URLs by exact string; the first occurrence wins.
pub fn unique(links: Vec<RawLink>) -> Vec<RawLink> {
  let mut seen = HashSet::new();
  links.into_iter().filter(|link| seen.insert(link.url.clone())).collect()
}
