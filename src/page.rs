//! Loading the host page and turning it into discovery results.

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, Url};
use scraper::Html;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::dom::{PageMediaSet, document_base, page_media};
use crate::media::MediaCandidate;
use crate::ranker::{SelectionPolicy, catalog};
use crate::scanner::{LinkOrigin, LinkScanner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
  Url(Url),
  File(PathBuf),
}

impl PageSource {
  /// `http(s)://` and `file://` URLs, anything else is a local path.
  pub fn parse(arg: &str) -> Result<Self> {
    let arg = arg.trim();
    if arg.is_empty() {
      return Err(anyhow!("Enter a page URL or file path."));
    }
    let lower = arg.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
      let url = Url::parse(arg).with_context(|| format!("Invalid URL: {}", arg))?;
      return Ok(Self::Url(url));
    }
    if lower.starts_with("file://") {
      let url = Url::parse(arg).with_context(|| format!("Invalid URL: {}", arg))?;
      let path = url.to_file_path().map_err(|_| anyhow!("Not a local file URL: {}", arg))?;
      return Ok(Self::File(path));
    }
    Ok(Self::File(PathBuf::from(arg)))
  }

  pub fn label(&self) -> String {
    match self {
      Self::Url(url) => url.to_string(),
      Self::File(path) => path.display().to_string(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Page {
  /// Address relative links resolve against, after redirects.
  pub url: Url,
  pub markup: String,
}

impl Page {
  pub fn document(&self) -> Html {
    Html::parse_document(&self.markup)
  }
}

pub async fn load(client: &Client, source: &PageSource) -> Result<Page> {
  match source {
    PageSource::Url(url) => {
      let resp = client.get(url.clone()).send().await.with_context(|| format!("Failed to fetch {}", url))?;
      let resp = resp.error_for_status().with_context(|| format!("Failed to fetch {}", url))?;
      let final_url = resp.url().clone();
      let markup = resp.text().await.context("Failed to read page body")?;
      info!(url = %final_url, bytes = markup.len(), "page: fetched");
      Ok(Page { url: final_url, markup })
    }
    PageSource::File(path) => {
      let markup = tokio::fs::read_to_string(path).await.with_context(|| format!("Failed to read {}", path.display()))?;
      let abs = std::path::absolute(path).with_context(|| format!("Failed to resolve {}", path.display()))?;
      let url = Url::from_file_path(&abs).map_err(|_| anyhow!("Cannot address {} as a URL", abs.display()))?;
      debug!(path = %path.display(), bytes = markup.len(), "page: read");
      Ok(Page { url, markup })
    }
  }
}

/// Everything one discovery pass learns from a page.
#[derive(Debug, Default)]
pub struct PageScan {
  /// Single best playable URL, before identity resolution.
  pub best: Option<String>,
  /// Extractor entries, unranked and unprobed.
  pub catalog: Vec<MediaCandidate>,
  pub host_media: PageMediaSet,
}

/// Links that may stand for the page's main video: media element sources and pattern matches.
fn video_origin(origin: &LinkOrigin) -> bool {
  match origin {
    LinkOrigin::Element { tag, parent, .. } => tag != "img" && parent.as_deref() != Some("picture"),
    LinkOrigin::Srcset | LinkOrigin::Background => false,
    LinkOrigin::Markup | LinkOrigin::Attribute | LinkOrigin::Script => true,
  }
}

pub fn scan(page: &Page, scanner: &LinkScanner, policy: &SelectionPolicy) -> PageScan {
  let doc = page.document();
  let base = document_base(&doc, &page.url);
  let links = scanner.scan(doc.root_element(), &base);
  let best = policy.select_best(links.iter().filter(|l| video_origin(&l.origin)).map(|l| l.url.as_str()));
  let catalog = catalog(&links);
  debug!(links = links.len(), entries = catalog.len(), best = ?best, "page: scanned");
  PageScan { best, catalog, host_media: PageMediaSet { items: page_media(&doc) } }
}
