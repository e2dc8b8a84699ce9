//! Generic tree walking over parsed pages, with shadow roots treated as attached subtrees of
//! their host element.
//!
//! html5ever already moves `<template shadowrootmode>` content into the host, so that shows
//! up as light DOM. Templates marked with the older `shadowroot` attribute stay in the tree
//! and are walked as attached subtrees.

use reqwest::Url;
use scraper::{ElementRef, Html};
use std::ops::Deref;

/// Navigation capability of a document tree.
///
/// `children` yields the light-DOM children; `attached_subtree` yields the roots of any
/// subtree attached to `node` (a shadow root). Walkers never special-case either one.
pub trait TreeWalk: Copy {
  fn children(self) -> Vec<Self>;
  fn attached_subtree(self) -> Vec<Self>;
}

/// Pre-order visit of `root` and everything reachable through children or attached subtrees.
pub fn walk<N: TreeWalk>(root: N, visit: &mut impl FnMut(N)) {
  let mut stack = vec![root];
  while let Some(node) = stack.pop() {
    visit(node);
    let mut next = node.children();
    next.extend(node.attached_subtree());
    stack.extend(next.into_iter().rev());
  }
}

fn is_shadow_root(el: &ElementRef<'_>) -> bool {
  let v = el.value();
  v.name() == "template" && (v.attr("shadowrootmode").is_some() || v.attr("shadowroot").is_some())
}

/// Element roots of a template's content, which the parser keeps under a fragment node.
fn template_contents<'a>(template: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
  let node = *template;
  node
    .children()
    .filter(|n| n.value().is_fragment())
    .flat_map(|fragment| fragment.children())
    .filter_map(ElementRef::wrap)
}

impl<'a> TreeWalk for ElementRef<'a> {
  fn children(self) -> Vec<Self> {
    self.deref().children().filter_map(ElementRef::wrap).filter(|el| !is_shadow_root(el)).collect()
  }

  fn attached_subtree(self) -> Vec<Self> {
    self
      .deref()
      .children()
      .filter_map(ElementRef::wrap)
      .filter(is_shadow_root)
      .flat_map(template_contents)
      .collect()
  }
}

/// Direct text content of an element (no descendants).
pub fn own_text(el: ElementRef<'_>) -> String {
  el.deref().children().filter_map(|n| n.value().as_text().map(|t| t.deref().to_owned())).collect()
}

/// The URL relative references resolve against: `<base href>` when present, else the page URL.
pub fn document_base(doc: &Html, page_url: &Url) -> Url {
  let mut base = None;
  walk(doc.root_element(), &mut |el: ElementRef<'_>| {
    if base.is_none()
      && el.value().name() == "base"
      && let Some(href) = el.value().attr("href")
    {
      base = page_url.join(href.trim()).ok();
    }
  });
  base.unwrap_or_else(|| page_url.clone())
}

/// A `<video>`/`<audio>` element of the host page and whether it is playing.
#[derive(Debug, Clone, PartialEq)]
pub struct PageMedia {
  pub tag: &'static str,
  pub src: Option<String>,
  pub playing: bool,
}

/// Every media element on the page, shadow trees included. Elements with `autoplay`
/// count as playing until paused.
pub fn page_media(doc: &Html) -> Vec<PageMedia> {
  let mut found = Vec::new();
  walk(doc.root_element(), &mut |el: ElementRef<'_>| {
    let tag = match el.value().name() {
      "video" => "video",
      "audio" => "audio",
      _ => return,
    };
    found.push(PageMedia {
      tag,
      src: el.value().attr("src").map(str::to_string),
      playing: el.value().attr("autoplay").is_some(),
    });
  });
  found
}

/// Media elements of the host page other than the overlay's own element.
pub trait HostMedia: Send {
  /// Pause everything except the element playing `current`; returns how many were paused.
  fn pause_all_except(&mut self, current: &str) -> usize;
}

#[derive(Debug, Default)]
pub struct PageMediaSet {
  pub items: Vec<PageMedia>,
}

impl HostMedia for PageMediaSet {
  fn pause_all_except(&mut self, current: &str) -> usize {
    let mut paused = 0;
    for media in self.items.iter_mut().filter(|m| m.playing && m.src.as_deref() != Some(current)) {
      media.playing = false;
      paused += 1;
    }
    paused
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const SHADOW_PAGE: &str = r#"<html><body>
    <div id="host">
      <template shadowrootmode="open"><section id="inner"><video src="a.mp4" autoplay></video></section></template>
      <p id="light"></p>
    </div>
    <audio src="b.mp3" autoplay></audio>
  </body></html>"#;

  fn ids(root: ElementRef<'_>) -> Vec<String> {
    let mut ids = Vec::new();
    walk(root, &mut |el: ElementRef<'_>| {
      if let Some(id) = el.value().attr("id") {
        ids.push(id.to_string());
      }
    });
    ids
  }

  #[test]
  fn declarative_shadow_content_is_inlined_by_the_parser() {
    let doc = Html::parse_document(SHADOW_PAGE);
    assert_eq!(ids(doc.root_element()), vec!["host", "inner", "light"]);
  }

  #[test]
  fn legacy_shadow_template_is_an_attached_subtree() {
    let doc = Html::parse_document(
      r#"<div id="host"><template shadowroot="open"><section id="inner"></section></template><p id="light"></p></div>"#,
    );
    assert_eq!(ids(doc.root_element()), vec!["host", "light", "inner"]);

    let mut host = None;
    walk(doc.root_element(), &mut |el: ElementRef<'_>| {
      if el.value().attr("id") == Some("host") {
        host = Some(el);
      }
    });
    let host = host.unwrap();
    let light: Vec<&str> = TreeWalk::children(host).iter().map(|c| c.value().name()).collect();
    assert_eq!(light, vec!["p"]);
    let shadow: Vec<&str> = host.attached_subtree().iter().filter_map(|c| c.value().attr("id")).collect();
    assert_eq!(shadow, vec!["inner"]);
  }

  #[test]
  fn plain_template_content_is_inert() {
    let doc = Html::parse_document(r#"<div id="host"><template><p id="hidden"></p></template></div>"#);
    assert_eq!(ids(doc.root_element()), vec!["host"]);
  }

  /// Index tree with explicit attached subtrees.
  struct Arena {
    children: Vec<Vec<usize>>,
    shadow: Vec<Vec<usize>>,
  }

  #[derive(Clone, Copy)]
  struct Node<'a> {
    arena: &'a Arena,
    id: usize,
  }

  impl TreeWalk for Node<'_> {
    fn children(self) -> Vec<Self> {
      self.arena.children[self.id].iter().map(|&id| Node { arena: self.arena, id }).collect()
    }

    fn attached_subtree(self) -> Vec<Self> {
      self.arena.shadow[self.id].iter().map(|&id| Node { arena: self.arena, id }).collect()
    }
  }

  #[test]
  fn walk_visits_attached_subtrees_after_light_children() {
    // 0 has children 1 and 2; 1 hosts a shadow root 3 whose child is 4.
    let arena = Arena {
      children: vec![vec![1, 2], vec![], vec![], vec![4], vec![]],
      shadow: vec![vec![], vec![3], vec![], vec![], vec![]],
    };
    let mut order = Vec::new();
    walk(Node { arena: &arena, id: 0 }, &mut |n: Node<'_>| order.push(n.id));
    assert_eq!(order, vec![0, 1, 3, 4, 2]);
  }

  #[test]
  fn base_href_overrides_page_url() {
    let doc = Html::parse_document(r#"<html><head><base href="/media/"></head><body></body></html>"#);
    let page = Url::parse("https://site.example/watch/1").unwrap();
    assert_eq!(document_base(&doc, &page).as_str(), "https://site.example/media/");
  }

  #[test]
  fn base_defaults_to_page_url() {
    let doc = Html::parse_document("<html><body></body></html>");
    let page = Url::parse("https://site.example/watch/1").unwrap();
    assert_eq!(document_base(&doc, &page), page);
  }

  #[test]
  fn page_media_includes_shadow_elements_and_pauses_others() {
    let doc = Html::parse_document(SHADOW_PAGE);
    let mut set = PageMediaSet { items: page_media(&doc) };
    assert_eq!(set.items.len(), 2);
    assert!(set.items.iter().all(|m| m.playing));

    assert_eq!(set.pause_all_except("a.mp4"), 1);
    assert!(set.items.iter().find(|m| m.tag == "video").unwrap().playing);
    assert!(!set.items.iter().find(|m| m.tag == "audio").unwrap().playing);
    assert_eq!(set.pause_all_except("https://elsewhere/x.mp4"), 1);
  }
}
