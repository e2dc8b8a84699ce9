//! Overlay placement for a viewport.

use crate::constants::constants;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
  pub width: f64,
  pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
  pub x: f64,
  pub y: f64,
  pub width: f64,
  pub content_height: f64,
  /// Content plus header bar.
  pub total_height: f64,
}

/// Landscape panel at full viewport width. Height adapts to the viewport; width never does.
pub fn compute(viewport: Viewport, header_height: f64) -> Geometry {
  let c = constants();
  let width = viewport.width;
  let mut content_height = width / c.target_aspect_ratio;
  let mut total_height = content_height + header_height;

  let max_total = viewport.height * c.max_total_height_ratio;
  if total_height > max_total {
    total_height = max_total;
    content_height = total_height - header_height;
  }
  let max_content = viewport.height * c.max_content_height_ratio;
  if content_height > max_content {
    content_height = max_content;
    total_height = content_height + header_height;
  }

  Geometry {
    x: 0.0,
    y: viewport.height * c.top_offset_ratio,
    width,
    content_height: content_height.max(0.0),
    total_height: total_height.max(0.0),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn portrait_viewport_needs_no_clamp() {
    let g = compute(Viewport { width: 1000.0, height: 2000.0 }, 40.0);
    assert!((g.content_height - 562.5).abs() < 1e-9);
    assert!((g.total_height - 602.5).abs() < 1e-9);
    assert_eq!(g.width, 1000.0);
    assert_eq!(g.x, 0.0);
    assert!((g.y - 160.0).abs() < 1e-9);
  }

  #[test]
  fn wide_viewport_clamps_total_then_content() {
    let g = compute(Viewport { width: 2000.0, height: 800.0 }, 40.0);
    assert_eq!(g.width, 2000.0);
    // 90% of 800 = 720 total -> 680 content, then content capped at 80% = 640.
    assert!((g.content_height - 640.0).abs() < 1e-9);
    assert!((g.total_height - 680.0).abs() < 1e-9);
  }

  #[test]
  fn total_clamp_alone_when_content_fits() {
    let g = compute(Viewport { width: 1200.0, height: 800.0 }, 100.0);
    // 675 + 100 = 775 > 720 -> total 720, content 620 (< 640).
    assert!((g.total_height - 720.0).abs() < 1e-9);
    assert!((g.content_height - 620.0).abs() < 1e-9);
  }
}
