//! Long-press-to-drag gesture for the overlay handle.
//!
//! `Idle -> Pressed -> Dragging`. A press only becomes a drag once it has been held for the
//! long-press threshold; releasing earlier is a click and moves nothing. While dragging the
//! translation is a render offset on top of the resting position and is folded into it when
//! the gesture ends, so the next drag starts from zero delta.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::constants::constants;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
  pub x: i32,
  pub y: i32,
}

impl Point {
  pub fn new(x: i32, y: i32) -> Self {
    Self { x, y }
  }

  fn offset(self, by: Point) -> Point {
    Point { x: self.x + by.x, y: self.y + by.y }
  }

  fn delta_from(self, origin: Point) -> Point {
    Point { x: self.x - origin.x, y: self.y - origin.y }
  }
}

/// Captured when the long-press timer fires; lives for one gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
  pub press_start: Instant,
  pub pointer_origin: Point,
  pub element_origin_offset: Point,
  pub is_dragging: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
  Idle,
  Pressed { at: Instant, pointer: Point },
  Dragging(DragState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOutcome {
  None,
  /// Released before the threshold.
  Click,
  /// Gesture ended; the element rests at `position`.
  Dropped { position: Point },
}

#[derive(Debug, Clone)]
pub struct DragController {
  phase: Phase,
  resting: Point,
  translation: Point,
  threshold: Duration,
}

impl DragController {
  pub fn new(resting: Point) -> Self {
    Self {
      phase: Phase::Idle,
      resting,
      translation: Point::default(),
      threshold: Duration::from_millis(constants().long_press_ms),
    }
  }

  /// Where the element should be drawn right now.
  pub fn position(&self) -> Point {
    self.resting.offset(self.translation)
  }

  pub fn is_dragging(&self) -> bool {
    matches!(self.phase, Phase::Dragging(_))
  }

  pub fn is_pressed(&self) -> bool {
    !matches!(self.phase, Phase::Idle)
  }

  pub fn state(&self) -> Option<&DragState> {
    match &self.phase {
      Phase::Dragging(state) => Some(state),
      _ => None,
    }
  }

  /// Move the resting position, e.g. after the overlay geometry is recomputed. Ends any gesture.
  pub fn reset(&mut self, resting: Point) {
    self.phase = Phase::Idle;
    self.resting = resting;
    self.translation = Point::default();
  }

  pub fn press(&mut self, pointer: Point, now: Instant) {
    if self.is_pressed() {
      debug!("drag: cancelling stale gesture");
      self.end();
    }
    self.phase = Phase::Pressed { at: now, pointer };
  }

  /// Advance the long-press timer. Returns `true` when this call started a drag.
  pub fn tick(&mut self, now: Instant) -> bool {
    if let Phase::Pressed { at, pointer } = self.phase
      && now.saturating_duration_since(at) >= self.threshold
    {
      self.phase = Phase::Dragging(DragState {
        press_start: at,
        pointer_origin: pointer,
        element_origin_offset: self.resting,
        is_dragging: true,
      });
      debug!(x = pointer.x, y = pointer.y, "drag: long press, dragging");
      return true;
    }
    false
  }

  pub fn move_to(&mut self, pointer: Point, now: Instant) {
    self.tick(now);
    match &mut self.phase {
      Phase::Pressed { pointer: last, .. } => *last = pointer,
      Phase::Dragging(state) => self.translation = pointer.delta_from(state.pointer_origin),
      Phase::Idle => {}
    }
  }

  pub fn release(&mut self, now: Instant) -> DragOutcome {
    match self.phase {
      Phase::Idle => DragOutcome::None,
      Phase::Pressed { at, .. } if now.saturating_duration_since(at) < self.threshold => {
        self.phase = Phase::Idle;
        DragOutcome::Click
      }
      _ => self.end(),
    }
  }

  /// Pointer left the handle.
  pub fn leave(&mut self) -> DragOutcome {
    self.cancel()
  }

  /// Gesture aborted by the platform. A pending press is discarded without a click.
  pub fn cancel(&mut self) -> DragOutcome {
    match self.phase {
      Phase::Idle => DragOutcome::None,
      Phase::Pressed { .. } => {
        self.phase = Phase::Idle;
        DragOutcome::None
      }
      Phase::Dragging(_) => self.end(),
    }
  }

  fn end(&mut self) -> DragOutcome {
    self.resting = self.position();
    self.translation = Point::default();
    self.phase = Phase::Idle;
    DragOutcome::Dropped { position: self.resting }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
  }

  #[test]
  fn short_press_is_a_click_without_movement() {
    let t0 = Instant::now();
    let mut drag = DragController::new(Point::new(10, 4));
    drag.press(Point::new(12, 4), t0);
    drag.move_to(Point::new(30, 9), t0 + ms(50));
    assert!(!drag.tick(t0 + ms(100)));
    assert_eq!(drag.release(t0 + ms(100)), DragOutcome::Click);
    assert_eq!(drag.position(), Point::new(10, 4));
  }

  #[test]
  fn long_press_then_move_translates_and_folds_on_release() {
    let t0 = Instant::now();
    let mut drag = DragController::new(Point::new(10, 4));
    drag.press(Point::new(12, 4), t0);
    assert!(drag.tick(t0 + ms(300)));
    let state = *drag.state().unwrap();
    assert_eq!(state.pointer_origin, Point::new(12, 4));
    assert_eq!(state.element_origin_offset, Point::new(10, 4));
    assert!(state.is_dragging);

    drag.move_to(Point::new(20, 1), t0 + ms(350));
    assert_eq!(drag.position(), Point::new(18, 1));
    assert_eq!(drag.release(t0 + ms(400)), DragOutcome::Dropped { position: Point::new(18, 1) });

    drag.press(Point::new(20, 1), t0 + ms(500));
    drag.tick(t0 + ms(900));
    assert_eq!(drag.position(), Point::new(18, 1));
  }

  #[test]
  fn move_after_threshold_starts_drag_without_explicit_tick() {
    let t0 = Instant::now();
    let mut drag = DragController::new(Point::default());
    drag.press(Point::new(5, 5), t0);
    drag.move_to(Point::new(8, 5), t0 + ms(310));
    assert!(drag.is_dragging());
    assert_eq!(drag.position(), Point::new(3, 0));
  }

  #[test]
  fn leave_and_cancel_end_the_gesture() {
    let t0 = Instant::now();
    let mut drag = DragController::new(Point::default());
    drag.press(Point::new(0, 0), t0);
    drag.tick(t0 + ms(300));
    drag.move_to(Point::new(4, 2), t0 + ms(320));
    assert_eq!(drag.leave(), DragOutcome::Dropped { position: Point::new(4, 2) });
    assert!(!drag.is_pressed());

    drag.press(Point::new(1, 1), t0 + ms(400));
    assert_eq!(drag.cancel(), DragOutcome::None);
    assert_eq!(drag.release(t0 + ms(450)), DragOutcome::None);
  }

  #[test]
  fn new_press_cancels_stale_gesture() {
    let t0 = Instant::now();
    let mut drag = DragController::new(Point::default());
    drag.press(Point::new(0, 0), t0);
    drag.tick(t0 + ms(300));
    drag.move_to(Point::new(6, 0), t0 + ms(310));
    drag.press(Point::new(50, 50), t0 + ms(320));
    assert!(!drag.is_dragging());
    assert_eq!(drag.position(), Point::new(6, 0));
    assert_eq!(drag.release(t0 + ms(330)), DragOutcome::Click);
    assert_eq!(drag.position(), Point::new(6, 0));
  }

  #[test]
  fn held_without_movement_drops_in_place() {
    let t0 = Instant::now();
    let mut drag = DragController::new(Point::new(2, 2));
    drag.press(Point::new(3, 3), t0);
    assert_eq!(drag.release(t0 + ms(500)), DragOutcome::Dropped { position: Point::new(2, 2) });
  }
}
