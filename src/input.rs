use anyhow::Result;
use ratatui::crossterm::event::{self, KeyCode, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};

use crate::app::{App, AppMode};

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Event Handling ---

pub fn handle_key_event(app: &mut App, key: event::KeyEvent) -> Result<()> {
  if key.modifiers.contains(KeyModifiers::CONTROL) {
    match key.code {
      KeyCode::Char('c') => {
        app.should_quit = true;
        return Ok(());
      }
      KeyCode::Char('t') => {
        app.next_theme();
        return Ok(());
      }
      KeyCode::Char('p') => {
        app.toggle_player();
        return Ok(());
      }
      KeyCode::Char('r') => {
        app.reparse();
        return Ok(());
      }
      KeyCode::Char('e') => {
        app.toggle_extractor();
        return Ok(());
      }
      _ => {}
    }
  }

  match app.mode {
    AppMode::Input => handle_input_key(app, key),
    AppMode::Player => handle_player_key(app, key),
    AppMode::Extractor => handle_extractor_key(app, key),
  }
  Ok(())
}

fn handle_input_key(app: &mut App, key: event::KeyEvent) {
  app.clear_error();
  match key.code {
    KeyCode::Enter => {
      app.submit_input();
    }
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
      app.input.insert(byte_idx, c);
      app.cursor_position += 1;
    }
    KeyCode::Backspace => {
      if app.cursor_position > 0 {
        app.cursor_position -= 1;
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
      }
    }
    KeyCode::Delete => {
      if app.cursor_position < app.input.chars().count() {
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
      }
    }
    KeyCode::Left => {
      app.cursor_position = app.cursor_position.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.cursor_position < app.input.chars().count() {
        app.cursor_position += 1;
      }
    }
    KeyCode::Home => {
      app.cursor_position = 0;
    }
    KeyCode::End => {
      app.cursor_position = app.input.chars().count();
    }
    KeyCode::Esc => {
      if !app.input.is_empty() {
        app.input.clear();
        app.cursor_position = 0;
        app.input_scroll = 0;
      } else if app.player.is_open() {
        app.mode = AppMode::Player;
      } else {
        app.should_quit = true;
      }
    }
    KeyCode::Tab => {
      if app.player.is_open() {
        app.mode = AppMode::Player;
      }
    }
    _ => {}
  }
}

fn handle_player_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Char(' ') => app.player.toggle_pause(),
    KeyCode::Left | KeyCode::Char('h') => app.skip_backward(),
    KeyCode::Right | KeyCode::Char('l') => app.skip_forward(),
    KeyCode::Char('s') => app.cycle_speed(),
    KeyCode::Char('H') => app.toggle_hold_speed(),
    KeyCode::Char('x') => app.toggle_player(),
    KeyCode::Esc | KeyCode::Tab | KeyCode::Char('/') => {
      app.mode = AppMode::Input;
    }
    _ => {}
  }
}

fn handle_extractor_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Enter => {
      app.play_selected();
    }
    KeyCode::Char('r') => {
      app.refresh_extractor();
    }
    KeyCode::Down | KeyCode::Char('j') => {
      let count = app.extractor.len();
      if count > 0 {
        let i = app.list_state.selected().map_or(0, |i| (i + 1) % count);
        app.list_state.select(Some(i));
      }
    }
    KeyCode::Up | KeyCode::Char('k') => {
      let count = app.extractor.len();
      if count > 0 {
        let i =
          app.list_state.selected().map_or(0, |i| if i == 0 { count.saturating_sub(1) } else { i.saturating_sub(1) });
        app.list_state.select(Some(i));
      }
    }
    KeyCode::Esc => {
      app.mode = if app.player.is_open() { AppMode::Player } else { AppMode::Input };
    }
    _ => {}
  }
}

/// Press and drag on the overlay header moves it; a short press toggles pause.
pub fn handle_mouse_event(app: &mut App, mouse: MouseEvent) {
  match mouse.kind {
    MouseEventKind::Down(MouseButton::Left) => app.mouse_down(mouse.column, mouse.row),
    MouseEventKind::Drag(MouseButton::Left) => app.mouse_drag(mouse.column, mouse.row),
    MouseEventKind::Up(MouseButton::Left) => app.mouse_up(),
    MouseEventKind::Moved => app.mouse_moved(mouse.column, mouse.row),
    MouseEventKind::Down(_) => app.mouse_cancel(),
    _ => {}
  }
}
