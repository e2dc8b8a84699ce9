use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, Clear, Gauge, List, ListItem, Padding, Paragraph},
};

use crate::app::{App, AppMode, CELL_ASPECT};
use crate::media::MediaKind;
use crate::player::element::MediaElement;
use crate::player::session::ToggleIndicator;
use crate::theme::Theme;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

/// `m:ss` or `h:mm:ss`.
fn format_time(secs: f64) -> String {
  let total = if secs.is_finite() && secs > 0.0 { secs as u64 } else { 0 };
  let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
  if h > 0 { format!("{}:{:02}:{:02}", h, m, s) } else { format!("{}:{:02}", m, s) }
}

fn indicator_span(indicator: ToggleIndicator, theme: &Theme) -> Span<'static> {
  let (text, color) = match indicator {
    ToggleIndicator::Searching => (" ◌ searching ", theme.status),
    ToggleIndicator::Found => (" ▶ video found ", theme.accent),
    ToggleIndicator::PlayingClose => (" ✕ close player ", theme.highlight_bg),
    ToggleIndicator::NothingFound => (" ○ nothing found ", theme.muted),
  };
  Span::styled(text, Style::default().fg(color).add_modifier(Modifier::BOLD))
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_input(frame, app, input_area);
  render_footer(frame, app, footer_area);
  render_overlay(frame, app);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let left = Line::from(Span::styled(" ▣ vidfloat ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let indicator = indicator_span(app.player.indicator(), theme);
  let width = indicator.width() as u16;
  let right_area = Rect { x: area.x + area.width.saturating_sub(width), width: width.min(area.width), ..area };
  frame.render_widget(Line::from(indicator), right_area);
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  if app.mode == AppMode::Extractor {
    render_extractor(frame, app, area);
  } else if let Some(source) = &app.source {
    render_page(frame, app, &source.label(), area);
  } else {
    render_welcome(frame, app.theme(), area);
  }
}

fn render_welcome(frame: &mut Frame, theme: &Theme, area: Rect) {
  let text = vec![
    Line::from(""),
    Line::from(Span::styled("▣  Welcome to vidfloat", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled("Find the real video on a page. Play it in a floating panel.", Style::default().fg(theme.fg))),
    Line::from(""),
    Line::from(Span::styled("Type a page URL or file path below and press Enter.", Style::default().fg(theme.muted))),
  ];
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).block(
    Block::bordered()
      .border_type(ratatui::widgets::BorderType::Rounded)
      .border_style(Style::default().fg(theme.border)),
  );
  frame.render_widget(paragraph, area);
}

fn render_page(frame: &mut Frame, app: &App, label: &str, area: Rect) {
  let theme = app.theme();
  let inner_w = area.width.saturating_sub(4) as usize;
  let block = Block::bordered()
    .title(Span::styled(" Page ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(theme.border))
    .padding(Padding::horizontal(1));

  let mut lines = vec![
    Line::from(""),
    Line::from(Span::styled(truncate_str(label, inner_w), Style::default().fg(theme.fg).add_modifier(Modifier::BOLD))),
    Line::from(""),
  ];
  let value_w = inner_w.saturating_sub(10);
  let row = |name: &'static str, value: String| {
    Line::from(vec![
      Span::styled(name, Style::default().fg(theme.muted)),
      Span::styled(truncate_str(&value, value_w), Style::default().fg(theme.fg)),
    ])
  };
  if let Some(url) = app.player.current_url() {
    lines.push(row("Video     ", url.to_string()));
  }
  if !app.extractor.is_empty() {
    lines.push(row("Links     ", app.extractor.len().to_string()));
  }
  let s = &app.settings;
  lines.push(row("Skip      ", format!("-{}s / +{}s", s.skip_backward, s.skip_forward)));
  lines.push(row("Hold      ", format!("{}x", s.hold_speed)));

  frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_extractor(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();

  // Area minus 2 borders minus 2 chars for the highlight symbol.
  let inner_w = area.width.saturating_sub(4) as usize;
  let label_w = 12;
  let size_w = 12;
  let url_w = inner_w.saturating_sub(label_w + size_w + 2);

  let items: Vec<ListItem> = app
    .extractor
    .iter()
    .enumerate()
    .map(|(i, entry)| {
      let is_selected = Some(i) == app.list_state.selected();
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if is_selected {
        theme.highlight_bg
      } else if i % 2 == 1 {
        theme.stripe_bg
      } else {
        theme.bg
      };
      let kind_color = match entry.kind {
        MediaKind::Video | MediaKind::VideoStream => theme.accent,
        _ => theme.muted,
      };
      let label = format!("{:<label_w$}", truncate_str(&entry.label, label_w - 1));
      let size = format!("{:>size_w$} ", entry.size.label());
      let line = Line::from(vec![
        Span::styled(label, Style::default().fg(if is_selected { fg } else { kind_color })),
        Span::styled(size, Style::default().fg(if is_selected { fg } else { theme.muted })),
        Span::raw(" "),
        Span::styled(truncate_str(&entry.url, url_w), Style::default().fg(fg)),
      ]);
      ListItem::new(line).bg(bg)
    })
    .collect();

  let suffix = if app.is_ranking() { " (probing…)" } else { "" };
  let title = format!(" Media links — {}{} ", app.extractor.len(), suffix);

  let list = List::new(items)
    .block(
      Block::bordered()
        .title(title)
        .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
        .border_type(ratatui::widgets::BorderType::Rounded)
        .border_style(Style::default().fg(theme.border)),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.list_state);
}

/// The floating player panel, drawn last over everything else.
fn render_overlay(frame: &mut Frame, app: &mut App) {
  app.overlay_area = None;
  if !app.player.is_open() {
    return;
  }
  let geometry = app.player.placement();
  let theme = app.theme();
  let screen = frame.area();
  let pos = app.drag.position();

  let width = (geometry.width.round() as u16).min(screen.width);
  let height = ((geometry.total_height / CELL_ASPECT).round() as u16).clamp(4, screen.height.max(4));
  let x = pos.x.clamp(0, i32::from(screen.width.saturating_sub(width))) as u16;
  let y = pos.y.clamp(0, i32::from(screen.height.saturating_sub(height))) as u16;
  let area = Rect { x, y, width, height: height.min(screen.height) };
  app.overlay_area = Some(area);

  let el = app.player.element();
  let title = Line::from(vec![
    Span::styled(" ▶ ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(
      if app.drag.is_dragging() { "moving… " } else { "hold to move " },
      Style::default().fg(theme.muted),
    ),
  ]);
  let block = Block::bordered()
    .title(title)
    .title_bottom(Line::from(indicator_span(app.player.indicator(), theme)).right_aligned())
    .border_type(ratatui::widgets::BorderType::Thick)
    .border_style(Style::default().fg(if app.drag.is_dragging() { theme.accent } else { theme.border }))
    .style(Style::default().bg(theme.overlay_bg))
    .padding(Padding::horizontal(1));
  let inner = block.inner(area);
  frame.render_widget(Clear, area);
  frame.render_widget(block, area);

  let [info_area, gauge_area] = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(inner);

  let url = app.player.current_url().unwrap_or("");
  let state = if el.is_paused() { "paused" } else { "playing" };
  let info = vec![
    Line::from(Span::styled(truncate_str(url, inner.width as usize), Style::default().fg(theme.fg))),
    Line::from(vec![
      Span::styled(format!("{}  ", state), Style::default().fg(theme.status)),
      Span::styled(format!("{}x", el.playback_rate()), Style::default().fg(theme.muted)),
    ]),
  ];
  frame.render_widget(Paragraph::new(info), info_area);

  let duration = el.duration();
  let ratio = if duration > 0.0 { (el.current_time() / duration).clamp(0.0, 1.0) } else { 0.0 };
  let gauge = Gauge::default()
    .gauge_style(Style::default().fg(theme.accent).bg(theme.stripe_bg))
    .ratio(ratio)
    .label(format!("{} / {}", format_time(el.current_time()), format_time(duration)));
  frame.render_widget(gauge, gauge_area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if let Some(info) = &app.info_message {
    (format!(" ℹ  {}", info), Style::default().fg(theme.muted))
  } else {
    (" Ready".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let border_color = if app.mode == AppMode::Input { theme.accent } else { theme.border };
  let input_block = Block::bordered()
    .title(" Page URL or /set b,f,s ")
    .title_style(Style::default().fg(border_color))
    .border_type(ratatui::widgets::BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.input, app.cursor_position);

  if cursor_col < app.input_scroll {
    app.input_scroll = cursor_col;
  } else if cursor_col >= app.input_scroll + inner_w {
    app.input_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = app
    .input
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.input_scroll)
    .take_while(|(start, _, _)| *start < app.input_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(input_block);
  frame.render_widget(paragraph, area);

  if app.mode == AppMode::Input {
    let cursor_x = area.x + 2 + (cursor_col - app.input_scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Input => {
      let mut k = vec![("Enter", "Open"), ("^p", "Player"), ("^e", "Links"), ("^r", "Re-parse")];
      if app.player.is_open() {
        k.push(("Tab", "Controls"));
      }
      k.push(("^t", "Theme"));
      k
    }
    AppMode::Player => {
      let pause_label = if app.player.element().is_paused() { "Play" } else { "Pause" };
      vec![("Space", pause_label), ("h/l", "Skip"), ("s", "Speed"), ("H", "Hold"), ("x", "Close"), ("Esc", "Input")]
    }
    AppMode::Extractor => vec![("Enter", "Play"), ("j/k", "Navigate"), ("r", "Refresh"), ("Esc", "Back")],
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}
