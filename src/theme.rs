use ratatui::style::Color;

pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
  /// Overlay panel fill.
  pub overlay_bg: Color,
}

pub static THEMES: [Theme; 3] = [
  Theme {
    name: "Night",
    bg: Color::Rgb(24, 25, 33),
    fg: Color::Rgb(215, 218, 230),
    accent: Color::Rgb(122, 162, 247),
    muted: Color::Rgb(110, 115, 140),
    border: Color::Rgb(60, 64, 84),
    highlight_fg: Color::Rgb(24, 25, 33),
    highlight_bg: Color::Rgb(122, 162, 247),
    stripe_bg: Color::Rgb(30, 31, 41),
    status: Color::Rgb(158, 206, 106),
    error: Color::Rgb(247, 118, 142),
    key_fg: Color::Rgb(24, 25, 33),
    key_bg: Color::Rgb(110, 115, 140),
    overlay_bg: Color::Rgb(12, 12, 16),
  },
  Theme {
    name: "Dusk",
    bg: Color::Rgb(40, 30, 40),
    fg: Color::Rgb(240, 220, 225),
    accent: Color::Rgb(245, 160, 120),
    muted: Color::Rgb(150, 120, 135),
    border: Color::Rgb(90, 65, 85),
    highlight_fg: Color::Rgb(40, 30, 40),
    highlight_bg: Color::Rgb(245, 160, 120),
    stripe_bg: Color::Rgb(48, 36, 48),
    status: Color::Rgb(230, 200, 110),
    error: Color::Rgb(255, 110, 110),
    key_fg: Color::Rgb(40, 30, 40),
    key_bg: Color::Rgb(150, 120, 135),
    overlay_bg: Color::Rgb(20, 14, 20),
  },
  Theme {
    name: "Paper",
    bg: Color::Rgb(246, 243, 236),
    fg: Color::Rgb(50, 48, 44),
    accent: Color::Rgb(40, 110, 170),
    muted: Color::Rgb(140, 134, 124),
    border: Color::Rgb(200, 194, 182),
    highlight_fg: Color::Rgb(246, 243, 236),
    highlight_bg: Color::Rgb(40, 110, 170),
    stripe_bg: Color::Rgb(238, 234, 225),
    status: Color::Rgb(60, 130, 70),
    error: Color::Rgb(190, 50, 50),
    key_fg: Color::Rgb(246, 243, 236),
    key_bg: Color::Rgb(140, 134, 124),
    overlay_bg: Color::Rgb(30, 30, 30),
  },
];
