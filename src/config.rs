use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub theme_name: Option<String>,
  pub user_agent: Option<String>,
  pub probe_timeout_secs: Option<u64>,
  /// Minimum length of an auto-selected URL.
  pub min_link_length: Option<usize>,
  /// Break length ties by first appearance instead of keeping the longest.
  pub prefer_first_seen: Option<bool>,
  /// Pattern-match links in markup and scripts, not just media elements.
  pub heuristic_scan: Option<bool>,
  pub no_video: Option<bool>,
}

impl Config {
  pub fn load() -> Self {
    if let Some(path) = Self::path() {
      return Self::load_from(&path);
    }
    Self::default()
  }

  pub fn load_from(path: &std::path::Path) -> Self {
    if let Ok(content) = std::fs::read_to_string(path)
      && let Ok(config) = toml::from_str(&content)
    {
      return config;
    }
    Self::default()
  }

  pub fn save(&self) {
    if let Some(path) = Self::path() {
      self.save_to(&path);
    }
  }

  pub fn save_to(&self, path: &std::path::Path) {
    if let Some(dir) = path.parent()
      && std::fs::create_dir_all(dir).is_ok()
      && let Ok(content) = toml::to_string(self)
    {
      let _ = std::fs::write(path, content);
    }
  }

  fn path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "vidfloat").map(|dirs| dirs.config_dir().join("prefs.toml"))
  }
}
