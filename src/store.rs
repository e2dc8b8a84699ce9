//! Durable string-keyed, string-valued store shared by playback memory and settings.

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

pub trait Store: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>>;
  fn set(&self, key: &str, value: &str) -> Result<()>;
  fn remove(&self, key: &str) -> Result<()>;
}

/// JSON-file backed store. The whole map is rewritten on every mutation; entries are few
/// and writes only happen on player close, unload and settings changes.
pub struct FileStore {
  path: PathBuf,
  entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
  /// Open (or lazily create) the store in the platform data directory.
  pub fn open_default() -> Result<Self> {
    let proj_dirs = ProjectDirs::from("", "", "vidfloat").context("No home directory for the data store")?;
    Self::open(proj_dirs.data_dir().join("store.json"))
  }

  pub fn open(path: PathBuf) -> Result<Self> {
    let entries = match std::fs::read_to_string(&path) {
      Ok(content) => serde_json::from_str(&content).with_context(|| format!("Corrupt store file {}", path.display()))?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
      Err(e) => return Err(anyhow!(e).context(format!("Failed to read store file {}", path.display()))),
    };
    Ok(Self { path, entries: Mutex::new(entries) })
  }

  fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
    if let Some(dir) = self.path.parent() {
      std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = serde_json::to_string_pretty(entries).context("Failed to serialize store")?;
    std::fs::write(&self.path, content).with_context(|| format!("Failed to write {}", self.path.display()))
  }
}

impl Store for FileStore {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let entries = self.entries.lock().map_err(|_| anyhow!("store lock poisoned"))?;
    Ok(entries.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let mut entries = self.entries.lock().map_err(|_| anyhow!("store lock poisoned"))?;
    entries.insert(key.to_string(), value.to_string());
    self.persist(&entries)
  }

  fn remove(&self, key: &str) -> Result<()> {
    let mut entries = self.entries.lock().map_err(|_| anyhow!("store lock poisoned"))?;
    if entries.remove(key).is_some() {
      self.persist(&entries)?;
    }
    Ok(())
  }
}

/// In-process store, used when the data directory is unavailable and in tests.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<BTreeMap<String, String>>,
}

impl Store for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<String>> {
    Ok(self.entries.lock().map_err(|_| anyhow!("store lock poisoned"))?.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    self.entries.lock().map_err(|_| anyhow!("store lock poisoned"))?.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    self.entries.lock().map_err(|_| anyhow!("store lock poisoned"))?.remove(key);
    Ok(())
  }
}
