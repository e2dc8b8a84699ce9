mod app;
mod config;
mod constants;
mod discovery;
mod dom;
mod drag;
mod events;
mod input;
mod media;
mod memory;
mod page;
mod pipeline;
mod player;
mod ranker;
mod resolver;
mod scanner;
mod settings;
mod store;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use ratatui::{
  DefaultTerminal,
  crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
  },
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app::{App, AppMode};
use config::Config;
use page::PageSource;
use store::{FileStore, MemoryStore, Store};

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Page URL or local HTML file to scan for video
  source: Option<String>,
  /// Open the media link list right away
  #[arg(short, long)]
  extract: bool,
  /// Audio only: don't open an mpv video window
  #[arg(long)]
  no_video: bool,
}

// --- Logging ---

/// File logging in the data dir; the terminal belongs to the UI. Filter with `VIDFLOAT_LOG`.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
  let dirs = ProjectDirs::from("", "", "vidfloat")?;
  let log_dir = dirs.data_dir().join("logs");
  std::fs::create_dir_all(&log_dir).ok()?;
  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, "vidfloat.log"));
  tracing_subscriber::registry()
    .with(tracing_subscriber::EnvFilter::try_from_env("VIDFLOAT_LOG").unwrap_or_else(|_| "info".into()))
    .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
    .init();
  Some(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _log_guard = init_logging();
  info!(version = env!("CARGO_PKG_VERSION"), "vidfloat: starting");

  let store: Arc<dyn Store> = match FileStore::open_default() {
    Ok(store) => Arc::new(store),
    Err(e) => {
      warn!(err = %e, "vidfloat: store unavailable, playback positions won't persist");
      Arc::new(MemoryStore::default())
    }
  };
  let mut app = App::new(Config::load(), store, args.no_video)?;
  if let Some(ref arg) = args.source {
    let source = PageSource::parse(arg)?;
    app.input = source.label();
    app.cursor_position = app.input.chars().count();
    app.open_source(source);
    if args.extract {
      app.toggle_extractor();
    }
  }

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  execute!(std::io::stdout(), EnableMouseCapture).context("Failed to enable mouse capture")?;
  let result = run(&mut terminal, &mut app).await;
  let _ = execute!(std::io::stdout(), DisableMouseCapture);
  ratatui::restore();

  if let Err(e) = app.shutdown().await {
    error!(err = %e, "vidfloat: shutdown failed");
  }
  result
}

async fn run(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
  let size = terminal.size()?;
  app.set_terminal_size(size.width, size.height);

  loop {
    app.check_pending().await?;

    terminal.draw(|frame| ui::ui(frame, app))?;

    if event::poll(Duration::from_millis(50))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(app, key)?;
        }
        Event::Mouse(mouse) => input::handle_mouse_event(app, mouse),
        Event::Resize(cols, rows) => app.set_terminal_size(cols, rows),
        Event::FocusLost => app.mouse_cancel(),
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
    if app.mode == AppMode::Player && !app.player.is_open() {
      app.mode = AppMode::Input;
    }
  }
  Ok(())
}
