//! Media element backed by an mpv process driven over its JSON IPC socket.
//!
//! mpv is started lazily on the first `set_source` in idle mode and then reused for every
//! source. Commands are queued on an unbounded channel so the synchronous element API never
//! blocks; a background task owns the socket, forwards commands and turns mpv's event lines
//! into [`MediaEvent`]s that `poll_events` drains. If mpv exits (its window was closed, say)
//! the next `play` fails and the next `set_source` starts a fresh process.

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::{
  io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
  net::UnixStream,
  process::{Child, Command},
  sync::mpsc,
  task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use super::element::{DecoderSignal, MediaElement, MediaEvent, StreamDecoder};

const OBSERVED: [&str; 3] = ["time-pos", "duration", "pause"];
const CONNECT_ATTEMPTS: u32 = 50;

/// Tracks what the next events mean for the current source.
#[derive(Debug, Default)]
pub struct EventMapper {
  awaiting_duration: bool,
}

/// Map one line of mpv IPC output to a media event.
pub fn parse_event(line: &str, mapper: &mut EventMapper) -> Option<MediaEvent> {
  let val: Value = serde_json::from_str(line).ok()?;
  match val.get("event")?.as_str()? {
    "file-loaded" => {
      mapper.awaiting_duration = true;
      Some(MediaEvent::FileLoaded)
    }
    "property-change" => {
      let data = val.get("data")?;
      match val.get("name")?.as_str()? {
        "time-pos" => data.as_f64().map(|position| MediaEvent::TimeUpdate { position }),
        "duration" => {
          let duration = data.as_f64()?;
          if !mapper.awaiting_duration {
            return None;
          }
          mapper.awaiting_duration = false;
          Some(MediaEvent::MetadataLoaded { duration })
        }
        "pause" => data.as_bool().map(|paused| if paused { MediaEvent::Paused } else { MediaEvent::Playing }),
        _ => None,
      }
    }
    "end-file" => match val.get("reason").and_then(Value::as_str) {
      Some("eof") => Some(MediaEvent::Ended),
      Some("error") => {
        let msg = val.get("file_error").and_then(Value::as_str).unwrap_or("playback failed");
        Some(MediaEvent::Error(msg.to_string()))
      }
      _ => None,
    },
    _ => None,
  }
}

pub struct MpvElement {
  program: PathBuf,
  no_video: bool,
  child: Option<Child>,
  commands: Option<mpsc::UnboundedSender<Value>>,
  events: Option<mpsc::UnboundedReceiver<MediaEvent>>,
  ipc_task: Option<JoinHandle<()>>,
  socket_path: Option<PathBuf>,
  time: f64,
  duration: f64,
  paused: bool,
  rate: f64,
}

impl MpvElement {
  pub fn new(no_video: bool) -> Self {
    Self {
      program: PathBuf::from("mpv"),
      no_video,
      child: None,
      commands: None,
      events: None,
      ipc_task: None,
      socket_path: None,
      time: 0.0,
      duration: 0.0,
      paused: true,
      rate: 1.0,
    }
  }

  /// Run `program` instead of the `mpv` found on `PATH`.
  pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
    self.program = program.into();
    self
  }

  pub fn is_running(&self) -> bool {
    self.child.is_some() && self.commands.as_ref().is_some_and(|tx| !tx.is_closed())
  }

  /// Whether the process, or the IPC task talking to it, has gone away.
  fn has_exited(&mut self) -> bool {
    let Some(child) = &mut self.child else { return true };
    if matches!(child.try_wait(), Ok(Some(_))) {
      return true;
    }
    !self.is_running()
  }

  /// Forget a dead process. Queued events, including the error that reported it, stay readable.
  fn reap(&mut self) {
    warn!("mpv: process gone, relaunching on next source");
    if let Some(handle) = self.ipc_task.take() {
      handle.abort();
    }
    self.child = None;
    self.commands = None;
    self.paused = true;
  }

  fn launch(&mut self) -> Result<()> {
    let socket_path = std::env::temp_dir().join(format!("vidfloat-mpv-{}.sock", std::process::id()));
    // Stale socket from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    let mut cmd = Command::new(&self.program);
    cmd.args(["--idle=yes", "--pause", "--title=vidfloat", "--really-quiet"]);
    cmd.arg(format!("--input-ipc-server={}", socket_path.display()));
    if self.no_video {
      cmd.arg("--no-video");
    } else {
      cmd.arg("--force-window=yes");
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    cmd.kill_on_drop(true);

    let child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
      } else {
        anyhow!(e).context("Failed to spawn mpv process")
      }
    })?;
    info!(socket = %socket_path.display(), "mpv: started");

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (ev_tx, ev_rx) = mpsc::unbounded_channel();
    let path = socket_path.clone();
    let ipc_task = tokio::spawn(async move {
      let err_tx = ev_tx.clone();
      if let Err(e) = run_ipc(&path, cmd_rx, ev_tx).await {
        error!(err = %e, "mpv: ipc connection lost");
        let _ = err_tx.send(MediaEvent::Error(format!("{:#}", e)));
      }
    });

    self.child = Some(child);
    self.commands = Some(cmd_tx);
    self.events = Some(ev_rx);
    self.ipc_task = Some(ipc_task);
    self.socket_path = Some(socket_path);
    Ok(())
  }

  fn send(&self, command: Value) {
    let Some(tx) = &self.commands else {
      debug!("mpv: not running, dropping command");
      return;
    };
    if tx.send(command).is_err() {
      warn!("mpv: ipc task gone, dropping command");
    }
  }

  pub async fn shutdown(&mut self) -> Result<()> {
    if let Some(handle) = self.ipc_task.take() {
      handle.abort();
      let _ = handle.await;
    }
    self.commands = None;
    self.events = None;
    if let Some(mut child) = self.child.take() {
      child.kill().await.context("Failed to kill mpv process")?;
      let _ = child.wait().await;
    }
    if let Some(path) = self.socket_path.take() {
      let _ = std::fs::remove_file(&path);
    }
    Ok(())
  }
}

impl Drop for MpvElement {
  fn drop(&mut self) {
    if let Some(handle) = self.ipc_task.take() {
      handle.abort();
    }
    if let Some(path) = self.socket_path.take() {
      let _ = std::fs::remove_file(&path);
    }
  }
}

impl MediaElement for MpvElement {
  fn set_source(&mut self, url: &str) -> Result<()> {
    if self.child.is_some() && self.has_exited() {
      self.reap();
    }
    if self.child.is_none() {
      self.launch()?;
    }
    self.time = 0.0;
    self.duration = 0.0;
    self.send(json!({ "command": ["loadfile", url, "replace"] }));
    Ok(())
  }

  fn play(&mut self) -> Result<()> {
    if self.has_exited() {
      if self.child.is_some() {
        self.reap();
      }
      return Err(anyhow!("mpv is not running"));
    }
    self.send(json!({ "command": ["set_property", "pause", false] }));
    self.paused = false;
    Ok(())
  }

  fn pause(&mut self) {
    self.send(json!({ "command": ["set_property", "pause", true] }));
    self.paused = true;
  }

  fn seek(&mut self, position: f64) {
    self.send(json!({ "command": ["seek", position, "absolute"] }));
    self.time = position;
  }

  fn current_time(&self) -> f64 {
    self.time
  }

  fn duration(&self) -> f64 {
    self.duration
  }

  fn is_paused(&self) -> bool {
    self.paused
  }

  fn playback_rate(&self) -> f64 {
    self.rate
  }

  fn set_playback_rate(&mut self, rate: f64) {
    self.send(json!({ "command": ["set_property", "speed", rate] }));
    self.rate = rate;
  }

  fn poll_events(&mut self) -> Vec<MediaEvent> {
    let mut out = Vec::new();
    let Some(rx) = &mut self.events else {
      return out;
    };
    while let Ok(event) = rx.try_recv() {
      match &event {
        MediaEvent::TimeUpdate { position } => self.time = *position,
        MediaEvent::MetadataLoaded { duration } => self.duration = *duration,
        MediaEvent::Playing => self.paused = false,
        MediaEvent::Paused => self.paused = true,
        _ => {}
      }
      out.push(event);
    }
    out
  }
}

async fn connect(socket: &Path) -> Result<UnixStream> {
  let mut last_err = None;
  for _ in 0..CONNECT_ATTEMPTS {
    match UnixStream::connect(socket).await {
      Ok(stream) => return Ok(stream),
      Err(e) => last_err = Some(e),
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
  }
  Err(anyhow!("{:?}", last_err)).context("Failed to connect to mpv IPC socket")
}

async fn run_ipc(
  socket: &Path,
  mut commands: mpsc::UnboundedReceiver<Value>,
  events: mpsc::UnboundedSender<MediaEvent>,
) -> Result<()> {
  let stream = connect(socket).await?;
  let (read, mut write) = stream.into_split();
  let mut lines = BufReader::new(read).lines();

  for (id, name) in OBSERVED.iter().enumerate() {
    let observe = json!({ "command": ["observe_property", id + 1, name] });
    write.write_all(format!("{observe}\n").as_bytes()).await.context("Failed to observe mpv property")?;
  }

  let mut mapper = EventMapper::default();
  loop {
    tokio::select! {
      cmd = commands.recv() => {
        let Some(cmd) = cmd else { break };
        write.write_all(format!("{cmd}\n").as_bytes()).await.context("Failed to send command to mpv")?;
      }
      line = lines.next_line() => {
        let Some(line) = line.context("Failed to read from mpv IPC socket")? else {
          return Err(anyhow!("mpv exited"));
        };
        if let Some(event) = parse_event(&line, &mut mapper)
          && events.send(event).is_err()
        {
          break;
        }
      }
    }
  }
  Ok(())
}

/// mpv plays HLS and DASH manifests natively; the decoder only reports readiness.
#[derive(Debug, Default)]
pub struct MpvStreamDecoder {
  attached: Option<String>,
}

impl StreamDecoder for MpvStreamDecoder {
  fn attach(&mut self, manifest_url: &str, element: &mut dyn MediaElement) -> Result<()> {
    element.set_source(manifest_url).context("Failed to load manifest")?;
    debug!(url = %manifest_url, "mpv: decoder attached");
    self.attached = Some(manifest_url.to_string());
    Ok(())
  }

  fn detach(&mut self) {
    self.attached = None;
  }

  fn is_attached(&self) -> bool {
    self.attached.is_some()
  }

  fn signal(&mut self, event: &MediaEvent) -> Option<DecoderSignal> {
    match event {
      MediaEvent::FileLoaded => Some(DecoderSignal::Ready),
      MediaEvent::Error(msg) => Some(DecoderSignal::Fatal(msg.clone())),
      _ => None,
    }
  }
}
