//! Session log pipeline.
//!
//! ```text
//! log::info!() / log_parsed!()
//!     |
//! [LogCollector]  (log::Log impl, never blocks the caller)
//!     | crossbeam unbounded channel
//!     v
//! [persister thread]
//!     |-> <log_dir>/full/<ts>_session.log    every record
//!     '-> <log_dir>/parsed/<ts>_session.log  target "parsed" only
//! ```
//!
//! The persister is a plain OS thread, so records logged from any runtime or
//! thread reach disk. [`LogCollector::wait_for_empty`] pushes a flush marker
//! through the same channel and resolves once everything before it is written.

use chrono::Local;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;

/// Target used by `log_parsed!` for high-level milestones.
pub const PARSED_TARGET: &str = "parsed";

/// Per-user log directory, `<data_dir>/strix-install/logs`, falling back to `./logs`.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(crate::state_store::APP_CONFIG_DIR).join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// A formatted record on its way to disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: String,
    pub level: log::Level,
    pub message: String,
    pub parsed: bool,
}

impl LogLine {
    pub fn new(level: log::Level, message: impl Into<String>) -> Self {
        LogLine {
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
            level,
            message: message.into(),
            parsed: false,
        }
    }

    pub fn parsed(level: log::Level, message: impl Into<String>) -> Self {
        LogLine {
            parsed: true,
            ..LogLine::new(level, message)
        }
    }

    /// `[HH:MM:SS.mmm] [LEVEL] message`
    pub fn format(&self) -> String {
        format!("[{}] [{}] {}\n", self.timestamp, self.level, self.message)
    }
}

enum LogMessage {
    Line(LogLine),
    Flush(oneshot::Sender<()>),
}

/// Global logger backed by a background persister thread.
#[derive(Clone)]
pub struct LogCollector {
    tx: Sender<LogMessage>,
    level: LevelFilter,
    full_path: PathBuf,
    parsed_path: PathBuf,
}

impl LogCollector {
    /// Create the log directories and session files, then start the persister.
    pub fn new(log_dir: impl AsRef<Path>, level: LevelFilter) -> io::Result<Self> {
        let log_dir = log_dir.as_ref();
        let full_dir = log_dir.join("full");
        let parsed_dir = log_dir.join("parsed");
        std::fs::create_dir_all(&full_dir)?;
        std::fs::create_dir_all(&parsed_dir)?;

        let session = format!("{}_session.log", Local::now().format("%Y%m%d_%H%M%S"));
        let full_path = full_dir.join(&session);
        let parsed_path = parsed_dir.join(&session);
        let full = open_append(&full_path)?;
        let parsed = open_append(&parsed_path)?;

        let (tx, rx) = unbounded::<LogMessage>();
        std::thread::Builder::new()
            .name("log-persister".to_string())
            .spawn(move || persist(rx, full, parsed))?;

        Ok(LogCollector {
            tx,
            level,
            full_path,
            parsed_path,
        })
    }

    /// Install as the `log` crate's global logger.
    pub fn install(self) -> Result<Self, log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self.clone()))?;
        log::set_max_level(level);
        Ok(self)
    }

    pub fn session_log_path(&self) -> &Path {
        &self.full_path
    }

    pub fn parsed_log_path(&self) -> &Path {
        &self.parsed_path
    }

    /// Queue a line. Never blocks; a stopped persister drops it.
    pub fn send(&self, line: LogLine) {
        let _ = self.tx.send(LogMessage::Line(line));
    }

    /// Resolve once every line queued before this call has been written.
    pub async fn wait_for_empty(&self) -> io::Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(LogMessage::Flush(done_tx))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "log persister stopped"))?;
        done_rx
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "log persister stopped before flushing"))
    }
}

impl Log for LogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = record.args().to_string();
        if record.target() == PARSED_TARGET {
            self.send(LogLine::parsed(record.level(), message));
        } else {
            self.send(LogLine::new(record.level(), message));
        }
    }

    fn flush(&self) {}
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Persister loop: runs until every sender is gone.
fn persist(rx: Receiver<LogMessage>, mut full: File, mut parsed: File) {
    while let Ok(msg) = rx.recv() {
        match msg {
            LogMessage::Line(line) => {
                let formatted = line.format();
                if let Err(e) = full.write_all(formatted.as_bytes()) {
                    eprintln!("[Log] write failed: {}", e);
                }
                if line.parsed {
                    let _ = parsed.write_all(formatted.as_bytes());
                }
            }
            LogMessage::Flush(done) => {
                let _ = full.flush();
                let _ = parsed.flush();
                let _ = full.sync_data();
                let _ = parsed.sync_data();
                let _ = done.send(());
            }
        }
    }
}
