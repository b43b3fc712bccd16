//! Logging middleware
//!
//! `AuditLog` is the per-command audit trail shared by every session. Each
//! entry becomes one line in an append-only sink, guarded by a mutex so lines
//! from concurrent sessions never interleave, and is mirrored to the `log`
//! facade. Running totals are kept alongside for reporting.

use chrono::Local;
use log::{info, warn};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// One handled command.
#[derive(Debug, Clone)]
pub struct AuditEntry<'a> {
    pub peer: SocketAddr,
    pub command: &'a str,
    pub code: u16,
    pub duration: Duration,
    pub size: u64,
}

/// Direction of a completed transfer, from the server's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditStats {
    pub commands: u64,
    pub transfers: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

pub struct AuditLog {
    sink: Option<Mutex<Box<dyn Write + Send>>>,
    commands: AtomicU64,
    transfers: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl AuditLog {
    fn with_sink(sink: Option<Box<dyn Write + Send>>) -> Self {
        Self {
            sink: sink.map(Mutex::new),
            commands: AtomicU64::new(0),
            transfers: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
        }
    }

    /// Audit entries only go to the `log` facade.
    pub fn disabled() -> Self {
        Self::with_sink(None)
    }

    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self::with_sink(Some(Box::new(writer)))
    }

    /// Opens `path` for appending, creating parent directories as needed.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!("Audit log: {}", path.display());
        Ok(Self::with_writer(file))
    }

    pub fn record(&self, entry: &AuditEntry<'_>) {
        self.commands.fetch_add(1, Ordering::Relaxed);

        let line = format!(
            "[{}] IP={} CMD={} STATUS={} DURATION={}ms SIZE={}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            entry.peer,
            entry.command,
            entry.code,
            entry.duration.as_millis(),
            entry.size
        );
        info!("{}", line);

        // Blocking write: one short line per command, flushed under the lock
        if let Some(sink) = &self.sink {
            let mut sink = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Err(e) = writeln!(sink, "{}", line).and_then(|_| sink.flush()) {
                warn!("Failed to write audit entry: {}", e);
            }
        }
    }

    pub fn record_transfer(&self, direction: Direction, bytes: u64) {
        self.transfers.fetch_add(1, Ordering::Relaxed);
        let counter = match direction {
            Direction::Sent => &self.bytes_sent,
            Direction::Received => &self.bytes_received,
        };
        counter.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn stats(&self) -> AuditStats {
        AuditStats {
            commands: self.commands.load(Ordering::Relaxed),
            transfers: self.transfers.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("file_sink", &self.sink.is_some())
            .field("stats", &self.stats())
            .finish()
    }
}
