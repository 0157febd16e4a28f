//! Append-only per-question outcome log.

pub mod summary;

pub use summary::{FamilyStats, LedgerSummary};

use crate::jsonl;
use async_trait::async_trait;
use canvass_common::ledger::LedgerEntry;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Corrupt ledger {path} at line {line}: {message}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// Receiver of terminal question outcomes, in encounter order.
#[async_trait]
pub trait LedgerSink: Send {
    async fn append(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError>;
}

/// In-memory ledger. Clones share entries, so a test can keep one and hand the other to a session.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    entries: Arc<Mutex<Vec<LedgerEntry>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl LedgerSink for MemoryLedger {
    async fn append(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        Ok(())
    }
}

/// JSON-lines ledger file. Each entry is written as one line and synced before
/// `append` returns, so a crash can at most tear the line being written.
/// Opening cuts such a torn line off before anything new is appended.
pub struct JsonlLedger {
    path: PathBuf,
    file: File,
}

impl JsonlLedger {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }
        let repair = path.clone();
        let dropped = tokio::task::spawn_blocking(move || jsonl::repair_tail(&repair))
            .await
            .map_err(|e| io_error(&path, std::io::Error::other(e)))?
            .map_err(|source| io_error(&path, source))?;
        if dropped > 0 {
            tracing::warn!(path = %path.display(), dropped, "Truncated torn ledger entry");
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| io_error(&path, source))?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LedgerSink for JsonlLedger {
    async fn append(&mut self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .await
            .map_err(|source| io_error(&self.path, source))?;
        self.file
            .flush()
            .await
            .map_err(|source| io_error(&self.path, source))?;
        self.file
            .sync_data()
            .await
            .map_err(|source| io_error(&self.path, source))
    }
}

/// Read every entry of a JSONL ledger. A torn final line is skipped.
pub async fn read_entries(path: impl AsRef<Path>) -> Result<Vec<LedgerEntry>, LedgerError> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(io_error(path, source)),
    };
    parse_entries(path, &content)
}

fn parse_entries(path: &Path, content: &str) -> Result<Vec<LedgerEntry>, LedgerError> {
    let torn_tail = !content.is_empty() && !content.ends_with('\n');
    let lines: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();
    let mut entries = Vec::with_capacity(lines.len());
    for (pos, (index, line)) in lines.iter().enumerate() {
        match serde_json::from_str::<LedgerEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) if torn_tail && pos + 1 == lines.len() => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping torn final ledger line");
            }
            Err(e) => {
                return Err(LedgerError::Corrupt {
                    path: path.to_path_buf(),
                    line: index + 1,
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(entries)
}

fn io_error(path: &Path, source: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.to_path_buf(),
        source,
    }
}
