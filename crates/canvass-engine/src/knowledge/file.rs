use super::KnowledgeBase;
use super::store::{Admission, AppendOutcome, KnowledgeStore, StoreError, admit};
use crate::intervention::InterventionRecord;
use crate::jsonl;
use async_trait::async_trait;
use canvass_common::knowledge::KnowledgeSuggestion;
use fd_lock::RwLock;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const KNOWLEDGE_FILE: &str = "knowledge.json";
const INTERVENTIONS_FILE: &str = "interventions.jsonl";
const LOCK_FILE: &str = "store.lock";

/// File-backed knowledge store.
///
/// `knowledge.json` is replaced atomically (temp file + rename) on every merge;
/// `interventions.jsonl` is only ever appended to. Every write holds an
/// exclusive advisory lock on `store.lock`, so separate handles and separate
/// processes on one directory take turns, and each merge re-reads the file
/// under the lock.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn knowledge_path(&self) -> PathBuf {
        self.dir.join(KNOWLEDGE_FILE)
    }

    pub fn interventions_path(&self) -> PathBuf {
        self.dir.join(INTERVENTIONS_FILE)
    }

    /// Run `op` on the blocking pool while holding the store's write lock.
    async fn exclusive<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StoreError> + Send + 'static,
    {
        let dir = self.dir.clone();
        let task = tokio::task::spawn_blocking(move || {
            fs::create_dir_all(&dir).map_err(|source| io_error(&dir, source))?;
            let lock_path = dir.join(LOCK_FILE);
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)
                .map_err(|source| io_error(&lock_path, source))?;
            let mut lock = RwLock::new(file);
            let _guard = lock
                .write()
                .map_err(|source| io_error(&lock_path, source))?;
            op(&dir)
        });
        task.await
            .map_err(|e| io_error(&self.dir, std::io::Error::other(e)))?
    }
}

fn parse_knowledge(path: PathBuf, content: &str) -> Result<KnowledgeBase, StoreError> {
    if content.trim().is_empty() {
        return Ok(KnowledgeBase::default());
    }
    serde_json::from_str(content).map_err(|e| StoreError::Corrupt {
        path,
        message: e.to_string(),
    })
}

fn read_knowledge(dir: &Path) -> Result<KnowledgeBase, StoreError> {
    let path = dir.join(KNOWLEDGE_FILE);
    match fs::read_to_string(&path) {
        Ok(content) => parse_knowledge(path, &content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(KnowledgeBase::default()),
        Err(source) => Err(io_error(&path, source)),
    }
}

fn write_knowledge(dir: &Path, knowledge: &KnowledgeBase) -> Result<(), StoreError> {
    let path = dir.join(KNOWLEDGE_FILE);
    let tmp = dir.join(format!("{}.{}.tmp", KNOWLEDGE_FILE, Uuid::new_v4().simple()));
    let json = serde_json::to_vec_pretty(knowledge)?;

    let mut file = File::create(&tmp).map_err(|source| io_error(&tmp, source))?;
    file.write_all(&json)
        .map_err(|source| io_error(&tmp, source))?;
    file.sync_all().map_err(|source| io_error(&tmp, source))?;
    drop(file);

    if let Err(source) = fs::rename(&tmp, &path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_error(&path, source));
    }
    Ok(())
}

fn read_records(path: &Path) -> Result<Vec<InterventionRecord>, StoreError> {
    match fs::read_to_string(path) {
        Ok(content) => parse_records(path, &content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(io_error(path, source)),
    }
}

fn append_record(path: &Path, record: &InterventionRecord) -> Result<(), StoreError> {
    let mut line = serde_json::to_string(record)?;
    line.push('\n');

    let dropped = jsonl::repair_tail(path).map_err(|source| io_error(path, source))?;
    if dropped > 0 {
        tracing::warn!(path = %path.display(), dropped, "Truncated torn intervention record");
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| io_error(path, source))?;
    file.write_all(line.as_bytes())
        .map_err(|source| io_error(path, source))?;
    file.sync_data().map_err(|source| io_error(path, source))
}

#[async_trait]
impl KnowledgeStore for FileStore {
    async fn load(&self) -> Result<KnowledgeBase, StoreError> {
        let path = self.knowledge_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => parse_knowledge(path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(KnowledgeBase::default()),
            Err(source) => Err(io_error(&path, source)),
        }
    }

    async fn merge(
        &self,
        suggestions: &[KnowledgeSuggestion],
    ) -> Result<KnowledgeBase, StoreError> {
        let suggestions = suggestions.to_vec();
        self.exclusive(move |dir| {
            let mut knowledge = read_knowledge(dir)?;
            let changed = knowledge.merge(&suggestions);
            if changed > 0 {
                write_knowledge(dir, &knowledge)?;
                tracing::debug!(changed, version = knowledge.version, "Knowledge merged");
            }
            Ok(knowledge)
        })
        .await
    }

    async fn append_intervention(
        &self,
        record: &InterventionRecord,
    ) -> Result<AppendOutcome, StoreError> {
        let record = record.clone();
        self.exclusive(move |dir| {
            let path = dir.join(INTERVENTIONS_FILE);
            let existing = read_records(&path)?;
            match admit(&existing, &record) {
                Admission::Duplicate(id) => Ok(AppendOutcome::AlreadyStored { id }),
                Admission::Append(record) => {
                    append_record(&path, &record)?;
                    Ok(AppendOutcome::Appended { id: record.id })
                }
            }
        })
        .await
    }

    async fn interventions(&self) -> Result<Vec<InterventionRecord>, StoreError> {
        let path = self.interventions_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => parse_records(&path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(io_error(&path, source)),
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Parse a JSONL log. A malformed final line is a torn write and is skipped;
/// a malformed line anywhere else is corruption.
fn parse_records(path: &Path, content: &str) -> Result<Vec<InterventionRecord>, StoreError> {
    let lines: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .collect();
    let mut records = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        match serde_json::from_str::<InterventionRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) if i + 1 == lines.len() && !content.ends_with('\n') => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping torn final record");
            }
            Err(e) => {
                return Err(StoreError::Corrupt {
                    path: path.to_path_buf(),
                    message: format!("line {}: {}", i + 1, e),
                });
            }
        }
    }
    Ok(records)
}
