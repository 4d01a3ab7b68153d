//! File-backed audit log: one JSON-lines file per log kind.
//!
//! Layout: `<dir>/application.log`, `<dir>/errors.log`,
//! `<dir>/uncertainty-halts.log`. Each record is a single line written with
//! one `write_all` while holding the writer lock, so lines never interleave.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{LedgerError, StorageError};
use crate::storage_traits::{line_matches, AuditLog, AuditRecord, LogKind, StorageResult};

/// Append-only JSON-lines audit log rooted at a directory.
#[derive(Debug)]
pub struct JsonlAuditLog {
    dir: PathBuf,
    writer: Mutex<()>,
}

impl JsonlAuditLog {
    /// Open (and create if needed) a log directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "JsonlAuditLog opened");
        Ok(Self {
            dir,
            writer: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `kind`.
    pub fn path_for(&self, kind: LogKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }
}

#[async_trait]
impl AuditLog for JsonlAuditLog {
    async fn append(&self, record: &AuditRecord, kind: LogKind) -> StorageResult<()> {
        let mut line = record.to_line()?;
        line.push('\n');
        let path = self.path_for(kind);

        let _guard = self.writer.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StorageError::io(&path, e))?;
        file.flush().await.map_err(|e| StorageError::io(&path, e))?;
        Ok(())
    }

    async fn query(&self, needle: Option<&str>, kind: LogKind) -> StorageResult<Vec<AuditRecord>> {
        let path = self.path_for(kind);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&path, e)),
        };

        let mut records = Vec::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            if !line_matches(line, needle) {
                continue;
            }
            match serde_json::from_str::<AuditRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping malformed audit line"),
            }
        }
        Ok(records)
    }
}
