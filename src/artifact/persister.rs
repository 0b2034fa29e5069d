//! Thread-scoped artifact persistence
//!
//! Every write lands under `storage_root/thread_id/`. Declared paths are
//! treated as thread-relative (a leading `/` is dropped) and any `..`
//! component is refused outright, so a block can never write outside its
//! thread directory.
//!
//! Writes go through an [`ArtifactSink`]: [`FsSink`] touches the real
//! filesystem, `MemorySink` records writes in memory for tests.

use super::parser::ArtifactBlockParser;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::Mutex;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Invalid thread id: {0:?}")]
    InvalidThreadId(String),
    #[error("Path escapes the thread directory: {0}")]
    PathTraversal(String),
    #[error("Path resolves to nothing: {0:?}")]
    EmptyPath(String),
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Isolation boundary for one conversation thread's artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadContext {
    thread_id: String,
    storage_root: PathBuf,
}

impl ThreadContext {
    /// Thread ids come from clients, so they are held to a strict charset.
    pub fn new(
        thread_id: impl Into<String>,
        storage_root: impl Into<PathBuf>,
    ) -> Result<Self, PersistError> {
        let thread_id = thread_id.into();
        let valid = !thread_id.is_empty()
            && thread_id != "."
            && thread_id != ".."
            && thread_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(PersistError::InvalidThreadId(thread_id));
        }
        Ok(Self {
            thread_id,
            storage_root: storage_root.into(),
        })
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn thread_dir(&self) -> PathBuf {
        self.storage_root.join(&self.thread_id)
    }

    /// Resolve an artifact path to its location inside the thread directory.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PersistError> {
        let mut relative = PathBuf::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
                Component::ParentDir => return Err(PersistError::PathTraversal(path.to_string())),
            }
        }
        if relative.as_os_str().is_empty() {
            return Err(PersistError::EmptyPath(path.to_string()));
        }
        Ok(self.thread_dir().join(relative))
    }
}

/// Destination for artifact writes
pub trait ArtifactSink: Send + Sync {
    /// Write `content` at `location`, replacing anything already there.
    fn write(&self, location: &Path, content: &str) -> io::Result<()>;
}

/// Writes artifacts to the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSink;

impl ArtifactSink for FsSink {
    fn write(&self, location: &Path, content: &str) -> io::Result<()> {
        if let Some(parent) = location.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(location, content)
    }
}

/// In-memory sink for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<HashMap<PathBuf, String>>,
    writes: Mutex<Vec<PathBuf>>,
}

#[cfg(test)]
impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: &Path) -> Option<String> {
        self.files.lock().unwrap().get(location).cloned()
    }

    /// Every write in order, including overwrites
    pub fn writes(&self) -> Vec<PathBuf> {
        self.writes.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ArtifactSink for MemorySink {
    fn write(&self, location: &Path, content: &str) -> io::Result<()> {
        self.writes.lock().unwrap().push(location.to_path_buf());
        self.files
            .lock()
            .unwrap()
            .insert(location.to_path_buf(), content.to_string());
        Ok(())
    }
}

/// Outcome of persisting every block found in one chunk of text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistReport {
    /// Artifact paths written, in text order
    pub written: Vec<String>,
    /// Artifact paths that could not be written
    pub failed: Vec<String>,
}

impl PersistReport {
    pub fn is_empty(&self) -> bool {
        self.written.is_empty() && self.failed.is_empty()
    }
}

/// Persists artifacts found in responses. Never fails outward: errors are
/// logged and the caller carries on with the unchanged text.
#[derive(Clone)]
pub struct ArtifactPersister {
    sink: Arc<dyn ArtifactSink>,
}

impl ArtifactPersister {
    pub fn new(sink: Arc<dyn ArtifactSink>) -> Self {
        Self { sink }
    }

    pub fn filesystem() -> Self {
        Self::new(Arc::new(FsSink))
    }

    /// Resolve and write one artifact, returning where it landed.
    pub fn try_persist(
        &self,
        thread: &ThreadContext,
        path: &str,
        declared_type: &str,
        content: &str,
    ) -> Result<PathBuf, PersistError> {
        let location = thread.resolve(path)?;
        self.sink
            .write(&location, content)
            .map_err(|source| PersistError::Io {
                path: location.clone(),
                source,
            })?;
        tracing::info!(
            thread_id = %thread.thread_id(),
            path = %path,
            declared_type = %declared_type,
            bytes = content.len(),
            location = %location.display(),
            "Artifact saved"
        );
        Ok(location)
    }

    /// Write one artifact, logging instead of failing. True if it was written.
    pub fn persist(
        &self,
        thread: &ThreadContext,
        path: &str,
        declared_type: &str,
        content: &str,
    ) -> bool {
        match self.try_persist(thread, path, declared_type, content) {
            Ok(_) => true,
            Err(e) => {
                log_failure(thread, path, &e);
                false
            }
        }
    }

    /// Parse `text` and persist every artifact block in it.
    pub fn persist_blocks(&self, thread: &ThreadContext, text: &str) -> PersistReport {
        let mut report = PersistReport::default();
        for block in ArtifactBlockParser::new(text) {
            if block.looks_partial() {
                tracing::warn!(
                    thread_id = %thread.thread_id(),
                    path = %block.path,
                    "Artifact looks partial (elided content); saving as-is"
                );
            }
            if self.persist(thread, &block.path, &block.declared_type, &block.content) {
                report.written.push(block.path);
            } else {
                report.failed.push(block.path);
            }
        }
        report
    }
}

fn log_failure(thread: &ThreadContext, path: &str, error: &PersistError) {
    tracing::warn!(
        thread_id = %thread.thread_id(),
        path = %path,
        error = %error,
        "Failed to persist artifact"
    );
}
