//! File artifacts embedded in assistant output
//!
//! Assistant text may carry fenced code blocks that stand for files. This
//! module finds them (`parser`), decides where they live (`path`), and writes
//! them under the thread's storage directory (`persister`).
//!
//! # Example
//!
//! ```ignore
//! let persister = ArtifactPersister::new(Arc::new(FsSink));
//! let report = persister.persist_blocks(&thread, response_text);
//! ```

pub mod files;
pub mod parser;
pub mod partial;
pub mod path;
pub mod persister;

#[cfg(test)]
mod proptests;

#[allow(unused_imports)] // Public API re-exports
pub use files::{list_thread_files, read_thread_file, FileNode, FileTree};
#[allow(unused_imports)]
pub use parser::ArtifactBlockParser;
#[cfg(test)]
pub use persister::MemorySink;
#[allow(unused_imports)]
pub use persister::{
    ArtifactPersister, ArtifactSink, FsSink, PersistError, PersistReport, ThreadContext,
};

use serde::Serialize;

/// A fenced block of assistant output that represents a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactBlock {
    /// Info-string type after the opening fence (`python`, `rust`, ...). May be empty.
    pub declared_type: String,
    /// Declared or synthesized path, relative to the thread root once resolved.
    pub path: String,
    pub content: String,
    /// True when no usable path was found and one was synthesized under `__snippets/`.
    pub is_generated_path: bool,
}

impl ArtifactBlock {
    /// Whether the content looks like an elided excerpt rather than a whole file.
    pub fn looks_partial(&self) -> bool {
        partial::is_partial_content(&self.content)
    }
}
