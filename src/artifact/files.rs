//! Browsing a thread's saved artifacts

use super::persister::{PersistError, ThreadContext};
use ignore::WalkBuilder;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path};

/// Directory listing: names map to subtrees, or to the file's thread-relative path
pub type FileTree = BTreeMap<String, FileNode>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FileNode {
    File(String),
    Dir(FileTree),
}

/// List every artifact saved for a thread. `None` if the thread has no directory yet.
pub fn list_thread_files(thread: &ThreadContext) -> io::Result<Option<FileTree>> {
    let root = thread.thread_dir();
    if !root.is_dir() {
        return Ok(None);
    }

    let mut tree = FileTree::new();
    let walker = WalkBuilder::new(&root)
        .standard_filters(false)
        .follow_links(false)
        .build();

    for entry in walker {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(&root) {
            insert_file(&mut tree, relative);
        }
    }

    Ok(Some(tree))
}

fn insert_file(tree: &mut FileTree, relative: &Path) {
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let Some((file, dirs)) = parts.split_last() else {
        return;
    };

    let mut current = tree;
    for dir in dirs {
        let node = current
            .entry(dir.clone())
            .or_insert_with(|| FileNode::Dir(FileTree::new()));
        current = match node {
            FileNode::Dir(subtree) => subtree,
            FileNode::File(_) => return,
        };
    }
    current.insert(file.clone(), FileNode::File(parts.join("/")));
}

/// Read one saved artifact. `None` if nothing is stored at that path.
pub fn read_thread_file(thread: &ThreadContext, path: &str) -> Result<Option<Vec<u8>>, PersistError> {
    let location = thread.resolve(path)?;
    if !location.is_file() {
        return Ok(None);
    }
    match fs::read(&location) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PersistError::Io {
            path: location,
            source,
        }),
    }
}
