//! Line-scanning parser for fenced artifact blocks
//!
//! The scanner walks the text one line at a time through three states:
//!
//! - `Outside`: looking for an opening fence
//! - `SeekingPath`: inside a block whose header named no usable path; the
//!   first non-blank line may still declare one
//! - `CollectingContent`: path established, lines are content until the
//!   closing fence
//!
//! Fences carrying an info string inside content open a nested level, so a
//! markdown artifact that itself contains code blocks is kept whole. Input is
//! never rejected: a block with no derivable path gets a synthesized one, and
//! an unterminated block is flushed at end of text.

use super::path::{generate_snippet_path, infer_path_from_line, is_valid_path};
use super::ArtifactBlock;
use std::str::Lines;

const FENCE: &str = "```";

/// Scanner state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Outside,
    SeekingPath,
    CollectingContent,
}

/// Lazy iterator over the artifact blocks in a piece of text.
pub struct ArtifactBlockParser<'a> {
    lines: Lines<'a>,
    state: ScanState,
    open: Option<OpenBlock<'a>>,
}

/// Block currently being accumulated
struct OpenBlock<'a> {
    declared_type: String,
    /// `(path, is_generated)` once established
    path: Option<(String, bool)>,
    lines: Vec<&'a str>,
    /// Nesting depth of fences opened inside the content
    depth: usize,
}

impl<'a> OpenBlock<'a> {
    fn new(declared_type: &str, declared_path: &str) -> Self {
        Self {
            declared_type: declared_type.to_string(),
            path: is_valid_path(declared_path).then(|| (declared_path.to_string(), false)),
            lines: Vec::new(),
            depth: 0,
        }
    }

    fn push_content(&mut self, line: &'a str) {
        if is_closing_fence(line) {
            self.depth = self.depth.saturating_sub(1);
        } else if fence_info(line).is_some_and(opens_nested_fence) {
            self.depth += 1;
        }
        self.lines.push(line);
    }

    fn finish(self) -> ArtifactBlock {
        let (path, is_generated_path) = self
            .path
            .unwrap_or_else(|| (generate_snippet_path(&self.declared_type), true));
        ArtifactBlock {
            declared_type: self.declared_type,
            path,
            content: self.lines.join("\n"),
            is_generated_path,
        }
    }
}

/// The info string after an opening fence, if `line` is a fence line.
fn fence_info(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    trimmed
        .starts_with(FENCE)
        .then(|| trimmed.trim_start_matches('`'))
}

/// An info string that opens a nested fence. A fence closed on the same line
/// (```` ```rust``` ````) is inline code, not a new level.
fn opens_nested_fence(info: &str) -> bool {
    !info.trim().is_empty() && !info.contains('`')
}

/// A line made only of backticks (at least three).
fn is_closing_fence(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= FENCE.len() && trimmed.chars().all(|c| c == '`')
}

/// Split a fence info string into `(declared_type, declared_path)`.
fn split_header(info: &str) -> (&str, &str) {
    let info = info.trim();
    match info.split_once(char::is_whitespace) {
        Some((declared_type, rest)) => (declared_type, rest.trim()),
        None => (info, ""),
    }
}

impl<'a> ArtifactBlockParser<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            state: ScanState::Outside,
            open: None,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    fn close(&mut self) -> Option<ArtifactBlock> {
        self.state = ScanState::Outside;
        self.open.take().map(OpenBlock::finish)
    }

    /// Feed one line; returns a block when this line closed one.
    fn step(&mut self, line: &'a str) -> Option<ArtifactBlock> {
        match self.state {
            ScanState::Outside => {
                if let Some(info) = fence_info(line) {
                    let (declared_type, declared_path) = split_header(info);
                    let block = OpenBlock::new(declared_type, declared_path);
                    self.state = if block.path.is_some() {
                        ScanState::CollectingContent
                    } else {
                        ScanState::SeekingPath
                    };
                    self.open = Some(block);
                }
                None
            }
            ScanState::SeekingPath => {
                if is_closing_fence(line) {
                    return self.close();
                }
                let Some(block) = self.open.as_mut() else {
                    self.state = ScanState::Outside;
                    return None;
                };
                if line.trim().is_empty() {
                    block.lines.push(line);
                    return None;
                }
                if let Some(path) = infer_path_from_line(line) {
                    // The declaring line and any blanks before it are not content
                    block.lines.clear();
                    block.path = Some((path, false));
                } else {
                    block.path = Some((generate_snippet_path(&block.declared_type), true));
                    block.push_content(line);
                }
                self.state = ScanState::CollectingContent;
                None
            }
            ScanState::CollectingContent => {
                let Some(block) = self.open.as_mut() else {
                    self.state = ScanState::Outside;
                    return None;
                };
                if block.depth == 0 && is_closing_fence(line) {
                    return self.close();
                }
                block.push_content(line);
                None
            }
        }
    }
}

impl Iterator for ArtifactBlockParser<'_> {
    type Item = ArtifactBlock;

    fn next(&mut self) -> Option<ArtifactBlock> {
        while let Some(line) = self.lines.next() {
            if let Some(block) = self.step(line) {
                return Some(block);
            }
        }
        // End of text: flush an unterminated block as if it were closed
        if self.state() != ScanState::Outside {
            tracing::debug!(state = ?self.state(), "Flushing unterminated artifact block at end of text");
        }
        self.close()
    }
}
