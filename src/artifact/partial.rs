//! Elision markers that mark an artifact as an excerpt
//!
//! Models often abbreviate unchanged regions (`# ... (rest unchanged)`,
//! `[... existing content ...]`). Such content is still persisted but is
//! flagged so it can be reported.

use regex::RegexSet;
use std::sync::LazyLock;

static PARTIAL_MARKERS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?im)#\s*\.\.\.\s*\(",
        r"(?im)//\s*.*?\.\.\.\s*\(",
        r"(?im)\[\.\.\.\s*existing\s*content\s*\.\.\.\]",
        r"(?im)\[\.\.\..*?\.\.\.\]",
        r"(?im)<!--\s*\.\.\.",
    ])
    .expect("valid partial-content patterns")
});

pub fn is_partial_content(content: &str) -> bool {
    PARTIAL_MARKERS.is_match(content)
}
