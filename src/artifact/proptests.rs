//! Property-based tests for artifact parsing and persistence

use super::path::{extension_for_type, is_valid_path};
use super::*;
use proptest::prelude::*;
use regex::Regex;
use std::sync::Arc;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_declared_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("python".to_string()),
        Just("rust".to_string()),
        Just("js".to_string()),
        Just(String::new()),
        "[a-z]{1,8}",
    ]
}

fn arb_path() -> impl Strategy<Value = String> {
    ("[a-z]{1,8}(/[a-z0-9_]{1,8}){0,3}", "[a-z]{1,4}")
        .prop_map(|(stem, ext)| format!("{stem}.{ext}"))
}

/// Content lines that can never be mistaken for a fence
fn arb_body() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-zA-Z0-9 =()+]{0,30}", 0..8)
}

/// Arbitrary text biased toward fence-like lines
fn arb_noisy_text() -> impl Strategy<Value = String> {
    let line = prop_oneof![
        Just("```".to_string()),
        Just("```python".to_string()),
        Just("```rust src/x.rs".to_string()),
        Just("# a/b.py".to_string()),
        Just(String::new()),
        "[ -~]{0,40}",
    ];
    proptest::collection::vec(line, 0..30).prop_map(|lines| lines.join("\n"))
}

fn snippet_re() -> Regex {
    Regex::new(r"^__snippets/[a-z0-9]{8}(\.\w+)?$").unwrap()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// The scanner accepts any input
    #[test]
    fn prop_parser_never_panics(text in "\\PC{0,400}") {
        let _ = ArtifactBlockParser::new(&text).count();
    }

    #[test]
    fn prop_fence_heavy_text_terminates(text in arb_noisy_text()) {
        let blocks: Vec<_> = ArtifactBlockParser::new(&text).collect();
        let fences = text.lines().filter(|l| l.trim_start().starts_with("```")).count();
        prop_assert!(blocks.len() <= fences);
    }

    /// Text without fences carries no artifacts
    #[test]
    fn prop_no_fence_no_blocks(text in "[a-zA-Z0-9 .,#/\\n]{0,300}") {
        prop_assert_eq!(ArtifactBlockParser::new(&text).count(), 0);
    }

    /// A header path and content come back out unchanged
    #[test]
    fn prop_header_path_round_trips(
        declared_type in "[a-z]{1,8}",
        path in arb_path(),
        body in arb_body(),
    ) {
        let content = body.join("\n");
        let text = format!("Intro\n```{declared_type} {path}\n{content}\n```\nOutro");
        let blocks: Vec<_> = ArtifactBlockParser::new(&text).collect();

        prop_assert_eq!(blocks.len(), 1);
        prop_assert_eq!(&blocks[0].path, &path);
        prop_assert_eq!(&blocks[0].content, &content);
        prop_assert!(!blocks[0].is_generated_path);
    }

    /// Every emitted path is usable: either valid or a snippet path
    #[test]
    fn prop_emitted_paths_are_usable(text in arb_noisy_text()) {
        let re = snippet_re();
        for block in ArtifactBlockParser::new(&text) {
            if block.is_generated_path {
                prop_assert!(re.is_match(&block.path), "bad snippet path {}", block.path);
            } else {
                prop_assert!(is_valid_path(&block.path), "bad path {}", block.path);
            }
        }
    }

    /// Blocks with no derivable path land in the snippets namespace
    #[test]
    fn prop_generated_path_shape(declared_type in arb_declared_type()) {
        let text = format!("```{declared_type}\nx y z\n```");
        let blocks: Vec<_> = ArtifactBlockParser::new(&text).collect();

        prop_assert_eq!(blocks.len(), 1);
        prop_assert!(blocks[0].is_generated_path);
        prop_assert!(snippet_re().is_match(&blocks[0].path));
        match extension_for_type(&declared_type) {
            Some(ext) => prop_assert!(blocks[0].path.ends_with(ext)),
            None => prop_assert!(!blocks[0].path.contains('.')),
        }
    }

    /// Nothing the resolver accepts lands outside the thread directory
    #[test]
    fn prop_resolve_stays_inside_thread(path in "[a-z./]{0,30}") {
        let ctx = ThreadContext::new("t", "/srv/threads").unwrap();
        if let Ok(location) = ctx.resolve(&path) {
            prop_assert!(location.starts_with(ctx.thread_dir()));
            prop_assert!(location != ctx.thread_dir());
        }
    }

    /// Persisting the same text twice writes the same header-path artifacts
    #[test]
    fn prop_persist_blocks_is_repeatable(path in arb_path(), body in arb_body()) {
        let sink = Arc::new(MemorySink::new());
        let persister = ArtifactPersister::new(sink.clone());
        let ctx = ThreadContext::new("t", "/srv/threads").unwrap();
        let text = format!("```text {path}\n{}\n```", body.join("\n"));

        let first = persister.persist_blocks(&ctx, &text);
        let second = persister.persist_blocks(&ctx, &text);

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.written, vec![path.clone()]);
        let location = ctx.resolve(&path).unwrap();
        prop_assert_eq!(sink.get(&location), Some(body.join("\n")));
    }
}
