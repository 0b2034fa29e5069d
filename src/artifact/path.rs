//! Artifact path inference
//!
//! Validation rules, comment-marker stripping, and the fallback path used when
//! a block never names its destination.

use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use std::sync::LazyLock;

/// Namespace for synthesized artifact paths.
pub const SNIPPETS_DIR: &str = "__snippets";

const SNIPPET_NAME_LEN: usize = 8;

/// Single-line comment forms that may carry a path: `# p`, `// p`, `/* p */`,
/// `* p`, `<!-- p -->`, `-- p`.
static COMMENT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:<!--|/\*|//|--|#|\*)(\s*)(.*?)\s*(?:\*/|-->)?$").expect("valid comment regex")
});

/// True if every character is in the artifact path allow-list.
fn has_allowed_chars(path: &str) -> bool {
    path.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/'))
}

/// A path declared explicitly in a fence header.
pub fn is_valid_path(path: &str) -> bool {
    !path.is_empty() && has_allowed_chars(path) && path.chars().any(|c| c != '.' && c != '/')
}

/// A path inferred from a content line must also look like a file: it has a
/// directory separator or an extension on its last segment.
pub fn is_plausible_inferred_path(path: &str) -> bool {
    if !is_valid_path(path) {
        return false;
    }
    if path.contains('/') {
        return true;
    }
    path.trim_start_matches('.').contains('.')
}

/// Extensionless names that are still recognisably files.
const WELL_KNOWN_FILES: &[&str] = &[
    "Makefile",
    "Dockerfile",
    "Procfile",
    "LICENSE",
    "Gemfile",
    "Rakefile",
    "Jenkinsfile",
    "Vagrantfile",
];

/// A comment names its file more deliberately than a bare line, so dotfiles
/// and well-known extensionless names are accepted too.
pub fn is_plausible_commented_path(path: &str) -> bool {
    if is_plausible_inferred_path(path) {
        return true;
    }
    if !is_valid_path(path) {
        return false;
    }
    let is_dotfile = path
        .strip_prefix('.')
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_alphanumeric()));
    is_dotfile || WELL_KNOWN_FILES.contains(&path)
}

/// Try to read a path out of the first meaningful line of a block.
///
/// Comment-wrapped paths have their markers stripped; otherwise the trimmed
/// line is tried as a bare path.
pub fn infer_path_from_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    match COMMENT_LINE.captures(trimmed) {
        Some(caps) => {
            let spaced = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            let candidate = caps.get(2).map_or("", |m| m.as_str());
            // `*.log` is a glob, not a comment naming `.log`
            let plausible = if spaced {
                is_plausible_commented_path(candidate)
            } else {
                is_plausible_inferred_path(candidate)
            };
            plausible.then(|| candidate.to_string())
        }
        None => is_plausible_inferred_path(trimmed).then(|| trimmed.to_string()),
    }
}

/// File extension (with the leading dot) for a fence info-string type.
pub fn extension_for_type(declared_type: &str) -> Option<&'static str> {
    let ext = match declared_type.trim().to_ascii_lowercase().as_str() {
        "python" | "py" => ".py",
        "javascript" | "js" | "node" => ".js",
        "typescript" | "ts" => ".ts",
        "tsx" => ".tsx",
        "jsx" => ".jsx",
        "rust" | "rs" => ".rs",
        "go" | "golang" => ".go",
        "java" => ".java",
        "kotlin" | "kt" => ".kt",
        "scala" => ".scala",
        "swift" => ".swift",
        "c" => ".c",
        "h" => ".h",
        "cpp" | "c++" | "cxx" => ".cpp",
        "csharp" | "cs" | "c#" => ".cs",
        "ruby" | "rb" => ".rb",
        "php" => ".php",
        "perl" | "pl" => ".pl",
        "lua" => ".lua",
        "r" => ".r",
        "haskell" | "hs" => ".hs",
        "elixir" | "ex" => ".ex",
        "dart" => ".dart",
        "html" | "htm" => ".html",
        "css" => ".css",
        "scss" => ".scss",
        "vue" => ".vue",
        "svelte" => ".svelte",
        "json" => ".json",
        "yaml" | "yml" => ".yaml",
        "toml" => ".toml",
        "xml" => ".xml",
        "ini" => ".ini",
        "csv" => ".csv",
        "markdown" | "md" => ".md",
        "sql" => ".sql",
        "graphql" | "gql" => ".graphql",
        "proto" | "protobuf" => ".proto",
        "bash" | "sh" | "shell" | "zsh" => ".sh",
        "powershell" | "ps1" => ".ps1",
        "dockerfile" | "docker" => ".dockerfile",
        "text" | "txt" | "plaintext" => ".txt",
        _ => return None,
    };
    Some(ext)
}

/// Synthesize `__snippets/<8 lowercase alnum><ext>` for a block with no usable path.
pub fn generate_snippet_path(declared_type: &str) -> String {
    let name: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SNIPPET_NAME_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    let ext = extension_for_type(declared_type).unwrap_or("");
    format!("{SNIPPETS_DIR}/{name}{ext}")
}
