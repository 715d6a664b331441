//! Core data types that flow through the ingestion and query pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A cached shallow checkout of a repository.
///
/// Immutable once created: the checkout is reused for the lifetime of the
/// cache directory and never re-validated against the upstream remote.
#[derive(Debug, Clone)]
pub struct RepositorySnapshot {
    /// Deterministic identifier derived from the source URL. Doubles as
    /// the cache directory name and the vector-collection name.
    pub id: String,
    pub url: String,
    pub path: PathBuf,
    pub acquired_at: DateTime<Utc>,
}

/// A bounded, offset-addressed slice of one file's text — the unit of
/// retrieval. Offsets are character positions within the file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFragment {
    /// `"{path}#{ordinal}"`; deterministic for fixed content and config.
    pub id: String,
    /// Path relative to the snapshot root, `/`-separated.
    pub path: String,
    pub start: usize,
    pub end: usize,
    /// File extension without the dot, lowercased.
    pub extension: String,
    pub text: String,
}

/// Provenance carried alongside each vector in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentMeta {
    pub path: String,
    pub start: usize,
    pub end: usize,
    pub extension: String,
    pub text: String,
}

impl SourceFragment {
    pub fn meta(&self) -> FragmentMeta {
        FragmentMeta {
            path: self.path.clone(),
            start: self.start,
            end: self.end,
            extension: self.extension.clone(),
            text: self.text.clone(),
        }
    }
}

/// One nearest-neighbor hit, ascending distance order.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub fragment_id: String,
    pub meta: FragmentMeta,
    /// Cosine distance (`1 − cosine similarity`); 0 means identical.
    pub distance: f32,
}

/// Aggregate statistics over the recognized files of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepoStats {
    pub total_files: usize,
    /// File counts keyed by extension (without dot), sorted for
    /// deterministic rendering.
    pub files_by_extension: BTreeMap<String, usize>,
    pub total_functions: usize,
    pub total_classes: usize,
}

impl RepoStats {
    /// Best-effort primary language from the extension majority.
    pub fn primary_language(&self) -> Option<&'static str> {
        let (ext, _) = self
            .files_by_extension
            .iter()
            .max_by_key(|(ext, count)| (**count, std::cmp::Reverse(ext.as_str())))?;
        Some(language_name(ext))
    }
}

/// Human-readable language name for a file extension.
pub fn language_name(ext: &str) -> &'static str {
    match ext {
        "py" => "Python",
        "rs" => "Rust",
        "js" | "jsx" => "JavaScript",
        "ts" | "tsx" => "TypeScript",
        "java" => "Java",
        "go" => "Go",
        "c" => "C",
        "cpp" | "cc" | "cxx" => "C++",
        "rb" => "Ruby",
        "php" => "PHP",
        "html" => "HTML",
        "css" => "CSS",
        _ => "unknown",
    }
}

/// Where a repository summary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryOrigin {
    /// Produced by the chat backend.
    Model,
    /// Deterministic fallback built from stats, listing, and README.
    Offline,
}

/// Cached natural-language overview of a repository.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub text: String,
    pub origin: SummaryOrigin,
}

/// Result of `analyze(url)`: everything the presentation layer renders on
/// first load.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeOutcome {
    pub summary: Summary,
    pub readme: String,
    pub stats: RepoStats,
}

/// Result of `ask(url, question)`.
#[derive(Debug, Clone, Serialize)]
pub struct AskOutcome {
    /// The answer text. May be a soft error string when generation failed;
    /// check with [`crate::engine::is_soft_error`].
    pub answer: String,
    /// Relative paths of the fragments that informed the answer, ranked,
    /// deduplicated. Empty for shortcut answers.
    pub source_files: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_language_follows_majority() {
        let mut stats = RepoStats::default();
        stats.files_by_extension.insert("py".into(), 7);
        stats.files_by_extension.insert("js".into(), 3);
        assert_eq!(stats.primary_language(), Some("Python"));
    }

    #[test]
    fn primary_language_empty_is_none() {
        assert_eq!(RepoStats::default().primary_language(), None);
    }

    #[test]
    fn primary_language_tie_is_deterministic() {
        let mut stats = RepoStats::default();
        stats.files_by_extension.insert("rb".into(), 2);
        stats.files_by_extension.insert("go".into(), 2);
        // Ties break toward the lexicographically smaller extension.
        assert_eq!(stats.primary_language(), Some("Go"));
    }

    #[test]
    fn fragment_meta_carries_provenance() {
        let frag = SourceFragment {
            id: "src/app.py#0".into(),
            path: "src/app.py".into(),
            start: 0,
            end: 120,
            extension: "py".into(),
            text: "print('hi')".into(),
        };
        let meta = frag.meta();
        assert_eq!(meta.path, "src/app.py");
        assert_eq!((meta.start, meta.end), (0, 120));
    }
}
