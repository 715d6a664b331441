//! Overlapping fixed-window fragmentation of repository files.
//!
//! Every recognized file is cut into fragments of `size` characters with
//! `overlap` characters shared between consecutive fragments, so the spans
//! cover `[0, L)` contiguously. Offsets are character offsets; file bytes
//! are decoded leniently (invalid UTF-8 replaced, never fatal to a file).

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::FragmentingConfig;
use crate::error::{Error, Result};
use crate::models::SourceFragment;

/// Cut one file's text into overlapping fragments.
///
/// Fragment `i` spans `[i·(size−overlap), min(i·(size−overlap)+size, L))`.
/// Empty text yields no fragments; `L ≤ size` yields exactly one fragment
/// equal to the whole content.
pub fn fragment_text(
    path: &str,
    extension: &str,
    text: &str,
    size: usize,
    overlap: usize,
) -> Vec<SourceFragment> {
    // Degenerate window (stride would be zero or underflow): nothing to cut.
    if size == 0 || overlap >= size {
        warn!(path, size, overlap, "invalid fragment window, skipping file");
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let stride = size - overlap;

    let mut fragments = Vec::new();
    let mut start = 0usize;
    let mut ordinal = 0usize;

    while start < len {
        let end = (start + size).min(len);
        fragments.push(SourceFragment {
            id: format!("{}#{}", path, ordinal),
            path: path.to_string(),
            start,
            end,
            extension: extension.to_string(),
            text: chars[start..end].iter().collect(),
        });
        // The file is fully covered; a further window would be redundant.
        if end == len {
            break;
        }
        ordinal += 1;
        start += stride;
    }

    fragments
}

/// Walk a snapshot and fragment every recognized file.
///
/// Files are visited in sorted path order, so the returned fragment set is
/// deterministic for fixed content and config. Unreadable files are
/// skipped with a warning rather than failing the build.
pub fn fragment_repository(
    root: &Path,
    config: &FragmentingConfig,
) -> Result<Vec<SourceFragment>> {
    let mut fragments = Vec::new();
    for file in collect_source_files(root, config)? {
        let text = match file.read_lossy() {
            Some(t) => t,
            None => continue,
        };
        fragments.extend(fragment_text(
            &file.relative_path,
            &file.extension,
            &text,
            config.size,
            config.overlap,
        ));
    }

    debug!(fragments = fragments.len(), "fragmented repository");
    Ok(fragments)
}

/// A recognized file discovered during a snapshot walk.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the snapshot root, `/`-separated.
    pub relative_path: String,
    pub absolute_path: std::path::PathBuf,
    /// Extension without the dot, lowercased.
    pub extension: String,
}

impl SourceFile {
    /// Lenient read: invalid UTF-8 is substituted, I/O errors skip the
    /// file with a warning.
    pub fn read_lossy(&self) -> Option<String> {
        match std::fs::read(&self.absolute_path) {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                warn!(path = %self.relative_path, error = %e, "skipping unreadable file");
                None
            }
        }
    }
}

/// Walk a snapshot and list recognized files in sorted path order,
/// pruning skipped directories before descending into them.
pub fn collect_source_files(
    root: &Path,
    config: &FragmentingConfig,
) -> Result<Vec<SourceFile>> {
    let extensions: HashSet<&str> = config.extensions.iter().map(String::as_str).collect();
    let skip_set = build_skip_globset(&config.skip_dirs)?;

    let mut files: Vec<SourceFile> = Vec::new();

    for entry in WalkDir::new(root).into_iter().filter_entry(|e| {
        !(e.file_type().is_dir() && skip_set.is_match(e.file_name().to_string_lossy().as_ref()))
    }) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let extension = entry
            .path()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !extensions.contains(extension.as_str()) {
            continue;
        }

        let relative_path = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        files.push(SourceFile {
            relative_path,
            absolute_path: entry.path().to_path_buf(),
            extension,
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

fn build_skip_globset(names: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for name in names {
        let glob =
            Glob::new(name).map_err(|e| Error::Config(format!("bad skip pattern '{}': {}", name, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("bad skip patterns: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FragmentingConfig;

    fn spans(fragments: &[SourceFragment]) -> Vec<(usize, usize)> {
        fragments.iter().map(|f| (f.start, f.end)).collect()
    }

    #[test]
    fn empty_file_yields_no_fragments() {
        assert!(fragment_text("a.py", "py", "", 500, 50).is_empty());
    }

    #[test]
    fn short_file_yields_single_whole_fragment() {
        let text = "x".repeat(50);
        let frags = fragment_text("a.py", "py", &text, 500, 50);
        assert_eq!(spans(&frags), vec![(0, 50)]);
        assert_eq!(frags[0].text, text);
    }

    #[test]
    fn overlapping_spans_match_window_arithmetic() {
        let text = "x".repeat(1200);
        let frags = fragment_text("a.py", "py", &text, 500, 50);
        assert_eq!(spans(&frags), vec![(0, 500), (450, 950), (900, 1200)]);
    }

    #[test]
    fn coverage_is_contiguous_and_count_matches_formula() {
        let size = 500;
        let overlap = 50;
        for len in [1usize, 449, 450, 451, 500, 501, 950, 951, 1200, 4999] {
            let text = "y".repeat(len);
            let frags = fragment_text("f.rs", "rs", &text, size, overlap);

            let expected = if len <= size {
                1
            } else {
                (len - overlap).div_ceil(size - overlap)
            };
            assert_eq!(frags.len(), expected, "count mismatch for len={}", len);

            // Spans cover [0, len) with no gaps.
            assert_eq!(frags.first().unwrap().start, 0);
            assert_eq!(frags.last().unwrap().end, len);
            for pair in frags.windows(2) {
                assert!(
                    pair[1].start <= pair[0].end,
                    "gap between fragments at len={}",
                    len
                );
                assert_eq!(pair[1].start, pair[0].start + (size - overlap));
            }
        }
    }

    #[test]
    fn window_ending_on_file_boundary_emits_no_redundant_tail() {
        // end == len while start + stride < len: the loop must stop.
        let frags = fragment_text("a.py", "py", &"x".repeat(451), 500, 50);
        assert_eq!(spans(&frags), vec![(0, 451)]);

        let frags = fragment_text("a.py", "py", &"x".repeat(950), 500, 50);
        assert_eq!(spans(&frags), vec![(0, 500), (450, 950)]);

        let frags = fragment_text("a.py", "py", &"x".repeat(500), 500, 50);
        assert_eq!(spans(&frags), vec![(0, 500)]);
    }

    #[test]
    fn degenerate_window_yields_no_fragments() {
        // overlap >= size would never advance; size 0 has no window at all.
        assert!(fragment_text("a.py", "py", "content", 50, 50).is_empty());
        assert!(fragment_text("a.py", "py", "content", 50, 60).is_empty());
        assert!(fragment_text("a.py", "py", "content", 0, 0).is_empty());
    }

    #[test]
    fn fragment_ids_are_deterministic() {
        let text = "z".repeat(1000);
        let a = fragment_text("src/m.go", "go", &text, 400, 100);
        let b = fragment_text("src/m.go", "go", &text, 400, 100);
        assert_eq!(a, b);
        assert_eq!(a[0].id, "src/m.go#0");
        assert_eq!(a[1].id, "src/m.go#1");
    }

    #[test]
    fn offsets_are_character_based() {
        // Multibyte characters count once.
        let text = "héllo wörld".repeat(10); // 110 chars
        let frags = fragment_text("u.py", "py", &text, 100, 10);
        assert_eq!(spans(&frags), vec![(0, 100), (90, 110)]);
        assert_eq!(frags[0].text.chars().count(), 100);
    }

    #[test]
    fn walk_skips_configured_directories_and_unknown_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/dep")).unwrap();
        std::fs::write(dir.path().join("src/app.py"), "print('hi')").unwrap();
        std::fs::write(dir.path().join("node_modules/dep/x.js"), "ignored").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let frags = fragment_repository(dir.path(), &FragmentingConfig::default()).unwrap();
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].path, "src/app.py");
        assert_eq!(frags[0].extension, "py");
    }

    #[test]
    fn walk_order_is_sorted_by_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.py"), "bbb").unwrap();
        std::fs::write(dir.path().join("a.py"), "aaa").unwrap();

        let frags = fragment_repository(dir.path(), &FragmentingConfig::default()).unwrap();
        let order: Vec<&str> = frags.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(order, vec!["a.py", "b.py"]);
    }
}
