//! Repository summarization with an offline fallback.
//!
//! One chat call produces a structured overview of the repository from its
//! README, top-level listing, and symbol statistics. When the backend is
//! unavailable the summarizer degrades to a fully deterministic document
//! built from the same inputs, so `analyze` never fails on a model outage.

use std::path::Path;
use tracing::warn;

use crate::llm::ChatBackend;
use crate::models::{RepoStats, Summary, SummaryOrigin};

/// Maximum README characters fed to the model.
const README_LIMIT: usize = 10_000;
/// Maximum README characters echoed into the offline summary.
const README_EXCERPT_LIMIT: usize = 2_000;
/// Maximum top-level entries listed.
const LISTING_LIMIT: usize = 30;

/// Load the repository README (first ~10k characters), or empty.
pub fn load_readme(repo_path: &Path) -> String {
    for name in ["README.md", "README.MD", "README.txt", "readme.md"] {
        let candidate = repo_path.join(name);
        if candidate.exists() {
            let text = std::fs::read(&candidate)
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default();
            return text.chars().take(README_LIMIT).collect();
        }
    }
    String::new()
}

/// Sorted top-level entry names, dotfiles excluded, at most 30.
pub fn top_level_listing(repo_path: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(repo_path)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| !name.starts_with('.'))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names.truncate(LISTING_LIMIT);
    names
}

/// Generate the repository overview, falling back offline on backend
/// failure. Never returns an error: a summary always exists.
pub async fn generate_summary(
    backend: &dyn ChatBackend,
    readme: &str,
    listing: &[String],
    stats: &RepoStats,
) -> Summary {
    let prompt = summary_prompt(readme, listing, stats);

    match backend.complete(&prompt).await {
        Ok(text) if !text.trim().is_empty() => Summary {
            text,
            origin: SummaryOrigin::Model,
        },
        Ok(_) => {
            warn!("chat backend returned an empty summary, using offline fallback");
            offline_summary(readme, listing, stats)
        }
        Err(e) => {
            warn!(error = %e, "summary generation failed, using offline fallback");
            offline_summary(readme, listing, stats)
        }
    }
}

fn summary_prompt(readme: &str, listing: &[String], stats: &RepoStats) -> String {
    format!(
        "You are an expert codebase analyst. Provide a comprehensive, \
         developer-friendly summary of this repository.\n\
         \n\
         REPOSITORY ANALYSIS:\n\
         - Total files: {total_files}\n\
         - Total functions: {total_functions}\n\
         - Total classes: {total_classes}\n\
         \n\
         README CONTENT:\n\
         {readme}\n\
         \n\
         TOP-LEVEL CONTENTS:\n\
         {listing}\n\
         \n\
         Please provide:\n\
         1. **Project Purpose**: What does this project do?\n\
         2. **Tech Stack**: What technologies, frameworks, and languages are used?\n\
         3. **Architecture**: Key components and how they're organized\n\
         4. **Getting Started**: Quick setup instructions for developers\n\
         5. **Key Features**: Main functionality and capabilities\n\
         6. **File Structure**: Important directories and their purposes\n\
         \n\
         Format your response in markdown with clear sections.",
        total_files = stats.total_files,
        total_functions = stats.total_functions,
        total_classes = stats.total_classes,
        readme = readme,
        listing = listing.join("\n"),
    )
}

/// Deterministic summary built without any model call.
pub fn offline_summary(readme: &str, listing: &[String], stats: &RepoStats) -> Summary {
    let mut text = String::new();

    text.push_str("## Repository Overview (offline analysis)\n\n");
    text.push_str("### Statistics\n");
    text.push_str(&format!("- Total files: {}\n", stats.total_files));
    text.push_str(&format!("- Total functions: {}\n", stats.total_functions));
    text.push_str(&format!("- Total classes: {}\n", stats.total_classes));
    for (ext, count) in &stats.files_by_extension {
        text.push_str(&format!("- .{} files: {}\n", ext, count));
    }
    if let Some(language) = stats.primary_language() {
        text.push_str(&format!(
            "\nThis appears to be primarily a {} project.\n",
            language
        ));
    }

    if !listing.is_empty() {
        text.push_str("\n### Top-Level Structure\n```\n");
        for name in listing {
            text.push_str(name);
            text.push('\n');
        }
        text.push_str("```\n");
    }

    if readme.is_empty() {
        text.push_str("\n### README\nNo README found.\n");
    } else {
        text.push_str("\n### README Excerpt\n");
        let excerpt: String = readme.chars().take(README_EXCERPT_LIMIT).collect();
        text.push_str(&excerpt);
        if readme.chars().count() > README_EXCERPT_LIMIT {
            text.push_str("...");
        }
        text.push('\n');
    }

    Summary {
        text,
        origin: SummaryOrigin::Offline,
    }
}
