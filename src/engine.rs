//! Query answering engine: intent shortcut, retrieval, context assembly,
//! and generation.
//!
//! Each question makes at most one retrieval pass and one generation call:
//!
//! ```text
//! question ──intent──▶ overview? ──▶ cached summary (no retrieval)
//!     │
//!     └─▶ embed ─▶ k-NN query ─▶ context blocks ─▶ chat call ─▶ answer
//!                                                     │
//!                                                     └─▶ soft error string
//! ```
//!
//! Generation failures never propagate: the answer is a string carrying
//! [`SOFT_ERROR_PREFIX`], which callers may detect with [`is_soft_error`].

use tracing::{debug, info};

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::llm::ChatBackend;
use crate::models::{AskOutcome, SearchHit, Summary};
use crate::structure::SymbolTable;

/// Prefix of answers produced when the chat backend fails.
pub const SOFT_ERROR_PREFIX: &str = "(error generating answer:";

/// True when `answer` is a degraded generation-failure answer rather than
/// model output.
pub fn is_soft_error(answer: &str) -> bool {
    answer.starts_with(SOFT_ERROR_PREFIX)
}

/// What a question is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionIntent {
    /// A "what is this repository about" meta-question; answered from the
    /// cached summary without touching the index.
    RepoOverview,
    /// Anything else; goes through retrieval and generation.
    CodeQuestion,
}

/// Classify a question. Deliberately a small substring heuristic, isolated
/// here so the policy can change without touching the retrieval path.
pub fn classify_question(question: &str) -> QuestionIntent {
    let normalized = question.trim().to_lowercase();
    let overview = normalized.contains("repo about")
        || normalized.contains("repository about")
        || normalized.starts_with("what is the repo")
        || normalized.starts_with("what is this repo")
        || normalized.contains("project purpose");
    if overview {
        QuestionIntent::RepoOverview
    } else {
        QuestionIntent::CodeQuestion
    }
}

/// Per-fragment limit on function/class names in a context block.
const SYMBOLS_PER_BLOCK: usize = 3;

/// Render retrieved fragments into the labeled context for the prompt.
///
/// Blocks appear in rank order. Each carries the source path, up to three
/// function and three class names known for that file, and the fragment
/// text fenced by its extension.
pub fn build_context(hits: &[SearchHit], symbols: &SymbolTable) -> String {
    let mut blocks = Vec::with_capacity(hits.len());

    for hit in hits {
        let meta = &hit.meta;
        let mut block = format!("### File: {} ({})", meta.path, meta.extension);

        if let Some(file_symbols) = symbols.get(&meta.path) {
            let function_names: Vec<&str> = file_symbols
                .functions
                .iter()
                .take(SYMBOLS_PER_BLOCK)
                .map(|f| f.name.as_str())
                .collect();
            if !function_names.is_empty() {
                block.push_str(&format!(
                    "\nFunctions in this file: {}",
                    function_names.join(", ")
                ));
            }
            let class_names: Vec<&str> = file_symbols
                .classes
                .iter()
                .take(SYMBOLS_PER_BLOCK)
                .map(|c| c.name.as_str())
                .collect();
            if !class_names.is_empty() {
                block.push_str(&format!(
                    "\nClasses in this file: {}",
                    class_names.join(", ")
                ));
            }
        }

        block.push_str(&format!("\n```{}\n{}\n```", meta.extension, meta.text));
        blocks.push(block);
    }

    blocks.join("\n\n")
}

fn answer_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an expert software developer and code analyst. Answer the \
         user's question about this codebase using the provided context.\n\
         \n\
         CONTEXT (relevant code fragments):\n\
         {context}\n\
         \n\
         QUESTION: {question}\n\
         \n\
         INSTRUCTIONS:\n\
         1. Use ONLY the provided code context to answer\n\
         2. If the answer isn't in the context, say \"I don't see information \
         about that in the provided code\"\n\
         3. Reference specific file paths when relevant\n\
         \n\
         Provide a concise, accurate answer."
    )
}

/// Answer one question against a built repository index.
///
/// `summary` is the cached repository overview used for the intent
/// shortcut. Errors are only returned for the embedding/index stages;
/// generation failure degrades to a soft-error answer.
pub async fn answer_question(
    question: &str,
    repo_id: &str,
    summary: &Summary,
    symbols: &SymbolTable,
    embedder: &dyn EmbeddingProvider,
    index: &VectorIndex,
    backend: &dyn ChatBackend,
    top_k: usize,
) -> Result<AskOutcome> {
    if classify_question(question) == QuestionIntent::RepoOverview {
        debug!("overview intent, answering from cached summary");
        return Ok(AskOutcome {
            answer: summary.text.clone(),
            source_files: Vec::new(),
        });
    }

    let question_vector = embedder
        .embed(&[question.to_string()])
        .await?
        .into_iter()
        .next()
        .unwrap_or_default();

    let hits = index.query(repo_id, &question_vector, top_k)?;
    info!(hits = hits.len(), repo = %repo_id, "retrieved fragments");

    let mut source_files = Vec::new();
    for hit in &hits {
        if !source_files.contains(&hit.meta.path) {
            source_files.push(hit.meta.path.clone());
        }
    }

    let context = build_context(&hits, symbols);
    let prompt = answer_prompt(&context, question);

    let answer = match backend.complete(&prompt).await {
        Ok(text) => text,
        Err(e) => {
            debug!(error = %e, "generation failed, returning soft error");
            format!("{} {})", SOFT_ERROR_PREFIX, e)
        }
    };

    Ok(AskOutcome {
        answer,
        source_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FragmentMeta, SummaryOrigin};
    use crate::structure::extract_file_symbols;

    #[test]
    fn overview_questions_are_detected() {
        for q in [
            "What is this repo about?",
            "  what is the repo doing here ",
            "Tell me the project purpose",
            "what is this repository about",
        ] {
            assert_eq!(classify_question(q), QuestionIntent::RepoOverview, "{}", q);
        }
    }

    #[test]
    fn code_questions_are_not_shortcut() {
        for q in [
            "How is authentication implemented?",
            "Where is the database schema defined?",
            "",
        ] {
            assert_eq!(classify_question(q), QuestionIntent::CodeQuestion, "{}", q);
        }
    }

    #[test]
    fn soft_error_detection() {
        assert!(is_soft_error("(error generating answer: timeout)"));
        assert!(!is_soft_error("The project uses axum."));
    }

    fn hit(path: &str, ext: &str, text: &str) -> SearchHit {
        SearchHit {
            fragment_id: format!("{}#0", path),
            meta: FragmentMeta {
                path: path.to_string(),
                start: 0,
                end: text.chars().count(),
                extension: ext.to_string(),
                text: text.to_string(),
            },
            distance: 0.1,
        }
    }

    #[test]
    fn context_blocks_carry_path_symbols_and_text() {
        let mut symbols = SymbolTable::default();
        let file_symbols = extract_file_symbols(
            "py",
            "def alpha():\n    pass\n\ndef beta():\n    pass\n\ndef gamma():\n    pass\n\ndef delta():\n    pass\n\nclass Thing:\n    pass\n",
        );
        symbols.insert("app/main.py", file_symbols);

        let hits = vec![hit("app/main.py", "py", "def alpha(): ...")];
        let context = build_context(&hits, &symbols);

        assert!(context.contains("### File: app/main.py (py)"));
        // At most three function names.
        assert!(context.contains("Functions in this file: alpha, beta, gamma"));
        assert!(!context.contains("delta"));
        assert!(context.contains("Classes in this file: Thing"));
        assert!(context.contains("```py\ndef alpha(): ...\n```"));
    }

    #[test]
    fn context_without_symbols_still_renders() {
        let symbols = SymbolTable::default();
        let hits = vec![hit("lib.rs", "rs", "fn main() {}")];
        let context = build_context(&hits, &symbols);
        assert!(context.contains("### File: lib.rs (rs)"));
        assert!(!context.contains("Functions in this file"));
    }

    #[test]
    fn context_preserves_rank_order() {
        let symbols = SymbolTable::default();
        let hits = vec![hit("first.py", "py", "one"), hit("second.py", "py", "two")];
        let context = build_context(&hits, &symbols);
        let first = context.find("first.py").unwrap();
        let second = context.find("second.py").unwrap();
        assert!(first < second);
    }

    #[tokio::test]
    async fn overview_intent_skips_embedding_and_index() {
        use crate::embedding::DisabledProvider;
        use crate::llm::DisabledBackend;

        let index = VectorIndex::new();
        let summary = Summary {
            text: "It is a demo repo.".into(),
            origin: SummaryOrigin::Offline,
        };

        // Disabled providers would error if touched; the shortcut must not
        // touch them, and the collection does not even exist.
        let outcome = answer_question(
            "what is this repo about?",
            "deadbeef",
            &summary,
            &SymbolTable::default(),
            &DisabledProvider,
            &index,
            &DisabledBackend,
            4,
        )
        .await
        .unwrap();

        assert_eq!(outcome.answer, "It is a demo repo.");
        assert!(outcome.source_files.is_empty());
    }
}
