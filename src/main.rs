//! # RepoLens CLI (`repolens`)
//!
//! Command-line front end over the [`repolens`] library.
//!
//! ## Usage
//!
//! ```bash
//! repolens --config ./config/repolens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `repolens analyze <url>` | Clone, index, and summarize a repository |
//! | `repolens ask <url> "<question>"` | Answer a question about a repository |
//!
//! ## Examples
//!
//! ```bash
//! # Summarize a repository (clones and indexes on first use)
//! repolens analyze https://github.com/octocat/hello-world
//!
//! # Ask about the code; the cached index is reused
//! repolens ask https://github.com/octocat/hello-world "How is auth handled?"
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use repolens::engine::is_soft_error;
use repolens::models::SummaryOrigin;
use repolens::{config, Session};

/// RepoLens — ask natural-language questions about any git repository.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/repolens.example.toml` for a full example; a missing
/// file falls back to built-in defaults.
#[derive(Parser)]
#[command(
    name = "repolens",
    about = "Ask natural-language questions about any git repository",
    version,
    long_about = "RepoLens clones a repository once (shallow, cached), fragments and embeds \
    its source files into an in-memory vector index, and answers questions by retrieving the \
    most relevant fragments as chat-model context."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/repolens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Clone, index, and summarize a repository.
    ///
    /// Prints the repository summary, aggregate statistics, and whether
    /// the summary came from the chat model or the offline fallback.
    /// Idempotent — later runs reuse the cached checkout and index.
    Analyze {
        /// Repository URL (anything `git clone` accepts).
        url: String,
    },

    /// Answer a question about a repository.
    ///
    /// Prepares the repository first if this is its first use, then
    /// retrieves the most relevant fragments and asks the chat model.
    Ask {
        /// Repository URL (anything `git clone` accepts).
        url: String,

        /// The question to answer.
        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("repolens=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let session = Session::new(cfg)?;

    match cli.command {
        Commands::Analyze { url } => {
            let outcome = session.analyze(&url).await?;

            println!("{}", outcome.summary.text);
            println!();
            println!(
                "[{} files, {} functions, {} classes]",
                outcome.stats.total_files,
                outcome.stats.total_functions,
                outcome.stats.total_classes
            );
            if outcome.summary.origin == SummaryOrigin::Offline {
                println!("(offline summary — no chat backend available)");
            }
        }
        Commands::Ask { url, question } => {
            let outcome = session.ask(&url, &question).await?;

            println!("{}", outcome.answer);
            if !outcome.source_files.is_empty() && !is_soft_error(&outcome.answer) {
                println!();
                println!("Sources:");
                for path in &outcome.source_files {
                    println!("  - {}", path);
                }
            }
        }
    }

    Ok(())
}
