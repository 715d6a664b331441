//! Error taxonomy for the repository analysis pipeline.
//!
//! Each variant corresponds to one external collaborator that can fail:
//! the git checkout, the embedding backend, the vector index, and the
//! chat model. Acquisition and build errors are fatal to the request that
//! triggered them; generation errors degrade gracefully (offline summary,
//! soft-error answer) and are only surfaced here when a caller invokes a
//! backend directly.

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Shallow checkout failed (network, auth, bad URL). Partial clone
    /// state has already been cleaned up when this is returned.
    #[error("repository acquisition failed for {url}: {reason}")]
    Acquisition { url: String, reason: String },

    /// The embedding backend is unavailable or returned a malformed
    /// response.
    #[error("embedding backend error: {0}")]
    Embedding(String),

    /// Vector index misuse: dimension mismatch, unknown collection, or an
    /// invalid build-state transition.
    #[error("vector index error: {0}")]
    Index(String),

    /// The language-model backend failed (timeout, quota, connectivity).
    #[error("generation backend error: {0}")]
    Generation(String),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn acquisition(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Acquisition {
            url: url.into(),
            reason: reason.into(),
        }
    }
}
