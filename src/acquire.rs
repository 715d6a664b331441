//! Repository acquisition: deterministic, cached shallow checkouts.
//!
//! A repository is identified by a hash of its URL. The first request for
//! a URL performs a depth-1 `git clone` into a temporary directory that is
//! atomically renamed into the cache slot; every later request returns the
//! cached checkout unconditionally. There is no freshness check and no
//! eviction — the cache exists for reproducibility, not currency.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::RepositorySnapshot;

/// Deterministic fixed-length identifier for a repository URL.
///
/// Stable across calls and processes; used both as the cache directory
/// name and as the vector-collection name.
pub fn repo_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

/// Return the cached snapshot for `url`, cloning it first if needed.
pub fn acquire(cache_dir: &Path, url: &str) -> Result<RepositorySnapshot> {
    let id = repo_id(url);
    let slot = cache_dir.join(&id);

    if slot.is_dir() {
        debug!(repo = %id, "using cached checkout");
        return Ok(RepositorySnapshot {
            id,
            url: url.to_string(),
            path: slot,
            acquired_at: Utc::now(),
        });
    }

    std::fs::create_dir_all(cache_dir)?;

    // Clone into a sibling of the slot so the final rename stays on one
    // filesystem and the slot only ever appears fully populated.
    let staging = cache_dir.join(format!(".tmp-{}-{}", id, uuid::Uuid::new_v4()));

    info!(repo = %id, url, "cloning repository (depth 1)");
    if let Err(e) = shallow_clone(url, &staging) {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(e);
    }

    if let Err(e) = std::fs::rename(&staging, &slot) {
        let _ = std::fs::remove_dir_all(&staging);
        return Err(Error::acquisition(url, format!("failed to move checkout into cache: {}", e)));
    }

    Ok(RepositorySnapshot {
        id,
        url: url.to_string(),
        path: slot,
        acquired_at: Utc::now(),
    })
}

fn shallow_clone(url: &str, dest: &Path) -> Result<()> {
    let output = Command::new("git")
        .args(["clone", "--depth", "1"])
        .arg(url)
        .arg(dest)
        .output()
        .map_err(|e| Error::acquisition(url, format!("failed to run git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::acquisition(url, format!("git clone failed: {}", stderr.trim())));
    }

    Ok(())
}
