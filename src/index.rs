//! In-memory vector index with per-repository collections.
//!
//! Each repository id owns one named collection. A collection moves
//! through an explicit build state machine:
//!
//! ```text
//! Empty ──begin_build──▶ Building ──finish_build──▶ Ready
//!   ▲                        │
//!   └──────(fail_build clears entries)──▶ Failed
//! ```
//!
//! `Ready` is the only state queries serve from, so a half-built
//! collection is never visible as indexed. Entries are append-only; there
//! is no delete or incremental-update path — changes to the underlying
//! checkout are invisible to an existing collection by design.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};
use crate::models::{FragmentMeta, SearchHit};

/// Build/visibility state of one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    /// No collection exists for this id yet.
    Empty,
    /// A build is in flight; queries are refused.
    Building,
    /// Fully built (possibly with zero entries) and queryable.
    Ready,
    /// A build aborted; entries were discarded.
    Failed,
}

struct Collection {
    state: CollectionState,
    dims: Option<usize>,
    entries: Vec<IndexEntry>,
}

struct IndexEntry {
    fragment_id: String,
    vector: Vec<f32>,
    meta: FragmentMeta,
}

/// Process-wide vector store: named collections, batch add, k-NN query.
#[derive(Default)]
pub struct VectorIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, repo_id: &str) -> CollectionState {
        self.collections
            .read()
            .expect("index lock poisoned")
            .get(repo_id)
            .map(|c| c.state)
            .unwrap_or(CollectionState::Empty)
    }

    /// Number of entries in a `Ready` collection (0 otherwise).
    pub fn len(&self, repo_id: &str) -> usize {
        self.collections
            .read()
            .expect("index lock poisoned")
            .get(repo_id)
            .filter(|c| c.state == CollectionState::Ready)
            .map(|c| c.entries.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, repo_id: &str) -> bool {
        self.len(repo_id) == 0
    }

    /// Transition a collection to `Building`.
    ///
    /// Returns `Ok(false)` when the collection is already `Ready` — the
    /// caller must skip the build and reuse the existing entries. A build
    /// already in flight is an error; `Failed` collections may be rebuilt.
    pub fn begin_build(&self, repo_id: &str) -> Result<bool> {
        let mut collections = self.collections.write().expect("index lock poisoned");
        let collection = collections.entry(repo_id.to_string()).or_insert(Collection {
            state: CollectionState::Empty,
            dims: None,
            entries: Vec::new(),
        });

        match collection.state {
            CollectionState::Ready => Ok(false),
            CollectionState::Building => Err(Error::Index(format!(
                "collection {} is already being built",
                repo_id
            ))),
            CollectionState::Empty | CollectionState::Failed => {
                collection.state = CollectionState::Building;
                collection.entries.clear();
                collection.dims = None;
                Ok(true)
            }
        }
    }

    /// Append a batch of vectors to a collection under construction.
    pub fn add(
        &self,
        repo_id: &str,
        batch: Vec<(String, Vec<f32>, FragmentMeta)>,
    ) -> Result<()> {
        let mut collections = self.collections.write().expect("index lock poisoned");
        let collection = collections
            .get_mut(repo_id)
            .ok_or_else(|| Error::Index(format!("unknown collection: {}", repo_id)))?;

        if collection.state != CollectionState::Building {
            return Err(Error::Index(format!(
                "collection {} is not building (state {:?})",
                repo_id, collection.state
            )));
        }

        for (fragment_id, vector, meta) in batch {
            match collection.dims {
                None => collection.dims = Some(vector.len()),
                Some(dims) if dims != vector.len() => {
                    return Err(Error::Index(format!(
                        "dimension mismatch in {}: expected {}, got {}",
                        repo_id,
                        dims,
                        vector.len()
                    )));
                }
                Some(_) => {}
            }
            collection.entries.push(IndexEntry {
                fragment_id,
                vector,
                meta,
            });
        }

        Ok(())
    }

    /// Mark a building collection `Ready`. A zero-entry collection is a
    /// valid outcome (repository with no recognized files).
    pub fn finish_build(&self, repo_id: &str) -> Result<()> {
        self.transition(repo_id, CollectionState::Ready, false)
    }

    /// Abort a build: discard entries and mark the collection `Failed`,
    /// so it is either complete or absent — never partially visible.
    pub fn fail_build(&self, repo_id: &str) -> Result<()> {
        self.transition(repo_id, CollectionState::Failed, true)
    }

    fn transition(&self, repo_id: &str, to: CollectionState, clear: bool) -> Result<()> {
        let mut collections = self.collections.write().expect("index lock poisoned");
        let collection = collections
            .get_mut(repo_id)
            .ok_or_else(|| Error::Index(format!("unknown collection: {}", repo_id)))?;

        if collection.state != CollectionState::Building {
            return Err(Error::Index(format!(
                "collection {} is not building (state {:?})",
                repo_id, collection.state
            )));
        }

        if clear {
            collection.entries.clear();
            collection.dims = None;
        }
        collection.state = to;
        Ok(())
    }

    /// Drop a collection entirely, whatever its state. Used when the
    /// session cache evicts a repository.
    pub fn remove(&self, repo_id: &str) {
        self.collections
            .write()
            .expect("index lock poisoned")
            .remove(repo_id);
    }

    /// k-nearest-neighbor query over a `Ready` collection.
    ///
    /// Returns at most `k` hits ascending by cosine distance, ties broken
    /// by fragment id for determinism.
    pub fn query(&self, repo_id: &str, vector: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().expect("index lock poisoned");
        let collection = collections
            .get(repo_id)
            .ok_or_else(|| Error::Index(format!("unknown collection: {}", repo_id)))?;

        if collection.state != CollectionState::Ready {
            return Err(Error::Index(format!(
                "collection {} is not ready (state {:?})",
                repo_id, collection.state
            )));
        }

        let mut hits: Vec<SearchHit> = collection
            .entries
            .iter()
            .map(|entry| SearchHit {
                fragment_id: entry.fragment_id.clone(),
                meta: entry.meta.clone(),
                distance: 1.0 - cosine_similarity(vector, &entry.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.fragment_id.cmp(&b.fragment_id))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(path: &str) -> FragmentMeta {
        FragmentMeta {
            path: path.to_string(),
            start: 0,
            end: 10,
            extension: "py".to_string(),
            text: "text".to_string(),
        }
    }

    fn build_synthetic(index: &VectorIndex, repo: &str, vectors: &[(&str, Vec<f32>)]) {
        assert!(index.begin_build(repo).unwrap());
        let batch = vectors
            .iter()
            .map(|(id, v)| (id.to_string(), v.clone(), meta(id)))
            .collect();
        index.add(repo, batch).unwrap();
        index.finish_build(repo).unwrap();
    }

    #[test]
    fn exact_match_ranks_first_with_zero_distance() {
        let index = VectorIndex::new();
        build_synthetic(
            &index,
            "r1",
            &[
                ("a", vec![1.0, 0.0, 0.0]),
                ("b", vec![0.0, 1.0, 0.0]),
                ("c", vec![0.0, 0.0, 1.0]),
            ],
        );

        let hits = index.query("r1", &[0.0, 1.0, 0.0], 3).unwrap();
        assert_eq!(hits[0].fragment_id, "b");
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[test]
    fn result_count_is_min_of_k_and_n() {
        let index = VectorIndex::new();
        build_synthetic(&index, "r1", &[("a", vec![1.0, 0.0]), ("b", vec![0.0, 1.0])]);

        assert_eq!(index.query("r1", &[1.0, 0.0], 5).unwrap().len(), 2);
        assert_eq!(index.query("r1", &[1.0, 0.0], 1).unwrap().len(), 1);
    }

    #[test]
    fn distances_are_ascending() {
        let index = VectorIndex::new();
        build_synthetic(
            &index,
            "r1",
            &[
                ("far", vec![-1.0, 0.0]),
                ("near", vec![1.0, 0.1]),
                ("mid", vec![0.5, 0.5]),
            ],
        );

        let hits = index.query("r1", &[1.0, 0.0], 3).unwrap();
        let distances: Vec<f32> = hits.iter().map(|h| h.distance).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(hits[0].fragment_id, "near");
        assert_eq!(hits[2].fragment_id, "far");
    }

    #[test]
    fn ready_collection_short_circuits_rebuild() {
        let index = VectorIndex::new();
        build_synthetic(&index, "r1", &[("a", vec![1.0])]);

        // Second build request is refused; existing entries survive.
        assert!(!index.begin_build("r1").unwrap());
        assert_eq!(index.len("r1"), 1);
    }

    #[test]
    fn failed_build_leaves_no_entries_and_allows_rebuild() {
        let index = VectorIndex::new();
        assert!(index.begin_build("r1").unwrap());
        index
            .add("r1", vec![("a".into(), vec![1.0, 0.0], meta("a"))])
            .unwrap();
        index.fail_build("r1").unwrap();

        assert_eq!(index.state("r1"), CollectionState::Failed);
        assert!(index.query("r1", &[1.0, 0.0], 1).is_err());

        // Failed collections may be rebuilt from scratch.
        assert!(index.begin_build("r1").unwrap());
        index
            .add("r1", vec![("b".into(), vec![0.0, 1.0], meta("b"))])
            .unwrap();
        index.finish_build("r1").unwrap();
        let hits = index.query("r1", &[0.0, 1.0], 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fragment_id, "b");
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let index = VectorIndex::new();
        index.begin_build("r1").unwrap();
        index
            .add("r1", vec![("a".into(), vec![1.0, 0.0], meta("a"))])
            .unwrap();
        let result = index.add("r1", vec![("b".into(), vec![1.0], meta("b"))]);
        assert!(matches!(result, Err(Error::Index(_))));
    }

    #[test]
    fn building_collection_refuses_queries_and_concurrent_builds() {
        let index = VectorIndex::new();
        index.begin_build("r1").unwrap();
        assert!(index.query("r1", &[1.0], 1).is_err());
        assert!(index.begin_build("r1").is_err());
    }

    #[test]
    fn empty_ready_collection_is_queryable() {
        let index = VectorIndex::new();
        index.begin_build("r1").unwrap();
        index.finish_build("r1").unwrap();
        assert_eq!(index.query("r1", &[1.0], 4).unwrap().len(), 0);
        assert!(index.is_empty("r1"));
    }

    #[test]
    fn removed_collection_reverts_to_empty() {
        let index = VectorIndex::new();
        build_synthetic(&index, "r1", &[("a", vec![1.0])]);
        index.remove("r1");
        assert_eq!(index.state("r1"), CollectionState::Empty);
        assert!(index.begin_build("r1").unwrap());
    }

    #[test]
    fn unknown_collection_state_is_empty() {
        let index = VectorIndex::new();
        assert_eq!(index.state("nope"), CollectionState::Empty);
        assert!(index.query("nope", &[1.0], 1).is_err());
    }
}
