//! Session orchestration: the two public operations, `analyze` and `ask`.
//!
//! A [`Session`] owns the whole pipeline — checkout cache, embedding
//! provider, vector index, chat backend — and a per-repository context
//! cache in front of it. Preparing a repository (clone, fragment, embed,
//! index, summarize) happens at most once per process per URL; concurrent
//! requests for the same URL serialize on a per-repository lock while
//! different URLs build in parallel.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

use crate::acquire::{acquire, repo_id};
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::engine::answer_question;
use crate::error::Result;
use crate::fragment::fragment_repository;
use crate::index::VectorIndex;
use crate::llm::{create_backend, ChatBackend};
use crate::models::{AnalyzeOutcome, AskOutcome, RepoStats, RepositorySnapshot, Summary};
use crate::structure::{extract_symbols, SymbolTable};
use crate::summarize::{generate_summary, load_readme, top_level_listing};

/// Fragments embedded per backend call.
const EMBED_BATCH: usize = 64;

/// Everything known about one prepared repository.
#[derive(Clone)]
pub struct RepoContext {
    pub snapshot: RepositorySnapshot,
    pub readme: String,
    pub summary: Summary,
    pub stats: RepoStats,
    pub symbols: Arc<SymbolTable>,
}

/// When the context cache drops entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Entries live for the process lifetime.
    Unbounded,
    /// At most `capacity` entries; the least recently used one is dropped.
    Lru { capacity: usize },
}

impl EvictionPolicy {
    fn from_limit(max_cached_repos: Option<usize>) -> Self {
        match max_cached_repos {
            Some(capacity) if capacity > 0 => Self::Lru { capacity },
            _ => Self::Unbounded,
        }
    }
}

/// LRU-ish cache of prepared repository contexts.
///
/// Intentionally small: a map plus an access-order queue, guarded by one
/// mutex. Eviction reports the dropped id so the session can also drop
/// the matching vector collection.
struct RepoCache {
    policy: EvictionPolicy,
    inner: Mutex<RepoCacheInner>,
}

#[derive(Default)]
struct RepoCacheInner {
    entries: HashMap<String, Arc<RepoContext>>,
    // Front = least recently used.
    order: VecDeque<String>,
}

impl RepoCache {
    fn new(policy: EvictionPolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(RepoCacheInner::default()),
        }
    }

    fn get(&self, id: &str) -> Option<Arc<RepoContext>> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let context = inner.entries.get(id).cloned()?;
        inner.order.retain(|k| k != id);
        inner.order.push_back(id.to_string());
        Some(context)
    }

    /// Insert a context; returns the evicted id, if any.
    fn insert(&self, id: &str, context: Arc<RepoContext>) -> Option<String> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.insert(id.to_string(), context);
        inner.order.retain(|k| k != id);
        inner.order.push_back(id.to_string());

        if let EvictionPolicy::Lru { capacity } = self.policy {
            if inner.entries.len() > capacity {
                if let Some(victim) = inner.order.pop_front() {
                    inner.entries.remove(&victim);
                    return Some(victim);
                }
            }
        }
        None
    }

    fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").entries.len()
    }
}

/// A long-lived handle over the pipeline. Cheap to share behind an `Arc`;
/// all methods take `&self`.
pub struct Session {
    cache_dir: PathBuf,
    config: Config,
    embedder: Box<dyn EmbeddingProvider>,
    backend: Box<dyn ChatBackend>,
    index: VectorIndex,
    contexts: RepoCache,
    // One async lock per repository id so concurrent prepares of the same
    // URL serialize instead of racing the index state machine.
    build_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Session {
    pub fn new(config: Config) -> Result<Self> {
        let embedder = create_provider(&config.embedding)?;
        let backend = create_backend(&config.llm)?;
        Ok(Self::with_components(config, embedder, backend))
    }

    /// Assemble a session from explicit components. Lets tests substitute
    /// in-process providers and backends.
    pub fn with_components(
        config: Config,
        embedder: Box<dyn EmbeddingProvider>,
        backend: Box<dyn ChatBackend>,
    ) -> Self {
        let policy = EvictionPolicy::from_limit(config.session.max_cached_repos);
        Self {
            cache_dir: config.cache.dir.clone(),
            config,
            embedder,
            backend,
            index: VectorIndex::new(),
            contexts: RepoCache::new(policy),
            build_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Number of repositories currently held in the context cache.
    pub fn cached_repos(&self) -> usize {
        self.contexts.len()
    }

    fn build_lock(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.build_locks
            .lock()
            .expect("build lock map poisoned")
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    /// Ensure a repository is cloned, indexed, and summarized; returns its
    /// cached context. Subsequent calls for the same URL are cache hits
    /// and touch no backend.
    #[instrument(skip(self), fields(repo = %repo_id(url)))]
    pub async fn prepare(&self, url: &str) -> Result<Arc<RepoContext>> {
        let id = repo_id(url);

        let lock = self.build_lock(&id);
        let _guard = lock.lock().await;

        if let Some(context) = self.contexts.get(&id) {
            debug!("context cache hit");
            return Ok(context);
        }

        let snapshot = acquire(&self.cache_dir, url)?;

        if self.index.begin_build(&id)? {
            if let Err(e) = self.build_collection(&id, &snapshot).await {
                self.index.fail_build(&id)?;
                return Err(e);
            }
            self.index.finish_build(&id)?;
        } else {
            debug!("vector collection already built");
        }

        let symbols = extract_symbols(&snapshot.path, &self.config.fragmenting)?;
        let stats = symbols.stats();
        let readme = load_readme(&snapshot.path);
        let listing = top_level_listing(&snapshot.path);
        let summary =
            generate_summary(self.backend.as_ref(), &readme, &listing, &stats).await;

        info!(
            files = stats.total_files,
            fragments = self.index.len(&id),
            origin = ?summary.origin,
            "repository prepared"
        );

        let context = Arc::new(RepoContext {
            snapshot,
            readme,
            summary,
            stats,
            symbols: Arc::new(symbols),
        });
        if let Some(evicted) = self.contexts.insert(&id, context.clone()) {
            debug!(repo = %evicted, "evicted cached repository");
            self.index.remove(&evicted);
            // In-flight holders keep their Arc; a later prepare re-creates
            // the entry.
            self.build_locks
                .lock()
                .expect("build lock map poisoned")
                .remove(&evicted);
        }

        Ok(context)
    }

    async fn build_collection(&self, id: &str, snapshot: &RepositorySnapshot) -> Result<()> {
        let fragments = fragment_repository(&snapshot.path, &self.config.fragmenting)?;
        info!(fragments = fragments.len(), "embedding repository");

        for batch in fragments.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|f| f.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            let entries = batch
                .iter()
                .zip(vectors)
                .map(|(fragment, vector)| (fragment.id.clone(), vector, fragment.meta()))
                .collect();
            self.index.add(id, entries)?;
        }
        Ok(())
    }

    /// First-load view of a repository: summary, README, and statistics.
    pub async fn analyze(&self, url: &str) -> Result<AnalyzeOutcome> {
        let context = self.prepare(url).await?;
        Ok(AnalyzeOutcome {
            summary: context.summary.clone(),
            readme: context.readme.clone(),
            stats: context.stats.clone(),
        })
    }

    /// Answer a question about a repository, preparing it first if needed.
    pub async fn ask(&self, url: &str, question: &str) -> Result<AskOutcome> {
        let context = self.prepare(url).await?;
        answer_question(
            question,
            &context.snapshot.id,
            &context.summary,
            &context.symbols,
            self.embedder.as_ref(),
            &self.index,
            self.backend.as_ref(),
            self.config.retrieval.top_k,
        )
        .await
    }
}
