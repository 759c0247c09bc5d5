//! Index manager: the process-wide owner of the index.
//!
//! Holds the guard and the current snapshot version, runs rebuilds, serves
//! queries and owns the directory monitor. Construct one per process inside
//! a Tokio runtime and share it behind an `Arc`.

use crate::answer::{AnswerGenerator, LlmAnswerGenerator};
use crate::builder::IndexBuilder;
use crate::config::IndexConfig;
use crate::embeddings::{create_provider, EmbeddingProvider};
use crate::guard::IndexGuard;
use crate::query::{describe_failure, QueryEngine};
use crate::snapshot::SnapshotStore;
use crate::trigger::{DebouncedTrigger, ImmediateTrigger, RebuildTrigger, Rebuilder};
use crate::types::{BuildReport, BuildStatus, IndexStatus, Retrieval};
use crate::watcher::DirectoryWatcher;
use courier_core::{AppConfig, AppError, AppResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::instrument;

/// State shared with the watcher thread.
struct ManagerCore {
    config: IndexConfig,
    guard: IndexGuard,
    builder: IndexBuilder,
    query: QueryEngine,
    version: AtomicU64,
    runtime: Handle,
}

impl ManagerCore {
    #[instrument(name = "build_index", skip(self))]
    async fn build_index(&self) -> BuildReport {
        let start = Instant::now();
        let lease = match self.guard.acquire("build").await {
            Ok(lease) => lease,
            Err(e) => {
                let current = self.version.load(Ordering::SeqCst);
                tracing::error!(
                    "Could not take the index lease; snapshot v{} stays current: {}",
                    current,
                    e
                );
                return BuildReport::failed(current, start.elapsed().as_secs_f64(), e.to_string());
            }
        };

        // Another process may have built since we last looked
        let current = self.refresh_version().await;

        match self.builder.build(&lease, current).await {
            Ok(report) => {
                if report.status == BuildStatus::Built {
                    self.version.store(report.version, Ordering::SeqCst);
                    tracing::info!(
                        "Snapshot v{} is current ({} documents, {} chunks, {:.2}s)",
                        report.version,
                        report.document_count,
                        report.chunk_count,
                        report.duration_secs
                    );
                }
                report
            }
            Err(e) => {
                tracing::error!("Index build failed; snapshot v{} stays current: {}", current, e);
                BuildReport::failed(current, start.elapsed().as_secs_f64(), e.to_string())
            }
        }
    }

    /// Raise the in-memory version to the persisted one. Call with the lease held.
    async fn refresh_version(&self) -> u64 {
        let store = self.builder.store().clone();
        match tokio::task::spawn_blocking(move || store.current_version()).await {
            Ok(Ok(Some(on_disk))) => self.observe_version(on_disk),
            Ok(Ok(None)) => self.version.load(Ordering::SeqCst),
            Ok(Err(e)) => {
                tracing::warn!("Could not read persisted snapshot version: {}", e);
                self.version.load(Ordering::SeqCst)
            }
            Err(e) => {
                tracing::warn!("Snapshot version task failed: {}", e);
                self.version.load(Ordering::SeqCst)
            }
        }
    }

    /// Record a version seen on disk; the counter never moves backwards.
    fn observe_version(&self, version: u64) -> u64 {
        let previous = self.version.fetch_max(version, Ordering::SeqCst);
        if version > previous {
            tracing::info!("Snapshot v{} was built by another process", version);
        }
        previous.max(version)
    }
}

impl Rebuilder for ManagerCore {
    fn rebuild(&self) -> BuildReport {
        match Handle::try_current() {
            // Not on a runtime thread (notify backend, debounce worker)
            Err(_) => self.runtime.block_on(self.build_index()),
            Ok(current) if current.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| self.runtime.block_on(self.build_index()))
            }
            Ok(_) => BuildReport::failed(
                self.version.load(Ordering::SeqCst),
                0.0,
                "Synchronous rebuild requested from a current-thread runtime; await build_index instead"
                    .to_string(),
            ),
        }
    }
}

/// Owns the index and its directory monitor.
pub struct IndexManager {
    core: Arc<ManagerCore>,
    answerer: Option<Arc<dyn AnswerGenerator>>,
    watcher: Mutex<Option<DirectoryWatcher>>,
}

impl IndexManager {
    /// Create a manager. Must be called from within a Tokio runtime.
    ///
    /// The version counter is seeded from the snapshot already on disk.
    pub fn new(config: IndexConfig, provider: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        config.validate()?;

        let runtime = Handle::try_current().map_err(|_| {
            AppError::Other("IndexManager must be created inside a Tokio runtime".to_string())
        })?;

        let guard = IndexGuard::new(&config.persist_dir);
        let builder = IndexBuilder::new(config.clone(), Arc::clone(&provider));
        let store = builder.store().clone();
        let query = QueryEngine::new(guard.clone(), store.clone(), provider);

        let version = seed_version(&store);
        tracing::debug!(
            "Index manager for {:?} starting at snapshot v{}",
            config.source_dir,
            version
        );

        Ok(Self {
            core: Arc::new(ManagerCore {
                config,
                guard,
                builder,
                query,
                version: AtomicU64::new(version),
                runtime,
            }),
            answerer: None,
            watcher: Mutex::new(None),
        })
    }

    /// Create a manager with the configured embedding provider and
    /// answer-generation model.
    pub fn from_app_config(app: &AppConfig) -> AppResult<Self> {
        let config = IndexConfig::from_app_config(app)?;
        let provider = create_provider(&config.embedding)?;
        let client = courier_llm::create_client(&app.llm.provider, app.llm.endpoint.as_deref())?;
        let answerer = LlmAnswerGenerator::new(client, app.llm.model.clone(), app.llm.temperature);

        Ok(Self::new(config, provider)?.with_answer_generator(Arc::new(answerer)))
    }

    pub fn with_answer_generator(mut self, answerer: Arc<dyn AnswerGenerator>) -> Self {
        self.answerer = Some(answerer);
        self
    }

    pub fn config(&self) -> &IndexConfig {
        &self.core.config
    }

    /// The guard shared by rebuilds and queries.
    pub fn guard(&self) -> &IndexGuard {
        &self.core.guard
    }

    /// Version of the current snapshot (0 = none built).
    pub fn version(&self) -> u64 {
        self.core.version.load(Ordering::SeqCst)
    }

    /// Rebuild the index from the current directory contents.
    ///
    /// Never fails: errors are reported through `BuildStatus::Failed` and
    /// the previous snapshot stays current.
    pub async fn build_index(&self) -> BuildReport {
        self.core.build_index().await
    }

    /// Retrieve the nearest chunks for `query`.
    pub async fn retrieve(&self, query: &str, k: usize) -> AppResult<Retrieval> {
        let retrieval = self.core.query.retrieve(query, k).await?;
        self.core.observe_version(retrieval.version);
        Ok(retrieval)
    }

    /// Context for `query` joined into one string, or a readable error.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn query_documents(&self, query: &str, k: usize) -> String {
        match self.retrieve(query, k).await {
            Ok(retrieval) => retrieval.context(),
            Err(e) => {
                tracing::warn!("Query failed: {}", e);
                describe_failure(&e)
            }
        }
    }

    /// Answer `query` from the top-`k` chunks, or a readable error.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn answer(&self, query: &str, k: usize) -> String {
        let Some(answerer) = self.answerer.as_ref() else {
            return "ERROR: answer generation is not configured".to_string();
        };

        let retrieval = match self.retrieve(query, k).await {
            Ok(retrieval) => retrieval,
            Err(e) => {
                tracing::warn!("Retrieval for answer failed: {}", e);
                return describe_failure(&e);
            }
        };

        match answerer.generate(query, &retrieval.context()).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("Answer generation failed: {}", e);
                format!("ERROR: answer generation failed: {}", e)
            }
        }
    }

    /// Start watching the source directory. A no-op if already running.
    pub fn start_file_monitor(&self) -> AppResult<()> {
        let mut slot = self.lock_watcher();
        if slot.as_ref().is_some_and(|w| w.is_running()) {
            tracing::warn!("File monitor is already running");
            return Ok(());
        }

        let rebuilder: Arc<dyn Rebuilder> = self.core.clone();
        let trigger: Arc<dyn RebuildTrigger> = match self.core.config.debounce {
            Some(window) => Arc::new(DebouncedTrigger::new(rebuilder, window)),
            None => Arc::new(ImmediateTrigger::new(rebuilder)),
        };

        let mut watcher = DirectoryWatcher::new(
            self.core.config.source_dir.clone(),
            self.core.config.filter.clone(),
            trigger,
        );
        watcher.start()?;

        *slot = Some(watcher);
        Ok(())
    }

    /// Stop watching. A rebuild already in progress runs to completion.
    pub fn stop_file_monitor(&self) {
        match self.lock_watcher().take() {
            Some(mut watcher) => watcher.stop(),
            None => tracing::warn!("File monitor is not running"),
        }
    }

    pub fn is_watching(&self) -> bool {
        self.lock_watcher()
            .as_ref()
            .is_some_and(|w| w.is_running())
    }

    /// Version, monitor state and a summary of the persisted snapshot.
    pub async fn status(&self) -> IndexStatus {
        let snapshot = match self.core.guard.acquire("status").await {
            Err(e) => {
                tracing::warn!("Could not take the index lease: {}", e);
                None
            }
            Ok(_lease) => {
                let store = self.core.builder.store().clone();
                match tokio::task::spawn_blocking(move || store.load()).await {
                    Ok(Ok(snapshot)) => snapshot.map(|s| s.summary()),
                    Ok(Err(e)) => {
                        tracing::warn!("Could not read snapshot: {}", e);
                        None
                    }
                    Err(e) => {
                        tracing::warn!("Snapshot read task failed: {}", e);
                        None
                    }
                }
            }
        };

        if let Some(summary) = &snapshot {
            self.core.observe_version(summary.version);
        }

        IndexStatus {
            version: self.version(),
            watching: self.is_watching(),
            source_dir: self.core.config.source_dir.clone(),
            persist_dir: self.core.config.persist_dir.clone(),
            snapshot,
        }
    }

    fn lock_watcher(&self) -> MutexGuard<'_, Option<DirectoryWatcher>> {
        match self.watcher.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn seed_version(store: &SnapshotStore) -> u64 {
    match store.current_version() {
        Ok(Some(version)) => version,
        Ok(None) => 0,
        Err(e) => {
            tracing::warn!("Ignoring unreadable snapshot: {}", e);
            0
        }
    }
}
