// src/services/fetcher.rs

//! Result fetcher: worker deployment and the paging API.
//!
//! One `ResultFetcher` serves one query. Construction deploys the first
//! workers; readers then page through the materialized results with
//! `one_result`, `next_result`, `one_image` or `complete_results`. Reads
//! that find their index empty may redeploy workers when the pool has gone
//! idle before the page could be filled.
//!
//! `next_result` and `one_image` share one read cursor and assume a single
//! consumer per fetcher.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::models::{
    Candidate, Config, ContentDomain, MediaSnippet, QueryParams, ResultEntry, SnippetMode,
};
use crate::pipeline::Ranked;
use crate::services::session::{Collaborators, Session};
use crate::services::{snippets, worker};
use crate::sources::SearchEvent;

/// Materializes the results of one query.
pub struct ResultFetcher {
    session: Arc<Session>,
    workers: Mutex<Vec<worker::WorkerHandle>>,
    deployments: AtomicUsize,
    next_worker_id: AtomicUsize,
    /// Read position of `next_result`
    cursor: AtomicUsize,
    started: Instant,
}

impl ResultFetcher {
    /// Create a fetcher and deploy its first workers.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(query: QueryParams, config: Config, services: Collaborators) -> Self {
        let session = Arc::new(Session::new(query, config, services));
        let fetcher = Self {
            session,
            workers: Mutex::new(Vec::new()),
            deployments: AtomicUsize::new(0),
            next_worker_id: AtomicUsize::new(0),
            cursor: AtomicUsize::new(0),
            started: Instant::now(),
        };

        let needed = fetcher.session.query.needed_results();
        fetcher.deploy_worker(fetcher.session.page_size(), needed);

        let started = fetcher.worker_count();
        fetcher.emit(
            format!("{started} online snippet fetch threads started"),
            started,
        );
        fetcher
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<worker::WorkerHandle>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand an event to the tracker; a failing tracker is logged and ignored.
    fn emit(&self, message: String, count: usize) {
        let mut event = SearchEvent::new(self.session.query.id.clone(), message, count);
        event.elapsed = self.started.elapsed();
        let events = &self.session.services.events;
        if panic::catch_unwind(AssertUnwindSafe(|| events.update(event))).is_err() {
            log::warn!("event tracker failed for query {}", self.session.query.id);
        }
    }

    /// Deploy workers unless at least one worker is alive.
    ///
    /// With online snippet fetching, `deploy_count` workers run in online
    /// mode (at least one, at most the configured maximum). Without it a
    /// single worker runs without snippets, or with cached snippets only
    /// when `offline_snippets` is configured. Returns whether workers were
    /// started.
    pub fn deploy_worker(&self, deploy_count: usize, needed_results: usize) -> bool {
        let config = &self.session.config.fetcher;
        let mut workers = self.lock_workers();
        if workers
            .iter()
            .any(|w| w.is_alive(config.liveness_window()))
        {
            return false;
        }
        workers.retain(|w| {
            if w.is_finished() {
                log::debug!("reaped result worker {} ({:?} snippets)", w.id, w.mode);
                return false;
            }
            true
        });

        let (count, mode) = if self.session.query.online_snippet_fetch {
            (deploy_count.min(config.max_workers).max(1), SnippetMode::Online)
        } else if config.offline_snippets {
            (1, SnippetMode::Offline)
        } else {
            (1, SnippetMode::None)
        };

        for _ in 0..count {
            let id = self.next_worker_id.fetch_add(1, Ordering::SeqCst);
            workers.push(worker::spawn(
                id,
                Arc::clone(&self.session),
                mode,
                needed_results,
            ));
        }
        let deployment = self.deployments.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!(
            "deployment {} of query {}: {} workers ({:?} snippets) for {} results",
            deployment,
            self.session.query.id,
            count,
            mode,
            needed_results
        );
        true
    }

    /// Whether any worker is running and recently active.
    pub fn any_worker_alive(&self) -> bool {
        let window = self.session.config.fetcher.liveness_window();
        self.lock_workers().iter().any(|w| w.is_alive(window))
    }

    /// Workers started and not yet reaped.
    pub fn worker_count(&self) -> usize {
        self.lock_workers().len()
    }

    /// Number of deployments that started workers.
    pub fn deployments(&self) -> usize {
        self.deployments.load(Ordering::SeqCst)
    }

    /// Result target of the page holding `index`.
    fn page_target(&self, index: usize) -> usize {
        let page_size = self.session.page_size();
        self.session
            .query
            .needed_results()
            .max((index / page_size + 1) * page_size)
    }

    /// Redeploy when the pool is idle, the store is short of `target` and
    /// the ranking engine still holds candidates nobody has taken.
    fn redeploy_if_idle(&self, target: usize) -> bool {
        let session = &self.session;
        let results = session.results.size();
        let images_short = session.query.content_domain == ContentDomain::Image
            && session.images.size() + session.config.fetcher.image_redeploy_slack < target;
        let short = images_short || results < target;
        let more = session.services.ranking.remaining() > 0;

        short && more && self.deploy_worker(session.page_size(), target)
    }

    /// Result at `index` in rank order.
    ///
    /// Waits while workers are alive and the index is not materialized. An
    /// idle pool is redeployed at most once per call. Returns `None` when
    /// the index stays empty after every worker has stopped.
    pub async fn one_result(&self, index: usize) -> Option<Arc<ResultEntry>> {
        let session = &self.session;
        self.emit(format!("one result {index}"), session.results.size());

        if let Some(ranked) = session.results.element(index) {
            return Some(ranked.element);
        }

        let target = self.page_target(index);
        let mut redeployed = self.redeploy_if_idle(target);
        let step = Duration::from_millis(session.config.fetcher.page_poll_step_ms)
            * u32::try_from(index % session.page_size() + 1).unwrap_or(u32::MAX);

        loop {
            let changed = session.changed.notified();
            let alive = self.any_worker_alive();
            if let Some(ranked) = session.results.element(index) {
                return Some(ranked.element);
            }
            if !alive {
                if !redeployed && self.redeploy_if_idle(target) {
                    redeployed = true;
                    continue;
                }
                log::debug!(
                    "query {}: no result at {} ({} materialized)",
                    session.query.id,
                    index,
                    session.results.size()
                );
                return None;
            }
            let _ = tokio::time::timeout(step, changed).await;
        }
    }

    /// Result at the read cursor; advances the cursor.
    ///
    /// Not meant for concurrent callers.
    pub async fn next_result(&self) -> Option<Arc<ResultEntry>> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.one_result(index).await
    }

    /// Media snippet at `index` in rank order.
    ///
    /// Images materialize while text results are consumed: every result
    /// taken through the read cursor contributes its media snippets.
    pub async fn one_image(&self, index: usize) -> Option<MediaSnippet> {
        let session = &self.session;
        loop {
            if let Some(ranked) = session.images.element(index) {
                return Some(ranked.element);
            }
            let entry = self.next_result().await?;
            if let Some(media) = entry.media_snippets() {
                for snippet in media {
                    if session.images.push(snippet.clone(), snippet.ranking) {
                        session.changed.notify_waiters();
                    }
                }
            }
        }
    }

    /// Wait until the page is filled, every worker stopped or `waiting`
    /// elapsed, then return all materialized results in rank order.
    pub async fn complete_results(&self, waiting: Duration) -> Vec<Arc<ResultEntry>> {
        let session = &self.session;
        let deadline = tokio::time::Instant::now() + waiting;
        let poll = session.config.fetcher.complete_poll_interval();
        let needed = session.query.needed_results();

        loop {
            let changed = session.changed.notified();
            let now = tokio::time::Instant::now();
            if session.results.size() >= needed || !self.any_worker_alive() || now >= deadline {
                break;
            }
            let _ = tokio::time::timeout_at((now + poll).min(deadline), changed).await;
        }

        self.results()
    }

    /// Snapshot of the materialized results in rank order.
    pub fn results(&self) -> Vec<Arc<ResultEntry>> {
        self.session
            .results
            .list()
            .into_iter()
            .map(|ranked| ranked.element)
            .collect()
    }

    /// Resolve one candidate outside the worker pool.
    ///
    /// Online failures are registered in this fetcher's failure registry.
    pub async fn fetch_snippet(
        &self,
        candidate: &Candidate,
        mode: SnippetMode,
    ) -> Result<ResultEntry> {
        snippets::fetch_snippet(&self.session, candidate, mode).await
    }

    pub fn query(&self) -> &QueryParams {
        &self.session.query
    }

    /// Results materialized so far.
    pub fn result_count(&self) -> usize {
        self.session.results.size()
    }

    /// Images materialized so far.
    pub fn image_count(&self) -> usize {
        self.session.images.size()
    }

    /// Materialized images with their ranking.
    pub fn images(&self) -> Vec<Ranked<MediaSnippet>> {
        self.session.images.list()
    }

    pub fn failure_count(&self) -> usize {
        self.session.failures.len()
    }

    /// Url hashes sorted out during the search, with their reason.
    pub fn failures(&self) -> HashMap<String, String> {
        self.session.failures.snapshot()
    }

    /// Accumulated metadata retrieval time of all materialized results.
    pub fn url_retrieval_time(&self) -> Duration {
        self.session.url_retrieval_time()
    }

    /// Accumulated snippet computation time of all materialized results.
    pub fn snippet_computation_time(&self) -> Duration {
        self.session.snippet_computation_time()
    }
}
