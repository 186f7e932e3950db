// src/services/worker.rs

//! Result workers.
//!
//! A worker is a tokio task that pulls candidates from the ranking engine,
//! resolves their snippets, scores them and pushes them into the result
//! store. It stops on its own at the deadline, once the store holds more
//! than its target, or when the candidate source runs dry. Nothing cancels
//! a running worker from outside.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::models::{Candidate, ContentDomain, SnippetMode};
use crate::pipeline::post_ranking;
use crate::services::session::Session;
use crate::services::snippets::fetch_snippet;

/// Last-activity timestamp of a worker.
#[derive(Debug)]
pub(crate) struct Heartbeat {
    epoch: Instant,
    last_ms: AtomicU64,
}

impl Heartbeat {
    pub(crate) fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    pub(crate) fn beat(&self) {
        let now = u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_ms.store(now, Ordering::Relaxed);
    }

    /// Time since the last beat.
    pub(crate) fn age(&self) -> Duration {
        let last = Duration::from_millis(self.last_ms.load(Ordering::Relaxed));
        self.epoch.elapsed().saturating_sub(last)
    }
}

/// Handle the fetcher keeps for every deployed worker.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    pub(crate) id: usize,
    pub(crate) mode: SnippetMode,
    heartbeat: Arc<Heartbeat>,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    /// Running and active within `window`.
    ///
    /// A task that still runs but has not beaten for longer than the window
    /// counts as dead.
    pub(crate) fn is_alive(&self, window: Duration) -> bool {
        !self.handle.is_finished() && self.heartbeat.age() < window
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

struct Worker {
    id: usize,
    session: Arc<Session>,
    mode: SnippetMode,
    /// Result count this worker fills up to
    needed: usize,
    heartbeat: Arc<Heartbeat>,
}

/// Start a worker on the current tokio runtime.
pub(crate) fn spawn(
    id: usize,
    session: Arc<Session>,
    mode: SnippetMode,
    needed: usize,
) -> WorkerHandle {
    let heartbeat = Arc::new(Heartbeat::new());
    let worker = Worker {
        id,
        session,
        mode,
        needed,
        heartbeat: Arc::clone(&heartbeat),
    };
    let handle = tokio::spawn(worker.run());

    WorkerHandle {
        id,
        mode,
        heartbeat,
        handle,
    }
}

impl Worker {
    async fn run(self) {
        let config = &self.session.config.fetcher;
        let deadline = Instant::now() + config.worker_lifetime();
        log::info!(
            "result worker {} started ({:?} snippets, target {})",
            self.id,
            self.mode,
            self.needed
        );

        let mut processed = 0usize;
        while Instant::now() < deadline {
            if self.session.results.size() > self.needed {
                break;
            }
            self.heartbeat.beat();
            if self.overshoot_reached() {
                break;
            }

            let Some(candidate) = self
                .session
                .services
                .ranking
                .take_candidate(config.take_timeout())
                .await
            else {
                log::debug!("result worker {}: candidate source exhausted", self.id);
                break;
            };
            if self.session.failures.contains(candidate.url_hash()) {
                continue;
            }

            let outcome = AssertUnwindSafe(self.process(&candidate))
                .catch_unwind()
                .await;
            if let Err(payload) = outcome {
                log::error!("{}", AppError::worker_fault(self.id, panic_message(&*payload)));
            }
            processed += 1;
        }

        log::info!(
            "result worker {} terminated after {} candidates",
            self.id,
            processed
        );
        self.session.changed.notify_waiters();
    }

    fn overshoot_reached(&self) -> bool {
        let fetcher = &self.session.config.fetcher;
        if self.session.query.content_domain == ContentDomain::Image {
            self.session.images.size() >= self.needed + fetcher.image_overshoot
        } else {
            self.session.results.size() >= self.needed + fetcher.result_overshoot
        }
    }

    async fn process(&self, candidate: &Candidate) {
        let session = &self.session;
        let entry = match fetch_snippet(session, candidate, self.mode).await {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("result worker {}: {}", self.id, e);
                return;
            }
        };
        if session.results.contains(entry.url_hash()) {
            return;
        }

        let ranking = &session.services.ranking;
        let score = ranking
            .base_rank(entry.word())
            .saturating_add(post_ranking(&entry, &ranking.topics(), &session.query));
        let entry = Arc::new(entry.with_ranking(score));

        if session.results.push(Arc::clone(&entry), score) {
            session.add_timings(entry.db_retrieval_time(), entry.snippet_computation_time());
            session.changed.notify_waiters();
            if session.query.topics_navigator() {
                ranking.add_topics(&entry);
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with unknown payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::models::{Config, PageMetadata, QueryParams, WordReference};
    use crate::services::session::Collaborators;
    use crate::sources::{MemoryRankingEngine, MemorySnippetLoader, RankingEngine, StaticPeer};

    fn session(engine: Arc<MemoryRankingEngine>, take_timeout_ms: u64) -> Arc<Session> {
        let loader = Arc::new(MemorySnippetLoader::new());
        let services =
            Collaborators::new(engine, loader.clone(), loader, Arc::new(StaticPeer::joined()));
        let mut config = Config::default();
        config.fetcher.take_timeout_ms = take_timeout_ms;
        Arc::new(Session::new(QueryParams::new("page"), config, services))
    }

    fn page(i: usize) -> Candidate {
        let url = Url::parse(&format!("https://example.com/page/{i}")).unwrap();
        Candidate::new(PageMetadata::new(url, format!("Page {i}")), WordReference::default())
    }

    #[test]
    fn test_heartbeat_age() {
        let heartbeat = Heartbeat::new();
        std::thread::sleep(Duration::from_millis(30));
        assert!(heartbeat.age() >= Duration::from_millis(30));
        heartbeat.beat();
        assert!(heartbeat.age() < Duration::from_millis(30));
    }

    #[test]
    fn test_panic_message() {
        let text: Box<dyn Any + Send> = Box::new("boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("bang"));
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*text), "boom");
        assert_eq!(panic_message(&*owned), "bang");
        assert_eq!(panic_message(&*other), "panic with unknown payload");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_drains_source_and_exits() {
        let engine = Arc::new(MemoryRankingEngine::with_candidates((0..5).map(page)));
        let session = session(Arc::clone(&engine), 50);

        let handle = spawn(0, Arc::clone(&session), SnippetMode::Online, 10);
        while !handle.is_finished() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(session.results.size(), 5);
        assert_eq!(engine.remaining(), 0);
        assert!(!handle.is_alive(Duration::from_secs(3)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_stops_above_target() {
        let engine = Arc::new(MemoryRankingEngine::with_candidates((0..20).map(page)));
        let session = session(Arc::clone(&engine), 50);

        let handle = spawn(0, Arc::clone(&session), SnippetMode::None, 3);
        while !handle.is_finished() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // a single worker checks before every take
        assert_eq!(session.results.size(), 4);
        assert_eq!(engine.remaining(), 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_skips_registered_failures() {
        let first = page(0);
        let engine = Arc::new(MemoryRankingEngine::with_candidates([first.clone(), page(1)]));
        let session = session(Arc::clone(&engine), 50);
        session.failures.register(first.url_hash(), "known bad");

        let handle = spawn(0, Arc::clone(&session), SnippetMode::Online, 10);
        while !handle.is_finished() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(session.results.size(), 1);
        assert!(!session.results.contains(first.url_hash()));
    }
}
