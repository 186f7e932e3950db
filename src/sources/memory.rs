//! In-process collaborators.
//!
//! Back the `replay` command and the tests: a ranking engine fed from a
//! queue, a snippet loader with scripted failures, and a fixed peer.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;
use url::Url;

use crate::error::Result;
use crate::models::{
    Candidate, ContentDomain, MediaSnippet, ResultEntry, TextSnippet, WordReference, codes,
};
use crate::pipeline::TopicMap;
use crate::sources::{
    MediaSnippetLoader, PeerIdentity, RankingEngine, TextSnippetLoader, TextSnippetRequest,
};
use crate::utils::components::title_components;
use crate::utils::url_hash;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ranking engine over an in-memory candidate queue.
///
/// Candidates can be pushed while workers are consuming.
#[derive(Debug, Default)]
pub struct MemoryRankingEngine {
    queue: Mutex<VecDeque<Candidate>>,
    arrived: Notify,
    known: AtomicUsize,
    topics: Mutex<TopicMap>,
}

impl MemoryRankingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine that already holds `candidates`, in order.
    pub fn with_candidates(candidates: impl IntoIterator<Item = Candidate>) -> Self {
        let engine = Self::new();
        for candidate in candidates {
            engine.push(candidate);
        }
        engine
    }

    /// Append a candidate to the stream.
    pub fn push(&self, candidate: Candidate) {
        lock(&self.queue).push_back(candidate);
        self.known.fetch_add(1, Ordering::SeqCst);
        self.arrived.notify_waiters();
    }

    fn pop(&self) -> Option<Candidate> {
        lock(&self.queue).pop_front()
    }
}

#[async_trait]
impl RankingEngine for MemoryRankingEngine {
    async fn take_candidate(&self, timeout: Duration) -> Option<Candidate> {
        let deadline = Instant::now() + timeout;
        loop {
            let arrived = self.arrived.notified();
            if let Some(candidate) = self.pop() {
                return Some(candidate);
            }
            if tokio::time::timeout_at(deadline, arrived).await.is_err() {
                return self.pop();
            }
        }
    }

    fn size(&self) -> usize {
        self.known.load(Ordering::SeqCst)
    }

    fn remaining(&self) -> usize {
        lock(&self.queue).len()
    }

    fn base_rank(&self, word: &WordReference) -> i64 {
        i64::from(word.hit_count) * 256
            - i64::from(word.word_distance) * 16
            - i64::from(word.position)
    }

    fn topics(&self) -> TopicMap {
        lock(&self.topics).clone()
    }

    fn add_topics(&self, entry: &ResultEntry) {
        let mut topics = lock(&self.topics);
        for word in title_components(entry.title()) {
            if word.chars().count() > 2 {
                *topics.entry(word).or_insert(0) += 1;
            }
        }
    }
}

/// Snippet loader with scripted outcomes per url hash.
///
/// Pages not marked as failing get their title as text snippet and the
/// media registered for them, if any.
#[derive(Debug, Default)]
pub struct MemorySnippetLoader {
    failing: HashSet<String>,
    media: HashMap<String, Vec<MediaSnippet>>,
    latency: Duration,
    reported: Mutex<Vec<String>>,
}

impl MemorySnippetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark pages whose snippets can never be produced.
    pub fn with_failing<I, S>(mut self, url_hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(url_hashes.into_iter().map(Into::into));
        self
    }

    /// Register media found on the page with `url_hash`.
    pub fn with_media(mut self, url_hash: impl Into<String>, media: Vec<MediaSnippet>) -> Self {
        self.media.insert(url_hash.into(), media);
        self
    }

    /// Delay every retrieval by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Url hashes passed to `report_failure`, in call order.
    pub fn reported_failures(&self) -> Vec<String> {
        lock(&self.reported).clone()
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl TextSnippetLoader for MemorySnippetLoader {
    async fn retrieve(&self, request: TextSnippetRequest<'_>) -> TextSnippet {
        self.simulate_latency().await;

        if self.failing.contains(&request.metadata.url_hash()) {
            return if request.online {
                TextSnippet::failed(codes::ERROR_NO_MATCH, "no matching snippet found")
            } else {
                TextSnippet::failed(codes::ERROR_SOURCE_LOADING, "resource not in cache")
            };
        }

        let source = if request.online {
            codes::SOURCE_WEB
        } else {
            codes::SOURCE_CACHE
        };
        let text: String = request
            .metadata
            .title
            .chars()
            .take(request.max_length)
            .collect();
        TextSnippet::found(text, source)
    }

    async fn report_failure(
        &self,
        _segment: &str,
        word: &WordReference,
        _snippet: &TextSnippet,
        _query_id: &str,
    ) -> Result<()> {
        lock(&self.reported).push(word.url_hash.clone());
        Ok(())
    }
}

#[async_trait]
impl MediaSnippetLoader for MemorySnippetLoader {
    async fn retrieve(
        &self,
        url: &Url,
        _query_hashes: &BTreeSet<String>,
        domain: ContentDomain,
        _online: bool,
        _timeout: Duration,
        _global: bool,
    ) -> Vec<MediaSnippet> {
        self.simulate_latency().await;

        let hash = url_hash(url);
        if self.failing.contains(&hash) {
            return Vec::new();
        }
        self.media
            .get(&hash)
            .map(|media| media.iter().filter(|m| m.domain == domain).cloned().collect())
            .unwrap_or_default()
    }
}

/// Peer with a fixed network status.
#[derive(Debug, Clone, Copy)]
pub struct StaticPeer {
    virgin: bool,
}

impl StaticPeer {
    /// A peer that has joined the network.
    pub fn joined() -> Self {
        Self { virgin: false }
    }

    /// A peer that has not joined the network.
    pub fn virgin() -> Self {
        Self { virgin: true }
    }
}

impl PeerIdentity for StaticPeer {
    fn is_virgin(&self) -> bool {
        self.virgin
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::PageMetadata;

    fn candidate(path: &str, hits: u32) -> Candidate {
        let url = Url::parse(&format!("https://example.com/{path}")).unwrap();
        Candidate::new(
            PageMetadata::new(url, path),
            WordReference {
                hit_count: hits,
                ..WordReference::default()
            },
        )
    }

    fn text_request<'a>(
        metadata: &'a PageMetadata,
        hashes: &'a BTreeSet<String>,
    ) -> TextSnippetRequest<'a> {
        TextSnippetRequest {
            metadata,
            query_hashes: hashes,
            online: true,
            index_of: false,
            max_length: 180,
            timeout: Duration::from_secs(1),
            global: false,
        }
    }

    #[tokio::test]
    async fn test_take_returns_in_order() {
        let engine = MemoryRankingEngine::with_candidates([candidate("a", 1), candidate("b", 2)]);
        assert_eq!(engine.size(), 2);

        let first = engine.take_candidate(Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.metadata().unwrap().title, "a");
        assert_eq!(engine.remaining(), 1);
        assert_eq!(engine.size(), 2);
    }

    #[tokio::test]
    async fn test_take_times_out_when_empty() {
        let engine = MemoryRankingEngine::new();
        let started = std::time::Instant::now();
        assert!(engine.take_candidate(Duration::from_millis(50)).await.is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_take_wakes_on_push() {
        let engine = Arc::new(MemoryRankingEngine::new());
        let consumer = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.take_candidate(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.push(candidate("late", 1));

        let taken = consumer.await.unwrap();
        assert_eq!(taken.unwrap().metadata().unwrap().title, "late");
    }

    #[test]
    fn test_base_rank_grows_with_hits() {
        let engine = MemoryRankingEngine::new();
        let few = WordReference {
            hit_count: 1,
            ..WordReference::default()
        };
        let many = WordReference {
            hit_count: 5,
            ..WordReference::default()
        };
        assert!(engine.base_rank(&many) > engine.base_rank(&few));
    }

    #[tokio::test]
    async fn test_scripted_text_failures() {
        let ok = candidate("ok", 1);
        let bad = candidate("bad", 1);
        let loader = MemorySnippetLoader::new().with_failing([bad.url_hash()]);
        let hashes = BTreeSet::new();

        let found =
            TextSnippetLoader::retrieve(&loader, text_request(ok.metadata().unwrap(), &hashes))
                .await;
        assert!(found.is_found());
        let failed =
            TextSnippetLoader::retrieve(&loader, text_request(bad.metadata().unwrap(), &hashes))
                .await;
        assert!(!failed.is_found());
    }

    #[test]
    fn test_peer_status() {
        assert!(StaticPeer::virgin().is_virgin());
        assert!(!StaticPeer::joined().is_virgin());
    }
}
