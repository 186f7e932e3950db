// src/services/session.rs

//! State shared by the fetcher and its workers for one query.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

use crate::models::{Config, MediaSnippet, QueryParams, ResultEntry};
use crate::pipeline::{FailureRegistry, SortedResultStore};
use crate::sources::{
    EventTracker, LogEventTracker, MediaSnippetLoader, PeerIdentity, RankingEngine,
    TextSnippetLoader,
};

/// External services a fetcher works against.
#[derive(Clone)]
pub struct Collaborators {
    pub ranking: Arc<dyn RankingEngine>,
    pub text_loader: Arc<dyn TextSnippetLoader>,
    pub media_loader: Arc<dyn MediaSnippetLoader>,
    pub peer: Arc<dyn PeerIdentity>,
    pub events: Arc<dyn EventTracker>,
}

impl Collaborators {
    /// Bundle collaborators; events go to the debug log.
    pub fn new(
        ranking: Arc<dyn RankingEngine>,
        text_loader: Arc<dyn TextSnippetLoader>,
        media_loader: Arc<dyn MediaSnippetLoader>,
        peer: Arc<dyn PeerIdentity>,
    ) -> Self {
        Self {
            ranking,
            text_loader,
            media_loader,
            peer,
            events: Arc::new(LogEventTracker),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventTracker>) -> Self {
        self.events = events;
        self
    }
}

pub(crate) struct Session {
    pub(crate) query: QueryParams,
    pub(crate) config: Config,
    pub(crate) services: Collaborators,
    pub(crate) results: SortedResultStore<Arc<ResultEntry>>,
    pub(crate) images: SortedResultStore<MediaSnippet>,
    pub(crate) failures: FailureRegistry,
    /// Query term hashes minus stopwords
    pub(crate) snippet_word_hashes: BTreeSet<String>,
    /// Signalled on every insert and every worker exit
    pub(crate) changed: Notify,
    url_retrieval_micros: AtomicU64,
    snippet_computation_micros: AtomicU64,
}

impl Session {
    pub(crate) fn new(query: QueryParams, config: Config, services: Collaborators) -> Self {
        let snippet_word_hashes = query.snippet_word_hashes(&config.stopwords);
        Self {
            query,
            config,
            services,
            results: SortedResultStore::new(),
            images: SortedResultStore::new(),
            failures: FailureRegistry::new(),
            snippet_word_hashes,
            changed: Notify::new(),
            url_retrieval_micros: AtomicU64::new(0),
            snippet_computation_micros: AtomicU64::new(0),
        }
    }

    pub(crate) fn add_timings(&self, url_retrieval: Duration, snippet_computation: Duration) {
        self.url_retrieval_micros
            .fetch_add(as_micros(url_retrieval), Ordering::Relaxed);
        self.snippet_computation_micros
            .fetch_add(as_micros(snippet_computation), Ordering::Relaxed);
    }

    pub(crate) fn url_retrieval_time(&self) -> Duration {
        Duration::from_micros(self.url_retrieval_micros.load(Ordering::Relaxed))
    }

    pub(crate) fn snippet_computation_time(&self) -> Duration {
        Duration::from_micros(self.snippet_computation_micros.load(Ordering::Relaxed))
    }

    /// Items per page, never zero.
    pub(crate) fn page_size(&self) -> usize {
        self.query.items_per_page.max(1)
    }
}

fn as_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}
