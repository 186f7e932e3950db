//! Collaborators the result fetcher consumes.
//!
//! - `RankingEngine`: ordered, still-growing candidate stream and base ranks
//! - `TextSnippetLoader` / `MediaSnippetLoader`: snippet extraction
//! - `PeerIdentity`: whether this peer has joined the network
//! - `EventTracker`: fire-and-forget telemetry
//!
//! `memory` holds in-process implementations used by the CLI and tests;
//! `fixture` builds them from recorded JSON queries.

pub mod fixture;
pub mod memory;

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use crate::error::Result;
use crate::models::{
    Candidate, ContentDomain, MediaSnippet, PageMetadata, ResultEntry, TextSnippet, WordReference,
};
use crate::pipeline::TopicMap;

pub use fixture::Fixture;
pub use memory::{MemoryRankingEngine, MemorySnippetLoader, StaticPeer};

/// Source of ranked candidates for one query.
#[async_trait]
pub trait RankingEngine: Send + Sync {
    /// Take the next candidate, waiting at most `timeout` for one to arrive.
    ///
    /// Safe to call from several workers at once.
    async fn take_candidate(&self, timeout: Duration) -> Option<Candidate>;

    /// Number of candidates known so far, taken or not.
    fn size(&self) -> usize;

    /// Number of candidates not taken yet.
    fn remaining(&self) -> usize;

    /// Base rank derived from the candidate's word-association data.
    fn base_rank(&self, word: &WordReference) -> i64;

    /// Current topic word frequencies.
    fn topics(&self) -> TopicMap;

    /// Feed a materialized entry into topic navigation.
    fn add_topics(&self, entry: &ResultEntry);
}

/// Parameters of one text snippet request.
#[derive(Debug, Clone)]
pub struct TextSnippetRequest<'a> {
    pub metadata: &'a PageMetadata,
    pub query_hashes: &'a BTreeSet<String>,
    pub online: bool,
    /// Restrict to directory listings
    pub index_of: bool,
    pub max_length: usize,
    pub timeout: Duration,
    pub global: bool,
}

/// Text snippet extraction.
#[async_trait]
pub trait TextSnippetLoader: Send + Sync {
    async fn retrieve(&self, request: TextSnippetRequest<'_>) -> TextSnippet;

    /// Tell the index that a page failed to produce a snippet.
    async fn report_failure(
        &self,
        segment: &str,
        word: &WordReference,
        snippet: &TextSnippet,
        query_id: &str,
    ) -> Result<()>;
}

/// Media snippet extraction.
#[async_trait]
pub trait MediaSnippetLoader: Send + Sync {
    /// Media fragments of the page at `url`; empty when none were found.
    async fn retrieve(
        &self,
        url: &Url,
        query_hashes: &BTreeSet<String>,
        domain: ContentDomain,
        online: bool,
        timeout: Duration,
        global: bool,
    ) -> Vec<MediaSnippet>;
}

/// Identity of the local peer.
pub trait PeerIdentity: Send + Sync {
    /// A virgin peer has not joined the network yet.
    fn is_virgin(&self) -> bool;
}

/// A search progress event.
#[derive(Debug, Clone)]
pub struct SearchEvent {
    pub query_id: String,
    pub message: String,
    pub count: usize,
    pub elapsed: Duration,
    pub at: DateTime<Utc>,
}

impl SearchEvent {
    pub fn new(query_id: impl Into<String>, message: impl Into<String>, count: usize) -> Self {
        Self {
            query_id: query_id.into(),
            message: message.into(),
            count,
            elapsed: Duration::ZERO,
            at: Utc::now(),
        }
    }
}

/// Fire-and-forget telemetry sink.
pub trait EventTracker: Send + Sync {
    fn update(&self, event: SearchEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventTracker;

impl EventTracker for NoopEventTracker {
    fn update(&self, _event: SearchEvent) {}
}

/// Writes events to the debug log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventTracker;

impl EventTracker for LogEventTracker {
    fn update(&self, event: SearchEvent) {
        log::debug!(
            "[{}] query {}: {} ({} items, {:?})",
            event.at.format("%H:%M:%S%.3f"),
            event.query_id,
            event.message,
            event.count,
            event.elapsed
        );
    }
}
