// src/sources/fixture.rs

//! JSON candidate fixtures for offline replays.
//!
//! ```json
//! {
//!   "query": "rust book",
//!   "items_per_page": 10,
//!   "candidates": [
//!     { "url": "https://doc.rust-lang.org/book/", "title": "The Rust Book", "hit_count": 4 },
//!     { "url": "https://example.com/broken", "title": "Broken", "fail": true }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Candidate, ContentDomain, MediaSnippet, PageMetadata, QueryParams, WordReference};
use crate::services::Collaborators;
use crate::sources::{MemoryRankingEngine, MemorySnippetLoader, StaticPeer};

/// A recorded query with its candidate stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fixture {
    pub query: String,

    #[serde(default)]
    pub domain: ContentDomain,

    #[serde(default = "default_online")]
    pub online: bool,

    #[serde(default)]
    pub offset: usize,

    #[serde(default = "default_items_per_page")]
    pub items_per_page: usize,

    /// Preference pattern, matched against whole URLs and titles
    #[serde(default)]
    pub prefer: Option<String>,

    /// Peer has not joined the network
    #[serde(default)]
    pub virgin: bool,

    pub candidates: Vec<FixtureCandidate>,
}

/// One candidate page in ranking order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureCandidate {
    /// Absent for candidates whose metadata is missing
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub hit_count: u32,

    #[serde(default)]
    pub word_distance: u32,

    #[serde(default)]
    pub position: u32,

    /// Snippet loading always fails for this page
    #[serde(default)]
    pub fail: bool,

    #[serde(default)]
    pub media: Vec<FixtureMedia>,
}

/// A media link found on a candidate page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureMedia {
    /// Link target, relative to the page URL
    pub href: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub domain: Option<ContentDomain>,

    #[serde(default)]
    pub ranking: i64,
}

fn default_online() -> bool {
    true
}

fn default_items_per_page() -> usize {
    10
}

impl Fixture {
    /// Load a fixture from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let fixture: Self = serde_json::from_str(&content)?;
        Ok(fixture)
    }

    /// Query parameters described by the fixture.
    pub fn query_params(&self) -> Result<QueryParams> {
        if self.items_per_page == 0 {
            return Err(AppError::validation("items_per_page must be at least 1"));
        }
        let query = QueryParams::new(&self.query)
            .with_content_domain(self.domain)
            .with_paging(self.offset, self.items_per_page)
            .with_online_snippet_fetch(self.online);
        match &self.prefer {
            Some(pattern) => query.with_prefer(pattern),
            None => Ok(query),
        }
    }

    /// Build in-memory collaborators that replay the candidate stream.
    pub fn collaborators(&self) -> Result<Collaborators> {
        let mut candidates = Vec::with_capacity(self.candidates.len());
        let mut loader = MemorySnippetLoader::new();

        for (i, recorded) in self.candidates.iter().enumerate() {
            let word = WordReference {
                url_hash: String::new(),
                hit_count: recorded.hit_count,
                word_distance: recorded.word_distance,
                position: recorded.position,
            };
            let Some(raw_url) = &recorded.url else {
                candidates.push(Candidate::without_metadata(format!("missing{i:05}"), word));
                continue;
            };

            let url = Url::parse(raw_url)?;
            let mut metadata = PageMetadata::new(url.clone(), &recorded.title);
            let mut media = Vec::with_capacity(recorded.media.len());
            for link in &recorded.media {
                let domain = link.domain.unwrap_or(ContentDomain::Image);
                match domain {
                    ContentDomain::Image => metadata.image_count += 1,
                    ContentDomain::Audio => metadata.audio_count += 1,
                    ContentDomain::Video => metadata.video_count += 1,
                    ContentDomain::App => metadata.app_count += 1,
                    ContentDomain::Text => {
                        return Err(AppError::validation(format!(
                            "media link {} of {} has text domain",
                            link.href, raw_url
                        )));
                    }
                }
                media.push(MediaSnippet {
                    domain,
                    href: url.join(&link.href)?,
                    name: link.name.clone(),
                    attr: String::new(),
                    ranking: link.ranking,
                    source: url.clone(),
                });
            }

            let candidate = Candidate::new(metadata, word);
            if recorded.fail {
                loader = loader.with_failing([candidate.url_hash()]);
            }
            if !media.is_empty() {
                loader = loader.with_media(candidate.url_hash(), media);
            }
            candidates.push(candidate);
        }

        let loader = Arc::new(loader);
        let peer = if self.virgin {
            StaticPeer::virgin()
        } else {
            StaticPeer::joined()
        };
        Ok(Collaborators::new(
            Arc::new(MemoryRankingEngine::with_candidates(candidates)),
            loader.clone(),
            loader,
            Arc::new(peer),
        ))
    }
}
