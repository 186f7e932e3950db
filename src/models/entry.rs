// src/models/entry.rs

//! Materialized results and their snippets.

use std::time::Duration;

use url::Url;

use crate::models::{ContentDomain, PageMetadata, WordReference};
use crate::utils::url_hash;

/// Error codes below this value mean the snippet was found.
pub const SNIPPET_ERROR_THRESHOLD: u32 = 11;

/// Snippet status codes reported by text snippet loaders.
pub mod codes {
    pub const SOURCE_CACHE: u32 = 0;
    pub const SOURCE_WEB: u32 = 1;
    pub const SOURCE_METADATA: u32 = 2;
    pub const SOURCE_NONE: u32 = 10;
    pub const ERROR_SOURCE_LOADING: u32 = 11;
    pub const ERROR_RESOURCE_LOADING: u32 = 12;
    pub const ERROR_PARSER_FAILED: u32 = 13;
    pub const ERROR_PARSER_NO_LINES: u32 = 14;
    pub const ERROR_NO_MATCH: u32 = 15;
    pub const ERROR_TIMEOUT: u32 = 16;
}

/// A text snippet, or the reason none could be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSnippet {
    pub error_code: u32,
    pub error: String,
    pub text: String,
}

impl TextSnippet {
    pub fn found(text: impl Into<String>, source: u32) -> Self {
        Self {
            error_code: source,
            error: String::new(),
            text: text.into(),
        }
    }

    pub fn failed(error_code: u32, error: impl Into<String>) -> Self {
        Self {
            error_code,
            error: error.into(),
            text: String::new(),
        }
    }

    pub fn is_found(&self) -> bool {
        self.error_code < SNIPPET_ERROR_THRESHOLD
    }
}

/// A media fragment found on a result page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSnippet {
    pub domain: ContentDomain,
    /// Link to the media object
    pub href: Url,
    pub name: String,
    /// Free-form attribute text, e.g. dimensions
    pub attr: String,
    /// Intrinsic rank, e.g. derived from pixel size
    pub ranking: i64,
    /// Page the media was found on
    pub source: Url,
}

impl MediaSnippet {
    pub fn href_hash(&self) -> String {
        url_hash(&self.href)
    }
}

/// The snippet attached to a result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Snippet {
    #[default]
    None,
    Text(TextSnippet),
    Media(Vec<MediaSnippet>),
}

/// A result enriched with its snippet, ready to be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEntry {
    url_hash: String,
    metadata: PageMetadata,
    word: WordReference,
    snippet: Snippet,
    db_retrieval_time: Duration,
    snippet_computation_time: Duration,
    ranking: i64,
}

impl ResultEntry {
    pub fn new(
        url_hash: impl Into<String>,
        metadata: PageMetadata,
        word: WordReference,
        snippet: Snippet,
        db_retrieval_time: Duration,
        snippet_computation_time: Duration,
    ) -> Self {
        Self {
            url_hash: url_hash.into(),
            metadata,
            word,
            snippet,
            db_retrieval_time,
            snippet_computation_time,
            ranking: 0,
        }
    }

    /// Seal the entry with its final score.
    pub fn with_ranking(mut self, ranking: i64) -> Self {
        self.ranking = ranking;
        self
    }

    pub fn url_hash(&self) -> &str {
        &self.url_hash
    }

    pub fn url(&self) -> &Url {
        &self.metadata.url
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    pub fn metadata(&self) -> &PageMetadata {
        &self.metadata
    }

    pub fn word(&self) -> &WordReference {
        &self.word
    }

    pub fn snippet(&self) -> &Snippet {
        &self.snippet
    }

    pub fn text_snippet(&self) -> Option<&TextSnippet> {
        match &self.snippet {
            Snippet::Text(snippet) => Some(snippet),
            _ => None,
        }
    }

    pub fn media_snippets(&self) -> Option<&[MediaSnippet]> {
        match &self.snippet {
            Snippet::Media(media) => Some(media),
            _ => None,
        }
    }

    pub fn db_retrieval_time(&self) -> Duration {
        self.db_retrieval_time
    }

    pub fn snippet_computation_time(&self) -> Duration {
        self.snippet_computation_time
    }

    pub fn ranking(&self) -> i64 {
        self.ranking
    }

    /// Number of links of the given media domain on the page.
    pub fn media_link_count(&self, domain: ContentDomain) -> u32 {
        match domain {
            ContentDomain::Text => 0,
            ContentDomain::Image => self.metadata.image_count,
            ContentDomain::Audio => self.metadata.audio_count,
            ContentDomain::Video => self.metadata.video_count,
            ContentDomain::App => self.metadata.app_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(snippet: Snippet) -> ResultEntry {
        let mut metadata =
            PageMetadata::new(Url::parse("https://example.com/x").unwrap(), "Example");
        metadata.image_count = 4;
        ResultEntry::new(
            metadata.url_hash(),
            metadata,
            WordReference::default(),
            snippet,
            Duration::from_millis(1),
            Duration::from_millis(2),
        )
    }

    #[test]
    fn test_snippet_threshold() {
        assert!(TextSnippet::found("text", codes::SOURCE_CACHE).is_found());
        assert!(TextSnippet::failed(codes::SOURCE_NONE, "").is_found());
        assert!(!TextSnippet::failed(codes::ERROR_NO_MATCH, "no match").is_found());
    }

    #[test]
    fn test_snippet_accessors() {
        let text = sample_entry(Snippet::Text(TextSnippet::found("hello", codes::SOURCE_WEB)));
        assert!(text.text_snippet().is_some());
        assert!(text.media_snippets().is_none());

        let bare = sample_entry(Snippet::None);
        assert!(bare.text_snippet().is_none());
        assert!(bare.media_snippets().is_none());
    }

    #[test]
    fn test_with_ranking_and_media_counts() {
        let entry = sample_entry(Snippet::None).with_ranking(42);
        assert_eq!(entry.ranking(), 42);
        assert_eq!(entry.media_link_count(ContentDomain::Image), 4);
        assert_eq!(entry.media_link_count(ContentDomain::Text), 0);
    }
}
