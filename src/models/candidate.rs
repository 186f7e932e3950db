// src/models/candidate.rs

//! Candidate page references supplied by the ranking engine.

use url::Url;

use crate::utils::{components, url_hash};

/// Metadata of an indexed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMetadata {
    /// Page URL
    pub url: Url,

    /// Page title (may be empty)
    pub title: String,

    /// Number of image links on the page
    pub image_count: u32,

    /// Number of audio links on the page
    pub audio_count: u32,

    /// Number of video links on the page
    pub video_count: u32,

    /// Number of application links on the page
    pub app_count: u32,
}

impl PageMetadata {
    /// Create metadata for a page without media links.
    pub fn new(url: Url, title: impl Into<String>) -> Self {
        Self {
            url,
            title: title.into(),
            image_count: 0,
            audio_count: 0,
            video_count: 0,
            app_count: 0,
        }
    }

    /// Identity hash of the page.
    pub fn url_hash(&self) -> String {
        url_hash(&self.url)
    }

    /// Normalized URL string.
    pub fn normal_form(&self) -> String {
        components::normal_form(&self.url)
    }
}

/// Word-association data the base rank is computed from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordReference {
    pub url_hash: String,
    /// Occurrences of the query words in the page
    pub hit_count: u32,
    /// Distance between query words (0 for single-word queries)
    pub word_distance: u32,
    /// Position of the first hit
    pub position: u32,
}

/// A page reference awaiting snippet resolution.
#[derive(Debug, Clone)]
pub struct Candidate {
    url_hash: String,
    metadata: Option<PageMetadata>,
    word: WordReference,
}

impl Candidate {
    /// Create a candidate from page metadata.
    ///
    /// The word reference is re-keyed to the page's url hash.
    pub fn new(metadata: PageMetadata, mut word: WordReference) -> Self {
        let url_hash = metadata.url_hash();
        word.url_hash = url_hash.clone();
        Self {
            url_hash,
            metadata: Some(metadata),
            word,
        }
    }

    /// Create a candidate whose metadata could not be resolved.
    pub fn without_metadata(url_hash: impl Into<String>, word: WordReference) -> Self {
        Self {
            url_hash: url_hash.into(),
            metadata: None,
            word,
        }
    }

    pub fn url_hash(&self) -> &str {
        &self.url_hash
    }

    pub fn metadata(&self) -> Option<&PageMetadata> {
        self.metadata.as_ref()
    }

    pub fn word(&self) -> &WordReference {
        &self.word
    }
}
