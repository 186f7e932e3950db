// src/models/query.rs

//! Query parameters of one search execution.

use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::utils::{word_hash, words_to_hashes};

/// Content classification of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentDomain {
    #[default]
    Text,
    Image,
    Audio,
    Video,
    App,
}

impl ContentDomain {
    /// Whether results of this domain carry media snippets.
    pub fn is_media(self) -> bool {
        !matches!(self, ContentDomain::Text)
    }
}

impl fmt::Display for ContentDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentDomain::Text => "text",
            ContentDomain::Image => "image",
            ContentDomain::Audio => "audio",
            ContentDomain::Video => "video",
            ContentDomain::App => "app",
        };
        f.write_str(name)
    }
}

/// How aggressively a worker fetches snippets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetMode {
    /// Do not fetch snippets
    None = 0,
    /// Use locally cached documents only; failures are tolerated
    Offline = 1,
    /// Load documents from the web; failures reject the candidate
    Online = 2,
}

impl SnippetMode {
    pub fn allows_online(self) -> bool {
        self == SnippetMode::Online
    }
}

/// Bit-shift coefficients of the post-ranking heuristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingProfile {
    #[serde(default = "defaults::media")]
    pub coeff_cathasimage: u8,
    #[serde(default = "defaults::media")]
    pub coeff_cathasaudio: u8,
    #[serde(default = "defaults::media")]
    pub coeff_cathasvideo: u8,
    #[serde(default = "defaults::media")]
    pub coeff_cathasapp: u8,

    /// Bonus exponent for matches of the preference pattern
    #[serde(default = "defaults::prefer")]
    pub coeff_prefer: u8,

    /// Exponent for URL components found in the topic list
    #[serde(default = "defaults::urlcompintoplist")]
    pub coeff_urlcompintoplist: u8,

    /// Exponent for title components found in the topic list
    #[serde(default = "defaults::descrcompintoplist")]
    pub coeff_descrcompintoplist: u8,

    /// Exponent for query terms appearing in the URL
    #[serde(default = "defaults::appurl")]
    pub coeff_appurl: u8,

    /// Exponent for query terms appearing in the title
    #[serde(default = "defaults::app_dc_title")]
    pub coeff_app_dc_title: u8,
}

impl Default for RankingProfile {
    fn default() -> Self {
        Self {
            coeff_cathasimage: defaults::media(),
            coeff_cathasaudio: defaults::media(),
            coeff_cathasvideo: defaults::media(),
            coeff_cathasapp: defaults::media(),
            coeff_prefer: defaults::prefer(),
            coeff_urlcompintoplist: defaults::urlcompintoplist(),
            coeff_descrcompintoplist: defaults::descrcompintoplist(),
            coeff_appurl: defaults::appurl(),
            coeff_app_dc_title: defaults::app_dc_title(),
        }
    }
}

mod defaults {
    pub fn media() -> u8 {
        15
    }
    pub fn prefer() -> u8 {
        15
    }
    pub fn urlcompintoplist() -> u8 {
        3
    }
    pub fn descrcompintoplist() -> u8 {
        2
    }
    pub fn appurl() -> u8 {
        14
    }
    pub fn app_dc_title() -> u8 {
        14
    }
}

/// Parameters of one search query.
#[derive(Debug, Clone)]
pub struct QueryParams {
    pub id: String,
    pub query_string: String,
    /// Hashes of every query term
    pub query_hashes: BTreeSet<String>,
    pub content_domain: ContentDomain,
    pub offset: usize,
    pub items_per_page: usize,
    pub online_snippet_fetch: bool,
    /// Navigator names, `all` or a comma separated list
    pub navigators: String,
    /// Results whose URL or title fully match this pattern are preferred
    pub prefer: Option<Regex>,
    /// Restrict text snippets to directory listings
    pub index_of: bool,
    /// Query is distributed across peers
    pub global: bool,
    /// Index segment the results were taken from
    pub segment: String,
    pub ranking: RankingProfile,
}

impl QueryParams {
    /// Create query parameters for a text query with default settings.
    pub fn new(query_string: impl Into<String>) -> Self {
        let query_string = query_string.into();
        let query_hashes = words_to_hashes(query_string.split_whitespace());
        Self {
            id: word_hash(&query_string),
            query_string,
            query_hashes,
            content_domain: ContentDomain::Text,
            offset: 0,
            items_per_page: 10,
            online_snippet_fetch: true,
            navigators: "all".to_string(),
            prefer: None,
            index_of: false,
            global: false,
            segment: "default".to_string(),
            ranking: RankingProfile::default(),
        }
    }

    pub fn with_content_domain(mut self, domain: ContentDomain) -> Self {
        self.content_domain = domain;
        self
    }

    pub fn with_paging(mut self, offset: usize, items_per_page: usize) -> Self {
        self.offset = offset;
        self.items_per_page = items_per_page;
        self
    }

    pub fn with_online_snippet_fetch(mut self, online: bool) -> Self {
        self.online_snippet_fetch = online;
        self
    }

    pub fn with_navigators(mut self, navigators: impl Into<String>) -> Self {
        self.navigators = navigators.into();
        self
    }

    /// Set the preference pattern; it must match a whole URL or title.
    pub fn with_prefer(mut self, pattern: &str) -> Result<Self> {
        self.prefer = if pattern.is_empty() {
            None
        } else {
            Some(Regex::new(&format!("^(?:{pattern})$"))?)
        };
        Ok(self)
    }

    /// Number of results the current page needs.
    pub fn needed_results(&self) -> usize {
        self.offset + self.items_per_page
    }

    /// Whether topic navigation collects words from materialized results.
    pub fn topics_navigator(&self) -> bool {
        self.navigators == "all" || self.navigators.contains("topics")
    }

    /// Query term hashes without stopwords, used to match snippets.
    pub fn snippet_word_hashes(&self, stopwords: &[String]) -> BTreeSet<String> {
        let stopword_hashes = words_to_hashes(stopwords);
        self.query_hashes
            .difference(&stopword_hashes)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needed_results() {
        let query = QueryParams::new("rust").with_paging(20, 10);
        assert_eq!(query.needed_results(), 30);
    }

    #[test]
    fn test_topics_navigator() {
        assert!(QueryParams::new("x").topics_navigator());
        assert!(
            QueryParams::new("x")
                .with_navigators("hosts,topics")
                .topics_navigator()
        );
        assert!(!QueryParams::new("x").with_navigators("hosts").topics_navigator());
    }

    #[test]
    fn test_snippet_word_hashes_drop_stopwords() {
        let query = QueryParams::new("the rust book");
        let hashes = query.snippet_word_hashes(&["the".to_string()]);
        assert_eq!(hashes.len(), 2);
        assert!(!hashes.contains(&word_hash("the")));
        assert!(hashes.contains(&word_hash("rust")));
    }

    #[test]
    fn test_prefer_is_full_match() {
        let query = QueryParams::new("x").with_prefer("rust.*").unwrap();
        let prefer = query.prefer.unwrap();
        assert!(prefer.is_match("rust book"));
        assert!(!prefer.is_match("the rust book"));
    }

    #[test]
    fn test_invalid_prefer_pattern() {
        assert!(QueryParams::new("x").with_prefer("(").is_err());
    }
}
