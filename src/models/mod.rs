// src/models/mod.rs

//! Domain models for the result fetcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod candidate;
mod config;
mod entry;
mod query;

// Re-export all public types
pub use candidate::{Candidate, PageMetadata, WordReference};
pub use config::{Config, FetcherConfig, SnippetConfig};
pub use entry::{
    MediaSnippet, ResultEntry, SNIPPET_ERROR_THRESHOLD, Snippet, TextSnippet, codes,
};
pub use query::{ContentDomain, QueryParams, RankingProfile, SnippetMode};
