//! Shared building blocks of result materialization.
//!
//! - `store`: score-ordered, deduplicating result container
//! - `failures`: url hashes sorted out during a search
//! - `ranking`: post-ranking heuristics

pub mod failures;
pub mod ranking;
pub mod store;

pub use failures::FailureRegistry;
pub use ranking::{TopicMap, post_ranking, saturating_shift};
pub use store::{Identified, Ranked, SortedResultStore};
