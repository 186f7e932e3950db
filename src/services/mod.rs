//! Service layer for the result fetcher.
//!
//! This module contains the business logic for:
//! - Snippet resolution of single candidates (`snippets`)
//! - Result workers and their liveness (`worker`)
//! - Worker deployment and paging (`ResultFetcher`)

mod fetcher;
mod session;
mod snippets;
mod worker;

pub use fetcher::ResultFetcher;
pub use session::Collaborators;
