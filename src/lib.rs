// src/lib.rs

//! Snippet Fetcher Library
//!
//! Concurrent materialization of search results: workers pull ranked
//! candidates, resolve their snippets, re-score them and publish them into
//! a shared ordered store that readers page through.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod sources;
pub mod utils;

pub use error::{AppError, Result};
pub use services::{Collaborators, ResultFetcher};
