//! Utility functions and helpers.

pub mod components;

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};
use url::Url;

/// Number of hex digits kept from a SHA-256 digest.
const HASH_LENGTH: usize = 12;

fn short_digest(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(HASH_LENGTH);
    encoded
}

/// Hash a single word (case-insensitive).
pub fn word_hash(word: &str) -> String {
    short_digest(&word.to_lowercase())
}

/// Hash a set of words.
pub fn words_to_hashes<I, S>(words: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    words
        .into_iter()
        .filter(|w| !w.as_ref().is_empty())
        .map(|w| word_hash(w.as_ref()))
        .collect()
}

/// Identity hash of a page, computed over its normalized URL.
pub fn url_hash(url: &Url) -> String {
    short_digest(&components::normal_form(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_hash_is_case_insensitive() {
        assert_eq!(word_hash("Rust"), word_hash("rust"));
        assert_ne!(word_hash("rust"), word_hash("crab"));
        assert_eq!(word_hash("rust").len(), HASH_LENGTH);
    }

    #[test]
    fn test_words_to_hashes_skips_empty() {
        let hashes = words_to_hashes(["a", "", "b", "a"]);
        assert_eq!(hashes.len(), 2);
        assert!(hashes.contains(&word_hash("b")));
    }

    #[test]
    fn test_url_hash_ignores_fragment() {
        let a = Url::parse("https://Example.com/page#top").unwrap();
        let b = Url::parse("https://example.com/page").unwrap();
        assert_eq!(url_hash(&a), url_hash(&b));
    }
}
