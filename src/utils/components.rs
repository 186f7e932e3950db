// src/utils/components.rs

//! Splitting URLs and titles into word components.

use unicode_segmentation::UnicodeSegmentation;
use url::Url;

/// Normalized string form of a URL: lower-cased scheme and host, no fragment.
///
/// # Examples
/// ```
/// use snippet_fetcher::utils::components::normal_form;
/// use url::Url;
///
/// let url = Url::parse("HTTPS://Example.COM/a/b?x=1#frag").unwrap();
/// assert_eq!(normal_form(&url), "https://example.com/a/b?x=1");
/// ```
pub fn normal_form(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized.to_string()
}

/// Split a normalized URL into lower-cased alphanumeric components.
///
/// The scheme is not a component.
pub fn url_components(normal_form: &str) -> Vec<String> {
    let without_scheme = normal_form
        .split_once("://")
        .map_or(normal_form, |(_, rest)| rest);

    without_scheme
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Split a title into lower-cased words.
pub fn title_components(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .unicode_words()
        .map(String::from)
        .collect()
}
