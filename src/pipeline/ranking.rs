//! Post-ranking heuristics applied while results materialize.
//!
//! The ranking engine supplies a base rank; this module computes the
//! adjustment added on top of it from the page's media links, the
//! preference pattern, the topic list and query terms found in the URL
//! or title. All terms are shifts of small counts by configured
//! exponents. Shifts and sums saturate at `i64::MAX`.

use std::collections::HashMap;

use crate::models::{ContentDomain, QueryParams, ResultEntry};
use crate::utils::components::{title_components, url_components};
use crate::utils::words_to_hashes;

/// Topic word to frequency, as collected by the ranking engine.
pub type TopicMap = HashMap<String, u32>;

/// Base value of pattern and query-term bonuses.
const MATCH_BONUS: i64 = 256;

/// `value << exponent`, saturating instead of overflowing.
pub fn saturating_shift(value: i64, exponent: u8) -> i64 {
    if value <= 0 {
        return value.max(0);
    }
    if u32::from(exponent) >= i64::BITS - 1 || value > (i64::MAX >> exponent) {
        return i64::MAX;
    }
    value << exponent
}

/// Heuristic score adjustment for one materialized entry.
pub fn post_ranking(entry: &ResultEntry, topics: &TopicMap, query: &QueryParams) -> i64 {
    let profile = &query.ranking;
    let mut r: i64 = 0;

    // media searches prefer pages with many links of the wanted kind
    let media_coeff = match query.content_domain {
        ContentDomain::Text => None,
        ContentDomain::Image => Some(profile.coeff_cathasimage),
        ContentDomain::Audio => Some(profile.coeff_cathasaudio),
        ContentDomain::Video => Some(profile.coeff_cathasvideo),
        ContentDomain::App => Some(profile.coeff_cathasapp),
    };
    if let Some(coeff) = media_coeff {
        let links = i64::from(entry.media_link_count(query.content_domain));
        r = r.saturating_add(saturating_shift(links, coeff));
    }

    let normal_form = entry.metadata().normal_form();
    if let Some(prefer) = &query.prefer {
        if prefer.is_match(&normal_form) {
            r = r.saturating_add(saturating_shift(MATCH_BONUS, profile.coeff_prefer));
        }
        if prefer.is_match(entry.title()) {
            r = r.saturating_add(saturating_shift(MATCH_BONUS, profile.coeff_prefer));
        }
    }

    let url_comps = url_components(&normal_form);
    let title_comps = title_components(entry.title());

    for comp in &url_comps {
        if let Some(&count) = topics.get(comp) {
            let bonus = saturating_shift(i64::from(count.max(1)), profile.coeff_urlcompintoplist);
            r = r.saturating_add(bonus);
        }
    }
    for comp in &title_comps {
        if let Some(&count) = topics.get(comp) {
            let bonus =
                saturating_shift(i64::from(count.max(1)), profile.coeff_descrcompintoplist);
            r = r.saturating_add(bonus);
        }
    }

    let url_hashes = words_to_hashes(&url_comps);
    let title_hashes = words_to_hashes(&title_comps);
    for query_hash in &query.query_hashes {
        if url_hashes.contains(query_hash) {
            r = r.saturating_add(saturating_shift(MATCH_BONUS, profile.coeff_appurl));
        }
        if title_hashes.contains(query_hash) {
            r = r.saturating_add(saturating_shift(MATCH_BONUS, profile.coeff_app_dc_title));
        }
    }

    r
}
