// src/services/snippets.rs

//! Per-candidate snippet decision procedure.
//!
//! | mode    | snippet found      | snippet missing                    |
//! |---------|--------------------|------------------------------------|
//! | none    | (not fetched)      | entry without snippet              |
//! | offline | entry with snippet | entry without snippet              |
//! | online  | entry with snippet | failure registered, candidate lost |
//!
//! A candidate without metadata is dropped in every mode and never
//! registered as a failure.

use std::time::{Duration, Instant};

use crate::error::{AppError, Result};
use crate::models::{
    Candidate, PageMetadata, ResultEntry, Snippet, SnippetMode, TextSnippet, codes,
};
use crate::services::session::Session;
use crate::sources::TextSnippetRequest;

/// Resolve one candidate into a result entry according to `mode`.
pub(crate) async fn fetch_snippet(
    session: &Session,
    candidate: &Candidate,
    mode: SnippetMode,
) -> Result<ResultEntry> {
    let started = Instant::now();
    let metadata = candidate
        .metadata()
        .ok_or_else(|| AppError::MetadataMissing(candidate.url_hash().to_string()))?;
    let db_retrieval_time = started.elapsed();

    let entry = |snippet: Snippet, snippet_computation_time: Duration| {
        ResultEntry::new(
            candidate.url_hash(),
            metadata.clone(),
            candidate.word().clone(),
            snippet,
            db_retrieval_time,
            snippet_computation_time,
        )
    };

    if mode == SnippetMode::None {
        return Ok(entry(Snippet::None, Duration::ZERO));
    }

    if !session.query.content_domain.is_media() {
        let started = Instant::now();
        let snippet = retrieve_text(session, metadata, mode).await;
        let snippet_computation_time = started.elapsed();
        log::info!(
            "text snippet load time for {}: {:?}, {}",
            metadata.url,
            snippet_computation_time,
            if snippet.is_found() {
                "snippet found".to_string()
            } else {
                format!("no snippet found ({})", snippet.error)
            }
        );

        if snippet.is_found() {
            return Ok(entry(Snippet::Text(snippet), snippet_computation_time));
        }
        if mode == SnippetMode::Offline {
            // cache-only passes keep the result, just without a snippet
            return Ok(entry(Snippet::None, snippet_computation_time));
        }

        session.failures.register(
            candidate.url_hash(),
            format!("no text snippet for URL {}", metadata.url),
        );
        if !session.services.peer.is_virgin() {
            if let Err(e) = session
                .services
                .text_loader
                .report_failure(
                    &session.query.segment,
                    candidate.word(),
                    &snippet,
                    &session.query.id,
                )
                .await
            {
                log::warn!(
                    "Failed to report snippet failure for {}: {}",
                    metadata.url,
                    e
                );
            }
        }
        return Err(AppError::snippet_fetch(candidate.url_hash(), snippet.error));
    }

    let started = Instant::now();
    let budget = Duration::from_millis(session.config.snippets.media_timeout_ms);
    let media = tokio::time::timeout(
        budget,
        session.services.media_loader.retrieve(
            &metadata.url,
            &session.snippet_word_hashes,
            session.query.content_domain,
            mode.allows_online(),
            budget,
            session.query.global,
        ),
    )
    .await
    .unwrap_or_default();
    let snippet_computation_time = started.elapsed();
    log::info!(
        "media snippet load time for {}: {:?}",
        metadata.url,
        snippet_computation_time
    );

    if !media.is_empty() {
        return Ok(entry(Snippet::Media(media), snippet_computation_time));
    }
    if mode == SnippetMode::Offline {
        return Ok(entry(Snippet::None, snippet_computation_time));
    }

    session.failures.register(
        candidate.url_hash(),
        format!("no media snippet for URL {}", metadata.url),
    );
    Err(AppError::snippet_fetch(
        candidate.url_hash(),
        format!("no {} snippet", session.query.content_domain),
    ))
}

/// Load a text snippet within the mode's budget.
async fn retrieve_text(session: &Session, metadata: &PageMetadata, mode: SnippetMode) -> TextSnippet {
    let snippets = &session.config.snippets;
    let online = mode.allows_online();
    let budget = Duration::from_millis(if online {
        snippets.online_timeout_ms
    } else {
        snippets.offline_timeout_ms
    });

    let request = TextSnippetRequest {
        metadata,
        query_hashes: &session.snippet_word_hashes,
        online,
        index_of: session.query.index_of,
        max_length: snippets.max_length,
        timeout: budget,
        global: session.query.global,
    };

    match tokio::time::timeout(budget, session.services.text_loader.retrieve(request)).await {
        Ok(snippet) => snippet,
        Err(_) => TextSnippet::failed(
            codes::ERROR_TIMEOUT,
            format!("no snippet within {budget:?}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use url::Url;

    use super::*;
    use crate::models::{
        Config, ContentDomain, MediaSnippet, PageMetadata, QueryParams, WordReference,
    };
    use crate::services::session::Collaborators;
    use crate::sources::{MemoryRankingEngine, MemorySnippetLoader, StaticPeer};

    fn candidate(path: &str) -> Candidate {
        let url = Url::parse(&format!("https://example.com/{path}")).unwrap();
        Candidate::new(PageMetadata::new(url, path), WordReference::default())
    }

    fn session_with(
        query: QueryParams,
        loader: Arc<MemorySnippetLoader>,
        peer: StaticPeer,
    ) -> Session {
        let services = Collaborators::new(
            Arc::new(MemoryRankingEngine::new()),
            loader.clone(),
            loader,
            Arc::new(peer),
        );
        Session::new(query, Config::default(), services)
    }

    fn image(page: &Candidate, name: &str, ranking: i64) -> MediaSnippet {
        let source = page.metadata().unwrap().url.clone();
        MediaSnippet {
            domain: ContentDomain::Image,
            href: source.join(name).unwrap(),
            name: name.to_string(),
            attr: String::new(),
            ranking,
            source,
        }
    }

    #[tokio::test]
    async fn test_mode_none_skips_loading() {
        let page = candidate("plain");
        let loader = Arc::new(MemorySnippetLoader::new().with_failing([page.url_hash()]));
        let session = session_with(QueryParams::new("x"), loader, StaticPeer::joined());

        let entry = fetch_snippet(&session, &page, SnippetMode::None).await.unwrap();
        assert_eq!(entry.snippet(), &Snippet::None);
        assert!(session.failures.is_empty());
    }

    #[tokio::test]
    async fn test_missing_metadata_is_not_a_failure() {
        let loader = Arc::new(MemorySnippetLoader::new());
        let session = session_with(QueryParams::new("x"), loader, StaticPeer::joined());
        let orphan = Candidate::without_metadata("deadbeef", WordReference::default());

        let result = fetch_snippet(&session, &orphan, SnippetMode::Online).await;
        assert!(matches!(result, Err(AppError::MetadataMissing(_))));
        assert!(session.failures.is_empty());
    }

    #[tokio::test]
    async fn test_text_snippet_found() {
        let page = candidate("found");
        let loader = Arc::new(MemorySnippetLoader::new());
        let session = session_with(QueryParams::new("x"), loader, StaticPeer::joined());

        for mode in [SnippetMode::Offline, SnippetMode::Online] {
            let entry = fetch_snippet(&session, &page, mode).await.unwrap();
            assert_eq!(entry.text_snippet().unwrap().text, "found");
        }
    }

    #[tokio::test]
    async fn test_offline_text_failure_is_tolerated() {
        let page = candidate("broken");
        let loader = Arc::new(MemorySnippetLoader::new().with_failing([page.url_hash()]));
        let session = session_with(QueryParams::new("x"), loader.clone(), StaticPeer::joined());

        let entry = fetch_snippet(&session, &page, SnippetMode::Offline).await.unwrap();
        assert_eq!(entry.snippet(), &Snippet::None);
        assert!(session.failures.is_empty());
        assert!(loader.reported_failures().is_empty());
    }

    #[tokio::test]
    async fn test_online_text_failure_discards_and_registers() {
        let page = candidate("broken");
        let loader = Arc::new(MemorySnippetLoader::new().with_failing([page.url_hash()]));
        let session = session_with(QueryParams::new("x"), loader.clone(), StaticPeer::joined());

        let result = fetch_snippet(&session, &page, SnippetMode::Online).await;
        assert!(matches!(result, Err(AppError::SnippetFetch { .. })));
        assert!(session.failures.contains(page.url_hash()));
        assert_eq!(loader.reported_failures(), vec![page.url_hash().to_string()]);
    }

    #[tokio::test]
    async fn test_virgin_peer_does_not_report() {
        let page = candidate("broken");
        let loader = Arc::new(MemorySnippetLoader::new().with_failing([page.url_hash()]));
        let session = session_with(QueryParams::new("x"), loader.clone(), StaticPeer::virgin());

        assert!(fetch_snippet(&session, &page, SnippetMode::Online).await.is_err());
        assert!(session.failures.contains(page.url_hash()));
        assert!(loader.reported_failures().is_empty());
    }

    #[tokio::test]
    async fn test_slow_text_snippet_times_out() {
        let page = candidate("slow");
        let loader = Arc::new(MemorySnippetLoader::new().with_latency(Duration::from_millis(500)));
        let services = Collaborators::new(
            Arc::new(MemoryRankingEngine::new()),
            loader.clone(),
            loader,
            Arc::new(StaticPeer::joined()),
        );
        let mut config = Config::default();
        config.snippets.online_timeout_ms = 20;
        let session = Session::new(QueryParams::new("x"), config, services);

        let result = fetch_snippet(&session, &page, SnippetMode::Online).await;
        assert!(result.is_err());
        assert!(session.failures.contains(page.url_hash()));
    }

    #[tokio::test]
    async fn test_media_snippets() {
        let page = candidate("gallery");
        let empty = candidate("empty");
        let loader = Arc::new(
            MemorySnippetLoader::new()
                .with_media(page.url_hash(), vec![image(&page, "a.png", 10)]),
        );
        let query = QueryParams::new("x").with_content_domain(ContentDomain::Image);
        let session = session_with(query, loader, StaticPeer::joined());

        let entry = fetch_snippet(&session, &page, SnippetMode::Online).await.unwrap();
        assert_eq!(entry.media_snippets().unwrap().len(), 1);

        let tolerated = fetch_snippet(&session, &empty, SnippetMode::Offline).await.unwrap();
        assert!(tolerated.media_snippets().is_none());
        assert!(session.failures.is_empty());

        assert!(fetch_snippet(&session, &empty, SnippetMode::Online).await.is_err());
        assert!(session.failures.contains(empty.url_hash()));
    }
}
