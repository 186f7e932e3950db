//! Snippet Fetcher CLI
//!
//! Validates fetcher configuration and replays recorded candidate streams
//! through a `ResultFetcher`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use snippet_fetcher::{
    ResultFetcher,
    error::Result,
    models::{Config, ResultEntry, Snippet},
    sources::{Fixture, NoopEventTracker},
};

/// Snippet Fetcher - concurrent search result materialization
#[derive(Parser, Debug)]
#[command(
    name = "snippet-fetcher",
    version,
    about = "Materialize ranked search results with snippets"
)]
struct Cli {
    /// Path to the fetcher configuration file
    #[arg(short, long, default_value = "fetcher.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration file
    Validate,

    /// Replay a recorded candidate stream and page through its results
    Replay {
        /// Path to the JSON fixture
        fixture: PathBuf,

        /// Wait for the first page at most this long before paging (ms)
        #[arg(long, default_value_t = 3000)]
        wait_ms: u64,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

fn describe(entry: &ResultEntry) -> String {
    match entry.snippet() {
        Snippet::None => String::new(),
        Snippet::Text(text) => format!("\n      {}", text.text),
        Snippet::Media(media) => format!("\n      {} media links", media.len()),
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Validate => {
            log::info!("Validating {}...", cli.config.display());

            let config = Config::load(&cli.config)?;
            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} workers max, {} stopwords)",
                config.fetcher.max_workers,
                config.stopwords.len()
            );
        }

        Command::Replay { fixture, wait_ms } => {
            let config = Config::load_or_default(&cli.config);
            config.validate()?;

            let fixture = Fixture::load(&fixture)?;
            let mut query = fixture.query_params()?;
            query.ranking = config.ranking.clone();
            let mut services = fixture.collaborators()?;
            if !cli.verbose {
                // progress events are only logged at debug level
                services = services.with_events(Arc::new(NoopEventTracker));
            }
            log::info!(
                "Replaying query {:?} over {} candidates",
                fixture.query,
                fixture.candidates.len()
            );

            let started = Instant::now();
            let fetcher = ResultFetcher::new(query, config, services);
            let first_page = fetcher
                .complete_results(Duration::from_millis(wait_ms))
                .await;
            log::info!(
                "{} results materialized after {:?}",
                first_page.len(),
                started.elapsed()
            );

            if fetcher.query().content_domain.is_media() {
                let mut index = 0;
                while let Some(media) = fetcher.one_image(index).await {
                    index += 1;
                    println!("{:>3}. [{:>6}] {} {}", index, media.ranking, media.href, media.name);
                }
            } else {
                let mut rank = 0;
                while let Some(entry) = fetcher.next_result().await {
                    rank += 1;
                    println!(
                        "{:>3}. [{:>12}] {} {}{}",
                        rank,
                        entry.ranking(),
                        entry.url(),
                        entry.title(),
                        describe(&entry)
                    );
                }
            }

            let mut failures: Vec<_> = fetcher.failures().into_iter().collect();
            failures.sort();
            for (hash, reason) in &failures {
                log::warn!("sorted out {}: {}", hash, reason);
            }

            log::info!(
                "Replay complete: {} results, {} failures, url retrieval {:?}, snippets {:?}, total {:?}",
                fetcher.result_count(),
                failures.len(),
                fetcher.url_retrieval_time(),
                fetcher.snippet_computation_time(),
                started.elapsed()
            );
        }
    }

    Ok(())
}
