//! # netscrape
//!
//! Scrapes the AllSides balanced-news front page into a local article store
//! and lets you keep notes on the stories.
//!
//! ## Usage
//!
//! ```sh
//! netscrape scrape
//! netscrape list --saved
//! netscrape note add <ARTICLE_ID> -f text="good"
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: Download the configured source page ([`scrapers`])
//! 2. **Extraction**: One record per content block ([`scrapers::allsides`])
//! 3. **Ingestion**: Store each record as a new article, concurrently, with
//!    per-record outcomes collected in a batch report ([`ingest`])
//! 4. **Notes**: Attach, update and delete notes on stored articles
//!    ([`relations`], [`store`])
//!
//! Command output is JSON on stdout; logs go to stderr.

use clap::Parser;
use serde_json::json;
use std::error::Error;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod ingest;
mod models;
mod relations;
mod scrapers;
mod store;
mod utils;

use cli::{Cli, Command, NoteCommand};
use config::Config;
use ingest::{Ingestor, RecordOutcome};
use models::{ArticleFields, ArticlePatch};
use scrapers::HttpFetcher;
use store::{ArticleStore, NoteStore, Store};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = Config::resolve(&args)?;
    let store = if args.command.is_read_only() {
        Store::open_read_only(&config.data_dir).await?
    } else {
        Store::open(&config.data_dir).await?
    };

    run(args.command, &config, store).await
}

async fn run(
    command: Command,
    config: &Config,
    store: Store,
) -> Result<ExitCode, Box<dyn Error>> {
    match command {
        Command::Scrape => {
            let fetcher = HttpFetcher::new(config.source_url.clone(), config.timeout)?;
            let ingestor = Ingestor::new(fetcher, store, config.concurrency);

            let accepted = ingestor.run_scrape().await?;
            info!(candidates = accepted.candidates, "Waiting for batch to finish");
            let report = accepted.completion().await?;

            let outcomes: Vec<_> = report
                .outcomes
                .iter()
                .map(|o| match o {
                    RecordOutcome::Created { index, id } => {
                        json!({ "index": index, "created": id })
                    }
                    RecordOutcome::Failed {
                        index,
                        title,
                        error,
                    } => json!({ "index": index, "title": title, "error": error.to_string() }),
                })
                .collect();
            print_json(&json!({
                "source": config.source_url.as_str(),
                "candidates": report.outcomes.len(),
                "created": report.created(),
                "failed": report.failed(),
                "started_at": report.started_at,
                "finished_at": report.finished_at,
                "outcomes": outcomes,
            }))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::List { saved } => {
            let mut articles = store.find_articles().await?;
            if saved {
                articles.retain(|a| a.saved);
            }
            print_json(&articles)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { id } => {
            match relations::article_with_notes(&store, &store, id).await {
                Ok(article) => print_json(&article)?,
                Err(e) if e.is_not_found() => return Ok(not_found(&e)),
                Err(e) => return Err(e.into()),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Save { id, unsave } => {
            match store.update_article(id, ArticlePatch::SetSaved(!unsave)).await {
                Ok(article) => print_json(&article)?,
                Err(e) if e.is_not_found() => return Ok(not_found(&e)),
                Err(e) => return Err(e.into()),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Edit {
            id,
            title,
            link,
            body,
        } => {
            let patch = ArticlePatch::Merge(ArticleFields { title, link, body });
            match store.update_article(id, patch).await {
                Ok(article) => print_json(&article)?,
                Err(e) if e.is_not_found() => return Ok(not_found(&e)),
                Err(e) => return Err(e.into()),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Note(NoteCommand::Add { article, fields }) => {
            match relations::attach_note(&store, &store, article, fields.into_content()).await {
                Ok(article) => print_json(&article)?,
                Err(e) => match orphan_report(&e) {
                    Some(report) => {
                        warn!(error = %e, "Note stored without an article");
                        print_json(&report)?;
                        return Ok(ExitCode::FAILURE);
                    }
                    None => return Err(e.into()),
                },
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Note(NoteCommand::Update { id, fields }) => {
            match store.update_note(id, fields.into_content()).await {
                Ok(note) => print_json(&note)?,
                Err(e) if e.is_not_found() => return Ok(not_found(&e)),
                Err(e) => return Err(e.into()),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Note(NoteCommand::Delete { id }) => {
            match store.delete_note(id).await {
                Ok(note) => print_json(&note)?,
                Err(e) if e.is_not_found() => return Ok(not_found(&e)),
                Err(e) => return Err(e.into()),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Check => {
            let dangling = relations::dangling_references(&store, &store).await?;
            print_json(&dangling)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Output for an attach that created its note but could not link it.
fn orphan_report(e: &error::AttachError) -> Option<serde_json::Value> {
    e.orphaned_note()
        .map(|note| json!({ "error": e.to_string(), "orphaned_note": note }))
}

fn not_found(e: &error::StoreError) -> ExitCode {
    error!(error = %e, "Lookup failed");
    if let Err(e) = print_json(&json!({ "error": e.to_string() })) {
        error!(error = %e, "Failed to print error");
    }
    ExitCode::FAILURE
}
