//! Command-line interface definitions for netscrape.
//!
//! This module defines the CLI arguments and subcommands using the `clap` crate.
//! Global options can be provided via command-line flags, environment variables
//! or the YAML file named by `--config` (see [`crate::config`]).

use crate::models::{ArticleId, FieldValue, NoteContent, NoteId, RESERVED_NOTE_FIELD};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for netscrape.
///
/// # Examples
///
/// ```sh
/// # Pull the current front page into ./data
/// netscrape scrape
///
/// # Attach a note to an article
/// netscrape note add 0b6c...e1 -f text="worth a follow-up" -f stars=4
///
/// # Mark it as saved and show it with its notes
/// netscrape save 0b6c...e1
/// netscrape show 0b6c...e1
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Page to scrape
    #[arg(long, env = "NETSCRAPE_SOURCE_URL", global = true)]
    pub source_url: Option<String>,

    /// Directory holding the article and note database
    #[arg(short, long, env = "NETSCRAPE_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Timeout for fetching the source page, in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// How many article creates may run at once during a scrape
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch the source page and store every article found on it
    Scrape,
    /// List stored articles
    List {
        /// Only saved articles
        #[arg(long)]
        saved: bool,
    },
    /// Show one article with its notes
    Show { id: ArticleId },
    /// Overwrite an article's title, link or body
    Edit {
        id: ArticleId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        body: Option<String>,
    },
    /// Create, change or delete notes
    #[command(subcommand)]
    Note(NoteCommand),
    /// Mark an article as saved (or unsaved with --unsave)
    Save {
        id: ArticleId,
        #[arg(long)]
        unsave: bool,
    },
    /// Report note ids that point at deleted notes
    Check,
}

impl Command {
    /// Commands that never write; these open the store without creating it.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Command::List { .. } | Command::Show { .. } | Command::Check)
    }
}

#[derive(Subcommand, Debug)]
pub enum NoteCommand {
    /// Create a note and attach it to an article
    Add {
        article: ArticleId,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Change fields of an existing note
    Update {
        id: NoteId,
        #[command(flatten)]
        fields: FieldArgs,
    },
    /// Delete a note (article references to it are kept)
    Delete { id: NoteId },
}

#[derive(Args, Debug)]
pub struct FieldArgs {
    /// A note field as key=value; repeatable
    #[arg(short, long = "field", value_parser = parse_field, required = true)]
    pub fields: Vec<(String, FieldValue)>,
}

impl FieldArgs {
    pub fn into_content(self) -> NoteContent {
        self.fields.into_iter().collect()
    }
}

fn parse_field(raw: &str) -> Result<(String, FieldValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty field name in {raw:?}"));
    }
    if key == RESERVED_NOTE_FIELD {
        return Err(format!("`{RESERVED_NOTE_FIELD}` is assigned by the store"));
    }
    Ok((key.to_string(), FieldValue::parse_loose(value)))
}
