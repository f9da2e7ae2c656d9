//! Error types for fetching, storage, note attachment and configuration.
//!
//! Every error here is per-request: nothing in the pipeline treats one of
//! them as fatal to the process.

use crate::models::{ArticleId, Note};
use std::path::PathBuf;
use thiserror::Error;

/// Failure to retrieve the source page. Aborts the scrape before extraction.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, timeout or body read failure.
    #[error("request to source failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The source answered with a non-success status.
    #[error("source {url} answered {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Which collection a [`StoreError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Article,
    Note,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Article => f.write_str("article"),
            Entity::Note => f.write_str("note"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: String },
    #[error("data directory i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored note content is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    /// A previous database call panicked while holding the connection.
    #[error("database connection poisoned")]
    Poisoned,
    /// The store refused the write.
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn article_not_found(id: impl ToString) -> Self {
        StoreError::NotFound {
            entity: Entity::Article,
            id: id.to_string(),
        }
    }

    pub fn note_not_found(id: impl ToString) -> Self {
        StoreError::NotFound {
            entity: Entity::Note,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Failure of the two-step note attachment.
#[derive(Debug, Error)]
pub enum AttachError {
    /// The note could not be created; nothing was persisted.
    #[error("note could not be created: {0}")]
    Note(#[source] StoreError),
    /// The note was created but the article does not exist. The note stays
    /// in the note store, unlinked.
    #[error("article {article_id} not found; note {} was created but not attached", .note.id)]
    ArticleNotFound { article_id: ArticleId, note: Note },
    /// The note was created but linking it failed for another reason.
    #[error("note {} was created but could not be attached: {source}", .note.id)]
    Link {
        note: Note,
        #[source]
        source: StoreError,
    },
}

impl AttachError {
    /// The note left behind in the store, if step one succeeded.
    pub fn orphaned_note(&self) -> Option<&Note> {
        match self {
            AttachError::Note(_) => None,
            AttachError::ArticleNotFound { note, .. } | AttachError::Link { note, .. } => {
                Some(note)
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file {path} is not valid YAML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid source URL {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
}
