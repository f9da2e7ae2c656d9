//! Article and note persistence.
//!
//! The two collections are independent: an article stores note ids, and
//! nothing enforces that those ids still exist in the note collection.
//!
//! [`ArticleStore`] and [`NoteStore`] are the seams the ingestion and
//! relationship code is written against. [`Store`] implements both on a
//! SQLite database in the data directory. Each operation runs in its own
//! transaction and touches a single entity, so several processes can work
//! on the same directory without losing each other's writes. There are no
//! cross-entity transactions.

mod db;

use crate::error::StoreError;
use crate::models::{
    Article, ArticleId, ArticlePatch, Note, NoteContent, NoteId, RESERVED_NOTE_FIELD, Record,
};
use crate::utils::ensure_writable_dir;
use rusqlite::{Connection, TransactionBehavior};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

pub trait ArticleStore: Send + Sync {
    /// Persist a new article built from `record`.
    fn create_article(
        &self,
        record: Record,
    ) -> impl Future<Output = Result<Article, StoreError>> + Send;

    /// Every article in creation order, note ids unresolved.
    fn find_articles(&self) -> impl Future<Output = Result<Vec<Article>, StoreError>> + Send;

    fn find_article(
        &self,
        id: ArticleId,
    ) -> impl Future<Output = Result<Article, StoreError>> + Send;

    /// Apply `patch` to the article and return the updated article.
    fn update_article(
        &self,
        id: ArticleId,
        patch: ArticlePatch,
    ) -> impl Future<Output = Result<Article, StoreError>> + Send;
}

pub trait NoteStore: Send + Sync {
    fn create_note(&self, content: NoteContent)
    -> impl Future<Output = Result<Note, StoreError>> + Send;

    fn find_note(&self, id: NoteId) -> impl Future<Output = Result<Note, StoreError>> + Send;

    /// Merge `patch` into the note's fields and return the updated note.
    fn update_note(
        &self,
        id: NoteId,
        patch: NoteContent,
    ) -> impl Future<Output = Result<Note, StoreError>> + Send;

    /// Remove the note and return its last value.
    fn delete_note(&self, id: NoteId) -> impl Future<Output = Result<Note, StoreError>> + Send;
}

/// Shared handle to the database. Clones share the same connection.
#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// A store that lives only as long as the process.
    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_conn(db::connect_in_memory()?))
    }

    /// Open (or create) the store persisted under `dir`.
    #[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
    pub async fn open(dir: &Path) -> Result<Self, StoreError> {
        ensure_writable_dir(dir).await?;
        let path = dir.join(db::DB_FILE);
        let conn = tokio::task::spawn_blocking(move || db::connect(&path)).await??;
        info!("Opened store");
        Ok(Self::from_conn(conn))
    }

    /// Open the store under `dir` for reading only.
    ///
    /// Nothing is created on disk: a directory without a database reads as
    /// an empty store.
    #[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
    pub async fn open_read_only(dir: &Path) -> Result<Self, StoreError> {
        let path = dir.join(db::DB_FILE);
        if !tokio::fs::try_exists(&path).await? {
            info!("No database yet, reading as empty");
            return Self::in_memory();
        }
        let conn = tokio::task::spawn_blocking(move || db::connect_read_only(&path)).await??;
        info!("Opened store read-only");
        Ok(Self::from_conn(conn))
    }

    fn from_conn(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut *guard)
        })
        .await?
    }
}

impl ArticleStore for Store {
    async fn create_article(&self, record: Record) -> Result<Article, StoreError> {
        let article = Article::from_record(record);
        let row = article.clone();
        self.with_conn(move |conn| db::insert_article(conn, &row)).await?;
        debug!(id = %article.id, "Created article");
        Ok(article)
    }

    async fn find_articles(&self) -> Result<Vec<Article>, StoreError> {
        self.with_conn(|conn| db::select_articles(conn)).await
    }

    async fn find_article(&self, id: ArticleId) -> Result<Article, StoreError> {
        self.with_conn(move |conn| db::select_article(conn, id))
            .await?
            .ok_or_else(|| StoreError::article_not_found(id))
    }

    async fn update_article(&self, id: ArticleId, patch: ArticlePatch) -> Result<Article, StoreError> {
        let article = self
            .with_conn(move |conn| {
                // Immediate: take the write lock before reading so a
                // concurrent push cannot claim the same position.
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let mut article =
                    db::select_article(&tx, id)?.ok_or_else(|| StoreError::article_not_found(id))?;

                let pushed = match &patch {
                    ArticlePatch::PushNote(note_id) => Some(*note_id),
                    _ => None,
                };
                patch.apply(&mut article);
                match pushed {
                    Some(note_id) => db::push_note_ref(&tx, id, article.notes.len() - 1, note_id)?,
                    None => db::update_article_row(&tx, &article)?,
                }
                tx.commit()?;
                Ok(article)
            })
            .await?;
        debug!(%id, "Updated article");
        Ok(article)
    }
}

/// Note content may not carry the store-assigned `id`.
fn check_note_content(content: &NoteContent) -> Result<(), StoreError> {
    if content.contains_key(RESERVED_NOTE_FIELD) {
        return Err(StoreError::Rejected(format!(
            "note field `{RESERVED_NOTE_FIELD}` is assigned by the store"
        )));
    }
    Ok(())
}

impl NoteStore for Store {
    async fn create_note(&self, content: NoteContent) -> Result<Note, StoreError> {
        check_note_content(&content)?;
        let note = Note::new(content);
        let row = note.clone();
        self.with_conn(move |conn| db::insert_note(conn, &row)).await?;
        debug!(id = %note.id, "Created note");
        Ok(note)
    }

    async fn find_note(&self, id: NoteId) -> Result<Note, StoreError> {
        self.with_conn(move |conn| db::select_note(conn, id))
            .await?
            .ok_or_else(|| StoreError::note_not_found(id))
    }

    async fn update_note(&self, id: NoteId, patch: NoteContent) -> Result<Note, StoreError> {
        check_note_content(&patch)?;
        let note = self
            .with_conn(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let mut note =
                    db::select_note(&tx, id)?.ok_or_else(|| StoreError::note_not_found(id))?;
                note.merge(patch);
                db::update_note_row(&tx, &note)?;
                tx.commit()?;
                Ok(note)
            })
            .await?;
        debug!(%id, "Updated note");
        Ok(note)
    }

    async fn delete_note(&self, id: NoteId) -> Result<Note, StoreError> {
        let removed = self
            .with_conn(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let note =
                    db::select_note(&tx, id)?.ok_or_else(|| StoreError::note_not_found(id))?;
                db::delete_note_row(&tx, id)?;
                tx.commit()?;
                Ok(note)
            })
            .await?;
        debug!(%id, "Deleted note");
        Ok(removed)
    }
}
