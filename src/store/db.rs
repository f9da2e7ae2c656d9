//! SQLite schema and row access for [`Store`](super::Store).
//!
//! Articles and notes are one row each. An article's note list lives in
//! `article_notes`, ordered by `position`; `note_id` has no foreign key so a
//! deleted note leaves its reference behind.

use crate::error::StoreError;
use crate::models::{Article, ArticleId, Note, NoteContent, NoteId};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DB_FILE: &str = "netscrape.sqlite";

/// How long a write waits for another process holding the database lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn connect(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn connect_read_only(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

pub fn connect_in_memory() -> Result<Connection, StoreError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS articles (
            seq        INTEGER PRIMARY KEY,
            id         TEXT UNIQUE NOT NULL,
            title      TEXT NOT NULL,
            link       TEXT NOT NULL,
            body       TEXT NOT NULL,
            saved      BOOLEAN NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS notes (
            seq        INTEGER PRIMARY KEY,
            id         TEXT UNIQUE NOT NULL,
            content    TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS article_notes (
            article_id TEXT NOT NULL REFERENCES articles(id),
            position   INTEGER NOT NULL,
            note_id    TEXT NOT NULL,
            PRIMARY KEY (article_id, position)
        );
        ",
    )?;
    Ok(())
}

impl ToSql for ArticleId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for ArticleId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for NoteId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for NoteId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

pub fn insert_article(conn: &Connection, article: &Article) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO articles (id, title, link, body, saved) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            article.id,
            article.title,
            article.link,
            article.body,
            article.saved
        ],
    )?;
    Ok(())
}

/// Write back the scalar columns of an existing article.
pub fn update_article_row(conn: &Connection, article: &Article) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE articles SET title = ?2, link = ?3, body = ?4, saved = ?5 WHERE id = ?1",
        params![
            article.id,
            article.title,
            article.link,
            article.body,
            article.saved
        ],
    )?;
    Ok(())
}

pub fn push_note_ref(
    conn: &Connection,
    article_id: ArticleId,
    position: usize,
    note_id: NoteId,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO article_notes (article_id, position, note_id) VALUES (?1, ?2, ?3)",
        params![article_id, position as i64, note_id],
    )?;
    Ok(())
}

pub fn select_article(conn: &Connection, id: ArticleId) -> Result<Option<Article>, StoreError> {
    let row = conn
        .query_row(
            "SELECT title, link, body, saved FROM articles WHERE id = ?1",
            params![id],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, bool>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((title, link, body, saved)) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare_cached(
        "SELECT note_id FROM article_notes WHERE article_id = ?1 ORDER BY position",
    )?;
    let notes = stmt
        .query_map(params![id], |r| r.get::<_, NoteId>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(Article {
        id,
        title,
        link,
        body,
        notes,
        saved,
    }))
}

/// Every article in insertion order.
pub fn select_articles(conn: &Connection) -> Result<Vec<Article>, StoreError> {
    let mut refs: HashMap<ArticleId, Vec<NoteId>> = HashMap::new();
    let mut stmt =
        conn.prepare("SELECT article_id, note_id FROM article_notes ORDER BY article_id, position")?;
    let rows = stmt.query_map([], |r| Ok((r.get::<_, ArticleId>(0)?, r.get::<_, NoteId>(1)?)))?;
    for row in rows {
        let (article_id, note_id) = row?;
        refs.entry(article_id).or_default().push(note_id);
    }

    let mut stmt = conn.prepare("SELECT id, title, link, body, saved FROM articles ORDER BY seq")?;
    let articles = stmt
        .query_map([], |r| {
            let id: ArticleId = r.get(0)?;
            Ok(Article {
                id,
                title: r.get(1)?,
                link: r.get(2)?,
                body: r.get(3)?,
                notes: Vec::new(),
                saved: r.get(4)?,
            })
        })?
        .map(|row| {
            row.map(|mut article| {
                article.notes = refs.remove(&article.id).unwrap_or_default();
                article
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(articles)
}

pub fn insert_note(conn: &Connection, note: &Note) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO notes (id, content) VALUES (?1, ?2)",
        params![note.id, serde_json::to_string(&note.content)?],
    )?;
    Ok(())
}

pub fn update_note_row(conn: &Connection, note: &Note) -> Result<(), StoreError> {
    conn.execute(
        "UPDATE notes SET content = ?2 WHERE id = ?1",
        params![note.id, serde_json::to_string(&note.content)?],
    )?;
    Ok(())
}

pub fn delete_note_row(conn: &Connection, id: NoteId) -> Result<(), StoreError> {
    conn.execute("DELETE FROM notes WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn select_note(conn: &Connection, id: NoteId) -> Result<Option<Note>, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT content FROM notes WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(raw) => {
            let content: NoteContent = serde_json::from_str(&raw)?;
            Ok(Some(Note { id, content }))
        }
        None => Ok(None),
    }
}
