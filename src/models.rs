//! Data models for scraped articles and the notes attached to them.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Record`]: A candidate article as extracted from the source page
//! - [`Article`]: A persisted article with its note references and saved flag
//! - [`Note`]: A persisted free-form note
//! - [`ArticleWithNotes`]: An article whose note ids were resolved to notes
//! - [`ArticlePatch`] / [`NoteContent`]: The update payloads
//!
//! Articles and notes live in two independent collections. An article holds
//! an ordered list of note ids; a note has no back-reference to its article.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Identifier of a stored [`Article`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub Uuid);

/// Identifier of a stored [`Note`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub Uuid);

impl ArticleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl NoteId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ArticleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::str::FromStr for NoteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A candidate article read from one content block of the source page.
///
/// Fields that could not be found in the block are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Headline text.
    pub title: String,
    /// The headline's `href`, absolute or relative.
    pub link: String,
    /// Summary text under the headline.
    pub body: String,
}

/// A persisted article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub link: String,
    pub body: String,
    /// Attached note ids in attachment order. Ids are not removed when the
    /// note itself is deleted.
    pub notes: Vec<NoteId>,
    /// Client-controlled marker, false at creation.
    pub saved: bool,
}

impl Article {
    /// Build a fresh article from an extracted record: new id, no notes, unsaved.
    pub fn from_record(record: Record) -> Self {
        Self {
            id: ArticleId::new(),
            title: record.title,
            link: record.link,
            body: record.body,
            notes: Vec::new(),
            saved: false,
        }
    }
}

/// A single value inside a note.
///
/// Notes accept whatever fields the client submits, restricted to scalar
/// values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl FieldValue {
    /// Interpret a command-line value: `true`/`false` become booleans,
    /// anything that parses as a JSON number becomes a number, the rest is text.
    pub fn parse_loose(raw: &str) -> Self {
        match raw {
            "true" => return FieldValue::Bool(true),
            "false" => return FieldValue::Bool(false),
            _ => {}
        }
        match serde_json::from_str::<serde_json::Number>(raw) {
            Ok(n) => FieldValue::Number(n),
            Err(_) => FieldValue::Text(raw.to_string()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n.into())
    }
}

/// Field name owned by the store; clients may not set it.
pub const RESERVED_NOTE_FIELD: &str = "id";

/// Open-schema note content: field name to scalar value.
pub type NoteContent = BTreeMap<String, FieldValue>;

/// A persisted note. The content fields are stored verbatim and serialize
/// next to `id`.
///
/// `id` is assigned by the store; content carrying an `id` field is rejected
/// because flattening it would collide with the real id when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    #[serde(flatten)]
    pub content: NoteContent,
}

impl Note {
    pub fn new(content: NoteContent) -> Self {
        Self {
            id: NoteId::new(),
            content,
        }
    }

    /// Merge `patch` into this note: given fields overwrite, others are kept.
    pub fn merge(&mut self, patch: NoteContent) {
        self.content.extend(patch);
    }
}

/// An article with its note ids resolved to full notes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleWithNotes {
    pub id: ArticleId,
    pub title: String,
    pub link: String,
    pub body: String,
    pub notes: Vec<Note>,
    pub saved: bool,
}

impl ArticleWithNotes {
    pub fn new(article: Article, notes: Vec<Note>) -> Self {
        Self {
            id: article.id,
            title: article.title,
            link: article.link,
            body: article.body,
            notes,
            saved: article.saved,
        }
    }
}

/// Partial replacement of an article's extracted fields. `None` keeps the
/// current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleFields {
    pub title: Option<String>,
    pub link: Option<String>,
    pub body: Option<String>,
}

/// The ways an article can be updated by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticlePatch {
    /// Overwrite the given fields.
    Merge(ArticleFields),
    /// Append one note id to the end of `notes`.
    PushNote(NoteId),
    /// Set the saved flag.
    SetSaved(bool),
}

impl ArticlePatch {
    /// Apply this patch to `article` in place.
    pub fn apply(self, article: &mut Article) {
        match self {
            ArticlePatch::Merge(fields) => {
                if let Some(title) = fields.title {
                    article.title = title;
                }
                if let Some(link) = fields.link {
                    article.link = link;
                }
                if let Some(body) = fields.body {
                    article.body = body;
                }
            }
            ArticlePatch::PushNote(note_id) => article.notes.push(note_id),
            ArticlePatch::SetSaved(saved) => article.saved = saved,
        }
    }
}
