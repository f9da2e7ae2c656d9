//! Links between articles and notes.
//!
//! An article owns an ordered list of note ids; notes know nothing about
//! their article. Attaching is two separate writes (create the note, then
//! append its id to the article) with no transaction around them, and
//! deleting a note leaves its id in place. Both gaps are surfaced rather
//! than repaired:
//!
//! - [`attach_note`] reports a note it created but could not link as
//!   [`AttachError::ArticleNotFound`], carrying the note.
//! - [`article_with_notes`] skips ids whose note is gone.
//! - [`dangling_references`] lists every such id.

use crate::error::{AttachError, StoreError};
use crate::models::{Article, ArticleId, ArticlePatch, ArticleWithNotes, NoteContent, NoteId};
use crate::store::{ArticleStore, NoteStore};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Create a note from `content` and append its id to the article's notes.
///
/// The note is created first. If the article turns out not to exist the
/// note stays in the note store and is returned inside the error.
#[instrument(level = "info", skip(articles, notes, content), fields(fields = content.len()))]
pub async fn attach_note<A, N>(
    articles: &A,
    notes: &N,
    article_id: ArticleId,
    content: NoteContent,
) -> Result<Article, AttachError>
where
    A: ArticleStore,
    N: NoteStore,
{
    let note = notes.create_note(content).await.map_err(AttachError::Note)?;

    match articles
        .update_article(article_id, ArticlePatch::PushNote(note.id))
        .await
    {
        Ok(article) => {
            info!(note_id = %note.id, notes = article.notes.len(), "Attached note");
            Ok(article)
        }
        Err(e) if e.is_not_found() => {
            warn!(note_id = %note.id, "Article missing; note left unattached");
            Err(AttachError::ArticleNotFound { article_id, note })
        }
        Err(source) => {
            warn!(note_id = %note.id, error = %source, "Linking note failed; note left unattached");
            Err(AttachError::Link { note, source })
        }
    }
}

/// Look up an article and resolve its note ids to notes, in attachment
/// order. Ids whose note no longer exists are left out.
#[instrument(level = "debug", skip(articles, notes))]
pub async fn article_with_notes<A, N>(
    articles: &A,
    notes: &N,
    id: ArticleId,
) -> Result<ArticleWithNotes, StoreError>
where
    A: ArticleStore,
    N: NoteStore,
{
    let article = articles.find_article(id).await?;
    let mut resolved = Vec::with_capacity(article.notes.len());
    for note_id in &article.notes {
        match notes.find_note(*note_id).await {
            Ok(note) => resolved.push(note),
            Err(e) if e.is_not_found() => {
                warn!(%note_id, "Skipping dangling note reference");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(ArticleWithNotes::new(article, resolved))
}

/// A note id held by an article whose note has been deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingReference {
    pub article_id: ArticleId,
    pub note_id: NoteId,
}

/// Scan every article for note ids that no longer resolve.
#[instrument(level = "info", skip_all)]
pub async fn dangling_references<A, N>(
    articles: &A,
    notes: &N,
) -> Result<Vec<DanglingReference>, StoreError>
where
    A: ArticleStore,
    N: NoteStore,
{
    let mut dangling = Vec::new();
    for article in articles.find_articles().await? {
        for note_id in article.notes {
            match notes.find_note(note_id).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => dangling.push(DanglingReference {
                    article_id: article.id,
                    note_id,
                }),
                Err(e) => return Err(e),
            }
        }
    }
    info!(count = dangling.len(), "Checked note references");
    Ok(dangling)
}
