//! Scrape orchestration: fetch the source page, extract records, store them.
//!
//! A scrape is accepted as soon as the page has been fetched and parsed.
//! The article creates then run as a background batch, several at a time,
//! each independent of the others: a failed create is logged and recorded
//! in the [`BatchReport`] but never stops the rest of the batch and never
//! turns the scrape itself into an error. Callers that care how many
//! articles actually landed can await [`ScrapeAccepted::completion`].
//!
//! There is no deduplication. Scraping an unchanged page twice stores every
//! article twice.

use crate::error::{FetchError, StoreError};
use crate::models::{ArticleId, Record};
use crate::scrapers::{Fetch, allsides};
use crate::store::ArticleStore;
use crate::utils::truncate_for_log;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, instrument};

/// Result of one article create inside a batch.
#[derive(Debug)]
pub enum RecordOutcome {
    Created { index: usize, id: ArticleId },
    Failed { index: usize, title: String, error: StoreError },
}

impl RecordOutcome {
    /// Position of the record on the source page.
    pub fn index(&self) -> usize {
        match self {
            RecordOutcome::Created { index, .. } | RecordOutcome::Failed { index, .. } => *index,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, RecordOutcome::Created { .. })
    }
}

/// Every per-record outcome of one scrape, ordered by page position.
#[derive(Debug)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchReport {
    pub fn created(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_created()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.created()
    }
}

/// A scrape whose page was fetched and parsed. The creates may still be
/// running.
#[derive(Debug)]
pub struct ScrapeAccepted {
    /// Number of records extracted from the page.
    pub candidates: usize,
    batch: JoinHandle<BatchReport>,
}

impl ScrapeAccepted {
    /// Wait for every create in the batch to finish.
    pub async fn completion(self) -> Result<BatchReport, JoinError> {
        self.batch.await
    }
}

/// Drives fetch → extract → create for one source.
#[derive(Debug, Clone)]
pub struct Ingestor<F, S> {
    fetcher: F,
    store: S,
    concurrency: usize,
}

impl<F, S> Ingestor<F, S>
where
    F: Fetch,
    S: ArticleStore + Clone + 'static,
{
    /// `concurrency` bounds how many creates run at once; zero is treated as one.
    pub fn new(fetcher: F, store: S, concurrency: usize) -> Self {
        Self {
            fetcher,
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Fetch and parse the source page, then start storing every record
    /// found on it.
    ///
    /// Fails only if the fetch fails, in which case nothing is extracted or
    /// stored. Must be called from within a tokio runtime.
    #[instrument(level = "info", skip_all)]
    pub async fn run_scrape(&self) -> Result<ScrapeAccepted, FetchError> {
        let html = match self.fetcher.fetch().await {
            Ok(html) => html,
            Err(e) => {
                error!(error = %e, "Fetch failed; scrape aborted");
                return Err(e);
            }
        };
        let records = allsides::extract(&html);
        let candidates = records.len();

        let batch = tokio::spawn(create_all(self.store.clone(), records, self.concurrency));
        info!(candidates, "Scrape accepted");
        Ok(ScrapeAccepted { candidates, batch })
    }
}

async fn create_all<S>(store: S, records: Vec<Record>, concurrency: usize) -> BatchReport
where
    S: ArticleStore + Clone + 'static,
{
    let started_at = Utc::now();
    let total = records.len();

    let mut outcomes: Vec<RecordOutcome> = stream::iter(records.into_iter().enumerate())
        .map(|(index, record)| {
            let store = store.clone();
            async move {
                let title = truncate_for_log(&record.title, 80);
                match store.create_article(record).await {
                    Ok(article) => {
                        debug!(index, id = %article.id, %title, "Stored article");
                        RecordOutcome::Created {
                            index,
                            id: article.id,
                        }
                    }
                    Err(e) => {
                        error!(index, %title, error = %e, "Failed to store article; continuing");
                        RecordOutcome::Failed { index, title, error: e }
                    }
                }
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;
    outcomes.sort_by_key(RecordOutcome::index);

    let report = BatchReport {
        started_at,
        finished_at: Utc::now(),
        outcomes,
    };
    info!(
        total,
        created = report.created(),
        failed = report.failed(),
        elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
        "Ingestion batch complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Article, ArticlePatch};
    use crate::store::Store;

    struct StaticPage(String);

    impl Fetch for StaticPage {
        async fn fetch(&self) -> Result<String, FetchError> {
            Ok(self.0.clone())
        }
    }

    struct Unreachable;

    impl Fetch for Unreachable {
        async fn fetch(&self) -> Result<String, FetchError> {
            Err(FetchError::Status {
                url: "http://source.invalid/".to_string(),
                status: reqwest::StatusCode::BAD_GATEWAY,
            })
        }
    }

    /// Rejects any article whose title contains `reject`.
    #[derive(Clone)]
    struct FlakyStore {
        inner: Store,
        reject: &'static str,
    }

    impl ArticleStore for FlakyStore {
        async fn create_article(&self, record: Record) -> Result<Article, StoreError> {
            if record.title.contains(self.reject) {
                return Err(StoreError::Rejected(format!("refusing {:?}", record.title)));
            }
            self.inner.create_article(record).await
        }

        async fn find_articles(&self) -> Result<Vec<Article>, StoreError> {
            self.inner.find_articles().await
        }

        async fn find_article(&self, id: ArticleId) -> Result<Article, StoreError> {
            self.inner.find_article(id).await
        }

        async fn update_article(
            &self,
            id: ArticleId,
            patch: ArticlePatch,
        ) -> Result<Article, StoreError> {
            self.inner.update_article(id, patch).await
        }
    }

    fn block(title: &str, link: &str, body: &str) -> String {
        format!(
            r#"<div class="top-content-wrapper"><div class="news-title"><a href="{link}">{title}</a></div><div class="news-body">{body}</div></div>"#
        )
    }

    fn page(blocks: &[String]) -> StaticPage {
        StaticPage(format!("<html><body>{}</body></html>", blocks.concat()))
    }

    #[tokio::test]
    async fn test_single_block_creates_one_article() {
        let store = Store::in_memory().unwrap();
        let ingestor = Ingestor::new(page(&[block("X", "/a", "Y")]), store.clone(), 4);

        let accepted = ingestor.run_scrape().await.unwrap();
        assert_eq!(accepted.candidates, 1);
        let report = accepted.completion().await.unwrap();
        assert_eq!(report.created(), 1);

        let articles = store.find_articles().await.unwrap();
        assert_eq!(articles.len(), 1);
        let article = &articles[0];
        assert!(matches!(
            report.outcomes[0],
            RecordOutcome::Created { index: 0, id } if id == article.id
        ));
        assert_eq!(article.title, "X");
        assert_eq!(article.link, "/a");
        assert_eq!(article.body, "Y");
        assert!(article.notes.is_empty());
        assert!(!article.saved);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_before_storing() {
        let store = Store::in_memory().unwrap();
        let ingestor = Ingestor::new(Unreachable, store.clone(), 4);

        let err = ingestor.run_scrape().await.unwrap_err();
        assert!(matches!(err, FetchError::Status { .. }));
        assert!(store.find_articles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_create_does_not_stop_the_rest() {
        let store = Store::in_memory().unwrap();
        let flaky = FlakyStore {
            inner: store.clone(),
            reject: "bad",
        };
        let blocks = [
            block("first", "/1", "one"),
            block("bad one", "/2", "two"),
            block("third", "/3", "three"),
        ];
        let ingestor = Ingestor::new(page(&blocks), flaky, 1);

        // Acceptance does not depend on how the creates go.
        let accepted = ingestor.run_scrape().await.unwrap();
        assert_eq!(accepted.candidates, 3);

        let report = accepted.completion().await.unwrap();
        assert_eq!(report.created(), 2);
        assert_eq!(report.failed(), 1);
        let indices: Vec<usize> = report.outcomes.iter().map(RecordOutcome::index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        match &report.outcomes[1] {
            RecordOutcome::Failed { title, error, .. } => {
                assert_eq!(title, "bad one");
                assert!(matches!(error, StoreError::Rejected(_)));
            }
            other => panic!("expected failure, got {other:?}"),
        }

        let titles: Vec<String> = store
            .find_articles()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(titles.len(), 2);
        assert!(titles.contains(&"first".to_string()));
        assert!(titles.contains(&"third".to_string()));
    }

    #[tokio::test]
    async fn test_scraping_twice_duplicates() {
        let store = Store::in_memory().unwrap();
        let blocks: Vec<String> = (0..4)
            .map(|i| block(&format!("story {i}"), &format!("/{i}"), "same"))
            .collect();
        let ingestor = Ingestor::new(page(&blocks), store.clone(), 8);

        for _ in 0..2 {
            let report = ingestor
                .run_scrape()
                .await
                .unwrap()
                .completion()
                .await
                .unwrap();
            assert_eq!(report.created(), 4);
        }
        assert_eq!(store.find_articles().await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_overlapping_scrapes_both_store() {
        let store = Store::in_memory().unwrap();
        let blocks: Vec<String> = (0..10)
            .map(|i| block(&format!("s{i}"), "", ""))
            .collect();
        let ingestor = Ingestor::new(page(&blocks), store.clone(), 3);

        let (a, b) = tokio::join!(ingestor.run_scrape(), ingestor.run_scrape());
        let (a, b) = (a.unwrap(), b.unwrap());
        let (ra, rb) = tokio::join!(a.completion(), b.completion());
        assert_eq!(ra.unwrap().created() + rb.unwrap().created(), 20);
        assert_eq!(store.find_articles().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_page_without_blocks_is_still_accepted() {
        let store = Store::in_memory().unwrap();
        let ingestor = Ingestor::new(page(&[]), store.clone(), 0);

        let accepted = ingestor.run_scrape().await.unwrap();
        assert_eq!(accepted.candidates, 0);
        let report = accepted.completion().await.unwrap();
        assert!(report.outcomes.is_empty());
        assert!(report.finished_at >= report.started_at);
    }
}
