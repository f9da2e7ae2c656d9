//! AllSides "balanced news" front page extractor.
//!
//! The page lists stories as repeating `.top-content-wrapper` blocks. Each
//! block carries a headline link under `.news-title a` and a summary under
//! `.news-body`:
//!
//! ```html
//! <div class="top-content-wrapper">
//!   <div class="news-title"><a href="/story/some-slug">Headline</a></div>
//!   <div class="news-body">Summary text…</div>
//! </div>
//! ```
//!
//! Extraction never fails. A block that lacks a headline or summary still
//! yields a record, with the missing fields left empty.

use crate::models::Record;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};

static BLOCK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".top-content-wrapper").expect("valid block selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".news-title a").expect("valid title selector"));
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".news-body").expect("valid body selector"));

/// Parse `document` and return one [`Record`] per content block, in
/// document order.
#[instrument(level = "info", skip_all, fields(bytes = document.len()))]
pub fn extract(document: &str) -> Vec<Record> {
    let html = Html::parse_document(document);
    let records: Vec<Record> = html.select(&BLOCK_SELECTOR).map(read_block).collect();
    info!(count = records.len(), "Extracted candidate articles");
    records
}

fn read_block(block: ElementRef<'_>) -> Record {
    let title = concat_text(block, &TITLE_SELECTOR);
    let link = block
        .select(&TITLE_SELECTOR)
        .next()
        .and_then(|a| a.value().attr("href"))
        .unwrap_or_default()
        .to_string();
    let body = concat_text(block, &BODY_SELECTOR);

    if title.is_empty() || body.is_empty() {
        debug!(
            has_title = !title.is_empty(),
            has_link = !link.is_empty(),
            has_body = !body.is_empty(),
            "Content block is missing fields"
        );
    }
    Record { title, link, body }
}

/// Text of every element under `scope` matching `selector`, joined without
/// separators.
fn concat_text(scope: ElementRef<'_>, selector: &Selector) -> String {
    scope
        .select(selector)
        .flat_map(|el| el.text())
        .collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(blocks: &str) -> String {
        format!(
            "<!DOCTYPE html><html><head><title>Balanced News</title></head>\
             <body><nav><a href=\"/\">Home</a></nav><main>{blocks}</main></body></html>"
        )
    }

    const FULL_BLOCK: &str = r#"<div class="top-content-wrapper"><div class="news-title"><a href="/a">X</a></div><div class="news-body">Y</div></div>"#;

    #[test]
    fn test_single_block() {
        let records = extract(&page(FULL_BLOCK));
        assert_eq!(
            records,
            vec![Record {
                title: "X".to_string(),
                link: "/a".to_string(),
                body: "Y".to_string(),
            }]
        );
    }

    #[test]
    fn test_one_record_per_block_in_order() {
        let blocks = (1..=5)
            .map(|i| {
                format!(
                    r#"<div class="top-content-wrapper"><div class="news-title"><a href="/story/{i}">Story {i}</a></div><div class="news-body">Body {i}</div></div>"#
                )
            })
            .collect::<String>();
        let records = extract(&page(&blocks));
        assert_eq!(records.len(), 5);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.title, format!("Story {}", i + 1));
            assert_eq!(record.link, format!("/story/{}", i + 1));
            assert_eq!(record.body, format!("Body {}", i + 1));
        }
    }

    #[test]
    fn test_missing_fields_become_empty() {
        let blocks = concat!(
            r#"<div class="top-content-wrapper"><div class="news-body">only body</div></div>"#,
            r#"<div class="top-content-wrapper"><div class="news-title"><a>no href</a></div></div>"#,
            r#"<div class="top-content-wrapper"><div class="news-title">no anchor</div></div>"#,
        );
        let records = extract(&page(blocks));
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].title, "");
        assert_eq!(records[0].link, "");
        assert_eq!(records[0].body, "only body");

        assert_eq!(records[1].title, "no href");
        assert_eq!(records[1].link, "");
        assert_eq!(records[1].body, "");

        // `.news-title` without an `a` does not count as a title
        assert_eq!(records[2], Record::default());
    }

    #[test]
    fn test_empty_block_still_emitted() {
        let records = extract(&page(r#"<div class="top-content-wrapper"></div>"#));
        assert_eq!(records, vec![Record::default()]);
    }

    #[test]
    fn test_no_blocks() {
        assert!(extract(&page("<p>nothing here</p>")).is_empty());
        assert!(extract("").is_empty());
    }

    #[test]
    fn test_malformed_markup_does_not_fail() {
        let doc = r#"<div class="top-content-wrapper"><div class="news-title"><a href="/broken">Unclosed <b>bold"#;
        let records = extract(doc);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].link, "/broken");
        assert_eq!(records[0].title, "Unclosed bold");
    }

    #[test]
    fn test_nested_text_is_concatenated_verbatim() {
        let block = r#"<div class="top-content-wrapper">
<div class="news-title"><a href="https://example.com/x"><span>Split</span> headline</a></div>
<div class="news-body"><p>One.</p><p>Two.</p></div>
</div>"#;
        let records = extract(&page(block));
        assert_eq!(records[0].title, "Split headline");
        assert_eq!(records[0].link, "https://example.com/x");
        assert_eq!(records[0].body, "One.Two.");
    }

    #[test]
    fn test_sub_nodes_are_scoped_to_their_block() {
        let blocks = concat!(
            r#"<div class="top-content-wrapper"><div class="news-title"><a href="/1">First</a></div></div>"#,
            r#"<div class="news-body">stray body outside any block</div>"#,
            r#"<div class="top-content-wrapper"><div class="news-body">Second body</div></div>"#,
        );
        let records = extract(&page(blocks));
        assert_eq!(records[0].body, "");
        assert_eq!(records[1].title, "");
        assert_eq!(records[1].body, "Second body");
    }
}
