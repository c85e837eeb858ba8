//! The page indexer.
//!
//! Consumes an [`UnindexedPage`] produced by the crawler and emits an
//! [`store::IndexedPage`] ready to be moved into [`store::Store::index_page`].
//! Pure aside from reading the wall clock as the last fallback for
//! `mod_time`; never fails — unparseable headers degrade to their defined
//! fallbacks rather than erroring.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use url::Url;

use store::{IndexedPage, WordOccurrence};
use utils::ExtractText;

/// A fetched page, as handed off by the crawler, before text processing.
#[derive(Debug, Clone)]
pub struct UnindexedPage {
    pub url: Url,
    pub raw_bytes_as_text: String,
    pub headers: HashMap<String, String>,
    pub links: Vec<Url>,
}

/// Run the full indexing pass on a fetched page: derive `mod_time`/`size`
/// from headers with defined fallbacks, split the document into
/// title/plaintext streams, and build per-stream word occurrence maps.
pub fn index_page(page: UnindexedPage) -> IndexedPage {
    let html = Html::parse_document(&page.raw_bytes_as_text);

    let mod_time = mod_time_from_headers(&page.headers);
    let title = extract_title(&html);
    let plaintext = html.extract_plaintext();
    let size = size_from_headers(&page.headers, &plaintext);

    let word_occurrences = build_occurrences(&plaintext);
    let word_occurrences_title = title.as_deref().map(build_occurrences).unwrap_or_default();

    IndexedPage {
        url: page.url,
        mod_time,
        size,
        raw_text: page.raw_bytes_as_text,
        plaintext,
        title,
        links: page.links,
        word_occurrences,
        word_occurrences_title,
    }
}

fn mod_time_from_headers(headers: &HashMap<String, String>) -> DateTime<Utc> {
    let candidate = header_ci(headers, "last-modified").or_else(|| header_ci(headers, "date"));

    candidate
        .and_then(parse_http_date)
        .unwrap_or_else(Utc::now)
}

/// Parse an HTTP-date (RFC 1123 style, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`).
/// Non-English month/weekday names, or any other malformed input, yield
/// `None` rather than panicking.
fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn size_from_headers(headers: &HashMap<String, String>, plaintext: &str) -> i64 {
    header_ci(headers, "content-length")
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or_else(|| plaintext.chars().count() as i64)
}

fn header_ci<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// The inner HTML of the first `<title>` element, verbatim (any markup
/// nested inside `<title>` is preserved, matching what a browser would
/// display for e.g. `<title>a<span>b</span></title>`).
fn extract_title(html: &Html) -> Option<String> {
    let selector = Selector::parse("title").expect("Parsing `title` selector should not throw an error.");
    html.select(&selector).next().map(|el| el.inner_html())
}

/// Run the default text pipeline over `text` and build the per-stem
/// occurrence map (positions, frequency, tf_normalized), dropping any stem
/// whose positions list would be empty.
fn build_occurrences(text: &str) -> HashMap<String, WordOccurrence> {
    let mut positions: HashMap<String, Vec<u32>> = HashMap::new();
    for (pos, stem) in text::default_transform(text) {
        positions.entry(stem).or_default().push(pos as u32);
    }

    let max_frequency = positions.values().map(Vec::len).max().unwrap_or(0);

    positions
        .into_iter()
        .filter_map(|(stem, positions)| {
            if positions.is_empty() {
                return None;
            }
            let tf_normalized = if max_frequency == 0 { 0.0 } else { positions.len() as f32 / max_frequency as f32 };
            WordOccurrence::new(positions, tf_normalized).ok().map(|occ| (stem, occ))
        })
        .collect()
}
