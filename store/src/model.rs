use chrono::{DateTime, Utc};
use std::collections::HashMap;
use url::Url;

/// Which text surface a word occurrence was found in. TF/IDF are computed
/// per stream independently, then combined in scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Plaintext,
    Title,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Stream::Plaintext => "plaintext",
            Stream::Title => "title",
        }
    }
}

/// A single word's occurrence record within one page/stream.
#[derive(Debug, Clone, PartialEq)]
pub struct WordOccurrence {
    /// Strictly ascending, non-negative token positions.
    pub positions: Vec<u32>,
    /// `positions.len()`.
    pub frequency: u32,
    /// `frequency / max_frequency_in_stream_on_page`, in `[0, 1]`.
    pub tf_normalized: f32,
}

impl WordOccurrence {
    /// Construct a [`WordOccurrence`], validating its invariants: positions
    /// strictly ascending and non-empty, frequency equal to the position
    /// count, `tf_normalized` in `[0, 1]`.
    pub fn new(positions: Vec<u32>, tf_normalized: f32) -> Result<Self, crate::StoreError> {
        if positions.is_empty() {
            return Err(crate::StoreError::Validation(
                "word occurrence must have at least one position".into(),
            ));
        }
        if !positions.windows(2).all(|w| w[0] < w[1]) {
            return Err(crate::StoreError::Validation(
                "word occurrence positions must be strictly ascending".into(),
            ));
        }
        if !(0.0..=1.0).contains(&tf_normalized) {
            return Err(crate::StoreError::Validation(format!(
                "tf_normalized {tf_normalized} out of [0, 1]"
            )));
        }
        Ok(WordOccurrence {
            frequency: positions.len() as u32,
            positions,
            tf_normalized,
        })
    }
}

/// A fully-processed page, ready to be persisted. Produced by the page
/// indexer, consumed (moved) by [`crate::Store::index_page`].
#[derive(Debug, Clone)]
pub struct IndexedPage {
    pub url: Url,
    pub mod_time: DateTime<Utc>,
    pub size: i64,
    pub raw_text: String,
    pub plaintext: String,
    pub title: Option<String>,
    pub links: Vec<Url>,
    pub word_occurrences: HashMap<String, WordOccurrence>,
    pub word_occurrences_title: HashMap<String, WordOccurrence>,
}

impl IndexedPage {
    pub fn occurrences(&self, stream: Stream) -> &HashMap<String, WordOccurrence> {
        match stream {
            Stream::Plaintext => &self.word_occurrences,
            Stream::Title => &self.word_occurrences_title,
        }
    }
}

/// A lightweight, queryable page row, as returned by [`crate::Store::iterate_pages`]
/// and friends.
#[derive(Debug, Clone)]
pub struct PageRow {
    pub id: i32,
    pub url: Url,
    pub mod_time: DateTime<Utc>,
    pub size: i64,
    pub title: Option<String>,
    pub plaintext: String,
    pub raw_title_html: Option<String>,
}

pub(crate) fn positions_to_string(positions: &[u32]) -> String {
    positions.iter().map(u32::to_string).collect::<Vec<_>>().join(",")
}

pub(crate) fn positions_from_string(s: &str) -> Vec<u32> {
    if s.is_empty() {
        return Vec::new();
    }
    s.split(',').filter_map(|p| p.parse().ok()).collect()
}
