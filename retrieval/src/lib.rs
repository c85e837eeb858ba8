//! Query parsing and TF-IDF/cosine-similarity retrieval.
//!
//! A query is lexed into terms and quoted phrases, terms are reduced to
//! stems through the same pipeline used at indexing time, and the
//! resulting candidate pages are scored by combining per-stream cosine
//! similarity with a fixed boost for matches found in the page title.

use std::cmp::Ordering;

use store::{PageRow, Store, StoreError, Stream};

/// A title match counts for this many times what a plaintext match counts
/// for, when combining the two streams' cosine similarities into one score.
pub const TITLE_BOOST_WEIGHT: f32 = 3.9;

/// One lexical unit of a raw query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryToken {
    Term(String),
    Phrase(String),
}

/// Split a raw query into terms and double-quoted phrases. An unterminated
/// trailing quote is treated as closed at end of input: malformed queries
/// degrade to a best-effort parse rather than failing.
pub fn lex_query(query: &str) -> Vec<QueryToken> {
    let mut tokens = Vec::new();
    let mut chars = query.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&next) = chars.peek() else { break };

        if next == '"' {
            chars.next();
            let mut phrase = String::new();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                phrase.push(c);
            }
            if !phrase.trim().is_empty() {
                tokens.push(QueryToken::Phrase(phrase));
            }
        } else {
            let mut term = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '"' {
                    break;
                }
                term.push(c);
                chars.next();
            }
            if !term.is_empty() {
                tokens.push(QueryToken::Term(term));
            }
        }
    }

    tokens
}

/// A lexed query, split into loose terms and quoted phrases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub terms: Vec<String>,
    pub phrases: Vec<String>,
}

pub fn parse_query(tokens: &[QueryToken]) -> ParsedQuery {
    let mut parsed = ParsedQuery::default();
    for token in tokens {
        match token {
            QueryToken::Term(t) => parsed.terms.push(t.clone()),
            QueryToken::Phrase(p) => {
                parsed.phrases.push(p.clone());
                parsed.terms.extend(p.split_whitespace().map(str::to_owned));
            }
        }
    }
    parsed
}

/// One scored search result.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub page: PageRow,
    pub score: f32,
}

/// Run a query against the store: lex and parse it, reduce its terms to
/// stems, find candidate pages containing at least one stem, filter by any
/// quoted phrases (a case-sensitive substring match against title or
/// plaintext — no word-boundary check, a quirk preserved from the system
/// this was distilled from), then rank survivors by combined TF-IDF cosine
/// similarity.
pub async fn search(store: &Store, query: &str, limit: usize) -> Result<Vec<SearchResult>, StoreError> {
    let parsed = parse_query(&lex_query(query));
    log::debug!("parsed query into {} term(s), {} phrase(s)", parsed.terms.len(), parsed.phrases.len());

    let mut stems: Vec<String> = Vec::new();
    for term in &parsed.terms {
        let stem = text::default_transform_word(term);
        if !stem.is_empty() && !stems.contains(&stem) {
            stems.push(stem);
        }
    }

    if stems.is_empty() {
        return Ok(Vec::new());
    }

    let word_ids = store.word_ids_for_stems(&stems).await?;
    if word_ids.is_empty() {
        return Ok(Vec::new());
    }

    let candidate_ids = store.candidate_pages(&word_ids).await?;
    log::debug!("{} candidate page(s) for {} stem(s)", candidate_ids.len(), stems.len());
    if candidate_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut pages = store.pages_by_ids(&candidate_ids).await?;
    if !parsed.phrases.is_empty() {
        pages.retain(|page| parsed.phrases.iter().all(|phrase| page_contains_phrase(page, phrase)));
    }
    if pages.is_empty() {
        return Ok(Vec::new());
    }

    let page_ids: Vec<i32> = pages.iter().map(|p| p.id).collect();
    let total_pages = store.count_pages().await?;

    let mut scores = vec![0.0f32; pages.len()];
    for stream in [Stream::Plaintext, Stream::Title] {
        let tf = store.tf_many(&page_ids, &word_ids, stream).await?;
        let df = store.doc_frequency_many(&word_ids, stream).await?;
        let idf = idf_many(total_pages, &df);
        let weight = match stream {
            Stream::Plaintext => 1.0,
            Stream::Title => TITLE_BOOST_WEIGHT,
        };
        for (i, row) in tf.iter().enumerate() {
            let tf_idf = tf_idf_vector(row, &idf);
            scores[i] += weight * cosine_similarity(&tf_idf, &query_vector(idf.len()));
        }
    }

    let mut results: Vec<SearchResult> = pages.into_iter().zip(scores).map(|(page, score)| SearchResult { page, score }).collect();
    results.sort_by(|a, b| match b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal) {
        Ordering::Equal => a.page.id.cmp(&b.page.id),
        ord => ord,
    });
    results.truncate(limit);

    Ok(results)
}

fn page_contains_phrase(page: &PageRow, phrase: &str) -> bool {
    page.plaintext.contains(phrase) || page.title.as_deref().is_some_and(|t| t.contains(phrase))
}

/// A query vector of all-ones, one entry per matched stem: a query is
/// treated as containing every one of its stems exactly once.
fn query_vector(len: usize) -> Vec<f32> {
    vec![1.0; len]
}

/// `log2(total_pages / df)` per word, with `df == 0` mapped to `0.0` (a
/// word absent from a stream contributes nothing rather than dividing by
/// zero).
pub fn idf_many(total_pages: i64, doc_frequencies: &[i64]) -> Vec<f32> {
    doc_frequencies
        .iter()
        .map(|&df| if df == 0 { 0.0 } else { (total_pages as f32 / df as f32).log2() })
        .collect()
}

/// Elementwise `tf * idf`.
pub fn tf_idf_vector(tf: &[f32], idf: &[f32]) -> Vec<f32> {
    tf.iter().zip(idf).map(|(t, i)| t * i).collect()
}

/// Cosine similarity between two equal-length vectors. A zero-norm vector
/// on either side yields `0.0` rather than `NaN`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lex_splits_terms_and_phrases() {
        let tokens = lex_query(r#"rust "web search" engine"#);
        assert_eq!(
            tokens,
            vec![
                QueryToken::Term("rust".into()),
                QueryToken::Phrase("web search".into()),
                QueryToken::Term("engine".into()),
            ]
        );
    }

    #[test]
    fn lex_treats_unterminated_quote_as_closed_at_end() {
        let tokens = lex_query(r#""unterminated phrase"#);
        assert_eq!(tokens, vec![QueryToken::Phrase("unterminated phrase".into())]);
    }

    #[test]
    fn lex_ignores_empty_phrase() {
        let tokens = lex_query(r#"a "" b"#);
        assert_eq!(tokens, vec![QueryToken::Term("a".into()), QueryToken::Term("b".into())]);
    }

    #[test]
    fn parse_expands_phrase_into_constituent_terms() {
        let parsed = parse_query(&lex_query(r#""web search" engine"#));
        assert_eq!(parsed.phrases, vec!["web search".to_string()]);
        assert_eq!(parsed.terms, vec!["web".to_string(), "search".to_string(), "engine".to_string()]);
    }

    #[test]
    fn idf_is_zero_for_absent_word() {
        let idf = idf_many(100, &[0, 10]);
        assert_eq!(idf[0], 0.0);
        assert!((idf[1] - (100.0f32 / 10.0).log2()).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_with_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_similarity_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn tf_idf_vector_is_elementwise_product() {
        assert_eq!(tf_idf_vector(&[0.5, 1.0], &[2.0, 0.0]), vec![1.0, 0.0]);
    }
}
