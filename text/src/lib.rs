//! Text pipeline: tokenization, Unicode normalization, stop-word filtering,
//! and Porter stemming. Pure functions from text to ordered `(position,
//! stem)` pairs.

mod normalize;
mod stem;
mod tokenize;

use once_cell::sync::Lazy;
use std::collections::HashSet;

pub use normalize::normalize;
pub use stem::stem;
pub use tokenize::tokenize;

const STOP_WORDS_RESOURCE: &str = include_str!("../resources/stop_words.txt");

static STOP_WORDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| STOP_WORDS_RESOURCE.lines().map(str::trim).filter(|l| !l.is_empty()).collect());

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word)
}

/// Default text transformation pipeline: tokenize, normalize, filter stop
/// words, stem. Empties and stop-words are dropped entirely (neither appears
/// in the output sequence).
pub fn default_transform(text: &str) -> impl Iterator<Item = (usize, String)> + '_ {
    tokenize(text).filter_map(|(pos, token)| {
        let normalized = normalize(token);
        if normalized.is_empty() || is_stop_word(&normalized) {
            return None;
        }
        let stemmed = stem(&normalized);
        if stemmed.is_empty() {
            None
        } else {
            Some((pos, stemmed))
        }
    })
}

/// Default text transformation pipeline for a single already-extracted word
/// (e.g. one term of a search query). Returns an empty string if the word
/// normalizes to nothing or is a stop word.
pub fn default_transform_word(word: &str) -> String {
    let normalized = normalize(word);
    if normalized.is_empty() || is_stop_word(&normalized) {
        return String::new();
    }
    stem(&normalized)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sneed_feed_and_seed() {
        let stems: Vec<_> = default_transform("Sneed's Feed and Seed").collect();
        assert_eq!(
            stems,
            vec![
                (0, "sneed".to_string()),
                (8, "feed".to_string()),
                (17, "seed".to_string()),
            ]
        );
    }

    #[test]
    fn stop_words_are_dropped() {
        let stems: Vec<_> = default_transform("the and of").collect();
        assert!(stems.is_empty());
    }

    #[test]
    fn empty_text_yields_empty_sequence() {
        assert_eq!(default_transform("").count(), 0);
    }

    #[test]
    fn default_transform_word_filters_stop_words() {
        assert_eq!(default_transform_word("the"), "");
        assert_ne!(default_transform_word("hippopotamus"), "");
    }
}
