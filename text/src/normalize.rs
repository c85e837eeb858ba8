use unicode_normalization::UnicodeNormalization;

/// Normalize a token for search.
///
/// Pipeline: Unicode NFKD (splits accented characters into base + combining
/// diacritic), drop every non-alphanumeric code point (discards the
/// diacritics and any punctuation), Unicode NFKC (recomposes any remaining
/// decomposed characters), then lowercase.
///
/// Returns an empty string if nothing alphanumeric survives.
pub fn normalize(token: &str) -> String {
    let decomposed: String = token.nfkd().collect();
    let stripped: String = decomposed.chars().filter(|c| c.is_alphanumeric()).collect();
    let recomposed: String = stripped.nfkc().collect();
    recomposed.to_lowercase()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strips_diacritics() {
        assert_eq!(normalize("café"), "cafe");
    }

    #[test]
    fn strips_punctuation() {
        assert_eq!(normalize("don't"), "dont");
        assert_eq!(normalize("'s"), "s");
    }

    #[test]
    fn lowercases() {
        assert_eq!(normalize("HELLO"), "hello");
    }

    #[test]
    fn empty_when_nothing_alphanumeric_survives() {
        assert_eq!(normalize("---"), "");
        assert_eq!(normalize(""), "");
    }
}
