/// Treebank-style word tokenization.
///
/// Words are maximal spans of alphanumeric characters; everything else is
/// emitted as its own single-character token, except that a run of
/// whitespace is skipped rather than emitted. An apostrophe ends the current
/// word span (so that `Sneed's` becomes the two tokens `Sneed` and `'s`,
/// matching the classical Treebank tokenizer's clitic-splitting behavior).
///
/// `start_offset` is the byte index into `text` at which the token begins,
/// preserved unchanged through the rest of the pipeline.
pub fn tokenize(text: &str) -> impl Iterator<Item = (usize, &str)> {
    Tokens { text, pos: 0 }
}

struct Tokens<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.text.as_bytes();

        // Skip whitespace.
        while self.pos < bytes.len() {
            let c = self.text[self.pos..].chars().next().unwrap();
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }

        if self.pos >= bytes.len() {
            return None;
        }

        let start = self.pos;
        let first = self.text[start..].chars().next().unwrap();

        if first.is_alphanumeric() {
            let mut end = start;
            for (offset, c) in self.text[start..].char_indices() {
                if c.is_alphanumeric() {
                    end = start + offset + c.len_utf8();
                } else {
                    break;
                }
            }
            self.pos = end;
            return Some((start, &self.text[start..end]));
        }

        // A non-alphanumeric, non-whitespace character starts a new token.
        // An apostrophe additionally consumes any immediately trailing
        // alphanumeric run, so `'s`, `'re`, `'ll` lex as a single clitic
        // token.
        let mut end = start + first.len_utf8();
        if first == '\'' || first == '\u{2019}' {
            for c in self.text[end..].chars() {
                if c.is_alphanumeric() {
                    end += c.len_utf8();
                } else {
                    break;
                }
            }
        }

        self.pos = end;
        Some((start, &self.text[start..end]))
    }
}
