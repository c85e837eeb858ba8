use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;

// Scientific prefixes stripped before the suffix steps run. Order matters:
// the first matching prefix wins.
const PREFIXES: &[&str] = &[
    "kilo", "micro", "milli", "intra", "ultra", "mega", "nano", "pico", "pseudo",
];

const STEP2_REPLACEMENTS: &[(&str, &str)] = &[
    ("ational", "ate"),
    ("tional", "tion"),
    ("enci", "ence"),
    ("anci", "ance"),
    ("izer", "ize"),
    ("iser", "ize"),
    ("abli", "able"),
    ("alli", "al"),
    ("entli", "ent"),
    ("eli", "e"),
    ("ousli", "ous"),
    ("ization", "ize"),
    ("isation", "ize"),
    ("ation", "ate"),
    ("ator", "ate"),
    ("alism", "al"),
    ("iveness", "ive"),
    ("fulness", "ful"),
    ("ousness", "ous"),
    ("aliti", "al"),
    ("iviti", "ive"),
    ("biliti", "ble"),
];

const STEP3_REPLACEMENTS: &[(&str, &str)] = &[
    ("icate", "ic"),
    ("ative", ""),
    ("alize", "al"),
    ("alise", "al"),
    ("iciti", "ic"),
    ("ical", "ic"),
    ("ful", ""),
    ("ness", ""),
];

const STEP4_REPLACEMENTS: &[&str] = &[
    "al", "ance", "ence", "er", "ic", "able", "ible", "ant", "ement", "ment", "ent", "sion",
    "tion", "ou", "ism", "ate", "iti", "ous", "ive", "ize", "ise",
];

const WXY: &[char] = &['w', 'x', 'y'];
const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u', 'y'];
const NOT_SEMIVOWELS: &[(char, char)] = &[
    ('a', 'y'),
    ('e', 'y'),
    ('i', 'y'),
    ('o', 'y'),
    ('u', 'y'),
];

static STEM_CACHE: Lazy<Mutex<HashMap<String, String>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Run the classical Porter stemming algorithm on an already-normalized
/// token. Words of length <= 2 are returned unchanged. Results are memoized
/// process-wide, since the stemmer is a pure function of its input.
pub fn stem(normalized: &str) -> String {
    if let Some(cached) = STEM_CACHE.lock().expect("stem cache mutex poisoned").get(normalized) {
        return cached.clone();
    }

    let result = stem_uncached(normalized);

    STEM_CACHE
        .lock()
        .expect("stem cache mutex poisoned")
        .insert(normalized.to_string(), result.clone());

    result
}

fn stem_uncached(word: &str) -> String {
    if word.chars().count() <= 2 {
        return word.to_string();
    }
    let stripped_prefix = strip_prefix(word);
    strip_suffix(&stripped_prefix)
}

fn strip_prefix(word: &str) -> String {
    for prefix in PREFIXES {
        if let Some(rest) = word.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    word.to_string()
}

fn strip_suffix(word: &str) -> String {
    let mut word = word.to_string();
    for step in [step1, step2, step3, step4, step5] {
        if word.is_empty() {
            return String::new();
        }
        word = step(&word);
    }
    word
}

fn is_vowel_seg(prev: char, cur: char) -> bool {
    VOWELS.contains(&cur) && !NOT_SEMIVOWELS.contains(&(prev, cur))
}

fn vowel_sequence(word: &str) -> Vec<bool> {
    let mut prev = 'a';
    let mut seq = Vec::with_capacity(word.chars().count());
    for c in word.chars() {
        seq.push(is_vowel_seg(prev, c));
        prev = c;
    }
    seq
}

/// The "m" measure: the number of vowel-consonant transitions in the word.
fn measure(word: &str) -> usize {
    let seq = vowel_sequence(word);
    seq.windows(2).filter(|w| w[0] && !w[1]).count()
}

fn contains_vowel(word: &str) -> bool {
    vowel_sequence(word).into_iter().any(|v| v)
}

/// Whether `word` ends in consonant-vowel-consonant, with the final
/// consonant not w/x/y.
fn cvc(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    let n = chars.len();
    if n < 3 {
        return false;
    }
    let last = chars[n - 1];
    if WXY.contains(&last) {
        return false;
    }
    if is_vowel_seg(chars[n - 2], chars[n - 1]) {
        return false;
    }
    if !is_vowel_seg(chars[n - 3], chars[n - 2]) {
        return false;
    }
    let third_is_vowel_seg = if n == 3 {
        is_vowel_seg('?', chars[n - 3])
    } else {
        is_vowel_seg(chars[n - 4], chars[n - 3])
    };
    !third_is_vowel_seg
}

fn remove_suffix(word: &str, suffix: &str) -> String {
    word.strip_suffix(suffix).unwrap_or(word).to_string()
}

fn step1(word: &str) -> String {
    let mut word = word.to_string();

    if word.ends_with('s') {
        if (word.ends_with("sses") || word.ends_with("ies")) && word != "sses" && word != "ies" {
            word.truncate(word.len() - 2);
        } else if word.len() == 1 {
            return String::new();
        } else {
            let chars: Vec<char> = word.chars().collect();
            if chars[chars.len() - 2] != 's' {
                word.pop();
            }
        }
    }

    if word.ends_with("eed") && word.chars().count() > 3 {
        let stem_part = &word[..word.len() - 3];
        if measure(stem_part) > 0 {
            word.pop();
        }
    } else {
        let word2_ed = remove_suffix(&word, "ed");
        let (matched, word2) = if word2_ed != word {
            (true, word2_ed)
        } else {
            let word2_ing = remove_suffix(&word, "ing");
            (word2_ing != word, word2_ing)
        };

        if matched && contains_vowel(&word2) {
            word = word2;
            if word.chars().count() <= 1 {
                return word;
            }
            if (word.ends_with("at") || word.ends_with("bl") || word.ends_with("iz"))
                && word.chars().count() > 2
            {
                word.push('e');
            } else {
                let chars: Vec<char> = word.chars().collect();
                let last = chars[chars.len() - 1];
                let second_last = chars[chars.len() - 2];
                if last != 'l' && last != 's' && last != 'z' && last == second_last {
                    word.pop();
                } else if measure(&word) == 1 && cvc(&word) {
                    word.push('e');
                }
            }
        }
    }

    if word.ends_with('y') && contains_vowel(&word[..word.len() - 1]) {
        word.truncate(word.len() - 1);
        word.push('i');
    }

    word
}

fn step2(word: &str) -> String {
    for (find, replace) in STEP2_REPLACEMENTS {
        let word2 = remove_suffix(word, find);
        if word2 != word && measure(&word2) > 0 {
            return format!("{word2}{replace}");
        }
    }
    word.to_string()
}

fn step3(word: &str) -> String {
    for (find, replace) in STEP3_REPLACEMENTS {
        let word2 = remove_suffix(word, find);
        if word2 != word && measure(&word2) > 0 {
            return format!("{word2}{replace}");
        }
    }
    word.to_string()
}

fn step4(word: &str) -> String {
    for find in STEP4_REPLACEMENTS {
        let word2 = remove_suffix(word, find);
        if word2 != *word && measure(&word2) > 1 {
            return word2;
        }
    }
    word.to_string()
}

fn step5(word: &str) -> String {
    let mut word = word.to_string();

    if word.ends_with('e') {
        let m = measure(&word);
        if m > 1 {
            word.pop();
        } else if m == 1 {
            let word2 = word[..word.len() - 1].to_string();
            if !cvc(&word2) {
                word = word2;
            }
        }
    }

    if word.chars().count() == 1 {
        return word;
    }

    if word.ends_with("ll") && measure(&word) > 1 {
        word.pop();
    }

    word
}
