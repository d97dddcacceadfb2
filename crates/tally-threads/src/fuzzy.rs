//! Fuzzy matching of spelled-out alphabets.
//!
//! Some side threads count in words rather than digits (colours, planets,
//! chemical elements). Posters misspell them, so tokens are matched to the
//! nearest alphabet entry by Levenshtein ratio instead of exact comparison.

use std::collections::HashMap;

/// Accept a word as an alphabet entry when the similarity reaches this.
pub const MATCH_THRESHOLD: f64 = 0.8;

/// Normalised similarity between two words, 1.0 for equal strings.
pub fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Best similarity of `needle` against any window of `haystack` of the same
/// length. Used for forms that look for a marker anywhere in the body.
pub fn partial_ratio(needle: &str, haystack: &str) -> f64 {
    let needle_chars: Vec<char> = needle.chars().collect();
    let hay_chars: Vec<char> = haystack.chars().collect();
    if needle_chars.is_empty() {
        return 1.0;
    }
    if hay_chars.len() <= needle_chars.len() {
        return ratio(needle, haystack);
    }
    let mut best: f64 = 0.0;
    for window in hay_chars.windows(needle_chars.len()) {
        let window: String = window.iter().collect();
        best = best.max(ratio(needle, &window));
        if best == 1.0 {
            break;
        }
    }
    best
}

/// An ordered alphabet of words with digit values, for word-list counting.
///
/// Matching is case-insensitive; rendering uses the spelling the alphabet
/// was registered with (element symbols need their capitals back). Several
/// words may share a value (aliases like "isengard"/"gard"); the first word
/// registered for a value is the canonical spelling.
#[derive(Debug, Clone)]
pub struct WordAlphabet {
    /// (lowercased word, value) pairs for matching.
    entries: Vec<(String, u128)>,
    by_value: HashMap<u128, String>,
    radix: u128,
}

impl WordAlphabet {
    /// Words in list order, valued by position. `bijective` shifts values to
    /// start at one, for threads whose word lists have no zero.
    pub fn from_list<I, S>(words: I, bijective: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let shift = u128::from(bijective);
        let entries: Vec<(String, u128)> = words
            .into_iter()
            .enumerate()
            .map(|(pos, word)| (word.into(), pos as u128 + shift))
            .collect();
        let radix = entries.len() as u128;
        Self::from_entries(entries, radix)
    }

    pub fn from_entries<I, S>(entries: I, radix: u128) -> Self
    where
        I: IntoIterator<Item = (S, u128)>,
        S: Into<String>,
    {
        let original: Vec<(String, u128)> =
            entries.into_iter().map(|(word, value)| (word.into(), value)).collect();
        let mut by_value = HashMap::new();
        for (word, value) in &original {
            by_value.entry(*value).or_insert_with(|| word.clone());
        }
        let entries = original
            .into_iter()
            .map(|(word, value)| (word.to_lowercase(), value))
            .collect();
        Self {
            entries,
            by_value,
            radix,
        }
    }

    pub fn radix(&self) -> u128 {
        self.radix
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(word, _)| word.as_str())
    }

    /// The canonical word for a digit value.
    pub fn word_for(&self, value: u128) -> Option<&str> {
        self.by_value.get(&value).map(String::as_str)
    }

    /// The value of the nearest entry, or None when nothing reaches the
    /// match threshold.
    pub fn match_word(&self, word: &str) -> Option<u128> {
        let word = word.to_lowercase();
        self.entries
            .iter()
            .map(|(entry, value)| (ratio(entry, &word), *value))
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .filter(|(score, _)| *score >= MATCH_THRESHOLD)
            .map(|(_, value)| value)
    }
}

/// Split a body's first line into candidate words, dropping ignored
/// characters first.
pub fn tokenize_words(body: &str, ignored_chars: &str) -> Vec<String> {
    let line = body.lines().next().unwrap_or("");
    let line: String = line.chars().filter(|c| !ignored_chars.contains(*c)).collect();
    line.split_whitespace().map(str::to_owned).collect()
}

/// Split a line into element-symbol tokens: each token starts at an
/// uppercase letter ("NaClH" → "Na", "Cl", "H").
pub fn tokenize_elements(body: &str) -> Vec<String> {
    let line = body.lines().next().unwrap_or("");
    let mut tokens: Vec<String> = Vec::new();
    for c in line.chars() {
        if c.is_ascii_uppercase() {
            tokens.push(c.to_string());
        } else if let Some(last) = tokens.last_mut() {
            last.push(c);
        }
    }
    tokens.iter().map(|t| t.trim().to_owned()).filter(|t| !t.is_empty()).collect()
}

/// Map words to digit values until the first word below the match
/// threshold; that word and everything after it are discarded.
pub fn match_tokens(alphabet: &WordAlphabet, words: &[String]) -> Vec<u128> {
    let mut values = Vec::new();
    for word in words {
        match alphabet.match_word(word) {
            Some(value) => values.push(value),
            None => break,
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_fuzzy_matches() {
        let planets = WordAlphabet::from_list(
            ["mercury", "venus", "earth", "mars", "jupiter", "saturn", "uranus", "neptune"],
            false,
        );
        assert_eq!(planets.match_word("venus"), Some(1));
        assert_eq!(planets.match_word("Jupitor"), Some(4));
        assert_eq!(planets.match_word("xqzzt"), None);
    }

    #[test]
    fn below_threshold_word_terminates_the_list() {
        let colors = WordAlphabet::from_list(
            ["red", "orange", "yellow", "green", "blue", "indigo", "violet"],
            false,
        );
        let words = tokenize_words("red green blurptch blue", "");
        assert_eq!(match_tokens(&colors, &words), vec![0, 3]);
    }

    #[test]
    fn element_tokens_split_on_capitals() {
        assert_eq!(tokenize_elements("NaCl"), vec!["Na", "Cl"]);
        assert_eq!(tokenize_elements("HHeLi"), vec!["H", "He", "Li"]);
    }

    #[test]
    fn partial_ratio_finds_substrings() {
        assert!(partial_ratio("illion", "three quadrillion") > MATCH_THRESHOLD);
        assert!(partial_ratio("u/throwaway", "u/throwaway12345 counts 7") > MATCH_THRESHOLD);
        assert!(partial_ratio("illion", "12345") < MATCH_THRESHOLD);
    }

    #[test]
    fn shared_values_render_canonically() {
        let isenary = WordAlphabet::from_entries(
            [
                ("they're", 1),
                ("taking", 2),
                ("the", 3),
                ("hobbits", 4),
                ("to", 5),
                ("isengard", 0),
                ("gard", 0),
            ],
            6,
        );
        assert_eq!(isenary.word_for(0), Some("isengard"));
        assert_eq!(isenary.match_word("gard"), Some(0));
    }
}
