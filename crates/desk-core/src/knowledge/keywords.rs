//! Keyword extraction for knowledge matching

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Words carrying no meaning for matching
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "being", "been", "of", "at", "in", "on",
    "to", "for", "with", "about", "by", "do", "you", "what", "how",
];

/// Words this short or shorter are dropped
const MIN_WORD_LEN: usize = 3;

static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s]").expect("valid punctuation pattern"));

/// Extract unique, significant keywords from a piece of text
///
/// Lowercases, strips punctuation, drops stop words and short words.
/// Keywords come back in first-seen order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = PUNCTUATION.replace_all(&lowered, "");

    let mut seen = HashSet::new();
    cleaned
        .split_whitespace()
        .filter(|word| word.chars().count() >= MIN_WORD_LEN && !STOP_WORDS.contains(word))
        .filter(|word| seen.insert(word.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_significant_words() {
        assert_eq!(
            extract_keywords("When is the opening time of the saloon?"),
            vec!["when", "opening", "time", "saloon"]
        );
    }

    #[test]
    fn test_deduplicates_in_order() {
        assert_eq!(
            extract_keywords("Color, color and COLOR treatment"),
            vec!["color", "and", "treatment"]
        );
    }

    #[test]
    fn test_no_keywords() {
        assert!(extract_keywords("").is_empty());
        assert!(extract_keywords("Is it?!").is_empty());
        assert!(extract_keywords("do you ...").is_empty());
    }
}
