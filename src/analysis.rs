//! Word frequency over translated headlines.
//!
//! Headlines are lowercased and split into maximal alphabetic words
//! (`\b[a-z]+\b`); digits, punctuation and symbols are dropped. Counts are
//! global across the batch and only words seen more than
//! [`REPEAT_THRESHOLD`] times are kept.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

/// A word must occur more than this many times to be reported.
pub const REPEAT_THRESHOLD: usize = 2;

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-z]+\b").expect("static regex"));

/// Words and their counts, in the order each word was first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WordFrequency {
    entries: Vec<(String, usize)>,
}

impl WordFrequency {
    #[cfg(test)]
    pub fn get(&self, word: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(w, _)| w == word)
            .map(|(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(w, c)| (w.as_str(), *c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Count words across `headlines` and keep those repeated more than
/// [`REPEAT_THRESHOLD`] times.
pub fn analyze<S: AsRef<str>>(headlines: &[S]) -> WordFrequency {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for headline in headlines {
        let lowered = headline.as_ref().to_lowercase();
        for word in WORD.find_iter(&lowered) {
            let count = counts.entry(word.as_str().to_string()).or_insert_with(|| {
                order.push(word.as_str().to_string());
                0
            });
            *count += 1;
        }
    }

    let entries = order
        .into_iter()
        .filter_map(|word| {
            let count = counts.get(&word).copied().unwrap_or_default();
            (count > REPEAT_THRESHOLD).then_some((word, count))
        })
        .collect();
    WordFrequency { entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storm_city_example() {
        let headlines = [
            "Storm hits city",
            "City storm warning issued",
            "Storm storm everywhere city",
        ];
        let freq = analyze(&headlines);

        assert_eq!(freq.get("storm"), Some(4));
        assert_eq!(freq.get("city"), Some(3));
        assert_eq!(freq.get("warning"), None);
        assert_eq!(freq.get("issued"), None);
        assert_eq!(freq.get("hits"), None);
        assert_eq!(
            freq.iter().collect::<Vec<_>>(),
            vec![("storm", 4), ("city", 3)]
        );
    }

    #[test]
    fn test_exactly_threshold_is_excluded() {
        let freq = analyze(&["war and peace", "war again"]);
        assert!(freq.is_empty());
    }

    #[test]
    fn test_digits_and_punctuation_are_dropped() {
        let freq = analyze(&[
            "2024: the budget, the vote!",
            "The 3 vote-counting rules",
            "the end",
        ]);
        assert_eq!(freq.get("the"), Some(4));
        assert_eq!(freq.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let empty: [&str; 0] = [];
        assert!(analyze(&empty).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let headlines = vec!["a b a".to_string(), "b a b".to_string(), "a b".to_string()];
        assert_eq!(analyze(&headlines), analyze(&headlines));
        assert_eq!(analyze(&headlines).len(), 2);
    }
}
