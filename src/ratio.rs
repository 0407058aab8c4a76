// File: src/ratio.rs
use crate::core::trie::Trie;
use crate::core::types::{Count, PrefixRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Minimum number of completions a prefix needs for its standalone count.
///
/// Genuine stems collect more varied completions as they get more popular;
/// below 3000 standalone occurrences there is no requirement at all.
pub fn required_following(standalone: Count) -> Option<f64> {
    let s = standalone as f64;
    match standalone {
        0..=2_999 => None,
        3_000..=5_000 => Some(1.0),
        5_001..=20_000 => Some(s / 500.0 - 10.0),
        _ => Some(s / 120.0 - 135.0),
    }
}

pub fn is_low_diversity(standalone: Count, following: Count) -> bool {
    required_following(standalone).is_some_and(|min| (following as f64) < min)
}

/// Prefixes flagged for sparse completions. Identity only.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlaggedPrefixSet {
    prefixes: BTreeSet<String>,
}

impl FlaggedPrefixSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, prefix: impl Into<String>) -> bool {
        self.prefixes.insert(prefix.into())
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.prefixes.contains(prefix)
    }

    /// Whether `password` equals or starts with a flagged entry, which is the
    /// test a downstream line filter applies.
    pub fn matches(&self, password: &str) -> bool {
        password
            .char_indices()
            .map(|(i, _)| &password[..i])
            .chain(std::iter::once(password))
            .any(|p| !p.is_empty() && self.prefixes.contains(p))
    }

    pub fn extend(&mut self, other: FlaggedPrefixSet) {
        self.prefixes.extend(other.prefixes);
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }
}

impl FromIterator<String> for FlaggedPrefixSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self { prefixes: iter.into_iter().collect() }
    }
}

pub struct RatioClassifier {
    threshold: Count,
}

impl RatioClassifier {
    pub fn new(threshold: Count) -> Self {
        Self { threshold }
    }

    /// Qualifying prefixes of one corpus with their counts.
    pub fn records(&self, trie: &Trie) -> Vec<PrefixRecord> {
        trie.qualifying_records(self.threshold)
    }

    pub fn classify(&self, records: &[PrefixRecord]) -> FlaggedPrefixSet {
        records
            .iter()
            .filter(|r| is_low_diversity(r.standalone_count, r.following_count))
            .map(|r| r.prefix.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_boundaries() {
        assert!(is_low_diversity(3_000, 0));
        assert!(!is_low_diversity(3_000, 1));
        assert!(!is_low_diversity(2_999, 0));
        assert!(is_low_diversity(5_000, 0));
        assert!(!is_low_diversity(5_000, 1));
        assert_eq!(required_following(20_000), Some(30.0));
        assert!(is_low_diversity(20_000, 29));
        assert!(!is_low_diversity(20_000, 30));
        assert_eq!(required_following(24_000), Some(65.0));
        assert_eq!(required_following(10_000), Some(10.0));
    }

    #[test]
    fn middle_branch_starts_just_above_5000() {
        // 5001/500 - 10 = 0.002, so a single completion is enough.
        assert!(is_low_diversity(5_001, 0));
        assert!(!is_low_diversity(5_001, 1));
    }

    #[test]
    fn classify_uses_trie_counts() {
        let mut trie = Trie::new();
        for _ in 0..3_001 {
            trie.insert("qwerty");
            trie.insert("dragon");
        }
        trie.insert("dragon1");
        for _ in 0..999 {
            trie.insert("rare");
        }
        let classifier = RatioClassifier::new(1_000);
        let records = classifier.records(&trie);
        assert_eq!(records.len(), 2);
        let flagged = classifier.classify(&records);
        assert_eq!(flagged.iter().collect::<Vec<_>>(), vec!["qwerty"]);
    }

    #[test]
    fn matches_exact_and_prefixed_passwords() {
        let flagged: FlaggedPrefixSet =
            ["jessica_".to_string(), "pä".to_string()].into_iter().collect();
        assert!(flagged.matches("jessica_"));
        assert!(flagged.matches("jessica_1987"));
        assert!(!flagged.matches("jessica"));
        assert!(flagged.matches("päss"));
        assert!(!flagged.matches(""));
        assert!(flagged.contains("pä"));
        assert!(!flagged.contains("päss"));
    }
}
