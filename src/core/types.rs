// src/core/types.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Occurrence counter used by the trie. Corpora can exceed `u32::MAX` lines
/// once merged, so counts are kept 64-bit.
pub type Count = u64;

/// Immediate next-character counts below a prefix node, ordered by code point.
pub type FollowingCounts = BTreeMap<char, Count>;

/// Read-only view of one prefix node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRecord {
    pub prefix: String,
    /// Entries that are exactly `prefix`.
    pub standalone_count: Count,
    /// Entries strictly longer than `prefix` that start with it.
    pub following_count: Count,
}

/// A follow-on character whose share of the completions exceeded the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierChar {
    pub character: char,
    pub observed_percentage: f64,
}

/// One suspicious prefix found by the outlier detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousPrefix {
    pub prefix: String,
    pub standalone_count: Count,
    pub total_following_count: Count,
    pub outliers: Vec<OutlierChar>,
}

/// Percentage share of each follow-on character, ordered by code point.
///
/// Returns an empty map when nothing follows the prefix, since a zero
/// denominator carries no distribution.
pub fn follow_on_percentages(counts: &FollowingCounts) -> BTreeMap<char, f64> {
    let total: Count = counts.values().sum();
    if total == 0 {
        return BTreeMap::new();
    }
    counts
        .iter()
        .map(|(&c, &n)| (c, n as f64 / total as f64 * 100.0))
        .collect()
}
