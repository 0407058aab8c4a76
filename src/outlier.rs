//! Follow-on distribution outlier detection.
//!
//! A prefix is suspicious when some character follows it noticeably more
//! often than the baseline's upper bound allows.

use crate::baseline::GlobalBaseline;
use crate::core::trie::Trie;
use crate::core::types::{follow_on_percentages, Count, OutlierChar, SuspiciousPrefix};
use std::fmt::Write as _;

/// Outcome of scanning one corpus.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Qualifying prefixes that were inspected.
    pub examined: usize,
    pub findings: Vec<SuspiciousPrefix>,
}

pub struct OutlierDetector<'a> {
    baseline: &'a GlobalBaseline,
    threshold: Count,
    floor: f64,
}

impl<'a> OutlierDetector<'a> {
    pub fn new(baseline: &'a GlobalBaseline, threshold: Count, floor: f64) -> Self {
        Self { baseline, threshold, floor }
    }

    /// Strictly above the character's upper bound and strictly above the
    /// absolute floor. Characters missing from the baseline never qualify.
    pub fn is_outlier(&self, c: char, observed: f64) -> bool {
        match self.baseline.get(c) {
            Some(stat) => observed > stat.upper_bound && observed > self.floor,
            None => false,
        }
    }

    /// Checks one prefix; `None` when it is absent or has no outliers.
    pub fn inspect(&self, trie: &Trie, prefix: &str) -> Option<SuspiciousPrefix> {
        let record = trie.prefix_record(prefix)?;
        let counts = trie.following_character_counts(prefix);
        let outliers: Vec<OutlierChar> = follow_on_percentages(&counts)
            .into_iter()
            .filter(|&(c, pct)| self.is_outlier(c, pct))
            .map(|(character, observed_percentage)| OutlierChar { character, observed_percentage })
            .collect();
        if outliers.is_empty() {
            return None;
        }
        Some(SuspiciousPrefix {
            prefix: record.prefix,
            standalone_count: record.standalone_count,
            total_following_count: record.following_count,
            outliers,
        })
    }

    /// All suspicious prefixes in one corpus, in prefix order.
    pub fn scan(&self, trie: &Trie) -> ScanResult {
        let prefixes = trie.qualifying_prefixes(self.threshold);
        let findings = prefixes.iter().filter_map(|prefix| self.inspect(trie, prefix)).collect();
        ScanResult { examined: prefixes.len(), findings }
    }
}

/// Renders one file's section of the outlier report.
pub fn render_file_section(file_name: &str, findings: &[SuspiciousPrefix]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Analysis Results For {file_name} ===\n");
    let _ = writeln!(out, "------------------------\n");
    for finding in findings {
        let chars: Vec<String> = finding
            .outliers
            .iter()
            .map(|o| format!("'{}' ({:.4}%)", o.character, o.observed_percentage))
            .collect();
        let _ = writeln!(out, "Prefix: '{}'", finding.prefix);
        let _ = writeln!(out, "    Standalone occurrences: {}", finding.standalone_count);
        let _ = writeln!(out, "    Total following occurrences: {}", finding.total_following_count);
        let _ = writeln!(out, "    Outlier characters found: {}", chars.join(", "));
        out.push('\n');
    }
    out
}
