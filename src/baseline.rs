//! Global follow-on character baseline
//!
//! Percentage observations are accumulated per character while corpora are
//! scanned, then reduced to average and nearest-rank percentile bounds.

use crate::core::types::{follow_on_percentages, FollowingCounts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Reduced statistics for one follow-on character, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterStatistic {
    pub sample_count: usize,
    pub average: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl CharacterStatistic {
    /// Sorts `samples` in place and reduces them. `None` for an empty slice.
    pub fn from_samples(samples: &mut [f64], lower_pct: f64, upper_pct: f64) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_by(|a, b| a.total_cmp(b));
        // Summed after sorting so the mean does not depend on arrival order.
        let average = samples.iter().sum::<f64>() / samples.len() as f64;
        Some(Self {
            sample_count: samples.len(),
            average,
            lower_bound: percentile(samples, lower_pct),
            upper_bound: percentile(samples, upper_pct),
        })
    }
}

/// Nearest-rank order statistic: `sorted[floor(pct * n / 100)]`, clamped to
/// the last index. No interpolation.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (pct * sorted.len() as f64 / 100.0).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Running per-character sample lists for one baseline build.
///
/// Each corpus file can fill its own accumulator; `merge` combines them in any
/// order without changing the final baseline.
#[derive(Debug, Default, Clone)]
pub struct SampleAccumulator {
    samples: BTreeMap<char, Vec<f64>>,
    distributions: usize,
    examined: usize,
}

impl SampleAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one prefix's follow-on percentages. Returns false (and records
    /// nothing) when nothing follows the prefix.
    pub fn add_distribution(&mut self, counts: &FollowingCounts) -> bool {
        self.examined += 1;
        let percentages = follow_on_percentages(counts);
        if percentages.is_empty() {
            return false;
        }
        for (c, pct) in percentages {
            self.samples.entry(c).or_default().push(pct);
        }
        self.distributions += 1;
        true
    }

    pub fn merge(&mut self, other: SampleAccumulator) {
        for (c, mut values) in other.samples {
            self.samples.entry(c).or_default().append(&mut values);
        }
        self.distributions += other.distributions;
        self.examined += other.examined;
    }

    /// Number of prefix distributions recorded so far.
    pub fn distributions(&self) -> usize {
        self.distributions
    }

    /// Distributions offered, including those with nothing following.
    pub fn examined(&self) -> usize {
        self.examined
    }

    pub fn samples(&self, c: char) -> &[f64] {
        self.samples.get(&c).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_baseline(self, lower_pct: f64, upper_pct: f64) -> GlobalBaseline {
        let characters = self
            .samples
            .into_iter()
            .filter_map(|(c, mut values)| {
                CharacterStatistic::from_samples(&mut values, lower_pct, upper_pct).map(|s| (c, s))
            })
            .collect();
        GlobalBaseline {
            version: GlobalBaseline::VERSION,
            lower_percentile: lower_pct,
            upper_percentile: upper_pct,
            distributions: self.distributions,
            characters,
        }
    }
}

/// The learned distribution of next-characters after high-frequency prefixes.
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalBaseline {
    pub version: u32,
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    /// Prefix distributions that contributed samples.
    pub distributions: usize,
    pub characters: BTreeMap<char, CharacterStatistic>,
}

impl GlobalBaseline {
    pub const VERSION: u32 = 1;

    pub fn get(&self, c: char) -> Option<&CharacterStatistic> {
        self.characters.get(&c)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// One line per character, in code-point order.
    pub fn summary_text(&self) -> String {
        let mut out = String::new();
        for (c, stat) in &self.characters {
            let _ = writeln!(
                out,
                "Character: '{}' - Average: {:.2}% - Range: [{:.2}%, {:.2}%]",
                c, stat.average, stat.lower_bound, stat.upper_bound
            );
        }
        out
    }
}
