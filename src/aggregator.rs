// File: src/aggregator.rs
use crate::baseline::{GlobalBaseline, SampleAccumulator};
use crate::core::trie::Trie;
use crate::core::types::Count;

/// Collects follow-on percentages for the baseline from high-frequency prefixes.
pub struct DistributionAggregator {
    threshold: Count,
}

impl DistributionAggregator {
    pub fn new(threshold: Count) -> Self {
        Self { threshold }
    }

    /// Samples one corpus: every prefix whose standalone count exceeds the
    /// threshold contributes its follow-on distribution.
    pub fn collect(&self, trie: &Trie) -> SampleAccumulator {
        let mut acc = SampleAccumulator::new();
        for prefix in trie.qualifying_prefixes(self.threshold) {
            let counts = trie.following_character_counts(&prefix);
            if !acc.add_distribution(&counts) {
                tracing::trace!("Prefix {:?} has no completions, skipped", prefix);
            }
        }
        acc
    }

    /// Merges per-corpus samples, in the given order, into the baseline.
    pub fn build(
        &self,
        per_corpus: impl IntoIterator<Item = SampleAccumulator>,
        lower_pct: f64,
        upper_pct: f64,
    ) -> GlobalBaseline {
        let mut acc = SampleAccumulator::new();
        for samples in per_corpus {
            acc.merge(samples);
        }
        tracing::debug!(
            "{} of {} qualifying prefixes had completions",
            acc.distributions(),
            acc.examined()
        );
        acc.into_baseline(lower_pct, upper_pct)
    }
}
