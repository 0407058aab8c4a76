//! Batch orchestration over a directory of corpus files
//!
//! Every corpus gets its own trie, which is dropped as soon as that file's
//! queries finish. Per-file results are merged afterwards, so files can be
//! processed in any order or in parallel.

use crate::aggregator::DistributionAggregator;
use crate::baseline::GlobalBaseline;
use crate::config::AnalyzerConfig;
use crate::core::corpus::load_corpus;
use crate::core::trie::Trie;
use crate::core::types::{PrefixRecord, SuspiciousPrefix};
use crate::error::{AnalyzerError, Result};
use crate::outlier::{render_file_section, OutlierDetector, ScanResult};
use crate::persistence::{self, ReportWriter};
use crate::ratio::{FlaggedPrefixSet, RatioClassifier};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    BuildBaseline,
    DetectOutliers,
    ClassifyRatios,
}

/// Cooperative cancellation, checked before each corpus file is opened.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub files_processed: usize,
    pub skipped: Vec<SkippedFile>,
    /// Qualifying prefixes looked at across all files.
    pub prefixes_examined: usize,
    /// Suspicious or flagged prefixes, depending on the mode.
    pub flagged: usize,
    /// Characters in the baseline (baseline mode only).
    pub baseline_characters: usize,
}

/// Findings for one corpus file, kept in walk order.
#[derive(Debug)]
pub struct FileFindings {
    pub path: PathBuf,
    pub findings: Vec<SuspiciousPrefix>,
}

#[derive(Debug, Default)]
pub struct RatioOutcome {
    pub flagged: FlaggedPrefixSet,
    /// Qualifying prefix records keyed by corpus stem.
    pub prefix_stats: BTreeMap<String, Vec<PrefixRecord>>,
}

enum FileOutcome<T> {
    Done(T),
    Skipped(String),
    Cancelled,
}

/// Recursively lists files whose name ends with `suffix`, sorted by path.
///
/// Symlinks are followed, so a linked corpus file or directory is included.
/// Any error while enumerating the tree is fatal: a partial listing would
/// silently change which corpora the statistics cover.
pub fn discover_corpus_files(root: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|source| AnalyzerError::Walk {
            path: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && entry.file_name().to_string_lossy().ends_with(suffix) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub struct BatchRunner<'a> {
    config: &'a AnalyzerConfig,
    cancel: CancelToken,
    parallel: bool,
}

impl<'a> BatchRunner<'a> {
    pub fn new(config: &'a AnalyzerConfig) -> Self {
        Self { config, cancel: CancelToken::new(), parallel: false }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let root = &self.config.paths.corpus_dir;
        let files = discover_corpus_files(root, &self.config.corpus_suffix)?;
        info!("Found {} corpus files under {}", files.len(), root.display());
        Ok(files)
    }

    fn process_one<T, F>(&self, path: &Path, f: &F) -> FileOutcome<T>
    where
        F: Fn(&Path, &Trie) -> T,
    {
        if self.cancel.is_cancelled() {
            return FileOutcome::Cancelled;
        }
        info!("Processing file: {}", file_name(path));
        match load_corpus(path) {
            Ok(trie) => FileOutcome::Done(f(path, &trie)),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                FileOutcome::Skipped(e.to_string())
            }
        }
    }

    /// Builds a trie per file and applies `f` to it. Unreadable files are
    /// recorded in the summary; cancellation aborts the whole run.
    fn map_corpora<T, F>(
        &self,
        files: &[PathBuf],
        f: F,
    ) -> Result<(Vec<(PathBuf, T)>, BatchSummary)>
    where
        T: Send,
        F: Fn(&Path, &Trie) -> T + Sync,
    {
        let outcomes: Vec<FileOutcome<T>> = if self.parallel {
            files.par_iter().map(|path| self.process_one(path, &f)).collect()
        } else {
            let mut outcomes = Vec::with_capacity(files.len());
            for path in files {
                let outcome = self.process_one(path, &f);
                let stop = matches!(outcome, FileOutcome::Cancelled);
                outcomes.push(outcome);
                if stop {
                    break;
                }
            }
            outcomes
        };

        let mut summary = BatchSummary::default();
        let mut results = Vec::new();
        let mut cancelled = false;
        for (path, outcome) in files.iter().zip(outcomes) {
            match outcome {
                FileOutcome::Done(value) => {
                    summary.files_processed += 1;
                    results.push((path.clone(), value));
                }
                FileOutcome::Skipped(reason) => {
                    summary.skipped.push(SkippedFile { path: path.clone(), reason });
                }
                FileOutcome::Cancelled => cancelled = true,
            }
        }
        if cancelled {
            return Err(AnalyzerError::Cancelled { processed: summary.files_processed });
        }
        Ok((results, summary))
    }

    /// Aggregates follow-on samples from every corpus into a baseline.
    pub fn build_baseline(&self, files: &[PathBuf]) -> Result<(GlobalBaseline, BatchSummary)> {
        let aggregator = DistributionAggregator::new(self.config.baseline_threshold);
        let (per_file, mut summary) = self.map_corpora(files, |_, trie| aggregator.collect(trie))?;

        summary.prefixes_examined = per_file.iter().map(|(_, samples)| samples.examined()).sum();
        let baseline = aggregator.build(
            per_file.into_iter().map(|(_, samples)| samples),
            self.config.lower_percentile,
            self.config.upper_percentile,
        );
        summary.baseline_characters = baseline.len();
        Ok((baseline, summary))
    }

    pub fn detect_outliers(
        &self,
        files: &[PathBuf],
        baseline: &GlobalBaseline,
    ) -> Result<(Vec<FileFindings>, BatchSummary)> {
        let detector = OutlierDetector::new(
            baseline,
            self.config.detection_threshold,
            self.config.outlier_floor,
        );
        let (per_file, mut summary) = self.map_corpora(files, |_, trie| detector.scan(trie))?;

        let mut all = Vec::with_capacity(per_file.len());
        for (path, ScanResult { examined, findings }) in per_file {
            summary.prefixes_examined += examined;
            summary.flagged += findings.len();
            all.push(FileFindings { path, findings });
        }
        Ok((all, summary))
    }

    pub fn classify_ratios(&self, files: &[PathBuf]) -> Result<(RatioOutcome, BatchSummary)> {
        let classifier = RatioClassifier::new(self.config.ratio_threshold);
        let (per_file, mut summary) = self.map_corpora(files, |_, trie| {
            let records = classifier.records(trie);
            let flagged = classifier.classify(&records);
            (records, flagged)
        })?;

        let mut outcome = RatioOutcome::default();
        for (path, (records, flagged)) in per_file {
            summary.prefixes_examined += records.len();
            outcome.flagged.extend(flagged);
            let name = file_name(&path);
            let stem = name
                .strip_suffix(self.config.corpus_suffix.as_str())
                .unwrap_or(&name)
                .to_string();
            outcome.prefix_stats.entry(stem).or_default().extend(records);
        }
        summary.flagged = outcome.flagged.len();
        Ok((outcome, summary))
    }

    /// Runs one mode end to end, writing its artifacts.
    pub fn run(&self, mode: RunMode) -> Result<BatchSummary> {
        match mode {
            RunMode::BuildBaseline => {
                let files = self.discover()?;
                let (baseline, summary) = self.build_baseline(&files)?;
                if baseline.is_empty() {
                    warn!(
                        "No prefix exceeded {} standalone occurrences; baseline is empty",
                        self.config.baseline_threshold
                    );
                }
                persistence::save_baseline(&baseline, &self.config.paths.baseline)?;
                info!(
                    "Baseline for {} characters written to {}",
                    baseline.len(),
                    self.config.paths.baseline.display()
                );
                if let Some(path) = &self.config.paths.baseline_summary {
                    persistence::save_baseline_summary(&baseline, path)?;
                }
                Ok(summary)
            }
            RunMode::DetectOutliers => {
                // Fatal before any corpus is touched.
                let baseline = persistence::load_baseline(&self.config.paths.baseline)?;
                info!("Loaded {} character distribution statistics", baseline.len());
                let files = self.discover()?;
                let (findings, summary) = self.detect_outliers(&files, &baseline)?;

                let mut report = ReportWriter::create(&self.config.paths.report)?;
                for file in &findings {
                    report.append(&render_file_section(&file_name(&file.path), &file.findings))?;
                }
                report.finish()?;
                info!("Suspicious prefixes logged in {}", self.config.paths.report.display());
                Ok(summary)
            }
            RunMode::ClassifyRatios => {
                let files = self.discover()?;
                let (outcome, summary) = self.classify_ratios(&files)?;
                persistence::save_flagged(&outcome.flagged, &self.config.paths.flagged)?;
                info!(
                    "Found {} suspicious passwords, written to {}",
                    outcome.flagged.len(),
                    self.config.paths.flagged.display()
                );
                if let Some(path) = &self.config.paths.prefix_stats {
                    persistence::save_prefix_stats(&outcome.prefix_stats, path)?;
                }
                Ok(summary)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_corpus(dir: &Path, name: &str, entries: &[(&str, usize)]) -> PathBuf {
        let mut content = String::new();
        for (i, (password, times)) in entries.iter().enumerate() {
            for j in 0..*times {
                content.push_str(&format!("user{i}_{j}@mail.com:{password}\n"));
            }
        }
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn config_for(dir: &Path) -> AnalyzerConfig {
        let mut config = AnalyzerConfig {
            baseline_threshold: 5,
            detection_threshold: 5,
            ratio_threshold: 5,
            ..Default::default()
        };
        config.paths.corpus_dir = dir.join("corpus");
        config.paths.baseline = dir.join("out/base.json");
        config.paths.report = dir.join("out/report.txt");
        config.paths.flagged = dir.join("out/flagged.json");
        config
    }

    #[test]
    fn discovery_filters_by_suffix_and_recurses() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("b");
        fs::create_dir_all(&nested).unwrap();
        write_corpus(dir.path(), "a_passwords.txt", &[("x", 1)]);
        write_corpus(&nested, "b_passwords.txt", &[("x", 1)]);
        write_corpus(dir.path(), "notes.txt", &[("x", 1)]);

        let files = discover_corpus_files(dir.path(), "_passwords.txt").unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["a_passwords.txt", "b_passwords.txt"]);
    }

    #[test]
    fn missing_root_is_fatal() {
        let result = discover_corpus_files(Path::new("/no/such/corpus/root"), "_passwords.txt");
        assert!(matches!(result, Err(AnalyzerError::Walk { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn discovery_follows_symlinked_corpora() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("corpus");
        let elsewhere = dir.path().join("elsewhere");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(elsewhere.join("more")).unwrap();
        let target = write_corpus(&elsewhere, "real_passwords.txt", &[("x", 1)]);
        write_corpus(&elsewhere.join("more"), "deep_passwords.txt", &[("x", 1)]);
        write_corpus(&root, "local_passwords.txt", &[("x", 1)]);
        symlink(&target, root.join("linked_passwords.txt")).unwrap();
        symlink(elsewhere.join("more"), root.join("more")).unwrap();

        let files = discover_corpus_files(&root, "_passwords.txt").unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(
            names,
            vec!["linked_passwords.txt", "local_passwords.txt", "deep_passwords.txt"]
        );
        assert_eq!(files[0], root.join("linked_passwords.txt"));
    }

    #[test]
    fn detection_summary_counts_every_qualifying_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        fs::create_dir_all(&config.paths.corpus_dir).unwrap();
        write_corpus(
            &config.paths.corpus_dir,
            "a_passwords.txt",
            &[("abc", 6), ("abc1", 1), ("abcx", 1), ("lonely", 9)],
        );
        let runner = BatchRunner::new(&config);
        let files = runner.discover().unwrap();

        let (baseline, summary) = runner.build_baseline(&files).unwrap();
        // "lonely" qualifies but contributes no samples.
        assert_eq!(summary.prefixes_examined, 2);
        assert_eq!(baseline.distributions, 1);

        let (findings, summary) = runner.detect_outliers(&files, &baseline).unwrap();
        assert_eq!(summary.prefixes_examined, 2);
        assert_eq!(summary.flagged, 0);
        assert!(findings[0].findings.is_empty());
    }

    #[test]
    fn unreadable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        fs::create_dir_all(&config.paths.corpus_dir).unwrap();
        let good = write_corpus(
            &config.paths.corpus_dir,
            "a_passwords.txt",
            &[("abc", 6), ("abc1", 1)],
        );
        let missing = config.paths.corpus_dir.join("gone_passwords.txt");

        let runner = BatchRunner::new(&config);
        let (baseline, summary) = runner.build_baseline(&[good, missing.clone()]).unwrap();
        assert_eq!(summary.files_processed, 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].path, missing);
        assert_eq!(baseline.get('1').unwrap().average, 100.0);
    }

    #[test]
    fn cancelled_run_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        fs::create_dir_all(&config.paths.corpus_dir).unwrap();
        write_corpus(&config.paths.corpus_dir, "a_passwords.txt", &[("abc", 6)]);

        let token = CancelToken::new();
        token.cancel();
        for parallel in [false, true] {
            let runner = BatchRunner::new(&config)
                .with_cancel_token(token.clone())
                .parallel(parallel);
            let err = runner.run(RunMode::BuildBaseline).unwrap_err();
            assert!(matches!(err, AnalyzerError::Cancelled { processed: 0 }));
        }
        assert!(!config.paths.baseline.exists());
    }

    #[test]
    fn parallel_and_sequential_baselines_match() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        fs::create_dir_all(&config.paths.corpus_dir).unwrap();
        let corpus = &config.paths.corpus_dir;
        write_corpus(corpus, "a_passwords.txt", &[("abc", 6), ("abc1", 2), ("abcx", 1)]);
        write_corpus(corpus, "b_passwords.txt", &[("bob", 9), ("bob1", 1), ("bob_", 3)]);
        write_corpus(corpus, "c_passwords.txt", &[("cat", 7), ("cat1", 4), ("cats", 4)]);

        let sequential = BatchRunner::new(&config);
        let files = sequential.discover().unwrap();
        let (a, _) = sequential.build_baseline(&files).unwrap();
        let (b, _) = BatchRunner::new(&config).parallel(true).build_baseline(&files).unwrap();
        let mut reversed = files.clone();
        reversed.reverse();
        let (c, _) = sequential.build_baseline(&reversed).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn detection_without_baseline_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        fs::create_dir_all(&config.paths.corpus_dir).unwrap();
        let err = BatchRunner::new(&config).run(RunMode::DetectOutliers).unwrap_err();
        assert!(matches!(err, AnalyzerError::BaselineLoad { .. }));
        assert!(!config.paths.report.exists());
    }

    #[test]
    fn ratio_run_keys_stats_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path());
        config.paths.prefix_stats = Some(dir.path().join("out/prefix_stats.json"));
        fs::create_dir_all(&config.paths.corpus_dir).unwrap();
        write_corpus(&config.paths.corpus_dir, "q_passwords.txt", &[("qwerty", 6), ("qwerty1", 1)]);

        let summary = BatchRunner::new(&config).run(RunMode::ClassifyRatios).unwrap();
        assert_eq!(summary.prefixes_examined, 1);
        // 6 standalone is far below the curve's 3000 floor.
        assert_eq!(summary.flagged, 0);

        let stats: BTreeMap<String, Vec<PrefixRecord>> = serde_json::from_str(
            &fs::read_to_string(config.paths.prefix_stats.as_ref().unwrap()).unwrap(),
        )
        .unwrap();
        assert_eq!(stats["q"][0].prefix, "qwerty");
        assert_eq!(stats["q"][0].following_count, 1);
        assert!(persistence::load_flagged(&config.paths.flagged).unwrap().is_empty());
    }
}
