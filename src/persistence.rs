// File: src/persistence.rs
use crate::baseline::GlobalBaseline;
use crate::core::types::PrefixRecord;
use crate::error::{AnalyzerError, Result};
use crate::ratio::FlaggedPrefixSet;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn write_err(path: &Path, reason: impl ToString) -> AnalyzerError {
    AnalyzerError::ArtifactWrite { path: path.to_path_buf(), reason: reason.to_string() }
}

fn is_binary(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "bin")
}

/// Writes through a temp file in the destination directory and renames it into
/// place, so readers never see a half-written artifact.
pub fn write_atomically<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(
        &mut BufWriter<&NamedTempFile>,
    ) -> std::result::Result<(), Box<dyn std::error::Error>>,
{
    let parent_dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir).map_err(|e| write_err(path, e))?;

    let temp_file = NamedTempFile::new_in(parent_dir).map_err(|e| write_err(path, e))?;
    {
        let mut writer = BufWriter::new(&temp_file);
        fill(&mut writer).map_err(|e| write_err(path, e))?;
        writer.flush().map_err(|e| write_err(path, e))?;
    }
    temp_file.persist(path).map_err(|e| write_err(path, e.error))?;
    Ok(())
}

/// JSON by default, bincode when the path ends in `.bin`.
pub fn save_baseline(baseline: &GlobalBaseline, path: &Path) -> Result<()> {
    if is_binary(path) {
        write_atomically(path, |w| Ok(bincode::serialize_into(w, baseline)?))
    } else {
        write_atomically(path, |w| Ok(serde_json::to_writer_pretty(w, baseline)?))
    }
}

pub fn load_baseline(path: &Path) -> Result<GlobalBaseline> {
    let load_err = |reason: String| AnalyzerError::BaselineLoad {
        path: path.to_path_buf(),
        reason,
    };
    let file = File::open(path).map_err(|e| load_err(e.to_string()))?;
    let reader = BufReader::new(file);
    let baseline: GlobalBaseline = if is_binary(path) {
        bincode::deserialize_from(reader).map_err(|e| load_err(e.to_string()))?
    } else {
        serde_json::from_reader(reader).map_err(|e| load_err(e.to_string()))?
    };
    if baseline.version != GlobalBaseline::VERSION {
        return Err(load_err(format!(
            "version mismatch ({} vs {})",
            baseline.version,
            GlobalBaseline::VERSION
        )));
    }
    if baseline.is_empty() {
        return Err(load_err("baseline has no characters".to_string()));
    }
    Ok(baseline)
}

pub fn save_baseline_summary(baseline: &GlobalBaseline, path: &Path) -> Result<()> {
    let text = baseline.summary_text();
    write_atomically(path, |w| Ok(w.write_all(text.as_bytes())?))
}

pub fn save_flagged(flagged: &FlaggedPrefixSet, path: &Path) -> Result<()> {
    write_atomically(path, |w| Ok(serde_json::to_writer_pretty(w, flagged)?))
}

pub fn load_flagged(path: &Path) -> Result<FlaggedPrefixSet> {
    let read_err = |reason: String| AnalyzerError::ArtifactRead {
        path: path.to_path_buf(),
        reason,
    };
    let file = File::open(path).map_err(|e| read_err(e.to_string()))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| read_err(format!("malformed flagged prefix list: {e}")))
}

/// Per-file qualifying prefix statistics, keyed by corpus stem.
pub fn save_prefix_stats(stats: &BTreeMap<String, Vec<PrefixRecord>>, path: &Path) -> Result<()> {
    write_atomically(path, |w| Ok(serde_json::to_writer_pretty(w, stats)?))
}

/// Outlier report log. Sections are appended as files finish; nothing is
/// visible at `path` until [`ReportWriter::finish`] succeeds.
pub struct ReportWriter {
    // Declared first so the handle is dropped before the temp file is removed.
    writer: BufWriter<File>,
    temp_file: NamedTempFile,
    path: PathBuf,
}

impl ReportWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let parent_dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent_dir).map_err(|e| write_err(path, e))?;
        let temp_file = NamedTempFile::new_in(parent_dir).map_err(|e| write_err(path, e))?;
        let handle = temp_file.reopen().map_err(|e| write_err(path, e))?;
        Ok(Self { writer: BufWriter::new(handle), temp_file, path: path.to_path_buf() })
    }

    pub fn append(&mut self, section: &str) -> Result<()> {
        self.writer.write_all(section.as_bytes()).map_err(|e| write_err(&self.path, e))
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush().map_err(|e| write_err(&self.path, e))?;
        drop(self.writer);
        self.temp_file.persist(&self.path).map_err(|e| write_err(&self.path, e.error))?;
        Ok(())
    }
}
