// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the analysis pipeline.
///
/// Only `CorpusRead` is recoverable: the batch runner logs it and moves on to
/// the next file. Everything else ends the run.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("failed to walk corpus directory {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read corpus file {path}: {source}")]
    CorpusRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load baseline from {path}: {reason}")]
    BaselineLoad { path: PathBuf, reason: String },

    #[error("failed to read {path}: {reason}")]
    ArtifactRead { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    ArtifactWrite { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("run cancelled after {processed} file(s)")]
    Cancelled { processed: usize },
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
