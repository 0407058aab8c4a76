// src/lib.rs

pub mod aggregator;
pub mod baseline;
pub mod batch;
pub mod config;
pub mod core;
pub mod error;
pub mod outlier;
pub mod persistence;
pub mod ratio;

pub use crate::batch::{BatchRunner, BatchSummary, CancelToken, RunMode};
pub use crate::config::AnalyzerConfig;
pub use crate::core::trie::Trie;
pub use crate::error::{AnalyzerError, Result};
