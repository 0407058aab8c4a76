use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crossterm::style::Stylize;
use prefix_core::{AnalyzerConfig, BatchRunner, BatchSummary, CancelToken, RunMode};
use std::future::Future;
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "prefix_sentinel",
    about = "Find bot-generated passwords from follow-on character distributions"
)]
struct Cli {
    /// TOML config file; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct CommonArgs {
    /// Directory tree holding the corpus files
    #[arg(long)]
    corpus_dir: Option<PathBuf>,
    /// File-name suffix that marks a corpus file
    #[arg(long)]
    suffix: Option<String>,
    /// Process corpus files in parallel
    #[arg(long)]
    parallel: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the global follow-on character baseline
    Baseline {
        #[command(flatten)]
        common: CommonArgs,
        /// Standalone count a prefix must exceed (T1)
        #[arg(long)]
        threshold: Option<u64>,
        #[arg(long)]
        lower_percentile: Option<f64>,
        #[arg(long)]
        upper_percentile: Option<f64>,
        /// Baseline output (.json, or .bin for binary)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also write a human-readable summary
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Report prefixes whose follow-on distribution exceeds the baseline
    Detect {
        #[command(flatten)]
        common: CommonArgs,
        /// Standalone count a prefix must exceed (T2)
        #[arg(long)]
        threshold: Option<u64>,
        /// Percentages at or below this are never outliers
        #[arg(long)]
        floor: Option<f64>,
        #[arg(long)]
        baseline: Option<PathBuf>,
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Flag prefixes with too few completions for their frequency
    Ratio {
        #[command(flatten)]
        common: CommonArgs,
        /// Standalone count a prefix must exceed (T3)
        #[arg(long)]
        threshold: Option<u64>,
        /// Flagged prefix list output
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also write per-file prefix statistics
        #[arg(long)]
        prefix_stats: Option<PathBuf>,
    },
}

fn apply_common(config: &mut AnalyzerConfig, common: &CommonArgs) {
    if let Some(dir) = &common.corpus_dir {
        config.paths.corpus_dir = dir.clone();
    }
    if let Some(suffix) = &common.suffix {
        config.corpus_suffix = suffix.clone();
    }
}

/// Folds the subcommand's flags into `config` and picks the run mode.
fn resolve(command: Commands, config: &mut AnalyzerConfig) -> (RunMode, bool) {
    match command {
        Commands::Baseline {
            common,
            threshold,
            lower_percentile,
            upper_percentile,
            output,
            summary,
        } => {
            apply_common(config, &common);
            if let Some(t) = threshold {
                config.baseline_threshold = t;
            }
            if let Some(p) = lower_percentile {
                config.lower_percentile = p;
            }
            if let Some(p) = upper_percentile {
                config.upper_percentile = p;
            }
            if let Some(p) = output {
                config.paths.baseline = p;
            }
            if summary.is_some() {
                config.paths.baseline_summary = summary;
            }
            (RunMode::BuildBaseline, common.parallel)
        }
        Commands::Detect {
            common,
            threshold,
            floor,
            baseline,
            report,
        } => {
            apply_common(config, &common);
            if let Some(t) = threshold {
                config.detection_threshold = t;
            }
            if let Some(f) = floor {
                config.outlier_floor = f;
            }
            if let Some(p) = baseline {
                config.paths.baseline = p;
            }
            if let Some(p) = report {
                config.paths.report = p;
            }
            (RunMode::DetectOutliers, common.parallel)
        }
        Commands::Ratio {
            common,
            threshold,
            output,
            prefix_stats,
        } => {
            apply_common(config, &common);
            if let Some(t) = threshold {
                config.ratio_threshold = t;
            }
            if let Some(p) = output {
                config.paths.flagged = p;
            }
            if prefix_stats.is_some() {
                config.paths.prefix_stats = prefix_stats;
            }
            (RunMode::ClassifyRatios, common.parallel)
        }
    }
}

fn print_summary(mode: RunMode, summary: &BatchSummary, config: &AnalyzerConfig, elapsed: f64) {
    let (label, artifact) = match mode {
        RunMode::BuildBaseline => ("Baseline", &config.paths.baseline),
        RunMode::DetectOutliers => ("Outlier scan", &config.paths.report),
        RunMode::ClassifyRatios => ("Ratio scan", &config.paths.flagged),
    };
    println!("{} {label} complete in {elapsed:.2}s", "✓".green());
    println!("  files processed:   {:>10}", summary.files_processed);
    println!("  prefixes examined: {:>10}", summary.prefixes_examined);
    match mode {
        RunMode::BuildBaseline => {
            println!("  characters:        {:>10}", summary.baseline_characters)
        }
        _ => println!("  flagged prefixes:  {:>10}", summary.flagged),
    }
    println!("  output:            {}", artifact.display().to_string().cyan());
    if !summary.skipped.is_empty() {
        println!("{} {} file(s) skipped:", "!".yellow(), summary.skipped.len());
        for skipped in &summary.skipped {
            println!("    {}: {}", skipped.path.display(), skipped.reason);
        }
    }
}

/// Cancels `token` once `signal` resolves. The signal is awaited on its own
/// thread so the batch run itself stays synchronous.
fn cancel_on<S>(signal: S, token: CancelToken) -> std::io::Result<JoinHandle<()>>
where
    S: Future<Output = std::io::Result<()>> + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    std::thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            if runtime.block_on(signal).is_ok() {
                warn!("Interrupt received, stopping before the next corpus file");
                token.cancel();
            }
        })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let mut config = AnalyzerConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    let (mode, parallel) = resolve(cli.command, &mut config);
    config.validate().context("Invalid options")?;

    let cancel = CancelToken::new();
    // Detached; it lives until the process exits.
    let _interrupt = cancel_on(tokio::signal::ctrl_c(), cancel.clone())
        .context("Failed to install Ctrl-C handler")?;

    let t0 = Instant::now();
    let summary = BatchRunner::new(&config)
        .with_cancel_token(cancel)
        .parallel(parallel)
        .run(mode)
        .with_context(|| format!("{mode:?} run failed"))?;
    print_summary(mode, &summary, &config, t0.elapsed().as_secs_f64());
    Ok(())
}
