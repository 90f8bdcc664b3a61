use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dupcheck::{check_batch, load_batch, save_batch, Config, SqliteCorpus, Thresholds};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dupcheck",
    version,
    about = "Drop near-duplicate crawled images and captions"
)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct Settings {
    /// JSON config file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Corpus database (overrides the config file)
    #[arg(long, global = true, value_name = "FILE")]
    db: Option<PathBuf>,
    /// Maximum Hamming distance between hashes of the same image
    #[arg(long, global = true, value_name = "BITS")]
    hash_threshold: Option<u32>,
    /// Minimum caption similarity ratio (0.0 - 1.0) of the same caption
    #[arg(long, global = true, value_name = "RATIO")]
    caption_threshold: Option<f64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Remove duplicates from a scraped batch
    Check {
        /// Batch file (JSON array of records)
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
        /// Where to write the accepted records (default: overwrite the input)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Only report what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Append a checked batch to the corpus
    Store {
        /// Batch file (JSON array of records)
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },

    /// Inspect the corpus
    Corpus {
        #[command(subcommand)]
        command: CorpusCmd,
    },
}

#[derive(Subcommand, Debug)]
enum CorpusCmd {
    /// Show how many records are stored
    Stats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli.settings)?;
    let thresholds = config.thresholds()?;
    let corpus = SqliteCorpus::new(&config.database_path);

    match cli.command {
        Commands::Check {
            input,
            output,
            dry_run,
        } => {
            println!("▶ Checking {} for duplicates", input.display());
            let batch = load_batch(&input)
                .with_context(|| format!("Failed to read batch {:?}", input))?;
            let total = batch.len();

            let report = benchmark("duplicate check", || {
                with_spinner("Comparing against corpus…", || {
                    check_batch(batch, &corpus, thresholds)
                })
            })
            .with_context(|| format!("Duplicate check failed for {:?}", input))?;

            if report.corpus_absent {
                println!(
                    "⚠️  No corpus at {}; skipped the corpus check",
                    corpus.path().display()
                );
            }
            for (record, hit) in &report.corpus_duplicates {
                println!("   🗑️  {} → matches {}", record.label(), hit);
            }
            println!(
                "Kept {} of {} record(s) ({} in-batch duplicate(s), {} already stored)",
                report.accepted.len(),
                total,
                report.batch_duplicates,
                report.corpus_duplicates.len()
            );

            if dry_run {
                println!("\n⚠️  Dry-run only; no files were changed.");
                return Ok(());
            }

            let dest = output.unwrap_or(input);
            save_batch(&dest, &report.accepted)
                .with_context(|| format!("Failed to write batch {:?}", dest))?;
            println!("✅ Wrote accepted records to {}", dest.display());
        }

        Commands::Store { input } => {
            let batch = load_batch(&input)
                .with_context(|| format!("Failed to read batch {:?}", input))?;
            let stored = corpus
                .append(&batch)
                .with_context(|| format!("Failed to store into {:?}", corpus.path()))?;
            println!(
                "✅ Stored {} record(s) in {}",
                stored,
                corpus.path().display()
            );
        }

        Commands::Corpus { command } => match command {
            CorpusCmd::Stats => match corpus.count()? {
                Some(count) => println!(
                    "🗂️  {} record(s) in {}",
                    count,
                    corpus.path().display()
                ),
                None => println!("No corpus at {} yet.", corpus.path().display()),
            },
        },
    }

    Ok(())
}

/// Config file (if any) with command-line overrides applied.
fn resolve_config(settings: &Settings) -> Result<Config> {
    let mut config = match &settings.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => Config::default(),
    };

    if let Some(db) = &settings.db {
        config.database_path = db.clone();
    }
    if let Some(bits) = settings.hash_threshold {
        config.hash_threshold = bits;
    }
    if let Some(ratio) = settings.caption_threshold {
        config.caption_threshold = ratio;
    }

    let Thresholds { hash, caption } = config.thresholds()?;
    tracing::debug!(
        "Using corpus {:?}, hash threshold {}, caption threshold {}",
        config.database_path,
        hash,
        caption
    );
    Ok(config)
}

/// Run `f()` behind a spinner on stderr.
fn with_spinner<T, F: FnOnce() -> T>(message: &'static str, f: F) -> T {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = f();
    spinner.finish_and_clear();
    result
}

/// Run `f()`, print how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    println!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
