//! # CLI Module
//!
//! Command-line interface for the APOD image cache.
//!
//! ## Usage
//! ```bash
//! # Cache an image that has already been downloaded
//! apod-cache add NGC3521.jpg --title "NGC #3521: Galaxy in a Bubble" \
//!     --description "A spiral galaxy" \
//!     --source-url https://apod.nasa.gov/apod/image/2205/NGC3521LRGBHaAPOD-20.jpg
//!
//! # Titles for a selection list
//! apod-cache list
//!
//! # Path to hand to a wallpaper setter
//! apod-cache path --title "NGC #3521: Galaxy in a Bubble"
//!
//! # JSON output
//! apod-cache show --id 3 --output json
//! ```

use apod_cache::core::manager::{CacheConfig, CacheManager, CacheStats, VerifyReport};
use apod_cache::core::store::{CacheRecord, RecordId};
use apod_cache::error::{ApodCacheError, Result};
use apod_cache::events::{CacheEvent, Event, EventChannel};
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{style, Term};
use std::path::PathBuf;

/// APOD Cache - keep every Astronomy Picture of the Day exactly once
#[derive(Parser, Debug)]
#[command(name = "apod-cache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding cached images
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Metadata database path (defaults to image_cache.db in the cache directory)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the cache directory and database if they don't exist
    Init,

    /// Cache a downloaded image
    Add {
        /// Image file to cache
        file: PathBuf,

        /// Image title
        #[arg(short, long)]
        title: String,

        /// Image explanation
        #[arg(short, long, default_value = "")]
        description: String,

        /// URL the image was downloaded from (its extension is kept)
        #[arg(short, long)]
        source_url: String,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// List cached titles in the order they were added
    List {
        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Show a cached record
    Show {
        #[command(flatten)]
        key: RecordKey,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Print the file path of a cached image
    Path {
        #[command(flatten)]
        key: RecordKey,
    },

    /// Show cache statistics
    Stats {
        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Check cached files against their fingerprints
    Verify,
}

/// Which record to look up
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct RecordKey {
    /// Record id
    #[arg(long)]
    id: Option<i64>,

    /// Record title (the oldest record wins if titles repeat)
    #[arg(long)]
    title: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
    /// Minimal output (ids, titles, or paths only)
    Minimal,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    apod_cache::init_tracing(if cli.verbose { "debug" } else { "warn" });

    let mut config = cli
        .cache_dir
        .map(CacheConfig::new)
        .unwrap_or_else(CacheConfig::default_location);
    if let Some(database) = cli.database {
        config = config.with_database_path(database);
    }

    let term = Term::stderr();

    match cli.command {
        Commands::Init => run_init(&term, &config),
        Commands::Add {
            file,
            title,
            description,
            source_url,
            output,
        } => run_add(&term, &config, file, &title, &description, &source_url, output),
        Commands::List { output } => run_list(&config, output),
        Commands::Show { key, output } => run_show(&config, key, output),
        Commands::Path { key } => run_path(&config, key),
        Commands::Stats { output } => run_stats(&config, output),
        Commands::Verify => run_verify(&term, &config),
    }
}

fn run_init(term: &Term, config: &CacheConfig) -> Result<()> {
    let manager = CacheManager::open(config)?;
    let count = manager.records()?.len();

    term.write_line(&format!(
        "{} Cache ready at {} ({} images)",
        style("✓").green().bold(),
        style(manager.cache_directory().display()).cyan(),
        count
    ))
    .ok();

    Ok(())
}

fn run_add(
    term: &Term,
    config: &CacheConfig,
    file: PathBuf,
    title: &str,
    description: &str,
    source_url: &str,
    output: OutputFormat,
) -> Result<()> {
    let bytes = std::fs::read(&file).map_err(|source| ApodCacheError::Read {
        path: file.clone(),
        source,
    })?;

    let (sender, receiver) = EventChannel::new();
    let manager = CacheManager::open(config)?.with_events(sender);

    let id = manager.ensure_cached(&bytes, title, description, source_url)?;
    let record = require(manager.get_by_id(id)?, &format!("id {id}"))?;
    let newly_cached = receiver
        .drain()
        .iter()
        .any(|event| matches!(event, Event::Cache(CacheEvent::Stored { .. })));

    match output {
        OutputFormat::Pretty => {
            let status = if newly_cached {
                style("Cached").green().bold()
            } else {
                style("Already cached").yellow().bold()
            };
            term.write_line(&format!(
                "{} {} as #{}",
                status,
                style(&record.title).cyan(),
                record.id
            ))
            .ok();
            term.write_line(&format!("  {}", style(record.file_path.display()).dim()))
                .ok();
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "id": record.id,
            "newly_cached": newly_cached,
            "record": record,
        })),
        OutputFormat::Minimal => println!("{}", record.id),
    }

    Ok(())
}

fn run_list(config: &CacheConfig, output: OutputFormat) -> Result<()> {
    let manager = CacheManager::open(config)?;

    match output {
        OutputFormat::Pretty => {
            let records = manager.records()?;
            if records.is_empty() {
                println!("{}", style("The cache is empty.").dim());
            }
            for record in records {
                println!(
                    "{:>5}  {}",
                    style(format!("#{}", record.id)).dim(),
                    style(&record.title).bold()
                );
            }
        }
        OutputFormat::Json => print_json(&manager.list_titles()?),
        OutputFormat::Minimal => {
            for title in manager.list_titles()? {
                println!("{title}");
            }
        }
    }

    Ok(())
}

fn run_show(config: &CacheConfig, key: RecordKey, output: OutputFormat) -> Result<()> {
    let manager = CacheManager::open(config)?;
    let record = lookup(&manager, key)?;

    match output {
        OutputFormat::Pretty => print_pretty_record(&record),
        OutputFormat::Json => print_json(&record),
        OutputFormat::Minimal => println!("{}", record.file_path.display()),
    }

    Ok(())
}

fn run_path(config: &CacheConfig, key: RecordKey) -> Result<()> {
    let manager = CacheManager::open(config)?;
    let record = lookup(&manager, key)?;
    let path = require(manager.background_path(record.id)?, &format!("id {}", record.id))?;

    println!("{}", path.display());

    Ok(())
}

fn run_stats(config: &CacheConfig, output: OutputFormat) -> Result<()> {
    let manager = CacheManager::open(config)?;
    let stats = manager.stats()?;

    match output {
        OutputFormat::Pretty => print_pretty_stats(&stats),
        OutputFormat::Json => print_json(&stats),
        OutputFormat::Minimal => println!("{}", stats.total_records),
    }

    Ok(())
}

fn run_verify(term: &Term, config: &CacheConfig) -> Result<()> {
    let manager = CacheManager::open(config)?;
    let report = manager.verify()?;

    print_verify_report(term, &report);

    if !report.is_clean() {
        std::process::exit(1);
    }

    Ok(())
}

fn lookup(manager: &CacheManager, key: RecordKey) -> Result<CacheRecord> {
    match (key.id, key.title) {
        (Some(id), _) => require(manager.get_by_id(RecordId(id))?, &format!("id {id}")),
        (None, Some(title)) => require(manager.get_by_title(&title)?, &format!("title {title:?}")),
        // clap's argument group guarantees one of the two
        (None, None) => Err(ApodCacheError::Config(
            "either --id or --title is required".to_string(),
        )),
    }
}

fn require<T>(value: Option<T>, what: &str) -> Result<T> {
    value.ok_or_else(|| ApodCacheError::NotFound {
        what: what.to_string(),
    })
}

fn print_pretty_record(record: &CacheRecord) {
    println!(
        "{} {}",
        style(format!("#{}", record.id)).dim(),
        style(&record.title).bold().cyan()
    );
    println!("  {} {}", style("File:").dim(), record.file_path.display());
    println!("  {} {}", style("Fingerprint:").dim(), record.fingerprint);
    if !record.description.is_empty() {
        println!();
        println!("{}", record.description);
    }
}

fn print_pretty_stats(stats: &CacheStats) {
    println!("  {} cached images", style(stats.total_records).cyan());
    println!(
        "  {} on disk",
        style(format_bytes(stats.total_size_bytes)).yellow()
    );
    if stats.missing_files > 0 {
        println!(
            "  {} records with missing files (run `apod-cache verify`)",
            style(stats.missing_files).red()
        );
    }
}

fn print_verify_report(term: &Term, report: &VerifyReport) {
    for record in &report.missing {
        term.write_line(&format!(
            "  {} #{} {} (missing {})",
            style("✗").red(),
            record.id,
            record.title,
            record.file_path.display()
        ))
        .ok();
    }
    for record in &report.mismatched {
        term.write_line(&format!(
            "  {} #{} {} (content changed: {})",
            style("✗").red(),
            record.id,
            record.title,
            record.file_path.display()
        ))
        .ok();
    }

    let problems = report.missing.len() + report.mismatched.len();
    let summary = if problems == 0 {
        format!("{} {} images verified", style("✓").green().bold(), report.checked)
    } else {
        format!(
            "{} {} of {} images have problems",
            style("!").red().bold(),
            problems,
            report.checked
        )
    };
    term.write_line(&summary).ok();
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to serialize output: {e}"),
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
