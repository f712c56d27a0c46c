//! # CLI Module
//!
//! Command-line interface for the flat-field catalog.
//!
//! ## Usage
//! ```bash
//! # Show what a directory contains
//! ffcat stats ~/Pictures/flats
//!
//! # Find the flat field for a given shot
//! ffcat find ~/Pictures/flats --make Canon --model "EOS 5D" --focal 50 --aperture 2.8
//!
//! # Resolve the flat field for a raw file, decoding it
//! ffcat match ~/Pictures/flats IMG_0042.CR2 --decode
//!
//! # JSON output
//! ffcat stats ~/Pictures/flats --output json
//! ```

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use flatfield_catalog::core::catalog::{CatalogStats, EntrySummary, DEFAULT_SIBLING_WINDOW_SECS};
use flatfield_catalog::core::frame::FrameInfo;
use flatfield_catalog::core::metadata::{ExifMetadataReader, MetadataReader, ShotMetadata};
use flatfield_catalog::error::{FlatFieldError, Result};
use flatfield_catalog::events::{CatalogEvent, Event, EventChannel, ScanEvent};
use flatfield_catalog::FlatFieldManager;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// ffcat - Inspect flat-field directories and resolve flat fields
#[derive(Parser, Debug)]
#[command(name = "ffcat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Include hidden files
    #[arg(long, global = true)]
    include_hidden: bool,

    /// Directory depth to scan (0 = unlimited)
    #[arg(long, global = true, default_value = "1")]
    depth: usize,

    /// Sibling grouping window in seconds
    #[arg(long, global = true, default_value_t = DEFAULT_SIBLING_WINDOW_SECS)]
    window: i64,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index a directory and list its flat fields
    Stats {
        /// Flat-field directory
        dir: PathBuf,
    },

    /// Find the flat field for the given shot parameters
    Find {
        /// Flat-field directory
        dir: PathBuf,

        /// Camera maker
        #[arg(long)]
        make: String,

        /// Camera model
        #[arg(long)]
        model: String,

        /// Lens name (empty if unknown)
        #[arg(long, default_value = "")]
        lens: String,

        /// Focal length in millimetres
        #[arg(long)]
        focal: f64,

        /// Aperture f-number
        #[arg(long)]
        aperture: f64,

        /// Capture time in Unix seconds
        #[arg(long, conflicts_with = "date")]
        timestamp: Option<i64>,

        /// Capture time as "YYYY-MM-DD HH:MM:SS"
        #[arg(long)]
        date: Option<String>,

        #[command(flatten)]
        resolve: ResolveArgs,
    },

    /// Resolve the flat field for a raw photo
    Match {
        /// Flat-field directory
        dir: PathBuf,

        /// Raw photo to match
        raw: PathBuf,

        #[command(flatten)]
        resolve: ResolveArgs,
    },
}

#[derive(clap::Args, Debug)]
struct ResolveArgs {
    /// Decode the matched flat field
    #[arg(long)]
    decode: bool,

    /// Do not average sibling flat fields
    #[arg(long)]
    no_average: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Outcome of a lookup
#[derive(Debug, Serialize)]
struct Resolution {
    query: ShotMetadata,
    entry: Option<EntrySummary>,
    frame: Option<FrameInfo>,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Stats { dir } => run_stats(&cli, dir),
        Commands::Find {
            dir,
            make,
            model,
            lens,
            focal,
            aperture,
            timestamp,
            date,
            resolve,
        } => {
            let timestamp = match (timestamp, date) {
                (Some(ts), _) => *ts,
                (None, Some(date)) => parse_date(date)?,
                (None, None) => 0,
            };
            let query = ShotMetadata::new(
                make.as_str(),
                model.as_str(),
                lens.as_str(),
                *focal,
                *aperture,
                timestamp,
            );
            run_resolve(&cli, dir, query, resolve)
        }
        Commands::Match { dir, raw, resolve } => {
            let query = ExifMetadataReader::new().read_metadata(raw)?;
            run_resolve(&cli, dir, query, resolve)
        }
    }
}

fn build_manager(cli: &Cli, average: bool) -> FlatFieldManager {
    let max_depth = if cli.depth == 0 { None } else { Some(cli.depth) };
    FlatFieldManager::builder()
        .include_hidden(cli.include_hidden)
        .max_depth(max_depth)
        .sibling_window_secs(cli.window)
        .average_siblings(average)
        .build()
}

/// Index `dir`, showing a spinner for pretty output
fn index(manager: &FlatFieldManager, dir: &Path, output: OutputFormat) -> Result<CatalogStats> {
    let spinner = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let (sender, receiver) = EventChannel::new();
    let spinner_clone = spinner.clone();

    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = spinner_clone else {
                continue;
            };
            match event {
                Event::Scan(ScanEvent::Completed { total_files }) => {
                    pb.set_message(format!("Reading metadata of {} files", total_files));
                }
                Event::Catalog(CatalogEvent::FileIndexed { path, .. })
                | Event::Catalog(CatalogEvent::SiblingGrouped { path, .. }) => {
                    pb.set_message(format!(
                        "Indexed {}",
                        path.file_name().unwrap_or_default().to_string_lossy()
                    ));
                }
                Event::Catalog(CatalogEvent::Completed(_)) => pb.finish_and_clear(),
                _ => {}
            }
        }
    });

    let result = manager.initialize_with_events(dir, &sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    result
}

fn run_stats(cli: &Cli, dir: &Path) -> Result<()> {
    let manager = build_manager(cli, true);
    let stats = index(&manager, dir, cli.output)?;
    let entries: Vec<EntrySummary> = manager.entries()?.iter().map(|e| e.summary()).collect();

    match cli.output {
        OutputFormat::Pretty => {
            let term = Term::stdout();
            term.write_line(&format!(
                "{} {}",
                style("Flat fields in").bold(),
                style(display_path(dir)).cyan()
            ))
            .ok();
            term.write_line(&format!(
                "  {} entries from {} files",
                style(stats.entry_count).cyan(),
                style(stats.file_count).cyan()
            ))
            .ok();
            term.write_line("").ok();

            for entry in &entries {
                print_entry(&term, entry);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "directory": dir,
                "entry_count": stats.entry_count,
                "file_count": stats.file_count,
                "entries": entries,
            });
            println!("{:#}", output);
        }
    }

    Ok(())
}

fn run_resolve(cli: &Cli, dir: &Path, query: ShotMetadata, resolve: &ResolveArgs) -> Result<()> {
    let manager = build_manager(cli, !resolve.no_average);
    index(&manager, dir, cli.output)?;

    let entry = manager.find_entry_for(
        &query.maker,
        &query.model,
        &query.lens,
        query.focal_length,
        query.aperture,
        query.timestamp,
    )?;

    let frame = if resolve.decode && entry.is_some() {
        manager
            .find_for(
                &query.maker,
                &query.model,
                &query.lens,
                query.focal_length,
                query.aperture,
                query.timestamp,
            )?
            .map(|frame| frame.info())
    } else {
        None
    };

    let resolution = Resolution {
        query,
        entry: entry.map(|e| e.summary()),
        frame,
    };

    match cli.output {
        OutputFormat::Pretty => print_resolution(&resolution),
        OutputFormat::Json => {
            let output = serde_json::to_value(&resolution)
                .map_err(|e| FlatFieldError::Config(format!("cannot encode result: {}", e)))?;
            println!("{:#}", output);
        }
    }

    Ok(())
}

fn print_resolution(resolution: &Resolution) {
    let term = Term::stdout();
    let query = &resolution.query;

    term.write_line(&format!(
        "{} {} {:.1}mm f/{:.1}",
        style("Shot:").bold(),
        query.camera_display(),
        query.focal_length,
        query.aperture
    ))
    .ok();
    if !query.lens.is_empty() {
        term.write_line(&format!("  {} {}", style("Lens:").dim(), query.lens))
            .ok();
    }
    term.write_line("").ok();

    match &resolution.entry {
        Some(entry) => {
            term.write_line(&format!("{} Flat field found", style("✓").green().bold()))
                .ok();
            print_entry(&term, entry);
        }
        None => {
            term.write_line(&format!(
                "{} No flat field for this camera",
                style("✗").red().bold()
            ))
            .ok();
        }
    }

    if let Some(frame) = &resolution.frame {
        term.write_line(&format!(
            "  {} {}x{} ({} cpp), averaged from {} file(s)",
            style("Frame:").dim(),
            frame.width,
            frame.height,
            frame.cpp,
            frame.averaged_from
        ))
        .ok();
    }
}

fn print_entry(term: &Term, entry: &EntrySummary) {
    let shot = &entry.shot;
    let lens = if shot.lens.is_empty() {
        "(no lens)"
    } else {
        shot.lens.as_str()
    };

    term.write_line(&format!(
        "  {} {} {:.1}mm f/{:.1}",
        style(shot.camera_display()).bold(),
        style(lens).yellow(),
        shot.focal_length,
        shot.aperture
    ))
    .ok();
    term.write_line(&format!(
        "    {} {}",
        style("★").green(),
        display_path(&entry.primary_path)
    ))
    .ok();
    for sibling in &entry.sibling_paths {
        term.write_line(&format!(
            "    {} {}",
            style("○").dim(),
            display_path(sibling)
        ))
        .ok();
    }
}

/// Show paths under the home directory as `~/...`
fn display_path(path: &Path) -> String {
    match dirs::home_dir()
        .as_deref()
        .and_then(|home| path.strip_prefix(home).ok())
    {
        Some(relative) => format!("~/{}", relative.display()),
        None => path.display().to_string(),
    }
}

/// Parse a capture time given as "YYYY-MM-DD HH:MM:SS" or EXIF style
/// "YYYY:MM:DD HH:MM:SS", read as UTC like EXIF dates are
fn parse_date(value: &str) -> Result<i64> {
    ["%Y-%m-%d %H:%M:%S", "%Y:%m:%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc().timestamp())
        .ok_or_else(|| FlatFieldError::Config(format!("invalid date '{}'", value)))
}
