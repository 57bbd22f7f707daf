//! CLI command implementations.

pub mod delta_file;
pub mod detect;
pub mod inspect;
pub mod sync;

use clap::Args;
use delta_file::DeltaFile;
use geodelta_core::{NamePattern, SyncConfig, SyncEngine, SyncReport};
use geodelta_storage::FileStore;
use std::path::PathBuf;

/// Arguments shared by `detect` and `sync`.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Initial snapshot directory (receives new features on sync)
    #[arg(short, long)]
    pub initial: PathBuf,

    /// Latest snapshot directory
    #[arg(short, long)]
    pub latest: PathBuf,

    /// Radius of the tolerance buffer around initial features
    #[arg(long, default_value_t = 0.5)]
    pub buffer_distance: f64,

    /// How far inside a new polygon an old centroid must lie to be replaced
    #[arg(long, default_value_t = 0.2)]
    pub duplicate_tolerance: f64,

    /// Distance within which a latest feature belongs to a surviving point
    #[arg(long, default_value_t = 0.001)]
    pub selection_tolerance: f64,

    /// Maximum worker threads for point collections
    #[arg(short, long, default_value_t = 4)]
    pub workers: usize,

    /// Only process containers matching this glob
    #[arg(long, default_value = "*")]
    pub container: NamePattern,

    /// Only process collections matching this glob
    #[arg(long, default_value = "*")]
    pub collection: NamePattern,

    /// Directory for the per-run scratch workspace
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Also write the deltas to this CSV file
    #[arg(short, long)]
    pub report: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

impl RunArgs {
    /// Maps the flags onto a configuration.
    pub fn config(&self, detect_only: bool) -> SyncConfig {
        let mut config = SyncConfig::new()
            .buffer_distance(self.buffer_distance)
            .duplicate_tolerance(self.duplicate_tolerance)
            .selection_tolerance(self.selection_tolerance)
            .max_workers(self.workers)
            .container_filter(self.container.clone())
            .collection_filter(self.collection.clone())
            .detect_only(detect_only);
        if let Some(dir) = &self.scratch_dir {
            config = config.scratch_dir(dir);
        }
        config
    }

    /// Builds the engine, wiring the delta file if one was requested.
    pub fn engine(&self, detect_only: bool) -> SyncEngine {
        let engine = SyncEngine::new(self.config(detect_only));
        match &self.report {
            Some(path) => engine.with_report_sink(DeltaFile::new(path)),
            None => engine,
        }
    }

    /// Opens both snapshots.
    pub fn open_stores(&self) -> Result<(FileStore, FileStore), Box<dyn std::error::Error>> {
        let initial = FileStore::open(&self.initial)?;
        let latest = FileStore::open(&self.latest)?;
        Ok((initial, latest))
    }
}

/// Prints a finished run.
pub fn print_report(report: &SyncReport, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        _ => print_text_report(report),
    }
    Ok(())
}

fn print_text_report(report: &SyncReport) {
    println!("Run {}", report.run_id);
    println!();

    if report.deltas.is_empty() {
        println!("No new features.");
    } else {
        println!("New features:");
        for delta in &report.deltas {
            println!("  {:<32} {:>8}  ({})", delta.collection, delta.new_features, delta.kind);
        }
        println!("  {:<32} {:>8}", "total", report.total_new_features());
    }

    if !report.detect_only && !report.merges.is_empty() {
        println!();
        println!("Merged:");
        for merge in &report.merges {
            println!(
                "  {:<32} appended {:>6}  replaced {:>6}  fields {:>3}",
                merge.collection, merge.appended, merge.deleted, merge.field_count
            );
        }
    }

    if !report.latest_only.is_empty() {
        println!();
        println!("Only in latest snapshot:");
        for name in &report.latest_only {
            let note = if report.bulk_copied.contains(name) {
                "copied"
            } else {
                "skipped"
            };
            println!("  {:<32} {}", name, note);
        }
    }

    if !report.failures.is_empty() {
        println!();
        println!("Failures:");
        for failure in &report.failures {
            println!(
                "  {:<32} {:<10} {}",
                failure.collection,
                failure.operation.to_string(),
                failure.message
            );
        }
    }

    if let Some(err) = &report.sink_error {
        println!();
        println!("Delta report not written: {}", err);
    }

    println!();
    println!("Finished in {} ms", report.elapsed_ms);
}
