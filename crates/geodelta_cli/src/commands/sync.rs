//! Sync command implementation.

use super::{print_report, RunArgs};
use geodelta_storage::FeatureStore;

/// Runs the sync command.
///
/// The initial snapshot is flushed even when some collections failed, so
/// the merges that did succeed are kept.
pub fn run(args: &RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (initial, latest) = args.open_stores()?;
    let report = args.engine(false).run(&initial, &latest)?;

    initial.flush()?;
    tracing::info!(store = %initial.location(), "initial snapshot flushed");

    print_report(&report, &args.format)
}
