//! Detect command implementation.

use super::{print_report, RunArgs};

/// Runs the detect command.
///
/// Both snapshots are only read; nothing is flushed.
pub fn run(args: &RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (initial, latest) = args.open_stores()?;
    let report = args.engine(true).run(&initial, &latest)?;
    print_report(&report, &args.format)
}
