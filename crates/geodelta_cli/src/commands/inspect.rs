//! Inspect command implementation.

use geodelta_storage::{FeatureStore, FileStore};
use serde::Serialize;
use std::path::Path;

/// Snapshot inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Snapshot directory.
    pub path: String,
    /// On-disk format version.
    pub format_version: String,
    /// True if the snapshot must be upgraded before a run.
    pub needs_upgrade: bool,
    /// Per-collection summaries.
    pub collections: Vec<CollectionSummary>,
}

/// Summary of one collection.
#[derive(Debug, Serialize)]
pub struct CollectionSummary {
    /// `container/name` or `name`.
    pub reference: String,
    /// Geometry kind.
    pub kind: String,
    /// Number of features.
    pub features: usize,
    /// Attribute fields a merge may write.
    pub editable_fields: Vec<String>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileStore::open(path)?;
    let (major, minor) = store.format_version();

    let mut collections = Vec::new();
    for info in store.list_collections()? {
        let schema = store.schema(&info.reference)?;
        collections.push(CollectionSummary {
            reference: info.reference.to_string(),
            kind: info.kind.to_string(),
            features: info.feature_count,
            editable_fields: schema
                .fields()
                .filter(|f| f.accepts_writes())
                .map(|f| f.name.clone())
                .collect(),
        });
    }

    let result = InspectResult {
        path: path.display().to_string(),
        format_version: format!("{}.{}", major, minor),
        needs_upgrade: store.needs_upgrade(),
        collections,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result),
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Snapshot: {}", result.path);
    print!("Format:   v{}", result.format_version);
    if result.needs_upgrade {
        print!(" (upgrade required)");
    }
    println!();
    println!();

    if result.collections.is_empty() {
        println!("No collections.");
        return;
    }

    println!("{:<40} {:<8} {:>10}  Fields", "Collection", "Kind", "Features");
    for c in &result.collections {
        println!(
            "{:<40} {:<8} {:>10}  {}",
            c.reference,
            c.kind,
            c.features,
            c.editable_fields.join(", ")
        );
    }
}
