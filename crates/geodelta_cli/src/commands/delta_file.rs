//! Delta report file.
//!
//! A CSV file with a `FeatureClasses,Count` header and one row per
//! collection with new features, in run order.

use geodelta_core::{DeltaRecord, ReportSink};
use std::path::{Path, PathBuf};

const HEADER: [&str; 2] = ["FeatureClasses", "Count"];

/// Report sink writing deltas to a CSV file.
#[derive(Debug, Clone)]
pub struct DeltaFile {
    path: PathBuf,
}

impl DeltaFile {
    /// Targets `path`; the file is replaced on every run.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn write_csv(&self, records: &[DeltaRecord]) -> csv::Result<()> {
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(HEADER)?;
        for record in records {
            let count = record.new_features.to_string();
            writer.write_record([record.collection.as_str(), count.as_str()])?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ReportSink for DeltaFile {
    fn write(&self, records: &[DeltaRecord]) -> Result<(), String> {
        self.write_csv(records)
            .map_err(|e| format!("cannot write {}: {}", self.path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodelta_storage::GeometryKind;
    use std::fs;

    fn record(name: &str, kind: GeometryKind, n: usize) -> DeltaRecord {
        DeltaRecord {
            collection: name.to_string(),
            container: None,
            kind,
            new_features: n,
        }
    }

    #[test]
    fn writes_one_line_per_delta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deltas.csv");
        DeltaFile::new(&path)
            .write(&[
                record("PARCELS", GeometryKind::Polygon, 2),
                record("WELLS", GeometryKind::Point, 17),
            ])
            .unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "FeatureClasses,Count\nPARCELS,2\nWELLS,17\n"
        );
    }

    #[test]
    fn awkward_names_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deltas.csv");
        DeltaFile::new(&path)
            .write(&[record("LOTS,OLD", GeometryKind::Polygon, 3)])
            .unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "FeatureClasses,Count\n\"LOTS,OLD\",3\n"
        );
    }

    #[test]
    fn empty_run_truncates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deltas.csv");
        fs::write(&path, "STALE,1\n").unwrap();
        DeltaFile::new(&path).write(&[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "FeatureClasses,Count\n");
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DeltaFile::new(dir.path().join("missing").join("deltas.csv"))
            .write(&[record("ROADS", GeometryKind::Line, 1)])
            .unwrap_err();
        assert!(err.contains("cannot write"));
    }
}
