//! Synchronization run configuration.

use crate::error::{SyncError, SyncResult};
use crate::pattern::NamePattern;
use std::path::PathBuf;

/// Configuration for a synchronization run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Radius of the tolerance buffer around each initial representative
    /// point. A latest point at this distance or closer is already known.
    pub buffer_distance: f64,

    /// How far inside a new polygon an initial centroid must lie for the
    /// initial feature to be treated as a duplicate and replaced.
    pub duplicate_tolerance: f64,

    /// Distance within which a latest geometry counts as touching a
    /// surviving representative point during candidate selection.
    pub selection_tolerance: f64,

    /// Upper bound on worker threads.
    pub max_workers: usize,

    /// Filter on container names. Standalone collections are not affected.
    pub container_filter: NamePattern,

    /// Filter on collection base names.
    pub collection_filter: NamePattern,

    /// Parent directory for the per-run scratch workspace
    /// (`None` = system temp dir).
    pub scratch_dir: Option<PathBuf>,

    /// Stop after the diff phase without touching the initial snapshot.
    pub detect_only: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            buffer_distance: 0.5,
            duplicate_tolerance: 0.2,
            selection_tolerance: 0.001,
            max_workers: 4,
            container_filter: NamePattern::any(),
            collection_filter: NamePattern::any(),
            scratch_dir: None,
            detect_only: false,
        }
    }
}

impl SyncConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the tolerance buffer radius.
    #[must_use]
    pub fn buffer_distance(mut self, distance: f64) -> Self {
        self.buffer_distance = distance;
        self
    }

    /// Sets the duplicate suppression tolerance.
    #[must_use]
    pub fn duplicate_tolerance(mut self, distance: f64) -> Self {
        self.duplicate_tolerance = distance;
        self
    }

    /// Sets the candidate selection tolerance.
    #[must_use]
    pub fn selection_tolerance(mut self, distance: f64) -> Self {
        self.selection_tolerance = distance;
        self
    }

    /// Sets the worker cap.
    #[must_use]
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    /// Sets the container filter.
    #[must_use]
    pub fn container_filter(mut self, pattern: NamePattern) -> Self {
        self.container_filter = pattern;
        self
    }

    /// Sets the collection filter.
    #[must_use]
    pub fn collection_filter(mut self, pattern: NamePattern) -> Self {
        self.collection_filter = pattern;
        self
    }

    /// Sets the scratch parent directory.
    #[must_use]
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Enables or disables detect-only mode.
    #[must_use]
    pub fn detect_only(mut self, value: bool) -> Self {
        self.detect_only = value;
        self
    }

    /// Checks that distances are positive and finite and that at least one
    /// worker is allowed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` naming the offending setting.
    pub fn validate(&self) -> SyncResult<()> {
        for (name, value) in [
            ("buffer_distance", self.buffer_distance),
            ("duplicate_tolerance", self.duplicate_tolerance),
            ("selection_tolerance", self.selection_tolerance),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SyncError::InvalidConfig(format!(
                    "{} must be a positive distance, got {}",
                    name, value
                )));
            }
        }
        if self.max_workers == 0 {
            return Err(SyncError::InvalidConfig(
                "max_workers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
