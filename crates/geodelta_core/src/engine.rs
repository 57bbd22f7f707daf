//! Work orchestrator.
//!
//! A run goes through four phases, each finishing before the next starts:
//! collapse the initial snapshot, collapse the latest snapshot, diff, then
//! merge. Within a phase, polygon and line collections are processed one
//! at a time and point collections are spread across the worker pool.
//! Collections are visited in `(container, name)` order within each kind.

use crate::collaborators::{BulkCopier, ReportSink, SchemaUpgrader};
use crate::collapse::collapse;
use crate::config::SyncConfig;
use crate::diff::diff;
use crate::error::{
    CollectionError, CollectionErrorKind, CollectionResult, Operation, SyncError, SyncResult,
};
use crate::field_map::FieldMap;
use crate::merge::{merge_collection, MergeTarget, MergeTolerances, WriterLocks};
use crate::pool::WorkerPool;
use crate::report::{DeltaRecord, MergeOutcome, RunFailure, SyncReport};
use crate::scratch::{ScratchWorkspace, SnapshotRole};
use geodelta_storage::{
    CollectionInfo, CollectionRef, FeatureStore, GeometryKind, CURRENT_FORMAT_VERSION,
};
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

/// A collection present in both snapshots under the same base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPair {
    /// Shared base name.
    pub name: String,
    /// Shared geometry kind.
    pub kind: GeometryKind,
    /// Reference in the initial snapshot.
    pub initial: CollectionRef,
    /// Reference in the latest snapshot.
    pub latest: CollectionRef,
}

impl CollectionPair {
    fn sort_key(&self) -> (GeometryKind, Option<&str>, &str) {
        (self.kind, self.initial.base_container(), &self.name)
    }
}

/// What to do with each collection of a run.
#[derive(Debug, Default)]
pub struct RunPlan {
    /// Matched collections, ordered by kind then `(container, name)`.
    pub pairs: Vec<CollectionPair>,
    /// Collections only the latest snapshot has.
    pub latest_only: Vec<CollectionInfo>,
    /// Matched names whose geometry kinds disagree.
    pub mismatched: Vec<CollectionError>,
}

/// Lists a snapshot's collections keyed by base name, applying the
/// configured filters.
///
/// When two collections share a base name, the first in `(container, name)`
/// order wins and the other is skipped with a warning.
///
/// # Errors
///
/// Returns `InvalidSnapshot` if the store cannot be enumerated.
pub fn catalogue(
    store: &dyn FeatureStore,
    config: &SyncConfig,
) -> SyncResult<BTreeMap<String, CollectionInfo>> {
    let infos = store
        .list_collections()
        .map_err(|e| SyncError::invalid_snapshot(store.location(), e))?;

    let mut by_name: BTreeMap<String, CollectionInfo> = BTreeMap::new();
    for info in infos {
        if let Some(container) = info.reference.base_container() {
            if !config.container_filter.matches(container) {
                continue;
            }
        }
        let name = info.reference.base_name().to_string();
        if !config.collection_filter.matches(&name) {
            continue;
        }
        if let Some(existing) = by_name.get(&name) {
            tracing::warn!(
                store = %store.location(),
                collection = %info.reference,
                kept = %existing.reference,
                "duplicate base name, skipping collection"
            );
            continue;
        }
        by_name.insert(name, info);
    }
    Ok(by_name)
}

/// Matches the two catalogues by base name.
#[must_use]
pub fn plan(
    initial: &BTreeMap<String, CollectionInfo>,
    latest: &BTreeMap<String, CollectionInfo>,
) -> RunPlan {
    let mut plan = RunPlan::default();
    for (name, latest_info) in latest {
        let Some(initial_info) = initial.get(name) else {
            plan.latest_only.push(latest_info.clone());
            continue;
        };
        if initial_info.kind != latest_info.kind {
            plan.mismatched.push(CollectionError::new(
                name.as_str(),
                Operation::Diff,
                CollectionErrorKind::KindMismatch {
                    initial: initial_info.kind,
                    latest: latest_info.kind,
                },
            ));
            continue;
        }
        plan.pairs.push(CollectionPair {
            name: name.clone(),
            kind: initial_info.kind,
            initial: initial_info.reference.clone(),
            latest: latest_info.reference.clone(),
        });
    }
    plan.pairs.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    plan
}

/// Synchronizes an initial snapshot with a latest one.
///
/// # Example
///
/// ```rust
/// use geodelta_core::{SyncConfig, SyncEngine};
/// use geodelta_storage::InMemoryStore;
///
/// let initial = InMemoryStore::new("initial");
/// let latest = InMemoryStore::new("latest");
/// let report = SyncEngine::new(SyncConfig::default())
///     .run(&initial, &latest)
///     .unwrap();
/// assert!(report.deltas.is_empty());
/// ```
pub struct SyncEngine {
    config: SyncConfig,
    bulk_copier: Option<Box<dyn BulkCopier>>,
    upgrader: Option<Box<dyn SchemaUpgrader>>,
    report_sink: Option<Box<dyn ReportSink>>,
}

impl SyncEngine {
    /// Creates an engine without collaborators.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            bulk_copier: None,
            upgrader: None,
            report_sink: None,
        }
    }

    /// Hands latest-only collections to `copier` during full runs.
    #[must_use]
    pub fn with_bulk_copier(mut self, copier: impl BulkCopier + 'static) -> Self {
        self.bulk_copier = Some(Box::new(copier));
        self
    }

    /// Upgrades stale snapshots with `upgrader` before the run.
    #[must_use]
    pub fn with_upgrader(mut self, upgrader: impl SchemaUpgrader + 'static) -> Self {
        self.upgrader = Some(Box::new(upgrader));
        self
    }

    /// Sends the delta sequence to `sink` after the run.
    #[must_use]
    pub fn with_report_sink(mut self, sink: impl ReportSink + 'static) -> Self {
        self.report_sink = Some(Box::new(sink));
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs one synchronization.
    ///
    /// Per-collection failures are recorded in the report and never abort
    /// the run. The scratch workspace is removed before returning, whatever
    /// the outcome.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if the configuration does not validate
    /// - `InvalidSnapshot` if a snapshot cannot be enumerated or is stale
    ///   and cannot be upgraded
    /// - `EngineUnavailable` if the worker pool or scratch workspace cannot
    ///   be created
    pub fn run(
        &self,
        initial: &dyn FeatureStore,
        latest: &dyn FeatureStore,
    ) -> SyncResult<SyncReport> {
        let started = Instant::now();
        self.config.validate()?;
        self.ensure_current(initial)?;
        self.ensure_current(latest)?;

        let initial_catalogue = catalogue(initial, &self.config)?;
        let latest_catalogue = catalogue(latest, &self.config)?;

        let run_id = Uuid::new_v4();
        let pool =
            WorkerPool::new(self.config.max_workers).map_err(SyncError::engine_unavailable)?;
        let workspace = ScratchWorkspace::create(self.config.scratch_dir.as_deref(), run_id)
            .map_err(SyncError::engine_unavailable)?;

        let span = tracing::info_span!("sync", run_id = %run_id);
        let _enter = span.enter();
        tracing::info!(
            initial = %initial.location(),
            latest = %latest.location(),
            workers = pool.threads(),
            detect_only = self.config.detect_only,
            "starting synchronization"
        );

        let mut report = SyncReport::new(run_id, self.config.detect_only);
        let plan = plan(&initial_catalogue, &latest_catalogue);
        for err in &plan.mismatched {
            record_failure(&mut report, err);
        }
        report.latest_only = plan
            .latest_only
            .iter()
            .map(|info| info.reference.base_name().to_string())
            .collect();

        let ctx = RunContext {
            config: &self.config,
            pool: &pool,
            workspace: &workspace,
            initial,
            latest,
        };

        ctx.collapse_phase(&plan.pairs, SnapshotRole::Initial, &mut report);
        ctx.collapse_phase(&plan.pairs, SnapshotRole::Latest, &mut report);
        let delta_pairs = ctx.diff_phase(&plan.pairs, &mut report);

        if !self.config.detect_only {
            ctx.merge_phase(&delta_pairs, &mut report);
            self.bulk_copy_phase(initial, latest, &plan.latest_only, &mut report);
        }

        if let Some(sink) = &self.report_sink {
            if let Err(e) = sink.write(&report.deltas) {
                tracing::error!(error = %e, "report sink failed");
                report.sink_error = Some(e);
            }
        }

        if let Err(e) = workspace.close() {
            tracing::warn!(error = %e, "failed to remove scratch workspace");
        }

        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            deltas = report.deltas.len(),
            new_features = report.total_new_features(),
            appended = report.total_appended(),
            failures = report.failures.len(),
            elapsed_ms = report.elapsed_ms,
            "synchronization finished"
        );
        Ok(report)
    }

    fn ensure_current(&self, store: &dyn FeatureStore) -> SyncResult<()> {
        if !store.needs_upgrade() {
            return Ok(());
        }
        let Some(upgrader) = &self.upgrader else {
            return Err(SyncError::invalid_snapshot(
                store.location(),
                format!(
                    "format version {:?} is older than {:?}",
                    store.format_version(),
                    CURRENT_FORMAT_VERSION
                ),
            ));
        };

        tracing::info!(
            store = %store.location(),
            version = ?store.format_version(),
            "upgrading snapshot"
        );
        upgrader.upgrade(store).map_err(|e| {
            SyncError::invalid_snapshot(store.location(), format!("upgrade failed: {}", e))
        })
    }

    fn bulk_copy_phase(
        &self,
        initial: &dyn FeatureStore,
        latest: &dyn FeatureStore,
        latest_only: &[CollectionInfo],
        report: &mut SyncReport,
    ) {
        let Some(copier) = &self.bulk_copier else {
            for info in latest_only {
                tracing::info!(
                    collection = %info.reference,
                    "collection only in latest snapshot, left for bulk copy"
                );
            }
            return;
        };

        for info in latest_only {
            let name = info.reference.base_name();
            let target = match info.reference.base_container() {
                Some(container) => CollectionRef::in_container(container, name),
                None => CollectionRef::new(name),
            };
            match copier.copy(latest, &info.reference, initial, &target) {
                Ok(()) => {
                    tracing::info!(collection = %name, target = %target, "bulk copied collection");
                    report.bulk_copied.push(name.to_string());
                }
                Err(e) => {
                    let err = CollectionError::new(
                        name,
                        Operation::BulkCopy,
                        CollectionErrorKind::Collaborator(e),
                    );
                    record_failure(report, &err);
                }
            }
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("bulk_copier", &self.bulk_copier.is_some())
            .field("upgrader", &self.upgrader.is_some())
            .field("report_sink", &self.report_sink.is_some())
            .finish()
    }
}

/// Shared state of one run, borrowed by every phase.
struct RunContext<'a> {
    config: &'a SyncConfig,
    pool: &'a WorkerPool,
    workspace: &'a ScratchWorkspace,
    initial: &'a dyn FeatureStore,
    latest: &'a dyn FeatureStore,
}

impl RunContext<'_> {
    /// Runs `f` over `pairs` kind by kind, returning results in `pairs`
    /// order. Only point collections go through the pool.
    fn each_collection<R, F>(&self, pairs: &[CollectionPair], f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(&CollectionPair) -> R + Sync + Send,
    {
        let mut results = Vec::with_capacity(pairs.len());
        for kind in GeometryKind::ALL {
            let group: Vec<&CollectionPair> = pairs.iter().filter(|p| p.kind == kind).collect();
            if kind == GeometryKind::Point {
                results.extend(self.pool.map_ordered(&group, |pair| f(*pair)));
            } else {
                results.extend(group.into_iter().map(&f));
            }
        }
        results
    }

    fn collapse_phase(
        &self,
        pairs: &[CollectionPair],
        role: SnapshotRole,
        report: &mut SyncReport,
    ) {
        let _span = tracing::info_span!("collapse", role = %role).entered();
        let store = match role {
            SnapshotRole::Initial => self.initial,
            SnapshotRole::Latest => self.latest,
        };

        let results = self.each_collection(pairs, |pair| {
            let reference = match role {
                SnapshotRole::Initial => &pair.initial,
                SnapshotRole::Latest => &pair.latest,
            };
            collapse(
                store,
                reference,
                &pair.name,
                role,
                self.workspace,
                self.config.buffer_distance,
            )
        });

        for result in results {
            if let Err(e) = result {
                record_failure(report, &e);
            }
        }
    }

    fn diff_phase<'p>(
        &self,
        pairs: &'p [CollectionPair],
        report: &mut SyncReport,
    ) -> Vec<&'p CollectionPair> {
        let _span = tracing::info_span!("diff").entered();
        let results = self.each_collection(pairs, |pair| diff(self.workspace, &pair.name));

        let mut delta_pairs = Vec::new();
        for (pair, result) in pairs.iter().zip(results) {
            match result {
                Ok(Some(0)) => report.unchanged.push(pair.name.clone()),
                Ok(Some(count)) => {
                    tracing::info!(
                        collection = %pair.name,
                        new_features = count,
                        "new features detected"
                    );
                    report.deltas.push(DeltaRecord {
                        collection: pair.name.clone(),
                        container: pair.initial.base_container().map(str::to_string),
                        kind: pair.kind,
                        new_features: count,
                    });
                    delta_pairs.push(pair);
                }
                Ok(None) => {}
                Err(e) => record_failure(report, &e),
            }
        }
        delta_pairs
    }

    fn merge_phase(&self, delta_pairs: &[&CollectionPair], report: &mut SyncReport) {
        let _span = tracing::info_span!("merge").entered();
        let locks = WriterLocks::new();
        let tolerances = MergeTolerances {
            selection: self.config.selection_tolerance,
            duplicate: self.config.duplicate_tolerance,
        };

        let pairs: Vec<CollectionPair> = delta_pairs.iter().map(|p| (*p).clone()).collect();
        let results =
            self.each_collection(&pairs, |pair| self.merge_one(pair, &locks, tolerances));

        for result in results {
            match result {
                Ok(outcome) => report.merges.push(outcome),
                Err(e) => {
                    // A failed merge leaves no delta for the report sink.
                    report.deltas.retain(|d| d.collection != e.collection);
                    record_failure(report, &e);
                }
            }
        }
    }

    fn merge_one(
        &self,
        pair: &CollectionPair,
        locks: &WriterLocks,
        tolerances: MergeTolerances,
    ) -> CollectionResult<MergeOutcome> {
        let source = self
            .latest
            .schema(&pair.latest)
            .map_err(CollectionError::during(&pair.name, Operation::Append))?;
        let target = self
            .initial
            .schema(&pair.initial)
            .map_err(CollectionError::during(&pair.name, Operation::Append))?;
        let field_map = FieldMap::build(&source, &target);

        merge_collection(
            self.initial,
            self.latest,
            self.workspace,
            locks,
            MergeTarget {
                name: &pair.name,
                kind: pair.kind,
                initial: &pair.initial,
                latest: &pair.latest,
            },
            &field_map,
            tolerances,
        )
    }
}

fn record_failure(report: &mut SyncReport, err: &CollectionError) {
    tracing::error!(
        collection = %err.collection,
        operation = %err.operation,
        error = %err.source,
        "collection skipped"
    );
    report.failures.push(RunFailure::from(err));
}
