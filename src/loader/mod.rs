//! The Loader Contract (spec.md §4.4): a vendor-neutral boundary between the
//! pipeline orchestrator and whatever warehouse backend actually receives
//! the staged rows. Shape grounded on the teacher's `readers::OperationLoader`
//! trait in `readers/mod.rs` — a small set of lifecycle operations called by
//! the orchestrator in a fixed order, with the concrete backend free to
//! implement them however it needs to.

pub mod postgres;

use std::path::Path;

use uuid::Uuid;

use crate::errors::LoaderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Full,
    Delta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

/// Summary handed back by `bulk_load_to_staging` so the orchestrator can
/// populate the manifest (SPEC_FULL.md §C.3) without the loader knowing
/// anything about manifests.
#[derive(Debug, Clone, Default)]
pub struct StagingSummary {
    pub rows_staged: u64,
}

/// One row of `etl_processed_archives`, as returned by
/// `get_processed_archives` (spec.md §3). The orchestrator compares both
/// fields: an archive is skipped only when its name is present *and* its
/// checksum matches (spec.md §4.5 "skip any whose name is in the processed
/// set (and whose checksum matches when recorded)") — a same-named archive
/// with different bytes is reprocessed rather than silently skipped.
#[derive(Debug, Clone)]
pub struct ProcessedArchive {
    pub name: String,
    pub checksum: String,
}

/// The operations a warehouse backend must implement to participate in a
/// pipeline run. Every method that can fail returns `LoaderError`, whose
/// variants line up with spec.md §7's error-kind table so the orchestrator
/// can decide a run's outcome without string-matching.
pub trait Loader {
    /// Creates the relational schema if it does not already exist. Must be
    /// idempotent: calling it against an already-initialized warehouse is a
    /// no-op (spec.md §4.4 "initialize_schema").
    fn initialize_schema(&self) -> Result<(), LoaderError>;

    /// Registers a new run, performing crash recovery first: any `RUNNING`
    /// row older than the configured staleness threshold is flipped to
    /// `FAILED` (SPEC_FULL.md §C.1) before the new row is inserted. Returns
    /// the new run's id, or `LoaderError::AlreadyRunning` if another run is
    /// genuinely still in progress.
    fn start_run(&self, mode: RunMode) -> Result<Uuid, LoaderError>;

    /// Archives already recorded as fully processed, so the orchestrator can
    /// skip them (spec.md §8 idempotency property).
    fn get_processed_archives(&self) -> Result<Vec<ProcessedArchive>, LoaderError>;

    /// Drops non-primary-key indexes and disables referential-integrity
    /// triggers ahead of a bulk load (SPEC_FULL.md §C.6). A no-op for
    /// backends that have no such optimization to offer.
    fn pre_load_optimization(&self, mode: RunMode) -> Result<(), LoaderError>;

    /// Streams the chunk files produced by the writer for one table into a
    /// staging area via the backend's native bulk-ingest mechanism (spec.md
    /// §4.4 "bulk_load_to_staging"; native `COPY` for the reference loader).
    fn bulk_load_to_staging(&self, table: &str, chunk_files: &[&Path]) -> Result<StagingSummary, LoaderError>;

    /// Atomically publishes everything staged so far for this run into the
    /// production tables (spec.md §4.4 "merge_from_staging"). Must be
    /// all-or-nothing per archive: a failure here must not leave production
    /// tables partially updated for that archive.
    fn merge_from_staging(&self, mode: RunMode) -> Result<(), LoaderError>;

    /// Recreates indexes dropped by `pre_load_optimization` and re-enables
    /// triggers, then runs any backend-native statistics refresh.
    fn post_load_cleanup(&self, mode: RunMode) -> Result<(), LoaderError>;

    /// Records that an archive has been fully processed by `run_id`, for
    /// future idempotency checks. On conflict by `archive_name`, updates the
    /// checksum, document count, run id, and timestamp (spec.md §4.4
    /// "On conflict by name, update checksum and timestamp").
    fn record_processed_archive(
        &self,
        run_id: Uuid,
        archive_name: &str,
        checksum: &str,
        document_count: u64,
    ) -> Result<(), LoaderError>;

    /// Marks the run as finished, recording its final status and an optional
    /// error message.
    fn end_run(&self, run_id: Uuid, status: RunStatus, error_log: Option<&str>) -> Result<(), LoaderError>;
}
