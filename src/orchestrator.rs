//! The pipeline orchestrator (spec.md §4.5): drives the per-archive
//! parse → transform → write → stage → merge → record cycle, enforcing
//! atomicity and idempotency across archives (spec.md §3 invariants, §8
//! testable properties). The worker-pool shape is grounded on the teacher's
//! `loggers/taxa.rs` parallel-iteration pattern, but uses a plain
//! `std::thread` pool behind a bounded `std::sync::mpsc::sync_channel`
//! instead: the teacher's rayon-based pool has no explicit backpressure knob,
//! and spec.md §5 asks for a bounded work queue the caller controls the
//! depth of, so this module drops the `rayon` dependency entirely (see
//! DESIGN.md).

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::archive::{self, ArchiveExtractor, ZipArchiveExtractor};
use crate::config::Config;
use crate::errors::{AcquisitionError, Error, ParseError};
use crate::loader::{Loader, ProcessedArchive, RunMode, RunStatus};
use crate::parser;
use crate::transformer;
use crate::writer::IntermediateWriter;

/// Supplies archive paths when `full-load` is invoked without `--source`
/// (spec.md §6; SPEC_FULL.md §C.5). The HTTP fetcher itself is out of core
/// scope (spec.md §1); the orchestrator only ever calls through this trait.
pub trait AcquisitionSource {
    fn fetch(&self, dest_dir: &Path) -> Result<Vec<PathBuf>, Error>;
}

/// The binary's default wiring: no network fetcher is registered, so a
/// `full-load` without `--source` fails fast with a configuration-shaped
/// error rather than silently doing nothing (SPEC_FULL.md §C.5).
pub struct NoAcquisitionSource;

impl AcquisitionSource for NoAcquisitionSource {
    fn fetch(&self, _dest_dir: &Path) -> Result<Vec<PathBuf>, Error> {
        Err(Error::Acquisition(AcquisitionError::NotConfigured))
    }
}

/// Counts the CLI layer uses to pick an exit code (spec.md §6).
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub run_id: Option<Uuid>,
    pub archives_processed: u64,
    pub archives_quarantined: u64,
    pub documents_loaded: u64,
    pub documents_failed: u64,
}

impl RunSummary {
    /// spec.md §7: a run whose only problems were quarantined documents is
    /// still SUCCESS, but exits 3 rather than 0 (§8 "Quarantine").
    pub fn had_quarantine(&self) -> bool {
        self.documents_failed > 0
    }
}

#[derive(Serialize)]
struct ManifestEntry {
    archive: String,
    checksum: String,
    documents_loaded: u64,
    documents_failed: u64,
}

#[derive(Serialize)]
struct Manifest {
    run_id: String,
    archives: Vec<ManifestEntry>,
}

enum ProcessOutcome {
    Loaded,
    Quarantined(String),
}

/// Drives one pipeline run end to end. Generic over the `Loader` backend and
/// the archive extraction mechanism so tests can substitute an in-memory
/// loader and a no-op extractor without touching this module.
pub struct Orchestrator<L: Loader, E: ArchiveExtractor = ZipArchiveExtractor> {
    config: Config,
    loader: L,
    extractor: E,
    cancel: Arc<AtomicBool>,
}

impl<L: Loader> Orchestrator<L, ZipArchiveExtractor> {
    pub fn new(config: Config, loader: L) -> Self {
        Orchestrator { config, loader, extractor: ZipArchiveExtractor, cancel: Arc::new(AtomicBool::new(false)) }
    }
}

impl<L: Loader, E: ArchiveExtractor> Orchestrator<L, E> {
    pub fn with_extractor(config: Config, loader: L, extractor: E) -> Self {
        Orchestrator { config, loader, extractor, cancel: Arc::new(AtomicBool::new(false)) }
    }

    /// A handle the CLI layer can flip (e.g. from a Ctrl+C handler) to
    /// request cooperative cancellation (spec.md §5 "Cancellation").
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Runs one full pipeline cycle over `archives` in the given mode.
    /// `start_run`/`end_run` bracket the whole call so a crash between them
    /// leaves a `RUNNING` row for the next invocation's recovery sweep to
    /// find (spec.md §5 "Recovery").
    pub fn run(&self, mode: RunMode, archives: &[PathBuf]) -> Result<RunSummary, Error> {
        let run_id = self.loader.start_run(mode)?;
        let mut summary = RunSummary { run_id: Some(run_id), ..Default::default() };

        let outcome = self.run_inner(run_id, mode, archives, &mut summary);
        let canceled = self.cancel.load(Ordering::SeqCst);

        let final_status = if outcome.is_ok() && !canceled { RunStatus::Succeeded } else { RunStatus::Failed };
        let error_log = match (&outcome, canceled) {
            (Err(e), _) => Some(e.to_string()),
            (Ok(()), true) => Some("canceled".to_string()),
            (Ok(()), false) => None,
        };

        // end_run is best-effort per spec.md §4.4: a failure to close the
        // history row does not change the run's actual outcome, which the
        // crash-recovery sweep in start_run will reconcile on next launch.
        if let Err(e) = self.loader.end_run(run_id, final_status, error_log.as_deref()) {
            warn!(error = %e, "failed to close run history row");
        }

        outcome?;
        if canceled {
            return Err(Error::Canceled);
        }
        Ok(summary)
    }

    fn run_inner(
        &self,
        run_id: Uuid,
        mode: RunMode,
        archives: &[PathBuf],
        summary: &mut RunSummary,
    ) -> Result<(), Error> {
        if self.config.intermediate_format != crate::config::IntermediateFormat::Csv {
            // The columnar dialect (spec.md §4.3) has a writer
            // (`writer::columnar`) but isn't wired into this per-document
            // fan-out yet; fail fast rather than silently writing CSV under
            // a parquet-labeled config.
            return Err(Error::Loader(crate::errors::LoaderError::Writer {
                table: "*".to_string(),
                detail: "columnar intermediate format is not yet wired into the orchestrator; use csv".to_string(),
            }));
        }

        let processed: std::collections::HashMap<String, String> = self
            .loader
            .get_processed_archives()?
            .into_iter()
            .map(|ProcessedArchive { name, checksum }| (name, checksum))
            .collect();

        let run_dir = self.config.run_state_dir.join("runs").join(run_id.to_string());
        std::fs::create_dir_all(&run_dir)?;

        let quarantine_base = self.config.quarantine_path.clone().unwrap_or_else(|| run_dir.join("quarantine"));

        let mut manifest = Manifest { run_id: run_id.to_string(), archives: Vec::new() };
        let mut pre_optimized = false;
        let batch_size = self.config.batch_archives.max(1);

        for batch in archives.chunks(batch_size) {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }

            let mut members = Vec::new();
            for path in batch {
                let checksum = archive::sha256_file(path)?;
                let name = archive::archive_name(path);
                if processed.get(&name).is_some_and(|recorded| recorded == &checksum) {
                    info!(archive = %name, "already processed, skipping");
                    continue;
                }
                members.push((checksum, name, path.clone()));
            }
            if members.is_empty() {
                continue;
            }

            if !pre_optimized {
                self.loader.pre_load_optimization(mode)?;
                pre_optimized = true;
            }

            let staging_dir = run_dir.join("staging");
            if staging_dir.exists() {
                std::fs::remove_dir_all(&staging_dir)?;
            }
            let writer = Arc::new(Mutex::new(IntermediateWriter::new(
                &staging_dir,
                self.config.chunk_size,
                self.config.chunk_bytes,
            )));
            let seen_document_ids: Arc<Mutex<HashSet<Uuid>>> = Arc::new(Mutex::new(HashSet::new()));

            let bar = crate::utils::new_progress_bar(members.len(), "Loading archives");

            for (checksum, name, path) in &members {
                let scratch = run_dir.join("scratch").join(name);
                if scratch.exists() {
                    std::fs::remove_dir_all(&scratch)?;
                }
                self.extractor.extract(path, &scratch)?;
                let files = archive::xml_files(&scratch)?;

                let (loaded, failed) =
                    self.process_archive_files(name, &files, &writer, &seen_document_ids, &quarantine_base)?;

                summary.documents_loaded += loaded;
                summary.documents_failed += failed;
                summary.archives_processed += 1;
                if failed > 0 {
                    summary.archives_quarantined += 1;
                }

                manifest.archives.push(ManifestEntry {
                    archive: name.clone(),
                    checksum: checksum.clone(),
                    documents_loaded: loaded,
                    documents_failed: failed,
                });

                std::fs::remove_dir_all(&scratch).ok();
                bar.inc(1);

                if self.cancel.load(Ordering::SeqCst) {
                    break;
                }
            }
            bar.finish();

            if self.cancel.load(Ordering::SeqCst) {
                // Per-document atomicity only promises staging is consistent
                // within a document; an in-flight batch on cancellation is
                // simply discarded rather than partially staged.
                std::fs::remove_dir_all(&staging_dir).ok();
                return Ok(());
            }

            let writer = Arc::try_unwrap(writer)
                .unwrap_or_else(|_| unreachable!("workers have all joined by this point"))
                .into_inner()
                .expect("writer mutex poisoned");
            let tables = writer.finish()?;

            for (table, chunk_files) in &tables {
                if chunk_files.is_empty() {
                    continue;
                }
                let refs: Vec<&Path> = chunk_files.iter().map(PathBuf::as_path).collect();
                self.loader.bulk_load_to_staging(table, &refs)?;
            }

            self.loader.merge_from_staging(mode)?;

            // Ledger writes for every archive in this batch happen only
            // after the merge above has committed (spec.md §3 invariant 4:
            // an archive name appears in the ledger only once its documents
            // are visible in production).
            for (checksum, name, _) in &members {
                let count = manifest
                    .archives
                    .iter()
                    .rev()
                    .find(|e| &e.archive == name)
                    .map(|e| e.documents_loaded)
                    .unwrap_or(0);
                self.loader.record_processed_archive(run_id, name, checksum, count)?;
            }

            std::fs::remove_dir_all(&staging_dir).ok();
        }

        self.loader.post_load_cleanup(mode)?;

        let manifest_path = run_dir.join("manifest.json");
        std::fs::write(manifest_path, serde_json::to_string_pretty(&manifest)?)?;

        Ok(())
    }

    /// Parses and stages every file belonging to one archive through a
    /// bounded worker pool, returning `(documents_loaded, documents_failed)`.
    /// A `WriterError` aborts the whole archive (spec.md §7); a malformed or
    /// duplicate document is quarantined and processing continues (spec.md
    /// §4.1 "Errors", §9 Open Question on duplicate `document_id`).
    fn process_archive_files(
        &self,
        archive_name: &str,
        files: &[PathBuf],
        writer: &Arc<Mutex<IntermediateWriter>>,
        seen_document_ids: &Arc<Mutex<HashSet<Uuid>>>,
        quarantine_base: &Path,
    ) -> Result<(u64, u64), Error> {
        let worker_count = self.config.worker_count.max(1);
        let (tx, rx) = mpsc::sync_channel::<PathBuf>(self.config.queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let loaded = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));
        let abort: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
        let first_error: Arc<Mutex<Option<Error>>> = Arc::new(Mutex::new(None));
        let quarantine_dir = quarantine_base.join(archive_name);
        let run_cancel = self.cancel.clone();

        let handles: Vec<_> = (0..worker_count)
            .map(|_| {
                let rx = rx.clone();
                let writer = writer.clone();
                let seen = seen_document_ids.clone();
                let loaded = loaded.clone();
                let failed = failed.clone();
                let abort = abort.clone();
                let first_error = first_error.clone();
                let quarantine_dir = quarantine_dir.clone();
                let run_cancel = run_cancel.clone();

                std::thread::spawn(move || loop {
                    if abort.load(Ordering::SeqCst) || run_cancel.load(Ordering::SeqCst) {
                        break;
                    }
                    let next = rx.lock().expect("file queue mutex poisoned").recv();
                    let Ok(path) = next else { break };

                    match process_one_file(&path, &writer, &seen) {
                        Ok(ProcessOutcome::Loaded) => {
                            loaded.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(ProcessOutcome::Quarantined(detail)) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            warn!(file = %path.display(), %detail, "quarantining document");
                            if let Err(e) = quarantine_file(&path, &quarantine_dir) {
                                error!(file = %path.display(), error = %e, "failed to quarantine file");
                            }
                        }
                        Err(e) => {
                            let mut guard = first_error.lock().expect("error mutex poisoned");
                            if guard.is_none() {
                                *guard = Some(e);
                            }
                            abort.store(true, Ordering::SeqCst);
                            break;
                        }
                    }
                })
            })
            .collect();

        for path in files {
            if tx.send(path.clone()).is_err() {
                break;
            }
            if abort.load(Ordering::SeqCst) {
                break;
            }
        }
        drop(tx);

        for handle in handles {
            let _ = handle.join();
        }

        if let Some(e) = first_error.lock().expect("error mutex poisoned").take() {
            return Err(e);
        }

        Ok((loaded.load(Ordering::Relaxed), failed.load(Ordering::Relaxed)))
    }
}

fn process_one_file(
    path: &Path,
    writer: &Arc<Mutex<IntermediateWriter>>,
    seen_document_ids: &Arc<Mutex<HashSet<Uuid>>>,
) -> Result<ProcessOutcome, Error> {
    let file = std::fs::File::open(path)?;
    let reader = io::BufReader::new(file);
    let source_filename = path.to_string_lossy().into_owned();

    let document = match parser::parse_document(reader, &source_filename) {
        Ok(document) => document,
        Err(ParseError::MalformedDocument { detail, .. }) => return Ok(ProcessOutcome::Quarantined(detail)),
        Err(e) => return Ok(ProcessOutcome::Quarantined(e.to_string())),
    };

    {
        let mut seen = seen_document_ids.lock().expect("seen-document-id mutex poisoned");
        if !seen.insert(document.document_id) {
            return Ok(ProcessOutcome::Quarantined(format!(
                "duplicate document_id {} within this run",
                document.document_id
            )));
        }
    }

    let batch = transformer::transform(&document)?;

    let mut writer = writer.lock().expect("writer mutex poisoned");
    writer.write_batch(&batch)?;

    Ok(ProcessOutcome::Loaded)
}

fn quarantine_file(path: &Path, quarantine_dir: &Path) -> Result<(), Error> {
    std::fs::create_dir_all(quarantine_dir)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io(io::Error::new(io::ErrorKind::InvalidInput, "path has no filename")))?;
    std::fs::copy(path, quarantine_dir.join(file_name))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LoaderError;
    use crate::loader::StagingSummary;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Mutex as StdMutex;
    use tempfile::tempdir;

    /// An in-memory `Loader` used to exercise the orchestrator's control
    /// flow without a live database (SPEC_FULL.md §B "Test tooling").
    #[derive(Default)]
    struct MockLoader {
        processed: StdMutex<StdHashMap<String, String>>,
        staged_rows: StdMutex<u64>,
        merged: StdMutex<bool>,
        ended: StdMutex<Option<RunStatus>>,
    }

    impl Loader for MockLoader {
        fn initialize_schema(&self) -> Result<(), LoaderError> {
            Ok(())
        }
        fn start_run(&self, _mode: RunMode) -> Result<Uuid, LoaderError> {
            Ok(Uuid::new_v4())
        }
        fn get_processed_archives(&self) -> Result<Vec<ProcessedArchive>, LoaderError> {
            Ok(self
                .processed
                .lock()
                .unwrap()
                .iter()
                .map(|(name, checksum)| ProcessedArchive { name: name.clone(), checksum: checksum.clone() })
                .collect())
        }
        fn pre_load_optimization(&self, _mode: RunMode) -> Result<(), LoaderError> {
            Ok(())
        }
        fn bulk_load_to_staging(&self, _table: &str, chunk_files: &[&Path]) -> Result<StagingSummary, LoaderError> {
            *self.staged_rows.lock().unwrap() += chunk_files.len() as u64;
            Ok(StagingSummary { rows_staged: chunk_files.len() as u64 })
        }
        fn merge_from_staging(&self, _mode: RunMode) -> Result<(), LoaderError> {
            *self.merged.lock().unwrap() = true;
            Ok(())
        }
        fn post_load_cleanup(&self, _mode: RunMode) -> Result<(), LoaderError> {
            Ok(())
        }
        fn record_processed_archive(
            &self,
            _run_id: Uuid,
            archive_name: &str,
            checksum: &str,
            _count: u64,
        ) -> Result<(), LoaderError> {
            self.processed.lock().unwrap().insert(archive_name.to_string(), checksum.to_string());
            Ok(())
        }
        fn end_run(&self, _run_id: Uuid, status: RunStatus, _error_log: Option<&str>) -> Result<(), LoaderError> {
            *self.ended.lock().unwrap() = Some(status);
            Ok(())
        }
    }

    /// Stands in for `ZipArchiveExtractor` in tests: every archive file
    /// under test is a plain placeholder (so `sha256_file`/`archive_name`
    /// still work against a real file), and this extractor copies a
    /// pre-populated sibling directory named `<archive file stem>_contents`
    /// into the scratch directory instead of actually unzipping anything.
    struct PassthroughExtractor;

    impl ArchiveExtractor for PassthroughExtractor {
        fn extract(&self, archive_path: &Path, dest_dir: &Path) -> Result<(), Error> {
            let source_dir = archive_path.with_file_name(format!(
                "{}_contents",
                archive_path.file_stem().unwrap().to_string_lossy()
            ));
            std::fs::create_dir_all(dest_dir)?;
            for entry in std::fs::read_dir(source_dir)? {
                let entry = entry?;
                std::fs::copy(entry.path(), dest_dir.join(entry.file_name()))?;
            }
            Ok(())
        }
    }

    const SAMPLE_XML: &str = r#"<?xml version="1.0"?>
<document xmlns="urn:hl7-org:v3">
  <id root="11111111-1111-1111-1111-111111111111"/>
  <setId root="22222222-2222-2222-2222-222222222222"/>
  <effectiveTime value="20230115"/>
  <versionNumber value="1"/>
</document>
"#;

    fn test_config(run_dir: &Path) -> Config {
        Config {
            database_url: "postgres://unused".to_string(),
            run_state_dir: run_dir.to_path_buf(),
            worker_count: 2,
            queue_depth: 4,
            chunk_size: 50_000,
            chunk_bytes: 64 * 1024 * 1024,
            stale_run_threshold: std::time::Duration::from_secs(6 * 3600),
            intermediate_format: crate::config::IntermediateFormat::Csv,
            batch_archives: 1,
            quarantine_path: None,
        }
    }

    /// Builds `<root>/a.zip` (a real, checksummable placeholder file) plus
    /// its sibling `<root>/a_contents/` directory holding the XML files
    /// `PassthroughExtractor` will "extract" into scratch.
    fn archive_fixture(root: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let contents_dir = root.join(format!("{name}_contents"));
        std::fs::create_dir_all(&contents_dir).unwrap();
        for (filename, body) in files {
            std::fs::write(contents_dir.join(filename), body).unwrap();
        }
        let archive_path = root.join(format!("{name}.zip"));
        std::fs::write(&archive_path, format!("placeholder archive contents for {name}")).unwrap();
        archive_path
    }

    #[test]
    fn processes_a_single_well_formed_document() {
        let root = tempdir().unwrap();
        let archive = archive_fixture(root.path(), "a", &[("doc.xml", SAMPLE_XML)]);

        let loader = MockLoader::default();
        let config = test_config(&root.path().join("run_state"));
        let orchestrator = Orchestrator::with_extractor(config, loader, PassthroughExtractor);

        let summary = orchestrator.run(RunMode::Full, std::slice::from_ref(&archive)).unwrap();

        assert_eq!(summary.archives_processed, 1);
        assert_eq!(summary.documents_loaded, 1);
        assert_eq!(summary.documents_failed, 0);
        assert!(!summary.had_quarantine());
    }

    #[test]
    fn malformed_document_is_quarantined_and_run_still_succeeds() {
        let root = tempdir().unwrap();
        let archive = archive_fixture(
            root.path(),
            "a",
            &[("good.xml", SAMPLE_XML), ("bad.xml", "<document><unclosed>")],
        );

        let loader = MockLoader::default();
        let config = test_config(&root.path().join("run_state"));
        let orchestrator = Orchestrator::with_extractor(config, loader, PassthroughExtractor);

        let summary = orchestrator.run(RunMode::Full, std::slice::from_ref(&archive)).unwrap();

        assert_eq!(summary.documents_loaded, 1);
        assert_eq!(summary.documents_failed, 1);
        assert!(summary.had_quarantine());

        let quarantine_dir = root
            .path()
            .join("run_state")
            .join("runs")
            .join(summary.run_id.unwrap().to_string())
            .join("quarantine")
            .join(archive::archive_name(&archive));
        assert!(quarantine_dir.join("bad.xml").exists());
    }

    #[test]
    fn rerunning_with_already_processed_checksum_skips_staging() {
        let root = tempdir().unwrap();
        let archive = archive_fixture(root.path(), "a", &[("doc.xml", SAMPLE_XML)]);

        let loader = MockLoader::default();
        let checksum = archive::sha256_file(&archive).unwrap();
        let name = archive::archive_name(&archive);
        loader.processed.lock().unwrap().insert(name, checksum);

        let config = test_config(&root.path().join("run_state"));
        let orchestrator = Orchestrator::with_extractor(config, loader, PassthroughExtractor);
        let summary = orchestrator.run(RunMode::Delta, std::slice::from_ref(&archive)).unwrap();

        assert_eq!(summary.archives_processed, 0);
        assert_eq!(summary.documents_loaded, 0);
    }

    #[test]
    fn parquet_intermediate_format_fails_fast() {
        let root = tempdir().unwrap();
        let archive = archive_fixture(root.path(), "a", &[("doc.xml", SAMPLE_XML)]);

        let loader = MockLoader::default();
        let mut config = test_config(&root.path().join("run_state"));
        config.intermediate_format = crate::config::IntermediateFormat::Parquet;
        let orchestrator = Orchestrator::with_extractor(config, loader, PassthroughExtractor);

        let err = orchestrator.run(RunMode::Full, std::slice::from_ref(&archive)).unwrap_err();
        assert!(matches!(err, Error::Loader(_)));
    }

    #[test]
    fn same_name_with_different_checksum_is_reprocessed() {
        let root = tempdir().unwrap();
        let archive = archive_fixture(root.path(), "a", &[("doc.xml", SAMPLE_XML)]);

        let loader = MockLoader::default();
        loader
            .processed
            .lock()
            .unwrap()
            .insert(archive::archive_name(&archive), "stale-checksum-from-a-prior-run".to_string());

        let config = test_config(&root.path().join("run_state"));
        let orchestrator = Orchestrator::with_extractor(config, loader, PassthroughExtractor);
        let summary = orchestrator.run(RunMode::Delta, std::slice::from_ref(&archive)).unwrap();

        assert_eq!(summary.archives_processed, 1);
        assert_eq!(summary.documents_loaded, 1);
    }
}
