//! Scanner: enumerates every target definition once and turns it into a
//! ranked, bounded preview of removal candidates.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs,
    io,
    path::Path,
    sync::{
        atomic::{
            AtomicU64,
            AtomicUsize,
            Ordering,
        },
        Arc,
    },
};

use chrono::{
    DateTime,
    Utc,
};
use rayon::prelude::*;
use thiserror::Error;
use walkdir::WalkDir;

use crate::{
    cancel::CancellationToken,
    fs::is_locked,
    retention::CrashRetentionPolicy,
    safety::PathSafetyGate,
    score::{
        is_crash_artifact,
        FileContext,
        Scorer,
    },
    signature::{
        SignatureCatalog,
        SignatureSnapshot,
    },
    utils::count_label,
    TargetDefinition,
};

mod accumulator;
use accumulator::DirectoryAccumulator;

mod report;
pub use report::*;

mod top;
pub use top::TopN;

pub const DEFAULT_PREVIEW_COUNT: usize = 25;
const MAX_SCAN_THREADS: usize = 4;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("scan cancelled")]
    Cancelled,

    #[error("failed to start scan workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Snapshot of scan progress, pushed after every finished target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProgress {
    pub completed: usize,
    pub total: usize,
    pub current_label: String,
    pub bytes_so_far: u64,
    pub items_so_far: u64,
}

pub trait ScanProgressConsumer: Send + Sync {
    fn consume_progress(&self, progress: ScanProgress);
}

pub struct VoidScanProgressConsumer;
impl ScanProgressConsumer for VoidScanProgressConsumer {
    fn consume_progress(&self, _progress: ScanProgress) {}
}

pub struct ScanOptions {
    /// Upper bound of preview items per target.
    pub preview_count: usize,
    pub preview_kind: PreviewKind,
    pub cancellation: CancellationToken,
    pub progress_consumer: Box<dyn ScanProgressConsumer>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            preview_count: DEFAULT_PREVIEW_COUNT,
            preview_kind: PreviewKind::All,
            cancellation: CancellationToken::new(),
            progress_consumer: Box::new(VoidScanProgressConsumer),
        }
    }
}

pub struct Scanner<'g> {
    signatures: Arc<SignatureSnapshot>,
    gate: &'g PathSafetyGate,
}

impl Scanner<'static> {
    /// Scanner over the process wide signature catalog and safety gate.
    pub fn from_global() -> Self {
        Self::new(SignatureCatalog::global().snapshot(), PathSafetyGate::global())
    }
}

impl<'g> Scanner<'g> {
    pub fn new(signatures: Arc<SignatureSnapshot>, gate: &'g PathSafetyGate) -> Self {
        Self { signatures, gate }
    }

    pub fn signatures(&self) -> &SignatureSnapshot {
        &self.signatures
    }

    pub fn scan(
        &self,
        definitions: &[TargetDefinition],
        options: &ScanOptions,
    ) -> Result<Report, ScanError> {
        self.scan_at(definitions, options, Utc::now())
    }

    /// Scan with an explicit clock. Every age in the report is measured
    /// against `now`.
    pub fn scan_at(
        &self,
        definitions: &[TargetDefinition],
        options: &ScanOptions,
        now: DateTime<Utc>,
    ) -> Result<Report, ScanError> {
        let threads = (num_cpus::get() / 2).clamp(1, MAX_SCAN_THREADS);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("reclaim-scan-{}", index))
            .build()?;

        log::debug!(
            "Scanning {} on {} workers",
            count_label(definitions.len(), "target"),
            threads
        );

        let completed = AtomicUsize::new(0);
        let bytes = AtomicU64::new(0);
        let items = AtomicU64::new(0);
        let targets = pool.install(|| {
            definitions
                .par_iter()
                .map(|definition| {
                    if options.cancellation.is_cancelled() {
                        return Err(ScanError::Cancelled);
                    }

                    let report = self.scan_target(definition, options, now)?;
                    let bytes_so_far =
                        bytes.fetch_add(report.total_size, Ordering::Relaxed) + report.total_size;
                    let items_so_far =
                        items.fetch_add(report.item_count, Ordering::Relaxed) + report.item_count;
                    options.progress_consumer.consume_progress(ScanProgress {
                        completed: completed.fetch_add(1, Ordering::Relaxed) + 1,
                        total: definitions.len(),
                        current_label: definition.category.clone(),
                        bytes_so_far,
                        items_so_far,
                    });
                    Ok(report)
                })
                .collect::<Result<Vec<_>, _>>()
        })?;

        if options.cancellation.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        Ok(Report::new(targets))
    }

    fn scan_target(
        &self,
        definition: &TargetDefinition,
        options: &ScanOptions,
        now: DateTime<Utc>,
    ) -> Result<TargetReport, ScanError> {
        let mut report = TargetReport::new(definition);
        let Some(root) = definition.resolve_path() else {
            log::debug!("Target {} has no resolvable path", definition.category);
            report.warnings.push("path could not be resolved".to_string());
            return Ok(report);
        };
        report.resolved_path = Some(root.clone());

        let metadata = match fs::metadata(&root) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                log::debug!("Target {} does not exist at {}", definition.category, root.display());
                return Ok(report);
            }
            Err(error) => {
                log::warn!("Failed to inspect {}: {:#}", root.display(), error);
                report.exists = true;
                report.fail(format!("could not be read: {}", error));
                return Ok(report);
            }
        };
        report.exists = true;

        let scorer = Scorer::new(&self.signatures, self.gate);
        if metadata.is_file() {
            self.scan_single_file(&scorer, definition, &root, &metadata, options, now, &mut report);
            return Ok(report);
        }

        /* the walk below swallows a failing root, read it up front */
        if let Err(error) = fs::read_dir(&root) {
            log::warn!("Failed to read target {}: {:#}", root.display(), error);
            report.fail(format!("could not be read: {}", error));
            return Ok(report);
        }

        let mut walk = TargetWalk::new(&scorer, definition, &root, options, now);
        walk.run(&mut report)?;
        walk.finish(&mut report);
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn scan_single_file(
        &self,
        scorer: &Scorer,
        definition: &TargetDefinition,
        path: &Path,
        metadata: &fs::Metadata,
        options: &ScanOptions,
        now: DateTime<Utc>,
        report: &mut TargetReport,
    ) {
        let context = FileContext::from_metadata(path, metadata, now);
        report.item_count = 1;
        report.total_size = context.size;

        if scorer.should_check_active_lock(definition, &context) && is_locked(path) {
            report
                .warnings
                .push(format!("{} skipped because locked", count_label(1, "file")));
            return;
        }

        if definition.classification.applies_crash_retention()
            && is_crash_artifact(&self.signatures, &context)
            && CrashRetentionPolicy::new(&self.signatures)
                .paths_to_protect([&context])
                .contains(&context.path)
        {
            report.warnings.push(format!(
                "{} retained as the newest of their product",
                count_label(1, "crash dump")
            ));
            return;
        }

        let score = scorer.evaluate_file(definition, &context, now);
        if score.should_include && options.preview_kind.includes_files() && options.preview_count > 0 {
            report.preview.push(PreviewItem::from_file(&context, score));
        }
    }
}

/// State of one directory target while its file stream passes through.
struct TargetWalk<'s, 'a> {
    scorer: &'s Scorer<'a>,
    definition: &'s TargetDefinition,
    root: &'s Path,
    options: &'s ScanOptions,
    now: DateTime<Utc>,

    files: TopN<PreviewItem>,
    directories: BTreeMap<OsString, DirectoryAccumulator>,
    deferred_crash_files: Vec<(FileContext, Option<OsString>)>,
    locked: usize,
    retained: usize,
    unreadable: usize,
}

impl<'s, 'a> TargetWalk<'s, 'a> {
    fn new(
        scorer: &'s Scorer<'a>,
        definition: &'s TargetDefinition,
        root: &'s Path,
        options: &'s ScanOptions,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            scorer,
            definition,
            root,
            options,
            now,

            files: TopN::new(options.preview_count),
            directories: BTreeMap::new(),
            deferred_crash_files: Vec::new(),
            locked: 0,
            retained: 0,
            unreadable: 0,
        }
    }

    fn run(&mut self, report: &mut TargetReport) -> Result<(), ScanError> {
        let retention = self.definition.classification.applies_crash_retention();
        let walker = WalkDir::new(self.root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            if self.options.cancellation.is_cancelled() {
                return Err(ScanError::Cancelled);
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    log::debug!("Skipping unreadable entry below {}: {:#}", self.root.display(), error);
                    self.unreadable += 1;
                    continue;
                }
            };

            let file_type = entry.file_type();
            let bucket = self.bucket_of(entry.path());
            if file_type.is_dir() {
                if entry.depth() == 1 {
                    if let Some(bucket) = bucket {
                        let metadata = entry.metadata().ok();
                        self.directories.insert(
                            bucket,
                            DirectoryAccumulator::new(entry.path().to_path_buf(), metadata.as_ref()),
                        );
                    }
                }
                continue;
            }

            if !file_type.is_file() {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(error) => {
                    log::debug!("Failed to stat {}: {:#}", entry.path().display(), error);
                    self.unreadable += 1;
                    continue;
                }
            };

            let context = FileContext::from_metadata(entry.path(), &metadata, self.now);
            report.item_count += 1;
            report.total_size += context.size;

            /* only files below a subdirectory feed its accumulator */
            let bucket = if entry.depth() >= 2 { bucket } else { None };

            if self.scorer.should_check_active_lock(self.definition, &context)
                && is_locked(&context.path)
            {
                self.locked += 1;
                self.exclude(bucket.as_ref(), context.size);
                continue;
            }

            if retention && is_crash_artifact(self.scorer.signatures(), &context) {
                self.deferred_crash_files.push((context, bucket));
                continue;
            }

            self.consume_file(context, bucket.as_ref());
        }

        if retention {
            self.apply_retention();
        }
        Ok(())
    }

    fn apply_retention(&mut self) {
        let deferred = std::mem::take(&mut self.deferred_crash_files);
        let protected = CrashRetentionPolicy::new(self.scorer.signatures())
            .paths_to_protect(deferred.iter().map(|(context, _)| context));

        for (context, bucket) in deferred {
            if protected.contains(&context.path) {
                log::trace!("Retaining crash dump {}", context.path.display());
                self.retained += 1;
                self.exclude(bucket.as_ref(), context.size);
            } else {
                self.consume_file(context, bucket.as_ref());
            }
        }
    }

    fn consume_file(&mut self, context: FileContext, bucket: Option<&OsString>) {
        if let Some(bucket) = bucket {
            let is_temporary = self.scorer.is_temporary_file(&context);
            self.accumulator(bucket).add_file(&context, is_temporary);
        }

        if !self.options.preview_kind.includes_files() {
            return;
        }

        let score = self.scorer.evaluate_file(self.definition, &context, self.now);
        if score.should_include {
            let weight = score.weight;
            self.files.push(
                weight,
                context.path.clone(),
                PreviewItem::from_file(&context, score),
            );
        }
    }

    fn exclude(&mut self, bucket: Option<&OsString>, size: u64) {
        if let Some(bucket) = bucket {
            self.accumulator(bucket).add_excluded(size);
        }
    }

    fn accumulator(&mut self, bucket: &OsString) -> &mut DirectoryAccumulator {
        let root = self.root;
        self.directories
            .entry(bucket.clone())
            .or_insert_with(|| DirectoryAccumulator::new(root.join(bucket), None))
    }

    /// First component of `path` below the target root.
    fn bucket_of(&self, path: &Path) -> Option<OsString> {
        path.strip_prefix(self.root)
            .ok()?
            .components()
            .next()
            .map(|component| component.as_os_str().to_os_string())
    }

    fn finish(self, report: &mut TargetReport) {
        let mut directories = TopN::new(self.options.preview_count);
        if self.options.preview_kind.includes_directories() {
            for accumulator in self.directories.into_values() {
                let snapshot = accumulator.finish();
                let score = self
                    .scorer
                    .evaluate_directory(self.definition, &snapshot, self.now);
                if score.should_include {
                    directories.push(
                        score.weight,
                        snapshot.path.clone(),
                        PreviewItem::from_directory(&snapshot, score),
                    );
                }
            }
        }

        let mut preview = self.files.into_sorted_vec();
        preview.extend(directories.into_sorted_vec());
        preview.sort_by(PreviewItem::preview_order);
        preview.truncate(self.options.preview_count);
        report.preview = preview;

        if self.locked > 0 {
            report.warnings.push(format!(
                "{} skipped because locked",
                count_label(self.locked, "file")
            ));
        }
        if self.retained > 0 {
            report.warnings.push(format!(
                "{} retained as the newest of their product",
                count_label(self.retained, "crash dump")
            ));
        }
        if self.unreadable > 0 {
            report.warnings.push(format!(
                "{} could not be read",
                count_label(self.unreadable, "entry")
            ));
        }

        log::debug!(
            "Target {}: {} in {} bytes, {} previewed",
            self.definition.category,
            count_label(report.item_count as usize, "file"),
            report.total_size,
            report.preview.len()
        );
    }
}
