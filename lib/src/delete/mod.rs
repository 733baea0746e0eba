//! Deletion engine: removes selected preview items one by one, escalating
//! through repairs and the force-delete chain as the options allow.

use std::{
    collections::HashSet,
    fs,
    io,
    path::{
        Path,
        PathBuf,
    },
    thread,
};

use chrono::{
    DateTime,
    Utc,
};

use crate::{
    cancel::CancellationToken,
    force::{
        attributes,
        ownership,
        schedule_delete_on_reboot,
        ForceDeleteChain,
        ForceOutcome,
    },
    fs::{
        entry_exists,
        remove_entry,
        EntryAttributes,
        Timestamps,
    },
    safety::{
        normalize,
        NormalizedPath,
        PathSafetyGate,
    },
    scan::PreviewItem,
};

mod error;
pub use error::*;

mod options;
pub use options::*;

mod recycle;
pub use recycle::move_to_recycle_bin;

mod result;
pub use result::*;

#[derive(Debug, Clone)]
pub struct DeletionProgress {
    pub completed: usize,
    pub total: usize,
    pub current_path: PathBuf,
}

pub trait DeletionProgressConsumer {
    fn consume_progress(&self, progress: DeletionProgress);
}

pub struct VoidDeletionProgressConsumer;
impl DeletionProgressConsumer for VoidDeletionProgressConsumer {
    fn consume_progress(&self, _progress: DeletionProgress) {}
}

enum Removal {
    Removed,
    Recycled,
}

/// Outcome of one item before it is turned into a [`DeletionEntry`].
struct Verdict {
    disposition: Disposition,
    reason: Option<String>,
    error: Option<String>,
}

impl Verdict {
    fn deleted(reason: Option<&str>) -> Self {
        Self {
            disposition: Disposition::Deleted,
            reason: reason.map(str::to_string),
            error: None,
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            disposition: Disposition::Skipped,
            reason: Some(reason.into()),
            error: None,
        }
    }

    fn failed(reason: &str, error: impl ToString) -> Self {
        Self {
            disposition: Disposition::Failed,
            reason: Some(reason.to_string()),
            error: Some(error.to_string()),
        }
    }

    fn pending_reboot() -> Self {
        Self {
            disposition: Disposition::PendingReboot,
            reason: Some("scheduled for removal on reboot".to_string()),
            error: None,
        }
    }

    fn from_force(outcome: ForceOutcome) -> Self {
        match outcome {
            ForceOutcome::Deleted => Self::deleted(Some("force deleted")),
            ForceOutcome::ScheduledForReboot => Self::pending_reboot(),
        }
    }
}

/// Bytes already counted by earlier Deleted or PendingReboot entries.
#[derive(Default)]
struct CountedBytes {
    entries: Vec<(NormalizedPath, u64)>,
}

impl CountedBytes {
    /// Bytes of `path` not yet counted by an earlier entry beneath or above
    /// it. The returned amount is counted from now on.
    fn claim(&mut self, path: &Path, size: u64) -> u64 {
        let Ok(Some(normalized)) = normalize(&path.to_string_lossy()) else {
            return size;
        };

        if self
            .entries
            .iter()
            .any(|(counted, _)| normalized.is_at_or_under(counted))
        {
            return 0;
        }

        /* earlier claims are disjoint, so their sum never exceeds the disk usage beneath */
        let beneath: u64 = self
            .entries
            .iter()
            .filter(|(counted, _)| counted.is_at_or_under(&normalized))
            .map(|(_, bytes)| bytes)
            .sum();
        let size = size.saturating_sub(beneath);
        self.entries.push((normalized, size));
        size
    }
}

pub struct DeletionEngine<'g> {
    gate: &'g PathSafetyGate,
    remove: fn(&Path) -> io::Result<()>,
    schedule_reboot: fn(&Path) -> io::Result<()>,
}

impl DeletionEngine<'static> {
    pub fn from_global() -> Self {
        Self::new(PathSafetyGate::global())
    }
}

impl<'g> DeletionEngine<'g> {
    pub fn new(gate: &'g PathSafetyGate) -> Self {
        Self {
            gate,
            remove: remove_entry,
            schedule_reboot: schedule_delete_on_reboot,
        }
    }

    #[cfg(test)]
    fn with_file_system(
        mut self,
        remove: fn(&Path) -> io::Result<()>,
        schedule_reboot: fn(&Path) -> io::Result<()>,
    ) -> Self {
        self.remove = remove;
        self.schedule_reboot = schedule_reboot;
        self
    }

    /// Delete `items` in order. Every distinct input path yields exactly one
    /// entry in the result; cancellation stops before the next item. Bytes
    /// beneath a directory that an earlier entry already accounted for are
    /// not counted again for the directory.
    pub fn delete(
        &self,
        items: &[PreviewItem],
        options: &DeletionOptions,
        cancellation: &CancellationToken,
        progress: &dyn DeletionProgressConsumer,
    ) -> DeletionResult {
        self.delete_at(items, options, cancellation, progress, Utc::now())
    }

    pub fn delete_at(
        &self,
        items: &[PreviewItem],
        options: &DeletionOptions,
        cancellation: &CancellationToken,
        progress: &dyn DeletionProgressConsumer,
        now: DateTime<Utc>,
    ) -> DeletionResult {
        let items = Self::deduplicate(items);
        let mut result = DeletionResult::default();
        let mut counted = CountedBytes::default();

        for (index, item) in items.iter().enumerate() {
            if cancellation.is_cancelled() {
                log::info!("Deletion cancelled after {} of {} items", index, items.len());
                result.cancelled = true;
                break;
            }

            progress.consume_progress(DeletionProgress {
                completed: index,
                total: items.len(),
                current_path: item.path.clone(),
            });

            let verdict = self.process(item, options, now);
            match verdict.disposition {
                Disposition::Failed => log::warn!(
                    "Failed to delete {}: {}",
                    item.path.display(),
                    verdict.error.as_deref().unwrap_or_default()
                ),
                disposition => log::info!(
                    "{:?} {} ({})",
                    disposition,
                    item.path.display(),
                    verdict.reason.as_deref().unwrap_or("removed")
                ),
            }

            let size = match verdict.disposition {
                Disposition::Deleted | Disposition::PendingReboot => {
                    counted.claim(&item.path, item.size)
                }
                Disposition::Skipped | Disposition::Failed => item.size,
            };

            result.entries.push(DeletionEntry {
                path: item.path.clone(),
                size,
                is_directory: item.is_directory(),
                disposition: verdict.disposition,
                reason: verdict.reason,
                error: verdict.error,
            });
        }

        if !result.cancelled {
            progress.consume_progress(DeletionProgress {
                completed: items.len(),
                total: items.len(),
                current_path: PathBuf::new(),
            });
        }
        result
    }

    fn deduplicate(items: &[PreviewItem]) -> Vec<&PreviewItem> {
        let mut seen_normalized = HashSet::<NormalizedPath>::new();
        let mut seen_raw = HashSet::<&Path>::new();
        items
            .iter()
            .filter(|item| match normalize(&item.path.to_string_lossy()) {
                Ok(Some(normalized)) => seen_normalized.insert(normalized),
                Ok(None) | Err(_) => seen_raw.insert(item.path.as_path()),
            })
            .collect()
    }

    fn process(&self, item: &PreviewItem, options: &DeletionOptions, now: DateTime<Utc>) -> Verdict {
        let path = item.path.as_path();
        let raw = path.to_string_lossy();

        match normalize(&raw) {
            Ok(Some(_)) => {}
            Ok(None) => return Verdict::skipped("invalid path: not a rooted path"),
            Err(error) => return Verdict::skipped(format!("invalid path: {}", error)),
        }

        if !options.allow_protected_system_paths {
            match self.gate.assess_entry(&raw, item.is_directory()) {
                Ok(verdict) if verdict.is_critical() => return Verdict::skipped(verdict.to_string()),
                Ok(_) => {}
                Err(error) => return Verdict::skipped(format!("invalid path: {}", error)),
            }
        }

        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Verdict::skipped("already removed")
            }
            Err(error) => return Verdict::failed("could not inspect item", error),
        };

        let attributes = EntryAttributes::read(path, &metadata);
        if options.skip_hidden && (attributes.hidden || item.hidden) {
            return Verdict::skipped("hidden item");
        }
        if options.skip_system && (attributes.system || item.system) {
            return Verdict::skipped("system item");
        }
        if options.skip_recent {
            /* for directories the preview carries the newest write beneath */
            let modified = Timestamps::from_metadata(&metadata).modified.max(item.modified);
            if modified.map_or(false, |modified| now - modified < options.recent_threshold) {
                return Verdict::skipped("recently modified");
            }
        }

        let error = match self.remove_with_retries(path, options) {
            Ok(Removal::Recycled) => return Verdict::deleted(Some("moved to recycle bin")),
            Ok(Removal::Removed) => return Verdict::deleted(None),
            Err(error) => error,
        };

        /* the escalations below delete permanently */
        if options.prefer_recycle_bin && !options.allow_permanent_fallback {
            return Verdict::failed("recycle bin unavailable", error);
        }

        match FailureKind::of(&error) {
            FailureKind::AccessDenied if options.take_ownership_on_access_denied => {
                self.repair_and_retry(path, options, error)
            }
            FailureKind::InUse if options.skip_locked_items => {
                Verdict::failed("in use by another process", error)
            }
            FailureKind::InUse => self.release_locked(path, options, error),
            FailureKind::AccessDenied => Verdict::failed("access denied", error),
            FailureKind::Other => Verdict::failed("delete failed", error),
        }
    }

    fn remove_once(&self, path: &Path, options: &DeletionOptions) -> io::Result<Removal> {
        if options.prefer_recycle_bin {
            match move_to_recycle_bin(path) {
                Ok(()) => return Ok(Removal::Recycled),
                Err(error) if !options.allow_permanent_fallback => return Err(error),
                Err(error) => {
                    log::debug!("Recycle bin refused {}: {:#}", path.display(), error);
                }
            }
        }
        (self.remove)(path).map(|_| Removal::Removed)
    }

    fn remove_with_retries(&self, path: &Path, options: &DeletionOptions) -> io::Result<Removal> {
        let mut attempt = 0;
        loop {
            match self.remove_once(path, options) {
                Ok(removal) => return Ok(removal),
                /* vanished while we were at it */
                Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Removal::Removed),
                Err(error)
                    if attempt >= options.max_retry_count
                        || error.kind() == io::ErrorKind::Unsupported =>
                {
                    return Err(error)
                }
                Err(error) => {
                    attempt += 1;
                    log::debug!(
                        "Delete attempt {} of {} failed: {:#}",
                        attempt,
                        path.display(),
                        error
                    );
                    thread::sleep(options.retry_delay);
                }
            }
        }
    }

    fn force_chain(options: &DeletionOptions) -> ForceDeleteChain {
        ForceDeleteChain {
            take_ownership: options.take_ownership_on_access_denied,
            close_handles: !options.skip_locked_items,
            allow_reboot: options.allow_delete_on_reboot && !options.skip_locked_items,
        }
    }

    fn repair_and_retry(&self, path: &Path, options: &DeletionOptions, error: io::Error) -> Verdict {
        log::debug!("Access denied on {}, repairing permissions: {:#}", path.display(), error);
        if let Err(error) = ownership::take_ownership(path) {
            log::debug!("Permission repair of {} failed: {:#}", path.display(), error);
        }
        attributes::relax_parent(path);

        match self.remove_with_retries(path, options) {
            Ok(Removal::Recycled) => return Verdict::deleted(Some("moved to recycle bin")),
            Ok(Removal::Removed) => return Verdict::deleted(Some("permissions repaired")),
            Err(error) => log::debug!("Still blocked after repair on {}: {:#}", path.display(), error),
        }

        match Self::force_chain(options).run(path) {
            Ok(outcome) => Verdict::from_force(outcome),
            Err(error) => Verdict::failed("access denied", error),
        }
    }

    fn release_locked(&self, path: &Path, options: &DeletionOptions, error: io::Error) -> Verdict {
        log::debug!("{} is in use: {:#}", path.display(), error);

        let mut last_error = error.to_string();
        if options.take_ownership_on_access_denied {
            match Self::force_chain(options).run(path) {
                Ok(outcome) => return Verdict::from_force(outcome),
                Err(error) => last_error = error.to_string(),
            }
        }

        if !entry_exists(path) {
            return Verdict::deleted(Some("force deleted"));
        }

        if options.allow_delete_on_reboot {
            match (self.schedule_reboot)(path) {
                Ok(()) => return Verdict::pending_reboot(),
                Err(error) => {
                    log::debug!("Could not schedule {} for reboot: {:#}", path.display(), error);
                }
            }
        }

        Verdict::failed("in use by another process", last_error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::TimeDelta;

    use super::*;
    use crate::scan::PreviewEntryKind;

    fn item(path: &Path) -> PreviewItem {
        let metadata = fs::symlink_metadata(path).ok();
        let size = metadata.as_ref().map_or(0, |metadata| metadata.len());
        PreviewItem {
            name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.to_path_buf(),
            size,
            modified: None,
            accessed: None,
            created: None,
            kind: if metadata.map_or(false, |metadata| metadata.is_dir()) {
                PreviewEntryKind::Directory { file_count: 0 }
            } else {
                PreviewEntryKind::File {
                    extension: String::new(),
                }
            },
            hidden: false,
            system: false,
            confidence: 0.5,
            signals: Vec::new(),
        }
    }

    fn run(items: &[PreviewItem], options: &DeletionOptions) -> DeletionResult {
        DeletionEngine::from_global().delete(
            items,
            options,
            &CancellationToken::new(),
            &VoidDeletionProgressConsumer,
        )
    }

    #[test]
    fn deletes_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("old.tmp");
        fs::write(&file, vec![0u8; 4096]).unwrap();
        let folder = dir.path().join("cache");
        fs::create_dir_all(folder.join("nested")).unwrap();
        fs::write(folder.join("nested/blob.bin"), b"blob").unwrap();

        let result = run(&[item(&file), item(&folder)], &DeletionOptions::default());
        assert_eq!(result.deleted_count(), 2);
        assert_eq!(result.entries[0].actual_bytes_freed(), 4096);
        assert!(result.entries[1].is_directory);
        assert!(!file.exists());
        assert!(!folder.exists());
    }

    #[test]
    fn files_ahead_of_their_directory_are_counted_once() {
        let dir = tempfile::tempdir().unwrap();
        let mix = dir.path().join("mix");
        fs::create_dir(&mix).unwrap();
        let stale = mix.join("a.tmp");
        fs::write(&stale, vec![0u8; 64 * 1024]).unwrap();
        let fresh = mix.join("b.dat");
        fs::write(&fresh, vec![0u8; 10]).unwrap();
        let on_disk = 64 * 1024 + 10;

        let folder = PreviewItem {
            size: on_disk,
            ..item(&mix)
        };
        let result = run(&[item(&stale), folder, item(&fresh)], &DeletionOptions::default());

        assert_eq!(result.entries[0].actual_bytes_freed(), 64 * 1024);
        assert_eq!(result.entries[1].disposition, Disposition::Deleted);
        assert_eq!(result.entries[1].actual_bytes_freed(), 10);
        assert_eq!(result.entries[2].reason.as_deref(), Some("already removed"));
        assert_eq!(result.total_bytes_deleted(), on_disk);
        assert!(!mix.exists());
    }

    #[test]
    fn nested_entries_are_subtracted_from_their_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        let mix = dir.path().join("mix");
        fs::create_dir_all(mix.join("sub")).unwrap();
        let nested = mix.join("sub/c.tmp");
        fs::write(&nested, vec![0u8; 300]).unwrap();
        let file = mix.join("a.tmp");
        fs::write(&file, vec![0u8; 700]).unwrap();

        let nested_item = item(&nested);
        let sub = PreviewItem {
            size: 300,
            ..item(&mix.join("sub"))
        };
        let folder = PreviewItem {
            size: 1000,
            ..item(&mix)
        };
        let result = run(
            &[nested_item, sub, folder, item(&file)],
            &DeletionOptions::default(),
        );

        let freed = result
            .entries
            .iter()
            .map(DeletionEntry::actual_bytes_freed)
            .collect::<Vec<_>>();
        assert_eq!(freed, vec![300, 0, 700, 0]);
        assert_eq!(result.entries[3].reason.as_deref(), Some("already removed"));
        assert_eq!(result.total_bytes_deleted(), 1000);
    }

    #[test]
    fn hive_named_directories_are_not_critical_files() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("User Data").join("Default");
        fs::create_dir_all(&profile).unwrap();
        fs::write(profile.join("Cookies-journal"), b"j").unwrap();

        let result = run(&[item(&profile)], &DeletionOptions::default());
        assert_eq!(result.entries[0].disposition, Disposition::Deleted);
        assert!(!profile.exists());

        let hive = dir.path().join("SOFTWARE");
        fs::write(&hive, b"regf").unwrap();
        let result = run(&[item(&hive)], &DeletionOptions::default());
        assert_eq!(result.entries[0].disposition, Disposition::Skipped);
        assert!(hive.exists());
    }

    #[test]
    fn protected_paths_are_skipped() {
        let target = PreviewItem {
            path: PathBuf::from("C:\\Windows\\System32\\drivers\\foo.sys"),
            ..item(Path::new("/nonexistent"))
        };
        let result = run(&[target], &DeletionOptions::default());

        let entry = &result.entries[0];
        assert_eq!(entry.disposition, Disposition::Skipped);
        assert!(entry
            .reason
            .as_deref()
            .unwrap()
            .contains("protected system location"));
    }

    #[test]
    fn relative_paths_are_never_attempted() {
        let target = PreviewItem {
            path: PathBuf::from("relative/file.tmp"),
            ..item(Path::new("/nonexistent"))
        };
        let result = run(&[target], &DeletionOptions::default());
        assert_eq!(result.entries[0].disposition, Disposition::Skipped);
        assert!(result.entries[0].reason.as_deref().unwrap().starts_with("invalid path"));
    }

    #[test]
    fn duplicates_produce_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("dup.log");
        fs::write(&file, b"log").unwrap();

        let mut dotted = dir.path().join(".");
        dotted.push("dup.log");
        let result = run(&[item(&file), item(&file), PreviewItem { path: dotted, ..item(&file) }], &DeletionOptions::default());
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.deleted_count(), 1);
    }

    #[test]
    fn missing_items_are_already_removed() {
        let dir = tempfile::tempdir().unwrap();
        let target = PreviewItem {
            path: dir.path().join("gone.tmp"),
            ..item(dir.path())
        };
        let result = run(&[target], &DeletionOptions::default());
        assert_eq!(result.entries[0].disposition, Disposition::Skipped);
        assert_eq!(result.entries[0].reason.as_deref(), Some("already removed"));
        assert_eq!(result.total_bytes_deleted(), 0);
    }

    #[test]
    fn filters_skip_hidden_and_recent_items() {
        let dir = tempfile::tempdir().unwrap();
        let hidden = dir.path().join("visible.tmp");
        fs::write(&hidden, b"h").unwrap();
        let recent = dir.path().join("fresh.tmp");
        fs::write(&recent, b"r").unwrap();

        let options = DeletionOptions {
            skip_hidden: true,
            skip_recent: true,
            recent_threshold: TimeDelta::hours(1),
            ..DeletionOptions::default()
        };
        let marked_hidden = PreviewItem {
            hidden: true,
            ..item(&hidden)
        };
        let result = run(&[marked_hidden, item(&recent)], &options);

        assert_eq!(result.entries[0].reason.as_deref(), Some("hidden item"));
        assert_eq!(result.entries[1].reason.as_deref(), Some("recently modified"));
        assert!(hidden.exists());
        assert!(recent.exists());
    }

    #[test]
    fn directories_with_recent_contents_count_as_recent() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("cache");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("entry.bin"), b"e").unwrap();

        /* the directory's own write is ten days old at this clock */
        let now = Utc::now() + TimeDelta::days(10);
        let options = DeletionOptions {
            skip_recent: true,
            recent_threshold: TimeDelta::hours(1),
            ..DeletionOptions::default()
        };
        let rewritten = PreviewItem {
            modified: Some(now - TimeDelta::minutes(5)),
            ..item(&folder)
        };
        let result = DeletionEngine::from_global().delete_at(
            &[rewritten],
            &options,
            &CancellationToken::new(),
            &VoidDeletionProgressConsumer,
            now,
        );
        assert_eq!(result.entries[0].reason.as_deref(), Some("recently modified"));
        assert!(folder.exists());

        let result = DeletionEngine::from_global().delete_at(
            &[item(&folder)],
            &options,
            &CancellationToken::new(),
            &VoidDeletionProgressConsumer,
            now,
        );
        assert_eq!(result.entries[0].disposition, Disposition::Deleted);
    }

    fn busy(_path: &Path) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Other,
            "The process cannot access the file because it is being used by another process",
        ))
    }

    /// Removes the entry but still reports the sharing violation, the way a
    /// holder that lets go mid-attempt looks from here.
    fn busy_then_released(path: &Path) -> io::Result<()> {
        let _ = remove_entry(path);
        busy(path)
    }

    fn scheduled(_path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn locked_options() -> DeletionOptions {
        DeletionOptions {
            retry_delay: std::time::Duration::from_millis(1),
            take_ownership_on_access_denied: false,
            ..DeletionOptions::default()
        }
    }

    fn run_locked(
        items: &[PreviewItem],
        options: &DeletionOptions,
        remove: fn(&Path) -> io::Result<()>,
    ) -> DeletionResult {
        DeletionEngine::from_global()
            .with_file_system(remove, scheduled)
            .delete(
                items,
                options,
                &CancellationToken::new(),
                &VoidDeletionProgressConsumer,
            )
    }

    #[test]
    fn locked_items_fail_when_skipping_locked() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("held.log");
        fs::write(&file, b"held").unwrap();

        let options = DeletionOptions {
            skip_locked_items: true,
            ..locked_options()
        };
        let result = run_locked(&[item(&file)], &options, busy);

        let entry = &result.entries[0];
        assert_eq!(entry.disposition, Disposition::Failed);
        assert_eq!(entry.reason.as_deref(), Some("in use by another process"));
        assert!(entry.error.as_deref().unwrap().contains("being used by another process"));
        assert!(file.exists());
    }

    #[test]
    fn locked_items_are_scheduled_for_reboot() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("held.log");
        fs::write(&file, vec![0u8; 2048]).unwrap();

        let result = run_locked(&[item(&file)], &locked_options(), busy);
        assert_eq!(result.entries[0].disposition, Disposition::PendingReboot);
        assert_eq!(result.total_bytes_deleted(), 0);
        assert_eq!(result.pending_reboot_bytes(), 2048);
        assert!(file.exists());
    }

    #[test]
    fn locked_items_fail_without_reboot_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("held.log");
        fs::write(&file, b"held").unwrap();

        let options = DeletionOptions {
            allow_delete_on_reboot: false,
            ..locked_options()
        };
        let result = run_locked(&[item(&file)], &options, busy);
        assert_eq!(result.entries[0].disposition, Disposition::Failed);
        assert_eq!(result.pending_reboot_count(), 0);
    }

    #[test]
    fn released_locks_count_as_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("held.log");
        fs::write(&file, vec![0u8; 512]).unwrap();

        let result = run_locked(&[item(&file)], &locked_options(), busy_then_released);
        let entry = &result.entries[0];
        assert_eq!(entry.disposition, Disposition::Deleted);
        assert_eq!(entry.reason.as_deref(), Some("force deleted"));
        assert_eq!(entry.actual_bytes_freed(), 512);
    }

    #[test]
    fn force_chain_removes_locked_items() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("held.log");
        fs::write(&file, vec![0u8; 256]).unwrap();

        let options = DeletionOptions {
            take_ownership_on_access_denied: true,
            ..locked_options()
        };
        let result = run_locked(&[item(&file)], &options, busy);
        let entry = &result.entries[0];
        assert_eq!(entry.disposition, Disposition::Deleted);
        assert_eq!(entry.reason.as_deref(), Some("force deleted"));
        assert!(!file.exists());
    }

    #[test]
    #[cfg(unix)]
    fn recycle_only_without_fallback_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("keep.tmp");
        fs::write(&file, b"k").unwrap();

        let options = DeletionOptions {
            prefer_recycle_bin: true,
            allow_permanent_fallback: false,
            ..DeletionOptions::default()
        };
        let result = run(&[item(&file)], &options);
        assert_eq!(result.entries[0].disposition, Disposition::Failed);
        assert!(file.exists());

        let fallback = DeletionOptions {
            prefer_recycle_bin: true,
            ..DeletionOptions::default()
        };
        assert_eq!(run(&[item(&file)], &fallback).deleted_count(), 1);
    }

    #[test]
    #[cfg(unix)]
    fn repairs_sealed_parent_directories() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let sealed = dir.path().join("sealed");
        fs::create_dir(&sealed).unwrap();
        let file = sealed.join("stuck.tmp");
        fs::write(&file, b"stuck").unwrap();
        fs::set_permissions(&sealed, fs::Permissions::from_mode(0o500)).unwrap();

        let options = DeletionOptions {
            retry_delay: std::time::Duration::from_millis(1),
            ..DeletionOptions::default()
        };
        let result = run(&[item(&file)], &options);
        assert_eq!(result.entries[0].disposition, Disposition::Deleted);
        assert!(!file.exists());
    }

    #[test]
    fn cancellation_returns_partial_result() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.tmp");
        let second = dir.path().join("b.tmp");
        fs::write(&first, b"a").unwrap();
        fs::write(&second, b"b").unwrap();

        struct CancelAfterFirst {
            token: CancellationToken,
            seen: Mutex<Vec<usize>>,
        }
        impl DeletionProgressConsumer for CancelAfterFirst {
            fn consume_progress(&self, progress: DeletionProgress) {
                self.seen.lock().unwrap().push(progress.completed);
                self.token.cancel();
            }
        }

        let consumer = CancelAfterFirst {
            token: CancellationToken::new(),
            seen: Mutex::new(Vec::new()),
        };
        let result = DeletionEngine::from_global().delete(
            &[item(&first), item(&second)],
            &DeletionOptions::default(),
            &consumer.token,
            &consumer,
        );

        assert!(result.cancelled);
        assert_eq!(result.entries.len(), 1);
        assert!(!first.exists());
        assert!(second.exists());
        assert_eq!(*consumer.seen.lock().unwrap(), vec![0]);
    }
}
