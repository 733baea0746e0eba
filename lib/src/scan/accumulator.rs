use std::{
    fs::Metadata,
    path::PathBuf,
};

use crate::{
    fs::{
        EntryAttributes,
        Timestamps,
    },
    score::{
        DirectorySnapshot,
        FileContext,
    },
    PathEx,
};

/// Collects the file stream beneath one immediate subdirectory of a target.
#[derive(Debug)]
pub(super) struct DirectoryAccumulator {
    snapshot: DirectorySnapshot,
}

impl DirectoryAccumulator {
    pub fn new(path: PathBuf, metadata: Option<&Metadata>) -> Self {
        let mut snapshot = DirectorySnapshot {
            name: path.file_name_truncate().to_string(),
            ..DirectorySnapshot::default()
        };
        if let Some(metadata) = metadata {
            snapshot.timestamps = Timestamps::from_metadata(metadata);
            snapshot.attributes = EntryAttributes::read(&path, metadata);
        }
        snapshot.path = path;

        Self { snapshot }
    }

    pub fn add_file(&mut self, context: &FileContext, is_temporary: bool) {
        let snapshot = &mut self.snapshot;
        snapshot.size += context.size;
        snapshot.total_files += 1;
        if context.attributes.hidden {
            snapshot.hidden_files += 1;
        }
        if context.attributes.system {
            snapshot.system_files += 1;
        }
        if context.recently_modified {
            snapshot.recent_files += 1;
        }
        if is_temporary {
            snapshot.temp_files += 1;
        }
        *snapshot
            .extensions
            .entry(context.extension.clone())
            .or_default() += 1;

        if let Some(modified) = context.timestamps.modified {
            snapshot.last_write = Some(match snapshot.last_write {
                Some(current) => current.max(modified),
                None => modified,
            });
        }
    }

    /// A file that must not be removed lives beneath this directory.
    pub fn add_excluded(&mut self, size: u64) {
        self.snapshot.excluded_files += 1;
        self.snapshot.size += size;
    }

    pub fn finish(mut self) -> DirectorySnapshot {
        if self.snapshot.last_write.is_none() {
            self.snapshot.last_write = self.snapshot.timestamps.modified;
        }
        self.snapshot
    }
}
