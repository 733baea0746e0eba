use std::path::PathBuf;

use serde::Serialize;

use crate::utils::{
    count_label,
    format_file_size,
};

const DISPLAY_ERROR_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Disposition {
    Deleted,
    Skipped,
    Failed,
    /// Scheduled for removal on the next boot. The space is not free yet.
    PendingReboot,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionEntry {
    pub path: PathBuf,
    /// Bytes this entry accounts for. For removed directories this excludes
    /// bytes already counted by earlier entries beneath them.
    pub size: u64,
    pub is_directory: bool,
    pub disposition: Disposition,
    pub reason: Option<String>,
    pub error: Option<String>,
}

impl DeletionEntry {
    pub fn actual_bytes_freed(&self) -> u64 {
        if self.disposition == Disposition::Deleted {
            self.size
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionResult {
    pub entries: Vec<DeletionEntry>,
    /// The pass stopped before every item was processed.
    pub cancelled: bool,
}

impl DeletionResult {
    fn with(&self, disposition: Disposition) -> impl Iterator<Item = &DeletionEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.disposition == disposition)
    }

    pub fn count(&self, disposition: Disposition) -> usize {
        self.with(disposition).count()
    }

    pub fn bytes(&self, disposition: Disposition) -> u64 {
        self.with(disposition).map(|entry| entry.size).sum()
    }

    pub fn deleted_count(&self) -> usize {
        self.count(Disposition::Deleted)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(Disposition::Skipped)
    }

    pub fn failed_count(&self) -> usize {
        self.count(Disposition::Failed)
    }

    pub fn pending_reboot_count(&self) -> usize {
        self.count(Disposition::PendingReboot)
    }

    pub fn total_bytes_deleted(&self) -> u64 {
        self.entries.iter().map(DeletionEntry::actual_bytes_freed).sum()
    }

    pub fn pending_reboot_bytes(&self) -> u64 {
        self.bytes(Disposition::PendingReboot)
    }

    pub fn status_message(&self) -> String {
        let mut clauses = Vec::new();

        let deleted = self.deleted_count();
        if deleted > 0 {
            clauses.push(format!(
                "deleted {} ({})",
                count_label(deleted, "item"),
                format_file_size(self.total_bytes_deleted())
            ));
        }

        let pending = self.pending_reboot_count();
        if pending > 0 {
            clauses.push(format!(
                "{} ({}) pending reboot",
                count_label(pending, "item"),
                format_file_size(self.pending_reboot_bytes())
            ));
        }

        let skipped = self.skipped_count();
        if skipped > 0 {
            clauses.push(format!("skipped {}", skipped));
        }

        let failed = self.failed_count();
        if failed > 0 {
            clauses.push(format!("failed {}", failed));
        }

        let mut message = if clauses.is_empty() {
            "Nothing to delete".to_string()
        } else {
            let mut message = clauses.join(", ");
            message[..1].make_ascii_uppercase();
            message
        };

        if self.cancelled {
            message.push_str(" (cancelled)");
        }
        message
    }

    /// Failure lines for display, capped to keep the output readable.
    pub fn display_errors(&self) -> Vec<String> {
        let failures = self
            .with(Disposition::Failed)
            .map(|entry| {
                format!(
                    "{}: {}",
                    entry.path.display(),
                    entry
                        .error
                        .as_deref()
                        .or(entry.reason.as_deref())
                        .unwrap_or("unknown error")
                )
            })
            .collect::<Vec<_>>();

        if failures.len() <= DISPLAY_ERROR_LIMIT {
            return failures;
        }

        let remaining = failures.len() - DISPLAY_ERROR_LIMIT;
        let mut lines = failures
            .into_iter()
            .take(DISPLAY_ERROR_LIMIT)
            .collect::<Vec<_>>();
        lines.push(format!("... and {} more", remaining));
        lines
    }
}
