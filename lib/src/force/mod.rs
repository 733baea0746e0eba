//! Force-delete chain: escalating removal strategies for entries that a
//! plain delete could not remove.

use std::{
    fs,
    io,
    path::Path,
};

use thiserror::Error;

use crate::fs::{
    entry_exists,
    remove_entry,
};

pub mod attributes;
pub mod handles;
pub mod ownership;
pub mod purge;
pub mod reboot;
pub mod tombstone;

pub use reboot::schedule_delete_on_reboot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceOutcome {
    /// The entry is gone.
    Deleted,
    /// The entry (or what is left of it) goes away on the next boot.
    ScheduledForReboot,
}

#[derive(Error, Debug)]
#[error("{tier}: {source}")]
pub struct ForceDeleteError {
    pub tier: &'static str,
    #[source]
    pub source: io::Error,
}

type Strategy = fn(&ForceDeleteChain, &Path) -> io::Result<ForceOutcome>;

/// Which escalations the chain may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForceDeleteChain {
    pub take_ownership: bool,
    pub close_handles: bool,
    pub allow_reboot: bool,
}

impl Default for ForceDeleteChain {
    fn default() -> Self {
        Self {
            take_ownership: true,
            close_handles: true,
            allow_reboot: true,
        }
    }
}

impl ForceDeleteChain {
    fn strategies(&self, is_directory: bool) -> Vec<(&'static str, Strategy)> {
        let mut strategies: Vec<(&'static str, Strategy)> = Vec::new();
        strategies.push(("attributes", Self::clear_and_remove));
        if self.take_ownership {
            strategies.push(("ownership", Self::own_and_remove));
        }
        if self.close_handles {
            strategies.push(("handles", Self::release_and_remove));
        }
        strategies.push(("tombstone", Self::bury));
        if is_directory {
            strategies.push(("purge", Self::purge));
        }
        strategies
    }

    /// Run the strategies in order until one succeeds. Failures of every
    /// tier but the last are logged and dropped.
    pub fn run(&self, path: &Path) -> Result<ForceOutcome, ForceDeleteError> {
        let is_directory = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata.is_dir(),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(ForceOutcome::Deleted)
            }
            Err(error) => {
                return Err(ForceDeleteError {
                    tier: "inspect",
                    source: error,
                })
            }
        };

        let mut last_error = None;
        for (tier, strategy) in self.strategies(is_directory) {
            /* a previous tier may have released the entry without removing it */
            if !entry_exists(path) {
                return Ok(ForceOutcome::Deleted);
            }

            match strategy(self, path) {
                Ok(outcome) => {
                    log::info!("Force deleted {} via {} ({:?})", path.display(), tier, outcome);
                    return Ok(outcome);
                }
                Err(error) => {
                    log::warn!("Force delete tier {} failed for {}: {:#}", tier, path.display(), error);
                    last_error = Some(ForceDeleteError { tier, source: error });
                }
            }
        }

        match last_error {
            Some(error) => Err(error),
            None => Ok(ForceOutcome::Deleted),
        }
    }

    fn clear_and_remove(&self, path: &Path) -> io::Result<ForceOutcome> {
        attributes::clear_restrictive_attributes(path);
        attributes::relax_parent(path);
        remove_entry(path).map(|_| ForceOutcome::Deleted)
    }

    fn own_and_remove(&self, path: &Path) -> io::Result<ForceOutcome> {
        if let Err(error) = ownership::take_ownership(path) {
            log::debug!("Ownership takeover of {} failed: {:#}", path.display(), error);
        }
        remove_entry(path).map(|_| ForceOutcome::Deleted)
    }

    fn release_and_remove(&self, path: &Path) -> io::Result<ForceOutcome> {
        let released = handles::release_handles(path)?;
        log::debug!("Released {} holders of {}", released, path.display());
        remove_entry(path).map(|_| ForceOutcome::Deleted)
    }

    fn bury(&self, path: &Path) -> io::Result<ForceOutcome> {
        tombstone::bury(path, self.allow_reboot)
    }

    fn purge(&self, path: &Path) -> io::Result<ForceOutcome> {
        purge::purge_tree(path, self.allow_reboot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entries_count_as_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = ForceDeleteChain::default().run(&dir.path().join("gone")).unwrap();
        assert_eq!(outcome, ForceOutcome::Deleted);
    }

    #[test]
    fn directories_get_the_purge_tier() {
        let chain = ForceDeleteChain {
            take_ownership: false,
            close_handles: false,
            allow_reboot: false,
        };

        let tiers = |is_directory| {
            chain
                .strategies(is_directory)
                .into_iter()
                .map(|(tier, _)| tier)
                .collect::<Vec<_>>()
        };
        assert_eq!(tiers(false), vec!["attributes", "tombstone"]);
        assert_eq!(tiers(true), vec!["attributes", "tombstone", "purge"]);
        assert_eq!(
            ForceDeleteChain::default()
                .strategies(true)
                .into_iter()
                .map(|(tier, _)| tier)
                .collect::<Vec<_>>(),
            vec!["attributes", "ownership", "handles", "tombstone", "purge"]
        );
    }

    #[test]
    #[cfg(unix)]
    fn removes_trees_with_sealed_directories() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(root.join("sealed/deeper")).unwrap();
        fs::write(root.join("sealed/deeper/a.tmp"), b"a").unwrap();
        fs::set_permissions(root.join("sealed/deeper"), fs::Permissions::from_mode(0o500)).unwrap();
        fs::set_permissions(root.join("sealed"), fs::Permissions::from_mode(0o500)).unwrap();

        let outcome = ForceDeleteChain::default().run(&root).unwrap();
        assert_eq!(outcome, ForceOutcome::Deleted);
        assert!(!root.exists());
    }
}
