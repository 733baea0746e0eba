use std::{
    fs,
    io,
    path::{
        Path,
        PathBuf,
    },
};

use rand::Rng;

use super::{
    reboot::schedule_delete_on_reboot,
    ForceOutcome,
};
use crate::fs::remove_entry;

const TOMBSTONE_PREFIX: &str = ".reclaim-";
const TOMBSTONE_SUFFIX: &str = ".deleted";

/// Random sibling name for `path`, in the same parent directory.
pub fn tombstone_path(path: &Path) -> PathBuf {
    let token: u32 = rand::thread_rng().gen();
    let name = format!("{}{:08x}{}", TOMBSTONE_PREFIX, token, TOMBSTONE_SUFFIX);
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Move `path` out of the way and delete it under its new name. When the
/// tombstone survives it is scheduled for removal on reboot; without that
/// option the rename is undone so nothing is left half done.
pub fn bury(path: &Path, allow_reboot: bool) -> io::Result<ForceOutcome> {
    let tombstone = tombstone_path(path);
    fs::rename(path, &tombstone)?;
    log::debug!("Renamed {} to {}", path.display(), tombstone.display());

    let error = match remove_entry(&tombstone) {
        Ok(()) => return Ok(ForceOutcome::Deleted),
        Err(error) => error,
    };

    if allow_reboot {
        match schedule_delete_on_reboot(&tombstone) {
            Ok(()) => return Ok(ForceOutcome::ScheduledForReboot),
            Err(schedule_error) => {
                log::debug!("Cannot schedule tombstone {}: {:#}", tombstone.display(), schedule_error)
            }
        }
    }

    if let Err(restore_error) = fs::rename(&tombstone, path) {
        log::warn!(
            "Failed to restore {} from {}: {:#}",
            path.display(),
            tombstone.display(),
            restore_error
        );
    }
    Err(error)
}
