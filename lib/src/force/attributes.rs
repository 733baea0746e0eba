use std::{
    io,
    path::Path,
};

use walkdir::WalkDir;

/// Clear read-only, hidden and system flags on `path` and, for
/// directories, on everything beneath it. Entries that cannot be changed
/// are skipped.
pub fn clear_restrictive_attributes(path: &Path) -> usize {
    let mut cleared = 0;
    for entry in WalkDir::new(path).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                log::trace!("Skipping attribute repair below {}: {:#}", path.display(), error);
                continue;
            }
        };

        match clear_entry(entry.path()) {
            Ok(true) => cleared += 1,
            Ok(false) => {}
            Err(error) => {
                log::trace!("Failed to clear attributes of {}: {:#}", entry.path().display(), error)
            }
        }
    }
    cleared
}

/// On Unix removing an entry needs a writable parent directory.
pub fn relax_parent(path: &Path) {
    if cfg!(windows) {
        return;
    }
    if let Some(parent) = path.parent() {
        if let Err(error) = clear_entry(parent) {
            log::trace!("Failed to relax {}: {:#}", parent.display(), error);
        }
    }
}

#[cfg(windows)]
pub(crate) fn clear_entry(path: &Path) -> io::Result<bool> {
    use windows_sys::Win32::Storage::FileSystem::{
        GetFileAttributesW,
        SetFileAttributesW,
        FILE_ATTRIBUTE_HIDDEN,
        FILE_ATTRIBUTE_NORMAL,
        FILE_ATTRIBUTE_READONLY,
        FILE_ATTRIBUTE_SYSTEM,
        INVALID_FILE_ATTRIBUTES,
    };

    let wide = crate::fs::to_wide(path);
    let attributes = unsafe { GetFileAttributesW(wide.as_ptr()) };
    if attributes == INVALID_FILE_ATTRIBUTES {
        return Err(io::Error::last_os_error());
    }

    let restrictive = FILE_ATTRIBUTE_READONLY | FILE_ATTRIBUTE_HIDDEN | FILE_ATTRIBUTE_SYSTEM;
    if attributes & restrictive == 0 {
        return Ok(false);
    }

    let mut relaxed = attributes & !restrictive;
    if relaxed == 0 {
        relaxed = FILE_ATTRIBUTE_NORMAL;
    }
    if unsafe { SetFileAttributesW(wide.as_ptr(), relaxed) } == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(true)
}

/// Unix has no attribute flags; the closest thing is a missing owner write
/// bit, which blocks removing the children of a directory.
#[cfg(not(windows))]
pub(crate) fn clear_entry(path: &Path) -> io::Result<bool> {
    use std::{
        fs,
        os::unix::fs::PermissionsExt,
    };

    let metadata = fs::symlink_metadata(path)?;
    if metadata.file_type().is_symlink() {
        return Ok(false);
    }

    let mode = metadata.permissions().mode();
    let wanted = if metadata.is_dir() { mode | 0o700 } else { mode | 0o600 };
    if wanted == mode {
        return Ok(false);
    }

    fs::set_permissions(path, fs::Permissions::from_mode(wanted))?;
    Ok(true)
}
