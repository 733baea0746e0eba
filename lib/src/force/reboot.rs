use std::{
    io,
    path::Path,
};

/// Register `path` for removal during the next boot. Directories have
/// their contents registered first, since the boot time pass removes
/// entries in registration order and only deletes empty directories.
#[cfg(windows)]
pub fn schedule_delete_on_reboot(path: &Path) -> io::Result<()> {
    use walkdir::WalkDir;

    if path.is_dir() {
        for entry in WalkDir::new(path).min_depth(1).contents_first(true) {
            match entry {
                Ok(entry) => schedule_entry(entry.path())?,
                Err(error) => log::debug!("Cannot schedule entry below {}: {:#}", path.display(), error),
            }
        }
    }
    schedule_entry(path)
}

#[cfg(windows)]
fn schedule_entry(path: &Path) -> io::Result<()> {
    use windows_sys::Win32::Storage::FileSystem::{
        MoveFileExW,
        MOVEFILE_DELAY_UNTIL_REBOOT,
    };

    let wide = crate::fs::to_wide(path);
    let ok = unsafe { MoveFileExW(wide.as_ptr(), std::ptr::null(), MOVEFILE_DELAY_UNTIL_REBOOT) };
    if ok == 0 {
        return Err(io::Error::last_os_error());
    }
    log::debug!("Scheduled {} for removal on reboot", path.display());
    Ok(())
}

#[cfg(not(windows))]
pub fn schedule_delete_on_reboot(_path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "delete on reboot is not supported on this platform",
    ))
}
