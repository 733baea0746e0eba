use std::{
    io,
    path::Path,
};

/// Move `path` into the recycle bin without any confirmation UI.
#[cfg(windows)]
pub fn move_to_recycle_bin(path: &Path) -> io::Result<()> {
    use windows_sys::Win32::UI::Shell::{
        SHFileOperationW,
        FOF_ALLOWUNDO,
        FOF_NOCONFIRMATION,
        FOF_NOERRORUI,
        FOF_SILENT,
        FO_DELETE,
        SHFILEOPSTRUCTW,
    };

    /* pFrom is a list terminated by an empty string */
    let mut from = crate::fs::to_wide(path);
    from.push(0);

    let mut operation: SHFILEOPSTRUCTW = unsafe { std::mem::zeroed() };
    operation.wFunc = FO_DELETE as _;
    operation.pFrom = from.as_ptr();
    operation.fFlags = (FOF_ALLOWUNDO | FOF_NOCONFIRMATION | FOF_NOERRORUI | FOF_SILENT) as _;

    let status = unsafe { SHFileOperationW(&mut operation) };
    if status != 0 {
        return Err(io::Error::from_raw_os_error(status));
    }
    if operation.fAnyOperationsAborted != 0 {
        return Err(io::Error::new(
            io::ErrorKind::Interrupted,
            "recycle bin operation was aborted",
        ));
    }
    Ok(())
}

#[cfg(not(windows))]
pub fn move_to_recycle_bin(_path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "no recycle bin on this platform",
    ))
}
