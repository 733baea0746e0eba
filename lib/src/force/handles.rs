use std::{
    io,
    path::Path,
};

/// Processes whose termination takes the session or the machine down.
const CRITICAL_PROCESSES: &[&str] = &[
    "system",
    "registry",
    "memory compression",
    "smss.exe",
    "csrss.exe",
    "wininit.exe",
    "winlogon.exe",
    "services.exe",
    "lsass.exe",
    "lsaiso.exe",
    "svchost.exe",
    "dwm.exe",
    "fontdrvhost.exe",
];

#[cfg(windows)]
const GRACEFUL_WAIT_MS: u32 = 2_000;

pub fn is_critical_process(image_name: &str) -> bool {
    let name = image_name
        .rsplit(['\\', '/'])
        .next()
        .unwrap_or(image_name)
        .trim()
        .to_lowercase();
    CRITICAL_PROCESSES.contains(&name.as_str())
}

/// Ask every process holding `path` open to let go: close its windows
/// first, terminate it if it does not exit in time. Critical system
/// processes and this process are left alone. Returns how many holders
/// were released.
#[cfg(windows)]
pub fn release_handles(path: &Path) -> io::Result<usize> {
    use windows_sys::Win32::System::Threading::GetCurrentProcessId;

    let holders = restart_manager::holders_of(path)?;
    let own = unsafe { GetCurrentProcessId() };

    let mut released = 0;
    for pid in holders {
        if pid == own || pid <= 4 {
            continue;
        }

        let Some(image) = process::image_name(pid) else {
            log::debug!("Not touching holder {} of {}: image unknown", pid, path.display());
            continue;
        };
        if is_critical_process(&image) {
            log::debug!("Not touching critical holder {} ({})", image, pid);
            continue;
        }

        if process::close_windows(pid, GRACEFUL_WAIT_MS) || process::terminate(pid, GRACEFUL_WAIT_MS) {
            log::info!("Released {} held by {} ({})", path.display(), image, pid);
            released += 1;
        }
    }
    Ok(released)
}

#[cfg(not(windows))]
pub fn release_handles(_path: &Path) -> io::Result<usize> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "closing foreign handles is not supported on this platform",
    ))
}

#[cfg(windows)]
mod restart_manager {
    use std::{
        io,
        path::Path,
        ptr,
    };

    use windows_sys::Win32::{
        Foundation::{
            ERROR_MORE_DATA,
            ERROR_SUCCESS,
        },
        System::RestartManager::{
            RmEndSession,
            RmGetList,
            RmRegisterResources,
            RmStartSession,
            CCH_RM_SESSION_KEY,
            RM_PROCESS_INFO,
        },
    };

    const MAX_LIST_ATTEMPTS: usize = 4;

    /// Process ids holding `path`, as reported by a Restart Manager session.
    pub fn holders_of(path: &Path) -> io::Result<Vec<u32>> {
        let mut session = 0u32;
        let mut key = [0u16; CCH_RM_SESSION_KEY as usize + 1];
        let status = unsafe { RmStartSession(&mut session, 0, key.as_mut_ptr()) };
        if status != ERROR_SUCCESS {
            return Err(io::Error::from_raw_os_error(status as i32));
        }

        let result = list(session, path);
        unsafe { RmEndSession(session) };
        result
    }

    fn list(session: u32, path: &Path) -> io::Result<Vec<u32>> {
        let wide = crate::fs::to_wide(path);
        let resources = [wide.as_ptr()];
        let status = unsafe {
            RmRegisterResources(
                session,
                1,
                resources.as_ptr(),
                0,
                ptr::null(),
                0,
                ptr::null(),
            )
        };
        if status != ERROR_SUCCESS {
            return Err(io::Error::from_raw_os_error(status as i32));
        }

        let mut infos: Vec<RM_PROCESS_INFO> = Vec::new();
        for _ in 0..MAX_LIST_ATTEMPTS {
            let mut needed = 0u32;
            let mut count = infos.len() as u32;
            let mut reasons = 0u32;
            let buffer = if infos.is_empty() {
                ptr::null_mut()
            } else {
                infos.as_mut_ptr()
            };

            let status = unsafe { RmGetList(session, &mut needed, &mut count, buffer, &mut reasons) };
            if status == ERROR_SUCCESS {
                infos.truncate(count as usize);
                return Ok(infos.iter().map(|info| info.Process.dwProcessId).collect());
            }
            if status != ERROR_MORE_DATA {
                return Err(io::Error::from_raw_os_error(status as i32));
            }

            /* the holder list grew between the two calls, ask again */
            infos = vec![unsafe { std::mem::zeroed() }; needed as usize];
        }

        Err(io::Error::new(
            io::ErrorKind::Other,
            "holder list kept changing",
        ))
    }
}

#[cfg(windows)]
mod process {
    use windows_sys::Win32::{
        Foundation::{
            CloseHandle,
            BOOL,
            HWND,
            LPARAM,
            WAIT_OBJECT_0,
        },
        System::Threading::{
            OpenProcess,
            QueryFullProcessImageNameW,
            TerminateProcess,
            WaitForSingleObject,
            PROCESS_NAME_WIN32,
            PROCESS_QUERY_LIMITED_INFORMATION,
            PROCESS_SYNCHRONIZE,
            PROCESS_TERMINATE,
        },
        UI::WindowsAndMessaging::{
            EnumWindows,
            GetWindowThreadProcessId,
            IsWindowVisible,
            PostMessageW,
            WM_CLOSE,
        },
    };

    pub fn image_name(pid: u32) -> Option<String> {
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if handle.is_null() {
                return None;
            }

            let mut buffer = [0u16; 1024];
            let mut length = buffer.len() as u32;
            let ok = QueryFullProcessImageNameW(handle, PROCESS_NAME_WIN32, buffer.as_mut_ptr(), &mut length);
            CloseHandle(handle);
            if ok == 0 {
                return None;
            }
            Some(String::from_utf16_lossy(&buffer[..length as usize]))
        }
    }

    struct WindowSearch {
        pid: u32,
        posted: usize,
    }

    unsafe extern "system" fn post_close(window: HWND, param: LPARAM) -> BOOL {
        let search = &mut *(param as *mut WindowSearch);
        let mut owner = 0u32;
        GetWindowThreadProcessId(window, &mut owner);
        if owner == search.pid && IsWindowVisible(window) != 0 {
            PostMessageW(window, WM_CLOSE, 0, 0);
            search.posted += 1;
        }
        1
    }

    /// Post WM_CLOSE to the visible windows of `pid` and wait for it to exit.
    pub fn close_windows(pid: u32, wait_ms: u32) -> bool {
        let mut search = WindowSearch { pid, posted: 0 };
        unsafe {
            EnumWindows(Some(post_close), &mut search as *mut WindowSearch as LPARAM);
        }
        if search.posted == 0 {
            return false;
        }
        wait_for_exit(pid, PROCESS_SYNCHRONIZE, wait_ms, false)
    }

    pub fn terminate(pid: u32, wait_ms: u32) -> bool {
        wait_for_exit(pid, PROCESS_TERMINATE | PROCESS_SYNCHRONIZE, wait_ms, true)
    }

    fn wait_for_exit(pid: u32, access: u32, wait_ms: u32, kill: bool) -> bool {
        unsafe {
            let handle = OpenProcess(access, 0, pid);
            if handle.is_null() {
                /* already gone */
                return true;
            }

            if kill && TerminateProcess(handle, 1) == 0 {
                CloseHandle(handle);
                return false;
            }

            let exited = WaitForSingleObject(handle, wait_ms) == WAIT_OBJECT_0;
            CloseHandle(handle);
            exited
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_processes_are_recognized_by_image_path() {
        assert!(is_critical_process("C:\\Windows\\System32\\csrss.exe"));
        assert!(is_critical_process("LSASS.EXE"));
        assert!(is_critical_process("System"));
        assert!(!is_critical_process("C:\\Program Files\\Editor\\editor.exe"));
    }

    #[test]
    #[cfg(not(windows))]
    fn handle_release_is_unsupported_elsewhere() {
        let error = release_handles(Path::new("/tmp/anything")).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::Unsupported);
    }
}
