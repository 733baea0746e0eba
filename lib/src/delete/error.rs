use std::io;

#[cfg(windows)]
const SHARING_CODES: &[i32] = &[
    32,   /* ERROR_SHARING_VIOLATION */
    33,   /* ERROR_LOCK_VIOLATION */
    1224, /* ERROR_USER_MAPPED_FILE */
];

#[cfg(not(windows))]
const SHARING_CODES: &[i32] = &[
    16, /* EBUSY */
    26, /* ETXTBSY */
];

#[cfg(windows)]
const ACCESS_DENIED_CODES: &[i32] = &[5];

#[cfg(not(windows))]
const ACCESS_DENIED_CODES: &[i32] = &[1, 13];

const SHARING_MESSAGES: &[&str] = &[
    "being used by another process",
    "locked a portion of the file",
    "user-mapped section open",
    "resource busy",
    "text file busy",
];

/// How a failed removal attempt will be escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InUse,
    AccessDenied,
    Other,
}

impl FailureKind {
    pub fn of(error: &io::Error) -> Self {
        if is_sharing_violation(error) {
            Self::InUse
        } else if error.kind() == io::ErrorKind::PermissionDenied
            || error
                .raw_os_error()
                .map_or(false, |code| ACCESS_DENIED_CODES.contains(&code))
        {
            Self::AccessDenied
        } else {
            Self::Other
        }
    }
}

/// True when another process holds the entry open.
pub fn is_sharing_violation(error: &io::Error) -> bool {
    if let Some(code) = error.raw_os_error() {
        if SHARING_CODES.contains(&code) {
            return true;
        }
    }

    let message = error.to_string().to_lowercase();
    SHARING_MESSAGES.iter().any(|known| message.contains(known))
}
