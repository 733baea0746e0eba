use std::{
    fs::{
        self,
        Metadata,
    },
    io,
    path::Path,
    time::SystemTime,
};

use chrono::{
    DateTime,
    Utc,
};

#[cfg(windows)]
use std::os::windows::fs::MetadataExt;

const FILE_ATTRIBUTE_READONLY: u32 = 0x1;
const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;

/// Timestamps of a filesystem entry. `None` means the platform or the
/// filesystem could not tell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timestamps {
    pub modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
}

impl Timestamps {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            modified: utc(metadata.modified()),
            accessed: utc(metadata.accessed()),
            created: utc(metadata.created()),
        }
    }

    pub fn most_recent(&self) -> Option<DateTime<Utc>> {
        [self.modified, self.accessed, self.created]
            .into_iter()
            .flatten()
            .max()
    }
}

fn utc(value: io::Result<SystemTime>) -> Option<DateTime<Utc>> {
    let value = value.ok()?;
    /* a zeroed FILETIME shows up as the epoch; treat it as unknown */
    if value == SystemTime::UNIX_EPOCH {
        return None;
    }
    Some(DateTime::<Utc>::from(value))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryAttributes {
    pub hidden: bool,
    pub system: bool,
    pub readonly: bool,
}

impl EntryAttributes {
    #[cfg(windows)]
    pub fn read(_path: &Path, metadata: &Metadata) -> Self {
        Self::from_raw(metadata.file_attributes())
    }

    #[cfg(not(windows))]
    pub fn read(path: &Path, metadata: &Metadata) -> Self {
        use crate::PathEx;

        Self {
            hidden: path.file_name_truncate().starts_with('.'),
            system: false,
            readonly: metadata.permissions().readonly(),
        }
    }

    pub fn from_raw(attributes: u32) -> Self {
        Self {
            hidden: attributes & FILE_ATTRIBUTE_HIDDEN != 0,
            system: attributes & FILE_ATTRIBUTE_SYSTEM != 0,
            readonly: attributes & FILE_ATTRIBUTE_READONLY != 0,
        }
    }
}

/// Whether another process holds `path` open without sharing.
#[cfg(windows)]
pub fn is_locked(path: &Path) -> bool {
    use std::os::windows::fs::OpenOptionsExt;

    match fs::OpenOptions::new().read(true).share_mode(0).open(path) {
        Ok(_) => false,
        Err(error) => crate::delete::is_sharing_violation(&error),
    }
}

/// Unix has no mandatory share modes, so nothing is ever reported locked.
#[cfg(not(windows))]
pub fn is_locked(_path: &Path) -> bool {
    false
}

/// True if something exists at `path`, without following links.
pub fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Plain removal: the first thing every strategy tries again.
pub fn remove_entry(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// NUL terminated UTF-16 form of `path` for the wide Win32 APIs.
#[cfg(windows)]
pub(crate) fn to_wide(path: &Path) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;

    path.as_os_str().encode_wide().chain(Some(0)).collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn decodes_raw_attributes() {
        let attributes = EntryAttributes::from_raw(FILE_ATTRIBUTE_HIDDEN | FILE_ATTRIBUTE_SYSTEM);
        assert!(attributes.hidden);
        assert!(attributes.system);
        assert!(!attributes.readonly);
        assert_eq!(EntryAttributes::from_raw(0x80), EntryAttributes::default());
    }

    #[test]
    fn reads_timestamps_of_real_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        fs::write(&path, b"data").unwrap();

        let timestamps = Timestamps::from_metadata(&fs::metadata(&path).unwrap());
        assert!(timestamps.modified.is_some());
        assert!(timestamps.most_recent().is_some());
    }

    #[test]
    fn most_recent_ignores_unknown_values() {
        let older = DateTime::<Utc>::from(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000));
        let newer = DateTime::<Utc>::from(SystemTime::UNIX_EPOCH + Duration::from_secs(9_000));
        let timestamps = Timestamps {
            modified: Some(older),
            accessed: None,
            created: Some(newer),
        };
        assert_eq!(timestamps.most_recent(), Some(newer));
        assert_eq!(Timestamps::default().most_recent(), None);
    }

    #[test]
    fn removes_files_and_trees() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.tmp");
        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("nested")).unwrap();
        fs::write(&file, b"x").unwrap();
        fs::write(tree.join("nested/g.tmp"), b"y").unwrap();

        remove_entry(&file).unwrap();
        remove_entry(&tree).unwrap();
        assert!(!entry_exists(&file));
        assert!(!entry_exists(&tree));
        assert!(remove_entry(&file).is_err());
    }

    #[test]
    #[cfg(not(windows))]
    fn nothing_is_locked_without_share_modes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("held.log");
        let _held = fs::File::create(&path).unwrap();
        assert!(!is_locked(&path));
    }
}
