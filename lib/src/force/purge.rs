use std::{
    fs,
    io,
    path::Path,
};

use walkdir::WalkDir;

use super::{
    attributes::{
        clear_entry,
        relax_parent,
    },
    ownership::take_ownership,
    reboot::schedule_delete_on_reboot,
    ForceOutcome,
};

/// Remove a directory tree entry by entry, deepest first. Each entry gets
/// its attributes cleared, and its ownership taken when the first removal
/// fails. Entries that still resist are scheduled for reboot when allowed.
pub fn purge_tree(root: &Path, allow_reboot: bool) -> io::Result<ForceOutcome> {
    let mut scheduled = 0usize;
    let mut last_error = None;

    for entry in WalkDir::new(root).follow_links(false).contents_first(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                log::debug!("Purge cannot visit an entry below {}: {:#}", root.display(), error);
                last_error = Some(io::Error::from(error));
                continue;
            }
        };

        let path = entry.path();
        let is_dir = entry.file_type().is_dir();
        if let Err(error) = remove_single(path, is_dir) {
            if allow_reboot && schedule_delete_on_reboot(path).is_ok() {
                scheduled += 1;
                continue;
            }
            log::debug!("Purge failed for {}: {:#}", path.display(), error);
            last_error = Some(error);
        }
    }

    if let Some(error) = last_error {
        return Err(error);
    }

    if scheduled > 0 {
        log::info!(
            "Purged {}, {} entries left for the next reboot",
            root.display(),
            scheduled
        );
        Ok(ForceOutcome::ScheduledForReboot)
    } else {
        Ok(ForceOutcome::Deleted)
    }
}

fn remove_single(path: &Path, is_dir: bool) -> io::Result<()> {
    let remove = || {
        if is_dir {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        }
    };

    let _ = clear_entry(path);
    match remove() {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(_) => {
            relax_parent(path);
            let _ = take_ownership(path);
            remove()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purges_nested_trees() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("a/one.tmp"), b"1").unwrap();
        fs::write(root.join("a/b/c/two.tmp"), b"2").unwrap();

        assert_eq!(purge_tree(&root, false).unwrap(), ForceOutcome::Deleted);
        assert!(!root.exists());
    }

    #[test]
    #[cfg(unix)]
    fn purges_through_read_only_directories() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        fs::create_dir_all(root.join("sealed")).unwrap();
        fs::write(root.join("sealed/file.tmp"), b"x").unwrap();
        fs::set_permissions(root.join("sealed"), fs::Permissions::from_mode(0o500)).unwrap();

        assert_eq!(purge_tree(&root, false).unwrap(), ForceOutcome::Deleted);
        assert!(!root.exists());
    }
}
