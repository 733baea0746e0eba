use std::{
    io,
    path::Path,
};

/// Make the current user the owner of `path` (recursively for directories)
/// and grant it full control.
#[cfg(windows)]
pub fn take_ownership(path: &Path) -> io::Result<()> {
    use std::{
        env,
        process::Command,
    };

    let recursive = path.is_dir();
    let mut takeown = Command::new("takeown");
    takeown.arg("/F").arg(path);
    if recursive {
        takeown.args(["/R", "/D", "Y"]);
    }
    run_quiet(&mut takeown, "takeown")?;

    let user = match (env::var("USERDOMAIN"), env::var("USERNAME")) {
        (Ok(domain), Ok(user)) if !domain.is_empty() => format!("{}\\{}", domain, user),
        (_, Ok(user)) => user,
        _ => "*S-1-3-4".to_string(),
    };

    let mut icacls = Command::new("icacls");
    icacls.arg(path).arg("/grant").arg(format!("{}:F", user));
    if recursive {
        icacls.arg("/T");
    }
    icacls.args(["/C", "/Q"]);
    run_quiet(&mut icacls, "icacls")
}

#[cfg(windows)]
fn run_quiet(command: &mut std::process::Command, name: &str) -> io::Result<()> {
    use std::process::Stdio;

    let status = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("{} exited with {}", name, status),
        ))
    }
}

/// Ownership cannot be taken without privileges on Unix; restoring the
/// owner permission bits is what an unprivileged owner can do.
#[cfg(not(windows))]
pub fn take_ownership(path: &Path) -> io::Result<()> {
    if super::attributes::clear_restrictive_attributes(path) == 0 && !crate::fs::entry_exists(path) {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        ));
    }
    Ok(())
}
