use std::{
    ffi::OsStr,
    path::Path,
};

static EMPTY_STR: &str = "";

/// Utility functions for the systems path library
pub trait PathEx {
    /// Returns the file name from the current path, or an empty string if the file name is empty
    fn file_name_truncate(&self) -> &str;

    /// Lowercase extension including the leading dot, or an empty string.
    fn extension_lower(&self) -> String;

    /// Lowercase, `/` separated form used to match path hints.
    fn search_form(&self) -> String;
}

impl PathEx for Path {
    fn file_name_truncate(&self) -> &str {
        self.file_name().and_then(OsStr::to_str).unwrap_or(EMPTY_STR)
    }

    fn extension_lower(&self) -> String {
        self.extension()
            .map(|extension| format!(".{}", extension.to_string_lossy().to_lowercase()))
            .unwrap_or_default()
    }

    fn search_form(&self) -> String {
        self.to_string_lossy().replace('\\', "/").to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_names_and_extensions() {
        let path = Path::new("/var/tmp/Setup.TMP");
        assert_eq!(path.file_name_truncate(), "Setup.TMP");
        assert_eq!(path.extension_lower(), ".tmp");
    }

    #[test]
    fn missing_extension_is_empty() {
        assert_eq!(Path::new("/var/tmp/README").extension_lower(), "");
        assert_eq!(Path::new("/").file_name_truncate(), "");
    }

    #[test]
    fn search_form_uses_forward_slashes() {
        assert_eq!(
            Path::new("C:\\ProgramData\\CrashDumps\\App.dmp").search_form(),
            "c:/programdata/crashdumps/app.dmp"
        );
    }
}
