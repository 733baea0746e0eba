use std::fmt;

use super::SafetyError;

const WINDOWS_INVALID_CHARS: &[char] = &['<', '>', '"', '|', '?', '*'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathStyle {
    Windows,
    Unix,
}

impl PathStyle {
    fn separator(&self) -> char {
        match self {
            Self::Windows => '\\',
            Self::Unix => '/',
        }
    }
}

/// A fully resolved, rooted path in canonical textual form.
///
/// Windows paths are lowercased, use `\` and carry no `.`/`..` components.
/// Unix paths keep their case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath {
    style: PathStyle,
    text: String,
    root_len: usize,
}

impl NormalizedPath {
    pub fn style(&self) -> PathStyle {
        self.style
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    fn relative(&self) -> &str {
        self.text[self.root_len..].trim_start_matches(self.style.separator())
    }

    /// Last component, empty for a root.
    pub fn file_name(&self) -> &str {
        self.relative()
            .rsplit(self.style.separator())
            .next()
            .unwrap_or_default()
    }

    /// Parent path, `None` for a root.
    pub fn parent(&self) -> Option<NormalizedPath> {
        if self.relative().is_empty() {
            return None;
        }

        let relative = self.relative();
        let text = match relative.rfind(self.style.separator()) {
            Some(index) => {
                let offset = self.text.len() - relative.len();
                self.text[..offset + index].to_string()
            }
            None => self.text[..self.root_len].to_string(),
        };

        Some(NormalizedPath {
            style: self.style,
            text,
            root_len: self.root_len,
        })
    }

    /// True when `self` equals `root` or lies somewhere beneath it.
    pub fn is_at_or_under(&self, root: &NormalizedPath) -> bool {
        if self.style != root.style || !self.text.starts_with(&root.text) {
            return false;
        }

        let separator = root.style.separator();
        self.text.len() == root.text.len()
            || root.text.ends_with(separator)
            || self.text[root.text.len()..].starts_with(separator)
    }

    /// Searchable form with `/` separators and a trailing separator.
    pub fn search_form(&self) -> String {
        let mut text = self.text.replace('\\', "/");
        if !text.ends_with('/') {
            text.push('/');
        }
        text
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Resolve `raw` into a [`NormalizedPath`].
///
/// `Ok(None)` means the path is not rooted (relative, drive relative, root
/// relative, device namespace) or did not survive a normalization round
/// trip. Blank input and characters no filesystem path may contain are
/// errors.
pub fn normalize(raw: &str) -> Result<Option<NormalizedPath>, SafetyError> {
    if raw.trim().is_empty() {
        return Err(SafetyError::Empty);
    }

    let Some(first) = resolve(raw)? else {
        return Ok(None);
    };

    /* a resolved path has to resolve to itself */
    match resolve(&first.text)? {
        Some(second) if second == first => Ok(Some(first)),
        _ => {
            log::debug!("Path {} is not stable under normalization", raw);
            Ok(None)
        }
    }
}

fn resolve(raw: &str) -> Result<Option<NormalizedPath>, SafetyError> {
    if cfg!(unix) && raw.starts_with('/') && !raw.starts_with("//") {
        if raw.contains('\0') {
            return Err(SafetyError::InvalidCharacter('\0'));
        }
        return Ok(Some(build_unix(raw)));
    }

    if let Some(invalid) = raw.chars().find(|c| (*c as u32) < 0x20) {
        return Err(SafetyError::InvalidCharacter(invalid));
    }

    let path = strip_long_prefix(raw);
    if path.starts_with("\\\\.\\") || path.starts_with("//./") {
        return Ok(None);
    }

    if let Some(invalid) = path.chars().find(|c| WINDOWS_INVALID_CHARS.contains(c)) {
        return Err(SafetyError::InvalidCharacter(invalid));
    }

    let bytes = path.as_bytes();
    let has_drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if path
        .char_indices()
        .any(|(index, c)| c == ':' && !(index == 1 && has_drive))
    {
        return Err(SafetyError::InvalidCharacter(':'));
    }

    let is_separator = |b: u8| b == b'\\' || b == b'/';
    if has_drive {
        if bytes.len() == 2 || !is_separator(bytes[2]) {
            /* drive relative: "C:foo" */
            return Ok(None);
        }

        let root = format!("{}:\\", (bytes[0] as char).to_ascii_lowercase());
        return Ok(Some(build_windows(root, &path[3..])));
    }

    if bytes.len() >= 2 && is_separator(bytes[0]) && is_separator(bytes[1]) {
        let mut parts = path[2..]
            .split(['\\', '/'])
            .filter(|part| !part.is_empty());
        let (Some(server), Some(share)) = (parts.next(), parts.next()) else {
            return Ok(None);
        };

        let root = format!("\\\\{}\\{}", server.to_lowercase(), share.to_lowercase());
        let rest = parts.collect::<Vec<_>>().join("\\");
        return Ok(Some(build_windows(root, &rest)));
    }

    Ok(None)
}

fn strip_long_prefix(raw: &str) -> String {
    for prefix in ["\\\\?\\UNC\\", "//?/UNC/"] {
        if let Some(rest) = raw.strip_prefix(prefix) {
            return format!("\\\\{}", rest);
        }
    }
    for prefix in ["\\\\?\\", "//?/"] {
        if let Some(rest) = raw.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    raw.to_string()
}

fn build_windows(root: String, rest: &str) -> NormalizedPath {
    let mut components: Vec<String> = Vec::new();
    for component in rest.split(['\\', '/']) {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            other => {
                /* trailing dots and spaces are not part of a Windows file name */
                let trimmed = other.trim_end_matches(['.', ' ']);
                if !trimmed.is_empty() {
                    components.push(trimmed.to_lowercase());
                }
            }
        }
    }

    let root_len = root.len();
    let mut text = root;
    if !components.is_empty() {
        if !text.ends_with('\\') {
            text.push('\\');
        }
        text.push_str(&components.join("\\"));
    }

    NormalizedPath {
        style: PathStyle::Windows,
        text,
        root_len,
    }
}

fn build_unix(path: &str) -> NormalizedPath {
    let mut components: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            other => components.push(other),
        }
    }

    NormalizedPath {
        style: PathStyle::Unix,
        text: format!("/{}", components.join("/")),
        root_len: 1,
    }
}
