use std::{
    env,
    fmt,
    path::PathBuf,
};

use serde::{
    Deserialize,
    Serialize,
};

/// What kind of reclaimable data a target location holds.
///
/// The declaration order is the order in which reports are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Temp,
    Cache,
    Logs,
    Orphaned,
    Downloads,
    Other,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Temp => "temp",
            Self::Cache => "cache",
            Self::Logs => "logs",
            Self::Orphaned => "orphaned",
            Self::Downloads => "downloads",
            Self::Other => "other",
        }
    }

    /// Classifications where crash dump retention must run before scoring.
    pub fn applies_crash_retention(&self) -> bool {
        matches!(self, Self::Orphaned | Self::Logs)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[default]
    Directory,
    File,
}

/// One well-known location to inspect. Supplied by the definition provider
/// and never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDefinition {
    pub classification: Classification,
    pub category: String,

    /// Raw location, possibly containing environment variables.
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub notes: String,

    #[serde(default)]
    pub kind: TargetKind,
}

impl TargetDefinition {
    pub fn new(
        classification: Classification,
        category: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            classification,
            category: category.into(),
            path: Some(path.into()),
            notes: String::new(),
            kind: TargetKind::Directory,
        }
    }

    pub fn with_kind(mut self, kind: TargetKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Expand the raw path. Returns `None` when the definition carries no
    /// path, the path is blank, or it references an undefined variable.
    pub fn resolve_path(&self) -> Option<PathBuf> {
        let raw = self.path.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }

        expand_environment(raw, |name| env::var(name).ok()).map(PathBuf::from)
    }
}

/// Expand `%VAR%`, `$VAR`, `${VAR}` and a leading `~`.
///
/// `lookup` resolves a variable name. An unresolved `%VAR%` or `${VAR}`
/// makes the whole expansion fail, while an unresolved bare `$VAR` is kept
/// as written. Windows style paths never expand `$`, since names such as
/// `$PatchCache$` and `$Recycle.Bin` are literal there.
pub fn expand_environment<F>(raw: &str, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut expanded = String::with_capacity(raw.len());
    let mut rest = raw;
    let dollar_expands = !is_windows_style(raw);

    if rest == "~" || rest.starts_with("~/") || rest.starts_with("~\\") {
        let home = dirs::home_dir()?;
        expanded.push_str(&home.to_string_lossy());
        rest = &rest[1..];
    }

    while let Some(index) = rest.find(|c: char| c == '%' || (dollar_expands && c == '$')) {
        expanded.push_str(&rest[..index]);
        let marker = rest.as_bytes()[index];
        let tail = &rest[index + 1..];

        let (name, consumed, required) = if marker == b'%' {
            match tail.find('%') {
                Some(end) if end > 0 => (&tail[..end], end + 1, true),
                _ => {
                    expanded.push('%');
                    rest = tail;
                    continue;
                }
            }
        } else if let Some(braced) = tail.strip_prefix('{') {
            match braced.find('}') {
                Some(end) if end > 0 => (&braced[..end], end + 2, true),
                _ => {
                    expanded.push('$');
                    rest = tail;
                    continue;
                }
            }
        } else {
            let end = tail
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(tail.len());
            if end == 0 {
                expanded.push('$');
                rest = tail;
                continue;
            }
            (&tail[..end], end, false)
        };

        match lookup(name) {
            Some(value) => expanded.push_str(&value),
            None if required => return None,
            None => {
                expanded.push('$');
                expanded.push_str(name);
            }
        }
        rest = &tail[consumed..];
    }

    expanded.push_str(rest);
    Some(expanded)
}

/// Backslash separated, drive letter or `%VAR%` rooted.
fn is_windows_style(raw: &str) -> bool {
    raw.contains('\\') || raw.starts_with('%') || raw.as_bytes().get(1) == Some(&b':')
}
