//! Path safety gate: decides whether a path is system critical and must
//! never be touched by a cleanup pass.

use std::{
    collections::BTreeSet,
    fmt,
    path::Path,
    sync::OnceLock,
};

use dashmap::DashSet;
use thiserror::Error;

mod normalize;
pub use normalize::*;

mod roots;
pub use roots::SystemLocations;
use roots::CriticalRoots;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SafetyError {
    #[error("path is empty")]
    Empty,

    #[error("path contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Why the gate classified a path the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathVerdict {
    /// Relative, drive relative or otherwise unresolvable.
    NotRooted,
    /// Boot, paging or registry hive file.
    CriticalFileName,
    /// Inside a known safe cleanup location.
    AllowListed,
    /// At or beneath an operating system root.
    DeniedRoot,
    /// Exactly a top level system folder or a user profile root.
    CriticalDirectory,
    /// At or beneath a deployment specific root.
    AdditionalRoot,
    /// Nothing matched.
    Unlisted,
}

impl PathVerdict {
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::CriticalFileName | Self::DeniedRoot | Self::CriticalDirectory | Self::AdditionalRoot
        )
    }
}

impl fmt::Display for PathVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NotRooted => "not a rooted path",
            Self::CriticalFileName => "protected system file",
            Self::AllowListed => "known safe cleanup location",
            Self::DeniedRoot => "protected system location",
            Self::CriticalDirectory => "protected system directory",
            Self::AdditionalRoot => "protected system location (deployment policy)",
            Self::Unlisted => "not a system location",
        };
        f.write_str(text)
    }
}

pub struct PathSafetyGate {
    locations: SystemLocations,
    roots: OnceLock<CriticalRoots>,
    additional_roots: DashSet<NormalizedPath>,
}

impl PathSafetyGate {
    /// Gate for the folders of the running system.
    pub fn new() -> Self {
        Self::with_locations(SystemLocations::from_environment())
    }

    pub fn with_locations(locations: SystemLocations) -> Self {
        Self {
            locations,
            roots: OnceLock::new(),
            additional_roots: DashSet::new(),
        }
    }

    pub fn global() -> &'static PathSafetyGate {
        static GATE: OnceLock<PathSafetyGate> = OnceLock::new();
        GATE.get_or_init(PathSafetyGate::new)
    }

    pub fn locations(&self) -> &SystemLocations {
        &self.locations
    }

    fn roots(&self) -> &CriticalRoots {
        self.roots.get_or_init(|| CriticalRoots::build(&self.locations))
    }

    pub fn is_system_critical_path(&self, path: &str) -> Result<bool, SafetyError> {
        Ok(self.assess(path)?.is_critical())
    }

    pub fn is_system_critical(&self, path: &Path) -> Result<bool, SafetyError> {
        self.is_system_critical_path(&path.to_string_lossy())
    }

    /// Like [`Self::is_system_critical`], for an entry whose kind is known.
    pub fn is_system_critical_entry(
        &self,
        path: &Path,
        is_directory: bool,
    ) -> Result<bool, SafetyError> {
        Ok(self
            .assess_entry(&path.to_string_lossy(), is_directory)?
            .is_critical())
    }

    /// Classify `path`. The checks run in a fixed order: critical file
    /// names, then the allow-list, then the deny-list, then deployment
    /// roots. The allow-list has to win over a denied ancestor.
    ///
    /// The kind of the entry is unknown here, so the path is treated as a
    /// file and critical file names always apply.
    pub fn assess(&self, path: &str) -> Result<PathVerdict, SafetyError> {
        self.assess_entry(path, false)
    }

    /// Classify an entry of known kind. Critical file names such as the
    /// registry hives only match files; a directory called `Default` is
    /// judged by its location alone.
    pub fn assess_entry(&self, path: &str, is_directory: bool) -> Result<PathVerdict, SafetyError> {
        let Some(normalized) = normalize(path)? else {
            return Ok(PathVerdict::NotRooted);
        };

        let roots = self.roots();
        if !is_directory
            && roots
                .file_names
                .contains(normalized.file_name().to_lowercase().as_str())
        {
            return Ok(PathVerdict::CriticalFileName);
        }

        if roots
            .allowed
            .iter()
            .any(|allowed| normalized.is_at_or_under(allowed))
        {
            return Ok(PathVerdict::AllowListed);
        }

        if roots
            .denied
            .iter()
            .any(|denied| normalized.is_at_or_under(denied))
        {
            return Ok(PathVerdict::DeniedRoot);
        }

        if normalized.style() == PathStyle::Windows {
            let searchable = normalized.search_form();
            if roots
                .denied_segments
                .iter()
                .any(|segment| searchable.contains(segment))
            {
                return Ok(PathVerdict::DeniedRoot);
            }
        }

        if roots.exact.contains(&normalized) {
            return Ok(PathVerdict::CriticalDirectory);
        }

        if let (Some(profiles), Some(parent)) = (&roots.profiles_parent, normalized.parent()) {
            if &parent == profiles {
                return Ok(PathVerdict::CriticalDirectory);
            }
        }

        if self
            .additional_roots
            .iter()
            .any(|root| normalized.is_at_or_under(root.key()))
        {
            return Ok(PathVerdict::AdditionalRoot);
        }

        Ok(PathVerdict::Unlisted)
    }

    /// Replace the deployment specific critical roots. Entries that are not
    /// rooted paths are ignored.
    pub fn set_additional_critical_roots<I, S>(&self, roots: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = BTreeSet::new();
        for root in roots {
            let root = root.as_ref();
            match normalize(root) {
                Ok(Some(normalized)) => {
                    parsed.insert(normalized);
                }
                Ok(None) | Err(_) => {
                    log::warn!("Ignoring additional critical root {:?}", root);
                }
            }
        }

        /* insert before pruning: readers see a superset of the new roots throughout */
        for root in &parsed {
            self.additional_roots.insert(root.clone());
        }
        self.additional_roots.retain(|root| parsed.contains(root));
    }

    /// Deployment specific roots in sorted order.
    pub fn additional_critical_roots(&self) -> Vec<String> {
        let roots = self
            .additional_roots
            .iter()
            .map(|root| root.key().clone())
            .collect::<BTreeSet<_>>();
        roots.iter().map(|root| root.to_string()).collect()
    }
}

impl Default for PathSafetyGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorthand for [`PathSafetyGate::global`].
pub fn is_system_critical_path(path: &str) -> Result<bool, SafetyError> {
    PathSafetyGate::global().is_system_critical_path(path)
}
