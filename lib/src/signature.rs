//! Signature catalog: the extension and filename sets the scorer and the
//! crash retention policy match candidates against.

use std::{
    collections::BTreeSet,
    env,
    fs,
    io,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        OnceLock,
    },
    time::{
        Duration,
        Instant,
    },
};

use serde::Deserialize;
use thiserror::Error;

pub const SIGNATURES_PATH_ENV: &str = "RECLAIM_SIGNATURES_PATH";
pub const SIGNATURES_RELATIVE_PATH: &str = "data/cleanup/signatures.json";
pub const SIGNATURE_TTL: Duration = Duration::from_secs(15 * 60);

const DEFAULT_RETENTION_COUNT: usize = 2;
const MAX_RETENTION_COUNT: usize = 64;

const TEMPORARY_EXTENSIONS: &[&str] = &[
    ".tmp", ".temp", ".bak", ".old", ".chk", ".gid", ".~tmp", "._mp", ".$$$", ".swp", ".cache",
];
const CRASH_DUMP_EXTENSIONS: &[&str] = &[".dmp", ".mdmp", ".hdmp", ".crash", ".core"];
const PARTIAL_DOWNLOAD_EXTENSIONS: &[&str] = &[
    ".crdownload", ".part", ".partial", ".download", ".opdownload", ".!ut", ".bc!",
];
const LOG_EXTENSIONS: &[&str] = &[".log", ".etl", ".trace", ".lo_", ".log1", ".log2"];
const CRASH_FILE_NAMES: &[&str] = &[
    "memory.dmp",
    "minidump.dmp",
    "crash.dmp",
    "report.wer",
    "crashreport.txt",
];
const CRASH_FILE_PREFIXES: &[&str] = &[
    "crashdump",
    "minidump",
    "crash_",
    "appcrash_",
    "noncritical_",
    "critical_",
    "kernel_",
];
const CRASH_PATH_HINTS: &[&str] = &[
    "/crashdumps/",
    "/minidump/",
    "/livekernelreports/",
    "/wer/reportarchive/",
    "/wer/reportqueue/",
    "/crashpad/",
    "/crashes/",
    "/crash reports/",
];

/// Immutable signature sets, shared read-only by every scanning worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSnapshot {
    pub temporary_extensions: BTreeSet<String>,
    pub crash_dump_extensions: BTreeSet<String>,
    pub partial_download_extensions: BTreeSet<String>,
    pub log_extensions: BTreeSet<String>,
    pub crash_file_names: BTreeSet<String>,
    pub crash_file_prefixes: Vec<String>,
    pub crash_path_hints: Vec<String>,
    pub crash_dump_retention_count: usize,
}

impl Default for SignatureSnapshot {
    fn default() -> Self {
        Self {
            temporary_extensions: extension_set(TEMPORARY_EXTENSIONS),
            crash_dump_extensions: extension_set(CRASH_DUMP_EXTENSIONS),
            partial_download_extensions: extension_set(PARTIAL_DOWNLOAD_EXTENSIONS),
            log_extensions: extension_set(LOG_EXTENSIONS),
            crash_file_names: CRASH_FILE_NAMES.iter().map(|name| name.to_string()).collect(),
            crash_file_prefixes: CRASH_FILE_PREFIXES.iter().map(|p| p.to_string()).collect(),
            crash_path_hints: CRASH_PATH_HINTS.iter().map(|h| h.to_string()).collect(),
            crash_dump_retention_count: DEFAULT_RETENTION_COUNT,
        }
    }
}

impl SignatureSnapshot {
    /// Parse an override document and merge it over the built-in defaults.
    pub fn from_override_json(json: &str) -> Result<Self, SignatureError> {
        let overrides: SignatureOverrides = serde_json::from_str(json)?;
        let mut snapshot = Self::default();
        snapshot.merge(overrides);
        Ok(snapshot)
    }

    pub fn is_temporary_extension(&self, extension: &str) -> bool {
        self.temporary_extensions.contains(extension)
    }

    pub fn is_partial_download_extension(&self, extension: &str) -> bool {
        self.partial_download_extensions.contains(extension)
    }

    pub fn is_log_extension(&self, extension: &str) -> bool {
        self.log_extensions.contains(extension)
    }

    /// Longest recognized crash-dump extension that terminates `file_name`.
    /// `file_name` must already be lowercase.
    pub fn crash_extension_of<'a>(&'a self, file_name: &str) -> Option<&'a str> {
        self.crash_dump_extensions
            .iter()
            .filter(|extension| file_name.ends_with(extension.as_str()))
            .max_by_key(|extension| extension.len())
            .map(String::as_str)
    }

    fn merge(&mut self, overrides: SignatureOverrides) {
        merge_extensions(&mut self.temporary_extensions, overrides.temporary_extensions);
        merge_extensions(&mut self.crash_dump_extensions, overrides.crash_dump_extensions);
        merge_extensions(
            &mut self.partial_download_extensions,
            overrides.partial_download_extensions,
        );
        merge_extensions(&mut self.log_extensions, overrides.log_extensions);

        for name in overrides.crash_file_names.into_iter().flatten() {
            let name = name.trim().to_lowercase();
            if !name.is_empty() {
                self.crash_file_names.insert(name);
            }
        }

        for prefix in overrides.crash_file_prefixes.into_iter().flatten() {
            let prefix = prefix.trim().to_lowercase();
            if !prefix.is_empty() && !self.crash_file_prefixes.contains(&prefix) {
                self.crash_file_prefixes.push(prefix);
            }
        }

        for hint in overrides.crash_path_hints.into_iter().flatten() {
            if let Some(hint) = normalize_hint(&hint) {
                if !self.crash_path_hints.contains(&hint) {
                    self.crash_path_hints.push(hint);
                }
            }
        }

        if let Some(count) = overrides.crash_dump_newest_retention_count {
            self.crash_dump_retention_count = (count.max(0) as usize).min(MAX_RETENTION_COUNT);
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SignatureOverrides {
    temporary_extensions: Option<Vec<String>>,
    crash_dump_extensions: Option<Vec<String>>,
    partial_download_extensions: Option<Vec<String>>,
    log_extensions: Option<Vec<String>>,
    crash_file_names: Option<Vec<String>>,
    crash_file_prefixes: Option<Vec<String>>,
    crash_path_hints: Option<Vec<String>>,
    crash_dump_newest_retention_count: Option<i64>,
}

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

fn extension_set(values: &[&str]) -> BTreeSet<String> {
    values.iter().filter_map(|value| normalize_extension(value)).collect()
}

fn merge_extensions(target: &mut BTreeSet<String>, values: Option<Vec<String>>) {
    target.extend(values.into_iter().flatten().filter_map(|v| normalize_extension(&v)));
}

/// Lowercase and dot-prefix an extension. Blank input yields `None`.
pub fn normalize_extension(value: &str) -> Option<String> {
    let value = value.trim().trim_start_matches('*').to_lowercase();
    if value.is_empty() || value == "." {
        return None;
    }

    if value.starts_with('.') {
        Some(value)
    } else {
        Some(format!(".{}", value))
    }
}

/// Path hints are matched against lowercase, `/`-separated paths and are
/// padded with separators so they only ever match whole components.
fn normalize_hint(value: &str) -> Option<String> {
    let hint = value.trim().replace('\\', "/").to_lowercase();
    let hint = hint.trim_matches('/');
    if hint.is_empty() {
        return None;
    }

    Some(format!("/{}/", hint))
}

/// Where the catalog loads its override document from.
#[derive(Debug, Clone)]
pub enum SignatureSource {
    /// Environment override, then the conventional path beside the binary.
    Discover,
    /// A fixed file; missing or malformed falls back to defaults.
    File(PathBuf),
    /// Built-in defaults only.
    Defaults,
}

impl SignatureSource {
    fn resolve(&self) -> Option<PathBuf> {
        match self {
            Self::Defaults => None,
            Self::File(path) => Some(path.clone()),
            Self::Discover => {
                if let Some(path) = env::var_os(SIGNATURES_PATH_ENV).map(PathBuf::from) {
                    if path.is_file() {
                        return Some(path);
                    }
                    log::debug!(
                        "Signature override {} does not exist, falling back",
                        path.display()
                    );
                }

                let beside_binary = env::current_exe()
                    .ok()?
                    .parent()?
                    .join(SIGNATURES_RELATIVE_PATH);
                beside_binary.is_file().then_some(beside_binary)
            }
        }
    }
}

struct CachedSnapshot {
    loaded_at: Instant,
    snapshot: Arc<SignatureSnapshot>,
}

/// Lazily rebuilt signature snapshot with a time-to-live.
pub struct SignatureCatalog {
    source: SignatureSource,
    ttl: Duration,
    cached: Mutex<Option<CachedSnapshot>>,
}

impl SignatureCatalog {
    pub fn new(source: SignatureSource) -> Self {
        Self::with_ttl(source, SIGNATURE_TTL)
    }

    pub fn with_ttl(source: SignatureSource, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// Process wide catalog using [`SignatureSource::Discover`].
    pub fn global() -> &'static SignatureCatalog {
        static CATALOG: OnceLock<SignatureCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| SignatureCatalog::new(SignatureSource::Discover))
    }

    /// Current snapshot, rebuilt if the cached one is older than the TTL.
    ///
    /// The override file is read without holding the lock; the TTL is
    /// checked again once the lock is re-acquired so a concurrent rebuild
    /// wins over this one.
    pub fn snapshot(&self) -> Arc<SignatureSnapshot> {
        if let Some(current) = self.fresh_snapshot() {
            return current;
        }

        let loaded = Arc::new(self.load());
        let mut cached = self.lock_cache();
        if let Some(current) = cached.as_ref() {
            if current.loaded_at.elapsed() < self.ttl {
                return current.snapshot.clone();
            }
        }

        *cached = Some(CachedSnapshot {
            loaded_at: Instant::now(),
            snapshot: loaded.clone(),
        });
        loaded
    }

    /// Rebuild the snapshot immediately, resetting the TTL.
    pub fn force_refresh(&self) -> Arc<SignatureSnapshot> {
        let loaded = Arc::new(self.load());
        *self.lock_cache() = Some(CachedSnapshot {
            loaded_at: Instant::now(),
            snapshot: loaded.clone(),
        });
        loaded
    }

    fn fresh_snapshot(&self) -> Option<Arc<SignatureSnapshot>> {
        let cached = self.lock_cache();
        let current = cached.as_ref()?;
        (current.loaded_at.elapsed() < self.ttl).then(|| current.snapshot.clone())
    }

    fn lock_cache(&self) -> MutexGuard<'_, Option<CachedSnapshot>> {
        match self.cached.lock() {
            Ok(cached) => cached,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn load(&self) -> SignatureSnapshot {
        let Some(path) = self.source.resolve() else {
            return SignatureSnapshot::default();
        };

        match load_override_file(&path) {
            Ok(snapshot) => {
                log::debug!("Loaded signature overrides from {}", path.display());
                snapshot
            }
            Err(error) => {
                log::warn!(
                    "Ignoring signature overrides at {}: {:#}",
                    path.display(),
                    error
                );
                SignatureSnapshot::default()
            }
        }
    }
}

fn load_override_file(path: &Path) -> Result<SignatureSnapshot, SignatureError> {
    let content = fs::read_to_string(path)?;
    SignatureSnapshot::from_override_json(&content)
}
