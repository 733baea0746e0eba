//! Candidate scoring: turns one file or one aggregated directory into an
//! inclusion decision, a confidence, a ranking weight and the signals that
//! explain it.

use std::{
    collections::BTreeMap,
    fs::Metadata,
    path::{
        Path,
        PathBuf,
    },
};

use chrono::{
    DateTime,
    Duration,
    Utc,
};

use crate::{
    fs::{
        EntryAttributes,
        Timestamps,
    },
    safety::PathSafetyGate,
    signature::SignatureSnapshot,
    utils::SIZE_1MB,
    Classification,
    PathEx,
    TargetDefinition,
};

mod crash;
pub use crash::*;

mod directory;
mod file;

/// Files written within this many hours count as "recently modified".
pub const RECENT_WRITE_WINDOW_HOURS: i64 = 12;

/// Candidates at least this large are always included.
pub const FORCE_INCLUDE_SIZE: u64 = 48 * SIZE_1MB;
pub const FORCE_INCLUDE_CONFIDENCE: f64 = 0.35;

const RAW_SCORE_MAX: f64 = 1.5;
const LOGISTIC_CENTER: f64 = 0.55;
const LOGISTIC_STEEPNESS: f64 = 5.0;

const WEIGHT_CONFIDENCE_BOOST: f64 = 20_000_000.0;
const EMPTY_DIRECTORY_WEIGHT_FLOOR: f64 = 5_000_000.0;
const EMPTY_DIRECTORY_MIN_CONFIDENCE: f64 = 0.4;

/// Per-file input of the scorer. Built once per enumerated file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileContext {
    pub name: String,
    pub path: PathBuf,
    /// Lowercase, dot-prefixed; empty when the file has none.
    pub extension: String,
    pub size: u64,
    pub timestamps: Timestamps,
    pub attributes: EntryAttributes,
    pub recently_modified: bool,
    pub locked: bool,
}

impl FileContext {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        Self {
            name: path.file_name_truncate().to_string(),
            extension: path.extension_lower(),
            path,
            size,
            timestamps: Timestamps::default(),
            attributes: EntryAttributes::default(),
            recently_modified: false,
            locked: false,
        }
    }

    pub fn from_metadata(path: &Path, metadata: &Metadata, now: DateTime<Utc>) -> Self {
        let mut context = Self::new(path, metadata.len());
        context.timestamps = Timestamps::from_metadata(metadata);
        context.attributes = EntryAttributes::read(path, metadata);
        context.recently_modified = context
            .timestamps
            .modified
            .map_or(false, |modified| {
                now - modified < Duration::hours(RECENT_WRITE_WINDOW_HOURS)
            });
        context
    }

    pub fn name_lower(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Aggregate of everything beneath one immediate subdirectory of a target.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirectorySnapshot {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub total_files: u64,
    pub hidden_files: u64,
    pub system_files: u64,
    pub recent_files: u64,
    pub temp_files: u64,
    /// Files left out before scoring (locked or retained crash dumps).
    pub excluded_files: u64,
    pub extensions: BTreeMap<String, u64>,
    /// Most recent write of any file beneath, or of the directory itself
    /// when it holds no files.
    pub last_write: Option<DateTime<Utc>>,
    pub timestamps: Timestamps,
    pub attributes: EntryAttributes,
}

impl DirectorySnapshot {
    /// Nothing at all lives beneath the directory.
    pub fn is_empty(&self) -> bool {
        self.total_files == 0 && self.excluded_files == 0 && self.size == 0
    }

    pub fn temp_ratio(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        self.temp_files as f64 / self.total_files as f64
    }

    /// Most common extension and its share of all files.
    pub fn dominant_extension(&self) -> Option<(&str, f64)> {
        if self.total_files == 0 {
            return None;
        }

        self.extensions
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(extension, count)| {
                (extension.as_str(), *count as f64 / self.total_files as f64)
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub should_include: bool,
    pub confidence: f64,
    pub weight: u64,
    pub signals: Vec<String>,
}

impl CandidateScore {
    pub fn rejected(signal: &str) -> Self {
        Self {
            should_include: false,
            confidence: 0.0,
            weight: 0,
            signals: vec![signal.to_string()],
        }
    }
}

/// Running sum of signal deltas for one candidate.
#[derive(Debug, Default)]
struct ScoreSheet {
    raw: f64,
    positive: usize,
    signals: Vec<String>,
}

impl ScoreSheet {
    /// Classification starting bonus. Not counted as a positive signal.
    fn base(&mut self, classification: Classification) {
        let delta = match classification {
            Classification::Temp => 0.35,
            Classification::Cache => 0.30,
            Classification::Logs => 0.20,
            Classification::Orphaned => 0.10,
            Classification::Downloads => 0.05,
            Classification::Other => return,
        };
        self.raw += delta;
        self.note(format!("{} location", classification));
    }

    fn add(&mut self, delta: f64, signal: impl Into<String>) {
        self.raw += delta;
        if delta > 0.0 {
            self.positive += 1;
        }
        self.note(signal);
    }

    fn note(&mut self, signal: impl Into<String>) {
        let signal = signal.into();
        if !self.signals.contains(&signal) {
            self.signals.push(signal);
        }
    }

    fn confidence(&self) -> f64 {
        confidence_from_raw(self.raw)
    }

    /// Shared age ladder for files and directories.
    fn age(&mut self, modified: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        let Some(modified) = modified else {
            self.add(0.08, "modification time unknown");
            return;
        };

        if modified > now {
            self.add(0.05, "modification time in the future");
            return;
        }

        let days = (now - modified).num_days();
        if days >= 365 {
            self.add(0.35, "unchanged for over a year");
        } else if days >= 120 {
            self.add(0.25, "unchanged for over 120 days");
        } else if days >= 30 {
            self.add(0.18, "unchanged for over 30 days");
        } else if days >= 7 {
            self.add(0.10, "unchanged for over a week");
        } else if days < 1 {
            self.add(-0.15, "modified within the last day");
        }
    }

    fn finish(self, should_include: bool, confidence: f64, size: u64, is_directory: bool) -> CandidateScore {
        CandidateScore {
            should_include,
            confidence,
            weight: ranking_weight(size, confidence, is_directory),
            signals: self.signals,
        }
    }
}

/// Clamp the raw sum and map it onto `[0, 1]` with a centered logistic
/// curve, which compresses extremes without flattening them.
pub fn confidence_from_raw(raw: f64) -> f64 {
    let raw = raw.clamp(0.0, RAW_SCORE_MAX);
    1.0 / (1.0 + (-LOGISTIC_STEEPNESS * (raw - LOGISTIC_CENTER)).exp())
}

pub fn ranking_weight(size: u64, confidence: f64, is_directory: bool) -> u64 {
    let size_f = size as f64;
    let boost = confidence * WEIGHT_CONFIDENCE_BOOST;
    let mut weight = size_f
        .max(size_f * (0.65 + confidence * 0.6))
        .max(size_f + boost);

    if is_directory && size == 0 && confidence >= EMPTY_DIRECTORY_MIN_CONFIDENCE {
        weight = weight.max(boost + EMPTY_DIRECTORY_WEIGHT_FLOOR);
    }

    weight.round() as u64
}

/// The scorer: a pure function of its inputs and the signature snapshot.
#[derive(Clone, Copy)]
pub struct Scorer<'a> {
    signatures: &'a SignatureSnapshot,
    gate: &'a PathSafetyGate,
}

impl<'a> Scorer<'a> {
    pub fn new(signatures: &'a SignatureSnapshot, gate: &'a PathSafetyGate) -> Self {
        Self { signatures, gate }
    }

    pub fn signatures(&self) -> &'a SignatureSnapshot {
        self.signatures
    }

    pub fn evaluate_file(
        &self,
        definition: &TargetDefinition,
        context: &FileContext,
        now: DateTime<Utc>,
    ) -> CandidateScore {
        if self.is_protected(&context.path, false) {
            return CandidateScore::rejected("protected system location");
        }
        file::evaluate(self.signatures, definition, context, now)
    }

    pub fn evaluate_directory(
        &self,
        definition: &TargetDefinition,
        snapshot: &DirectorySnapshot,
        now: DateTime<Utc>,
    ) -> CandidateScore {
        if self.is_protected(&snapshot.path, true) {
            return CandidateScore::rejected("protected system location");
        }
        directory::evaluate(self.signatures, definition, snapshot, now)
    }

    /// Whether an exclusive-open check is worth its cost for this file.
    pub fn should_check_active_lock(
        &self,
        definition: &TargetDefinition,
        context: &FileContext,
    ) -> bool {
        if is_crash_artifact(self.signatures, context) || context.size >= 32 * SIZE_1MB {
            return true;
        }

        if !context.recently_modified {
            return false;
        }

        let is_log = self.signatures.is_log_extension(&context.extension)
            || definition.classification == Classification::Logs;
        let is_temp = self.signatures.is_temporary_extension(&context.extension);

        is_log || (is_temp && context.size >= 4 * SIZE_1MB)
    }

    pub fn is_temporary_file(&self, context: &FileContext) -> bool {
        self.signatures.is_temporary_extension(&context.extension)
            || self.signatures.is_partial_download_extension(&context.extension)
            || context.name.starts_with("~$")
    }

    fn is_protected(&self, path: &Path, is_directory: bool) -> bool {
        self.gate
            .is_system_critical_entry(path, is_directory)
            .unwrap_or(false)
    }
}
