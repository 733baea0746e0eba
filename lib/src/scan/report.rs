use std::{
    cmp::Ordering,
    path::PathBuf,
};

use chrono::{
    DateTime,
    Utc,
};
use serde::Serialize;

use crate::{
    score::{
        CandidateScore,
        DirectorySnapshot,
        FileContext,
    },
    Classification,
    TargetDefinition,
};

/// Confidence is worth this many bytes when ordering the merged preview.
const CONFIDENCE_ORDER_BYTES: f64 = 25_000_000.0;

/// Which candidate shapes a scan puts into the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewKind {
    Files,
    Directories,
    #[default]
    All,
}

impl PreviewKind {
    pub fn includes_files(&self) -> bool {
        matches!(self, Self::Files | Self::All)
    }

    pub fn includes_directories(&self) -> bool {
        matches!(self, Self::Directories | Self::All)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PreviewEntryKind {
    File { extension: String },
    Directory { file_count: u64 },
}

/// A candidate as the caller sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewItem {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub kind: PreviewEntryKind,
    pub hidden: bool,
    pub system: bool,
    pub confidence: f64,
    pub signals: Vec<String>,
}

impl PreviewItem {
    pub fn from_file(context: &FileContext, score: CandidateScore) -> Self {
        Self {
            name: context.name.clone(),
            path: context.path.clone(),
            size: context.size,
            modified: context.timestamps.modified,
            accessed: context.timestamps.accessed,
            created: context.timestamps.created,
            kind: PreviewEntryKind::File {
                extension: context.extension.clone(),
            },
            hidden: context.attributes.hidden,
            system: context.attributes.system,
            confidence: score.confidence,
            signals: score.signals,
        }
    }

    pub fn from_directory(snapshot: &DirectorySnapshot, score: CandidateScore) -> Self {
        Self {
            name: snapshot.name.clone(),
            path: snapshot.path.clone(),
            size: snapshot.size,
            modified: snapshot.last_write,
            accessed: snapshot.timestamps.accessed,
            created: snapshot.timestamps.created,
            kind: PreviewEntryKind::Directory {
                file_count: snapshot.total_files,
            },
            hidden: snapshot.attributes.hidden,
            system: snapshot.attributes.system,
            confidence: score.confidence,
            signals: score.signals,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, PreviewEntryKind::Directory { .. })
    }

    fn order_key(&self) -> f64 {
        self.size as f64 + self.confidence * CONFIDENCE_ORDER_BYTES
    }

    /// Merged preview order: size plus weighted confidence, then
    /// confidence, then size, then path. Greatest first.
    pub fn preview_order(a: &Self, b: &Self) -> Ordering {
        b.order_key()
            .total_cmp(&a.order_key())
            .then_with(|| b.confidence.total_cmp(&a.confidence))
            .then_with(|| b.size.cmp(&a.size))
            .then_with(|| a.path.cmp(&b.path))
    }
}

/// Result of scanning one target definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetReport {
    pub category: String,
    pub classification: Classification,
    pub resolved_path: Option<PathBuf>,
    pub exists: bool,
    pub item_count: u64,
    pub total_size: u64,
    pub preview: Vec<PreviewItem>,
    pub notes: String,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl TargetReport {
    pub fn new(definition: &TargetDefinition) -> Self {
        Self {
            category: definition.category.clone(),
            classification: definition.classification,
            resolved_path: None,
            exists: false,
            item_count: 0,
            total_size: 0,
            preview: Vec::new(),
            notes: definition.notes.clone(),
            warnings: Vec::new(),
            error: None,
        }
    }

    /// Degrade to the error state: nothing counted, nothing previewed.
    pub fn fail(&mut self, message: String) {
        self.item_count = 0;
        self.total_size = 0;
        self.preview.clear();
        self.warnings.push(message.clone());
        self.error = Some(message);
    }

    pub fn preview_size(&self) -> u64 {
        self.preview.iter().map(|item| item.size).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub targets: Vec<TargetReport>,
}

impl Report {
    /// Orders the targets by classification, then by descending size.
    pub fn new(mut targets: Vec<TargetReport>) -> Self {
        targets.sort_by(|a, b| {
            a.classification
                .cmp(&b.classification)
                .then_with(|| b.total_size.cmp(&a.total_size))
                .then_with(|| a.category.cmp(&b.category))
        });
        Self { targets }
    }

    pub fn total_size(&self) -> u64 {
        self.targets.iter().map(|target| target.total_size).sum()
    }

    pub fn total_items(&self) -> u64 {
        self.targets.iter().map(|target| target.item_count).sum()
    }

    pub fn preview_size(&self) -> u64 {
        self.targets.iter().map(TargetReport::preview_size).sum()
    }

    pub fn preview_items(&self) -> impl Iterator<Item = &PreviewItem> {
        self.targets.iter().flat_map(|target| target.preview.iter())
    }
}
