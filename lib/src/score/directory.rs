use chrono::{
    DateTime,
    Utc,
};

use super::{
    CandidateScore,
    DirectorySnapshot,
    ScoreSheet,
    FORCE_INCLUDE_CONFIDENCE,
    FORCE_INCLUDE_SIZE,
};
use crate::{
    signature::SignatureSnapshot,
    utils::{
        SIZE_1GB,
        SIZE_1MB,
    },
    Classification,
    TargetDefinition,
};

const LOG_ONLY_MIN_FILES: u64 = 10;

pub(super) fn evaluate(
    signatures: &SignatureSnapshot,
    definition: &TargetDefinition,
    snapshot: &DirectorySnapshot,
    now: DateTime<Utc>,
) -> CandidateScore {
    let mut sheet = ScoreSheet::default();
    sheet.base(definition.classification);

    let empty = snapshot.is_empty();
    if empty {
        sheet.add(0.45, "empty directory");
    }

    if snapshot.total_files > 0 {
        let ratio = snapshot.temp_ratio();
        if ratio >= 0.95 {
            sheet.add(0.35, "nearly all files temporary");
        } else if ratio >= 0.75 {
            sheet.add(0.20, "mostly temporary files");
        }

        if snapshot.recent_files == 0 {
            sheet.add(0.10, "no recently touched files");
        }

        if snapshot.hidden_files == snapshot.total_files {
            sheet.add(0.08, "all files hidden");
        }

        if let Some((extension, share)) = snapshot.dominant_extension() {
            if snapshot.total_files >= LOG_ONLY_MIN_FILES
                && share >= 0.9
                && signatures.is_log_extension(extension)
            {
                sheet.add(0.05, "log files only");
            }
        }
    }

    if snapshot.attributes.hidden {
        sheet.add(0.05, "hidden");
    }
    if snapshot.attributes.system {
        sheet.add(-0.60, "system directory");
    }
    if snapshot.system_files > 0 {
        sheet.add(-0.20, "contains system files");
    }
    if snapshot.excluded_files > 0 {
        sheet.add(
            -0.30,
            format!("{} locked or retained files inside", snapshot.excluded_files),
        );
    }

    if snapshot.size >= SIZE_1GB {
        sheet.add(0.25, "larger than 1 GiB");
    } else if snapshot.size >= 256 * SIZE_1MB {
        sheet.add(0.15, "larger than 256 MiB");
    } else if snapshot.size >= 64 * SIZE_1MB {
        sheet.add(0.08, "larger than 64 MiB");
    }

    sheet.age(snapshot.last_write, now);

    let mut confidence = sheet.confidence();
    let has_content = snapshot.total_files > 0 || snapshot.size > 0;
    let mut include = snapshot.excluded_files == 0 && (has_content || empty);
    if definition.classification == Classification::Orphaned {
        include &= confidence >= 0.25 || snapshot.temp_files > 0 || empty;
    }

    /* excluded files pin the directory regardless of its size */
    if snapshot.excluded_files == 0 && snapshot.size >= FORCE_INCLUDE_SIZE {
        include = true;
        confidence = confidence.max(FORCE_INCLUDE_CONFIDENCE);
        sheet.note("large footprint");
    }

    log::trace!(
        "Scored directory {} ({}): include {}, confidence {:.3}",
        snapshot.path.display(),
        definition.category,
        include,
        confidence
    );
    sheet.finish(include, confidence, snapshot.size, true)
}

#[cfg(test)]
mod tests {
    use chrono::{
        Duration,
        TimeZone,
    };

    use super::*;
    use crate::score::ranking_weight;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn score(classification: Classification, snapshot: &DirectorySnapshot) -> CandidateScore {
        let definition = TargetDefinition::new(classification, "test", "/scratch");
        evaluate(&SignatureSnapshot::default(), &definition, snapshot, now())
    }

    fn temp_directory() -> DirectorySnapshot {
        let mut snapshot = DirectorySnapshot {
            name: "build-cache".to_string(),
            path: "/scratch/build-cache".into(),
            size: 2 * SIZE_1GB,
            total_files: 1900,
            temp_files: 1900,
            last_write: Some(now() - Duration::days(40)),
            ..DirectorySnapshot::default()
        };
        snapshot.extensions.insert(".tmp".to_string(), 1900);
        snapshot
    }

    fn mixed_directory() -> DirectorySnapshot {
        let mut snapshot = DirectorySnapshot {
            name: "mixed".to_string(),
            path: "/scratch/mixed".into(),
            size: 50 * SIZE_1MB,
            total_files: 40,
            temp_files: 5,
            recent_files: 12,
            last_write: Some(now() - Duration::hours(2)),
            ..DirectorySnapshot::default()
        };
        snapshot.extensions.insert(".tmp".to_string(), 5);
        snapshot.extensions.insert(".dat".to_string(), 35);
        snapshot
    }

    #[test]
    fn large_stale_temp_directory_scenario() {
        let temp = score(Classification::Temp, &temp_directory());
        let mixed = score(Classification::Temp, &mixed_directory());

        assert!(temp.should_include);
        assert!(temp.confidence > 0.6);
        assert!(temp.weight > mixed.weight);
        assert!(temp.confidence > mixed.confidence);
    }

    #[test]
    fn empty_directories_are_confident_and_ranked() {
        let empty = DirectorySnapshot {
            name: "stale".to_string(),
            path: "/scratch/stale".into(),
            last_write: Some(now() - Duration::days(100)),
            ..DirectorySnapshot::default()
        };

        let score = score(Classification::Orphaned, &empty);
        assert!(score.should_include);
        assert!(score.confidence >= 0.4);
        assert_eq!(score.weight, ranking_weight(0, score.confidence, true));
        assert!(score.weight > 5_000_000);
    }

    #[test]
    fn excluded_files_pin_the_directory() {
        let mut snapshot = temp_directory();
        snapshot.excluded_files = 1;

        let score = score(Classification::Temp, &snapshot);
        assert!(!score.should_include);
        assert!(score.signals.iter().any(|s| s.contains("locked or retained")));
    }

    #[test]
    fn orphaned_directories_need_evidence() {
        let snapshot = DirectorySnapshot {
            name: "leftover".to_string(),
            path: "/scratch/leftover".into(),
            size: 4096,
            total_files: 3,
            recent_files: 3,
            last_write: Some(now() - Duration::hours(1)),
            ..DirectorySnapshot::default()
        };
        assert!(!score(Classification::Orphaned, &snapshot).should_include);

        let with_temp = DirectorySnapshot {
            temp_files: 1,
            ..snapshot
        };
        assert!(score(Classification::Orphaned, &with_temp).should_include);
    }

    #[test]
    fn log_only_directories_get_a_bonus() {
        let mut snapshot = DirectorySnapshot {
            name: "logs".to_string(),
            path: "/scratch/logs".into(),
            size: SIZE_1MB,
            total_files: 20,
            last_write: Some(now() - Duration::days(10)),
            ..DirectorySnapshot::default()
        };
        snapshot.extensions.insert(".log".to_string(), 20);

        let score = score(Classification::Logs, &snapshot);
        assert!(score.signals.iter().any(|s| s == "log files only"));
    }
}
