use chrono::{
    DateTime,
    Utc,
};

use super::{
    CandidateScore,
    FileContext,
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
    PathEx,
    TargetDefinition,
};

const NOISE_FILE_NAMES: &[&str] = &[
    "thumbs.db",
    "ehthumbs.db",
    "ehthumbs_vista.db",
    "iconcache.db",
    "desktop.ini.bak",
    ".ds_store",
];

const SETUP_LOG_NAMES: &[&str] = &["setupact.log", "setuperr.log"];
const SETUP_LOG_PREFIXES: &[&str] = &["msi", "dd_", "setup"];

pub(super) fn evaluate(
    signatures: &SignatureSnapshot,
    definition: &TargetDefinition,
    context: &FileContext,
    now: DateTime<Utc>,
) -> CandidateScore {
    if context.locked {
        return CandidateScore::rejected("active handle detected");
    }

    let name = context.name_lower();
    let mut sheet = ScoreSheet::default();
    sheet.base(definition.classification);

    if context.size >= SIZE_1GB {
        sheet.add(0.30, "larger than 1 GiB");
    } else if context.size >= 512 * SIZE_1MB {
        sheet.add(0.22, "larger than 512 MiB");
    } else if context.size >= 128 * SIZE_1MB {
        sheet.add(0.15, "larger than 128 MiB");
    }

    let extension = context.extension.as_str();
    let crash_extension = signatures.crash_extension_of(&name).is_some();
    let temporary = signatures.is_temporary_extension(extension);
    let partial = signatures.is_partial_download_extension(extension);
    if temporary {
        sheet.add(0.30, "temporary file extension");
    } else if crash_extension {
        sheet.add(0.25, "crash dump extension");
    } else if partial {
        sheet.add(0.22, "partial download");
    } else if signatures.is_log_extension(extension) {
        sheet.add(0.12, "log file extension");
    }

    name_signals(&mut sheet, signatures, context, &name);

    if context.attributes.hidden {
        sheet.add(0.05, "hidden");
    }
    if context.attributes.system {
        sheet.add(-0.60, "system file");
    }

    sheet.age(context.timestamps.modified, now);
    if context.recently_modified {
        sheet.add(-0.20, "recently written");
    }

    if let Some(accessed) = context.timestamps.accessed.filter(|accessed| *accessed <= now) {
        let days = (now - accessed).num_days();
        if days < 1 {
            sheet.add(-0.10, "accessed within the last day");
        } else if days < 7 {
            sheet.add(-0.05, "accessed within the last week");
        } else if days >= 180 {
            sheet.add(0.10, "not accessed for over 180 days");
        } else if days >= 60 {
            sheet.add(0.05, "not accessed for over 60 days");
        }
    }

    if let Some(created) = context.timestamps.created.filter(|created| *created <= now) {
        if (now - created).num_days() < 1 {
            sheet.add(-0.10, "created within the last day");
        }
    }

    let mut confidence = sheet.confidence();
    let mut include = match definition.classification {
        Classification::Orphaned => {
            confidence >= 0.35 || sheet.positive > 0 || temporary || partial || crash_extension
        }
        Classification::Logs => context.size > 4096 || confidence >= 0.25,
        _ => true,
    };

    if context.size >= FORCE_INCLUDE_SIZE {
        include = true;
        confidence = confidence.max(FORCE_INCLUDE_CONFIDENCE);
        sheet.note("large footprint");
    }

    log::trace!(
        "Scored {} ({}): include {}, confidence {:.3}",
        context.path.display(),
        definition.category,
        include,
        confidence
    );
    sheet.finish(include, confidence, context.size, false)
}

fn name_signals(
    sheet: &mut ScoreSheet,
    signatures: &SignatureSnapshot,
    context: &FileContext,
    name: &str,
) {
    if name.starts_with("~$") {
        sheet.add(0.25, "office lock file");
    }

    if NOISE_FILE_NAMES.contains(&name) {
        sheet.add(0.20, "thumbnail or icon cache");
    }

    if signatures.crash_file_names.contains(name) {
        sheet.add(0.25, "known crash file name");
    } else if signatures
        .crash_file_prefixes
        .iter()
        .any(|prefix| name.starts_with(prefix.as_str()))
    {
        sheet.add(0.20, "crash file name prefix");
    } else {
        let searchable = context.path.search_form();
        if signatures
            .crash_path_hints
            .iter()
            .any(|hint| searchable.contains(hint.as_str()))
        {
            sheet.add(0.15, "inside a crash report folder");
        }
    }

    if name.ends_with(".wer") {
        sheet.add(0.20, "error report");
    }

    if name == "memory.dmp" {
        sheet.add(0.20, "system memory dump");
    }

    let setup_log = SETUP_LOG_NAMES.contains(&name)
        || (name.ends_with(".log")
            && SETUP_LOG_PREFIXES
                .iter()
                .any(|prefix| name.starts_with(prefix)));
    if setup_log {
        sheet.add(0.12, "installer setup log");
    }
}

#[cfg(test)]
mod tests {
    use chrono::{
        Duration,
        TimeZone,
    };

    use super::*;
    use crate::{
        fs::EntryAttributes,
        score::{
            crash_product_key,
            is_crash_artifact,
        },
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn context(path: &str, size: u64, age_days: i64) -> FileContext {
        let mut context = FileContext::new(path, size);
        let stamp = now() - Duration::days(age_days);
        context.timestamps.modified = Some(stamp);
        context.timestamps.accessed = Some(stamp);
        context.timestamps.created = Some(stamp);
        context
    }

    fn score(classification: Classification, context: &FileContext) -> CandidateScore {
        let definition = TargetDefinition::new(classification, "test", "/scratch");
        evaluate(&SignatureSnapshot::default(), &definition, context, now())
    }

    #[test]
    fn locked_files_short_circuit() {
        let mut locked = context("/scratch/big.tmp", 900 * SIZE_1MB, 400);
        locked.locked = true;

        let score = score(Classification::Temp, &locked);
        assert!(!score.should_include);
        assert_eq!(score.confidence, 0.0);
        assert_eq!(score.weight, 0);
        assert_eq!(score.signals, vec!["active handle detected".to_string()]);
    }

    #[test]
    fn old_temp_files_are_confident() {
        let score = score(Classification::Temp, &context("/scratch/a.tmp", 4096, 200));
        assert!(score.should_include);
        assert!(score.confidence > 0.8);
        assert!(score.signals.iter().any(|s| s == "temporary file extension"));
    }

    #[test]
    fn confidence_never_drops_with_size() {
        let sizes = [
            0,
            SIZE_1MB,
            128 * SIZE_1MB,
            300 * SIZE_1MB,
            512 * SIZE_1MB,
            SIZE_1GB,
            8 * SIZE_1GB,
        ];

        let mut previous = 0.0;
        for size in sizes {
            let confidence = score(Classification::Cache, &context("/scratch/blob.bin", size, 3)).confidence;
            assert!(confidence >= previous, "size {} dropped confidence", size);
            previous = confidence;
        }
    }

    #[test]
    fn extension_classes_are_exclusive() {
        let temp = score(Classification::Other, &context("/scratch/x.tmp", 10, 3));
        let log = score(Classification::Other, &context("/scratch/x.log", 10, 3));
        assert!(temp.confidence > log.confidence);
        assert!(!temp.signals.iter().any(|s| s == "log file extension"));
    }

    #[test]
    fn system_files_are_heavily_penalized() {
        let plain = context("/scratch/x.tmp", 10, 40);
        let mut system = plain.clone();
        system.attributes = EntryAttributes {
            system: true,
            ..EntryAttributes::default()
        };

        assert!(score(Classification::Temp, &system).confidence < score(Classification::Temp, &plain).confidence - 0.3);
    }

    #[test]
    fn recent_activity_lowers_confidence() {
        let old = context("/scratch/cache.bin", 10, 90);
        let mut fresh = context("/scratch/cache.bin", 10, 0);
        fresh.recently_modified = true;

        assert!(score(Classification::Cache, &fresh).confidence < score(Classification::Cache, &old).confidence);
    }

    #[test]
    fn orphaned_requires_evidence() {
        let mut plain = context("/scratch/data.bin", 10, 2);
        plain.timestamps.accessed = Some(now());
        assert!(!score(Classification::Orphaned, &plain).should_include);

        let stray = context("/scratch/data.tmp", 10, 2);
        assert!(score(Classification::Orphaned, &stray).should_include);
    }

    #[test]
    fn tiny_fresh_logs_are_left_alone() {
        let mut tiny = context("/scratch/app.txt", 100, 0);
        tiny.recently_modified = true;
        assert!(!score(Classification::Logs, &tiny).should_include);

        let grown = context("/scratch/app.txt", 8192, 0);
        assert!(score(Classification::Logs, &grown).should_include);
    }

    #[test]
    fn large_files_are_force_included() {
        let mut big = context("/scratch/data.bin", 64 * SIZE_1MB, 0);
        big.recently_modified = true;
        big.attributes.system = true;

        let score = score(Classification::Orphaned, &big);
        assert!(score.should_include);
        assert!(score.confidence >= FORCE_INCLUDE_CONFIDENCE);
    }

    #[test]
    fn system_memory_dump_scenario() {
        let signatures = SignatureSnapshot::default();
        let dump = context("C:/Windows/MEMORY.DMP", 900 * SIZE_1MB, 1);

        assert!(is_crash_artifact(&signatures, &dump));
        assert_eq!(
            crash_product_key(&signatures, &dump.name).as_deref(),
            Some("system-memory")
        );

        let score = score(Classification::Orphaned, &dump);
        assert!(score.should_include);
        assert!(score.confidence > 0.6);
    }

    #[test]
    fn office_lock_files_are_recognized() {
        let score = score(Classification::Other, &context("/scratch/~$report.docx", 162, 10));
        assert!(score.signals.iter().any(|s| s == "office lock file"));
    }

    #[test]
    fn scoring_is_deterministic() {
        let context = context("/scratch/a.tmp", 4096, 12);
        assert_eq!(score(Classification::Temp, &context), score(Classification::Temp, &context));
    }
}
