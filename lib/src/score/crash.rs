use chrono::{
    DateTime,
    Utc,
};

use super::FileContext;
use crate::{
    signature::SignatureSnapshot,
    PathEx,
};

/// Group for crash artifacts whose name yields no product key.
pub const FALLBACK_PRODUCT_KEY: &str = "__fallback";

const SYSTEM_MEMORY_DUMP: &str = "memory.dmp";
const SYSTEM_MEMORY_KEY: &str = "system-memory";

const KEY_SEPARATORS: &[char] = &['.', '_', '-', ' ', '(', ')', '[', ']', '{', '}'];

/// Name segments that say "this is a dump" rather than which product crashed.
const BOILERPLATE_SEGMENTS: &[&str] = &[
    "crash",
    "crashdump",
    "crashreport",
    "dump",
    "minidump",
    "mini",
    "full",
    "report",
    "wer",
    "exe",
    "dll",
    "appcrash",
    "error",
    "core",
    "triage",
    "heap",
    "kernel",
    "critical",
    "noncritical",
];

/// Recognized by extension, exact or prefixed file name, the `.wer`
/// suffix or a crash folder somewhere in the path.
pub fn is_crash_artifact(signatures: &SignatureSnapshot, context: &FileContext) -> bool {
    let name = context.name_lower();
    if signatures.crash_extension_of(&name).is_some()
        || signatures.crash_file_names.contains(&name)
        || name.ends_with(".wer")
    {
        return true;
    }

    if signatures
        .crash_file_prefixes
        .iter()
        .any(|prefix| name.starts_with(prefix.as_str()))
    {
        return true;
    }

    let searchable = context.path.search_form();
    signatures
        .crash_path_hints
        .iter()
        .any(|hint| searchable.contains(hint.as_str()))
}

/// Key that groups dumps of the same product, e.g. `chrome.exe.12345.dmp`
/// and `chrome.exe.998.dmp` both map to `chrome`. `None` when the name
/// carries nothing but an extension.
pub fn crash_product_key(signatures: &SignatureSnapshot, file_name: &str) -> Option<String> {
    let name = file_name.trim().to_lowercase();
    if name == SYSTEM_MEMORY_DUMP {
        return Some(SYSTEM_MEMORY_KEY.to_string());
    }

    let stem = match signatures.crash_extension_of(&name) {
        Some(extension) => &name[..name.len() - extension.len()],
        None => match name.rfind('.') {
            Some(index) if index > 0 => &name[..index],
            _ => name.as_str(),
        },
    };
    let stem = stem.trim_matches(KEY_SEPARATORS);
    if stem.is_empty() {
        return None;
    }

    let segments = stem
        .split(KEY_SEPARATORS)
        .filter(|segment| !segment.is_empty() && !is_noise_segment(segment))
        .collect::<Vec<_>>();
    if !segments.is_empty() {
        return Some(segments.join("-"));
    }

    Some(collapse_digits(stem))
}

/// Newest of the three timestamps, the ordering key for retention.
pub fn most_recent_timestamp(context: &FileContext) -> Option<DateTime<Utc>> {
    context.timestamps.most_recent()
}

fn is_noise_segment(segment: &str) -> bool {
    if segment.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    /* "mini070124", "crash2" */
    let word = segment.trim_end_matches(|c: char| c.is_ascii_digit());
    if BOILERPLATE_SEGMENTS.contains(&word) {
        return true;
    }

    /* process ids in hex, guid parts */
    segment.len() >= 4
        && segment.chars().all(|c| c.is_ascii_hexdigit())
        && segment.chars().any(|c| c.is_ascii_digit())
}

fn collapse_digits(value: &str) -> String {
    let mut collapsed = String::with_capacity(value.len());
    let mut in_digits = false;
    for c in value.chars() {
        if c.is_ascii_digit() {
            if !in_digits {
                collapsed.push('#');
            }
            in_digits = true;
        } else {
            collapsed.push(c);
            in_digits = false;
        }
    }
    collapsed
}
