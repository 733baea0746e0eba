//! Crash dump retention: keeps the newest few dumps of every product out of
//! any cleanup pass.

use std::{
    cmp::Ordering,
    collections::{
        BTreeMap,
        HashSet,
    },
    path::PathBuf,
};

use crate::{
    score::{
        crash_product_key,
        is_crash_artifact,
        most_recent_timestamp,
        FileContext,
        FALLBACK_PRODUCT_KEY,
    },
    signature::SignatureSnapshot,
};

pub struct CrashRetentionPolicy<'a> {
    signatures: &'a SignatureSnapshot,
}

impl<'a> CrashRetentionPolicy<'a> {
    pub fn new(signatures: &'a SignatureSnapshot) -> Self {
        Self { signatures }
    }

    pub fn retention_count(&self) -> usize {
        self.signatures.crash_dump_retention_count
    }

    /// Paths of the crash artifacts that have to survive. Candidates that
    /// are not crash artifacts are ignored.
    pub fn paths_to_protect<'c, I>(&self, candidates: I) -> HashSet<PathBuf>
    where
        I: IntoIterator<Item = &'c FileContext>,
    {
        let keep = self.retention_count();
        if keep == 0 {
            return HashSet::new();
        }

        let mut groups: BTreeMap<String, Vec<&FileContext>> = BTreeMap::new();
        for candidate in candidates {
            if !is_crash_artifact(self.signatures, candidate) {
                continue;
            }

            let key = crash_product_key(self.signatures, &candidate.name)
                .unwrap_or_else(|| FALLBACK_PRODUCT_KEY.to_string());
            groups.entry(key).or_default().push(candidate);
        }

        let mut protected = HashSet::new();
        for (key, mut members) in groups {
            members.sort_by(|a, b| newest_first(a, b));
            log::debug!(
                "Crash group {}: {} artifacts, keeping {}",
                key,
                members.len(),
                keep.min(members.len())
            );
            protected.extend(members.into_iter().take(keep).map(|member| member.path.clone()));
        }
        protected
    }
}

/// Newest first, unknown timestamps last, path as tie breaker.
fn newest_first(a: &FileContext, b: &FileContext) -> Ordering {
    match (most_recent_timestamp(a), most_recent_timestamp(b)) {
        (Some(a_time), Some(b_time)) => b_time.cmp(&a_time),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.path.cmp(&b.path))
}
