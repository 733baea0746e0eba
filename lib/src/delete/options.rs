use std::time::Duration;

use chrono::TimeDelta;

pub const DEFAULT_MAX_RETRY_COUNT: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(150);
pub const DEFAULT_RECENT_THRESHOLD_HOURS: i64 = 24;

/// Deletion policy. The defaults are the safe ones: permanent removal,
/// protected paths untouchable, no item filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionOptions {
    pub skip_hidden: bool,
    pub skip_system: bool,
    pub skip_recent: bool,
    /// Items modified within this window count as recent.
    pub recent_threshold: TimeDelta,

    pub prefer_recycle_bin: bool,
    pub allow_permanent_fallback: bool,

    pub max_retry_count: u32,
    pub retry_delay: Duration,

    /// Disables the path safety gate. Never set this for unattended runs.
    pub allow_protected_system_paths: bool,
    pub take_ownership_on_access_denied: bool,
    pub allow_delete_on_reboot: bool,
    /// Give up on locked items instead of escalating.
    pub skip_locked_items: bool,
}

impl Default for DeletionOptions {
    fn default() -> Self {
        Self {
            skip_hidden: false,
            skip_system: false,
            skip_recent: false,
            recent_threshold: TimeDelta::hours(DEFAULT_RECENT_THRESHOLD_HOURS),

            prefer_recycle_bin: false,
            allow_permanent_fallback: true,

            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            retry_delay: DEFAULT_RETRY_DELAY,

            allow_protected_system_paths: false,
            take_ownership_on_access_denied: true,
            allow_delete_on_reboot: true,
            skip_locked_items: false,
        }
    }
}
