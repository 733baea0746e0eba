use std::path::PathBuf;

use clap::{
    ArgAction,
    Args as ClapArgs,
    Parser,
    Subcommand,
    ValueEnum,
};
use reclaim::{
    scan::DEFAULT_PREVIEW_COUNT,
    DeletionOptions,
    PreviewKind,
};

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq, Debug)]
pub enum ArgPreviewKind {
    Files,
    Directories,
    All,
}

impl From<ArgPreviewKind> for PreviewKind {
    fn from(value: ArgPreviewKind) -> Self {
        match value {
            ArgPreviewKind::Files => PreviewKind::Files,
            ArgPreviewKind::Directories => PreviewKind::Directories,
            ArgPreviewKind::All => PreviewKind::All,
        }
    }
}

/// Find and remove disk clutter in well known locations
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Raise the log level (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn default_log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan the target locations and print a ranked preview.
    Scan(ScanArgs),

    /// Scan, then delete the previewed candidates.
    Clean(CleanArgs),

    /// Tell whether a path is protected by the safety gate.
    CheckPath {
        path: PathBuf,
    },
}

#[derive(ClapArgs, Debug)]
pub struct TargetArgs {
    /// JSON file with the target definitions to inspect.
    #[arg(short, long)]
    pub targets: PathBuf,

    /// Maximum number of preview entries per target.
    #[arg(short, long, default_value_t = DEFAULT_PREVIEW_COUNT)]
    pub preview: usize,

    /// Which entries the preview may contain.
    #[arg(short, long, value_enum, default_value_t = ArgPreviewKind::All)]
    pub kind: ArgPreviewKind,

    /// Extra protected roots in addition to the built in ones.
    /// May be given multiple times.
    #[arg(long = "critical-root", verbatim_doc_comment)]
    pub critical_roots: Vec<String>,

    /// Print machine readable JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

#[derive(ClapArgs, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(ClapArgs, Debug)]
pub struct CleanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Only delete candidates scored at least this confident (0.0 - 1.0).
    #[arg(long, default_value_t = 0.0)]
    pub min_confidence: f64,

    /// Do not actually delete anything. Just list what would be removed.
    #[arg(short, long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

#[derive(ClapArgs, Debug)]
pub struct PolicyArgs {
    /// Move items to the recycle bin instead of deleting them.
    #[arg(long)]
    pub recycle_bin: bool,

    /// With --recycle-bin, fail instead of deleting permanently.
    #[arg(long)]
    pub no_permanent_fallback: bool,

    #[arg(long)]
    pub skip_hidden: bool,

    #[arg(long)]
    pub skip_system: bool,

    /// Skip items modified within the last --recent-hours.
    #[arg(long)]
    pub skip_recent: bool,

    #[arg(long, default_value_t = 24)]
    pub recent_hours: i64,

    #[arg(long, default_value_t = 2)]
    pub retries: u32,

    #[arg(long, default_value_t = 150)]
    pub retry_delay_ms: u64,

    /// Disable the path safety gate. Dangerous.
    #[arg(long)]
    pub allow_protected: bool,

    /// Never take ownership of access denied items.
    #[arg(long)]
    pub no_take_ownership: bool,

    /// Never schedule locked items for removal on reboot.
    #[arg(long)]
    pub no_reboot: bool,

    /// Give up on locked items instead of escalating.
    #[arg(long)]
    pub skip_locked: bool,
}

impl PolicyArgs {
    pub fn deletion_options(&self) -> DeletionOptions {
        DeletionOptions {
            skip_hidden: self.skip_hidden,
            skip_system: self.skip_system,
            skip_recent: self.skip_recent,
            recent_threshold: chrono::TimeDelta::hours(self.recent_hours),
            prefer_recycle_bin: self.recycle_bin,
            allow_permanent_fallback: !self.no_permanent_fallback,
            max_retry_count: self.retries,
            retry_delay: std::time::Duration::from_millis(self.retry_delay_ms),
            allow_protected_system_paths: self.allow_protected,
            take_ownership_on_access_denied: !self.no_take_ownership,
            allow_delete_on_reboot: !self.no_reboot,
            skip_locked_items: self.skip_locked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_library_defaults() {
        let args = Args::try_parse_from(["reclaim", "clean", "--targets", "t.json"]).unwrap();
        let Command::Clean(clean) = args.command else {
            panic!("expected clean");
        };
        assert_eq!(clean.policy.deletion_options(), DeletionOptions::default());
        assert_eq!(clean.target.preview, DEFAULT_PREVIEW_COUNT);
        assert!(!clean.dry_run);
    }

    #[test]
    fn parses_scan_flags() {
        let args = Args::try_parse_from([
            "reclaim", "-vv", "scan", "-t", "t.json", "--kind", "files", "--preview", "5",
            "--critical-root", "D:\\Data", "--json",
        ])
        .unwrap();
        assert_eq!(args.default_log_filter(), "debug");

        let Command::Scan(scan) = args.command else {
            panic!("expected scan");
        };
        assert_eq!(scan.target.kind, ArgPreviewKind::Files);
        assert_eq!(scan.target.preview, 5);
        assert_eq!(scan.target.critical_roots, vec!["D:\\Data".to_string()]);
        assert!(scan.target.json);
    }

    #[test]
    fn policy_flags_flip_the_options() {
        let args = Args::try_parse_from([
            "reclaim", "clean", "-t", "t.json", "--skip-locked", "--no-reboot", "--recycle-bin",
            "--retries", "0",
        ])
        .unwrap();
        let Command::Clean(clean) = args.command else {
            panic!("expected clean");
        };

        let options = clean.policy.deletion_options();
        assert!(options.skip_locked_items);
        assert!(!options.allow_delete_on_reboot);
        assert!(options.prefer_recycle_bin);
        assert_eq!(options.max_retry_count, 0);
    }
}
