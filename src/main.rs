use std::{
    path::Path,
    time::Instant,
};

use clap::Parser;
use reclaim::{
    delete::{
        DeletionProgress,
        DeletionProgressConsumer,
    },
    scan::{
        ScanProgress,
        ScanProgressConsumer,
    },
    utils::format_file_size,
    CancellationToken,
    DeletionEngine,
    PathSafetyGate,
    PreviewItem,
    Report,
    ScanOptions,
    Scanner,
};

use crate::{
    args::{
        Args,
        CleanArgs,
        Command,
        TargetArgs,
    },
    utils::{
        display_path,
        format_duration,
        load_definitions,
    },
};

mod args;
mod utils;

struct LogScanProgress;
impl ScanProgressConsumer for LogScanProgress {
    fn consume_progress(&self, progress: ScanProgress) {
        log::info!(
            "[{}/{}] {} ({} items, {})",
            progress.completed,
            progress.total,
            progress.current_label,
            progress.items_so_far,
            format_file_size(progress.bytes_so_far)
        );
    }
}

struct LogDeletionProgress;
impl DeletionProgressConsumer for LogDeletionProgress {
    fn consume_progress(&self, progress: DeletionProgress) {
        if progress.completed < progress.total {
            log::debug!(
                "[{}/{}] {}",
                progress.completed + 1,
                progress.total,
                progress.current_path.display()
            );
        }
    }
}

fn run_scan(target: &TargetArgs, cancellation: &CancellationToken) -> anyhow::Result<Report> {
    let definitions = load_definitions(&target.targets)?;

    let gate = PathSafetyGate::global();
    if !target.critical_roots.is_empty() {
        gate.set_additional_critical_roots(&target.critical_roots);
    }

    let options = ScanOptions {
        preview_count: target.preview,
        preview_kind: target.kind.into(),
        cancellation: cancellation.clone(),
        progress_consumer: Box::new(LogScanProgress),
    };

    let started = Instant::now();
    let report = Scanner::from_global().scan(&definitions, &options)?;
    log::info!("Scan finished in {}", format_duration(&started.elapsed()));
    Ok(report)
}

fn print_item(item: &PreviewItem) {
    let kind = if item.is_directory() { "dir " } else { "file" };
    println!(
        "    {} {:>12}  {:>5.2}  {}",
        kind,
        format_file_size(item.size),
        item.confidence,
        display_path(&item.path).display()
    );
    if !item.signals.is_empty() {
        println!("                               {}", item.signals.join(", "));
    }
}

fn print_report(report: &Report) {
    for target in &report.targets {
        let location = match &target.resolved_path {
            Some(path) => display_path(path).display().to_string(),
            None => "<unresolved>".to_string(),
        };
        println!(
            "[{}] {} - {}: {} items, {}",
            target.classification,
            target.category,
            location,
            target.item_count,
            format_file_size(target.total_size)
        );
        if !target.exists {
            println!("    not present");
        }
        for warning in &target.warnings {
            println!("    warning: {}", warning);
        }
        for item in &target.preview {
            print_item(item);
        }
    }

    println!(
        "Total: {} items, {} ({} previewed)",
        report.total_items(),
        format_file_size(report.total_size()),
        format_file_size(report.preview_size())
    );
}

fn scan(target: &TargetArgs) -> anyhow::Result<()> {
    let report = run_scan(target, &CancellationToken::new())?;
    if target.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn clean(args: &CleanArgs) -> anyhow::Result<()> {
    let cancellation = CancellationToken::new();
    let report = run_scan(&args.target, &cancellation)?;

    let selected = report
        .preview_items()
        .filter(|item| item.confidence >= args.min_confidence)
        .cloned()
        .collect::<Vec<_>>();

    if args.dry_run {
        if args.target.json {
            println!("{}", serde_json::to_string_pretty(&selected)?);
            return Ok(());
        }

        for item in &selected {
            print_item(item);
        }
        println!(
            "Would delete {} items ({})",
            selected.len(),
            format_file_size(selected.iter().map(|item| item.size).sum())
        );
        return Ok(());
    }

    let options = args.policy.deletion_options();
    if options.allow_protected_system_paths {
        log::warn!("Path safety gate disabled for this run");
    }

    let started = Instant::now();
    let result = DeletionEngine::from_global().delete(
        &selected,
        &options,
        &cancellation,
        &LogDeletionProgress,
    );
    log::info!("Deletion finished in {}", format_duration(&started.elapsed()));

    if args.target.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", result.status_message());
    for line in result.display_errors() {
        println!("    {}", line);
    }
    Ok(())
}

fn check_path(path: &Path) -> anyhow::Result<()> {
    let raw = dunce::simplified(path).to_string_lossy().into_owned();
    let verdict = PathSafetyGate::global().assess_entry(&raw, path.is_dir())?;
    let state = if verdict.is_critical() {
        "protected"
    } else {
        "not protected"
    };
    println!("{}: {} ({})", raw, state, verdict);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(args.default_log_filter()),
    )
    .init();

    match &args.command {
        Command::Scan(scan_args) => scan(&scan_args.target),
        Command::Clean(clean_args) => clean(clean_args),
        Command::CheckPath { path } => check_path(path),
    }
}
