//! Mirror status and human-readable report printing.
//!
//! Status lists every collection that is configured or has a stored
//! watermark, with its destination row count, plus the most recent runs.

use colored::{ColoredString, Colorize};
use serde::Serialize;

use super::probe::ProbeReport;
use super::types::{RunRecord, SyncOutcome, SyncReport};
use crate::config::MirrorConfig;
use crate::error::Result;
use crate::storage::SqliteStorage;
use crate::validate::default_table_name;

/// Number of runs shown by default.
pub const DEFAULT_RECENT_RUNS: usize = 10;

/// State of one collection in the local mirror.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatus {
    pub id: String,
    pub table: String,
    /// Present in the config file.
    pub configured: bool,
    /// `None` until the first commit creates the table.
    pub rows: Option<usize>,
    pub last_modified_remote: Option<String>,
    pub last_run_utc: Option<String>,
}

/// Everything `status` reports.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub db_path: String,
    pub collections: Vec<CollectionStatus>,
    pub recent_runs: Vec<RunRecord>,
}

/// Collect status from the store and config.
///
/// # Errors
///
/// Returns an error if a database query fails.
pub fn get_status(
    storage: &SqliteStorage,
    config: &MirrorConfig,
    db_path: &str,
    recent_runs: usize,
) -> Result<StatusReport> {
    let watermarks = storage.list_watermarks()?;

    let mut collections = Vec::new();
    for collection in &config.collections {
        let table = collection.table_name();
        let watermark = watermarks.iter().find(|w| w.collection_id == collection.id);
        collections.push(CollectionStatus {
            id: collection.id.clone(),
            rows: storage.count_rows(&table).unwrap_or(None),
            table,
            configured: true,
            last_modified_remote: watermark.and_then(|w| w.last_modified_remote.clone()),
            last_run_utc: watermark.map(|w| w.last_run_utc.clone()),
        });
    }

    // Watermarks left behind by collections removed from the config
    for watermark in &watermarks {
        if collections.iter().any(|c| c.id == watermark.collection_id) {
            continue;
        }
        let table = default_table_name(&watermark.collection_id);
        collections.push(CollectionStatus {
            id: watermark.collection_id.clone(),
            rows: storage.count_rows(&table).unwrap_or(None),
            table,
            configured: false,
            last_modified_remote: watermark.last_modified_remote.clone(),
            last_run_utc: Some(watermark.last_run_utc.clone()),
        });
    }

    Ok(StatusReport {
        db_path: db_path.to_string(),
        collections,
        recent_runs: storage.list_runs(None, recent_runs)?,
    })
}

/// Print status to stdout.
pub fn print_status(status: &StatusReport) {
    println!("{}", "Mirror Status".bold().underline());
    println!("  Database: {}", status.db_path.dimmed());
    println!();

    if status.collections.is_empty() {
        println!("{}", "No collections configured.".dimmed());
        println!("{}", "Add collections to the config file, then run 'mm sync'.".dimmed());
        return;
    }

    println!("{}", "Collections:".blue().bold());
    for c in &status.collections {
        let rows = c.rows.map_or_else(|| "no table".to_string(), |n| format!("{n} rows"));
        let marker = if c.configured { "" } else { " (not configured)" };
        println!("  {}{} → {} ({})", c.id.bold(), marker.yellow(), c.table, rows);
        match (&c.last_modified_remote, &c.last_run_utc) {
            (Some(wm), Some(run)) => println!("    watermark {wm}, last run {run}"),
            (None, Some(run)) => println!("    {} last run {run}", "no watermark,".dimmed()),
            _ => println!("    {}", "never synced".dimmed()),
        }
    }

    if !status.recent_runs.is_empty() {
        println!();
        println!("{}", "Recent Runs:".blue().bold());
        for run in &status.recent_runs {
            println!(
                "  {} {} {} {} +{} ~{} ={}{}",
                run.started_at.dimmed(),
                status_label(&run.status),
                run.collection,
                run.strategy.dimmed(),
                run.inserted,
                run.updated,
                run.unchanged,
                run.error
                    .as_deref()
                    .map(|e| format!(" ({})", e.red()))
                    .unwrap_or_default()
            );
        }
    }
}

/// Print one collection's sync report to stdout.
pub fn print_sync_report(report: &SyncReport) {
    println!(
        "{} {} → {}",
        outcome_label(report.outcome),
        report.collection.bold(),
        report.table
    );
    match &report.downgrade_reason {
        Some(reason) => println!("  strategy: {} ({})", report.strategy, reason.dimmed()),
        None => println!("  strategy: {}", report.strategy),
    }
    if let Some(scheme) = report.scheme {
        println!("  pagination: {scheme}, {}", pluralize(report.pages, "page", "pages"));
    }
    println!(
        "  items: {} processed, {} inserted, {} updated, {} unchanged",
        report.processed, report.stats.inserted, report.stats.updated, report.stats.unchanged
    );
    if report.skipped > 0 || report.duplicates > 0 {
        println!(
            "  {}",
            format!("{} skipped, {} duplicates", report.skipped, report.duplicates).yellow()
        );
    }
    println!(
        "  watermark: {} → {}",
        report.watermark_before.as_deref().unwrap_or("-"),
        report.watermark_after.as_deref().unwrap_or("-")
    );
    for warning in &report.warnings {
        println!("  {} {warning}", "warning:".yellow());
    }
    if let Some(error) = &report.error {
        println!("  {} {error}", "error:".red().bold());
    }
}

/// Print a probe report to stdout.
pub fn print_probe_report(report: &ProbeReport) {
    println!("{} {}", "Probe".bold().underline(), report.collection.bold());
    println!("  request: {}", report.request.dimmed());
    match report.scheme {
        Some(scheme) => println!("  pagination: {scheme}"),
        None => println!(
            "  pagination: {}",
            "unknown (page met the limit without a continuation marker)".yellow()
        ),
    }
    println!(
        "  items: {} of limit {}{}",
        report.item_count,
        report.limit,
        if report.limit_met { " (limit met)" } else { "" }
    );
    if report.skipped > 0 {
        println!("  {}", format!("{} items without identifier", report.skipped).yellow());
    }
    if !report.sample_ids.is_empty() {
        println!("  sample ids: {}", report.sample_ids.join(", "));
    }
    if !report.sample_timestamps.is_empty() {
        println!("  sample timestamps: {}", report.sample_timestamps.join(", "));
    }

    if !report.capabilities.is_empty() {
        println!();
        println!("{}", "Since filters:".blue().bold());
        for check in &report.capabilities {
            let mark = if check.honored { "✓".green() } else { "✗".red() };
            println!("  {mark} {} {}", check.param, check.detail.dimmed());
        }
    }
    if let (Some(strategy), Some(suggestion)) = (report.suggested_strategy, &report.suggestion) {
        println!();
        println!("  suggested: {} ({})", strategy.to_string().bold(), suggestion);
    }
}

fn outcome_label(outcome: SyncOutcome) -> ColoredString {
    let text = format!("[{outcome}]");
    match outcome {
        SyncOutcome::Success => text.green().bold(),
        SyncOutcome::NoChanges => text.normal(),
        SyncOutcome::Truncated => text.yellow().bold(),
        SyncOutcome::Failed => text.red().bold(),
    }
}

fn status_label(status: &str) -> ColoredString {
    match status {
        "success" => status.green(),
        "truncated" => status.yellow(),
        "failed" => status.red(),
        other => other.normal(),
    }
}

fn pluralize(n: usize, one: &str, many: &str) -> String {
    if n == 1 { format!("{n} {one}") } else { format!("{n} {many}") }
}
