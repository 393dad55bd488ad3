//! Per-collection sync state machine.
//!
//! resolve strategy → build request → drive fetch → commit batch →
//! advance watermark. The watermark only moves after the batch has been
//! committed and the fetch proved the collection exhausted.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{error, info, warn};

use super::item::{MirrorItem, format_timestamp, parse_timestamp_str};
use super::store::{RunLog, UpsertSink, WatermarkStore};
use super::types::{
    RunRecord, SyncDefaults, SyncError, SyncOutcome, SyncReport, SyncResult, SyncStrategy,
    Watermark,
};
use crate::config::{CollectionConfig, RemoteSettings};
use crate::fetch::{FetchEnd, FetchPolicy, Fetcher};
use crate::remote::{RequestDescriptor, Transport, entries_endpoint};
use crate::validate::validate_table_name;

/// Per-invocation overrides from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Force the unfiltered path regardless of config.
    pub force_full: bool,
    /// Page size overriding collection and default limits.
    pub limit: Option<usize>,
}

/// Decide the strategy for one run.
///
/// `Incremental` needs a parseable prior watermark and a since-filter
/// capability; otherwise the run is downgraded to `Full` and the reason is
/// returned.
#[must_use]
pub fn resolve_strategy(
    requested: SyncStrategy,
    collection: &CollectionConfig,
    prior: Option<&Watermark>,
) -> (SyncStrategy, Option<String>) {
    if requested == SyncStrategy::Full {
        return (SyncStrategy::Full, None);
    }
    match prior.and_then(|w| w.last_modified_remote.as_deref()) {
        None => (SyncStrategy::Full, Some("no prior watermark".to_string())),
        Some(text) if parse_timestamp_str(text).is_none() => (
            SyncStrategy::Full,
            Some(format!("stored watermark {text:?} is not a timestamp")),
        ),
        Some(_) if collection.since_filter().is_none() => (
            SyncStrategy::Full,
            Some("collection declares no since-filter capability".to_string()),
        ),
        Some(_) => (SyncStrategy::Incremental, None),
    }
}

/// Unfiltered first-page request for a library's entries.
#[must_use]
pub fn entries_request(
    api_url: &str,
    token: Option<&str>,
    library_id: &str,
    limit: usize,
    include_fields: bool,
) -> RequestDescriptor {
    let mut request = RequestDescriptor::new(entries_endpoint(api_url, library_id));
    if let Some(token) = token {
        request.set_param("token", token);
    }
    request.set_param("limit", limit.to_string());
    if include_fields {
        request.set_param("include", "fields");
    }
    request
}

/// Drives syncs for configured collections against one store.
pub struct SyncController<'s, T, S> {
    transport: T,
    store: &'s mut S,
    api_url: String,
    token: Option<String>,
    defaults: SyncDefaults,
}

impl<'s, T, S> SyncController<'s, T, S>
where
    T: Transport,
    S: UpsertSink + WatermarkStore + RunLog,
{
    pub fn new(transport: T, store: &'s mut S, remote: &RemoteSettings, defaults: SyncDefaults) -> Self {
        Self {
            transport,
            store,
            api_url: remote.api_url.clone(),
            token: remote.token.clone(),
            defaults,
        }
    }

    /// Page size for a collection.
    fn limit_for(&self, collection: &CollectionConfig, options: SyncOptions) -> usize {
        options
            .limit
            .or(collection.limit)
            .unwrap_or(self.defaults.limit)
            .max(1)
    }

    /// First-page request for a collection.
    ///
    /// `since` is the stored watermark; it is only sent for incremental runs,
    /// shifted back by the configured overlap.
    #[must_use]
    pub fn build_request(
        &self,
        collection: &CollectionConfig,
        strategy: SyncStrategy,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> RequestDescriptor {
        let mut request = entries_request(
            &self.api_url,
            self.token.as_deref(),
            &collection.id,
            limit,
            self.defaults.include_fields,
        );
        if strategy == SyncStrategy::Incremental {
            if let (Some(param), Some(since)) = (collection.since_filter(), since) {
                let overlap = TimeDelta::from_std(self.defaults.watermark_overlap).unwrap_or(TimeDelta::zero());
                let since = since.checked_sub_signed(overlap).unwrap_or(since);
                request.set_param(param, format_timestamp(since));
            }
        }
        request
    }

    /// Sync every collection in order, each isolated from the others.
    pub fn sync_all(&mut self, collections: &[CollectionConfig], options: SyncOptions) -> Vec<SyncReport> {
        collections
            .iter()
            .map(|collection| self.sync_collection(collection, options))
            .collect()
    }

    /// Sync one collection. Failures are reported, never returned.
    pub fn sync_collection(&mut self, collection: &CollectionConfig, options: SyncOptions) -> SyncReport {
        let requested = if options.force_full {
            SyncStrategy::Full
        } else {
            collection.sync.unwrap_or(self.defaults.sync)
        };
        let mut report = SyncReport::start(
            &collection.id,
            &collection.table_name(),
            requested,
            format_timestamp(Utc::now()),
        );

        if let Err(e) = self.run(collection, options, &mut report) {
            report.outcome = SyncOutcome::Failed;
            report.error = Some(e.to_string());
            report.watermark_after.clone_from(&report.watermark_before);
        }
        report.finished_at = format_timestamp(Utc::now());

        log_outcome(&report);
        if let Err(e) = self.store.record_run(&RunRecord::from_report(&report)) {
            warn!(collection = %report.collection, error = %e, "Failed to record sync run");
        }
        report
    }

    fn run(
        &mut self,
        collection: &CollectionConfig,
        options: SyncOptions,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        validate_table_name(&report.table).map_err(SyncError::InvalidTable)?;

        let prior = self.store.get_watermark(&collection.id)?;
        report.watermark_before = prior.as_ref().and_then(|w| w.last_modified_remote.clone());
        let prior_ts = report.watermark_before.as_deref().and_then(parse_timestamp_str);

        let (strategy, reason) = resolve_strategy(report.requested, collection, prior.as_ref());
        if let Some(reason) = &reason {
            warn!(collection = %collection.id, %reason, "Incremental sync downgraded to full");
            report.warnings.push(format!("downgraded to full: {reason}"));
        }
        report.strategy = strategy;
        report.downgrade_reason = reason;

        let limit = self.limit_for(collection, options);
        let request = self.build_request(collection, strategy, prior_ts, limit);
        info!(collection = %collection.id, %strategy, url = %request.redacted(), "Starting sync");

        let policy = FetchPolicy {
            max_pages: self.defaults.max_pages,
            retry: self.defaults.retry,
            page_delay: self.defaults.page_delay,
            token_param: collection.token_param.clone(),
        };
        let tempo_col = collection.tempo_col.as_deref();

        let mut batch: Vec<MirrorItem> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut running_max: Option<DateTime<Utc>> = None;

        let mut fetcher = Fetcher::new(&self.transport, request, policy);
        for page in fetcher.by_ref() {
            let page = page?;
            report.pages = page.index;
            report.scheme = page.scheme;
            let count = page.items.len();

            for raw in page.items {
                report.processed += 1;
                let Some(item) = MirrorItem::from_raw(raw, tempo_col) else {
                    report.skipped += 1;
                    warn!(collection = %collection.id, page = page.index, "Skipping item without identifier");
                    continue;
                };
                if let Some(ts) = item.modified_at {
                    running_max = Some(running_max.map_or(ts, |max| max.max(ts)));
                }
                if let Some(&slot) = positions.get(&item.id) {
                    batch[slot] = item;
                    report.duplicates += 1;
                } else {
                    positions.insert(item.id.clone(), batch.len());
                    batch.push(item);
                }
            }
            info!(collection = %collection.id, page = page.index, items = count, "Fetched page");
        }
        let end = fetcher.end();
        report.fetch_end = Some(end.clone());

        report.stats = self
            .store
            .commit_batch(&report.table, &batch, &format_timestamp(Utc::now()))?;

        if !end.is_complete() {
            let warning = match &end {
                FetchEnd::Ambiguous { reason } => format!("stopped without proof of exhaustion: {reason}"),
                other => other.to_string(),
            };
            report.warnings.push(format!("watermark held: {warning}"));
            report.watermark_after.clone_from(&report.watermark_before);
            report.outcome = SyncOutcome::Truncated;
            return Ok(());
        }

        let advanced = match (running_max, prior_ts) {
            (Some(seen), Some(prior)) => Some(seen.max(prior)),
            (seen, prior) => seen.or(prior),
        };
        let watermark = advanced
            .map(format_timestamp)
            .or_else(|| report.watermark_before.clone());
        self.store.put_watermark(
            &collection.id,
            watermark.as_deref(),
            &format_timestamp(Utc::now()),
        )?;
        report.watermark_after = watermark;
        report.outcome = if report.stats.any_changes() {
            SyncOutcome::Success
        } else {
            SyncOutcome::NoChanges
        };
        Ok(())
    }
}

fn log_outcome(report: &SyncReport) {
    match report.outcome {
        SyncOutcome::Success | SyncOutcome::NoChanges => info!(
            collection = %report.collection,
            outcome = %report.outcome,
            pages = report.pages,
            inserted = report.stats.inserted,
            updated = report.stats.updated,
            unchanged = report.stats.unchanged,
            skipped = report.skipped,
            watermark = report.watermark_after.as_deref().unwrap_or("-"),
            "Sync finished"
        ),
        SyncOutcome::Truncated => warn!(
            collection = %report.collection,
            pages = report.pages,
            inserted = report.stats.inserted,
            updated = report.stats.updated,
            "Sync truncated; watermark not advanced"
        ),
        SyncOutcome::Failed => error!(
            collection = %report.collection,
            error = report.error.as_deref().unwrap_or("unknown"),
            "Sync failed; watermark not advanced"
        ),
    }
}
