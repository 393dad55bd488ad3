//! Incremental mirroring of remote collections.
//!
//! - **Items**: identifier and timestamp resolution over fallback chains
//! - **Hashing**: SHA256 content hashes for change detection in the sink
//! - **Controller**: strategy resolution, fetch, batch commit, watermark
//! - **Probe**: read-only diagnostics for one collection
//! - **Status**: watermarks, row counts and run history
//!
//! # Architecture
//!
//! The controller only touches storage through three traits defined in
//! [`store`]: [`UpsertSink`], [`WatermarkStore`] and [`RunLog`]. For each
//! collection:
//! 1. Resolve the strategy; incremental needs a watermark and a since-filter
//! 2. Fetch every page to exhaustion, deduplicating by identifier
//! 3. Commit the batch in one transaction
//! 4. Advance the watermark only if the fetch proved exhaustion
//!
//! # Example
//!
//! ```ignore
//! use mm::sync::{SyncController, SyncOptions};
//!
//! let mut controller = SyncController::new(transport, &mut storage, &remote, defaults);
//! let reports = controller.sync_all(&config.collections, SyncOptions::default());
//! ```

mod controller;
mod hash;
mod item;
mod probe;
mod status;
mod store;
mod types;

pub use controller::{SyncController, SyncOptions, entries_request, resolve_strategy};
pub use hash::{content_hash, has_changed};
pub use item::{
    ID_FIELDS, MirrorItem, TIMESTAMP_FIELDS, extract_id, extract_timestamp, format_timestamp,
    parse_timestamp, parse_timestamp_str,
};
pub use probe::{CapabilityCheck, FAR_FUTURE, PROBE_CAPABILITIES, ProbeReport, probe_collection};
pub use status::{
    CollectionStatus, DEFAULT_RECENT_RUNS, StatusReport, get_status, print_probe_report,
    print_status, print_sync_report,
};
pub use store::{RunLog, UpsertSink, WatermarkStore};
pub use types::{
    CommitStats, DEFAULT_LIMIT, RunRecord, SyncDefaults, SyncError, SyncOutcome, SyncReport,
    SyncResult, SyncStrategy, Watermark,
};
