//! Sync command implementation.
//!
//! Collections are synced one after another; each produces its own report.
//! A failed collection does not stop the others, but makes the command exit
//! with the sync error code.

use super::{load_config, open_storage};
use crate::cli::SyncArgs;
use crate::config::{CollectionConfig, MirrorConfig};
use crate::error::{Error, Result};
use crate::remote::HttpTransport;
use crate::sync::{SyncController, SyncOptions, SyncReport, print_sync_report};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct SyncOutput<'a> {
    reports: &'a [SyncReport],
    failed: usize,
}

/// Execute the sync command.
///
/// # Errors
///
/// Returns an error if setup fails, or [`Error::SyncFailed`] if any
/// collection failed.
pub fn execute(
    args: &SyncArgs,
    db_path: Option<&PathBuf>,
    config_path: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    if args.limit == Some(0) {
        return Err(Error::InvalidArgument("--limit must be positive".to_string()));
    }

    let config = load_config(config_path)?;
    let selected = select_collections(&config, &args.collections)?;
    let defaults = config.sync_defaults()?;
    let remote = config.remote_settings();

    let (_, mut storage) = open_storage(db_path)?;
    let transport = HttpTransport::new(remote.timeout)?;
    let options = SyncOptions {
        force_full: args.full,
        limit: args.limit,
    };

    let reports = SyncController::new(&transport, &mut storage, &remote, defaults)
        .sync_all(&selected, options);
    let failed = reports.iter().filter(|r| r.outcome.is_failure()).count();

    if json {
        let output = SyncOutput {
            reports: &reports,
            failed,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        for (i, report) in reports.iter().enumerate() {
            if i > 0 {
                println!();
            }
            print_sync_report(report);
        }
    }

    if failed > 0 {
        return Err(Error::SyncFailed {
            failed,
            total: reports.len(),
        });
    }
    Ok(())
}

/// Named collections in the order given, or every configured one.
fn select_collections(config: &MirrorConfig, ids: &[String]) -> Result<Vec<CollectionConfig>> {
    if ids.is_empty() {
        if config.collections.is_empty() {
            return Err(Error::Config(
                "no collections configured; add some to the \"collections\" list".to_string(),
            ));
        }
        return Ok(config.collections.clone());
    }

    let mut selected: Vec<CollectionConfig> = Vec::with_capacity(ids.len());
    for id in ids {
        let collection = config.collection(id)?;
        if !selected.iter().any(|c| c.id == collection.id) {
            selected.push(collection.clone());
        }
    }
    Ok(selected)
}
