//! Probe command implementation.
//!
//! Works for unconfigured libraries too, so a collection can be inspected
//! before it is added to the config.

use super::load_config_or_default;
use crate::cli::ProbeArgs;
use crate::config::CollectionConfig;
use crate::error::{Error, Result};
use crate::remote::HttpTransport;
use crate::sync::{print_probe_report, probe_collection};
use std::path::PathBuf;

/// Execute the probe command.
///
/// # Errors
///
/// Returns [`Error::LibraryNotFound`] on a 404, or the remote error.
pub fn execute(args: &ProbeArgs, config_path: Option<&PathBuf>, json: bool) -> Result<()> {
    if args.limit == Some(0) {
        return Err(Error::InvalidArgument("--limit must be positive".to_string()));
    }

    let config = load_config_or_default(config_path)?;
    let defaults = config.sync_defaults()?;
    let remote = config.remote_settings();
    let collection = config
        .collection(&args.collection)
        .cloned()
        .unwrap_or_else(|_| CollectionConfig::new(args.collection.as_str()));
    let limit = args.limit.or(collection.limit).unwrap_or(defaults.limit);

    let transport = HttpTransport::new(remote.timeout)?;
    let report = probe_collection(
        &transport,
        &remote,
        &collection,
        limit,
        defaults.include_fields,
        args.capabilities,
    )
    .map_err(|e| {
        if e.status_code() == Some(404) {
            Error::LibraryNotFound {
                id: args.collection.clone(),
            }
        } else {
            Error::Remote(e)
        }
    })?;

    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        print_probe_report(&report);
    }
    Ok(())
}
