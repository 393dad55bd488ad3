//! Watermark state commands.

use super::open_storage;
use crate::cli::StateCommands;
use crate::error::Result;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

/// Execute state commands.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or written.
pub fn execute(command: &StateCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    match command {
        StateCommands::Reset { collection } => reset(collection, db_path, json),
    }
}

fn reset(collection: &str, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let (_, mut storage) = open_storage(db_path)?;
    let removed = storage.reset_watermark(collection)?;
    if removed {
        info!(collection, "Watermark reset");
    }

    if json {
        println!("{}", json!({"collection": collection, "reset": removed}));
    } else if removed {
        println!("Reset watermark for {collection}; the next sync will be full.");
    } else {
        println!("No watermark stored for {collection}.");
    }
    Ok(())
}
