//! Status command implementation.

use super::{load_config_or_default, open_storage};
use crate::error::Result;
use crate::sync::{get_status, print_status};
use std::path::PathBuf;

/// Execute the status command.
///
/// # Errors
///
/// Returns `NotInitialized` if the database does not exist.
pub fn execute(
    db_path: Option<&PathBuf>,
    config_path: Option<&PathBuf>,
    runs: usize,
    json: bool,
) -> Result<()> {
    let (db_path, storage) = open_storage(db_path)?;
    let config = load_config_or_default(config_path)?;
    let status = get_status(&storage, &config, &db_path.display().to_string(), runs)?;

    if json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}
