//! Initialize the mirror home.
//!
//! Creates the database (schema applied on open) and a starter config with
//! no collections. Both paths follow the usual resolution order, so
//! `--db`/`--config` initialize a mirror anywhere.

use crate::config::{MirrorConfig, resolve_config_path, resolve_db_path};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    config: PathBuf,
    config_written: bool,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns [`Error::AlreadyInitialized`] if the database exists and `force`
/// is not set, or an error if a file cannot be created.
pub fn execute(
    force: bool,
    db_path: Option<&PathBuf>,
    config_path: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("Could not determine database path".to_string()))?;
    let config_path = resolve_config_path(config_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("Could not determine config path".to_string()))?;

    if db_path.exists() && !force {
        return Err(Error::AlreadyInitialized { path: db_path });
    }

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    if force && db_path.exists() {
        fs::remove_file(&db_path)?;
    }
    SqliteStorage::open(&db_path)?;

    let config_written = force || !config_path.exists();
    if config_written {
        MirrorConfig::starter().save(&config_path)?;
    }

    if json {
        let output = InitOutput {
            database: db_path,
            config: config_path,
            config_written,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Initialized Memento Mirror");
        println!("  Database: {}", db_path.display());
        if config_written {
            println!("  Config:   {}", config_path.display());
        } else {
            println!("  Config:   {} (kept existing)", config_path.display());
        }
        println!();
        println!("Next: add collections to the config, then run 'mm sync'.");
    }

    Ok(())
}
