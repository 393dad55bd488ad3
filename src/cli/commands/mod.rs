//! Command implementations.

pub mod completions;
pub mod init;
pub mod libraries;
pub mod probe;
pub mod state;
pub mod status;
pub mod sync;
pub mod version;

use std::path::PathBuf;

use crate::config::{MirrorConfig, resolve_config_path, resolve_db_path};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;

/// Open the resolved database, which must already exist.
pub(crate) fn open_storage(db_path: Option<&PathBuf>) -> Result<(PathBuf, SqliteStorage)> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path)).ok_or(Error::NotInitialized)?;
    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }
    let storage = SqliteStorage::open(&db_path)?;
    Ok((db_path, storage))
}

/// Load and validate the resolved config file, which must exist.
pub(crate) fn load_config(config_path: Option<&PathBuf>) -> Result<MirrorConfig> {
    let path = resolve_config_path(config_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("Could not determine config path".to_string()))?;
    MirrorConfig::load(&path)
}

/// Like [`load_config`], but a missing file yields the empty config.
pub(crate) fn load_config_or_default(config_path: Option<&PathBuf>) -> Result<MirrorConfig> {
    let path = resolve_config_path(config_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("Could not determine config path".to_string()))?;
    MirrorConfig::load_or_default(&path)
}
