//! Configuration management.
//!
//! This module provides functions for locating the Memento Mirror home
//! directory, resolving database and config paths, and loading the JSON
//! config file.
//!
//! # Layout
//!
//! - **Database**: `~/.memento-mirror/data/mirror.db`
//! - **Config**: `~/.memento-mirror/config.json`
//! - **Test database**: `~/.memento-mirror/test/mirror.db` (`MM_TEST_DB=1`)

mod file;

pub use file::{
    CollectionConfig, DefaultsConfig, MirrorConfig, RemoteConfig, RemoteSettings, RetryConfig,
    atomic_write, sanitize_api_url,
};

use std::path::{Path, PathBuf};

/// Environment variable selecting the database file.
pub const DB_ENV: &str = "MM_DB";
/// Environment variable selecting the config file.
pub const CONFIG_ENV: &str = "MM_CONFIG";
/// Environment variable enabling the isolated test database.
pub const TEST_DB_ENV: &str = "MM_TEST_DB";

/// Get the global Memento Mirror directory, `~/.memento-mirror/`.
#[must_use]
pub fn global_mirror_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".memento-mirror"))
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `MM_TEST_DB=1` (or any non-empty value
/// other than `0`/`false`).
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var(TEST_DB_ENV).is_ok_and(|v| is_truthy(&v))
}

fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Get the test database path, `~/.memento-mirror/test/mirror.db`.
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_mirror_dir().map(|dir| dir.join("test").join("mirror.db"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `MM_TEST_DB` environment variable → uses test database
/// 3. `MM_DB` environment variable
/// 4. Global location: `~/.memento-mirror/data/mirror.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if is_test_mode() {
        return test_db_path();
    }

    if let Ok(db_path) = std::env::var(DB_ENV) {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_mirror_dir().map(|dir| dir.join("data").join("mirror.db"))
}

/// Resolve the config file path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `MM_CONFIG` environment variable
/// 3. Global location: `~/.memento-mirror/config.json`
#[must_use]
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        if !config_path.trim().is_empty() {
            return Some(PathBuf::from(config_path));
        }
    }

    global_mirror_dir().map(|dir| dir.join("config.json"))
}
