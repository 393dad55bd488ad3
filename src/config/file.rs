//! The `config.json` file: remote settings, sync defaults and collections.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fetch::RetryPolicy;
use crate::remote::DEFAULT_API_URL;
use crate::sync::{SyncDefaults, SyncStrategy};
use crate::validate::{default_table_name, find_similar_ids, is_since_capability, validate_table_name};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: f64 = 20.0;

/// Whole config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub remote: RemoteConfig,
    pub defaults: DefaultsConfig,
    pub collections: Vec<CollectionConfig>,
}

/// `remote` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// `defaults` section. Unset values fall back to [`SyncDefaults::default`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_fields: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark_overlap_secs: Option<u64>,
    pub retry: RetryConfig,
}

/// `defaults.retry` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

/// One mirrored collection (a remote library).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Remote library identifier.
    pub id: String,
    /// Destination table; defaults to `mm_<sanitised id>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Declared modification timestamp field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo_col: Option<String>,
    /// Capability flags, e.g. `["updatedAfter"]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supports: Vec<String>,
    /// Since-filter parameter name, when it differs from the first capability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_param: Option<String>,
    /// Parameter a continuation token is resubmitted under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_param: Option<String>,
}

impl CollectionConfig {
    /// Collection with only an identifier set.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Destination table name.
    #[must_use]
    pub fn table_name(&self) -> String {
        self.table
            .clone()
            .unwrap_or_else(|| default_table_name(&self.id))
    }

    /// Since-filter parameter to send for incremental runs.
    ///
    /// An explicit `since_param` wins; otherwise the first declared
    /// capability that is a known since-filter.
    #[must_use]
    pub fn since_filter(&self) -> Option<&str> {
        self.since_param
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| {
                self.supports
                    .iter()
                    .map(String::as_str)
                    .find(|s| is_since_capability(s))
            })
    }
}

/// Remote settings after env overrides and defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub api_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl MirrorConfig {
    /// Load and validate a config file.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if the file does not exist, or a config error
    /// if it cannot be parsed or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::NotInitialized);
        }
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the default config.
    ///
    /// # Errors
    ///
    /// Returns a config error if an existing file is invalid.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(Error::NotInitialized) => Ok(Self::default()),
            other => other,
        }
    }

    /// Write the config atomically as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        atomic_write(path, &text)?;
        Ok(())
    }

    /// Config written by `mm init`.
    #[must_use]
    pub fn starter() -> Self {
        let defaults = SyncDefaults::default();
        Self {
            remote: RemoteConfig {
                api_url: Some(DEFAULT_API_URL.to_string()),
                token: None,
                timeout_secs: None,
            },
            defaults: DefaultsConfig {
                sync: Some(defaults.sync),
                limit: Some(defaults.limit),
                max_pages: Some(defaults.max_pages),
                ..DefaultsConfig::default()
            },
            collections: Vec::new(),
        }
    }

    /// Check identifiers, table names and numeric limits.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.sync_defaults()?;

        let mut ids = HashSet::new();
        let mut tables = HashSet::new();
        for collection in &self.collections {
            if collection.id.trim().is_empty() {
                return Err(Error::Config("collection with empty id".to_string()));
            }
            if !ids.insert(collection.id.as_str()) {
                return Err(Error::Config(format!("duplicate collection id: {}", collection.id)));
            }
            let table = collection.table_name();
            validate_table_name(&table).map_err(Error::InvalidTableName)?;
            if !tables.insert(table.to_ascii_lowercase()) {
                return Err(Error::Config(format!(
                    "collection {} maps to table {table}, which another collection already uses",
                    collection.id
                )));
            }
            if collection.limit == Some(0) {
                return Err(Error::Config(format!("collection {}: limit must be positive", collection.id)));
            }
        }
        Ok(())
    }

    /// Look up a configured collection.
    ///
    /// # Errors
    ///
    /// Returns `CollectionNotFound` listing close matches (or every configured
    /// id when none is close).
    pub fn collection(&self, id: &str) -> Result<&CollectionConfig> {
        self.collections.iter().find(|c| c.id == id).ok_or_else(|| {
            let known = self.collection_ids();
            let similar = find_similar_ids(id, &known, 3);
            Error::CollectionNotFound {
                id: id.to_string(),
                configured: if similar.is_empty() { known } else { similar },
            }
        })
    }

    #[must_use]
    pub fn collection_ids(&self) -> Vec<String> {
        self.collections.iter().map(|c| c.id.clone()).collect()
    }

    /// Resolve `defaults` into the values the controller runs with.
    ///
    /// # Errors
    ///
    /// Returns a config error for zero limits or attempts.
    pub fn sync_defaults(&self) -> Result<SyncDefaults> {
        let base = SyncDefaults::default();
        let d = &self.defaults;
        let retry = RetryPolicy {
            max_attempts: d.retry.max_attempts.unwrap_or(base.retry.max_attempts),
            base_delay: d
                .retry
                .base_delay_ms
                .map_or(base.retry.base_delay, Duration::from_millis),
            max_delay: d
                .retry
                .max_delay_ms
                .map_or(base.retry.max_delay, Duration::from_millis),
        };
        let resolved = SyncDefaults {
            sync: d.sync.unwrap_or(base.sync),
            limit: d.limit.unwrap_or(base.limit),
            max_pages: d.max_pages.unwrap_or(base.max_pages),
            page_delay: d.page_delay_ms.map_or(base.page_delay, Duration::from_millis),
            include_fields: d.include_fields.unwrap_or(base.include_fields),
            watermark_overlap: d
                .watermark_overlap_secs
                .map_or(base.watermark_overlap, Duration::from_secs),
            retry,
        };

        if resolved.limit == 0 {
            return Err(Error::Config("defaults.limit must be positive".to_string()));
        }
        if resolved.max_pages == 0 {
            return Err(Error::Config("defaults.max_pages must be positive".to_string()));
        }
        if resolved.retry.max_attempts == 0 {
            return Err(Error::Config("defaults.retry.max_attempts must be positive".to_string()));
        }
        Ok(resolved)
    }

    /// Remote settings with `MEMENTO_*` environment overrides applied.
    #[must_use]
    pub fn remote_settings(&self) -> RemoteSettings {
        self.remote_settings_with(|key| std::env::var(key).ok())
    }

    /// [`remote_settings`](Self::remote_settings) with an explicit variable lookup.
    pub fn remote_settings_with(&self, env: impl Fn(&str) -> Option<String>) -> RemoteSettings {
        let api_url = env("MEMENTO_API_URL")
            .and_then(|v| sanitize_api_url(&v))
            .or_else(|| self.remote.api_url.as_deref().and_then(sanitize_api_url))
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let token = env("MEMENTO_TOKEN")
            .or_else(|| self.remote.token.clone())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let timeout_secs = env("MEMENTO_TIMEOUT")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .or_else(|| self.remote.timeout_secs.filter(|s| *s > 0).map(|s| s as f64))
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        RemoteSettings {
            api_url,
            token,
            timeout: Duration::from_secs_f64(timeout_secs),
        }
    }
}

/// Clean up an API base URL.
///
/// Text after `;` or `#` is dropped, all whitespace removed and trailing
/// slashes trimmed. Returns `None` when nothing usable is left.
#[must_use]
pub fn sanitize_api_url(raw: &str) -> Option<String> {
    let head = raw.split([';', '#']).next().unwrap_or_default();
    let cleaned: String = head.chars().filter(|c| !c.is_whitespace()).collect();
    let cleaned = cleaned.trim_end_matches('/');
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Write content to a file atomically.
///
/// Writes to a sibling temp file, syncs it to disk, then renames it over
/// the target. The original file, if any, is untouched on failure.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)
}
