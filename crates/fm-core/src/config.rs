//! Configuration types and parsing for fundmerge.yml

use crate::error::{CoreError, CoreResult};
use crate::ids::SourceName;
use crate::normalize::{normalize_email, parse_amount};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Rows per bulk insert when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Main project configuration from fundmerge.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Project name
    pub name: String,

    /// Canonical store connection
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Directory the blob store resolves export names against
    #[serde(default = "default_blob_root")]
    pub blob_root: String,

    /// Directory for `migration.log` and conflict snapshots
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// JSON export of identity-directory accounts, if linking is wanted
    #[serde(default)]
    pub identity_directory: Option<String>,

    /// Emails known to be duplicated across legacy systems
    #[serde(default)]
    pub watch_list: Vec<String>,

    /// What the resolver does with a watch-listed email
    #[serde(default)]
    pub watch_list_policy: WatchListPolicy,

    /// Markers for staff/test accounts that must never become donors
    #[serde(default)]
    pub administrative: AdministrativeConfig,

    /// Rows per staging bulk insert
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Legacy exports, in the order `fm stage` loads them
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// DuckDB file path, or `:memory:`
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Resolver behavior for watch-listed emails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WatchListPolicy {
    /// Warn and skip the record
    #[default]
    Skip,
    /// Warn and keep resolving
    Warn,
}

/// Administrative account markers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdministrativeConfig {
    #[serde(default)]
    pub emails: Vec<String>,

    #[serde(default)]
    pub legacy_ids: Vec<String>,
}

impl AdministrativeConfig {
    /// True if the email or legacy id is listed.
    pub fn matches(&self, email: Option<&str>, legacy_id: &str) -> bool {
        if self.legacy_ids.iter().any(|id| id == legacy_id) {
            return true;
        }
        match email {
            Some(email) => self
                .emails
                .iter()
                .any(|e| normalize_email(e).as_deref() == Some(email)),
            None => false,
        }
    }
}

/// Layout of a legacy export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Headerless user-table dump (donors only)
    LegacyUsers,
    /// Platform export with a header row (donors + pledges)
    HeaderKeyed,
    /// Headerless payment-processor dump (donors + pledges)
    PositionalPledges,
}

impl SourceFormat {
    /// Whether the first row is a header rather than data.
    pub fn has_header(&self) -> bool {
        matches!(self, SourceFormat::HeaderKeyed)
    }

    /// Whether rows of this format carry pledges.
    pub fn yields_pledges(&self) -> bool {
        !matches!(self, SourceFormat::LegacyUsers)
    }
}

/// One legacy export
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Source name; also names its staging tables
    pub name: SourceName,

    /// Object name in the blob store
    pub file: String,

    /// Column layout
    pub format: SourceFormat,

    /// Campaign the source's pledges belong to
    #[serde(default)]
    pub campaign_id: Option<i64>,

    /// Known total for the campaign after apply (decimal, e.g. "12500.00")
    #[serde(default)]
    pub expected_total: Option<String>,
}

impl SourceConfig {
    /// Expected campaign total in cents, if configured.
    pub fn expected_total_cents(&self) -> Option<i64> {
        self.expected_total.as_deref().map(parse_amount)
    }
}

fn default_db_path() -> String {
    "target/fundmerge.duckdb".to_string()
}

fn default_blob_root() -> String {
    "exports".to_string()
}

fn default_log_dir() -> String {
    "target/logs".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("fundmerge.yml");
        let yaml_path = dir.join("fundmerge.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "Project name cannot be empty".to_string(),
            });
        }

        if self.batch_size == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "batch_size must be at least 1".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !source
                .name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            {
                return Err(CoreError::ConfigInvalid {
                    message: format!(
                        "Source name '{}' may only contain lowercase letters, digits, and '_'",
                        source.name
                    ),
                });
            }
            if !seen.insert(source.name.as_str()) {
                return Err(CoreError::ConfigInvalid {
                    message: format!("Duplicate source name '{}'", source.name),
                });
            }
            if source.format.yields_pledges() && source.campaign_id.is_none() {
                return Err(CoreError::ConfigInvalid {
                    message: format!(
                        "Source '{}' carries pledges and needs a campaign_id",
                        source.name
                    ),
                });
            }
            if let Some(total) = &source.expected_total {
                if !total.chars().any(|c| c.is_ascii_digit()) {
                    return Err(CoreError::ConfigInvalid {
                        message: format!(
                            "Source '{}' has a non-numeric expected_total '{}'",
                            source.name, total
                        ),
                    });
                }
            }
        }

        Ok(())
    }

    /// Look up a source by name
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Names of all configured sources
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    /// True if the (normalized) email is on the duplicate watch-list.
    pub fn is_watch_listed(&self, email: &str) -> bool {
        self.watch_list
            .iter()
            .any(|e| normalize_email(e).as_deref() == Some(email))
    }

    /// Database path resolved against the project root (`:memory:` passes through)
    pub fn database_path_absolute(&self, root: &Path) -> String {
        if self.database.path == ":memory:" {
            self.database.path.clone()
        } else {
            root.join(&self.database.path).display().to_string()
        }
    }

    /// Blob root resolved against the project root
    pub fn blob_root_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.blob_root)
    }

    /// Log directory resolved against the project root
    pub fn log_dir_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.log_dir)
    }

    /// Identity-directory export resolved against the project root
    pub fn identity_directory_absolute(&self, root: &Path) -> Option<PathBuf> {
        self.identity_directory.as_ref().map(|p| root.join(p))
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
