//! Runtime configuration loaded from YAML

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const BASE_URL_ENV: &str = "STOREFRONT_BASE_URL";
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Which remote catalog the sync engine talks to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceConfig {
    /// Catalog bundled with the binary.
    #[default]
    Demo,
    Http {
        base_url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_connections() -> u32 {
    4
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorefrontConfig {
    /// SQLite file for the catalog, or `:memory:`.
    pub database_path: PathBuf,
    /// JSON document holding user preferences.
    pub preferences_path: PathBuf,
    #[serde(default)]
    pub source: SourceConfig,
    /// `EnvFilter` directives, e.g. `info,storefront=debug`.
    #[serde(default)]
    pub log_filter: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("storefront.db"),
            preferences_path: PathBuf::from("storefront-preferences.json"),
            source: SourceConfig::Demo,
            log_filter: None,
            max_connections: default_max_connections(),
        }
    }
}

impl StorefrontConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config YAML {}", path.display()))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies `STOREFRONT_BASE_URL` to an HTTP source.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let (SourceConfig::Http { base_url, .. }, Some(url)) =
            (&mut self.source, lookup(BASE_URL_ENV))
        {
            *base_url = url;
        }
    }

    pub fn uses_in_memory_database(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_DATABASE
    }
}
