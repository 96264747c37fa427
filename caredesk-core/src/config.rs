use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Environment variable overriding `[api] base_url`
pub const API_URL_ENV: &str = "CAREDESK_API_URL";

/// Local override file name, looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "caredesk.toml";

/// Load environment variables from .env files
///
/// Priority order (highest to lowest):
/// 1. Current directory .env
/// 2. ~/.caredesk/.env
/// 3. Environment variables already set
pub fn load_dotenv() -> Result<()> {
    let mut loaded_from = Vec::new();

    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded .env from current directory: {}", path.display());
        loaded_from.push(path);
    }

    if let Some(env_file) = config_dir().map(|d| d.join(".env")) {
        if env_file.exists() {
            // dotenvy never overwrites variables that are already set
            match dotenvy::from_path(&env_file) {
                Ok(()) => {
                    debug!("Loaded .env from {}", env_file.display());
                    loaded_from.push(env_file);
                }
                Err(e) => debug!("Failed to load {}: {}", env_file.display(), e),
            }
        }
    }

    if loaded_from.is_empty() {
        debug!("No .env files found (current dir or ~/.caredesk)");
    }
    Ok(())
}

/// The caredesk config directory (~/.caredesk)
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".caredesk"))
}

/// Path of the global config file (~/.caredesk/config.toml)
pub fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine home directory")?;
    if !dir.exists() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        info!("Created config directory: {}", dir.display());
    }
    Ok(dir)
}

fn expand_home(path: &str) -> Result<PathBuf> {
    if path == "~" {
        return dirs::home_dir().context("Could not determine home directory");
    }
    match path.strip_prefix("~/") {
        Some(rest) => Ok(dirs::home_dir()
            .context("Could not determine home directory")?
            .join(rest)),
        None => Ok(PathBuf::from(path)),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaredeskConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub list: ListConfig,

    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Gateway base URL, e.g. http://127.0.0.1:8787
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// Per-entity TTL, keyed by entity key: `policy = 120`
    #[serde(default)]
    pub ttl_overrides: HashMap<String, u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            ttl_overrides: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Parallel deletes during bulk removal
    #[serde(default = "default_bulk_concurrency")]
    pub bulk_concurrency: usize,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            bulk_concurrency: default_bulk_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Directory for view-state.json; defaults to ~/.caredesk
    #[serde(default)]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions for serde
fn default_base_url() -> String {
    "http://127.0.0.1:8787".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_page_size() -> u32 {
    crate::query::DEFAULT_PER_PAGE
}

fn default_bulk_concurrency() -> usize {
    4
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl CaredeskConfig {
    /// Load config from TOML files
    ///
    /// Priority order (highest to lowest):
    /// 1. CAREDESK_API_URL (api.base_url only)
    /// 2. ./caredesk.toml (project-specific)
    /// 3. ~/.caredesk/config.toml (user defaults)
    /// 4. Built-in defaults
    pub fn load() -> Self {
        let global = global_config_path();
        let mut config = Self::load_from(global.as_deref(), Some(Path::new(LOCAL_CONFIG_FILE)));
        config.apply_env();
        config
    }

    /// Layer `local` over `global`. Missing or unparsable files are skipped.
    pub fn load_from(global: Option<&Path>, local: Option<&Path>) -> Self {
        let mut config = Self::default();
        if let Some(global) = global.and_then(Self::read_file) {
            config = global;
        }
        if let Some(local) = local.and_then(Self::read_file) {
            config = Self::merge(config, local);
        }
        config
    }

    fn read_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => {
                    debug!("Loaded config from {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    warn!("Failed to parse {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                debug!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Merge two configs (right overrides left); TTL overrides combine.
    fn merge(mut base: Self, overlay: Self) -> Self {
        base.api = overlay.api;
        base.list = overlay.list;
        base.logging = overlay.logging;
        if overlay.state.dir.is_some() {
            base.state = overlay.state;
        }
        base.cache.default_ttl_secs = overlay.cache.default_ttl_secs;
        base.cache.ttl_overrides.extend(overlay.cache.ttl_overrides);
        base
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                debug!("Using {} from environment", API_URL_ENV);
                self.api.base_url = url;
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs.max(1))
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.default_ttl_secs)
    }

    /// TTL for one entity key, falling back to the default.
    pub fn ttl_for(&self, entity_key: &str) -> Duration {
        self.cache
            .ttl_overrides
            .get(entity_key)
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or_else(|| self.default_ttl())
    }

    /// Directory holding view-state.json
    pub fn state_dir(&self) -> Result<PathBuf> {
        match &self.state.dir {
            Some(dir) => expand_home(dir),
            None => config_dir().context("Could not determine home directory"),
        }
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_returns_path() {
        if let Some(path) = config_dir() {
            assert!(path.ends_with(".caredesk"));
        }
    }

    #[test]
    fn test_defaults() {
        let config = CaredeskConfig::default();
        assert_eq!(config.cache.default_ttl_secs, 300);
        assert_eq!(config.list.bulk_concurrency, 4);
        assert_eq!(config.list.page_size, 20);
        assert_eq!(config.ttl_for("city"), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: CaredeskConfig = toml::from_str(
            r#"
            [cache]
            ttl_overrides = { policy = 120 }
            "#,
        )
        .unwrap();
        assert_eq!(config.ttl_for("policy"), Duration::from_secs(120));
        assert_eq!(config.ttl_for("contract"), Duration::from_secs(300));
        assert_eq!(config.api.timeout_secs, 30);
    }

    #[test]
    fn test_local_overrides_global() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("config.toml");
        let local = dir.path().join("caredesk.toml");
        std::fs::write(
            &global,
            "[api]\nbase_url = \"http://global:1\"\n[cache]\nttl_overrides = { city = 60 }\n[state]\ndir = \"/tmp/global-state\"\n",
        )
        .unwrap();
        std::fs::write(
            &local,
            "[api]\nbase_url = \"http://local:2\"\n[cache]\nttl_overrides = { street = 30 }\n",
        )
        .unwrap();

        let config = CaredeskConfig::load_from(Some(&global), Some(&local));
        assert_eq!(config.api.base_url, "http://local:2");
        assert_eq!(config.ttl_for("city"), Duration::from_secs(60));
        assert_eq!(config.ttl_for("street"), Duration::from_secs(30));
        assert_eq!(config.state.dir.as_deref(), Some("/tmp/global-state"));
    }

    #[test]
    fn test_unparsable_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("caredesk.toml");
        std::fs::write(&local, "[list\npage_size = ").unwrap();
        let config = CaredeskConfig::load_from(None, Some(&local));
        assert_eq!(config, CaredeskConfig::default());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = CaredeskConfig::default();
        let text = config.to_toml_string().unwrap();
        let back: CaredeskConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
