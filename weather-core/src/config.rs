use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{aggregator::FailurePolicy, provider::ProviderId};

pub const DEFAULT_PORT: u16 = 8080;

/// Configuration for a single provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    pub api_key: String,

    /// Overrides the provider's public endpoint, e.g. for a proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AggregationConfig {
    #[serde(default)]
    pub policy: FailurePolicy,

    /// Per-provider deadline. Absent means wait for every provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl AggregationConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Example TOML:
    /// [providers.openweathermap]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load config from the platform config directory, or defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay credentials from `<PROVIDER>_API_KEY` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for id in ProviderId::all() {
            if let Some(key) = lookup(id.env_var()).filter(|k| !k.trim().is_empty()) {
                self.upsert_provider_api_key(*id, key);
            }
        }
    }

    /// Set or replace a provider API key, keeping any configured base URL.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .entry(provider_id.as_str().to_string())
            .and_modify(|cfg| cfg.api_key = api_key.clone())
            .or_insert(ProviderConfig { api_key, base_url: None });
    }

    pub fn set_provider_base_url(&mut self, provider_id: ProviderId, base_url: String) -> Result<()> {
        let cfg = self.providers.get_mut(provider_id.as_str()).ok_or_else(|| {
            anyhow!("Provider '{provider_id}' has no API key; configure it before setting a base URL")
        })?;
        cfg.base_url = Some(base_url);
        Ok(())
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }

    /// Configured providers, in `ProviderId::all()` order.
    pub fn configured_providers(&self) -> Vec<ProviderId> {
        ProviderId::all().iter().copied().filter(|id| self.is_provider_configured(*id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_no_providers_and_standard_port() {
        let cfg = Config::default();

        assert!(cfg.configured_providers().is_empty());
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.aggregation.policy, FailurePolicy::FailFast);
        assert_eq!(cfg.aggregation.timeout(), None);
    }

    #[test]
    fn upsert_keeps_base_url() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenWeatherMap, "OLD".into());
        cfg.set_provider_base_url(ProviderId::OpenWeatherMap, "http://localhost:9000".into())
            .expect("provider exists");
        cfg.upsert_provider_api_key(ProviderId::OpenWeatherMap, "NEW".into());

        let pc = cfg.provider_config(ProviderId::OpenWeatherMap).unwrap();
        assert_eq!(pc.api_key, "NEW");
        assert_eq!(pc.base_url.as_deref(), Some("http://localhost:9000"));
    }

    #[test]
    fn base_url_requires_configured_provider() {
        let mut cfg = Config::default();
        let err = cfg
            .set_provider_base_url(ProviderId::WeatherUnderground, "http://x".into())
            .unwrap_err();
        assert!(err.to_string().contains("has no API key"));
    }

    #[test]
    fn configured_providers_follow_declaration_order() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::WeatherUnderground, "WU".into());
        cfg.upsert_provider_api_key(ProviderId::OpenWeatherMap, "OWM".into());

        assert_eq!(
            cfg.configured_providers(),
            vec![ProviderId::OpenWeatherMap, ProviderId::WeatherUnderground]
        );
    }

    #[test]
    fn env_overrides_credentials_and_ignores_blank_values() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeatherMap, "FROM_FILE".into());

        cfg.apply_env_with(|name| match name {
            "OPENWEATHERMAP_API_KEY" => Some("FROM_ENV".into()),
            "WUNDERGROUND_API_KEY" => Some("   ".into()),
            _ => None,
        });

        assert_eq!(cfg.provider_api_key(ProviderId::OpenWeatherMap), Some("FROM_ENV"));
        assert!(!cfg.is_provider_configured(ProviderId::WeatherUnderground));
    }

    #[test]
    fn parses_full_toml() {
        let cfg: Config = toml::from_str(
            r#"
            [providers.wunderground]
            api_key = "WU"
            base_url = "http://127.0.0.1:1234"

            [aggregation]
            policy = "best-effort"
            timeout_ms = 1500

            [server]
            port = 9090
            "#,
        )
        .expect("valid config");

        assert_eq!(cfg.provider_api_key(ProviderId::WeatherUnderground), Some("WU"));
        assert_eq!(cfg.aggregation.policy, FailurePolicy::BestEffort);
        assert_eq!(cfg.aggregation.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(cfg.server.port, 9090);
    }

    #[test]
    fn save_then_load_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeatherMap, "OWM".into());
        cfg.aggregation.timeout_ms = Some(250);
        cfg.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = Config::load_from(&dir.path().join("absent.toml")).expect("load");
        assert_eq!(loaded, Config::default());
    }
}
