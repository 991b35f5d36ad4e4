use crate::{
    Config, Kelvin, WeatherError, error,
    provider::{openweathermap::OpenWeatherMapProvider, wunderground::WundergroundProvider},
};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::{convert::TryFrom, fmt::Debug, sync::Arc};

pub mod openweathermap;
pub mod wunderground;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeatherMap,
    WeatherUnderground,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeatherMap => "openweathermap",
            ProviderId::WeatherUnderground => "wunderground",
        }
    }

    /// Environment variable that may carry this provider's credential.
    pub fn env_var(&self) -> &'static str {
        match self {
            ProviderId::OpenWeatherMap => "OPENWEATHERMAP_API_KEY",
            ProviderId::WeatherUnderground => "WUNDERGROUND_API_KEY",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeatherMap, ProviderId::WeatherUnderground]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweathermap" => Ok(ProviderId::OpenWeatherMap),
            "wunderground" => Ok(ProviderId::WeatherUnderground),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweathermap, wunderground."
            )),
        }
    }
}

/// A source of current temperature readings.
///
/// Implementations hold no mutable state, so one instance can serve any
/// number of concurrent queries.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn name(&self) -> &str;

    /// Current temperature in `city`, normalized to Kelvin.
    async fn temperature(&self, city: &str) -> error::Result<Kelvin>;
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let pc = config.provider_config(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `weather configure {id} --api-key <KEY>` or set {}.",
            id.env_var()
        )
    })?;

    let provider: Arc<dyn WeatherProvider> = match id {
        ProviderId::OpenWeatherMap => {
            let p = OpenWeatherMapProvider::new(pc.api_key.clone());
            Arc::new(match &pc.base_url {
                Some(url) => p.with_base_url(url.clone()),
                None => p,
            })
        }
        ProviderId::WeatherUnderground => {
            let p = WundergroundProvider::new(pc.api_key.clone());
            Arc::new(match &pc.base_url {
                Some(url) => p.with_base_url(url.clone()),
                None => p,
            })
        }
    };

    Ok(provider)
}

/// Every provider that has credentials in `config`.
pub fn providers_from_config(config: &Config) -> anyhow::Result<Vec<Arc<dyn WeatherProvider>>> {
    let ids = config.configured_providers();
    if ids.is_empty() {
        return Err(anyhow::anyhow!(
            "No providers configured.\n\
             Hint: run `weather configure <provider> --api-key <KEY>` (e.g. `weather configure openweathermap --api-key ...`)."
        ));
    }

    ids.into_iter().map(|id| provider_from_config(id, config)).collect()
}

/// Send `request` and decode a JSON body of type `T`.
///
/// Connection failures, non-2xx statuses and unreadable bodies are transport
/// errors; a body that doesn't fit `T` is a decode error.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> error::Result<T> {
    let res = request.send().await.map_err(|e| WeatherError::transport(provider, e))?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| WeatherError::transport(provider, format!("failed to read body: {e}")))?;

    if !status.is_success() {
        return Err(WeatherError::transport(
            provider,
            format!("request failed with status {status}: {}", truncate_body(&body)),
        ));
    }

    serde_json::from_str(&body).map_err(|e| WeatherError::decode(provider, e))
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn provider_id_parse_is_case_insensitive() {
        assert_eq!(ProviderId::try_from("WUnderground").unwrap(), ProviderId::WeatherUnderground);
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(ProviderId::OpenWeatherMap, &cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured for provider"));
    }

    #[test]
    fn providers_from_config_errors_when_none_configured() {
        let err = providers_from_config(&Config::default()).unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("No providers configured"));
        assert!(msg.contains("Hint: run `weather configure"));
    }

    #[test]
    fn providers_from_config_builds_each_configured_provider() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::WeatherUnderground, "WU".to_string());
        cfg.upsert_provider_api_key(ProviderId::OpenWeatherMap, "OWM".to_string());

        let providers = providers_from_config(&cfg).expect("both configured");
        let names: Vec<&str> = providers.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["openweathermap", "wunderground"]);
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(250);
        let cut = truncate_body(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);

        assert_eq!(truncate_body("short"), "short");
    }
}
