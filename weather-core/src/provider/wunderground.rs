use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::{Kelvin, WeatherError, error::Result};

use super::{ProviderId, WeatherProvider, fetch_json};

const DEFAULT_BASE_URL: &str = "http://api.wunderground.com";

/// Weather Underground conditions API. Reports Celsius, converted to Kelvin.
#[derive(Debug, Clone)]
pub struct WundergroundProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WundergroundProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// `{base}/api/{key}/conditions/q/{city}.json`, each segment percent-encoded.
    fn conditions_url(&self, city: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            WeatherError::transport(self.name(), format!("invalid base URL '{}': {e}", self.base_url))
        })?;

        let file = format!("{city}.json");
        url.path_segments_mut()
            .map_err(|_| {
                WeatherError::transport(
                    self.name(),
                    format!("base URL '{}' cannot carry a path", self.base_url),
                )
            })?
            .pop_if_empty()
            .extend(["api", self.api_key.as_str(), "conditions", "q", file.as_str()]);

        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct WuObservation {
    temp_c: f64,
}

#[derive(Debug, Deserialize)]
struct WuResponse {
    current_observation: WuObservation,
}

#[async_trait]
impl WeatherProvider for WundergroundProvider {
    fn name(&self) -> &str {
        ProviderId::WeatherUnderground.as_str()
    }

    async fn temperature(&self, city: &str) -> Result<Kelvin> {
        let url = self.conditions_url(city)?;

        let parsed: WuResponse = fetch_json(self.name(), self.http.get(url)).await?;
        let kelvin = Kelvin::from_celsius(parsed.current_observation.temp_c);

        tracing::info!(provider = self.name(), city, kelvin = kelvin.value(), "reading");
        Ok(kelvin)
    }
}
