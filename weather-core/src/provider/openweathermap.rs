use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{Kelvin, error::Result};

use super::{ProviderId, WeatherProvider, fetch_json};

const DEFAULT_BASE_URL: &str = "http://api.openweathermap.org";

/// OpenWeatherMap current conditions. Reports Kelvin natively.
#[derive(Debug, Clone)]
pub struct OpenWeatherMapProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherMapProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    main: OwmMain,
}

#[async_trait]
impl WeatherProvider for OpenWeatherMapProvider {
    fn name(&self) -> &str {
        ProviderId::OpenWeatherMap.as_str()
    }

    async fn temperature(&self, city: &str) -> Result<Kelvin> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        let request = self
            .http
            .get(url)
            .query(&[("APPID", self.api_key.as_str()), ("q", city)]);

        let parsed: OwmResponse = fetch_json(self.name(), request).await?;
        let kelvin = Kelvin(parsed.main.temp);

        tracing::info!(provider = self.name(), city, kelvin = kelvin.value(), "reading");
        Ok(kelvin)
    }
}
