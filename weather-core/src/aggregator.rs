use std::{
    fmt,
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{
    AggregationResult, Kelvin, Reading, WeatherError, WeatherProvider,
    error::Result,
    model::mean_of,
};

/// What to do when some providers fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// The first provider error fails the whole query.
    #[default]
    FailFast,
    /// Failed providers are left out of the mean; fails only if none succeed.
    BestEffort,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::FailFast => "fail-fast",
            FailurePolicy::BestEffort => "best-effort",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail-fast" | "failfast" => Ok(FailurePolicy::FailFast),
            "best-effort" | "besteffort" => Ok(FailurePolicy::BestEffort),
            _ => Err(format!("unknown failure policy '{s}', expected fail-fast or best-effort")),
        }
    }
}

/// Queries a fixed set of providers concurrently and averages their readings.
#[derive(Debug, Clone)]
pub struct Aggregator {
    providers: Vec<Arc<dyn WeatherProvider>>,
    policy: FailurePolicy,
    timeout: Option<Duration>,
}

impl Aggregator {
    pub fn new(providers: Vec<Arc<dyn WeatherProvider>>) -> Self {
        Self { providers, policy: FailurePolicy::default(), timeout: None }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Per-provider deadline; `None` waits as long as each provider takes.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn providers(&self) -> &[Arc<dyn WeatherProvider>] {
        &self.providers
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Ask every provider for the temperature in `city` and return the mean.
    ///
    /// One task is spawned per provider and all of them report into a channel
    /// sized to the provider count, so no send ever waits. Under
    /// [`FailurePolicy::FailFast`] the first error is returned as soon as it
    /// arrives; the remaining tasks are left to finish in the background and
    /// whatever they send afterwards is dropped with the receiver.
    pub async fn query(&self, city: &str) -> Result<AggregationResult> {
        if self.providers.is_empty() {
            return Err(WeatherError::InvalidInput("no providers to query".into()));
        }
        if city.trim().is_empty() {
            return Err(WeatherError::InvalidInput("city must not be empty".into()));
        }

        let begin = Instant::now();
        let (tx, mut rx) = mpsc::channel(self.providers.len());

        for (idx, provider) in self.providers.iter().enumerate() {
            let provider = Arc::clone(provider);
            let tx = tx.clone();
            let city = city.to_owned();
            let timeout = self.timeout;

            tokio::spawn(async move {
                let result = call_provider(provider.as_ref(), &city, timeout).await;
                // Closed receiver: a fail-fast query already returned.
                let _ = tx.send((idx, result)).await;
            });
        }
        drop(tx);

        let mut reported = vec![false; self.providers.len()];
        let mut readings = Vec::with_capacity(self.providers.len());
        let mut errors = Vec::new();

        while let Some((idx, result)) = rx.recv().await {
            reported[idx] = true;
            let provider = self.providers[idx].name();

            match result {
                Ok(value) => {
                    tracing::debug!(provider, city, kelvin = value.value(), "collected reading");
                    readings.push(Reading { provider: provider.to_owned(), value });
                }
                Err(err) => {
                    tracing::warn!(provider, city, policy = %self.policy, error = %err, "provider failed");
                    if self.policy == FailurePolicy::FailFast {
                        return Err(err);
                    }
                    errors.push(err);
                }
            }
        }

        // A task that dropped its sender without reporting has panicked.
        for (idx, _) in reported.iter().enumerate().filter(|(_, seen)| !**seen) {
            let err = WeatherError::transport(self.providers[idx].name(), "provider task panicked");
            tracing::warn!(provider = self.providers[idx].name(), city, "provider task panicked");
            if self.policy == FailurePolicy::FailFast {
                return Err(err);
            }
            errors.push(err);
        }

        let took = begin.elapsed();

        let Some(temp) = mean_of(&readings) else {
            return Err(WeatherError::AllProvidersFailed { errors });
        };

        tracing::info!(
            city,
            kelvin = temp.value(),
            contributors = readings.len(),
            failed = errors.len(),
            took_ms = took.as_millis() as u64,
            "aggregated temperature"
        );

        Ok(AggregationResult {
            city: city.to_owned(),
            temp,
            took,
            contributors: readings.len(),
        })
    }
}

async fn call_provider(
    provider: &dyn WeatherProvider,
    city: &str,
    timeout: Option<Duration>,
) -> Result<Kelvin> {
    match timeout {
        None => provider.temperature(city).await,
        Some(after) => tokio::time::timeout(after, provider.temperature(city))
            .await
            .unwrap_or_else(|_| {
                Err(WeatherError::Timeout { provider: provider.name().to_owned(), after })
            }),
    }
}
