use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by providers and the aggregator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WeatherError {
    #[error("{provider}: transport error: {message}")]
    Transport { provider: String, message: String },

    #[error("{provider}: unexpected response body: {message}")]
    Decode { provider: String, message: String },

    #[error("{provider}: no response within {after:?}")]
    Timeout { provider: String, after: Duration },

    #[error("all providers failed: {}", join_errors(.errors))]
    AllProvidersFailed { errors: Vec<WeatherError> },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl WeatherError {
    pub fn transport(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport { provider: provider.into(), message: message.to_string() }
    }

    pub fn decode(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode { provider: provider.into(), message: message.to_string() }
    }

    /// Name of the provider that produced this error, if it came from one.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::Transport { provider, .. }
            | Self::Decode { provider, .. }
            | Self::Timeout { provider, .. } => Some(provider),
            Self::AllProvidersFailed { .. } | Self::InvalidInput(_) => None,
        }
    }
}

fn join_errors(errors: &[WeatherError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

pub type Result<T> = std::result::Result<T, WeatherError>;
