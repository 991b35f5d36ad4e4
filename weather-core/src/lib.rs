//! Core library for the `weather` service.
//!
//! This crate defines:
//! - The provider abstraction and the OpenWeatherMap / Weather Underground sources
//! - The aggregator that queries providers concurrently and averages their readings
//! - Shared domain models and the error taxonomy
//! - Configuration & credentials handling
//!
//! It is used by `weather-server`, but can also be reused by other binaries or services.

pub mod aggregator;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;

pub use aggregator::{Aggregator, FailurePolicy};
pub use config::{AggregationConfig, Config, ProviderConfig, ServerConfig};
pub use error::WeatherError;
pub use model::{AggregationResult, Kelvin, Reading};
pub use provider::{ProviderId, WeatherProvider, providers_from_config};
