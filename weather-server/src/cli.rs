use std::{
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use weather_core::{Aggregator, Config, FailurePolicy, ProviderId, providers_from_config};

use crate::http;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Average the temperature reported by several providers")]
pub struct Cli {
    /// Config file; defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level for this service (trace, debug, info, warn, error). Overridden by RUST_LOG.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for the `[aggregation]` config section.
#[derive(Debug, Default, Args)]
pub struct AggregationArgs {
    /// fail-fast or best-effort.
    #[arg(long)]
    pub policy: Option<FailurePolicy>,

    /// Per-provider timeout in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP service.
    Serve {
        /// Listening port; defaults to `server.port` from config (8080).
        #[arg(long)]
        port: Option<u16>,

        #[command(flatten)]
        aggregation: AggregationArgs,
    },

    /// Query all configured providers once and print the result.
    Show {
        city: String,

        #[command(flatten)]
        aggregation: AggregationArgs,
    },

    /// Store credentials for a provider.
    Configure {
        /// Provider short name: "openweathermap" or "wunderground".
        provider: String,

        #[arg(long)]
        api_key: String,

        /// Alternative endpoint for the provider.
        #[arg(long)]
        base_url: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = self.config;

        match self.command {
            Command::Serve { port, aggregation } => {
                let config = load_config(config_path.as_deref())?;
                let aggregator = build_aggregator(&config, &aggregation)?;
                let port = port.unwrap_or(config.server.port);

                http::serve(Arc::new(aggregator), SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
                    .await
            }
            Command::Show { city, aggregation } => {
                let config = load_config(config_path.as_deref())?;
                let aggregator = build_aggregator(&config, &aggregation)?;

                let result = aggregator.query(&city).await?;
                println!(
                    "{}: {} ({:.2} °C) from {} provider(s) in {}",
                    result.city,
                    result.temp,
                    result.temp.to_celsius(),
                    result.contributors,
                    http::format_took(result.took),
                );
                Ok(())
            }
            Command::Configure { provider, api_key, base_url } => {
                let id = ProviderId::try_from(provider.as_str())?;
                let path = match config_path {
                    Some(path) => path,
                    None => Config::config_file_path()?,
                };

                let mut config = Config::load_from(&path)?;
                config.upsert_provider_api_key(id, api_key);
                if let Some(url) = base_url {
                    config.set_provider_base_url(id, url)?;
                }
                config.save_to(&path)?;

                println!("Saved credentials for {id} to {}", path.display());
                Ok(())
            }
        }
    }
}

/// Load the config file and overlay credentials from the environment.
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env();
    Ok(config)
}

/// Command-line flags win over the config file.
fn build_aggregator(config: &Config, args: &AggregationArgs) -> anyhow::Result<Aggregator> {
    let providers =
        providers_from_config(config).context("Cannot build the provider set")?;

    let policy = args.policy.unwrap_or(config.aggregation.policy);
    let timeout = args.timeout_ms.map(Duration::from_millis).or(config.aggregation.timeout());

    Ok(Aggregator::new(providers).with_policy(policy).with_timeout(timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Config {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenWeatherMap, "OWM".into());
        cfg.upsert_provider_api_key(ProviderId::WeatherUnderground, "WU".into());
        cfg.aggregation.policy = FailurePolicy::BestEffort;
        cfg.aggregation.timeout_ms = Some(2_000);
        cfg
    }

    #[test]
    fn parses_serve_with_overrides() {
        let cli = Cli::try_parse_from([
            "weather", "serve", "--port", "9000", "--policy", "best-effort", "--timeout-ms", "750",
        ])
        .unwrap();

        match cli.command {
            Command::Serve { port, aggregation } => {
                assert_eq!(port, Some(9000));
                assert_eq!(aggregation.policy, Some(FailurePolicy::BestEffort));
                assert_eq!(aggregation.timeout_ms, Some(750));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = Cli::try_parse_from(["weather", "show", "Oslo", "--policy", "sometimes"]);
        assert!(err.is_err());
    }

    #[test]
    fn global_config_flag_is_accepted_after_subcommand() {
        let cli =
            Cli::try_parse_from(["weather", "show", "Oslo", "--config", "/tmp/weather.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/weather.toml")));
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn aggregator_uses_config_when_no_flags_given() {
        let agg = build_aggregator(&configured(), &AggregationArgs::default()).unwrap();

        assert_eq!(agg.providers().len(), 2);
        assert_eq!(agg.policy(), FailurePolicy::BestEffort);
        assert_eq!(agg.timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn flags_override_config() {
        let args = AggregationArgs { policy: Some(FailurePolicy::FailFast), timeout_ms: Some(100) };
        let agg = build_aggregator(&configured(), &args).unwrap();

        assert_eq!(agg.policy(), FailurePolicy::FailFast);
        assert_eq!(agg.timeout(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn aggregator_requires_a_configured_provider() {
        let err = build_aggregator(&Config::default(), &AggregationArgs::default()).unwrap_err();
        assert!(format!("{err:#}").contains("No providers configured"));
    }
}
