//! HTTP surface: `/greet` and `/weather/{city}`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use weather_core::Aggregator;

pub fn router(aggregator: Arc<Aggregator>) -> Router {
    Router::new()
        .route("/greet", get(greet))
        .route("/weather/", get(weather_without_city))
        .route("/weather/:city", get(weather))
        .with_state(aggregator)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(aggregator: Arc<Aggregator>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener to {addr}"))?;

    tracing::info!(
        %addr,
        providers = aggregator.providers().len(),
        policy = %aggregator.policy(),
        "weather service listening"
    );

    axum::serve(listener, router(aggregator))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated with an error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn greet() -> &'static str {
    "Hey Joe!"
}

async fn weather(
    State(aggregator): State<Arc<Aggregator>>,
    Path(city): Path<String>,
) -> Response {
    respond(&aggregator, city).await
}

/// `/weather/` with nothing after it; the aggregator rejects the empty city.
async fn weather_without_city(State(aggregator): State<Arc<Aggregator>>) -> Response {
    respond(&aggregator, String::new()).await
}

async fn respond(aggregator: &Aggregator, city: String) -> Response {
    match aggregator.query(&city).await {
        Ok(result) => {
            let body = json!({
                "city": result.city,
                "temp": result.temp.value(),
                "took": format_took(result.took),
            });
            ([(header::CONTENT_TYPE, "application/json; charset=utf-8")], body.to_string())
                .into_response()
        }
        Err(err) => {
            tracing::error!(city = %city, error = %err, "weather query failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// Render a duration the way Go's `time.Duration` prints: `1.5s`, `250ms`, `1h2m5s`.
pub fn format_took(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return format!("{}µs", nanos as f64 / 1e3);
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", nanos as f64 / 1e6);
    }

    let total = d.as_secs();
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&secs.to_string());

    let frac = d.subsec_nanos();
    if frac != 0 {
        let digits = format!("{frac:09}");
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    out.push('s');
    out
}
