//! Console harness probing the Zaragoza water-treatment-plant origins feed
//! through a circuit breaker.
//!
//! The feed is a JSON array of arrays: row 0 holds the column names (the
//! column named `"X"` carries no origin), and every following row starts
//! with a `dd-MM-yyyy` date followed by per-origin volumes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use breakwater::{BreakerConfig, BreakerState, CircuitBreaker, Threshold, TransitionObserver};
use chrono::NaiveDate;
use clap::Parser;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_URL: &str =
    "https://www.zaragoza.es/sede/servicio/potabilizadora/procedencia.json";

#[derive(Debug, Parser)]
#[command(
    name = "breakwater-demo",
    about = "Probe the water-treatment origins feed through a circuit breaker"
)]
struct Args {
    /// Endpoint serving the origins-by-date feed.
    #[arg(long, default_value = DEFAULT_URL)]
    url: String,

    /// Number of probe requests to issue.
    #[arg(long, default_value_t = 10)]
    probes: u32,

    /// Pause between probes, in milliseconds.
    #[arg(long, default_value_t = 2_000)]
    interval_ms: u64,

    /// Cooldown before an open circuit admits a trial call, in milliseconds.
    #[arg(long, default_value_t = 60_000)]
    cooldown_ms: u64,

    /// Consecutive successes required to close a half-open circuit.
    #[arg(long, default_value_t = 3)]
    close_after: u32,

    /// Tracked failures required to open the circuit.
    #[arg(long, default_value_t = 3)]
    open_after: u32,

    /// Width of the failure window, in milliseconds.
    #[arg(long, default_value_t = 300_000)]
    failure_window_ms: u64,
}

/// One row of the feed: per-origin volumes for a date.
#[derive(Debug, PartialEq)]
struct OriginByDate {
    date: NaiveDate,
    distribution: HashMap<String, i64>,
}

/// Logs every breaker transition; entering `Open` is the loud one.
struct LogObserver;

impl TransitionObserver for LogObserver {
    fn on_transition(&self, from: BreakerState, to: BreakerState) {
        if to == BreakerState::Open {
            warn!(%from, %to, "origins feed breaker opened");
        } else {
            info!(%from, %to, "origins feed breaker moved");
        }
    }
}

/// Owns the HTTP client and the breaker guarding the feed.
struct OriginsClient {
    http: reqwest::Client,
    breaker: CircuitBreaker,
    url: String,
}

impl OriginsClient {
    fn new(url: String, config: BreakerConfig) -> anyhow::Result<Self> {
        let breaker = CircuitBreaker::new("water-treatment-plant", config)?
            .with_observer(Arc::new(LogObserver) as Arc<dyn TransitionObserver>);
        Ok(Self {
            http: reqwest::Client::new(),
            breaker,
            url,
        })
    }

    /// Fetch and parse the feed. `Ok(None)` means the breaker rejected the
    /// probe or the response had no usable payload; transport errors are
    /// recorded by the breaker and then propagated.
    async fn origins_by_dates(&self) -> anyhow::Result<Option<Vec<OriginByDate>>> {
        let result = self.breaker.guard(|| self.http.get(&self.url).send()).await?;

        let state = result.state();
        match result.into_outcome() {
            None => {
                warn!(%state, "probe rejected: circuit open");
                Ok(None)
            }
            Some(response) if response.status().is_success() => {
                let rows: Vec<Vec<Value>> = response
                    .json()
                    .await
                    .context("decoding origins payload")?;
                Ok(Some(parse_rows(&rows)))
            }
            Some(response) => {
                warn!(%state, status = %response.status(), "probe completed without a usable payload");
                Ok(None)
            }
        }
    }
}

/// Split the header row off and turn the data rows into dated readings.
/// Rows whose date fails to parse are skipped.
fn parse_rows(rows: &[Vec<Value>]) -> Vec<OriginByDate> {
    let Some((header, data)) = rows.split_first() else {
        return Vec::new();
    };

    let columns: Vec<(usize, String)> = header
        .iter()
        .enumerate()
        .filter_map(|(index, name)| name.as_str().map(|s| (index, s.to_owned())))
        .filter(|(_, name)| name != "X")
        .collect();

    data.iter()
        .filter_map(|row| {
            let date = row.first()?.as_str()?;
            let date = NaiveDate::parse_from_str(date, "%d-%m-%Y").ok()?;
            let distribution = columns
                .iter()
                .filter_map(|(index, name)| {
                    row.get(*index)?.as_i64().map(|volume| (name.clone(), volume))
                })
                .collect();
            Some(OriginByDate { date, distribution })
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = BreakerConfig::new()
        .with_open_to_half_open(Duration::from_millis(args.cooldown_ms))
        .with_half_open_to_close(args.close_after)
        .with_close_to_open(Threshold::new(
            args.open_after,
            Duration::from_millis(args.failure_window_ms),
        ));
    let client = OriginsClient::new(args.url, config)?;

    for probe in 1..=args.probes {
        match client.origins_by_dates().await {
            Ok(Some(origins)) => {
                info!(probe, rows = origins.len(), "origins feed fetched");
                if let Some(latest) = origins.last() {
                    info!(date = %latest.date, distribution = ?latest.distribution, "latest reading");
                }
            }
            Ok(None) => {}
            Err(err) => warn!(probe, error = %err, "probe failed"),
        }

        if probe < args.probes {
            tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
        }
    }

    info!(state = %client.breaker.state().await, "done");
    Ok(())
}
