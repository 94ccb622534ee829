//! buildflux - publish one finished build to InfluxDB
//!
//! ## Usage
//!
//! ```bash
//! BUILDFLUX_BUILD_FILE=build.json BUILDFLUX_TARGET=primary buildflux
//! ```
//!
//! The build file holds `{"build": {...}, "options": {...}}`. Targets come
//! from the store in `BUILDFLUX_CONFIG_DIR`. The job's explicit Target and
//! every matching global listener are published in one pass, explicit first.
//!
//! ## Environment Variables
//!
//! - `BUILDFLUX_CONFIG_DIR`: Target store directory (default: ".")
//! - `BUILDFLUX_BUILD_FILE`: build description (required)
//! - `BUILDFLUX_TARGET`: Target selected by the job (optional)
//! - `BUILDFLUX_LOG_LEVEL`: Log level (default: "info")
//! - `BUILDFLUX_LOG_FORMAT`: json or pretty (default: "pretty")
//! - `BUILDFLUX_HTTP_TIMEOUT_SECS`: request timeout (default: 30)
//! - `BUILDFLUX_HTTP_CONNECT_TIMEOUT_SECS`: connect timeout (default: 10)

use anyhow::Context;
use buildflux::config::{Config, LogFormat};
use buildflux::{
    BuildRecord, GeneratorRegistry, GlobalListener, HttpClient, PublicationService,
    PublishOptions, TargetStore, metrics,
};
use serde::Deserialize;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Deserialize)]
struct PublishRequest {
    build: BuildRecord,
    #[serde(default)]
    options: PublishOptions,
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = Config::from_env()?;
    init_tracing(&config);

    if let Err(e) = metrics::Metrics::init() {
        warn!(error = %e, "Metrics unavailable");
    }

    let store = Arc::new(TargetStore::open(&config.config_dir)?);
    info!(
        store = %store.path().display(),
        targets = store.snapshot().len(),
        "Starting buildflux"
    );

    let build_file = config
        .build_file
        .as_ref()
        .context("BUILDFLUX_BUILD_FILE is not set")?;
    let raw = std::fs::read_to_string(build_file)
        .with_context(|| format!("reading {}", build_file.display()))?;
    let request: PublishRequest = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", build_file.display()))?;

    let http = HttpClient::new(config.http_timeout, config.http_connect_timeout)?;
    let service = PublicationService::new(Arc::new(GeneratorRegistry::with_defaults()), http);

    let explicit = config
        .target
        .as_deref()
        .map(|description| {
            store
                .get(description)
                .with_context(|| format!("unknown target '{description}'"))
        })
        .transpose()?;
    let targets =
        GlobalListener::new(Arc::clone(&store)).publication_targets(&request.build, explicit);

    let failed = match service
        .perform(&request.build, &targets, &request.options)
        .await
    {
        Ok(report) => {
            info!(targets = report.targets.len(), points = report.points, "Publication finished");
            false
        }
        Err(e) => {
            error!(error = %e, "Publication failed");
            true
        }
    };

    debug!(metrics = %metrics::gather(), "Publication metrics");

    if failed {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
