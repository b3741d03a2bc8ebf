//! Process wide logging set up and the metrics registry.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Subscriber;
use tracing_subscriber::{
    fmt::{format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::layers::prometheus::TaskMetrics;

/// Errors raised while setting up telemetry
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber was already installed
    #[error("telemetry was already initialised")]
    AlreadyInitialized,
    /// The log filter could not be parsed
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    /// The log format is not one of `pretty`, `compact` or `json`
    #[error("unknown log format `{0}`")]
    UnknownFormat(String),
}

/// How log records are written to stdout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi line, human oriented
    #[default]
    Pretty,
    /// One line per record
    Compact,
    /// Newline delimited JSON
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(TelemetryError::UnknownFormat(other.to_owned())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        })
    }
}

/// Settings for [`init`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is not set
    pub filter: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            format: LogFormat::default(),
        }
    }
}

/// Handles created by [`init`]
#[derive(Debug, Clone)]
pub struct Telemetry {
    metrics: TaskMetrics,
}

impl Telemetry {
    /// Wrap an existing registry without touching the global subscriber
    pub fn with_metrics(metrics: TaskMetrics) -> Self {
        Self { metrics }
    }

    /// The metrics registry shared by every [`PrometheusLayer`](crate::layers::PrometheusLayer)
    pub fn metrics(&self) -> &TaskMetrics {
        &self.metrics
    }
}

/// The formatting layer used by [`init`].
///
/// Besides events it reports every span once it closes, with its fields and
/// how long it was busy and idle, so each task's spans show up in the output.
pub fn fmt_layer<S, W>(format: LogFormat, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(writer);
    match format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().with_target(false).boxed(),
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
    }
}

/// Install the global subscriber and create the metrics registry.
///
/// `RUST_LOG` takes precedence over [`TelemetryConfig::filter`]. Only the
/// first call succeeds.
pub fn init(config: &TelemetryConfig) -> Result<Telemetry, TelemetryError> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.filter))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(config.format, std::io::stdout))
        .try_init()
        .map_err(|_| TelemetryError::AlreadyInitialized)?;

    Ok(Telemetry {
        metrics: TaskMetrics::new(),
    })
}
