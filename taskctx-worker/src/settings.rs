use std::{collections::HashMap, env};

use anyhow::Context;
use taskctx::{
    patterns::Pattern,
    telemetry::{LogFormat, TelemetryConfig},
};

pub(crate) const PATTERN_VAR: &str = "TASKCTX_PATTERN";
pub(crate) const CONCURRENCY_VAR: &str = "TASKCTX_CONCURRENCY";
pub(crate) const LOG_FORMAT_VAR: &str = "TASKCTX_LOG_FORMAT";

const DEFAULT_CONCURRENCY: usize = 10;

/// Worker settings read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub(crate) pattern: Pattern,
    pub(crate) concurrency: usize,
    pub(crate) telemetry: TelemetryConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pattern: Pattern::default(),
            concurrency: DEFAULT_CONCURRENCY,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Settings {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(env::vars().collect())
    }

    fn from_vars(vars: HashMap<String, String>) -> anyhow::Result<Self> {
        let mut settings = Self::default();
        if let Some(pattern) = vars.get(PATTERN_VAR) {
            settings.pattern = pattern
                .parse()
                .with_context(|| format!("invalid {PATTERN_VAR}"))?;
        }
        if let Some(concurrency) = vars.get(CONCURRENCY_VAR) {
            settings.concurrency = concurrency
                .trim()
                .parse()
                .with_context(|| format!("invalid {CONCURRENCY_VAR} `{concurrency}`"))?;
        }
        if let Some(format) = vars.get(LOG_FORMAT_VAR) {
            settings.telemetry.format = format
                .parse::<LogFormat>()
                .with_context(|| format!("invalid {LOG_FORMAT_VAR}"))?;
        }
        Ok(settings)
    }
}
