//! Wiring one middleware pattern and its handler into a [`ServeMux`].
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use taskctx_core::mux::ServeMux;
use thiserror::Error;

use crate::{
    layers::{
        logging::{handle_task_with_logging, LoggerLayer},
        pass_value::{handle_pass_value, PassValueLayer},
        prometheus::PrometheusLayer,
        return_value::{handle_return_value, ReturnValueLayer},
        tracing::{handle_task_with_tracing, TraceLayer},
    },
    tasks::{handle_email_delivery_task, TYPE_EMAIL_DELIVERY},
    telemetry::Telemetry,
};

/// The middleware pattern a worker runs with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pattern {
    /// [`PassValueLayer`] with [`handle_pass_value`]
    PassValue,
    /// [`ReturnValueLayer`] with [`handle_return_value`]
    #[default]
    ReturnValue,
    /// [`TraceLayer`] with [`handle_task_with_tracing`]
    Tracing,
    /// [`PrometheusLayer`] with [`handle_email_delivery_task`]
    Metrics,
    /// [`LoggerLayer`] with [`handle_task_with_logging`]
    Logging,
}

impl Pattern {
    /// Every pattern
    pub const ALL: [Pattern; 5] = [
        Pattern::PassValue,
        Pattern::ReturnValue,
        Pattern::Tracing,
        Pattern::Metrics,
        Pattern::Logging,
    ];

    /// The name used in settings
    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::PassValue => "pass-value",
            Pattern::ReturnValue => "return-value",
            Pattern::Tracing => "tracing",
            Pattern::Metrics => "metrics",
            Pattern::Logging => "logging",
        }
    }
}

/// The name does not match any [`Pattern`]
#[derive(Debug, Error)]
#[error("unknown pattern `{0}`, expected one of pass-value, return-value, tracing, metrics, logging")]
pub struct UnknownPattern(String);

impl FromStr for Pattern {
    type Err = UnknownPattern;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Pattern::ALL
            .into_iter()
            .find(|pattern| pattern.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPattern(s.to_owned()))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route `email:deliver` through the middleware and handler of `pattern`
pub fn build_mux(pattern: Pattern, telemetry: &Telemetry) -> ServeMux {
    let mut mux = ServeMux::new();
    match pattern {
        Pattern::PassValue => mux
            .use_layer(PassValueLayer::new())
            .handle_func(TYPE_EMAIL_DELIVERY, handle_pass_value),
        Pattern::ReturnValue => mux
            .use_layer(ReturnValueLayer::new())
            .handle_func(TYPE_EMAIL_DELIVERY, handle_return_value),
        Pattern::Tracing => mux
            .use_layer(TraceLayer::new())
            .handle_func(TYPE_EMAIL_DELIVERY, handle_task_with_tracing),
        Pattern::Metrics => mux
            .use_layer(PrometheusLayer::new(telemetry.metrics().clone()))
            .handle_func(TYPE_EMAIL_DELIVERY, handle_email_delivery_task),
        Pattern::Logging => mux
            .use_layer(LoggerLayer::new())
            .handle_func(TYPE_EMAIL_DELIVERY, handle_task_with_logging),
    };
    mux
}

#[cfg(test)]
mod tests {
    use taskctx_core::handler::Handler;

    use super::*;
    use crate::{layers::prometheus::TaskMetrics, tasks::new_email_delivery_task};

    #[test]
    fn names_round_trip() {
        for pattern in Pattern::ALL {
            assert_eq!(pattern.to_string().parse::<Pattern>().unwrap(), pattern);
        }
        assert_eq!("Metrics".parse::<Pattern>().unwrap(), Pattern::Metrics);
        assert!("metric".parse::<Pattern>().is_err());
        assert_eq!(Pattern::default(), Pattern::ReturnValue);
    }

    #[tokio::test]
    async fn every_pattern_handles_email_delivery() {
        let telemetry = Telemetry::with_metrics(TaskMetrics::new());
        for pattern in Pattern::ALL {
            let mux = build_mux(pattern, &telemetry);
            let mut task = new_email_delivery_task(1, "welcome").unwrap();
            mux.process_task(&mut task)
                .await
                .unwrap_or_else(|e| panic!("{pattern}: {e}"));
        }
        assert!(telemetry
            .metrics()
            .render()
            .contains(r#"processed_tasks_total{task_type="email:deliver"} 1"#));
    }

    #[tokio::test]
    async fn unrouted_types_are_not_found() {
        let telemetry = Telemetry::with_metrics(TaskMetrics::new());
        let mux = build_mux(Pattern::Metrics, &telemetry);
        let mut task = taskctx_core::task::Task::new("sms:deliver", Vec::new());
        let err = mux.process_task(&mut task).await.unwrap_err();
        assert!(err.is::<taskctx_core::error::HandlerNotFound>());
        assert!(telemetry
            .metrics()
            .render()
            .contains(r#"processed_tasks_total{task_type="sms:deliver"} 1"#));
    }
}
