use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_gauge!(
            "orso_queue_depth",
            Unit::Count,
            "Current number of pending mutation jobs in the queue."
        );
        describe_counter!(
            "orso_jobs_submitted_total",
            Unit::Count,
            "Total number of mutation jobs submitted."
        );
        describe_counter!(
            "orso_jobs_applied_total",
            Unit::Count,
            "Total number of mutation jobs applied to the store."
        );
        describe_counter!(
            "orso_jobs_failed_total",
            Unit::Count,
            "Total number of mutation jobs discarded after a store failure."
        );
        describe_histogram!(
            "orso_job_apply_ms",
            Unit::Milliseconds,
            "Job processing latency in milliseconds, including the rebuild."
        );
        describe_histogram!(
            "orso_cache_rebuild_ms",
            Unit::Milliseconds,
            "Snapshot rebuild latency in milliseconds."
        );
    });
}
