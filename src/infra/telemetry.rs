use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global tracing subscriber and register metric descriptions.
///
/// The configured level seeds the default directive; `RUST_LOG` can still
/// override individual targets.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());

    let installed = match logging.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(true))
            .try_init(),
    };

    installed.map_err(|err| {
        InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
    })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "folia_cache_file_hit_total",
            Unit::Count,
            "Total number of file cache hits."
        );
        describe_counter!(
            "folia_cache_file_miss_total",
            Unit::Count,
            "Total number of file cache misses."
        );
        describe_counter!(
            "folia_cache_markup_hit_total",
            Unit::Count,
            "Total number of rendered-markup cache hits."
        );
        describe_counter!(
            "folia_cache_markup_miss_total",
            Unit::Count,
            "Total number of rendered-markup cache misses."
        );
        describe_counter!(
            "folia_cache_page_hit_total",
            Unit::Count,
            "Total number of compiled-page cache hits."
        );
        describe_counter!(
            "folia_cache_page_miss_total",
            Unit::Count,
            "Total number of compiled-page cache misses."
        );
        describe_counter!(
            "folia_compress_total",
            Unit::Count,
            "Total number of gzip derivations performed."
        );
    });
}
