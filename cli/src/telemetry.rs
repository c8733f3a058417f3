use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl LogFormat {
    pub fn from_str_relaxed(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initialize the tracing subscriber. Falls back to `level` when
/// `RUST_LOG` isn't set.
pub fn init_telemetry(level: &str, format: LogFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level)).context("invalid log level")?;

    let registry = Registry::default().with(env_filter);

    match format {
        LogFormat::Pretty => {
            registry.with(fmt::layer().pretty().with_target(true).with_file(true).with_line_number(true)).init();
        }
        LogFormat::Json => {
            registry.with(fmt::layer().json().with_target(true).flatten_event(true)).init();
        }
        LogFormat::Compact => {
            registry.with(fmt::layer().compact().with_target(true)).init();
        }
    }

    tracing::debug!(log_level = %level, log_format = ?format, "telemetry initialized");
    Ok(())
}

/// Span for a store-layer operation (insert, complete, migrate, ...).
#[macro_export]
macro_rules! store_span {
    ($operation:expr) => {
        tracing::info_span!("store_operation", operation = $operation)
    };
    ($operation:expr, $($key:expr => $value:expr),*) => {
        tracing::info_span!("store_operation", operation = $operation, $($key = $value),*)
    };
}

/// Logs an error and its full `source()` chain at increasing depth.
pub fn report_error(error: &anyhow::Error) {
    tracing::error!(error = %error, "command failed");
    let mut current = error.source();
    let mut depth = 1;
    while let Some(err) = current {
        tracing::error!(error = %err, depth = depth, "error cause");
        current = err.source();
        depth += 1;
    }
}
