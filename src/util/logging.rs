//! Logging initialization.
//!
//! Resolution steps log at debug/info, model-type fallbacks at warn and
//! terminal routing failures at error. The default filter keeps hyper's
//! connection-level chatter below warn so the routing stream stays readable;
//! `RUST_LOG` overrides everything.

use crate::config::LogFormat;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directives for a configured level.
fn default_directives(level: &str) -> String {
    format!("{level},hyper=warn,hyper_util=warn")
}

/// Initialize the logging system.
///
/// # Arguments
///
/// * `level` - Log level filter (e.g., "info", "debug")
/// * `format` - Log output format (json or pretty)
pub fn init_logging(level: &str, format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => {
            registry
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            registry
                .with(fmt::layer().pretty())
                .init();
        }
    }
}
