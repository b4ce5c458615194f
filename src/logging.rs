//! Log subscriber setup for hosts that do not install their own.

use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "info,walletlink=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    /// `WALLETLINK_LOG_JSON=1` selects JSON lines.
    pub fn from_env() -> Self {
        match std::env::var("WALLETLINK_LOG_JSON").as_deref() {
            Ok("1") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the filter.
/// Later calls are no-ops.
pub fn init_logging() { init_logging_with(LogFormat::from_env()) }

pub fn init_logging_with(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let builder = fmt::Subscriber::builder().with_env_filter(filter).with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Compact => builder.compact().with_target(false).try_init(),
    };
}
