//! Tracing setup for the `lumen` binary.
//!
//! Everything the subscriber prints goes to stderr; stdout is reserved for
//! command results so they can be piped into other tools.

use clap::ValueEnum;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Filter used when `RUST_LOG` is unset. Library steps log at debug.
pub const DEFAULT_FILTER: &str = "lumen=info,lumen_cli=info";

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Colored, one event per line with target and line number.
    #[default]
    Pretty,
    /// Newline-delimited JSON.
    Json,
}

/// Installs the global subscriber. `RUST_LOG` wins over `default_filter`,
/// e.g. `RUST_LOG=lumen=debug lumen pay ...`.
pub fn init_logging(default_filter: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let output: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(std::io::stderr)
            .with_line_number(true)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry().with(output).with(filter).init();
    tracing::debug!(?format, "logging ready");
}
