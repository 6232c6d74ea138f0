use crate::error::{Result, ServeError};
use clap::ArgEnum;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn,docstream_jobs=info,docstream_server=info";

#[derive(Copy, Clone, Debug, PartialEq, Eq, ArgEnum)]
pub enum LogFormat {
    /// human readable, one line per event
    Compact,
    /// one JSON object per event
    Json,
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|err| ServeError::Logging(err.to_string()))
}
