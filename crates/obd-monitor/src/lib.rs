//! OBD Monitor
//!
//! Command-line front end for the dispatcher: polls a serial ELM327 adapter
//! and logs the live sensor values.

pub mod aggregator;
pub mod serial;
pub mod settings;

pub use aggregator::{format_snapshot, LoggingAggregator};
pub use serial::SerialConnector;
pub use settings::MonitorConfig;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber; `RUST_LOG` wins over `level`
pub fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {}", err))
}
