//! OBD Monitor - Main Entry Point
//!
//! Usage: `obd-monitor [config.toml]`

use anyhow::Context;
use obd_dispatcher::ObdDispatcher;
use obd_monitor::{init_logging, LoggingAggregator, MonitorConfig, SerialConnector};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = MonitorConfig::load(path.as_deref()).context("failed to load configuration")?;
    init_logging(&config.log_level, config.json_logs)?;
    config.validate()?;

    info!("=== OBD Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let aggregator = Arc::new(LoggingAggregator::default());
    let dispatcher = ObdDispatcher::new(config.dispatcher.clone(), aggregator)?;
    for command in config.resolve_commands()? {
        dispatcher.add_command(command);
    }
    info!("Polling {} commands on {}", dispatcher.commands().len(), config.device);

    let connector = SerialConnector::new(config.device.as_str(), config.baud_rate());
    loop {
        // The listener is dropped at the end of every connection
        dispatcher.set_error_listener(Some(Box::new(|| warn!("OBD read failed"))));
        let mut handle = dispatcher.connect(connector.clone())?;

        tokio::select! {
            result = &mut handle => {
                result.context("polling task panicked")?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                dispatcher.stop();
                handle.await.context("polling task panicked")?;
                return Ok(());
            }
        }

        if config.reconnect_delay_secs == 0 {
            return Ok(());
        }
        info!("Reconnecting in {}s", config.reconnect_delay_secs);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(config.reconnect_delay_secs)) => {}
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}
