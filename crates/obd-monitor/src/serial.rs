//! Serial port connector for USB/RS-232 ELM327 adapters

use async_trait::async_trait;
use obd_dispatcher::{Connector, StreamPair};
use obd_protocol::ObdError;
use std::time::Duration;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Opens the adapter's serial device on every connection attempt
#[derive(Debug, Clone)]
pub struct SerialConnector {
    device: String,
    baud_rate: u32,
    timeout: Duration,
}

impl SerialConnector {
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device: device.into(),
            baud_rate,
            timeout: Duration::from_secs(1),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

#[async_trait]
impl Connector for SerialConnector {
    async fn connect(&self) -> Result<Option<StreamPair>, ObdError> {
        debug!("Opening {} @{}baud", self.device, self.baud_rate);
        match tokio_serial::new(self.device.as_str(), self.baud_rate)
            .timeout(self.timeout)
            .open_native_async()
        {
            Ok(port) => Ok(Some(StreamPair::split(port))),
            Err(err) => {
                warn!("Cannot open serial port {}: {}", self.device, err);
                Ok(None)
            }
        }
    }

    fn on_connection_success(&self) {
        info!("Connected to OBD adapter on {}", self.device);
    }

    fn on_connection_failed(&self) {
        warn!("No OBD adapter on {}", self.device);
    }

    async fn disconnect(&self) {
        info!("Serial link to {} released", self.device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_device_is_not_a_link() {
        let connector = SerialConnector::new("/dev/obd-monitor-missing", 38_400);
        let link = connector.connect().await.unwrap();
        assert!(link.is_none());
    }

    #[test]
    fn test_connector_settings() {
        let connector = SerialConnector::new("/dev/ttyUSB0", 9600);
        assert_eq!(connector.device(), "/dev/ttyUSB0");
        assert_eq!(connector.baud_rate(), 9600);
    }
}
