//! Dispatcher configuration

use obd_protocol::{ObdError, SessionConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default spacing between two exchanges (ms)
pub const DEFAULT_PACING_DELAY_MS: u64 = 100;

/// Configuration for the OBD dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Delay after every exchange so the adapter is never hit back-to-back (ms)
    pub pacing_delay_ms: u64,
    /// Log connection lifecycle at debug level instead of info
    pub debug: bool,
    /// Protocol session settings
    pub session: SessionConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            pacing_delay_ms: DEFAULT_PACING_DELAY_MS,
            debug: false,
            session: SessionConfig::default(),
        }
    }
}

impl DispatcherConfig {
    pub fn validate(&self) -> Result<(), ObdError> {
        if self.pacing_delay_ms == 0 {
            return Err(ObdError::InvalidConfig("pacing_delay_ms must be > 0".to_string()));
        }
        self.session.validate()
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }
}
