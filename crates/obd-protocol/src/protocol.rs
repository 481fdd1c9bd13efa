//! OBD-II Protocol Definitions

use crate::error::ObdError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Adapter reset and formatting commands sent before the protocol selection
const RESET_SEQUENCE: [&str; 6] = ["ATD", "ATZ", "ATE0", "ATL0", "ATS0", "ATH0"];

/// Supported OBD-II protocols
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObdProtocol {
    /// Automatic protocol detection
    #[default]
    Auto,
    /// SAE J1850 PWM (41.6 kbaud)
    J1850Pwm,
    /// SAE J1850 VPW (10.4 kbaud)
    J1850Vpw,
    /// ISO 9141-2 (10.4 kbaud, 5 baud init)
    Iso9141_2,
    /// ISO 14230-4 KWP (slow init, 10.4 kbaud)
    Iso14230_4Kwp,
    /// ISO 14230-4 KWP (fast init, 10.4 kbaud)
    Iso14230_4KwpFast,
    /// ISO 15765-4 CAN (11 bit ID, 500 kbaud)
    Iso15765_4Can11bit500,
    /// ISO 15765-4 CAN (29 bit ID, 500 kbaud)
    Iso15765_4Can29bit500,
    /// ISO 15765-4 CAN (11 bit ID, 250 kbaud)
    Iso15765_4Can11bit250,
    /// ISO 15765-4 CAN (29 bit ID, 250 kbaud)
    Iso15765_4Can29bit250,
}

impl ObdProtocol {
    /// Get the ELM327 AT command for this protocol
    pub fn to_elm_command(&self) -> &'static str {
        match self {
            ObdProtocol::Auto => "ATSP0",
            ObdProtocol::J1850Pwm => "ATSP1",
            ObdProtocol::J1850Vpw => "ATSP2",
            ObdProtocol::Iso9141_2 => "ATSP3",
            ObdProtocol::Iso14230_4Kwp => "ATSP4",
            ObdProtocol::Iso14230_4KwpFast => "ATSP5",
            ObdProtocol::Iso15765_4Can11bit500 => "ATSP6",
            ObdProtocol::Iso15765_4Can29bit500 => "ATSP7",
            ObdProtocol::Iso15765_4Can11bit250 => "ATSP8",
            ObdProtocol::Iso15765_4Can29bit250 => "ATSP9",
        }
    }

    /// Check if this is a CAN protocol
    pub fn is_can(&self) -> bool {
        matches!(
            self,
            ObdProtocol::Iso15765_4Can11bit500
                | ObdProtocol::Iso15765_4Can29bit500
                | ObdProtocol::Iso15765_4Can11bit250
                | ObdProtocol::Iso15765_4Can29bit250
        )
    }

    /// Get the default baud rate for serial communication
    pub fn default_baud_rate(&self) -> u32 {
        // ELM327 adapters typically use 38400 or higher
        if self.is_can() {
            115200
        } else {
            38400
        }
    }

    /// Full adapter handshake: reset, disable echo/linefeeds/spaces/headers,
    /// then select this protocol.
    pub fn handshake(&self) -> impl Iterator<Item = &'static str> {
        RESET_SEQUENCE
            .into_iter()
            .chain(std::iter::once(self.to_elm_command()))
    }
}

impl FromStr for ObdProtocol {
    type Err = ObdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let protocol = match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "0" => ObdProtocol::Auto,
            "j1850_pwm" | "1" => ObdProtocol::J1850Pwm,
            "j1850_vpw" | "2" => ObdProtocol::J1850Vpw,
            "iso9141_2" | "3" => ObdProtocol::Iso9141_2,
            "iso14230_4_kwp" | "4" => ObdProtocol::Iso14230_4Kwp,
            "iso14230_4_kwp_fast" | "5" => ObdProtocol::Iso14230_4KwpFast,
            "iso15765_4_can11bit500" | "6" => ObdProtocol::Iso15765_4Can11bit500,
            "iso15765_4_can29bit500" | "7" => ObdProtocol::Iso15765_4Can29bit500,
            "iso15765_4_can11bit250" | "8" => ObdProtocol::Iso15765_4Can11bit250,
            "iso15765_4_can29bit250" | "9" => ObdProtocol::Iso15765_4Can29bit250,
            other => return Err(ObdError::UnsupportedProtocol(other.to_string())),
        };
        Ok(protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_ends_with_protocol_selection() {
        let steps: Vec<_> = ObdProtocol::Iso15765_4Can11bit500.handshake().collect();
        assert_eq!(steps.first(), Some(&"ATD"));
        assert_eq!(steps.last(), Some(&"ATSP6"));
        assert_eq!(steps.len(), 7);
    }

    #[test]
    fn test_parse_protocol_names() {
        assert_eq!("auto".parse::<ObdProtocol>().unwrap(), ObdProtocol::Auto);
        assert_eq!("7".parse::<ObdProtocol>().unwrap(), ObdProtocol::Iso15765_4Can29bit500);
        assert!(matches!(
            "kline".parse::<ObdProtocol>(),
            Err(ObdError::UnsupportedProtocol(_))
        ));
    }

    #[test]
    fn test_baud_rate_by_bus_type() {
        assert_eq!(ObdProtocol::Iso15765_4Can11bit250.default_baud_rate(), 115200);
        assert_eq!(ObdProtocol::Auto.default_baud_rate(), 38400);
    }
}
