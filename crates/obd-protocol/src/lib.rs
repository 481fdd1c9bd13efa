//! OBD-II Protocol Implementation
//!
//! Request/response exchange with ELM327-compatible adapters over any
//! byte stream: command descriptors, reply classification, the byte
//! transport and the stateful protocol session.

mod command;
mod error;
pub mod pid;
mod protocol;
mod response;
mod session;
mod transport;

pub use command::{Command, CommandKind, DataField, ResponseParser, SensorValue};
pub use error::ObdError;
pub use protocol::ObdProtocol;
pub use response::{ObdResponse, ResponseKind};
pub use session::{ObdSession, SessionConfig, DEFAULT_TIMEOUT_MS};
pub use transport::{StreamTransport, Transport, DEFAULT_READ_POLL_MS};

/// OBD-II mode constants
pub mod mode {
    /// Current data
    pub const CURRENT_DATA: u8 = 0x01;
    /// Vehicle information
    pub const VEHICLE_INFO: u8 = 0x09;
}
