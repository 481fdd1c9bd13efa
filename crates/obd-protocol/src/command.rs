//! Command descriptors and parsed sensor values

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Decodes a response payload into a sensor value.
///
/// Only invoked with payloads at least `response_length` bytes long.
pub type ResponseParser = fn(&[u8]) -> SensorValue;

/// How a command is framed on the wire and how its reply is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Single-frame hex reply; the request asks for exactly one ECU response
    Hex,
    /// Hex reply that may span several lines (e.g. VIN)
    MultiFrame,
    /// Reply is kept as raw text
    Literal,
}

impl CommandKind {
    /// Suffix appended after the group/code header
    pub fn request_suffix(&self) -> &'static str {
        match self {
            // Response count hint: the adapter returns after the first ECU answers
            CommandKind::Hex => "1",
            CommandKind::MultiFrame | CommandKind::Literal => "",
        }
    }
}

/// A decoded sensor reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SensorValue {
    Number(f64),
    Text(String),
    Raw(Vec<u8>),
}

impl SensorValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            SensorValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SensorValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Number(value) => write!(f, "{:.2}", value),
            SensorValue::Text(text) => f.write_str(text),
            SensorValue::Raw(bytes) => {
                for byte in bytes {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// A cache entry: either a parsed value or the adapter's explicit "no data".
///
/// A command that was never polled has no entry at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataField {
    Value(SensorValue),
    NoData,
}

impl DataField {
    /// The parsed value, if the adapter returned one
    pub fn value(&self) -> Option<&SensorValue> {
        match self {
            DataField::Value(value) => Some(value),
            DataField::NoData => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, DataField::NoData)
    }
}

impl fmt::Display for DataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataField::Value(value) => value.fmt(f),
            DataField::NoData => f.write_str("NO DATA"),
        }
    }
}

/// Immutable request descriptor for one diagnostic parameter.
///
/// Identity is `(group, code)`: two commands with the same header compare
/// equal and hash the same regardless of name, kind or parser.
#[derive(Clone, Copy)]
pub struct Command {
    name: &'static str,
    group: u8,
    code: u8,
    kind: CommandKind,
    response_length: usize,
    stale: bool,
    parser: ResponseParser,
}

impl Command {
    /// Create a command that is re-queried on every pass
    pub const fn new(
        name: &'static str,
        group: u8,
        code: u8,
        kind: CommandKind,
        response_length: usize,
        parser: ResponseParser,
    ) -> Self {
        Self {
            name,
            group,
            code,
            kind,
            response_length,
            stale: false,
            parser,
        }
    }

    /// Mark the command as stale-tolerant: once cached it is not re-queried
    pub const fn stale_tolerant(self) -> Self {
        Self { stale: true, ..self }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Service mode byte (e.g. `0x01` for current data)
    pub fn group(&self) -> u8 {
        self.group
    }

    /// Parameter ID within the group
    pub fn code(&self) -> u8 {
        self.code
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Minimum payload length for a reply to be parsed
    pub fn response_length(&self) -> usize {
        self.response_length
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Request text without the trailing carriage return
    pub fn request_text(&self) -> String {
        format!(
            "{:02X}{:02X}{}",
            self.group,
            self.code,
            self.kind.request_suffix()
        )
    }

    /// Header bytes the adapter echoes in front of a positive reply
    pub fn response_header(&self) -> [u8; 2] {
        [self.group.wrapping_add(0x40), self.code]
    }

    /// Run the pluggable parser over a reply payload
    pub fn parse(&self, payload: &[u8]) -> SensorValue {
        (self.parser)(payload)
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        self.group == other.group && self.code == other.code
    }
}

impl Eq for Command {}

impl Hash for Command {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.group.hash(state);
        self.code.hash(state);
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("header", &format_args!("{:02X}{:02X}", self.group, self.code))
            .field("kind", &self.kind)
            .field("response_length", &self.response_length)
            .field("stale", &self.stale)
            .finish()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:02X}{:02X})", self.name, self.group, self.code)
    }
}
