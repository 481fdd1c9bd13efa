//! Adapter reply classification

use crate::command::{Command, CommandKind};

/// Replies that mean the adapter rejected or could not carry out the request
const ERROR_MARKERS: [&str; 6] = [
    "ERROR",
    "UNABLETOCONNECT",
    "CANERROR",
    "BUSERROR",
    "BUFFERFULL",
    "?",
];

/// Closed set of outcomes that drive the dispatch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Ok,
    NoData,
    Error,
    Stopped,
}

/// Outcome of a single request/response exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObdResponse {
    /// Decoded payload with the echo header removed
    Data(Vec<u8>),
    /// The adapter answered but the reply could not be decoded
    Invalid(String),
    /// Adapter reported `NO DATA`
    NoData,
    /// Adapter error or timeout
    Error,
    /// Adapter interrupted the request and needs a fresh handshake
    Stopped,
}

impl ObdResponse {
    pub fn kind(&self) -> ResponseKind {
        match self {
            ObdResponse::Data(_) | ObdResponse::Invalid(_) => ResponseKind::Ok,
            ObdResponse::NoData => ResponseKind::NoData,
            ObdResponse::Error => ResponseKind::Error,
            ObdResponse::Stopped => ResponseKind::Stopped,
        }
    }

    /// False only for replies that could not be decoded
    pub fn is_valid(&self) -> bool {
        !matches!(self, ObdResponse::Invalid(_))
    }

    /// Decoded payload; empty for every outcome except `Data`
    pub fn payload(&self) -> &[u8] {
        match self {
            ObdResponse::Data(payload) => payload,
            _ => &[],
        }
    }

    /// Classify the raw text the adapter sent before its `>` prompt
    pub fn classify(raw: &str, command: &Command) -> Self {
        let request = command.request_text();
        let lines: Vec<&str> = raw
            .split(['\r', '\n'])
            .map(|line| line.trim_matches(|c: char| c.is_whitespace() || c == '>' || c == '\0'))
            .filter(|line| !line.is_empty())
            .collect();
        let compact: Vec<String> = lines
            .iter()
            .map(|line| compact(line))
            .filter(|line| !is_noise(line, &request))
            .collect();

        let joined = compact.concat();
        if joined.contains("NODATA") {
            return ObdResponse::NoData;
        }
        if joined.contains("STOPPED") {
            return ObdResponse::Stopped;
        }
        if ERROR_MARKERS.iter().any(|marker| joined.contains(marker)) {
            return ObdResponse::Error;
        }
        if compact.is_empty() {
            return ObdResponse::Invalid(raw.trim().to_string());
        }

        let decoded = match command.kind() {
            CommandKind::Literal => Some(literal_payload(&lines, &request)),
            CommandKind::Hex => single_frame(&compact, command),
            CommandKind::MultiFrame => multi_frame(&compact, command),
        };
        decoded
            .map(ObdResponse::Data)
            .unwrap_or_else(|| ObdResponse::Invalid(raw.trim().to_string()))
    }
}

fn compact(line: &str) -> String {
    line.chars()
        .filter(|c| !c.is_whitespace() && *c != '>' && *c != '\0')
        .collect::<String>()
        .to_ascii_uppercase()
}

fn is_noise(line: &str, request: &str) -> bool {
    line.is_empty()
        || line == request
        || line.starts_with("SEARCHING")
        || line.starts_with("BUSINIT")
}

fn literal_payload(lines: &[&str], request: &str) -> Vec<u8> {
    lines
        .iter()
        .filter(|line| !is_noise(&compact(line), request))
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes()
}

fn single_frame(lines: &[String], command: &Command) -> Option<Vec<u8>> {
    let header = command.response_header();
    let bytes = decode_hex(lines.first()?)?;
    bytes.strip_prefix(&header[..]).map(<[u8]>::to_vec)
}

fn multi_frame(lines: &[String], command: &Command) -> Option<Vec<u8>> {
    let header = command.response_header();
    let mut payload = Vec::new();
    let mut saw_header = false;

    for line in lines {
        let frame = match line.split_once(':') {
            Some((_index, frame)) => frame,
            // CAN replies open with a bare byte count such as "014"
            None if line.len() <= 3 => continue,
            None => line.as_str(),
        };
        let bytes = decode_hex(frame)?;
        match bytes.strip_prefix(&header[..]) {
            Some(rest) => {
                saw_header = true;
                payload.extend_from_slice(rest);
            }
            None => payload.extend_from_slice(&bytes),
        }
    }

    saw_header.then_some(payload)
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    text.as_bytes()
        .chunks(2)
        .map(|pair| {
            let digits = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(digits, 16).ok()
        })
        .collect()
}
