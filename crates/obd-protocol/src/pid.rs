//! Standard OBD-II Commands
//!
//! Ready-made [`Command`] descriptors for common Mode 01/09 parameters and
//! their SAE J1979 decoding formulas.

use crate::command::{Command, CommandKind, SensorValue};
use crate::mode;

/// Engine RPM: ((A*256)+B)/4
pub const RPM: Command =
    Command::new("rpm", mode::CURRENT_DATA, 0x0C, CommandKind::Hex, 2, parse_rpm);

/// Vehicle speed: A (km/h)
pub const SPEED: Command =
    Command::new("speed", mode::CURRENT_DATA, 0x0D, CommandKind::Hex, 1, parse_byte);

/// Engine coolant temperature: A - 40 (°C)
pub const COOLANT_TEMP: Command = Command::new(
    "coolant_temp",
    mode::CURRENT_DATA,
    0x05,
    CommandKind::Hex,
    1,
    parse_temperature,
);

/// Intake air temperature: A - 40 (°C)
pub const INTAKE_AIR_TEMP: Command = Command::new(
    "intake_air_temp",
    mode::CURRENT_DATA,
    0x0F,
    CommandKind::Hex,
    1,
    parse_temperature,
);

/// Ambient air temperature: A - 40 (°C)
pub const AMBIENT_AIR_TEMP: Command = Command::new(
    "ambient_air_temp",
    mode::CURRENT_DATA,
    0x46,
    CommandKind::Hex,
    1,
    parse_temperature,
);

/// Calculated engine load: A * 100 / 255 (%)
pub const ENGINE_LOAD: Command = Command::new(
    "engine_load",
    mode::CURRENT_DATA,
    0x04,
    CommandKind::Hex,
    1,
    parse_percent,
);

/// Mass air flow rate: ((A*256)+B) / 100 (g/s)
pub const MAF: Command =
    Command::new("maf", mode::CURRENT_DATA, 0x10, CommandKind::Hex, 2, parse_maf);

/// Throttle position: A * 100 / 255 (%)
pub const THROTTLE_POSITION: Command = Command::new(
    "throttle_position",
    mode::CURRENT_DATA,
    0x11,
    CommandKind::Hex,
    1,
    parse_percent,
);

/// Fuel tank level: A * 100 / 255 (%)
pub const FUEL_LEVEL: Command = Command::new(
    "fuel_level",
    mode::CURRENT_DATA,
    0x2F,
    CommandKind::Hex,
    1,
    parse_percent,
);

/// Fuel type; does not change while driving
pub const FUEL_TYPE: Command = Command::new(
    "fuel_type",
    mode::CURRENT_DATA,
    0x51,
    CommandKind::Hex,
    1,
    parse_fuel_type,
)
.stale_tolerant();

/// Engine fuel rate: ((A*256)+B) / 20 (L/h)
pub const FUEL_RATE: Command = Command::new(
    "fuel_rate",
    mode::CURRENT_DATA,
    0x5E,
    CommandKind::Hex,
    2,
    parse_fuel_rate,
);

/// Vehicle identification number (17 ASCII characters)
pub const VIN: Command = Command::new(
    "vin",
    mode::VEHICLE_INFO,
    0x02,
    CommandKind::MultiFrame,
    17,
    parse_vin,
)
.stale_tolerant();

/// Every command in the catalogue
pub const ALL: [Command; 12] = [
    RPM,
    SPEED,
    COOLANT_TEMP,
    INTAKE_AIR_TEMP,
    AMBIENT_AIR_TEMP,
    ENGINE_LOAD,
    MAF,
    THROTTLE_POSITION,
    FUEL_LEVEL,
    FUEL_TYPE,
    FUEL_RATE,
    VIN,
];

/// Look up a catalogue command by its name (case-insensitive)
pub fn by_name(name: &str) -> Option<Command> {
    ALL.iter()
        .find(|command| command.name().eq_ignore_ascii_case(name.trim()))
        .copied()
}

fn byte(payload: &[u8], index: usize) -> f64 {
    payload.get(index).copied().unwrap_or_default() as f64
}

fn word(payload: &[u8]) -> f64 {
    byte(payload, 0) * 256.0 + byte(payload, 1)
}

fn parse_rpm(payload: &[u8]) -> SensorValue {
    SensorValue::Number(word(payload) / 4.0)
}

fn parse_byte(payload: &[u8]) -> SensorValue {
    SensorValue::Number(byte(payload, 0))
}

fn parse_temperature(payload: &[u8]) -> SensorValue {
    SensorValue::Number(byte(payload, 0) - 40.0)
}

fn parse_percent(payload: &[u8]) -> SensorValue {
    SensorValue::Number(byte(payload, 0) * 100.0 / 255.0)
}

fn parse_maf(payload: &[u8]) -> SensorValue {
    SensorValue::Number(word(payload) / 100.0)
}

fn parse_fuel_rate(payload: &[u8]) -> SensorValue {
    SensorValue::Number(word(payload) / 20.0)
}

fn parse_fuel_type(payload: &[u8]) -> SensorValue {
    let name = match payload.first().copied().unwrap_or_default() {
        0x01 => "gasoline",
        0x02 => "methanol",
        0x03 => "ethanol",
        0x04 => "diesel",
        0x05 => "lpg",
        0x06 => "cng",
        0x07 => "propane",
        0x08 => "electric",
        0x09..=0x0C => "bifuel",
        0x0D..=0x14 => "hybrid",
        _ => "unknown",
    };
    SensorValue::Text(name.to_string())
}

fn parse_vin(payload: &[u8]) -> SensorValue {
    // Frame counters and padding are not printable; the VIN is the last 17 characters left
    let chars: Vec<char> = payload
        .iter()
        .filter(|b| b.is_ascii_alphanumeric())
        .map(|&b| b as char)
        .collect();
    let start = chars.len().saturating_sub(17);
    SensorValue::Text(chars[start..].iter().collect())
}
