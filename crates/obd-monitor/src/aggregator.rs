//! Aggregator that writes every completed pass to the log

use obd_dispatcher::{Aggregator, Snapshot};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct LoggingAggregator {
    passes: AtomicU64,
}

impl LoggingAggregator {
    /// Passes seen since the last clear
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }
}

impl Aggregator for LoggingAggregator {
    fn accept_snapshot(&self, snapshot: &Snapshot) {
        let pass = self.passes.fetch_add(1, Ordering::Relaxed) + 1;
        if snapshot.is_empty() {
            debug!("Pass {}: no values yet", pass);
        } else {
            info!("Pass {}: {}", pass, format_snapshot(snapshot));
        }
    }

    fn clear(&self) {
        self.passes.store(0, Ordering::Relaxed);
        info!("Sensor values cleared");
    }
}

/// `name=value` pairs sorted by command name
pub fn format_snapshot(snapshot: &Snapshot) -> String {
    let mut entries: Vec<_> = snapshot
        .iter()
        .map(|(command, field)| (command.name(), field))
        .collect();
    entries.sort_by_key(|(name, _)| *name);
    entries
        .iter()
        .map(|(name, field)| format!("{}={}", name, field))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_protocol::{pid, DataField, SensorValue};

    #[test]
    fn test_format_is_sorted_and_marks_no_data() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(pid::SPEED, DataField::Value(SensorValue::Number(42.0)));
        snapshot.insert(pid::COOLANT_TEMP, DataField::NoData);

        let line = format_snapshot(&snapshot);
        let coolant = format!("{}=NO DATA", pid::COOLANT_TEMP.name());
        let speed = format!("{}=42.00", pid::SPEED.name());
        assert_eq!(line, format!("{} {}", coolant, speed));
    }

    #[test]
    fn test_clear_resets_pass_count() {
        let aggregator = LoggingAggregator::default();
        aggregator.accept_snapshot(&Snapshot::new());
        aggregator.accept_snapshot(&Snapshot::new());
        assert_eq!(aggregator.passes(), 2);

        aggregator.clear();
        assert_eq!(aggregator.passes(), 0);
    }
}
