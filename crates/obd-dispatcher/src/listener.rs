//! Downstream collaborators: error listener and snapshot aggregator

use obd_protocol::{Command, DataField};
use std::collections::HashMap;

/// Latest known value per command; commands never polled are absent
pub type Snapshot = HashMap<Command, DataField>;

/// Notified when an exchange fails
pub trait ReadStatusListener: Send + Sync {
    fn on_io_error(&self);
}

impl<F> ReadStatusListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_io_error(&self) {
        self()
    }
}

/// Consumer of the sensor cache (trip computer, widgets)
pub trait Aggregator: Send + Sync {
    /// Called with the full cache after every completed pass
    fn accept_snapshot(&self, snapshot: &Snapshot);

    /// Called once the connection is torn down and the cache emptied
    fn clear(&self) {}
}

/// Aggregator that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAggregator;

impl Aggregator for NoopAggregator {
    fn accept_snapshot(&self, _snapshot: &Snapshot) {}
}
