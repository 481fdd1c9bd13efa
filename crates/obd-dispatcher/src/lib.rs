//! OBD-II Dispatcher
//!
//! Keeps a live, thread-safe list of commands and polls them round-robin
//! over one ELM327 connection, publishing the latest value of each to an
//! [`Aggregator`] and reporting failed exchanges to a [`ReadStatusListener`].

mod config;
mod connector;
mod dispatcher;
mod listener;
mod queue;

#[cfg(test)]
mod testing;

pub use config::{DispatcherConfig, DEFAULT_PACING_DELAY_MS};
pub use connector::{BoxedReader, BoxedWriter, Connector, StreamPair};
pub use dispatcher::ObdDispatcher;
pub use listener::{Aggregator, NoopAggregator, ReadStatusListener, Snapshot};
pub use queue::CommandQueue;
