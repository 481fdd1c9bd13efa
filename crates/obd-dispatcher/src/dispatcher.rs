//! OBD Dispatcher Implementation
//!
//! One background task per connection: connect, handshake, then poll the
//! command queue pass after pass until stopped or the link goes away.

use crate::config::DispatcherConfig;
use crate::connector::{BoxedReader, BoxedWriter, Connector, StreamPair};
use crate::listener::{Aggregator, ReadStatusListener, Snapshot};
use crate::queue::CommandQueue;
use arc_swap::{ArcSwap, ArcSwapOption};
use futures::FutureExt;
use obd_protocol::{
    Command, DataField, ObdError, ObdResponse, ObdSession, ResponseKind, StreamTransport,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type AdapterSession = ObdSession<StreamTransport<BoxedReader, BoxedWriter>>;

/// Connection lifecycle messages go to debug or info depending on `config.debug`
macro_rules! lifecycle {
    ($shared:expr, $($arg:tt)+) => {
        if $shared.config.debug {
            debug!($($arg)+)
        } else {
            info!($($arg)+)
        }
    };
}

/// How one pass over the queue ended
#[derive(Debug, PartialEq, Eq)]
enum PassOutcome {
    Completed { exchanges: usize },
    /// Adapter reported STOPPED; the rest of the pass was abandoned
    Stopped,
    LinkLost,
}

/// Polls the queued commands over one adapter connection at a time.
///
/// Cheap to share: every method takes `&self` and may be called from any
/// thread while the polling task runs.
pub struct ObdDispatcher {
    shared: Arc<Shared>,
}

struct Shared {
    config: DispatcherConfig,
    queue: CommandQueue,
    listener: ArcSwapOption<Box<dyn ReadStatusListener>>,
    /// Copy of the task-owned cache, republished after every change
    published: ArcSwap<Snapshot>,
    aggregator: Arc<dyn Aggregator>,
    /// Token of the running connection; `None` while idle
    cancel: ArcSwapOption<CancellationToken>,
}

impl ObdDispatcher {
    pub fn new(
        config: DispatcherConfig,
        aggregator: Arc<dyn Aggregator>,
    ) -> Result<Self, ObdError> {
        config.validate()?;
        info!(
            "OBD dispatcher created (pacing {}ms, protocol {:?})",
            config.pacing_delay_ms, config.session.protocol
        );
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                queue: CommandQueue::new(),
                listener: ArcSwapOption::empty(),
                published: ArcSwap::from_pointee(Snapshot::new()),
                aggregator,
                cancel: ArcSwapOption::empty(),
            }),
        })
    }

    /// Start the polling task for one connection.
    ///
    /// Fails with [`ObdError::AlreadyConnected`] while a previous task is
    /// still running. The handle resolves once the connection is torn down.
    pub fn connect<C>(&self, connector: C) -> Result<JoinHandle<()>, ObdError>
    where
        C: Connector + 'static,
    {
        // Claiming the slot and publishing the token is one atomic step
        let token = CancellationToken::new();
        let previous = self
            .shared
            .cancel
            .compare_and_swap(&None::<Arc<CancellationToken>>, Some(Arc::new(token.clone())));
        if previous.is_some() {
            warn!("Connect rejected: an OBD connection is already active");
            return Err(ObdError::AlreadyConnected);
        }

        let shared = Arc::clone(&self.shared);
        Ok(tokio::spawn(shared.run_connection(connector, token)))
    }

    /// Cancel the current connection; a no-op when none is running
    pub fn stop(&self) {
        if let Some(token) = self.shared.cancel.load_full() {
            lifecycle!(self.shared, "Stop reading OBD");
            token.cancel();
        }
    }

    /// Queue a command; returns false if one with the same identity is queued
    pub fn add_command(&self, command: Command) -> bool {
        let added = self.shared.queue.add(command);
        if added {
            debug!("Queued {}", command);
        }
        added
    }

    pub fn remove_command(&self, command: &Command) -> bool {
        let removed = self.shared.queue.remove(command);
        if removed {
            debug!("Dequeued {}", command);
        }
        removed
    }

    pub fn clear_commands(&self) {
        self.shared.queue.clear();
    }

    /// Queued commands in polling order
    pub fn commands(&self) -> Vec<Command> {
        self.shared.queue.snapshot().to_vec()
    }

    pub fn set_error_listener(&self, listener: Option<Box<dyn ReadStatusListener>>) {
        self.shared.listener.store(listener.map(Arc::new));
    }

    pub fn has_error_listener(&self) -> bool {
        self.shared.listener.load().is_some()
    }

    /// Copy of the latest values; mutating it does not touch the cache
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::clone(&self.shared.published.load())
    }

    /// True while a polling task is running
    pub fn is_active(&self) -> bool {
        self.shared.cancel.load().is_some()
    }
}

impl Shared {
    async fn run_connection<C: Connector>(
        self: Arc<Self>,
        connector: C,
        token: CancellationToken,
    ) {
        let mut session = None;
        // Parsers and collaborator callbacks are caller code; a panic in
        // them is one fault like any other
        let outcome = AssertUnwindSafe(self.connect_and_poll(&connector, &token, &mut session))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => lifecycle!(self, "OBD reading finished"),
            Ok(Err(ObdError::Cancelled)) => lifecycle!(self, "OBD reading cancelled"),
            Ok(Err(err)) => {
                error!("OBD connection failed: {}", err);
                self.notify_io_error();
            }
            Err(_) => {
                error!("OBD polling panicked");
                self.notify_io_error();
            }
        }

        connector.disconnect().await;
        if let Some(mut session) = session {
            session.finish();
        }
        self.cleanup();
    }

    async fn connect_and_poll<C: Connector>(
        &self,
        connector: &C,
        token: &CancellationToken,
        slot: &mut Option<AdapterSession>,
    ) -> Result<(), ObdError> {
        let link = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ObdError::Cancelled),
            link = connector.connect() => link?,
        };
        let Some(StreamPair { reader, writer }) = link else {
            warn!("OBD connector could not establish a link");
            connector.on_connection_failed();
            return Ok(());
        };
        connector.on_connection_success();

        let transport = StreamTransport::with_poll_interval(
            reader,
            writer,
            self.config.session.read_poll_interval(),
        );
        lifecycle!(self, "Start reading OBD");
        let session = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ObdError::Cancelled),
            session = ObdSession::open(transport, self.config.session.clone()) => {
                slot.insert(session)
            }
        };
        if session.is_finished() {
            return Err(ObdError::ConnectionFailed(
                "adapter handshake failed".to_string(),
            ));
        }

        self.poll(session, token).await
    }

    async fn poll(
        &self,
        session: &mut AdapterSession,
        token: &CancellationToken,
    ) -> Result<(), ObdError> {
        let mut cache = Snapshot::new();

        while !session.is_finished() {
            check_cancelled(token)?;
            let queue = self.queue.snapshot();

            match self.run_pass(&queue, session, &mut cache, token).await? {
                PassOutcome::Completed { exchanges } => {
                    self.aggregator.accept_snapshot(&cache);
                    if exchanges == 0 {
                        self.pace(token).await?;
                    }
                }
                PassOutcome::Stopped => {
                    lifecycle!(self, "OBD adapter stopped, re-initializing");
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return Err(ObdError::Cancelled),
                        _ = session.re_init() => {}
                    }
                }
                PassOutcome::LinkLost => break,
            }
        }

        warn!("OBD link lost");
        Ok(())
    }

    async fn run_pass(
        &self,
        queue: &[Command],
        session: &mut AdapterSession,
        cache: &mut Snapshot,
        token: &CancellationToken,
    ) -> Result<PassOutcome, ObdError> {
        let mut exchanges = 0;

        for command in queue {
            check_cancelled(token)?;
            if session.is_finished() {
                return Ok(PassOutcome::LinkLost);
            }
            if command.is_stale() && cache.contains_key(command) {
                continue;
            }

            let response = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(ObdError::Cancelled),
                response = session.run(command) => response?,
            };
            exchanges += 1;

            let stopped = response.kind() == ResponseKind::Stopped;
            self.apply(command, response, cache);
            self.pace(token).await?;
            if stopped {
                return Ok(PassOutcome::Stopped);
            }
        }

        Ok(PassOutcome::Completed { exchanges })
    }

    fn apply(&self, command: &Command, response: ObdResponse, cache: &mut Snapshot) {
        match response {
            ObdResponse::Data(payload) if payload.len() >= command.response_length() => {
                cache.insert(*command, DataField::Value(command.parse(&payload)));
                self.publish(cache);
            }
            ObdResponse::NoData => {
                cache.insert(*command, DataField::NoData);
                self.publish(cache);
            }
            ObdResponse::Error => {
                warn!("OBD adapter returned an error for {}", command);
                self.notify_io_error();
            }
            ObdResponse::Stopped => debug!("OBD adapter stopped while reading {}", command),
            other => warn!("Unusable response for {}: {:?}", command, other),
        }
    }

    async fn pace(&self, token: &CancellationToken) -> Result<(), ObdError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(ObdError::Cancelled),
            _ = tokio::time::sleep(self.config.pacing_delay()) => Ok(()),
        }
    }

    fn publish(&self, cache: &Snapshot) {
        self.published.store(Arc::new(cache.clone()));
    }

    fn notify_io_error(&self) {
        if let Some(listener) = self.listener.load_full() {
            if panic::catch_unwind(AssertUnwindSafe(|| listener.on_io_error())).is_err() {
                error!("OBD error listener panicked");
            }
        }
    }

    /// Runs once per connection; the dispatcher accepts `connect` again afterwards
    fn cleanup(&self) {
        self.published.store(Arc::new(Snapshot::new()));
        if panic::catch_unwind(AssertUnwindSafe(|| self.aggregator.clear())).is_err() {
            error!("OBD aggregator panicked while clearing");
        }
        self.listener.store(None);
        self.cancel.store(None);
        debug!("OBD connection resources released");
    }
}

fn check_cancelled(token: &CancellationToken) -> Result<(), ObdError> {
    if token.is_cancelled() {
        Err(ObdError::Cancelled)
    } else {
        Ok(())
    }
}
