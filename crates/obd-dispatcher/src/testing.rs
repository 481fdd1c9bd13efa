//! Test doubles: scripted adapter, connectors and a recording aggregator

use crate::connector::{Connector, StreamPair};
use crate::listener::{Aggregator, Snapshot};
use async_trait::async_trait;
use obd_protocol::ObdError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;

pub enum Reply {
    Text(String),
    Silent,
    Hangup,
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

/// Device side of a scripted ELM327 link
#[derive(Clone, Default)]
pub struct FakeAdapter {
    requests: Arc<Mutex<Vec<(String, Instant)>>>,
    closed: Arc<AtomicBool>,
}

impl FakeAdapter {
    /// Every request, handshake included
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    /// Non-AT requests with the (virtual) time each one arrived
    pub fn timed_command_requests(&self) -> Vec<(String, Instant)> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(request, _)| !request.starts_with("AT"))
            .cloned()
            .collect()
    }

    /// Requests other than AT commands
    pub fn command_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| !r.starts_with("AT"))
            .collect()
    }

    pub fn count(&self, request: &str) -> usize {
        self.requests().iter().filter(|r| *r == request).count()
    }

    /// True once the dispatcher side of the stream was released
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Spawn an adapter answering each `\r`-terminated request with `respond`
pub fn spawn_adapter<F>(mut respond: F) -> (StreamPair, FakeAdapter)
where
    F: FnMut(&str) -> Reply + Send + 'static,
{
    let (client, device) = tokio::io::duplex(4096);
    let (mut rx, mut tx) = tokio::io::split(device);
    let adapter = FakeAdapter::default();
    let state = adapter.clone();

    tokio::spawn(async move {
        let mut line = Vec::new();
        while let Ok(byte) = rx.read_u8().await {
            if byte != b'\r' {
                line.push(byte);
                continue;
            }
            let request = String::from_utf8_lossy(&line).into_owned();
            line.clear();
            state
                .requests
                .lock()
                .unwrap()
                .push((request.clone(), Instant::now()));
            match respond(&request) {
                Reply::Text(text) => {
                    if tx.write_all(format!("{}\r\r>", text).as_bytes()).await.is_err() {
                        break;
                    }
                }
                Reply::Silent => {}
                Reply::Hangup => break,
            }
        }
        state.closed.store(true, Ordering::SeqCst);
    });

    (StreamPair::split(client), adapter)
}

/// Answer the handshake with `OK` and hand everything else to `respond`
pub fn with_handshake<F>(mut respond: F) -> impl FnMut(&str) -> Reply + Send + 'static
where
    F: FnMut(&str) -> Reply + Send + 'static,
{
    move |request| {
        if request.starts_with("AT") {
            Reply::text("OK")
        } else {
            respond(request)
        }
    }
}

/// Connector hook invocations
#[derive(Default)]
pub struct ConnectorEvents {
    pub successes: AtomicUsize,
    pub failures: AtomicUsize,
    pub disconnects: AtomicUsize,
}

impl ConnectorEvents {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

enum Outcome {
    Ready(Mutex<Option<StreamPair>>),
    Refuse,
    Fail,
    Pending,
}

pub struct TestConnector {
    outcome: Outcome,
    events: Arc<ConnectorEvents>,
}

impl TestConnector {
    fn build(outcome: Outcome) -> (Self, Arc<ConnectorEvents>) {
        let events = Arc::new(ConnectorEvents::default());
        let connector = Self {
            outcome,
            events: Arc::clone(&events),
        };
        (connector, events)
    }

    pub fn ready(pair: StreamPair) -> (Self, Arc<ConnectorEvents>) {
        Self::build(Outcome::Ready(Mutex::new(Some(pair))))
    }

    /// Returns no stream
    pub fn refusing() -> (Self, Arc<ConnectorEvents>) {
        Self::build(Outcome::Refuse)
    }

    /// Fails with an error
    pub fn failing() -> (Self, Arc<ConnectorEvents>) {
        Self::build(Outcome::Fail)
    }

    /// Never completes
    pub fn pending() -> (Self, Arc<ConnectorEvents>) {
        Self::build(Outcome::Pending)
    }
}

#[async_trait]
impl Connector for TestConnector {
    async fn connect(&self) -> Result<Option<StreamPair>, ObdError> {
        match &self.outcome {
            Outcome::Ready(pair) => Ok(pair.lock().unwrap().take()),
            Outcome::Refuse => Ok(None),
            Outcome::Fail => Err(ObdError::ConnectionFailed(
                "bluetooth socket refused".to_string(),
            )),
            Outcome::Pending => std::future::pending().await,
        }
    }

    fn on_connection_success(&self) {
        self.events.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_connection_failed(&self) {
        self.events.failures.fetch_add(1, Ordering::SeqCst);
    }

    async fn disconnect(&self) {
        self.events.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records every published snapshot along with the error count at that moment
#[derive(Default)]
pub struct RecordingAggregator {
    snapshots: Mutex<Vec<Snapshot>>,
    errors_at_publish: Mutex<Vec<usize>>,
    clears: AtomicUsize,
    errors: Arc<AtomicUsize>,
}

impl RecordingAggregator {
    pub fn new(errors: Arc<AtomicUsize>) -> Self {
        Self {
            errors,
            ..Default::default()
        }
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    pub fn errors_at_publish(&self) -> Vec<usize> {
        self.errors_at_publish.lock().unwrap().clone()
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl Aggregator for RecordingAggregator {
    fn accept_snapshot(&self, snapshot: &Snapshot) {
        self.errors_at_publish
            .lock()
            .unwrap()
            .push(self.errors.load(Ordering::SeqCst));
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `condition` until it holds; panics after ten (virtual) seconds
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
