//! ELM327 Request/Response Session
//!
//! Turns one [`Command`] into one [`ObdResponse`] over a [`Transport`]:
//! writes `"{group}{code}{suffix}\r"`, collects bytes up to the `>` prompt
//! and classifies the text. The session is `Open` after a successful
//! handshake, goes back through the handshake on [`ObdSession::re_init`]
//! and is terminal once finished.

use crate::command::Command;
use crate::error::ObdError;
use crate::protocol::ObdProtocol;
use crate::response::ObdResponse;
use crate::transport::{Transport, DEFAULT_READ_POLL_MS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Default timeout for OBD commands
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Protocol session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Protocol selected at the end of the handshake
    pub protocol: ObdProtocol,
    /// Time allowed for the adapter to complete one reply (ms)
    pub response_timeout_ms: u64,
    /// How long a single byte read waits before reporting nothing (ms)
    pub read_poll_ms: u64,
    /// Consecutive unanswered requests before the link is considered lost
    pub max_consecutive_timeouts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            protocol: ObdProtocol::Auto,
            response_timeout_ms: DEFAULT_TIMEOUT_MS,
            read_poll_ms: DEFAULT_READ_POLL_MS,
            max_consecutive_timeouts: 3,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ObdError> {
        if self.response_timeout_ms == 0 {
            return Err(ObdError::InvalidConfig("response_timeout_ms must be > 0".to_string()));
        }
        if self.read_poll_ms == 0 {
            return Err(ObdError::InvalidConfig("read_poll_ms must be > 0".to_string()));
        }
        if self.max_consecutive_timeouts == 0 {
            return Err(ObdError::InvalidConfig(
                "max_consecutive_timeouts must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn read_poll_interval(&self) -> Duration {
        Duration::from_millis(self.read_poll_ms)
    }
}

/// Stateful exchange layer over one transport
pub struct ObdSession<T> {
    /// Dropped on finish, which closes the underlying stream
    transport: Option<T>,
    config: SessionConfig,
    /// Reply bytes of the exchange in progress; empty between exchanges
    buffer: Vec<u8>,
    finished: bool,
    consecutive_timeouts: u32,
    /// A reply may still be in flight from a timed-out request
    needs_resync: bool,
}

impl<T: Transport> ObdSession<T> {
    /// Open a session and run the adapter handshake.
    ///
    /// A rejected or failed handshake leaves the session finished.
    pub async fn open(transport: T, config: SessionConfig) -> Self {
        let mut session = Self {
            transport: Some(transport),
            config,
            buffer: Vec::with_capacity(64),
            finished: false,
            consecutive_timeouts: 0,
            needs_resync: false,
        };
        session.handshake().await;
        session
    }

    /// True once the session failed irrecoverably or was told to finish
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Execute one command.
    ///
    /// A timeout yields `Ok(ObdResponse::Error)`; only transport faults are
    /// returned as `Err`, and they finish the session.
    pub async fn run(&mut self, command: &Command) -> Result<ObdResponse, ObdError> {
        if self.finished {
            return Err(ObdError::SessionFinished);
        }

        match self.exchange(&command.request_text()).await {
            Ok(Some(reply)) => {
                self.consecutive_timeouts = 0;
                let response = ObdResponse::classify(&reply, command);
                debug!("{} -> {:?}", command, response);
                Ok(response)
            }
            Ok(None) => {
                self.consecutive_timeouts += 1;
                warn!(
                    "No reply to {} within {}ms ({} in a row)",
                    command, self.config.response_timeout_ms, self.consecutive_timeouts
                );
                if self.consecutive_timeouts >= self.config.max_consecutive_timeouts {
                    warn!("OBD adapter stopped answering, finishing session");
                    self.finish();
                }
                Ok(ObdResponse::Error)
            }
            Err(err) => {
                error!("Exchange for {} failed: {}", command, err);
                self.finish();
                Err(err)
            }
        }
    }

    /// Reset framing state and repeat the handshake on the same transport
    pub async fn re_init(&mut self) {
        self.buffer.clear();
        self.consecutive_timeouts = 0;
        if self.finished {
            return;
        }
        info!("Re-initializing OBD adapter");
        self.handshake().await;
    }

    /// Terminal; releases the buffer and the transport. Idempotent.
    pub fn finish(&mut self) {
        self.finished = true;
        self.buffer = Vec::new();
        if self.transport.take().is_some() {
            debug!("OBD session finished");
        }
    }

    async fn handshake(&mut self) {
        for step in self.config.protocol.handshake() {
            match self.exchange(step).await {
                Ok(Some(reply)) if is_rejected(&reply) => {
                    warn!("OBD adapter rejected {}: {}", step, reply.trim());
                    self.finish();
                    return;
                }
                Ok(Some(reply)) => debug!("{} -> {}", step, reply.trim()),
                Ok(None) => {
                    warn!("No reply to {} during handshake", step);
                    self.finish();
                    return;
                }
                Err(err) => {
                    warn!("Handshake failed at {}: {}", step, err);
                    self.finish();
                    return;
                }
            }
        }
        info!("OBD adapter initialized ({:?})", self.config.protocol);
    }

    /// Write one request and collect the reply up to the prompt.
    ///
    /// `Ok(None)` on timeout. The buffer is empty again however this returns.
    async fn exchange(&mut self, request: &str) -> Result<Option<String>, ObdError> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(ObdError::SessionFinished);
        };

        if self.needs_resync {
            if !discard_pending(transport, self.config.response_timeout()).await? {
                warn!("OBD adapter keeps sending without a prompt");
                return Ok(None);
            }
            self.needs_resync = false;
        }

        self.buffer.clear();
        let outcome = read_reply(
            transport,
            &mut self.buffer,
            request,
            self.config.response_timeout(),
        )
        .await;
        let reply = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();

        match outcome {
            Ok(true) => Ok(Some(reply)),
            Ok(false) => {
                self.needs_resync = true;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// Returns `Ok(false)` when the deadline passes before the prompt arrives
async fn read_reply<T: Transport>(
    transport: &mut T,
    buffer: &mut Vec<u8>,
    request: &str,
    timeout: Duration,
) -> Result<bool, ObdError> {
    transport.write(format!("{}\r", request).as_bytes()).await?;

    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        match transport.read_byte().await? {
            Some(b'>') => return Ok(true),
            // Some adapters pad replies with NUL bytes
            Some(0) | None => {}
            Some(byte) => buffer.push(byte),
        }
    }
    Ok(false)
}

/// Drop whatever a late reply left in the stream.
///
/// Returns `Ok(false)` if bytes were still arriving when `timeout` ran out.
async fn discard_pending<T: Transport>(
    transport: &mut T,
    timeout: Duration,
) -> Result<bool, ObdError> {
    let deadline = Instant::now() + timeout;
    let mut discarded = 0usize;
    while transport.read_byte().await?.is_some() {
        discarded += 1;
        if Instant::now() >= deadline {
            debug!("Gave up after discarding {} stale bytes", discarded);
            return Ok(false);
        }
    }
    if discarded > 0 {
        debug!("Discarded {} stale bytes", discarded);
    }
    Ok(true)
}

fn is_rejected(reply: &str) -> bool {
    reply.contains('?') || reply.to_ascii_uppercase().contains("ERROR")
}
