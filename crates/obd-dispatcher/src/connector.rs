//! Link establishment contract

use async_trait::async_trait;
use obd_protocol::ObdError;
use tokio::io::{AsyncRead, AsyncWrite};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Readable and writable halves of an established link
pub struct StreamPair {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
}

impl StreamPair {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Split one duplex stream (serial port, socket) into a pair
    pub fn split<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(reader, writer)
    }
}

/// Establishes the byte stream to the adapter (Bluetooth, serial, TCP).
///
/// The dispatcher calls `disconnect` exactly once per connection attempt,
/// whatever the outcome.
#[async_trait]
pub trait Connector: Send + Sync {
    /// `Ok(None)` means the link could not be established
    async fn connect(&self) -> Result<Option<StreamPair>, ObdError>;

    fn on_connection_success(&self) {}

    fn on_connection_failed(&self) {}

    async fn disconnect(&self);
}
