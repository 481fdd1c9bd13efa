//! Byte-level transport over a duplex stream

use crate::error::ObdError;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default time a single byte read waits before reporting "nothing yet"
pub const DEFAULT_READ_POLL_MS: u64 = 50;

/// Raw byte primitives the protocol session is built on.
///
/// Implementations hold no parsing logic.
#[async_trait]
pub trait Transport: Send {
    /// Send a block of bytes
    async fn write(&mut self, bytes: &[u8]) -> Result<(), ObdError>;

    /// Next byte, or `None` when nothing arrived within the poll interval.
    ///
    /// A closed stream is an error, not `None`.
    async fn read_byte(&mut self) -> Result<Option<u8>, ObdError>;
}

/// [`Transport`] over a tokio reader/writer pair
pub struct StreamTransport<R, W> {
    reader: R,
    writer: W,
    poll_interval: Duration,
}

impl<R, W> StreamTransport<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_poll_interval(reader, writer, Duration::from_millis(DEFAULT_READ_POLL_MS))
    }

    pub fn with_poll_interval(reader: R, writer: W, poll_interval: Duration) -> Self {
        Self {
            reader,
            writer,
            poll_interval,
        }
    }
}

#[async_trait]
impl<R, W> Transport for StreamTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, bytes: &[u8]) -> Result<(), ObdError> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read_byte(&mut self) -> Result<Option<u8>, ObdError> {
        match tokio::time::timeout(self.poll_interval, self.reader.read_u8()).await {
            Ok(Ok(byte)) => Ok(Some(byte)),
            Ok(Err(err)) => Err(err.into()),
            Err(_elapsed) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read_bytes() {
        let (client, mut device) = tokio::io::duplex(64);
        let (reader, writer) = tokio::io::split(client);
        let mut transport = StreamTransport::new(reader, writer);

        transport.write(b"010C1\r").await.unwrap();
        let mut request = [0u8; 6];
        device.read_exact(&mut request).await.unwrap();
        assert_eq!(&request, b"010C1\r");

        device.write_all(b">").await.unwrap();
        assert_eq!(transport.read_byte().await.unwrap(), Some(b'>'));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_stream_reports_none() {
        let (client, _device) = tokio::io::duplex(64);
        let (reader, writer) = tokio::io::split(client);
        let mut transport = StreamTransport::new(reader, writer);

        assert_eq!(transport.read_byte().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_closed_stream_is_disconnect() {
        let (client, device) = tokio::io::duplex(64);
        drop(device);
        let (reader, writer) = tokio::io::split(client);
        let mut transport = StreamTransport::new(reader, writer);

        assert!(matches!(transport.read_byte().await, Err(ObdError::Disconnected)));
    }
}
