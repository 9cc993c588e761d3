//! NETCONF 1.0 end-of-message framing

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use ncif_core::SessionError;

/// Marks the end of every message in base 1.0 framing
pub const END_OF_MESSAGE: &[u8] = b"]]>]]>";

const READ_CHUNK: usize = 8192;

/// Splits a byte stream into `]]>]]>` terminated messages
pub struct FramedReader<R> {
    inner: R,
    buffer: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FramedReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }

    /// Read the next complete message, without its delimiter.
    ///
    /// Bytes after the delimiter are kept for the following call.
    pub async fn read_message(&mut self) -> Result<String, SessionError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(end) = find_delimiter(&self.buffer) {
                let message: Vec<u8> = self.buffer.drain(..end).collect();
                self.buffer.drain(..END_OF_MESSAGE.len());
                return String::from_utf8(message)
                    .map(|text| text.trim().to_string())
                    .map_err(|e| SessionError::Protocol(format!("message is not UTF-8: {}", e)));
            }

            let read = self
                .inner
                .read(&mut chunk)
                .await
                .map_err(|e| SessionError::Transport(e.to_string()))?;
            if read == 0 {
                return Err(SessionError::Transport(
                    "connection closed by peer".to_string(),
                ));
            }
            self.buffer.extend_from_slice(&chunk[..read]);
        }
    }
}

/// Write one message followed by the delimiter and flush.
pub async fn write_message<W>(writer: &mut W, message: &str) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    let io = |e: std::io::Error| SessionError::Transport(e.to_string());
    writer.write_all(message.as_bytes()).await.map_err(io)?;
    writer.write_all(END_OF_MESSAGE).await.map_err(io)?;
    writer.flush().await.map_err(io)
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(END_OF_MESSAGE.len())
        .position(|window| window == END_OF_MESSAGE)
}
