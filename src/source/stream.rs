//! Stream-based transport.
//!
//! Reads newline-delimited bytes from an async byte stream on a background
//! task. This covers a serial device node opened as a file, a TCP serial
//! bridge (ser2net and friends), or a capture file replayed from disk.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, warn};

use super::{ChannelTransport, LineTransport, TransportError};
use crate::data::duration::format_duration;

/// Longest line forwarded to the ingestion loop. Anything longer is cut to
/// this length and the remainder up to the next newline is dropped.
pub const MAX_LINE_BYTES: usize = 4096;

/// A transport that reads lines from an async reader on a background task.
///
/// Lines are buffered in memory until the ingestion loop takes them, so the
/// foreground never waits on the device.
///
/// # Example with a byte stream
///
/// ```
/// use std::io::Cursor;
/// use std::time::Duration;
/// use airwatch::StreamTransport;
///
/// # tokio_test::block_on(async {
/// let data = b"VOC: 1\n";
/// let stream = Cursor::new(data.to_vec());
/// let transport = StreamTransport::spawn(stream, "example", Duration::from_secs(1));
/// # });
/// ```
#[derive(Debug)]
pub struct StreamTransport {
    lines: ChannelTransport,
    last_error: Arc<Mutex<Option<String>>>,
}

impl StreamTransport {
    /// Spawn a background task that reads from the given async reader.
    ///
    /// If no complete line arrives within `read_timeout`, a stall is recorded
    /// (visible through [`LineTransport::error`]) and reading continues.
    /// End of stream or a read error closes the transport.
    pub fn spawn<R>(reader: R, description: &str, read_timeout: Duration) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, mut lines) = ChannelTransport::create(description);
        lines.set_description(format!("stream: {}", description));
        let last_error = Arc::new(Mutex::new(None));
        let error_handle = last_error.clone();
        let desc = description.to_string();

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = Vec::new();
            let mut discarding = false;

            loop {
                let limit = MAX_LINE_BYTES.saturating_sub(line.len()).max(1) as u64;
                // read_until is cancel safe: on timeout the partial line stays in `line`
                let read = tokio::time::timeout(
                    read_timeout,
                    (&mut reader).take(limit).read_until(b'\n', &mut line),
                )
                .await;
                match read {
                    Err(_) => {
                        let msg = format!("No data for {}", format_duration(read_timeout));
                        debug!(source = %desc, "{}", msg);
                        *error_handle.lock() = Some(msg);
                    }
                    Ok(Ok(0)) => {
                        // EOF
                        *error_handle.lock() = Some("Connection closed".to_string());
                        break;
                    }
                    Ok(Ok(_)) => {
                        *error_handle.lock() = None;
                        let complete = line.ends_with(b"\n");

                        // Rest of an overlong line
                        if discarding {
                            line.clear();
                            discarding = !complete;
                            continue;
                        }

                        if !complete && line.len() >= MAX_LINE_BYTES {
                            debug!(source = %desc, bytes = line.len(), "Truncating overlong line");
                            discarding = true;
                        }

                        if tx.send(std::mem::take(&mut line)).is_err() {
                            // Receiver dropped
                            break;
                        }
                    }
                    Ok(Err(e)) => {
                        warn!(source = %desc, error = %e, "Sensor read failed");
                        *error_handle.lock() = Some(format!("Read error: {}", e));
                        break;
                    }
                }
            }

            // A final line without terminator is still a line
            if !line.is_empty() && !discarding {
                let _ = tx.send(line);
            }
        });

        Self { lines, last_error }
    }

    /// Open a device node (or any readable file) and spawn a reader on it.
    ///
    /// The line discipline (baud rate, parity) of a serial device is whatever
    /// the host has configured for it.
    pub async fn open<P: AsRef<Path>>(path: P, read_timeout: Duration) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::spawn(file, &path.display().to_string(), read_timeout))
    }

    /// Connect to a TCP serial bridge and spawn a reader on the socket.
    pub async fn connect(addr: &str, read_timeout: Duration) -> std::io::Result<Self> {
        let stream = tokio::net::TcpStream::connect(addr).await?;
        Ok(Self::spawn(stream, &format!("tcp://{}", addr), read_timeout))
    }

    /// Get the last error message, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }
}

impl LineTransport for StreamTransport {
    fn has_pending(&mut self) -> bool {
        self.lines.has_pending()
    }

    fn read_line(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        self.lines.read_line().map_err(|_| {
            TransportError::Closed(
                self.last_error().unwrap_or_else(|| "Stream disconnected".to_string()),
            )
        })
    }

    fn description(&self) -> &str {
        self.lines.description()
    }

    fn error(&self) -> Option<String> {
        self.last_error()
    }
}
