//! Transport abstraction for raw sensor lines.
//!
//! The ingestion loop only needs two things from the link to the sensor: a
//! non-blocking "is anything buffered?" check and a way to take one line of
//! bytes. [`LineTransport`] captures that; implementations exist for async
//! byte streams (serial device nodes, TCP serial bridges, files) and for
//! in-memory channels.

mod channel;
mod stream;

pub use channel::ChannelTransport;
pub use stream::StreamTransport;

use std::fmt::Debug;

use thiserror::Error;

/// Errors reported by a [`LineTransport`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The link is gone for good (device unplugged, stream ended, peer hung up).
    #[error("transport closed: {0}")]
    Closed(String),
}

/// A source of newline-delimited byte lines.
///
/// # Example
///
/// ```
/// use airwatch::{ChannelTransport, LineTransport};
///
/// let (tx, mut transport) = ChannelTransport::create("test");
/// tx.send(b"VOC: 1, \xe7\x94\xb2\xe9\x86\x9b: 2, PM2.5: 3".to_vec()).unwrap();
/// assert!(transport.has_pending());
/// let line = transport.read_line().unwrap();
/// assert!(line.is_some());
/// ```
pub trait LineTransport: Send + Debug {
    /// Returns `true` if a line can be read without waiting.
    ///
    /// Also returns `true` once the transport has closed, so that the next
    /// [`read_line`](Self::read_line) can report the closure.
    fn has_pending(&mut self) -> bool;

    /// Take the next buffered line, without its terminator.
    ///
    /// Returns `Ok(None)` if nothing is buffered. This method never waits for
    /// more input.
    fn read_line(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Returns a human-readable description of the transport.
    ///
    /// Used for display in the TUI status bar.
    fn description(&self) -> &str;

    /// The most recent non-fatal condition reported by the transport, if any.
    fn error(&self) -> Option<String>;
}

/// Strip a trailing `\n` or `\r\n` from a raw line.
pub(crate) fn trim_line_ending(mut line: Vec<u8>) -> Vec<u8> {
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    line
}
