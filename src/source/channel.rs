//! Channel-based transport.
//!
//! Receives raw lines through a tokio mpsc channel. Useful when the bytes
//! come from somewhere other than an `AsyncRead` (tests, another process
//! component, a custom driver) and as the buffer behind
//! [`StreamTransport`](super::StreamTransport).

use std::collections::VecDeque;

use tokio::sync::mpsc;

use super::{trim_line_ending, LineTransport, TransportError};

/// A transport fed by an unbounded channel of raw lines.
///
/// # Example
///
/// ```
/// use airwatch::{ChannelTransport, LineTransport};
///
/// let (tx, mut transport) = ChannelTransport::create("bench rig");
/// assert!(!transport.has_pending());
/// tx.send(b"hello\r\n".to_vec()).unwrap();
/// assert_eq!(transport.read_line().unwrap(), Some(b"hello".to_vec()));
/// ```
#[derive(Debug)]
pub struct ChannelTransport {
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
    description: String,
    /// Lines pulled off the channel by `has_pending` but not yet read
    buffered: VecDeque<Vec<u8>>,
    closed: bool,
}

impl ChannelTransport {
    /// Create a new channel transport.
    ///
    /// # Arguments
    ///
    /// * `receiver` - The receiving end of an mpsc channel
    /// * `source_description` - Where the lines come from (e.g., "/dev/ttyUSB0")
    pub fn new(receiver: mpsc::UnboundedReceiver<Vec<u8>>, source_description: &str) -> Self {
        Self {
            receiver,
            description: format!("channel: {}", source_description),
            buffered: VecDeque::new(),
            closed: false,
        }
    }

    /// Create a channel pair for feeding lines to a ChannelTransport.
    ///
    /// Dropping every sender closes the transport once its buffered lines
    /// have been read.
    pub fn create(source_description: &str) -> (mpsc::UnboundedSender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx, source_description))
    }

    pub(crate) fn set_description(&mut self, description: String) {
        self.description = description;
    }

    fn fill(&mut self) {
        if self.closed {
            return;
        }
        match self.receiver.try_recv() {
            Ok(line) => self.buffered.push_back(line),
            Err(mpsc::error::TryRecvError::Empty) => {}
            Err(mpsc::error::TryRecvError::Disconnected) => self.closed = true,
        }
    }

    /// Returns `true` once all senders are gone and every line has been read.
    pub fn is_closed(&self) -> bool {
        self.closed && self.buffered.is_empty()
    }
}

impl LineTransport for ChannelTransport {
    fn has_pending(&mut self) -> bool {
        if self.buffered.is_empty() {
            self.fill();
        }
        !self.buffered.is_empty() || self.closed
    }

    fn read_line(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.buffered.is_empty() {
            self.fill();
        }
        match self.buffered.pop_front() {
            Some(line) => Ok(Some(trim_line_ending(line))),
            None if self.closed => Err(TransportError::Closed("channel disconnected".to_string())),
            None => Ok(None),
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<String> {
        None
    }
}
