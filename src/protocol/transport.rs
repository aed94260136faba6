/*!
Framed transport with receive deadlines.

Every receive has its own deadline. Reads are sliced into short polls so a
[`CancellationToken`] is noticed while the peer is silent; a frame is only
handed out once it has been read completely.
*/

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::cancel::CancellationToken;
use crate::core::{
    constants::{defaults, FRAME_HEADER_SIZE, MAX_FRAME_SIZE},
    error::{Error, Result},
    message::frame,
};

/// Longest single blocking read between cancellation checks
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A byte stream the handshake can run over
pub trait Transport: Read + Write {
    /// Bound the next blocking read; `None` blocks indefinitely
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Close both directions
    fn shutdown(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        match TcpStream::shutdown(self, Shutdown::Both) {
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

/// Length-prefixed frames over a [`Transport`]
#[derive(Debug)]
pub struct FramedTransport<T: Transport> {
    inner: T,
    timeout: Duration,
    max_frame_len: usize,
    cancel: CancellationToken,
}

impl<T: Transport> FramedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            timeout: defaults::TIMEOUT,
            max_frame_len: MAX_FRAME_SIZE,
            cancel: CancellationToken::new(),
        }
    }

    /// Per-receive timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Largest frame accepted or sent, capped at 64 KiB
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len.min(MAX_FRAME_SIZE);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Write one frame
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.cancel.check()?;
        let bytes = frame::encode(payload, self.max_frame_len)?;
        self.inner.write_all(&bytes).map_err(|e| self.map_io(e))?;
        self.inner.flush().map_err(|e| self.map_io(e))?;
        trace!(len = payload.len(), "sent frame");
        Ok(())
    }

    /// Read one complete frame within the timeout
    pub fn recv(&mut self) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.timeout;
        let mut header = [0u8; FRAME_HEADER_SIZE];
        self.fill(&mut header, deadline)?;
        let len = frame::decode_header(&header, self.max_frame_len)?;

        let mut payload = vec![0u8; len];
        self.fill(&mut payload, deadline)?;
        trace!(len, "received frame");
        Ok(payload)
    }

    /// Shut the underlying stream down
    pub fn close(&mut self) -> Result<()> {
        self.inner.shutdown()?;
        debug!("transport closed");
        Ok(())
    }

    fn timeout_error(&self) -> Error {
        Error::Timeout(self.timeout.as_millis() as u64)
    }

    fn map_io(&self, error: io::Error) -> Error {
        match error.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => self.timeout_error(),
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => Error::PeerClosed,
            _ => Error::Io(error),
        }
    }

    fn fill(&mut self, buf: &mut [u8], deadline: Instant) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            self.cancel.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Err(self.timeout_error());
            }
            let slice = (deadline - now).min(POLL_INTERVAL).max(Duration::from_millis(1));
            self.inner.set_read_timeout(Some(slice))?;

            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => return Err(Error::PeerClosed),
                Ok(n) => filled += n,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                    continue;
                }
                Err(e) => return Err(self.map_io(e)),
            }
        }
        Ok(())
    }
}
