/*!
Blocking handshake client.
*/

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use super::{
    cancel::CancellationToken,
    channel::SecureChannel,
    transport::{FramedTransport, Transport},
};
use crate::core::{
    constants::{defaults, MAX_FRAME_SIZE},
    crypto::PqcContext,
    error::Result,
    session::{EstablishedSession, HandshakeConfig, Initiator},
};

/// Runs the initiator role over a transport
#[derive(Debug, Clone)]
pub struct PqcClient {
    ctx: PqcContext,
    config: HandshakeConfig,
    timeout: Duration,
    max_frame_len: usize,
    cancel: CancellationToken,
}

impl PqcClient {
    /// Create a new client.
    pub fn new(ctx: PqcContext, config: HandshakeConfig) -> Self {
        Self {
            ctx,
            config,
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

    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts handshakes started by this client
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Connect over TCP, handshake and open a secure channel
    pub fn connect<A: ToSocketAddrs>(&self, addr: A) -> Result<(EstablishedSession, SecureChannel<TcpStream>)> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        debug!(peer = ?stream.peer_addr().ok(), "connected");

        let (session, transport) = self.handshake(stream)?;
        let channel = SecureChannel::new(transport, &session)?;
        Ok((session, channel))
    }

    /// Run the initiator over an already-connected stream
    ///
    /// On failure the stream is shut down and no key material survives.
    pub fn handshake<T: Transport>(&self, stream: T) -> Result<(EstablishedSession, FramedTransport<T>)> {
        let mut transport = FramedTransport::new(stream)
            .with_timeout(self.timeout)
            .with_max_frame_len(self.max_frame_len)
            .with_cancellation(self.cancel.clone());
        let mut initiator = Initiator::new(self.ctx.clone(), self.config.clone());

        match drive(&mut initiator, &mut transport) {
            Ok(()) => {
                let session = initiator.into_session()?;
                info!(kem = session.kem().name, dsa = session.dsa().name, "client handshake complete");
                Ok((session, transport))
            }
            Err(err) => {
                initiator.fail(&err);
                if let Err(close_err) = transport.close() {
                    debug!(error = %close_err, "closing failed transport");
                }
                Err(err)
            }
        }
    }
}

fn drive<T: Transport>(initiator: &mut Initiator, transport: &mut FramedTransport<T>) -> Result<()> {
    let hello = initiator.start()?;
    transport.send(&hello)?;
    let reply = transport.recv()?;
    let finish = initiator.handle_server_hello(&reply)?;
    transport.send(&finish)?;
    initiator.finish_sent()
}
