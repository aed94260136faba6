/*!
Blocking handshake server.

Each accepted connection gets its own thread and its own [`Responder`];
connections share only the provider context and the long-term identity.
*/

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    cancel::CancellationToken,
    channel::SecureChannel,
    transport::{FramedTransport, Transport, POLL_INTERVAL},
};
use crate::core::{
    constants::{defaults, MAX_FRAME_SIZE},
    crypto::PqcContext,
    error::Result,
    session::{EstablishedSession, HandshakeConfig, Responder},
};

/// An authenticated connection handed to the server's handler
#[derive(Debug)]
pub struct Connection {
    pub peer: SocketAddr,
    pub session: EstablishedSession,
    pub channel: SecureChannel<TcpStream>,
}

/// Accepts connections and runs the responder role on each
#[derive(Debug)]
pub struct PqcServer {
    listener: TcpListener,
    ctx: PqcContext,
    config: HandshakeConfig,
    timeout: Duration,
    max_frame_len: usize,
    cancel: CancellationToken,
}

impl PqcServer {
    /// Bind a listener; port 0 picks a free port
    pub fn bind<A: ToSocketAddrs>(addr: A, ctx: PqcContext, config: HandshakeConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        info!(addr = %listener.local_addr()?, "listening");
        Ok(Self {
            listener,
            ctx,
            config,
            timeout: defaults::TIMEOUT,
            max_frame_len: MAX_FRAME_SIZE,
            cancel: CancellationToken::new(),
        })
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

    /// Token that stops the accept loop and aborts running handshakes
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the responder over an already-accepted stream
    ///
    /// On failure the stream is shut down without a reply and no key
    /// material survives.
    pub fn handshake<T: Transport>(&self, stream: T) -> Result<(EstablishedSession, FramedTransport<T>)> {
        respond(&self.ctx, &self.config, self.transport(stream))
    }

    /// Accept one connection and handshake on the calling thread
    pub fn accept(&self) -> Result<Connection> {
        let (stream, peer) = self.next_stream()?;
        connection(&self.ctx, &self.config, self.transport(stream), peer)
    }

    /// Accept connections until cancelled, one thread per connection
    ///
    /// Handshake and handler errors are logged and do not stop the loop.
    pub fn serve<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(Connection) -> Result<()> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        loop {
            let (stream, peer) = match self.next_stream() {
                Ok(accepted) => accepted,
                Err(err) if self.cancel.is_cancelled() => {
                    debug!(error = %err, "accept loop stopped");
                    return Ok(());
                }
                Err(err) => return Err(err),
            };

            let ctx = self.ctx.clone();
            let config = self.config.clone();
            let transport = self.transport(stream);
            let conn_handler = Arc::clone(&handler);
            thread::Builder::new()
                .name(format!("pqc-conn-{}", peer))
                .spawn(move || {
                    let result = connection(&ctx, &config, transport, peer).and_then(|conn| (*conn_handler)(conn));
                    if let Err(err) = result {
                        warn!(%peer, error = %err, "connection failed");
                    }
                })?;
        }
    }

    fn transport<T: Transport>(&self, stream: T) -> FramedTransport<T> {
        FramedTransport::new(stream)
            .with_timeout(self.timeout)
            .with_max_frame_len(self.max_frame_len)
            .with_cancellation(self.cancel.clone())
    }

    /// Poll the listener so cancellation is noticed between connections
    fn next_stream(&self) -> Result<(TcpStream, SocketAddr)> {
        self.listener.set_nonblocking(true)?;
        loop {
            self.cancel.check()?;
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(false)?;
                    stream.set_nodelay(true)?;
                    debug!(%peer, "accepted connection");
                    return Ok((stream, peer));
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn connection(
    ctx: &PqcContext,
    config: &HandshakeConfig,
    transport: FramedTransport<TcpStream>,
    peer: SocketAddr,
) -> Result<Connection> {
    let (session, transport) = respond(ctx, config, transport)?;
    let channel = SecureChannel::new(transport, &session)?;
    Ok(Connection { peer, session, channel })
}

fn respond<T: Transport>(
    ctx: &PqcContext,
    config: &HandshakeConfig,
    mut transport: FramedTransport<T>,
) -> Result<(EstablishedSession, FramedTransport<T>)> {
    let mut responder = Responder::new(ctx.clone(), config.clone())?;
    match drive(&mut responder, &mut transport) {
        Ok(()) => {
            let session = responder.into_session()?;
            info!(kem = session.kem().name, dsa = session.dsa().name, "server handshake complete");
            Ok((session, transport))
        }
        Err(err) => {
            responder.fail(&err);
            if let Err(close_err) = transport.close() {
                debug!(error = %close_err, "closing failed transport");
            }
            Err(err)
        }
    }
}

fn drive<T: Transport>(responder: &mut Responder, transport: &mut FramedTransport<T>) -> Result<()> {
    let hello = transport.recv()?;
    let reply = responder.handle_client_hello(&hello)?;
    transport.send(&reply)?;
    let finish = transport.recv()?;
    responder.handle_client_finish(&finish)
}
