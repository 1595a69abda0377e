//! Stream connections to data sources
//!
//! A [`StreamConnection`] is disconnected (no socket, no pending bytes),
//! connecting (non-blocking connect in flight, registered for writability) or
//! connected (registered for read readiness under its source index). Every
//! path that drops the socket goes through [`StreamConnection::disconnect`].
//!
//! Connects never block the loop: the attempt only starts the handshake, and
//! its outcome arrives later as a poll event handled by
//! [`StreamConnection::handle_event`].

use std::io::{self, ErrorKind, Read};
use std::net::SocketAddr;

use mio::event::Event;
use mio::net::TcpStream;
use mio::{Interest, Registry, Token};
use sampler_protocol::line::LineCodec;
use sampler_protocol::StreamCodec;
use tracing::{debug, info};

use crate::config::SourceConfig;

/// Size of the per-read scratch buffer
pub const READ_CHUNK: usize = 2048;

/// How a read loop over a source ended
#[derive(Debug)]
pub enum ReadOutcome {
    /// Source has no more data for now; connection stays up
    WouldBlock,
    /// Peer closed the connection (zero-length read)
    Closed,
    /// Read failed
    Failed(io::Error),
}

/// One data source connection and its sampled value
#[derive(Debug)]
pub struct StreamConnection {
    index: usize,
    label: String,
    addr: SocketAddr,
    socket: Option<TcpStream>,
    connecting: bool,
    codec: LineCodec,
    latest: Option<String>,
    fresh: bool,
    last_connect_attempt: Option<u64>,
}

impl StreamConnection {
    /// Create a disconnected source at position `index`
    pub fn new(index: usize, source: &SourceConfig, max_token_len: usize) -> Self {
        Self {
            index,
            label: source.label.clone(),
            addr: source.addr,
            socket: None,
            connecting: false,
            codec: LineCodec::with_max_token_len(max_token_len),
            latest: None,
            fresh: false,
            last_connect_attempt: None,
        }
    }

    /// Position of this source; also its poll token
    pub fn index(&self) -> usize {
        self.index
    }

    /// Telemetry field name
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Endpoint this source connects to
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Whether an established connection is held
    pub fn is_connected(&self) -> bool {
        self.socket.is_some() && !self.connecting
    }

    /// Whether a connect is still waiting for the handshake
    pub fn is_connecting(&self) -> bool {
        self.connecting
    }

    /// Whether a pending connect has been waiting longer than `timeout_ms`
    pub fn connect_expired(&self, now_ms: u64, timeout_ms: u64) -> bool {
        match self.last_connect_attempt {
            Some(started) if self.connecting => now_ms.saturating_sub(started) >= timeout_ms,
            _ => false,
        }
    }

    /// Timestamp of the most recent connection attempt
    pub fn last_connect_attempt(&self) -> Option<u64> {
        self.last_connect_attempt
    }

    /// Most recent token, fresh or not
    pub fn latest(&self) -> Option<&str> {
        self.latest.as_deref()
    }

    /// Whether the latest value arrived since the last tick
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Latest value if it arrived since the last tick
    pub fn fresh_value(&self) -> Option<&str> {
        if self.fresh {
            self.latest.as_deref()
        } else {
            None
        }
    }

    /// Mark the current value as seen by a tick
    pub fn clear_fresh(&mut self) {
        self.fresh = false;
    }

    /// Bytes received but not yet terminated
    pub fn pending(&self) -> usize {
        self.codec.pending()
    }

    /// Start one non-blocking connect
    ///
    /// The attempt time is recorded whether or not it starts. The socket is
    /// registered for both readiness kinds so the handshake outcome shows up
    /// as a poll event; all cached data is reset. Returns whether a
    /// connection is now pending or established.
    pub fn attempt_connect(&mut self, registry: &Registry, now_ms: u64) -> bool {
        if self.socket.is_some() {
            return true;
        }
        self.last_connect_attempt = Some(now_ms);
        self.codec.clear();
        self.latest = None;
        self.fresh = false;

        match self.open(registry) {
            Ok(socket) => {
                debug!("Connecting {} to {}", self.label, self.addr);
                self.socket = Some(socket);
                self.connecting = true;
                true
            }
            Err(e) => {
                debug!("Connect {} to {} failed: {}", self.label, self.addr, e);
                false
            }
        }
    }

    fn open(&self, registry: &Registry) -> io::Result<TcpStream> {
        let mut stream = TcpStream::connect(self.addr)?;
        registry.register(
            &mut stream,
            Token(self.index),
            Interest::READABLE | Interest::WRITABLE,
        )?;
        Ok(stream)
    }

    /// Check whether the pending handshake has finished
    ///
    /// Returns true once the connection is established.
    fn finish_connect(&mut self, registry: &Registry) -> bool {
        let Some(socket) = self.socket.as_mut() else {
            return false;
        };

        let failure = match socket.take_error() {
            Ok(Some(e)) | Err(e) => Some(e),
            Ok(None) => match socket.peer_addr() {
                Ok(_) => None,
                Err(e) if e.kind() == ErrorKind::NotConnected || e.kind() == ErrorKind::WouldBlock => {
                    return false
                }
                Err(e) => Some(e),
            },
        };

        if let Some(e) = failure {
            debug!("Connect {} to {} failed: {}", self.label, self.addr, e);
            self.disconnect(registry, "connect failed");
            return false;
        }

        if let Err(e) = registry.reregister(socket, Token(self.index), Interest::READABLE) {
            self.disconnect(registry, &e.to_string());
            return false;
        }
        self.connecting = false;
        info!("Connected {} to {}", self.label, self.addr);
        true
    }

    /// React to a readiness event for this source
    ///
    /// Completes a pending connect, reads whatever is ready and drops the
    /// connection on hang-up. Returns the number of tokens decoded.
    pub fn handle_event(&mut self, registry: &Registry, event: &Event) -> usize {
        if self.connecting {
            if !self.finish_connect(registry) {
                return 0;
            }
            return self.feed(registry);
        }
        if self.socket.is_none() {
            return 0;
        }

        if event.is_readable() {
            self.feed(registry)
        } else if event.is_error() || event.is_read_closed() || event.is_write_closed() {
            self.disconnect(registry, "hang-up or socket error");
            0
        } else {
            0
        }
    }

    /// Drop the socket and any partial input
    ///
    /// The latest value is kept; it is replaced on the next connect.
    pub fn disconnect(&mut self, registry: &Registry, reason: &str) {
        if let Some(mut socket) = self.socket.take() {
            if let Err(e) = registry.deregister(&mut socket) {
                debug!("Deregister {} failed: {}", self.label, e);
            }
            if self.connecting {
                debug!("Gave up connecting {} to {}: {}", self.label, self.addr, reason);
            } else {
                info!("Disconnected {} from {}: {}", self.label, self.addr, reason);
            }
        }
        self.connecting = false;
        self.codec.clear();
    }

    /// Read everything the socket has ready
    ///
    /// Returns the number of tokens decoded. A clean close or a read error
    /// disconnects the source.
    pub fn feed(&mut self, registry: &Registry) -> usize {
        if self.connecting {
            return 0;
        }
        let Some(mut socket) = self.socket.take() else {
            return 0;
        };

        let (outcome, tokens) = self.read_from(&mut socket);
        self.socket = Some(socket);

        match outcome {
            ReadOutcome::WouldBlock => {}
            ReadOutcome::Closed => self.disconnect(registry, "closed by peer"),
            ReadOutcome::Failed(e) => self.disconnect(registry, &e.to_string()),
        }
        tokens
    }

    /// Read from `reader` until it would block, closes or fails
    ///
    /// Tokens are extracted after every successful read. Returns how the loop
    /// ended and the number of tokens decoded along the way.
    pub fn read_from<R: Read>(&mut self, reader: &mut R) -> (ReadOutcome, usize) {
        let mut buf = [0u8; READ_CHUNK];
        let mut tokens = 0;

        loop {
            match reader.read(&mut buf) {
                Ok(0) => return (ReadOutcome::Closed, tokens),
                Ok(n) => tokens += self.ingest(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    return (ReadOutcome::WouldBlock, tokens)
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return (ReadOutcome::Failed(e), tokens),
            }
        }
    }

    /// Push received bytes and publish every complete token
    ///
    /// Returns the number of tokens published; the last one becomes the
    /// latest value.
    pub fn ingest(&mut self, data: &[u8]) -> usize {
        self.codec.push_bytes(data);

        let mut count = 0;
        while let Some(token) = self.codec.next_token() {
            self.latest = Some(token);
            self.fresh = true;
            count += 1;
        }
        count
    }
}
