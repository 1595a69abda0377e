//! Control datagram client
//!
//! Datagrams are sent without waiting for, or correlating, any reply. In
//! [`ResponseMode::Drain`] whatever the actuator sends back is read without
//! blocking and logged; in [`ResponseMode::Ignore`] the socket is never read.

use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use mio::net::UdpSocket;
use sampler_protocol::{ControlMessage, EncodeMessage};
use tracing::{debug, warn};

use crate::config::ResponseMode;

/// Largest datagram accepted while draining
const MAX_RESPONSE_LEN: usize = 64;

/// Fire-and-forget UDP client for the actuator
#[derive(Debug)]
pub struct UdpControlClient {
    socket: UdpSocket,
    target: SocketAddr,
    mode: ResponseMode,
    sent: u64,
    send_failures: u64,
    received: u64,
}

impl UdpControlClient {
    /// Bind an ephemeral local socket for talking to `target`
    pub fn bind(target: SocketAddr, mode: ResponseMode) -> io::Result<Self> {
        let local = match target {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };
        let socket = UdpSocket::bind(local)?;
        debug!(
            "Control socket bound to {} for actuator {}",
            socket.local_addr()?,
            target
        );
        Ok(Self {
            socket,
            target,
            mode,
            sent: 0,
            send_failures: 0,
            received: 0,
        })
    }

    /// Actuator endpoint
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Local address of the control socket
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Datagrams handed to the OS
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Datagrams the OS refused
    pub fn send_failures(&self) -> u64 {
        self.send_failures
    }

    /// Replies decoded while draining
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Send one message; failures are counted and logged, never retried
    pub fn send(&mut self, message: &ControlMessage) {
        let bytes = message.encode();
        match self.socket.send_to(&bytes, self.target) {
            Ok(_) => {
                self.sent += 1;
                debug!("Sent {:?} to {}: {:02X?}", message, self.target, bytes);
            }
            Err(e) => {
                self.send_failures += 1;
                debug!("Dropped {:?} to {}: {}", message, self.target, e);
            }
        }
    }

    /// Send a batch of messages in order
    pub fn send_all(&mut self, messages: &[ControlMessage]) {
        for message in messages {
            self.send(message);
        }
    }

    /// Read any pending replies without blocking
    ///
    /// Returns the decoded replies; always empty in [`ResponseMode::Ignore`].
    pub fn drain_responses(&mut self) -> Vec<ControlMessage> {
        let mut responses = Vec::new();
        if self.mode == ResponseMode::Ignore {
            return responses;
        }

        let mut buf = [0u8; MAX_RESPONSE_LEN];
        loop {
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => match ControlMessage::decode(&buf[..n]) {
                    Ok(message) => {
                        debug!("Actuator {} replied {:?}", from, message);
                        self.received += 1;
                        responses.push(message);
                    }
                    Err(e) => warn!("Undecodable reply from {}: {} ({:02X?})", from, e, &buf[..n]),
                },
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // ICMP port unreachable surfaces here on some platforms
                    debug!("Control socket receive failed: {}", e);
                    break;
                }
            }
        }
        responses
    }
}
