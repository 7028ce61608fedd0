// Copyright (c) 2026 P2P-DPRD Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! UDP transport between `p2p-dprd` instances.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::debug;

/// Upper bound on a single datagram, sized generously for a few thousand
/// packed `Node` records.
pub const MAX_PAYLOAD_BYTESIZE: usize = 32_768;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Binding the UDP socket to the configured port failed.
    #[error("failed to bind UDP socket on port {port}: {source}")]
    Bind {
        /// Port that failed to bind.
        port: u16,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// `sendto` failed outright.
    #[error("failed to send {size} bytes to {addr}: {source}")]
    Send {
        /// Destination address.
        addr: SocketAddr,
        /// Payload size in bytes.
        size: usize,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// `sendto` succeeded but only sent part of the buffer - UDP is
    /// datagram-oriented so this should never happen, but it is a protocol
    /// invariant violation if it does.
    #[error("short send to {addr}: sent {sent} of {total} bytes")]
    ShortSend {
        /// Destination address.
        addr: SocketAddr,
        /// Bytes actually sent.
        sent: usize,
        /// Bytes requested.
        total: usize,
    },
    /// `recvfrom` failed outright.
    #[error("failed to receive from UDP socket: {0}")]
    Recv(#[source] std::io::Error),
}

/// The UDP peer socket: receives gossip from other instances and sends
/// gossip to them.
pub struct Transport {
    socket: UdpSocket,
}

impl Transport {
    /// Bind a UDP socket on `0.0.0.0:port`.
    pub async fn bind(port: u16) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .map_err(|source| TransportError::Bind { port, source })?;
        debug!(port, "bound UDP peer socket");
        Ok(Self { socket })
    }

    /// Send `buf` to the peer at `ip` (host order)/`port`.
    pub async fn send_to(&self, buf: &[u8], ip: u32, port: u16) -> Result<(), TransportError> {
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::from(ip), port));
        let sent = self
            .socket
            .send_to(buf, addr)
            .await
            .map_err(|source| TransportError::Send { addr, size: buf.len(), source })?;
        if sent != buf.len() {
            return Err(TransportError::ShortSend { addr, sent, total: buf.len() });
        }
        debug!(bytes = sent, %addr, "sent UDP datagram");
        Ok(())
    }

    /// Receive a datagram, returning its bytes and the sender's address.
    pub async fn recv(&self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        let mut buf = vec![0u8; MAX_PAYLOAD_BYTESIZE];
        let (len, from) = self.socket.recv_from(&mut buf).await.map_err(TransportError::Recv)?;
        buf.truncate(len);
        Ok((buf, from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_datagram_loopback() {
        let a = Transport::bind(0).await.expect("bind a");
        let b = Transport::bind(0).await.expect("bind b");
        let b_port = b.socket.local_addr().unwrap().port();

        a.send_to(b"hello", u32::from(Ipv4Addr::LOCALHOST), b_port)
            .await
            .expect("send");

        let (bytes, _from) = b.recv().await.expect("recv");
        assert_eq!(&bytes, b"hello");
    }
}
