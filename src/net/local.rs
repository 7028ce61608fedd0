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

//! The local control/fan-out endpoint: a Unix datagram socket through which
//! co-located processes can update this node's position and coordination
//! range, subscribe to the candidate-node fan-out, and receive it.

use std::collections::VecDeque;

use thiserror::Error;
use tokio::net::UnixDatagram;
use tracing::{debug, warn};

use crate::codec::{self, CodecError};
use crate::core::types::{LocalRequest, NodeCollection};

/// Local endpoint errors.
#[derive(Debug, Error)]
pub enum LocalEndpointError {
    /// Binding the control socket failed.
    #[error("failed to bind local control socket at {path}: {source}")]
    Bind {
        /// Configured socket path.
        path: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// Removing a stale socket file before binding failed.
    #[error("failed to remove stale socket file at {path}: {source}")]
    Unlink {
        /// Configured socket path.
        path: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// Reading a datagram off the control socket failed.
    #[error("failed to receive from local control socket: {0}")]
    Recv(#[source] std::io::Error),
    /// The datagram received did not decode as a `LocalRequest`.
    #[error("malformed local request: {0}")]
    Decode(#[from] CodecError),
}

/// One subscriber to the candidate-node fan-out: the path of its listening
/// Unix datagram socket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscriber {
    /// Filesystem path of the subscriber's datagram socket.
    pub sock_addr: String,
}

/// Outcome of [`SubscriberList::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Subscriber was added.
    Added,
    /// Subscriber was already present.
    AlreadySubscribed,
    /// The list is at capacity.
    Full,
}

/// Bounded list of candidate-node-fan-out subscribers.
#[derive(Debug, Clone)]
pub struct SubscriberList {
    subscribers: VecDeque<Subscriber>,
    max_num_subs: usize,
}

impl SubscriberList {
    /// Construct an empty list with the given capacity.
    pub fn new(max_num_subs: usize) -> Self {
        Self { subscribers: VecDeque::with_capacity(max_num_subs), max_num_subs }
    }

    /// Current number of subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether there are no subscribers.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Iterate over the current subscribers.
    pub fn iter(&self) -> impl Iterator<Item = &Subscriber> {
        self.subscribers.iter()
    }

    /// Add `sock_addr` as a subscriber, unless it is already present or the
    /// list is full.
    pub fn add(&mut self, sock_addr: String) -> AddOutcome {
        if self.subscribers.iter().any(|s| s.sock_addr == sock_addr) {
            return AddOutcome::AlreadySubscribed;
        }
        if self.subscribers.len() >= self.max_num_subs {
            return AddOutcome::Full;
        }
        self.subscribers.push_back(Subscriber { sock_addr });
        AddOutcome::Added
    }

    /// Remove `sock_addr` from the subscriber list. Returns whether it was present.
    pub fn remove(&mut self, sock_addr: &str) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.sock_addr != sock_addr);
        self.subscribers.len() != before
    }
}

/// The local Unix-datagram control socket.
pub struct LocalEndpoint {
    socket: UnixDatagram,
    path: String,
}

impl LocalEndpoint {
    /// Bind the control socket at `path`, removing a stale socket file first.
    pub fn bind(path: &str) -> Result<Self, LocalEndpointError> {
        if std::path::Path::new(path).exists() {
            std::fs::remove_file(path).map_err(|source| LocalEndpointError::Unlink {
                path: path.to_string(),
                source,
            })?;
        }
        let socket = UnixDatagram::bind(path)
            .map_err(|source| LocalEndpointError::Bind { path: path.to_string(), source })?;
        debug!(%path, "bound local control socket");
        Ok(Self { socket, path: path.to_string() })
    }

    /// Receive and decode the next `LocalRequest`.
    pub async fn recv_request(&self) -> Result<LocalRequest, LocalEndpointError> {
        let mut buf = vec![0u8; crate::core::types::LOCAL_ADDR_MAX_LENGTH + 16];
        let len = self.socket.recv(&mut buf).await.map_err(LocalEndpointError::Recv)?;
        buf.truncate(len);
        Ok(codec::unpack_local_request(&buf)?)
    }

    /// Publish a candidate-node collection to every subscriber, dropping any
    /// subscriber whose socket no longer accepts datagrams rather than
    /// failing the whole fan-out.
    pub async fn publish_candidates(&self, candidates: &NodeCollection, subs: &SubscriberList) {
        if subs.is_empty() {
            return;
        }
        let bytes = codec::pack_node_collection(candidates);
        for sub in subs.iter() {
            match self.socket.send_to(&bytes, &sub.sock_addr).await {
                Ok(sent) if sent == bytes.len() => {
                    debug!(target = %sub.sock_addr, bytes = sent, "published candidates");
                }
                Ok(sent) => {
                    warn!(target = %sub.sock_addr, sent, total = bytes.len(), "short send to subscriber");
                }
                Err(e) => {
                    warn!(target = %sub.sock_addr, error = %e, "failed to publish to subscriber; leaving it subscribed");
                }
            }
        }
    }
}

impl Drop for LocalEndpoint {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rejects_duplicates_and_honors_capacity() {
        let mut subs = SubscriberList::new(2);
        assert_eq!(subs.add("/tmp/a.sock".into()), AddOutcome::Added);
        assert_eq!(subs.add("/tmp/a.sock".into()), AddOutcome::AlreadySubscribed);
        assert_eq!(subs.add("/tmp/b.sock".into()), AddOutcome::Added);
        assert_eq!(subs.add("/tmp/c.sock".into()), AddOutcome::Full);
        assert_eq!(subs.len(), 2);
    }

    #[test]
    fn remove_reports_presence() {
        let mut subs = SubscriberList::new(5);
        subs.add("/tmp/a.sock".into());
        assert!(subs.remove("/tmp/a.sock"));
        assert!(!subs.remove("/tmp/a.sock"));
        assert!(subs.is_empty());
    }

    #[tokio::test]
    async fn bind_and_receive_local_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sock_path = dir.path().join("ctl.sock");
        let endpoint = LocalEndpoint::bind(sock_path.to_str().unwrap()).expect("bind");

        let client = UnixDatagram::unbound().expect("client socket");
        let req = LocalRequest::SetCoordinationRange { coord_range: 42 };
        let bytes = codec::pack_local_request(&req).unwrap();
        client.send_to(&bytes, &sock_path).await.expect("send");

        let got = endpoint.recv_request().await.expect("recv");
        assert_eq!(got, req);
    }
}
