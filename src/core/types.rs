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

//! Core data types: `Node`, `NodeCollection`, `LocalRequest`.

/// Protocol version embedded in every `NodeCollection` header.
pub const VERSION_ID: u16 = 1;

/// Absolute hard ceiling on any `NodeCollection`'s allocated capacity.
pub const NODES_MAX_SIZE: usize = 10_000;

/// A NodeID of zero is reserved as a tombstone / sentinel for "invalid".
pub const TOMBSTONE_ID: u32 = 0;

/// Identifies what a `NodeCollection`'s payload represents and whether the
/// sender expects a reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadType {
    /// Random-list nodes, no reply requested.
    RndNoreq,
    /// Random-list nodes, reply requested.
    RndReq,
    /// Important-list nodes, no reply requested.
    ImpNoreq,
    /// Important-list nodes, reply requested.
    ImpReq,
    /// Internally constructed collection (candidate fan-out). Never sent over UDP.
    Internal,
}

impl PayloadType {
    /// Wire representation of this tag.
    pub fn as_u8(self) -> u8 {
        match self {
            PayloadType::RndNoreq => 0,
            PayloadType::RndReq => 1,
            PayloadType::ImpNoreq => 2,
            PayloadType::ImpReq => 3,
            PayloadType::Internal => 4,
        }
    }

    /// Parse a wire tag, if it names one of the known variants.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(PayloadType::RndNoreq),
            1 => Some(PayloadType::RndReq),
            2 => Some(PayloadType::ImpNoreq),
            3 => Some(PayloadType::ImpReq),
            4 => Some(PayloadType::Internal),
            _ => None,
        }
    }
}

/// One remote or local peer, as tracked by the discovery protocol.
///
/// `utility` is transient: it is never present on the wire and is recomputed
/// on demand against a reference node (see [`crate::store::NodeStore::compute_utility`]).
#[derive(Clone, Copy, Debug)]
pub struct Node {
    /// 32-bit identifier. `0` is a tombstone and must never be produced by a live peer.
    pub node_id: u32,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Coordination range in meters.
    pub coord_range: u16,
    /// IPv4 address, host byte order.
    pub ip_addr: u32,
    /// UDP port.
    pub port: u16,
    /// Opaque pass-through IP of a co-located RADAC instance.
    pub radac_ip: u32,
    /// Opaque pass-through port of a co-located RADAC instance.
    pub radac_port: u16,
    /// Seconds since epoch at which this Node entered the local process's view.
    pub time_stamp: u32,
    /// Utility of this node with respect to some reference node. Not on the wire.
    pub utility: f64,
}

impl Node {
    /// Construct a new Node. `utility` starts at `0.0` and is computed later.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node_id: u32,
        lat: f64,
        lon: f64,
        coord_range: u16,
        ip_addr: u32,
        port: u16,
        radac_ip: u32,
        radac_port: u16,
        time_stamp: u32,
    ) -> Self {
        Self {
            node_id,
            lat,
            lon,
            coord_range,
            ip_addr,
            port,
            radac_ip,
            radac_port,
            time_stamp,
            utility: 0.0,
        }
    }

    /// A node with `node_id == 0` is a tombstone and must be treated as absent.
    pub fn is_tombstone(&self) -> bool {
        self.node_id == TOMBSTONE_ID
    }

    /// Compare all wire-carried fields (everything but the transient `utility`).
    pub fn wire_eq(&self, other: &Node) -> bool {
        self.node_id == other.node_id
            && self.lat.to_bits() == other.lat.to_bits()
            && self.lon.to_bits() == other.lon.to_bits()
            && self.coord_range == other.coord_range
            && self.ip_addr == other.ip_addr
            && self.port == other.port
            && self.radac_ip == other.radac_ip
            && self.radac_port == other.radac_port
            && self.time_stamp == other.time_stamp
    }
}

/// A typed, bounded, ordered sequence of [`Node`]s.
///
/// `max_len` is the allocated capacity ceiling (never on the wire; re-derived
/// on unpack as `nodes.len()` since a freshly unpacked collection is exactly
/// as large as it needs to be).
#[derive(Clone, Debug)]
pub struct NodeCollection {
    /// Protocol version that produced this collection.
    pub version_id: u16,
    /// What the payload represents.
    pub payload_type: PayloadType,
    /// Allocated capacity ceiling. Never exceeds [`NODES_MAX_SIZE`].
    pub max_len: usize,
    /// Live (and, if present, tombstoned-but-not-yet-compacted) entries.
    pub nodes: Vec<Node>,
}

impl NodeCollection {
    /// Construct an empty collection with the given capacity, clamped to [`NODES_MAX_SIZE`].
    pub fn new(payload_type: PayloadType, max_len: usize) -> Self {
        let max_len = max_len.min(NODES_MAX_SIZE);
        Self {
            version_id: VERSION_ID,
            payload_type,
            max_len,
            nodes: Vec::with_capacity(max_len),
        }
    }

    /// Wrap an existing, already-sized vector of nodes (used for one-off outgoing payloads).
    pub fn from_nodes(payload_type: PayloadType, nodes: Vec<Node>) -> Self {
        let max_len = nodes.len().min(NODES_MAX_SIZE);
        Self {
            version_id: VERSION_ID,
            payload_type,
            max_len,
            nodes,
        }
    }

    /// Number of entries currently held (may include tombstones pending compaction).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Maximum byte length of a `LocalRequest` subscribe/unsubscribe path, terminator included.
pub const LOCAL_ADDR_MAX_LENGTH: usize = 512;

/// A control message sent by a local client on the [`crate::net::local::LocalEndpoint`] socket.
#[derive(Clone, Debug, PartialEq)]
pub enum LocalRequest {
    /// Update the local node's geographic position.
    SetPosition {
        /// New latitude, degrees.
        lat: f64,
        /// New longitude, degrees.
        lon: f64,
    },
    /// Update the local node's coordination range.
    SetCoordinationRange {
        /// New coordination range, meters.
        coord_range: u16,
    },
    /// Subscribe a local datagram path to the candidate-node fan-out.
    SubCandNodes {
        /// Filesystem path of the subscriber's datagram socket.
        sock_addr: String,
    },
    /// Unsubscribe a local datagram path from the candidate-node fan-out.
    UnsubCandNodes {
        /// Filesystem path of the subscriber's datagram socket.
        sock_addr: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_type_round_trips_known_tags() {
        for tag in 0u8..=4 {
            let pt = PayloadType::from_u8(tag).expect("known tag");
            assert_eq!(pt.as_u8(), tag);
        }
    }

    #[test]
    fn payload_type_rejects_unknown_tags() {
        assert!(PayloadType::from_u8(5).is_none());
        assert!(PayloadType::from_u8(255).is_none());
    }

    #[test]
    fn tombstone_detection() {
        let n = Node::new(0, 1.0, 2.0, 10, 0, 0, 0, 0, 0);
        assert!(n.is_tombstone());
        let n = Node::new(7, 1.0, 2.0, 10, 0, 0, 0, 0, 0);
        assert!(!n.is_tombstone());
    }
}
