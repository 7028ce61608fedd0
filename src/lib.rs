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

//! P2P-DPRD - peer-discovery service for geographically distributed radio devices.
//!
//! Each process tracks its own geo-position and coordination range and
//! continuously gossips over UDP with other instances, maintaining:
//! - A *random list*, seeding discovery of unfamiliar peers.
//! - An *important list*, ranked by geographic utility against the local node.
//!
//! Peers whose coordination sphere overlaps the local one ("candidates") are
//! published to co-located subscribers over a local datagram socket.

/// Data model (`Node`, `NodeCollection`, `LocalRequest`, `SubscriberList`) and configuration.
pub mod core;
/// Wire-format encode/decode.
pub mod codec;
/// Great-circle distance calculation.
pub mod geo;
/// Bounded node lists (random list, important list) and utility ranking.
pub mod store;
/// Stateless gossip protocol handlers.
pub mod protocol;
/// UDP transport and the local control/fan-out endpoint.
pub mod net;
/// Single-threaded event loop tying the components together.
pub mod reactor;
/// Observability (Prometheus metrics).
pub mod monitoring;
