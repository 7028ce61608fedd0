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

//! Transport layer: the UDP peer socket and the local control/fan-out socket.

/// UDP send/receive to other `p2p-dprd` instances.
pub mod transport;
/// Local Unix-datagram control endpoint (position updates, subscriptions)
/// and the candidate-node fan-out to subscribers.
pub mod local;
