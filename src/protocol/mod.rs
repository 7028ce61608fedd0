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

//! Stateless gossip protocol handlers.
//!
//! Every function here is a pure transformation: given the current random
//! and important lists plus some input, it returns what changed and, where
//! relevant, the `NodeCollection` that should now be sent to some peer. None
//! of it touches sockets, the clock, or the RNG directly - [`crate::reactor`]
//! supplies `now` and an `rng`, and owns the actual I/O.

use thiserror::Error;

use crate::core::types::{Node, NodeCollection, PayloadType};
use crate::store;

/// Protocol-level errors.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// A received `NodeCollection` carried no nodes, so there is no peer to
    /// reply to or attribute the gossip to.
    #[error("received NodeCollection has no nodes")]
    EmptyPayload,
    /// A received `NodeCollection` is internally tagged and must never
    /// arrive over the wire.
    #[error("received NodeCollection carries the internal-only payload type")]
    UnexpectedInternalPayload,
}

/// Build the one-shot bootstrap message: a `RND_REQ` collection containing
/// only the local node, destined for the configured origin peer.
pub fn bootstrap(own_node: Node) -> NodeCollection {
    NodeCollection::from_nodes(PayloadType::RndReq, vec![own_node])
}

/// Fold a received `NodeCollection` into the random list: append (skipping
/// our own ID), drop duplicates keeping the newest, sort by recency, then
/// cap at `rn.max_len / 2` (mirrors the `2N` capacity split between
/// freshly-gossiped and previously-known entries).
pub fn update_random_nodes(nc: &NodeCollection, rn: &mut NodeCollection, own_id: u32) {
    store::append(rn, nc, own_id);
    store::remove_duplicate_nodes(rn);
    store::sort_by_timestamp(rn);
    let floor = rn.max_len / 2;
    store::remove_excess_nodes(rn, floor);
}

/// Fold a received `NodeCollection` into the important list: rank every
/// incoming node's utility against `own_node`, append (skipping our own
/// ID), drop duplicates, sort by utility, grow if the candidate set is
/// crowding the ceiling, then cap at `max_len - proto_k`.
pub fn update_important_nodes(
    nc: &mut NodeCollection,
    important: &mut NodeCollection,
    own_node: &Node,
    proto_k: u16,
) {
    store::calculate_utility(nc, own_node);
    store::append(important, nc, own_node.node_id);
    store::remove_duplicate_nodes(important);
    store::sort_by_utility(important);

    let proto_k = proto_k as usize;
    let candidate_amount = store::count_candidates(important);
    if important.max_len >= proto_k && candidate_amount > important.max_len - proto_k {
        store::grow(important, proto_k);
    }
    if important.max_len >= proto_k && important.nodes.len() > important.max_len - proto_k {
        store::remove_excess_nodes(important, important.max_len - proto_k);
    }
}

/// Build the `NodeCollection` to gossip the random list: the local node
/// prepended to as much of `rn` as fits.
pub fn send_random_nodes(rn: &NodeCollection, payload_type: PayloadType, own_node: Node) -> NodeCollection {
    let mut nodes = Vec::with_capacity(rn.nodes.len() + 1);
    nodes.push(own_node);
    nodes.extend(rn.nodes.iter().copied());
    NodeCollection::from_nodes(payload_type, nodes)
}

/// Build the `NodeCollection` to gossip the important list to `peer`: rank
/// `important` by utility against `peer`, keep at most `proto_k` of them,
/// then prepend the local node.
pub fn send_important_nodes(
    important: &NodeCollection,
    payload_type: PayloadType,
    peer: &Node,
    own_node: Node,
    proto_k: u16,
) -> NodeCollection {
    let mut tmp = important.clone();
    let proto_k = proto_k as usize;
    if tmp.nodes.len() > proto_k {
        store::calculate_utility(&mut tmp, peer);
        store::sort_by_utility(&mut tmp);
        store::remove_excess_nodes(&mut tmp, proto_k);
    }

    let mut nodes = Vec::with_capacity(tmp.nodes.len() + 1);
    nodes.push(own_node);
    nodes.extend(tmp.nodes.iter().copied());
    NodeCollection::from_nodes(payload_type, nodes)
}

/// What to do in response to an inbound `NodeCollection`, beyond the state
/// mutations `update_random_nodes`/`update_important_nodes` already applied.
#[derive(Debug, PartialEq)]
pub enum ReceiveAction {
    /// Nothing further to send; the incoming collection only fed state.
    None,
    /// Reply to the sender with our own random list (`RND_NOREQ`).
    ReplyRandom(Node),
    /// Reply to the sender with our own important list (`IMP_NOREQ`).
    ReplyImportant(Node),
}

/// Dispatch a just-decoded, just-validated `NodeCollection` against the
/// current state, mutating `random`/`important` in place and returning
/// whatever reply the sender is owed.
///
/// `nc.nodes[0]` is always the sender's own Node record, by protocol
/// convention; `sender_ip`/`sender_port` (the UDP source address, which may
/// differ from what the sender claims) are folded in by the caller before
/// this is invoked if that distinction matters to the transport.
pub fn on_receive(
    nc: &mut NodeCollection,
    random: &mut NodeCollection,
    important: &mut NodeCollection,
    own_node: &Node,
    proto_k: u16,
) -> Result<ReceiveAction, ProtocolError> {
    if nc.payload_type == PayloadType::Internal {
        return Err(ProtocolError::UnexpectedInternalPayload);
    }
    let sender = *nc.nodes.first().ok_or(ProtocolError::EmptyPayload)?;

    let action = match nc.payload_type {
        PayloadType::RndNoreq => {
            update_random_nodes(nc, random, own_node.node_id);
            update_important_nodes(nc, important, own_node, proto_k);
            ReceiveAction::None
        }
        PayloadType::RndReq => {
            update_random_nodes(nc, random, own_node.node_id);
            update_important_nodes(nc, important, own_node, proto_k);
            ReceiveAction::ReplyRandom(sender)
        }
        PayloadType::ImpNoreq => {
            update_important_nodes(nc, important, own_node, proto_k);
            ReceiveAction::None
        }
        PayloadType::ImpReq => {
            update_important_nodes(nc, important, own_node, proto_k);
            ReceiveAction::ReplyImportant(sender)
        }
        PayloadType::Internal => unreachable!("rejected above"),
    };
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Node;

    fn node(id: u32, ts: u32) -> Node {
        Node::new(id, 10.0, 20.0, 5, 0, 0, 0, 0, ts)
    }

    #[test]
    fn bootstrap_wraps_own_node_alone() {
        let nc = bootstrap(node(1, 0));
        assert_eq!(nc.payload_type, PayloadType::RndReq);
        assert_eq!(nc.nodes.len(), 1);
        assert_eq!(nc.nodes[0].node_id, 1);
    }

    #[test]
    fn on_receive_rnd_req_replies_and_updates_both_lists() {
        let own = node(99, 0);
        let mut random = NodeCollection::new(PayloadType::RndNoreq, 20);
        let mut important = NodeCollection::new(PayloadType::ImpNoreq, 45);
        let mut nc = NodeCollection::from_nodes(PayloadType::RndReq, vec![node(1, 10)]);

        let action = on_receive(&mut nc, &mut random, &mut important, &own, 15).unwrap();
        assert_eq!(action, ReceiveAction::ReplyRandom(node(1, 10)));
        assert_eq!(random.nodes.len(), 1);
        assert_eq!(important.nodes.len(), 1);
    }

    #[test]
    fn on_receive_rejects_internal_payload() {
        let own = node(99, 0);
        let mut random = NodeCollection::new(PayloadType::RndNoreq, 20);
        let mut important = NodeCollection::new(PayloadType::ImpNoreq, 45);
        let mut nc = NodeCollection::from_nodes(PayloadType::Internal, vec![node(1, 10)]);
        let err = on_receive(&mut nc, &mut random, &mut important, &own, 15).unwrap_err();
        assert_eq!(err, ProtocolError::UnexpectedInternalPayload);
    }

    #[test]
    fn on_receive_rejects_empty_payload() {
        let own = node(99, 0);
        let mut random = NodeCollection::new(PayloadType::RndNoreq, 20);
        let mut important = NodeCollection::new(PayloadType::ImpNoreq, 45);
        let mut nc = NodeCollection::from_nodes(PayloadType::RndNoreq, vec![]);
        let err = on_receive(&mut nc, &mut random, &mut important, &own, 15).unwrap_err();
        assert_eq!(err, ProtocolError::EmptyPayload);
    }

    #[test]
    fn send_random_nodes_prepends_own_node() {
        let rn = NodeCollection::from_nodes(PayloadType::RndNoreq, vec![node(1, 0), node(2, 0)]);
        let out = send_random_nodes(&rn, PayloadType::RndNoreq, node(99, 0));
        assert_eq!(out.nodes[0].node_id, 99);
        assert_eq!(out.nodes.len(), 3);
    }

    #[test]
    fn send_important_nodes_caps_at_proto_k_plus_self() {
        let nodes: Vec<Node> = (1..=20).map(|i| node(i, 0)).collect();
        let important = NodeCollection::from_nodes(PayloadType::ImpNoreq, nodes);
        let peer = node(1000, 0);
        let out = send_important_nodes(&important, PayloadType::ImpNoreq, &peer, node(99, 0), 15);
        assert_eq!(out.nodes.len(), 16);
        assert_eq!(out.nodes[0].node_id, 99);
    }

    #[test]
    fn update_important_nodes_grows_when_crowded() {
        let own = node(99, 0);
        let mut important = NodeCollection::new(PayloadType::ImpNoreq, 45);
        let mut incoming = NodeCollection::from_nodes(
            PayloadType::ImpNoreq,
            (1..=40).map(|i| node(i, 10)).collect(),
        );
        for n in incoming.nodes.iter_mut() {
            n.lat = own.lat;
            n.lon = own.lon;
        }
        update_important_nodes(&mut incoming, &mut important, &own, 15);
        assert!(important.max_len >= 45);
    }
}
