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

//! End-to-end gossip scenarios, driven directly against `protocol`/`store`
//! without any real sockets - these only exercise in-memory state
//! transitions and the wire codec.

use p2p_dprd::codec::{pack_node_collection, unpack_node_collection};
use p2p_dprd::core::types::{Node, NodeCollection, PayloadType};
use p2p_dprd::protocol::{self, ReceiveAction};
use p2p_dprd::store;

const OWN_ID: u32 = 1;
const PROTO_K: u16 = 15;

fn own_node() -> Node {
    Node::new(OWN_ID, 10.0, 20.0, 10, 0x7f000001, 45454, 0, 0, 1_000_000)
}

/// S1 - Empty bootstrap: tick fires with an empty random list. A one-Node
/// `RND_REQ` is sent to the origin peer; on the wire that is 5 + 38 = 43
/// bytes (a 38-byte `Node` record: `u32+f64+f64+u16+u32+u16+u32+u16+u32`,
/// matching `original_source/src/serialize.c`'s `NODE_OFFSET`).
#[test]
fn s1_empty_bootstrap_produces_43_byte_wire_message() {
    let nc = protocol::bootstrap(own_node());
    assert_eq!(nc.payload_type, PayloadType::RndReq);
    assert_eq!(nc.nodes.len(), 1);

    let bytes = pack_node_collection(&nc);
    assert_eq!(bytes.len(), 43);
}

/// S2 - Receive RND_REQ from node 7 (same lat/lon as us, range 10, ts=now).
/// We must reply with our random list as RND_NOREQ to node 7, end up with
/// RandomList = {7} (ourselves filtered out), and ImportantList containing
/// {7} with utility == +inf (coincident points).
#[test]
fn s2_receive_rnd_req_updates_both_lists_and_replies() {
    let own = own_node();
    let mut random = NodeCollection::new(PayloadType::RndNoreq, 20);
    let mut important = NodeCollection::new(PayloadType::ImpNoreq, 45);

    let peer7 = Node::new(7, own.lat, own.lon, 10, 0x7f000002, 45454, 0, 0, 1_000_000);
    let mut incoming = NodeCollection::from_nodes(PayloadType::RndReq, vec![peer7]);

    let action = protocol::on_receive(&mut incoming, &mut random, &mut important, &own, PROTO_K).unwrap();
    assert_eq!(action, ReceiveAction::ReplyRandom(peer7));

    assert_eq!(random.nodes.len(), 1);
    assert_eq!(random.nodes[0].node_id, 7);

    assert_eq!(important.nodes.len(), 1);
    assert_eq!(important.nodes[0].node_id, 7);
    assert_eq!(important.nodes[0].utility, f64::MAX);
}

/// S3 - Utility classification: receive IMP_NOREQ with nodes at ~5m (range
/// 10) and ~10km (range 10). After update, exactly the near node is a
/// candidate, with utility close to 400/25 = 16.
#[test]
fn s3_utility_classification_keeps_only_near_node_as_candidate() {
    let own = own_node();
    let mut important = NodeCollection::new(PayloadType::ImpNoreq, 45);

    // ~5m north of own position.
    let near = Node::new(10, own.lat + 0.000045, own.lon, 10, 0, 0, 0, 0, 1_000_000);
    // ~10km north of own position (1 degree of latitude is ~111km).
    let far = Node::new(11, own.lat + 0.09, own.lon, 10, 0, 0, 0, 0, 1_000_000);

    let mut incoming = NodeCollection::from_nodes(PayloadType::ImpNoreq, vec![near, far]);
    let mut random = NodeCollection::new(PayloadType::RndNoreq, 20);
    let _ = protocol::on_receive(&mut incoming, &mut random, &mut important, &own, PROTO_K).unwrap();

    let candidates = store::candidate_nodes(&important, own);
    // own node plus exactly the near node.
    assert_eq!(candidates.nodes.len(), 2);
    assert_eq!(candidates.nodes[1].node_id, 10);

    let near_utility = important.nodes.iter().find(|n| n.node_id == 10).unwrap().utility;
    assert!((near_utility - 16.0).abs() < 2.0, "got {near_utility}");

    let far_utility = important.nodes.iter().find(|n| n.node_id == 11).unwrap().utility;
    assert!(far_utility < 1.0);
}

/// S4 - Expiry: inject 5 nodes with ts = now - 11000, run the age-out pass
/// with maxAge=10800. Both lists end with zero of those 5.
#[test]
fn s4_expiry_removes_all_stale_nodes_from_both_lists() {
    let now: u32 = 1_000_000;
    let stale_ts = now - 11_000;
    let stale_nodes: Vec<Node> = (20..25).map(|id| Node::new(id, 0.0, 0.0, 5, 0, 0, 0, 0, stale_ts)).collect();

    let mut random = NodeCollection::from_nodes(PayloadType::RndNoreq, stale_nodes.clone());
    let mut important = NodeCollection::from_nodes(PayloadType::ImpNoreq, stale_nodes);

    let removed_random = store::remove_expired_nodes(&mut random, now, 10_800);
    let removed_important = store::remove_expired_nodes(&mut important, now, 10_800);

    assert_eq!(removed_random, 5);
    assert_eq!(removed_important, 5);
    assert!(random.nodes.is_empty());
    assert!(important.nodes.is_empty());
}

/// S5 - Fan-out: one subscriber, ImportantList holds 3 candidates. The
/// published payload unpacks to `NodeCollection{version=1, type=INTERNAL,
/// nodeCount=4}` with index 0 being own-Node.
#[test]
fn s5_fanout_prepends_own_node_to_candidate_set() {
    let own = own_node();
    let mut important = NodeCollection::new(PayloadType::ImpNoreq, 45);
    important.nodes = vec![
        Node::new(30, own.lat, own.lon, 10, 0, 0, 0, 0, 0),
        Node::new(31, own.lat, own.lon, 10, 0, 0, 0, 0, 0),
        Node::new(32, own.lat, own.lon, 10, 0, 0, 0, 0, 0),
    ];
    store::calculate_utility(&mut important, &own);
    assert_eq!(store::count_candidates(&important), 3);

    let fanout = store::candidate_nodes(&important, own);
    assert_eq!(fanout.payload_type, PayloadType::Internal);
    assert_eq!(fanout.nodes.len(), 4);
    assert_eq!(fanout.nodes[0].node_id, own.node_id);

    let bytes = pack_node_collection(&fanout);
    let decoded = unpack_node_collection(&bytes).expect("internal payloads still decode locally");
    assert_eq!(decoded.version_id, 1);
    assert_eq!(decoded.payload_type, PayloadType::Internal);
    assert_eq!(decoded.nodes.len(), 4);
    assert_eq!(decoded.nodes[0].node_id, own.node_id);
}

/// S6 - Duplicate ID, newer wins: RandomList has {ID=9, ts=1000}. Receive
/// RND_NOREQ containing {ID=9, ts=2000}. After update, exactly one entry
/// with ID=9 and ts=2000 remains.
#[test]
fn s6_duplicate_id_keeps_newest_timestamp() {
    let own = own_node();
    let mut random = NodeCollection::from_nodes(
        PayloadType::RndNoreq,
        vec![Node::new(9, 0.0, 0.0, 10, 0, 0, 0, 0, 1000)],
    );
    let mut important = NodeCollection::new(PayloadType::ImpNoreq, 45);
    let mut incoming = NodeCollection::from_nodes(
        PayloadType::RndNoreq,
        vec![Node::new(9, 0.0, 0.0, 10, 0, 0, 0, 0, 2000)],
    );

    let _ = protocol::on_receive(&mut incoming, &mut random, &mut important, &own, PROTO_K).unwrap();

    let nines: Vec<&Node> = random.nodes.iter().filter(|n| n.node_id == 9).collect();
    assert_eq!(nines.len(), 1);
    assert_eq!(nines[0].time_stamp, 2000);
}
