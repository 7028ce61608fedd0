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

//! Bounded, ordered collections of [`Node`]s: the random list and the
//! important list, plus the shared operations both are built from.
//!
//! Unlike a tombstone-and-resort scheme, expiry and dedup here compact the
//! backing `Vec` in place with a retain/filter pass - there is never a
//! "nulled out" entry sitting in the list waiting for the next sort to sink
//! it to the bottom.

use rand::Rng;

use crate::core::types::{Node, NodeCollection, PayloadType, NODES_MAX_SIZE};
use crate::geo::haversine_distance_m;

/// A utility of `>= CANDIDATE_UTILITY_THRESHOLD` marks a Node as a "candidate"
/// worth publishing to local subscribers.
pub const CANDIDATE_UTILITY_THRESHOLD: f64 = 1.0;

/// Utility of node `b` with respect to reference node `a`.
///
/// `(r_a + r_b)^2 / d^2`, where `d` is the haversine distance in meters. A
/// zero distance (coincident points) returns `f64::MAX` rather than dividing
/// by zero.
pub fn compute_utility(a: &Node, b: &Node) -> f64 {
    let d = haversine_distance_m(a.lat, a.lon, b.lat, b.lon);
    let d_sqrd = d * d;
    let cr_sum_sqrd = (a.coord_range as f64 + b.coord_range as f64).powi(2);
    if d_sqrd != 0.0 {
        cr_sum_sqrd / d_sqrd
    } else {
        f64::MAX
    }
}

/// Recompute `utility` on every node in `nc`, with respect to reference node `n`.
pub fn calculate_utility(nc: &mut NodeCollection, n: &Node) {
    for node in &mut nc.nodes {
        node.utility = compute_utility(n, node);
    }
}

/// Number of nodes in `nc` whose utility marks them a candidate.
pub fn count_candidates(nc: &NodeCollection) -> usize {
    nc.nodes
        .iter()
        .filter(|n| n.utility >= CANDIDATE_UTILITY_THRESHOLD)
        .count()
}

/// Build the local-fan-out collection: the local node followed by every
/// candidate (utility `>= 1.0`) in `nc`, order preserved. Tagged `Internal`;
/// never sent over UDP.
pub fn candidate_nodes(nc: &NodeCollection, own_node: Node) -> NodeCollection {
    let mut nodes = Vec::with_capacity(nc.nodes.len() + 1);
    nodes.push(own_node);
    nodes.extend(nc.nodes.iter().filter(|n| n.utility >= CANDIDATE_UTILITY_THRESHOLD).copied());
    NodeCollection::from_nodes(PayloadType::Internal, nodes)
}

/// Sort `nc` by utility, highest first.
pub fn sort_by_utility(nc: &mut NodeCollection) {
    nc.nodes
        .sort_by(|a, b| b.utility.partial_cmp(&a.utility).unwrap_or(std::cmp::Ordering::Equal));
}

/// Sort `nc` by timestamp, newest first.
pub fn sort_by_timestamp(nc: &mut NodeCollection) {
    nc.nodes.sort_by(|a, b| b.time_stamp.cmp(&a.time_stamp));
}

/// Sort `nc` by node ID, descending.
pub fn sort_by_node_id(nc: &mut NodeCollection) {
    nc.nodes.sort_by(|a, b| b.node_id.cmp(&a.node_id));
}

/// Append as many nodes from `src` into `dst` as fit under `dst.max_len`,
/// skipping any node whose ID equals `ignore_node_id` (typically the local
/// node's own ID, so it never ends up gossiping itself back to itself).
pub fn append(dst: &mut NodeCollection, src: &NodeCollection, ignore_node_id: u32) {
    for node in &src.nodes {
        if dst.nodes.len() >= dst.max_len {
            break;
        }
        if ignore_node_id != 0 && node.node_id == ignore_node_id {
            continue;
        }
        dst.nodes.push(*node);
    }
}

/// Remove duplicate node IDs from `nc`, keeping the entry with the newer
/// timestamp (ties keep the later-indexed entry). Compacts in place; no
/// tombstones are left behind.
pub fn remove_duplicate_nodes(nc: &mut NodeCollection) {
    let mut newest_ts: std::collections::HashMap<u32, u32> = std::collections::HashMap::new();
    for node in &nc.nodes {
        newest_ts
            .entry(node.node_id)
            .and_modify(|ts| *ts = (*ts).max(node.time_stamp))
            .or_insert(node.time_stamp);
    }
    let mut kept = std::collections::HashSet::new();
    nc.nodes.retain(|n| {
        if newest_ts.get(&n.node_id) == Some(&n.time_stamp) {
            kept.insert(n.node_id)
        } else {
            false
        }
    });
}

/// Remove nodes older than `max_age_secs` relative to `now`. Returns the
/// number of nodes removed.
pub fn remove_expired_nodes(nc: &mut NodeCollection, now: u32, max_age_secs: u32) -> usize {
    let cutoff = now.saturating_sub(max_age_secs);
    let before = nc.nodes.len();
    nc.nodes.retain(|n| n.time_stamp > cutoff);
    before - nc.nodes.len()
}

/// Truncate `nc` to at most `floor` entries (keeping the prefix). Returns the
/// number of nodes removed.
pub fn remove_excess_nodes(nc: &mut NodeCollection, floor: usize) -> usize {
    if nc.nodes.len() > floor {
        let removed = nc.nodes.len() - floor;
        nc.nodes.truncate(floor);
        removed
    } else {
        0
    }
}

/// Grow `nc`'s capacity ceiling by `amount`, up to [`NODES_MAX_SIZE`]. No-op
/// (beyond a caller-visible false return) if the ceiling would be exceeded.
pub fn grow(nc: &mut NodeCollection, amount: usize) -> bool {
    if nc.max_len + amount <= NODES_MAX_SIZE {
        nc.max_len += amount;
        true
    } else {
        false
    }
}

/// Pick a uniformly random node from `nc`, other than `exclude_id`. Returns
/// `None` if `nc` is empty or every entry is `exclude_id`.
pub fn random_peer(nc: &NodeCollection, exclude_id: u32, rng: &mut impl Rng) -> Option<Node> {
    match nc.nodes.len() {
        0 => None,
        1 => {
            if nc.nodes[0].node_id != exclude_id {
                Some(nc.nodes[0])
            } else {
                None
            }
        }
        len => {
            for _ in 0..100 {
                let r = rng.gen_range(0..len);
                if nc.nodes[r].node_id != exclude_id {
                    return Some(nc.nodes[r]);
                }
            }
            None
        }
    }
}

/// Pick a uniformly random node from the important list `nc`, other than
/// `exclude_id`, biased toward the higher-utility prefix once the list is
/// large enough to have one.
///
/// The candidate-range branch is clamped to `min(9, len)` so the chosen
/// index is always in bounds, regardless of how `candidate_amount` and
/// `nc.len()` relate.
pub fn random_important_peer(nc: &NodeCollection, exclude_id: u32, rng: &mut impl Rng) -> Option<Node> {
    match nc.nodes.len() {
        0 => None,
        1 => {
            if nc.nodes[0].node_id != exclude_id {
                Some(nc.nodes[0])
            } else {
                None
            }
        }
        len => {
            let candidate_amount = count_candidates(nc);
            let node_range = if len < 10 {
                len
            } else if candidate_amount < 10 {
                9usize.min(len)
            } else {
                candidate_amount.min(len)
            };
            for _ in 0..100 {
                let r = rng.gen_range(0..node_range);
                if nc.nodes[r].node_id != exclude_id {
                    return Some(nc.nodes[r]);
                }
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn node(id: u32, lat: f64, lon: f64, coord_range: u16, ts: u32) -> Node {
        Node::new(id, lat, lon, coord_range, 0, 0, 0, 0, ts)
    }

    #[test]
    fn utility_of_coincident_points_is_max() {
        let a = node(1, 10.0, 20.0, 5, 0);
        let b = node(2, 10.0, 20.0, 5, 0);
        assert_eq!(compute_utility(&a, &b), f64::MAX);
    }

    #[test]
    fn utility_decreases_with_distance() {
        let a = node(1, 0.0, 0.0, 10, 0);
        let near = node(2, 0.01, 0.0, 10, 0);
        let far = node(3, 10.0, 0.0, 10, 0);
        assert!(compute_utility(&a, &near) > compute_utility(&a, &far));
    }

    #[test]
    fn append_respects_capacity_and_ignore_id() {
        let mut dst = NodeCollection::new(PayloadType::RndNoreq, 2);
        let src = NodeCollection::from_nodes(
            PayloadType::RndNoreq,
            vec![node(1, 0.0, 0.0, 0, 0), node(2, 0.0, 0.0, 0, 0), node(3, 0.0, 0.0, 0, 0)],
        );
        append(&mut dst, &src, 2);
        assert_eq!(dst.nodes.iter().map(|n| n.node_id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn remove_duplicate_nodes_keeps_newest() {
        let mut nc = NodeCollection::from_nodes(
            PayloadType::RndNoreq,
            vec![node(1, 0.0, 0.0, 0, 10), node(1, 0.0, 0.0, 0, 50), node(2, 0.0, 0.0, 0, 5)],
        );
        remove_duplicate_nodes(&mut nc);
        assert_eq!(nc.nodes.len(), 2);
        let kept = nc.nodes.iter().find(|n| n.node_id == 1).unwrap();
        assert_eq!(kept.time_stamp, 50);
    }

    #[test]
    fn remove_expired_nodes_drops_old_entries() {
        let mut nc = NodeCollection::from_nodes(
            PayloadType::RndNoreq,
            vec![node(1, 0.0, 0.0, 0, 100), node(2, 0.0, 0.0, 0, 99_000)],
        );
        let removed = remove_expired_nodes(&mut nc, 100_000, 10_800);
        assert_eq!(removed, 1);
        assert_eq!(nc.nodes.len(), 1);
        assert_eq!(nc.nodes[0].node_id, 2);
    }

    #[test]
    fn remove_excess_nodes_truncates() {
        let mut nc = NodeCollection::from_nodes(
            PayloadType::RndNoreq,
            vec![node(1, 0.0, 0.0, 0, 0), node(2, 0.0, 0.0, 0, 0), node(3, 0.0, 0.0, 0, 0)],
        );
        let removed = remove_excess_nodes(&mut nc, 1);
        assert_eq!(removed, 2);
        assert_eq!(nc.nodes.len(), 1);
    }

    #[test]
    fn grow_respects_hard_ceiling() {
        let mut nc = NodeCollection::new(PayloadType::ImpNoreq, NODES_MAX_SIZE - 1);
        assert!(!grow(&mut nc, 2));
        assert!(grow(&mut nc, 1));
        assert_eq!(nc.max_len, NODES_MAX_SIZE);
    }

    #[test]
    fn random_important_peer_never_indexes_out_of_bounds() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        // len >= 10, candidate_amount < 10: node_range clamps to min(9, len).
        let mut nodes: Vec<Node> = (1..=12).map(|i| node(i, 0.0, 0.0, 0, 0)).collect();
        for n in nodes.iter_mut().take(3) {
            n.utility = 2.0;
        }
        let nc = NodeCollection::from_nodes(PayloadType::ImpNoreq, nodes);
        for _ in 0..1000 {
            let _ = random_important_peer(&nc, 0, &mut rng);
        }
    }

    #[test]
    fn random_peer_excludes_self() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let nc = NodeCollection::from_nodes(PayloadType::RndNoreq, vec![node(1, 0.0, 0.0, 0, 0)]);
        assert_eq!(random_peer(&nc, 1, &mut rng), None);
    }
}
