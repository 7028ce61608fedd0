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

//! The single-threaded event loop.
//!
//! The reactor owns the random list, the important list, the subscriber
//! list, and the runtime-tunable slice of [`Configuration`] directly - it is
//! the only task that ever touches them, so none of it needs a `Mutex`. The
//! one thing shared across tasks is the [`Metrics`] handle, behind an `Arc`
//! because `prometheus`'s counters are internally atomic.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec;
use crate::core::config::Configuration;
use crate::core::types::{LocalRequest, Node, NodeCollection, PayloadType};
use crate::monitoring::metrics::Metrics;
use crate::net::local::{AddOutcome, LocalEndpoint, SubscriberList};
use crate::net::transport::Transport;
use crate::protocol::{self, ReceiveAction};
use crate::store;

/// Reactor-level errors. Only [`ReactorError::Bind`] is fatal at startup;
/// everything encountered mid-loop is handled inline and logged.
#[derive(Debug, Error)]
pub enum ReactorError {
    /// Binding a transport failed during startup.
    #[error("failed to bind transport: {0}")]
    Bind(#[from] crate::net::transport::TransportError),
    /// Binding the local control endpoint failed during startup.
    #[error("failed to bind local endpoint: {0}")]
    LocalBind(#[from] crate::net::local::LocalEndpointError),
}

fn own_node(cfg: &Configuration, now: u32) -> Node {
    Node::new(
        cfg.client_id,
        cfg.client_lat,
        cfg.client_lon,
        cfg.client_coord_range,
        cfg.own_ip,
        cfg.port,
        cfg.radac_ip,
        cfg.radac_port,
        now,
    )
}

fn unix_now() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// The reactor: all protocol state plus the transports needed to drive it.
pub struct Reactor {
    cfg: Configuration,
    random: NodeCollection,
    important: NodeCollection,
    subscribers: SubscriberList,
    transport: Transport,
    local: LocalEndpoint,
    metrics: Arc<Metrics>,
    rng: rand::rngs::StdRng,
}

impl Reactor {
    /// Bind transports and construct a reactor ready to run.
    pub async fn new(cfg: Configuration, metrics: Arc<Metrics>) -> Result<Self, ReactorError> {
        let transport = Transport::bind(cfg.port).await?;
        let local = LocalEndpoint::bind(&cfg.local_socket_path)?;
        let random = NodeCollection::new(PayloadType::RndNoreq, cfg.random_list_cap());
        let important = NodeCollection::new(PayloadType::ImpNoreq, cfg.important_list_cap());
        let subscribers = SubscriberList::new(cfg.max_subscribers);
        use rand::SeedableRng;
        let rng = rand::rngs::StdRng::from_entropy();

        Ok(Self {
            cfg,
            random,
            important,
            subscribers,
            transport,
            local,
            metrics,
            rng,
        })
    }

    /// Send the one-shot bootstrap message to the configured origin peer.
    pub async fn bootstrap(&mut self) {
        let nc = protocol::bootstrap(own_node(&self.cfg, unix_now()));
        let bytes = codec::pack_node_collection(&nc);
        match self.transport.send_to(&bytes, self.cfg.origin_peer_ip, self.cfg.origin_peer_port).await {
            Ok(()) => {
                self.metrics.bootstraps_total.inc();
                info!(port = self.cfg.origin_peer_port, "sent bootstrap message to origin peer");
            }
            Err(e) => {
                warn!(error = %e, "bootstrap send failed");
                self.metrics.transient_io_errors_total.inc();
            }
        }
    }

    /// Run the event loop until `shutdown` resolves (e.g. on SIGTERM/SIGINT).
    ///
    /// The periodic tick is driven by a single `sleep_until` deadline that
    /// `select!` multiplexes alongside the two sockets, exactly like the
    /// original's `select()` timeout argument - nothing ever blocks outside
    /// the readiness wait. Each time the deadline fires, the next one is
    /// recomputed as `proto_timeout` seconds plus a fresh `[0,
    /// proto_timeout_variation)` microsecond jitter, per spec.md §5.
    pub async fn run(mut self, shutdown: impl std::future::Future<Output = ()>) {
        tokio::pin!(shutdown);

        let mut next_tick = tokio::time::Instant::now() + self.next_tick_delay();

        loop {
            self.report_gauges();

            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown signal received, exiting event loop");
                    break;
                }
                recv = self.transport.recv() => {
                    match recv {
                        Ok((bytes, from)) => self.handle_inbound_datagram(&bytes, from).await,
                        Err(e) => {
                            warn!(error = %e, "transient UDP receive error");
                            self.metrics.transient_io_errors_total.inc();
                        }
                    }
                }
                req = self.local.recv_request() => {
                    match req {
                        Ok(req) => self.handle_local_request(req).await,
                        Err(e) => {
                            debug!(error = %e, "malformed local request");
                            self.metrics.malformed_payloads_total.inc();
                        }
                    }
                }
                _ = tokio::time::sleep_until(next_tick) => {
                    self.tick().await;
                    next_tick = tokio::time::Instant::now() + self.next_tick_delay();
                }
            }
        }
    }

    async fn handle_inbound_datagram(&mut self, bytes: &[u8], from: std::net::SocketAddr) {
        let mut nc = match codec::unpack_node_collection(bytes) {
            Ok(nc) => nc,
            Err(e) => {
                debug!(error = %e, %from, "dropping malformed NodeCollection");
                self.metrics.malformed_payloads_total.inc();
                return;
            }
        };

        let own = own_node(&self.cfg, unix_now());
        match protocol::on_receive(&mut nc, &mut self.random, &mut self.important, &own, self.cfg.proto_k) {
            Ok(ReceiveAction::None) => {}
            Ok(ReceiveAction::ReplyRandom(peer)) => self.send_random(PayloadType::RndNoreq, &peer).await,
            Ok(ReceiveAction::ReplyImportant(peer)) => self.send_important(PayloadType::ImpNoreq, &peer).await,
            Err(e) => {
                debug!(error = %e, %from, "dropping invalid NodeCollection");
                self.metrics.malformed_payloads_total.inc();
            }
        }
    }

    async fn handle_local_request(&mut self, req: LocalRequest) {
        match req {
            LocalRequest::SetPosition { lat, lon } => {
                self.cfg.set_position(lat, lon);
                info!(lat, lon, "updated local position");
            }
            LocalRequest::SetCoordinationRange { coord_range } => {
                self.cfg.set_coordination_range(coord_range);
                info!(coord_range, "updated local coordination range");
            }
            LocalRequest::SubCandNodes { sock_addr } => match self.subscribers.add(sock_addr.clone()) {
                AddOutcome::Added => info!(%sock_addr, "subscriber added"),
                AddOutcome::AlreadySubscribed => debug!(%sock_addr, "subscriber already present"),
                AddOutcome::Full => {
                    warn!(%sock_addr, "subscriber list full");
                    self.metrics.resource_full_total.inc();
                }
            },
            LocalRequest::UnsubCandNodes { sock_addr } => {
                if self.subscribers.remove(&sock_addr) {
                    info!(%sock_addr, "subscriber removed");
                } else {
                    debug!(%sock_addr, "unsubscribe for unknown subscriber");
                }
            }
        }
    }

    async fn tick(&mut self) {
        self.metrics.ticks_total.inc();

        let now = unix_now();
        let removed_random = store::remove_expired_nodes(&mut self.random, now, self.cfg.proto_node_max_age);
        if removed_random > 0 {
            debug!(removed_random, "expired nodes removed from random list");
        }
        let removed_important = store::remove_expired_nodes(&mut self.important, now, self.cfg.proto_node_max_age);
        if removed_important > 0 {
            debug!(removed_important, "expired nodes removed from important list");
        }

        let own = own_node(&self.cfg, now);
        store::calculate_utility(&mut self.important, &own);
        store::sort_by_utility(&mut self.important);

        match store::random_peer(&self.random, own.node_id, &mut self.rng) {
            Some(peer) => self.send_random(PayloadType::RndReq, &peer).await,
            None => self.bootstrap().await,
        }

        if let Some(peer) = store::random_important_peer(&self.important, own.node_id, &mut self.rng) {
            self.send_important(PayloadType::ImpReq, &peer).await;
        }

        self.publish_candidates_if_any().await;
    }

    /// `proto_timeout` seconds plus a fresh `[0, proto_timeout_variation)`
    /// microsecond jitter - the deadline `run`'s `select!` sleeps until next,
    /// never a blocking sleep of its own.
    fn next_tick_delay(&mut self) -> Duration {
        let base = Duration::from_secs(self.cfg.proto_timeout as u64);
        if self.cfg.proto_timeout_variation == 0 {
            return base;
        }
        let jitter_us = self.rng.gen_range(0..self.cfg.proto_timeout_variation);
        base + Duration::from_micros(jitter_us as u64)
    }

    async fn send_random(&mut self, payload_type: PayloadType, peer: &Node) {
        let own = own_node(&self.cfg, unix_now());
        let nc = protocol::send_random_nodes(&self.random, payload_type, own);
        let bytes = codec::pack_node_collection(&nc);
        if let Err(e) = self.transport.send_to(&bytes, peer.ip_addr, peer.port).await {
            warn!(error = %e, peer = peer.node_id, "failed to send random list");
            self.metrics.transient_io_errors_total.inc();
        }
    }

    async fn send_important(&mut self, payload_type: PayloadType, peer: &Node) {
        let own = own_node(&self.cfg, unix_now());
        let nc = protocol::send_important_nodes(&self.important, payload_type, peer, own, self.cfg.proto_k);
        let bytes = codec::pack_node_collection(&nc);
        if let Err(e) = self.transport.send_to(&bytes, peer.ip_addr, peer.port).await {
            warn!(error = %e, peer = peer.node_id, "failed to send important list");
            self.metrics.transient_io_errors_total.inc();
        }
    }

    async fn publish_candidates_if_any(&mut self) {
        let candidate_count = store::count_candidates(&self.important);
        self.metrics.candidates_total.set(candidate_count as i64);

        if self.subscribers.is_empty() {
            return;
        }
        let own = own_node(&self.cfg, unix_now());
        let candidates = store::candidate_nodes(&self.important, own);
        self.local.publish_candidates(&candidates, &self.subscribers).await;
    }

    fn report_gauges(&self) {
        self.metrics.random_list_len.set(self.random.node_count() as i64);
        self.metrics.important_list_len.set(self.important.node_count() as i64);
        self.metrics.subscribers_total.set(self.subscribers.len() as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_node_reflects_runtime_tunable_position() {
        let mut cfg = Configuration::default();
        cfg.set_position(1.0, 2.0);
        cfg.set_coordination_range(99);
        let n = own_node(&cfg, 12345);
        assert_eq!(n.lat, 1.0);
        assert_eq!(n.lon, 2.0);
        assert_eq!(n.coord_range, 99);
        assert_eq!(n.time_stamp, 12345);
    }
}
