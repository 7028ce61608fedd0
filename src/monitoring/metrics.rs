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

//! Process metrics, registered once at startup and exposed read-only over
//! HTTP. Not part of the wire protocol; purely an observability convenience.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;
use tracing::info;

/// Metrics HTTP server errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Binding the HTTP listener failed.
    #[error("failed to bind metrics HTTP listener on {addr}: {source}")]
    Bind {
        /// Address that failed to bind.
        addr: SocketAddr,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// All process metrics, registered eagerly against a private `Registry`.
pub struct Metrics {
    registry: Registry,
    /// Current size of the random list.
    pub random_list_len: IntGauge,
    /// Current size of the important list.
    pub important_list_len: IntGauge,
    /// Current count of candidate (utility >= 1.0) nodes.
    pub candidates_total: IntGauge,
    /// Current count of local subscribers.
    pub subscribers_total: IntGauge,
    /// Datagrams dropped for failing to decode.
    pub malformed_payloads_total: IntCounter,
    /// Recoverable I/O errors encountered (logged at NOTICE and continued).
    pub transient_io_errors_total: IntCounter,
    /// Requests rejected because a bounded resource (e.g. subscriber list) was full.
    pub resource_full_total: IntCounter,
    /// Total reactor ticks processed.
    pub ticks_total: IntCounter,
    /// Total bootstrap messages sent to the origin peer.
    pub bootstraps_total: IntCounter,
}

impl Metrics {
    /// Construct and register every metric against a fresh `Registry`.
    pub fn new() -> Self {
        let registry = Registry::new();

        let random_list_len = IntGauge::new("p2pdprd_random_list_len", "Current size of the random list").unwrap();
        let important_list_len =
            IntGauge::new("p2pdprd_important_list_len", "Current size of the important list").unwrap();
        let candidates_total =
            IntGauge::new("p2pdprd_candidates_total", "Count of nodes with utility >= 1.0").unwrap();
        let subscribers_total =
            IntGauge::new("p2pdprd_subscribers_total", "Count of local candidate-fan-out subscribers").unwrap();
        let malformed_payloads_total = IntCounter::new(
            "p2pdprd_malformed_payloads_total",
            "Datagrams dropped for failing to decode",
        )
        .unwrap();
        let transient_io_errors_total = IntCounter::new(
            "p2pdprd_transient_io_errors_total",
            "Recoverable I/O errors encountered",
        )
        .unwrap();
        let resource_full_total = IntCounter::new(
            "p2pdprd_resource_full_total",
            "Requests rejected because a bounded resource was full",
        )
        .unwrap();
        let ticks_total = IntCounter::new("p2pdprd_ticks_total", "Total reactor ticks processed").unwrap();
        let bootstraps_total =
            IntCounter::new("p2pdprd_bootstraps_total", "Total bootstrap messages sent to the origin peer").unwrap();

        for metric in [
            Box::new(random_list_len.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(important_list_len.clone()),
            Box::new(candidates_total.clone()),
            Box::new(subscribers_total.clone()),
        ] {
            registry.register(metric).expect("gauge registration cannot fail on a fresh registry");
        }
        for metric in [
            Box::new(malformed_payloads_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(transient_io_errors_total.clone()),
            Box::new(resource_full_total.clone()),
            Box::new(ticks_total.clone()),
            Box::new(bootstraps_total.clone()),
        ] {
            registry.register(metric).expect("counter registration cannot fail on a fresh registry");
        }

        Self {
            registry,
            random_list_len,
            important_list_len,
            candidates_total,
            subscribers_total,
            malformed_payloads_total,
            transient_io_errors_total,
            resource_full_total,
            ticks_total,
            bootstraps_total,
        }
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&metric_families, &mut buf).expect("encoding a gathered registry cannot fail");
        String::from_utf8(buf).expect("prometheus text exposition is always valid UTF-8")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    (
        [("content-type", "text/plain; version=0.0.4")],
        metrics.render(),
    )
}

/// Spawn the `GET /metrics` HTTP server as a background task.
pub async fn serve(metrics: Arc<Metrics>, addr: SocketAddr) -> Result<tokio::task::JoinHandle<()>, MetricsError> {
    let app = Router::new().route("/metrics", get(metrics_handler)).with_state(metrics);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| MetricsError::Bind { addr, source })?;
    info!(%addr, "metrics endpoint listening");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "metrics HTTP server exited");
        }
    }))
}
