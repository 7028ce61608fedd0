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

//! Process-wide configuration, loaded from an optional TOML file with
//! hard-coded fallbacks matching the protocol whitepaper's recommended
//! defaults.

use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// Default UDP listening port.
pub const DEFAULT_PORT: u16 = 45454;
/// Default origin-peer IP, used to bootstrap an empty random list.
pub const DEFAULT_PEER_IP: &str = "127.0.0.1";
/// Default origin-peer port.
pub const DEFAULT_PEER_PORT: u16 = 45544;
/// Default RADAC pass-through IP.
pub const DEFAULT_RADAC_IP: &str = "127.0.0.1";
/// Default RADAC pass-through port.
pub const DEFAULT_RADAC_PORT: u16 = 45542;
/// Default local control/fan-out socket path.
pub const DEFAULT_LOCAL_SOCK: &str = "/tmp/p2p-dprd.sock";
/// Default log file path.
pub const DEFAULT_LOG_PATH: &str = "p2p-dprd.log";
/// Default protocol constant N (random list cap = 2N).
pub const DEFAULT_N: u16 = 10;
/// Default protocol constant M (important list baseline size).
pub const DEFAULT_M: u16 = 30;
/// Default protocol constant K (important list growth step).
pub const DEFAULT_K: u16 = 15;
/// Default tick base period, seconds.
pub const DEFAULT_TIMEOUT_SECS: u16 = 10;
/// Default tick jitter upper bound, microseconds.
pub const DEFAULT_TIMEOUT_VARIATION_MICROS: u32 = 2_000_000;
/// Default coordination range, meters.
pub const DEFAULT_COORD_RANGE: u16 = 10;
/// Default latitude, degrees.
pub const DEFAULT_LAT: f64 = 59.921161;
/// Default longitude, degrees.
pub const DEFAULT_LON: f64 = 10.733608;
/// Default max age of a Node entry, seconds.
pub const DEFAULT_NODE_AGE_LIMIT: u32 = 10_800;
/// Default subscriber list capacity.
pub const DEFAULT_MAX_SUBSCRIBERS: usize = 25;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config file {0}")]
    Read(String),
    /// The config file exists but is not valid TOML, or a field has the wrong type.
    #[error("failed to parse config file: {0}")]
    Parse(String),
    /// A mandatory field was missing or malformed (e.g. an unparsable IP address).
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn parse_ipv4(s: &str) -> Result<u32, ConfigError> {
    Ipv4Addr::from_str(s)
        .map(u32::from)
        .map_err(|_| ConfigError::Invalid(format!("not a valid IPv4 address: {s}")))
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct NetworkSection {
    own_ip: Option<String>,
    port: Option<u16>,
    origin_peer_ip: Option<String>,
    origin_peer_port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ClientSection {
    id: Option<u32>,
    lat: Option<f64>,
    lon: Option<f64>,
    coord_range: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ProtocolSection {
    n: Option<u16>,
    m: Option<u16>,
    k: Option<u16>,
    node_max_age_secs: Option<u32>,
    timeout_secs: Option<u16>,
    timeout_variation_micros: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RadacSection {
    ip: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct LocalSection {
    socket_path: Option<String>,
    max_subscribers: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct LogSection {
    path: Option<String>,
}

/// Raw, file-shaped configuration. Every field optional; absent fields fall
/// back to the protocol whitepaper's recommended defaults.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    network: NetworkSection,
    client: ClientSection,
    protocol: ProtocolSection,
    radac: RadacSection,
    local: LocalSection,
    log: LogSection,
}

/// Process-wide mutable configuration.
///
/// Only `client_lat`, `client_lon` and `client_coord_range` are mutated after
/// startup (by [`crate::net::local::LocalEndpoint`] dispatching `LocalRequest`s).
/// Everything else is fixed for the lifetime of the process.
#[derive(Clone, Debug)]
pub struct Configuration {
    /// Origin peer IP (host order), used to bootstrap an empty random list.
    pub origin_peer_ip: u32,
    /// Origin peer port.
    pub origin_peer_port: u16,
    /// Local host IP (host order), stamped into outgoing own-Node records.
    pub own_ip: u32,
    /// Local UDP listening port.
    pub port: u16,
    /// Local control/fan-out socket path.
    pub local_socket_path: String,
    /// Local subscriber list capacity.
    pub max_subscribers: usize,

    /// This process's node identifier.
    pub client_id: u32,
    /// Current latitude, degrees. Runtime-tunable.
    pub client_lat: f64,
    /// Current longitude, degrees. Runtime-tunable.
    pub client_lon: f64,
    /// Current coordination range, meters. Runtime-tunable.
    pub client_coord_range: u16,

    /// Max age of a tracked Node, seconds.
    pub proto_node_max_age: u32,
    /// Tick base period, seconds.
    pub proto_timeout: u16,
    /// Tick jitter upper bound, microseconds.
    pub proto_timeout_variation: u32,
    /// Protocol constant N (random list cap = 2N).
    pub proto_n: u16,
    /// Protocol constant M (important list baseline size, cap = M+K).
    pub proto_m: u16,
    /// Protocol constant K (important list growth step).
    pub proto_k: u16,

    /// RADAC pass-through IP (host order), opaque to the core protocol.
    pub radac_ip: u32,
    /// RADAC pass-through port, opaque to the core protocol.
    pub radac_port: u16,

    /// Log file path (distinct from `local_socket_path`; never aliased).
    pub log_path: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            origin_peer_ip: u32::from(Ipv4Addr::from_str(DEFAULT_PEER_IP).expect("valid literal")),
            origin_peer_port: DEFAULT_PEER_PORT,
            own_ip: 0,
            port: DEFAULT_PORT,
            local_socket_path: DEFAULT_LOCAL_SOCK.to_string(),
            max_subscribers: DEFAULT_MAX_SUBSCRIBERS,
            client_id: 0,
            client_lat: DEFAULT_LAT,
            client_lon: DEFAULT_LON,
            client_coord_range: DEFAULT_COORD_RANGE,
            proto_node_max_age: DEFAULT_NODE_AGE_LIMIT,
            proto_timeout: DEFAULT_TIMEOUT_SECS,
            proto_timeout_variation: DEFAULT_TIMEOUT_VARIATION_MICROS,
            proto_n: DEFAULT_N,
            proto_m: DEFAULT_M,
            proto_k: DEFAULT_K,
            radac_ip: u32::from(Ipv4Addr::from_str(DEFAULT_RADAC_IP).expect("valid literal")),
            radac_port: DEFAULT_RADAC_PORT,
            log_path: DEFAULT_LOG_PATH.to_string(),
        }
    }
}

impl Configuration {
    /// Important-list capacity: `M + K`.
    pub fn important_list_cap(&self) -> usize {
        self.proto_m as usize + self.proto_k as usize
    }

    /// Random-list capacity: `2 * N`.
    pub fn random_list_cap(&self) -> usize {
        2 * self.proto_n as usize
    }

    /// Update the runtime-tunable geographic position.
    pub fn set_position(&mut self, lat: f64, lon: f64) {
        self.client_lat = lat;
        self.client_lon = lon;
    }

    /// Update the runtime-tunable coordination range.
    pub fn set_coordination_range(&mut self, coord_range: u16) {
        self.client_coord_range = coord_range;
    }

    /// Load configuration from a TOML file, falling back to whitepaper
    /// defaults for a missing file and for any field the file omits.
    ///
    /// A file that exists but fails to parse, or names an unparsable IP
    /// address, is `ConfigError::Invalid`/`ConfigError::Parse` and should
    /// abort startup (see error kind `ConfigInvalid`).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Read(format!("{}: {e}", path.display())))?;
            toml::from_str::<ConfigFile>(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?
        } else {
            ConfigFile::default()
        };

        let defaults = Configuration::default();

        let own_ip = match file.network.own_ip {
            Some(s) => parse_ipv4(&s)?,
            None => defaults.own_ip,
        };
        let origin_peer_ip = match file.network.origin_peer_ip {
            Some(s) => parse_ipv4(&s)?,
            None => defaults.origin_peer_ip,
        };
        let radac_ip = match file.radac.ip {
            Some(s) => parse_ipv4(&s)?,
            None => defaults.radac_ip,
        };

        Ok(Configuration {
            origin_peer_ip,
            origin_peer_port: file.network.origin_peer_port.unwrap_or(defaults.origin_peer_port),
            own_ip,
            port: file.network.port.unwrap_or(defaults.port),
            local_socket_path: file.local.socket_path.unwrap_or(defaults.local_socket_path),
            max_subscribers: file.local.max_subscribers.unwrap_or(defaults.max_subscribers),
            client_id: file.client.id.unwrap_or(defaults.client_id),
            client_lat: file.client.lat.unwrap_or(defaults.client_lat),
            client_lon: file.client.lon.unwrap_or(defaults.client_lon),
            client_coord_range: file.client.coord_range.unwrap_or(defaults.client_coord_range),
            proto_node_max_age: file.protocol.node_max_age_secs.unwrap_or(defaults.proto_node_max_age),
            proto_timeout: file.protocol.timeout_secs.unwrap_or(defaults.proto_timeout),
            proto_timeout_variation: file
                .protocol
                .timeout_variation_micros
                .unwrap_or(defaults.proto_timeout_variation),
            proto_n: file.protocol.n.unwrap_or(defaults.proto_n),
            proto_m: file.protocol.m.unwrap_or(defaults.proto_m),
            proto_k: file.protocol.k.unwrap_or(defaults.proto_k),
            radac_ip,
            radac_port: file.radac.port.unwrap_or(defaults.radac_port),
            log_path: file.log.path.unwrap_or(defaults.log_path),
        })
    }
}
