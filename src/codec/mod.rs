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

//! Fixed-width, big-endian wire codec for [`NodeCollection`] and
//! [`LocalRequest`].
//!
//! Wire layout of a `NodeCollection`:
//!
//! ```text
//! header (5 bytes): version_id: u16 | payload_type: u8 | node_count: u16
//! then node_count repetitions of a 38-byte Node record:
//!   node_id: u32 | lat: f64 | lon: f64 | coord_range: u16 | ip_addr: u32
//!   | port: u16 | radac_ip: u32 | radac_port: u16 | time_stamp: u32
//! ```
//!
//! `f64` fields are carried as the big-endian bytes of `f64::to_bits`
//! (IEEE-754 binary64), decoded with `f64::from_bits`.

use thiserror::Error;

use crate::core::types::{
    LocalRequest, Node, NodeCollection, PayloadType, LOCAL_ADDR_MAX_LENGTH, NODES_MAX_SIZE,
};

/// Byte length of the `NodeCollection` header.
pub const HEADER_LEN: usize = 2 + 1 + 2;
/// Byte length of a single packed `Node` record.
pub const NODE_RECORD_LEN: usize = 4 + 8 + 8 + 2 + 4 + 2 + 4 + 2 + 4;

/// Codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// Buffer too short to hold even a header.
    #[error("buffer too short for a NodeCollection header: got {got}, need at least {HEADER_LEN}")]
    ShortHeader {
        /// Bytes actually available.
        got: usize,
    },
    /// Declared node count doesn't fit in the remaining bytes.
    #[error("buffer too short for {declared} node records: got {got} bytes, need {need}")]
    ShortBody {
        /// Nodes declared in the header.
        declared: usize,
        /// Bytes actually available after the header.
        got: usize,
        /// Bytes required.
        need: usize,
    },
    /// The payload type tag is not one of the known wire values.
    #[error("unknown payload type tag: {0}")]
    UnknownPayloadType(u8),
    /// Declared node count exceeds the absolute ceiling.
    #[error("node count {0} exceeds maximum {NODES_MAX_SIZE}")]
    TooManyNodes(usize),
    /// A decoded Node carries `node_id == 0` (tombstone), rejected at the wire boundary.
    #[error("received node record is a tombstone (node_id == 0)")]
    TombstoneOnWire,
    /// A `LocalRequest` tag byte is unrecognized.
    #[error("unknown local request tag: {0}")]
    UnknownLocalRequestTag(u8),
    /// A `LocalRequest` path field is empty or exceeds `LOCAL_ADDR_MAX_LENGTH`.
    #[error("local request path invalid: length {0}")]
    InvalidLocalPath(usize),
    /// A `LocalRequest` path field exceeds `LOCAL_ADDR_MAX_LENGTH` bytes including the NUL terminator.
    #[error("local request path too long: {0} bytes")]
    PathTooLong(usize),
    /// A `LocalRequest` path field is not valid UTF-8.
    #[error("local request path is not valid UTF-8")]
    PathNotUtf8,
    /// The deprecated `SET_POS_AND_RANGE` request was received; rejected without parsing further.
    #[error("SET_POS_AND_RANGE is deprecated and is always rejected")]
    DeprecatedRequest,
    /// Buffer too short for the `LocalRequest` variant being decoded.
    #[error("buffer too short for local request: got {got}, need {need}")]
    ShortLocalRequest {
        /// Bytes actually available.
        got: usize,
        /// Bytes required.
        need: usize,
    },
    /// Trailing bytes remained after decoding a complete message.
    #[error("{0} trailing bytes after decoding")]
    TrailingBytes(usize),
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_be_bytes());
}
fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}
fn put_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_bits().to_be_bytes());
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take_u16(&mut self) -> u16 {
        let v = u16::from_be_bytes(self.buf[self.pos..self.pos + 2].try_into().unwrap());
        self.pos += 2;
        v
    }

    fn take_u32(&mut self) -> u32 {
        let v = u32::from_be_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        v
    }

    fn take_f64(&mut self) -> f64 {
        let bits = u64::from_be_bytes(self.buf[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        f64::from_bits(bits)
    }

    fn take_u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }
}

/// Serialize a `NodeCollection` to its wire representation.
///
/// `PayloadType::Internal` collections are never sent over UDP; encoding one
/// is a programmer error elsewhere, not a codec concern, so it is accepted
/// here like any other tag.
pub fn pack_node_collection(nc: &NodeCollection) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + nc.nodes.len() * NODE_RECORD_LEN);
    put_u16(&mut buf, nc.version_id);
    buf.push(nc.payload_type.as_u8());
    put_u16(&mut buf, nc.nodes.len() as u16);
    for n in &nc.nodes {
        put_u32(&mut buf, n.node_id);
        put_f64(&mut buf, n.lat);
        put_f64(&mut buf, n.lon);
        put_u16(&mut buf, n.coord_range);
        put_u32(&mut buf, n.ip_addr);
        put_u16(&mut buf, n.port);
        put_u32(&mut buf, n.radac_ip);
        put_u16(&mut buf, n.radac_port);
        put_u32(&mut buf, n.time_stamp);
    }
    buf
}

/// Parse a `NodeCollection` from its wire representation.
///
/// Rejects any record whose `node_id == 0` (tombstone) rather than admitting
/// it into the caller's view of the network.
pub fn unpack_node_collection(buf: &[u8]) -> Result<NodeCollection, CodecError> {
    if buf.len() < HEADER_LEN {
        return Err(CodecError::ShortHeader { got: buf.len() });
    }
    let mut cur = Cursor::new(buf);
    let version_id = cur.take_u16();
    let payload_tag = cur.take_u8();
    let payload_type = PayloadType::from_u8(payload_tag)
        .ok_or(CodecError::UnknownPayloadType(payload_tag))?;
    let node_count = cur.take_u16() as usize;

    if node_count > NODES_MAX_SIZE {
        return Err(CodecError::TooManyNodes(node_count));
    }
    let need = node_count * NODE_RECORD_LEN;
    if cur.remaining() < need {
        return Err(CodecError::ShortBody {
            declared: node_count,
            got: cur.remaining(),
            need,
        });
    }

    let mut nodes = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        let node_id = cur.take_u32();
        if node_id == 0 {
            return Err(CodecError::TombstoneOnWire);
        }
        let lat = cur.take_f64();
        let lon = cur.take_f64();
        let coord_range = cur.take_u16();
        let ip_addr = cur.take_u32();
        let port = cur.take_u16();
        let radac_ip = cur.take_u32();
        let radac_port = cur.take_u16();
        let time_stamp = cur.take_u32();
        nodes.push(Node::new(
            node_id, lat, lon, coord_range, ip_addr, port, radac_ip, radac_port, time_stamp,
        ));
    }

    if cur.remaining() != 0 {
        return Err(CodecError::TrailingBytes(cur.remaining()));
    }

    Ok(NodeCollection {
        version_id,
        payload_type,
        max_len: node_count,
        nodes,
    })
}

const LR_TAG_SET_POSITION: u8 = 0;
const LR_TAG_SET_COORD_RANGE: u8 = 1;
const LR_TAG_SET_POS_AND_RANGE: u8 = 2;
const LR_TAG_SUB: u8 = 3;
const LR_TAG_UNSUB: u8 = 4;

/// NUL-terminated, matching the original `snprintf("%s", ...)` encoding:
/// the terminator counts toward `LOCAL_ADDR_MAX_LENGTH`.
fn put_path(buf: &mut Vec<u8>, path: &str) -> Result<(), CodecError> {
    let bytes = path.as_bytes();
    if bytes.is_empty() {
        return Err(CodecError::InvalidLocalPath(0));
    }
    if bytes.len() + 1 > LOCAL_ADDR_MAX_LENGTH {
        return Err(CodecError::PathTooLong(bytes.len() + 1));
    }
    buf.extend_from_slice(bytes);
    buf.push(0);
    Ok(())
}

/// Serialize a `LocalRequest` to its wire representation (1-byte tag plus
/// a variant-specific payload).
pub fn pack_local_request(req: &LocalRequest) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    match req {
        LocalRequest::SetPosition { lat, lon } => {
            buf.push(LR_TAG_SET_POSITION);
            put_f64(&mut buf, *lat);
            put_f64(&mut buf, *lon);
        }
        LocalRequest::SetCoordinationRange { coord_range } => {
            buf.push(LR_TAG_SET_COORD_RANGE);
            put_u16(&mut buf, *coord_range);
        }
        LocalRequest::SubCandNodes { sock_addr } => {
            buf.push(LR_TAG_SUB);
            put_path(&mut buf, sock_addr)?;
        }
        LocalRequest::UnsubCandNodes { sock_addr } => {
            buf.push(LR_TAG_UNSUB);
            put_path(&mut buf, sock_addr)?;
        }
    }
    Ok(buf)
}

/// Parse a `LocalRequest` from its wire representation.
pub fn unpack_local_request(buf: &[u8]) -> Result<LocalRequest, CodecError> {
    if buf.is_empty() {
        return Err(CodecError::ShortLocalRequest { got: 0, need: 1 });
    }
    let mut cur = Cursor::new(buf);
    let tag = cur.take_u8();
    let req = match tag {
        LR_TAG_SET_POSITION => {
            if cur.remaining() < 16 {
                return Err(CodecError::ShortLocalRequest {
                    got: cur.remaining(),
                    need: 16,
                });
            }
            LocalRequest::SetPosition {
                lat: cur.take_f64(),
                lon: cur.take_f64(),
            }
        }
        LR_TAG_SET_COORD_RANGE => {
            if cur.remaining() < 2 {
                return Err(CodecError::ShortLocalRequest {
                    got: cur.remaining(),
                    need: 2,
                });
            }
            LocalRequest::SetCoordinationRange {
                coord_range: cur.take_u16(),
            }
        }
        LR_TAG_SET_POS_AND_RANGE => return Err(CodecError::DeprecatedRequest),
        LR_TAG_SUB | LR_TAG_UNSUB => {
            let rest = &cur.buf[cur.pos..];
            let nul_at = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
            if nul_at == 0 {
                return Err(CodecError::InvalidLocalPath(0));
            }
            if nul_at + 1 > LOCAL_ADDR_MAX_LENGTH {
                return Err(CodecError::PathTooLong(nul_at + 1));
            }
            let path_bytes = &rest[..nul_at];
            let sock_addr = std::str::from_utf8(path_bytes)
                .map_err(|_| CodecError::PathNotUtf8)?
                .to_string();
            cur.pos += nul_at;
            if nul_at < rest.len() {
                cur.pos += 1;
            }
            if tag == LR_TAG_SUB {
                LocalRequest::SubCandNodes { sock_addr }
            } else {
                LocalRequest::UnsubCandNodes { sock_addr }
            }
        }
        other => return Err(CodecError::UnknownLocalRequestTag(other)),
    };

    if cur.remaining() != 0 {
        return Err(CodecError::TrailingBytes(cur.remaining()));
    }
    Ok(req)
}
