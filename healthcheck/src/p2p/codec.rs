//! Peer protocol framing
//!
//! Each frame is a little-endian `u32` length, a one byte message type, and
//! the payload. The length covers the type byte. Only the messages a health
//! probe cares about are decoded; everything else surfaces as
//! [`PeerMessage::Other`].

use super::session::PeerError;
use crate::constants::p2p::{AGENT_NAME, MAX_FRAME_BYTES, NETWORK_VERSION, START_HEAD_BLOCK_NUM};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use std::fmt;
use tokio_util::codec::{Decoder, Encoder};

pub const HANDSHAKE_MESSAGE: u8 = 0;
pub const CHAIN_SIZE_MESSAGE: u8 = 1;
pub const GO_AWAY_MESSAGE: u8 = 2;
pub const TIME_MESSAGE: u8 = 3;
pub const NOTICE_MESSAGE: u8 = 4;
pub const REQUEST_MESSAGE: u8 = 5;
pub const SYNC_REQUEST_MESSAGE: u8 = 6;
pub const SIGNED_BLOCK_MESSAGE: u8 = 7;
pub const PACKED_TRANSACTION_MESSAGE: u8 = 8;

/// Block timestamps count 500ms slots from this instant (2000-01-01T00:00:00Z)
const BLOCK_EPOCH_MS: i64 = 946_684_800_000;
const BLOCK_INTERVAL_MS: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoAwayReason {
    NoReason,
    SelfConnect,
    Duplicate,
    WrongChain,
    WrongVersion,
    Forked,
    Unlinkable,
    BadTransaction,
    Validation,
    BenignOther,
    FatalOther,
    Authentication,
    Unknown(u32),
}

impl From<u32> for GoAwayReason {
    fn from(code: u32) -> Self {
        match code {
            0 => GoAwayReason::NoReason,
            1 => GoAwayReason::SelfConnect,
            2 => GoAwayReason::Duplicate,
            3 => GoAwayReason::WrongChain,
            4 => GoAwayReason::WrongVersion,
            5 => GoAwayReason::Forked,
            6 => GoAwayReason::Unlinkable,
            7 => GoAwayReason::BadTransaction,
            8 => GoAwayReason::Validation,
            9 => GoAwayReason::BenignOther,
            10 => GoAwayReason::FatalOther,
            11 => GoAwayReason::Authentication,
            other => GoAwayReason::Unknown(other),
        }
    }
}

impl fmt::Display for GoAwayReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoAwayReason::NoReason => write!(f, "no reason"),
            GoAwayReason::SelfConnect => write!(f, "self"),
            GoAwayReason::Duplicate => write!(f, "duplicate"),
            GoAwayReason::WrongChain => write!(f, "wrong chain"),
            GoAwayReason::WrongVersion => write!(f, "wrong version"),
            GoAwayReason::Forked => write!(f, "forked"),
            GoAwayReason::Unlinkable => write!(f, "unlinkable"),
            GoAwayReason::BadTransaction => write!(f, "bad transaction"),
            GoAwayReason::Validation => write!(f, "validation"),
            GoAwayReason::BenignOther => write!(f, "benign other"),
            GoAwayReason::FatalOther => write!(f, "fatal other"),
            GoAwayReason::Authentication => write!(f, "authentication"),
            GoAwayReason::Unknown(code) => write!(f, "unknown reason {}", code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerMessage {
    Handshake,
    GoAway(GoAwayReason),
    SignedBlock { timestamp: DateTime<Utc> },
    Other(u8),
}

/// Our half of the handshake. Keys, signatures and block ids are zeroed; the
/// peer only needs a plausible chain id and version to start talking.
#[derive(Debug, Clone)]
pub struct Handshake {
    pub network_version: u16,
    pub chain_id: [u8; 32],
    pub node_id: [u8; 32],
    pub time_ns: i64,
    pub p2p_address: String,
    pub last_irreversible_block_num: u32,
    pub head_num: u32,
    pub os: String,
    pub agent: String,
    pub generation: i16,
}

impl Handshake {
    pub fn new(chain_id: [u8; 32]) -> Self {
        let node_id: [u8; 32] = rand::random();
        let time_ns = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Self {
            network_version: NETWORK_VERSION,
            chain_id,
            node_id,
            time_ns,
            p2p_address: format!("{}:9876 - {}", AGENT_NAME, &hex::encode(node_id)[..7]),
            last_irreversible_block_num: START_HEAD_BLOCK_NUM,
            head_num: START_HEAD_BLOCK_NUM,
            os: std::env::consts::OS.to_string(),
            agent: AGENT_NAME.to_string(),
            generation: 1,
        }
    }

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.network_version);
        buf.put_slice(&self.chain_id);
        buf.put_slice(&self.node_id);
        // public key: K1 variant tag and an all-zero compressed key
        buf.put_u8(0);
        buf.put_bytes(0, 33);
        buf.put_i64_le(self.time_ns);
        buf.put_bytes(0, 32); // token
        // signature: K1 variant tag and an all-zero signature
        buf.put_u8(0);
        buf.put_bytes(0, 65);
        put_string(buf, &self.p2p_address);
        buf.put_u32_le(self.last_irreversible_block_num);
        buf.put_bytes(0, 32);
        buf.put_u32_le(self.head_num);
        buf.put_bytes(0, 32);
        put_string(buf, &self.os);
        put_string(buf, &self.agent);
        buf.put_i16_le(self.generation);
    }
}

#[derive(Debug, Clone)]
pub struct PeerCodec {
    max_frame_bytes: usize,
}

impl PeerCodec {
    pub fn new() -> Self {
        Self {
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }
}

impl Default for PeerCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PeerCodec {
    type Item = PeerMessage;
    type Error = PeerError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }

        let frame_len = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if frame_len == 0 {
            return Err(PeerError::Protocol("empty frame".to_string()));
        }
        if frame_len > self.max_frame_bytes {
            return Err(PeerError::Protocol(format!(
                "frame of {} bytes exceeds limit",
                frame_len
            )));
        }
        if src.len() < 4 + frame_len {
            src.reserve(4 + frame_len - src.len());
            return Ok(None);
        }

        src.advance(4);
        let mut frame = src.split_to(frame_len).freeze();
        let msg_type = frame.get_u8();
        decode_message(msg_type, frame).map(Some)
    }

    /// A peer hanging up mid-frame is a close, not a protocol violation.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None => Err(PeerError::Closed),
        }
    }
}

impl<'a> Encoder<&'a Handshake> for PeerCodec {
    type Error = PeerError;

    fn encode(&mut self, handshake: &'a Handshake, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut payload = BytesMut::with_capacity(320);
        handshake.encode_payload(&mut payload);

        dst.reserve(payload.len() + 5);
        dst.put_u32_le((payload.len() + 1) as u32);
        dst.put_u8(HANDSHAKE_MESSAGE);
        dst.put_slice(&payload);
        Ok(())
    }
}

fn decode_message(msg_type: u8, mut payload: Bytes) -> Result<PeerMessage, PeerError> {
    match msg_type {
        HANDSHAKE_MESSAGE => Ok(PeerMessage::Handshake),
        GO_AWAY_MESSAGE => {
            let code = get_varuint32(&mut payload)
                .ok_or_else(|| PeerError::Protocol("truncated go away".to_string()))?;
            Ok(PeerMessage::GoAway(GoAwayReason::from(code)))
        }
        SIGNED_BLOCK_MESSAGE => {
            if payload.remaining() < 4 {
                return Err(PeerError::Protocol("truncated signed block".to_string()));
            }
            let slot = payload.get_u32_le();
            Ok(PeerMessage::SignedBlock {
                timestamp: block_slot_time(slot)?,
            })
        }
        other => Ok(PeerMessage::Other(other)),
    }
}

pub fn block_slot_time(slot: u32) -> Result<DateTime<Utc>, PeerError> {
    let millis = slot as i64 * BLOCK_INTERVAL_MS + BLOCK_EPOCH_MS;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| PeerError::Protocol(format!("block slot {} out of range", slot)))
}

/// Inverse of [`block_slot_time`], rounding down to the containing slot.
pub fn block_slot(time: DateTime<Utc>) -> u32 {
    ((time.timestamp_millis() - BLOCK_EPOCH_MS) / BLOCK_INTERVAL_MS).max(0) as u32
}

fn put_varuint32(buf: &mut BytesMut, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.put_u8(byte);
            return;
        }
        buf.put_u8(byte | 0x80);
    }
}

fn get_varuint32(buf: &mut Bytes) -> Option<u32> {
    let mut value: u32 = 0;
    for shift in (0..35).step_by(7) {
        if !buf.has_remaining() {
            return None;
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7f) as u32) << shift;
        if byte & 0x80 == 0 {
            return Some(value);
        }
    }
    None
}

fn put_string(buf: &mut BytesMut, value: &str) {
    put_varuint32(buf, value.len() as u32);
    buf.put_slice(value.as_bytes());
}
