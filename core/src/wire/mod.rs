//! Mesh wire format
//!
//! Three packet kinds share one leading type byte and a protocol version:
//! - Routing packets: periodic originator broadcasts with announced hosts
//! - Unicast data: a bridged Ethernet frame routed hop by hop
//! - Broadcast data: a bridged Ethernet frame flooded through the mesh
//!
//! Only the fields the routing engine consumes are defined; physical framing
//! is the I/O layer's concern.

pub mod frame;
pub mod packet;

pub use frame::{BroadcastDataPacket, EthernetHeader, UnicastDataPacket};
pub use packet::{RoutingPacket, FLAG_DIRECT_LINK, FLAG_UNIDIRECTIONAL};

use thiserror::Error;

/// Current protocol version; anything else is dropped at the boundary
pub const COMPAT_VERSION: u8 = 1;

/// Fixed routing packet header length (without announced hosts)
pub const ROUTING_HEADER_LEN: usize = 21;

/// Errors produced while decoding packets
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Buffer too short: need {need} bytes, got {got}")]
    BufferTooShort { need: usize, got: usize },

    #[error("Invalid packet type: {0}")]
    InvalidPacketType(u8),

    #[error("Incompatible version: {0}")]
    InvalidVersion(u8),

    #[error("Announcement length mismatch: {count} hosts need {need} bytes, got {got}")]
    AnnouncementMismatch { count: u8, need: usize, got: usize },

    #[error("Too many announced hosts: {0}")]
    TooManyAnnouncements(usize),
}

/// Packet kind carried in the first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Routing = 0x01,
    UnicastData = 0x02,
    BroadcastData = 0x03,
}

impl PacketType {
    pub fn from_u8(value: u8) -> Result<Self, WireError> {
        match value {
            0x01 => Ok(PacketType::Routing),
            0x02 => Ok(PacketType::UnicastData),
            0x03 => Ok(PacketType::BroadcastData),
            other => Err(WireError::InvalidPacketType(other)),
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Any decoded mesh packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshPacket {
    Routing(RoutingPacket),
    Unicast(UnicastDataPacket),
    Broadcast(BroadcastDataPacket),
}

impl MeshPacket {
    /// Decode by dispatching on the type byte
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let first = *data.first().ok_or(WireError::BufferTooShort { need: 2, got: 0 })?;
        match PacketType::from_u8(first)? {
            PacketType::Routing => RoutingPacket::decode(data).map(MeshPacket::Routing),
            PacketType::UnicastData => UnicastDataPacket::decode(data).map(MeshPacket::Unicast),
            PacketType::BroadcastData => {
                BroadcastDataPacket::decode(data).map(MeshPacket::Broadcast)
            }
        }
    }
}

/// Shared header check: type byte then version byte
pub(crate) fn check_header(data: &[u8], expected: PacketType, min_len: usize) -> Result<(), WireError> {
    if data.len() < min_len {
        return Err(WireError::BufferTooShort {
            need: min_len,
            got: data.len(),
        });
    }
    let kind = PacketType::from_u8(data[0])?;
    if kind != expected {
        return Err(WireError::InvalidPacketType(data[0]));
    }
    if data[1] != COMPAT_VERSION {
        return Err(WireError::InvalidVersion(data[1]));
    }
    Ok(())
}
