//! Routing packet: the periodic originator broadcast

use super::{check_header, PacketType, WireError, COMPAT_VERSION, ROUTING_HEADER_LEN};
use crate::routing::address::{LinkAddr, ADDR_LEN};

/// Relayed to tell a neighbour we hear it, but not bidirectionally
pub const FLAG_UNIDIRECTIONAL: u8 = 0x80;
/// Heard with no intermediate hop, on the interface it is sent out of
pub const FLAG_DIRECT_LINK: u8 = 0x40;

/// Maximum hosts one packet can announce (count is a single byte)
pub const MAX_ANNOUNCEMENTS: usize = u8::MAX as usize;

/// Routing packet
///
/// Format (21 bytes + 6 per announced host):
/// [1 byte]  type (0x01)
/// [1 byte]  version
/// [1 byte]  flags
/// [1 byte]  ttl
/// [1 byte]  gateway flags
/// [1 byte]  tq
/// [2 bytes] seqno (BE u16)
/// [6 bytes] originator
/// [6 bytes] previous sender
/// [1 byte]  announced host count
/// [6 × n]   announced hosts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingPacket {
    pub flags: u8,
    pub ttl: u8,
    pub gw_flags: u8,
    pub tq: u8,
    pub seqno: u16,
    pub orig: LinkAddr,
    pub prev_sender: LinkAddr,
    pub announcements: Vec<LinkAddr>,
}

impl RoutingPacket {
    pub fn is_unidirectional(&self) -> bool {
        self.flags & FLAG_UNIDIRECTIONAL != 0
    }

    pub fn is_direct_link(&self) -> bool {
        self.flags & FLAG_DIRECT_LINK != 0
    }

    pub fn encoded_len(&self) -> usize {
        ROUTING_HEADER_LEN + self.announcements.len() * ADDR_LEN
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        if self.announcements.len() > MAX_ANNOUNCEMENTS {
            return Err(WireError::TooManyAnnouncements(self.announcements.len()));
        }

        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.push(PacketType::Routing.as_u8());
        buf.push(COMPAT_VERSION);
        buf.push(self.flags);
        buf.push(self.ttl);
        buf.push(self.gw_flags);
        buf.push(self.tq);
        buf.extend_from_slice(&self.seqno.to_be_bytes());
        buf.extend_from_slice(self.orig.as_bytes());
        buf.extend_from_slice(self.prev_sender.as_bytes());
        buf.push(self.announcements.len() as u8);
        for host in &self.announcements {
            buf.extend_from_slice(host.as_bytes());
        }
        Ok(buf)
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        check_header(data, PacketType::Routing, ROUTING_HEADER_LEN)?;

        let count = data[20];
        let need = ROUTING_HEADER_LEN + count as usize * ADDR_LEN;
        if data.len() != need {
            return Err(WireError::AnnouncementMismatch {
                count,
                need,
                got: data.len(),
            });
        }

        Ok(Self {
            flags: data[2],
            ttl: data[3],
            gw_flags: data[4],
            tq: data[5],
            seqno: u16::from_be_bytes([data[6], data[7]]),
            orig: read_addr(&data[8..14]),
            prev_sender: read_addr(&data[14..20]),
            announcements: decode_announcements(&data[ROUTING_HEADER_LEN..]),
        })
    }
}

/// Serialise an announcement list into its raw wire encoding
pub fn encode_announcements(hosts: &[LinkAddr]) -> Vec<u8> {
    hosts.iter().flat_map(|h| h.0).collect()
}

/// Parse a raw announcement buffer; a trailing partial address is ignored
pub fn decode_announcements(buf: &[u8]) -> Vec<LinkAddr> {
    buf.chunks_exact(ADDR_LEN).map(read_addr).collect()
}

fn read_addr(bytes: &[u8]) -> LinkAddr {
    LinkAddr::from_slice(bytes).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RoutingPacket {
        RoutingPacket {
            flags: FLAG_DIRECT_LINK,
            ttl: 50,
            gw_flags: 0,
            tq: 255,
            seqno: 0xbeef,
            orig: LinkAddr([2, 0, 0, 0, 0, 1]),
            prev_sender: LinkAddr([2, 0, 0, 0, 0, 2]),
            announcements: vec![LinkAddr([0x0a, 0, 0, 0, 0, 3])],
        }
    }

    #[test]
    fn test_encode_layout() {
        let bytes = sample().encode().unwrap();
        assert_eq!(bytes.len(), ROUTING_HEADER_LEN + 6);
        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[1], COMPAT_VERSION);
        assert_eq!(bytes[2], FLAG_DIRECT_LINK);
        assert_eq!(&bytes[6..8], &[0xbe, 0xef]);
        assert_eq!(bytes[20], 1);
        assert_eq!(RoutingPacket::decode(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_decode_rejects_truncated() {
        let bytes = sample().encode().unwrap();
        assert!(matches!(
            RoutingPacket::decode(&bytes[..10]),
            Err(WireError::BufferTooShort { .. })
        ));
        assert!(matches!(
            RoutingPacket::decode(&bytes[..bytes.len() - 1]),
            Err(WireError::AnnouncementMismatch { count: 1, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_version() {
        let mut bytes = sample().encode().unwrap();
        bytes[1] = 9;
        assert_eq!(RoutingPacket::decode(&bytes), Err(WireError::InvalidVersion(9)));
    }

    #[test]
    fn test_flags() {
        let mut packet = sample();
        assert!(packet.is_direct_link());
        assert!(!packet.is_unidirectional());
        packet.flags |= FLAG_UNIDIRECTIONAL;
        assert!(packet.is_unidirectional());
    }

    #[test]
    fn test_too_many_announcements() {
        let mut packet = sample();
        packet.announcements = vec![LinkAddr([2, 0, 0, 0, 0, 1]); MAX_ANNOUNCEMENTS + 1];
        assert!(matches!(
            packet.encode(),
            Err(WireError::TooManyAnnouncements(256))
        ));
    }

    #[test]
    fn test_announcement_buffer() {
        let hosts = vec![LinkAddr([1; 6]), LinkAddr([2; 6])];
        let raw = encode_announcements(&hosts);
        assert_eq!(raw.len(), 12);
        assert_eq!(decode_announcements(&raw), hosts);
        assert_eq!(decode_announcements(&raw[..8]), vec![LinkAddr([1; 6])]);
    }
}
