//! Data packets carrying bridged Ethernet frames

use super::{check_header, PacketType, WireError, COMPAT_VERSION};
use crate::routing::address::{LinkAddr, ADDR_LEN};

/// Ethernet header length (destination, source, ethertype)
pub const ETH_HEADER_LEN: usize = 14;

/// Addresses of a bridged Ethernet frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dest: LinkAddr,
    pub source: LinkAddr,
}

impl EthernetHeader {
    pub fn parse(frame: &[u8]) -> Result<Self, WireError> {
        if frame.len() < ETH_HEADER_LEN {
            return Err(WireError::BufferTooShort {
                need: ETH_HEADER_LEN,
                got: frame.len(),
            });
        }
        Ok(Self {
            dest: LinkAddr::from_slice(&frame[..ADDR_LEN]).unwrap_or_default(),
            source: LinkAddr::from_slice(&frame[ADDR_LEN..2 * ADDR_LEN]).unwrap_or_default(),
        })
    }

    /// Broadcast or IPv4 multicast destination: flooded instead of routed
    pub fn is_flooded(&self) -> bool {
        self.dest.is_broadcast() || self.dest.is_multicast()
    }
}

/// Unicast data packet
///
/// Format: [1 type=0x02][1 version][1 ttl][6 destination][N frame]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnicastDataPacket {
    pub ttl: u8,
    pub dest: LinkAddr,
    pub frame: Vec<u8>,
}

impl UnicastDataPacket {
    pub const HEADER_LEN: usize = 3 + ADDR_LEN;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::HEADER_LEN + self.frame.len());
        buf.push(PacketType::UnicastData.as_u8());
        buf.push(COMPAT_VERSION);
        buf.push(self.ttl);
        buf.extend_from_slice(self.dest.as_bytes());
        buf.extend_from_slice(&self.frame);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        check_header(data, PacketType::UnicastData, Self::HEADER_LEN)?;
        Ok(Self {
            ttl: data[2],
            dest: LinkAddr::from_slice(&data[3..9]).unwrap_or_default(),
            frame: data[Self::HEADER_LEN..].to_vec(),
        })
    }
}

/// Broadcast data packet
///
/// Format: [1 type=0x03][1 version][6 originator][2 seqno BE][N frame]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastDataPacket {
    pub orig: LinkAddr,
    pub seqno: u16,
    pub frame: Vec<u8>,
}

impl BroadcastDataPacket {
    pub const HEADER_LEN: usize = 2 + ADDR_LEN + 2;

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::HEADER_LEN + self.frame.len());
        buf.push(PacketType::BroadcastData.as_u8());
        buf.push(COMPAT_VERSION);
        buf.extend_from_slice(self.orig.as_bytes());
        buf.extend_from_slice(&self.seqno.to_be_bytes());
        buf.extend_from_slice(&self.frame);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        check_header(data, PacketType::BroadcastData, Self::HEADER_LEN)?;
        Ok(Self {
            orig: LinkAddr::from_slice(&data[2..8]).unwrap_or_default(),
            seqno: u16::from_be_bytes([data[8], data[9]]),
            frame: data[Self::HEADER_LEN..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth_frame(dest: LinkAddr, source: LinkAddr) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(dest.as_bytes());
        frame.extend_from_slice(source.as_bytes());
        frame.extend_from_slice(&[0x08, 0x00]);
        frame.extend_from_slice(b"payload");
        frame
    }

    #[test]
    fn test_ethernet_header() {
        let dest = LinkAddr([0x0a, 0, 0, 0, 0, 1]);
        let source = LinkAddr([0x0a, 0, 0, 0, 0, 2]);
        let header = EthernetHeader::parse(&eth_frame(dest, source)).unwrap();
        assert_eq!(header.dest, dest);
        assert_eq!(header.source, source);
        assert!(!header.is_flooded());

        let bcast = EthernetHeader::parse(&eth_frame(LinkAddr::BROADCAST, source)).unwrap();
        assert!(bcast.is_flooded());

        assert!(EthernetHeader::parse(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_unicast_layout() {
        let packet = UnicastDataPacket {
            ttl: 49,
            dest: LinkAddr([2, 0, 0, 0, 0, 7]),
            frame: vec![1, 2, 3],
        };
        let bytes = packet.encode();
        assert_eq!(&bytes[..3], &[0x02, COMPAT_VERSION, 49]);
        assert_eq!(bytes.len(), UnicastDataPacket::HEADER_LEN + 3);
        assert_eq!(UnicastDataPacket::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_broadcast_layout() {
        let packet = BroadcastDataPacket {
            orig: LinkAddr([2, 0, 0, 0, 0, 7]),
            seqno: 0x0102,
            frame: vec![9; 20],
        };
        let bytes = packet.encode();
        assert_eq!(&bytes[8..10], &[0x01, 0x02]);
        assert_eq!(BroadcastDataPacket::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_wrong_type_rejected() {
        let packet = UnicastDataPacket {
            ttl: 5,
            dest: LinkAddr([2, 0, 0, 0, 0, 7]),
            frame: vec![0; 4],
        };
        assert_eq!(
            BroadcastDataPacket::decode(&packet.encode()),
            Err(WireError::InvalidPacketType(0x02))
        );
    }
}
