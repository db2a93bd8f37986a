//! Link-layer identities used throughout the engine
//!
//! Every mesh participant is identified by the 6-byte hardware address of the
//! interface that originated its broadcasts. Local interfaces are referred to
//! by a small dense index so per-interface state can live in plain vectors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a link-layer address in bytes
pub const ADDR_LEN: usize = 6;

/// 6-byte link-layer address (node identifier)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinkAddr(pub [u8; ADDR_LEN]);

/// Errors produced while parsing a textual link address
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddrParseError {
    #[error("Invalid link address length: expected 6 bytes, got {0}")]
    InvalidLength(usize),

    #[error("Invalid hex in link address: {0}")]
    InvalidHex(String),
}

impl LinkAddr {
    pub const BROADCAST: LinkAddr = LinkAddr([0xff; ADDR_LEN]);
    pub const ZERO: LinkAddr = LinkAddr([0; ADDR_LEN]);

    pub fn new(bytes: [u8; ADDR_LEN]) -> Self {
        LinkAddr(bytes)
    }

    /// Read an address from the first six bytes of `bytes`
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; ADDR_LEN] = bytes.get(..ADDR_LEN)?.try_into().ok()?;
        Some(LinkAddr(raw))
    }

    pub fn as_bytes(&self) -> &[u8; ADDR_LEN] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// IPv4 multicast range 01:00:5e:00:00:00 - 01:00:5e:7f:ff:ff
    pub fn is_multicast(&self) -> bool {
        self.0[0] == 0x01 && self.0[1] == 0x00 && self.0[2] == 0x5e && (self.0[3] & 0x80) == 0
    }

    /// Addresses that must never be learned as a bridged host
    pub fn is_learnable(&self) -> bool {
        !(self.is_broadcast() || self.is_zero() || self.is_multicast())
    }
}

impl fmt::Display for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkAddr({})", self)
    }
}

impl FromStr for LinkAddr {
    type Err = AddrParseError;

    /// Accepts `aa:bb:cc:dd:ee:ff`, `aa-bb-...` or bare hex
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        let bytes = hex::decode(&cleaned).map_err(|e| AddrParseError::InvalidHex(e.to_string()))?;
        let raw: [u8; ADDR_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddrParseError::InvalidLength(bytes.len()))?;
        Ok(LinkAddr(raw))
    }
}

impl TryFrom<String> for LinkAddr {
    type Error = AddrParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LinkAddr> for String {
    fn from(addr: LinkAddr) -> Self {
        addr.to_string()
    }
}

/// Dense index of a local participating interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IfaceId(pub u16);

impl IfaceId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for IfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "if{}", self.0)
    }
}

/// A local interface as reported by the I/O layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalInterface {
    pub id: IfaceId,
    /// Device name, used only for logging
    pub name: String,
    /// Hardware address; also the originator address of this interface's broadcasts
    pub addr: LinkAddr,
}

impl LocalInterface {
    pub fn new(id: u16, name: impl Into<String>, addr: LinkAddr) -> Self {
        Self {
            id: IfaceId(id),
            name: name.into(),
            addr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let addr: LinkAddr = "02:00:5e:10:00:01".parse().unwrap();
        assert_eq!(addr.0, [0x02, 0x00, 0x5e, 0x10, 0x00, 0x01]);
        assert_eq!(addr.to_string(), "02:00:5e:10:00:01");

        let bare: LinkAddr = "02005e100001".parse().unwrap();
        assert_eq!(addr, bare);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            "02:00:5e".parse::<LinkAddr>(),
            Err(AddrParseError::InvalidLength(3))
        ));
        assert!(matches!(
            "zz:00:00:00:00:00".parse::<LinkAddr>(),
            Err(AddrParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_special_addresses() {
        assert!(LinkAddr::BROADCAST.is_broadcast());
        assert!(LinkAddr::ZERO.is_zero());
        assert!(LinkAddr([0x01, 0x00, 0x5e, 0x01, 0x02, 0x03]).is_multicast());
        assert!(!LinkAddr([0x01, 0x00, 0x5e, 0x81, 0x02, 0x03]).is_multicast());

        assert!(!LinkAddr::BROADCAST.is_learnable());
        assert!(!LinkAddr::ZERO.is_learnable());
        assert!(LinkAddr([0x02, 0, 0, 0, 0, 7]).is_learnable());
    }

    #[test]
    fn test_serde_as_string() {
        let addr = LinkAddr([0x02, 0, 0, 0, 0, 0x0a]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"02:00:00:00:00:0a\"");
        let back: LinkAddr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
