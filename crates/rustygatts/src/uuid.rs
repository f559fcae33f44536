//! GATT UUIDs
//!
//! Service and attribute identifiers keep the width they were declared with.
//! Two UUIDs are only equal when both their width and their value match, which
//! is how the stack correlates attribute tables back to services.

use byteorder::{ByteOrder, LittleEndian};
use rand::RngCore;
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

/// UUID for GATT services and attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uuid {
    /// 16-bit SIG-assigned UUID
    Uuid16(u16),
    /// 32-bit SIG-assigned UUID
    Uuid32(u32),
    /// 128-bit UUID, little-endian byte order
    Uuid128([u8; 16]),
}

impl Uuid {
    /// Convert raw little-endian bytes to a UUID based on their length
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes.len() {
            2 => Some(Uuid::Uuid16(LittleEndian::read_u16(bytes))),
            4 => Some(Uuid::Uuid32(LittleEndian::read_u32(bytes))),
            16 => {
                let mut uuid = [0u8; 16];
                uuid.copy_from_slice(bytes);
                Some(Uuid::Uuid128(uuid))
            }
            _ => None,
        }
    }

    /// Create a 128-bit UUID from its numeric value
    pub fn from_u128(uuid: u128) -> Self {
        Uuid::Uuid128(uuid.to_le_bytes())
    }

    /// Generates a random (version 4) 128-bit UUID, for vendor-specific services.
    pub fn new_random_v4() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);

        // Version and variant live in the big-endian representation.
        bytes[6] = (bytes[6] & 0x0F) | 0x40;
        bytes[8] = (bytes[8] & 0x3F) | 0x80;

        bytes.reverse();
        Uuid::Uuid128(bytes)
    }

    /// Encoded length in bytes (2, 4 or 16)
    pub fn len(&self) -> usize {
        match self {
            Uuid::Uuid16(_) => 2,
            Uuid::Uuid32(_) => 4,
            Uuid::Uuid128(_) => 16,
        }
    }

    /// Little-endian encoding, as carried in a service declaration value
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.len()];
        match self {
            Uuid::Uuid16(uuid) => LittleEndian::write_u16(&mut buf, *uuid),
            Uuid::Uuid32(uuid) => LittleEndian::write_u32(&mut buf, *uuid),
            Uuid::Uuid128(uuid) => buf.copy_from_slice(uuid),
        }
        buf
    }

    /// Get the 16-bit UUID value if this is a 16-bit UUID
    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Uuid::Uuid16(uuid) => Some(*uuid),
            _ => None,
        }
    }
}

impl From<u16> for Uuid {
    fn from(uuid: u16) -> Self {
        Uuid::Uuid16(uuid)
    }
}

impl From<u32> for Uuid {
    fn from(uuid: u32) -> Self {
        Uuid::Uuid32(uuid)
    }
}

impl From<[u8; 16]> for Uuid {
    /// Assumes bytes are in little-endian order.
    fn from(bytes: [u8; 16]) -> Self {
        Uuid::Uuid128(bytes)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uuid::Uuid16(uuid) => write!(f, "{:04x}", uuid),
            Uuid::Uuid32(uuid) => write!(f, "{:08x}", uuid),
            Uuid::Uuid128(u) => write!(
                f,
                "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
                u[15], u[14], u[13], u[12],
                u[11], u[10],
                u[9], u[8],
                u[7], u[6],
                u[5], u[4], u[3], u[2], u[1], u[0]
            ),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum UuidParseError {
    #[error("UUID must have 4, 8 or 32 hex digits")]
    InvalidLength,

    #[error("Invalid UUID format")]
    InvalidFormat,

    #[error("Invalid hex in UUID: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl From<ParseIntError> for UuidParseError {
    fn from(_: ParseIntError) -> Self {
        UuidParseError::InvalidFormat
    }
}

impl FromStr for Uuid {
    type Err = UuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.chars().any(|c| !c.is_ascii_hexdigit() && c != '-') {
            return Err(UuidParseError::InvalidFormat);
        }
        let cleaned: String = s.chars().filter(|c| *c != '-').collect();

        match cleaned.len() {
            4 => Ok(Uuid::Uuid16(u16::from_str_radix(&cleaned, 16)?)),
            8 => Ok(Uuid::Uuid32(u32::from_str_radix(&cleaned, 16)?)),
            32 => {
                let mut bytes = [0u8; 16];
                hex::decode_to_slice(&cleaned, &mut bytes)?;
                bytes.reverse();
                Ok(Uuid::Uuid128(bytes))
            }
            _ => Err(UuidParseError::InvalidLength),
        }
    }
}
