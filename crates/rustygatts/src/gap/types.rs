use crate::gap::constants::*;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressType {
    #[default]
    Public,
    Random,
    PublicIdentity,
    RandomIdentity,
}

impl From<u8> for AddressType {
    fn from(value: u8) -> Self {
        match value {
            PUBLIC_DEVICE_ADDRESS => AddressType::Public,
            RANDOM_DEVICE_ADDRESS => AddressType::Random,
            PUBLIC_IDENTITY_ADDRESS => AddressType::PublicIdentity,
            RANDOM_IDENTITY_ADDRESS => AddressType::RandomIdentity,
            _ => AddressType::Public,
        }
    }
}

impl From<AddressType> for u8 {
    fn from(value: AddressType) -> Self {
        match value {
            AddressType::Public => PUBLIC_DEVICE_ADDRESS,
            AddressType::Random => RANDOM_DEVICE_ADDRESS,
            AddressType::PublicIdentity => PUBLIC_IDENTITY_ADDRESS,
            AddressType::RandomIdentity => RANDOM_IDENTITY_ADDRESS,
        }
    }
}

/// Peer device address, in the byte order the stack reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BdAddr {
    pub bytes: [u8; BD_ADDR_LEN],
}

impl BdAddr {
    pub fn new(bytes: [u8; BD_ADDR_LEN]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() >= BD_ADDR_LEN {
            let mut bytes = [0u8; BD_ADDR_LEN];
            bytes.copy_from_slice(&slice[0..BD_ADDR_LEN]);
            Some(Self { bytes })
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.bytes[0],
            self.bytes[1],
            self.bytes[2],
            self.bytes[3],
            self.bytes[4],
            self.bytes[5]
        )
    }
}

/// Connection parameter update request for a connected peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnUpdateParams {
    /// Peer address
    pub bda: BdAddr,
    /// Minimum connection interval (units of 1.25 ms)
    pub min_int: u16,
    /// Maximum connection interval (units of 1.25 ms)
    pub max_int: u16,
    /// Peripheral latency (connection events)
    pub latency: u16,
    /// Supervision timeout (units of 10 ms)
    pub timeout: u16,
}

impl ConnUpdateParams {
    /// Same timing, addressed to another peer
    pub fn for_peer(&self, bda: BdAddr) -> Self {
        Self { bda, ..*self }
    }
}

impl Default for ConnUpdateParams {
    fn default() -> Self {
        Self {
            bda: BdAddr::default(),
            min_int: LE_CONN_INTERVAL_MIN,
            max_int: LE_CONN_INTERVAL_MAX,
            latency: LE_CONN_LATENCY,
            timeout: LE_SUPERVISION_TIMEOUT,
        }
    }
}
