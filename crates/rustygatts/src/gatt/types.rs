//! Common types for GATT attribute tables
//!
//! This module defines the attribute descriptor a service hands to the stack
//! when its table is created, and the flag sets used inside it.

use crate::att::constants::*;
use crate::uuid::Uuid;
use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt};
use log::warn;
use std::io::Cursor;

/// Attribute handle assigned by the stack
pub type Handle = u16;

bitflags! {
    /// Characteristic properties as defined in the Bluetooth specification
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CharacteristicProperty: u8 {
        const BROADCAST = 0x01;
        const READ = 0x02;
        const WRITE_WITHOUT_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
        const INDICATE = 0x20;
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
        const EXTENDED_PROPERTIES = 0x80;
    }
}

bitflags! {
    /// ATT attribute permissions
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AttPermissions: u16 {
        const READ = ATT_PERM_READ;
        const WRITE = ATT_PERM_WRITE;
        const READ_ENCRYPTED = ATT_PERM_READ_ENCRYPTED;
        const WRITE_ENCRYPTED = ATT_PERM_WRITE_ENCRYPTED;
        const READ_AUTHENTICATED = ATT_PERM_READ_AUTHENTICATED;
        const WRITE_AUTHENTICATED = ATT_PERM_WRITE_AUTHENTICATED;
        const READ_AUTHORIZED = ATT_PERM_READ_AUTHORIZED;
        const WRITE_AUTHORIZED = ATT_PERM_WRITE_AUTHORIZED;
    }
}

impl AttPermissions {
    pub fn read_only() -> Self {
        Self::READ
    }

    pub fn write_only() -> Self {
        Self::WRITE
    }

    pub fn read_write() -> Self {
        Self::READ | Self::WRITE
    }
}

bitflags! {
    /// Client Characteristic Configuration descriptor value
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClientConfig: u16 {
        const NOTIFY = 0x0001;
        const INDICATE = 0x0002;
    }
}

impl ClientConfig {
    /// Decode the two-byte little-endian value a client writes to a CCCD.
    ///
    /// Returns `None` for payloads of any other length.
    pub fn from_write(value: &[u8]) -> Option<Self> {
        if value.len() != 2 {
            return None;
        }
        let raw = Cursor::new(value).read_u16::<LittleEndian>().ok()?;
        Some(Self::from_bits_truncate(raw))
    }
}

/// One entry of a service attribute table, as handed to the stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrDescriptor {
    /// Attribute type
    pub uuid: Uuid,
    /// Access permissions
    pub perm: AttPermissions,
    /// Maximum value length the stack reserves
    pub max_len: u16,
    /// Initial value
    pub value: Vec<u8>,
    /// Let the stack answer reads/writes of this attribute by itself
    pub auto_rsp: bool,
}

impl AttrDescriptor {
    /// Create an application-answered attribute whose value fits exactly.
    ///
    /// The reserved length saturates at `u16::MAX`, the most an attribute can
    /// hold.
    pub fn new(uuid: Uuid, perm: AttPermissions, value: Vec<u8>) -> Self {
        let max_len = u16::try_from(value.len()).unwrap_or_else(|_| {
            warn!("{} byte initial value for {} exceeds the attribute limit", value.len(), uuid);
            u16::MAX
        });
        Self {
            uuid,
            perm,
            max_len,
            value,
            auto_rsp: false,
        }
    }

    pub fn with_max_len(mut self, max_len: u16) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn with_auto_rsp(mut self) -> Self {
        self.auto_rsp = true;
        self
    }

    /// Whether this entry declares a primary or secondary service
    pub fn is_service_declaration(&self) -> bool {
        matches!(
            self.uuid.as_u16(),
            Some(PRIMARY_SERVICE_UUID) | Some(SECONDARY_SERVICE_UUID)
        )
    }

    /// The service UUID carried by a service declaration
    pub fn service_uuid(&self) -> Option<Uuid> {
        if self.is_service_declaration() {
            Uuid::from_bytes(&self.value)
        } else {
            None
        }
    }
}

/// Response payload a handler sends for a deferred read
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttrValue {
    pub handle: Handle,
    pub offset: u16,
    pub value: Vec<u8>,
}
