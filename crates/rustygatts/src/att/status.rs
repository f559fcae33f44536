//! Status codes exchanged with the BLE stack
//!
//! Two families share one byte. Codes below 0x80 are ATT error codes, the
//! ones this layer (or a handler) answers a request with. Codes from 0x80 up
//! are the stack's own completion codes, reported on registration, table
//! creation and service start. Anything without a name here is kept raw.

use super::constants::*;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GattStatus {
    #[default]
    Ok,
    InvalidHandle,
    ReadNotPermitted,
    WriteNotPermitted,
    InvalidOffset,
    InvalidAttrLen,
    /// Stack ran out of memory or control blocks
    NoResources,
    InternalError,
    WrongState,
    /// Attribute database is full; the table does not fit
    DbFull,
    Busy,
    /// Generic stack failure
    Error,
    IllegalParameter,
    Congested,
    Other(u8),
}

impl From<u8> for GattStatus {
    fn from(code: u8) -> Self {
        match code {
            0x00 => GattStatus::Ok,
            ATT_ERROR_INVALID_HANDLE => GattStatus::InvalidHandle,
            ATT_ERROR_READ_NOT_PERMITTED => GattStatus::ReadNotPermitted,
            ATT_ERROR_WRITE_NOT_PERMITTED => GattStatus::WriteNotPermitted,
            ATT_ERROR_INVALID_OFFSET => GattStatus::InvalidOffset,
            ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH => GattStatus::InvalidAttrLen,
            GATT_STACK_NO_RESOURCES => GattStatus::NoResources,
            GATT_STACK_INTERNAL_ERROR => GattStatus::InternalError,
            GATT_STACK_WRONG_STATE => GattStatus::WrongState,
            GATT_STACK_DB_FULL => GattStatus::DbFull,
            GATT_STACK_BUSY => GattStatus::Busy,
            GATT_STACK_ERROR => GattStatus::Error,
            GATT_STACK_ILLEGAL_PARAMETER => GattStatus::IllegalParameter,
            GATT_STACK_CONGESTED => GattStatus::Congested,
            other => GattStatus::Other(other),
        }
    }
}

impl From<GattStatus> for u8 {
    fn from(status: GattStatus) -> Self {
        match status {
            GattStatus::Ok => 0x00,
            GattStatus::InvalidHandle => ATT_ERROR_INVALID_HANDLE,
            GattStatus::ReadNotPermitted => ATT_ERROR_READ_NOT_PERMITTED,
            GattStatus::WriteNotPermitted => ATT_ERROR_WRITE_NOT_PERMITTED,
            GattStatus::InvalidOffset => ATT_ERROR_INVALID_OFFSET,
            GattStatus::InvalidAttrLen => ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH,
            GattStatus::NoResources => GATT_STACK_NO_RESOURCES,
            GattStatus::InternalError => GATT_STACK_INTERNAL_ERROR,
            GattStatus::WrongState => GATT_STACK_WRONG_STATE,
            GattStatus::DbFull => GATT_STACK_DB_FULL,
            GattStatus::Busy => GATT_STACK_BUSY,
            GattStatus::Error => GATT_STACK_ERROR,
            GattStatus::IllegalParameter => GATT_STACK_ILLEGAL_PARAMETER,
            GattStatus::Congested => GATT_STACK_CONGESTED,
            GattStatus::Other(code) => code,
        }
    }
}

impl GattStatus {
    pub fn is_ok(&self) -> bool {
        *self == GattStatus::Ok
    }

    /// Whether the code was produced by the stack itself rather than the ATT
    /// protocol
    pub fn is_stack_error(&self) -> bool {
        u8::from(*self) >= GATT_STACK_NO_RESOURCES
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:02x})", self, u8::from(*self))
    }
}
