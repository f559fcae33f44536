//! Attribute Protocol (ATT) definitions
//!
//! The wire protocol itself belongs to the BLE stack. This module only holds
//! the constants and status codes the GATT server layer exchanges with it.

pub mod constants;
pub mod status;

pub use self::constants::*;
pub use self::status::GattStatus;
