//! Error types for the rustygatts library
//!
//! This module defines the error types used throughout the library.

use thiserror::Error;

/// Configuration errors, rejected synchronously before any state is mutated
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Service handler is missing")]
    MissingHandler,

    #[error("Attribute table is empty")]
    EmptyAttributeTable,

    #[error("bt.dev_name or device.id must be set")]
    MissingDeviceName,

    #[error("Failed to register GATT application: {0}")]
    Stack(#[from] StackError),
}

/// Errors reported by the BLE stack for an outbound call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StackError {
    #[error("Stack rejected the request: {0}")]
    Rejected(i32),

    #[error("Stack is not ready")]
    NotReady,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result alias for configuration-time operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result alias for outbound stack calls
pub type StackResult = std::result::Result<(), StackError>;
