//! RustyGatts - GATT server routing layer for Bluetooth LE peripherals
//!
//! This library sits between a BLE stack's GATT server callbacks and the
//! application services built on top of it. Services register attribute
//! tables and a handler; the server tracks connections, gives every service a
//! session on each connection, routes reads and writes by attribute handle,
//! and guarantees each request that needs a response gets exactly one.
//!
//! The stack itself is abstracted behind the [`BleStack`] trait.

pub mod att;
pub mod config;
pub mod error;
pub mod gap;
pub mod gatt;
pub mod uuid;

// Re-export common types for convenience
pub use att::GattStatus;
pub use config::BtConfig;
pub use error::{Error, Result, StackError, StackResult};
pub use gap::{AdvertisingData, AdvertisingParams, BdAddr, ConnUpdateParams};
pub use gatt::{
    handler_fn, AttrDescriptor, BleStack, GapEvent, GattServer, GattsEvent, HandlerOutcome,
    ServiceHandler, ServiceId, ServiceTable, SessionRef, SharedGattServer,
};
pub use uuid::Uuid;
