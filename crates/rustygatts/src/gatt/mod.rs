//! GATT server routing layer
//!
//! Services are registered as attribute tables with a handler each. The
//! server turns stack events into per-connection, per-service callbacks and
//! answers every request that needs a response exactly once.

pub mod connection;
pub mod event;
pub mod handler;
pub mod registry;
pub mod response;
pub mod server;
pub mod shared;
pub mod stack;
pub mod table;
pub mod types;

#[cfg(test)]
mod tests;

pub use connection::{Connection, ConnectionInfo, ConnectionRegistry, Session, SessionRef};
pub use event::{
    AttrTableParams, BtStatus, ConnId, ConnectParams, DisconnectParams, GapEvent, GattIf,
    GattsEvent, ReadParams, TransId, WriteParams,
};
pub use handler::{handler_fn, HandlerOutcome, ServiceHandler};
pub use registry::{Service, ServiceId, ServiceRegistry, TableState};
pub use response::{RequestKind, ResponseObligation};
pub use server::{GattServer, GATTS_APP_ID};
pub use shared::SharedGattServer;
pub use stack::BleStack;
pub use table::ServiceTable;
pub use types::{
    AttPermissions, AttrDescriptor, AttrValue, CharacteristicProperty, ClientConfig, Handle,
};
