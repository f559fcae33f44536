//! GAP (Generic Access Profile) types
//!
//! Peer addresses, advertising configuration and connection parameters
//! exchanged with the BLE stack.

pub mod advertising;
pub mod constants;
pub mod types;

pub use advertising::{AdvFlags, AdvertisingData, AdvertisingParams};
pub use constants::*;
pub use types::*;
