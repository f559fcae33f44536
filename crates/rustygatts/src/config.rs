//! Bluetooth configuration consumed at startup

use crate::error::{Error, Result};
use crate::gap::{AdvertisingData, AdvertisingParams, ConnUpdateParams};

/// Bluetooth configuration
#[derive(Debug, Clone)]
pub struct BtConfig {
    /// Bring up Bluetooth at all
    pub enable: bool,
    /// Stay on after WiFi acquires an IP address
    pub keep_enabled: bool,
    /// Advertised device name
    pub dev_name: Option<String>,
    /// Device id, used as the name when `dev_name` is not set
    pub device_id: Option<String>,
    /// Advertise, and resume advertising around connections
    pub adv_enable: bool,
    pub adv_data: AdvertisingData,
    pub adv_params: AdvertisingParams,
    /// Connection parameters requested from every new peer
    pub conn_params: ConnUpdateParams,
}

impl Default for BtConfig {
    fn default() -> Self {
        Self {
            enable: true,
            keep_enabled: false,
            dev_name: None,
            device_id: None,
            adv_enable: true,
            adv_data: AdvertisingData::default(),
            adv_params: AdvertisingParams::default(),
            conn_params: ConnUpdateParams::default(),
        }
    }
}

impl BtConfig {
    pub fn with_name(name: &str) -> Self {
        Self {
            dev_name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Resolve the device name: `dev_name`, else `device_id`
    pub fn device_name(&self) -> Result<&str> {
        self.dev_name
            .as_deref()
            .or(self.device_id.as_deref())
            .ok_or(Error::MissingDeviceName)
    }
}
