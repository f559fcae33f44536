//! Advertising payload and parameters handed to the stack

use super::constants::*;
use super::types::AddressType;
use crate::uuid::Uuid;
use bitflags::bitflags;

bitflags! {
    /// Flags AD structure
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AdvFlags: u8 {
        const LIMITED_DISCOVERABLE = 0x01;
        const GENERAL_DISCOVERABLE = 0x02;
        const BREDR_NOT_SUPPORTED = 0x04;
        const DUAL_MODE_CONTROLLER = 0x08;
        const DUAL_MODE_HOST = 0x10;
    }
}

/// Advertising (or scan response) payload configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingData {
    /// Configure the scan response instead of the advertising payload
    pub set_scan_rsp: bool,
    /// Include the device name
    pub include_name: bool,
    /// Include the TX power level
    pub include_txpower: bool,
    /// Preferred minimum connection interval (units of 1.25 ms)
    pub min_interval: u16,
    /// Preferred maximum connection interval (units of 1.25 ms)
    pub max_interval: u16,
    pub appearance: u16,
    pub manufacturer_data: Vec<u8>,
    pub service_data: Vec<u8>,
    pub service_uuids: Vec<Uuid>,
    pub flags: AdvFlags,
}

impl Default for AdvertisingData {
    fn default() -> Self {
        Self {
            set_scan_rsp: false,
            include_name: true,
            include_txpower: true,
            min_interval: ADV_INTERVAL_MIN,
            max_interval: ADV_INTERVAL_MAX,
            appearance: 0x00,
            manufacturer_data: Vec::new(),
            service_data: Vec::new(),
            service_uuids: Vec::new(),
            flags: AdvFlags::GENERAL_DISCOVERABLE | AdvFlags::BREDR_NOT_SUPPORTED,
        }
    }
}

/// Advertising parameters used whenever advertising is (re)started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisingParams {
    /// Minimum advertising interval (units of 0.625 ms)
    pub adv_int_min: u16,
    /// Maximum advertising interval (units of 0.625 ms)
    pub adv_int_max: u16,
    pub adv_type: u8,
    pub own_addr_type: AddressType,
    pub channel_map: u8,
    pub adv_filter_policy: u8,
}

impl Default for AdvertisingParams {
    fn default() -> Self {
        Self {
            adv_int_min: ADV_INTERVAL_MIN,
            adv_int_max: ADV_INTERVAL_MAX,
            adv_type: ADV_TYPE_IND,
            own_addr_type: AddressType::Public,
            channel_map: ADV_CHNL_ALL,
            adv_filter_policy: ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        }
    }
}
