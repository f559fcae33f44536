//! Outbound interface toward the BLE stack
//!
//! Every call is fire-and-forget: it returns as soon as the stack accepted (or
//! rejected) the request, and any result arrives later as a separate event.

use super::event::{ConnId, GattIf, TransId};
use super::types::{AttrDescriptor, AttrValue, Handle};
use crate::att::GattStatus;
use crate::error::StackResult;
use crate::gap::{AdvertisingData, AdvertisingParams, ConnUpdateParams};

/// Requests the GATT server layer issues to the underlying BLE stack
pub trait BleStack {
    /// Register the GATT application; completion arrives as `GattsEvent::Register`
    fn app_register(&mut self, app_id: u16) -> StackResult;

    /// Create a service attribute table; completion arrives as
    /// `GattsEvent::CreateAttrTable` carrying one handle per descriptor
    fn create_attr_table(
        &mut self,
        gatt_if: GattIf,
        attrs: &[AttrDescriptor],
        svc_inst_id: u8,
    ) -> StackResult;

    /// Start serving a created service, identified by its declaration handle
    fn start_service(&mut self, service_handle: Handle) -> StackResult;

    /// Answer a read/write request
    fn send_response(
        &mut self,
        gatt_if: GattIf,
        conn_id: ConnId,
        trans_id: TransId,
        status: GattStatus,
        value: Option<&AttrValue>,
    ) -> StackResult;

    fn set_device_name(&mut self, name: &str) -> StackResult;

    fn config_adv_data(&mut self, data: &AdvertisingData) -> StackResult;

    fn start_advertising(&mut self, params: &AdvertisingParams) -> StackResult;

    fn update_conn_params(&mut self, params: &ConnUpdateParams) -> StackResult;

    /// Shut the Bluetooth controller down; there is no completion event
    fn disable_controller(&mut self) -> StackResult;
}
