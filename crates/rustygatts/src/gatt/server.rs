//! GATT server event dispatcher
//!
//! `GattServer` owns the service and connection registries and is the single
//! entry point for stack events. The stack delivers one event at a time and
//! every handler runs to completion inside the dispatch call; nothing here
//! blocks or waits for the stack.

use super::connection::{Connection, ConnectionInfo, ConnectionRegistry, Session, SessionRef};
use super::event::{
    AttrTableParams, ConnId, ConnectParams, DisconnectParams, GapEvent, GattIf, GattsEvent,
    ReadParams, WriteParams,
};
use super::handler::ServiceHandler;
use super::registry::{ServiceId, ServiceRegistry, TableState};
use super::response::{RequestKind, ResponseObligation};
use super::stack::BleStack;
use super::types::{AttrDescriptor, Handle};
use crate::att::GattStatus;
use crate::config::BtConfig;
use crate::error::{Error, Result};
use crate::gap::HCI_ERR_CONNECTION_TIMEOUT;
use log::{debug, error, info, warn};

/// Validate a registration request before anything is stored
pub(crate) fn check_service(
    attrs: &[AttrDescriptor],
    handler: Option<Box<dyn ServiceHandler>>,
) -> Result<Box<dyn ServiceHandler>> {
    let handler = handler.ok_or(Error::MissingHandler)?;
    if attrs.is_empty() {
        return Err(Error::EmptyAttributeTable);
    }
    Ok(handler)
}

/// Application id the GATT application registers under
pub const GATTS_APP_ID: u16 = 0;

/// A GATT server bound to a BLE stack
pub struct GattServer<S: BleStack> {
    stack: S,
    config: BtConfig,
    dev_name: String,
    /// Server identity, known once the application registered
    gatt_if: Option<GattIf>,
    services: ServiceRegistry,
    connections: ConnectionRegistry,
}

impl<S: BleStack> GattServer<S> {
    /// Bring up the GATT server and register its application with the stack.
    ///
    /// Returns `Ok(None)` when Bluetooth is disabled by configuration.
    pub fn init(mut stack: S, config: BtConfig) -> Result<Option<Self>> {
        if !config.enable {
            info!("Bluetooth is disabled");
            return Ok(None);
        }
        let dev_name = match config.device_name() {
            Ok(name) => name.to_string(),
            Err(e) => {
                error!("{}", e);
                return Err(e);
            }
        };

        stack.app_register(GATTS_APP_ID)?;
        info!(
            "Bluetooth init ok, advertising {}",
            if config.adv_enable { "enabled" } else { "disabled" }
        );

        Ok(Some(Self {
            stack,
            config,
            dev_name,
            gatt_if: None,
            services: ServiceRegistry::new(),
            connections: ConnectionRegistry::new(),
        }))
    }

    pub fn stack(&self) -> &S {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut S {
        &mut self.stack
    }

    pub fn config(&self) -> &BtConfig {
        &self.config
    }

    pub fn device_name(&self) -> &str {
        &self.dev_name
    }

    /// Server identity assigned by the stack, once the application registered
    pub fn gatt_if(&self) -> Option<GattIf> {
        self.gatt_if
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn find_connection(&self, gatt_if: GattIf, conn_id: ConnId) -> Option<&Connection> {
        self.connections.find(gatt_if, conn_id)
    }

    /// Register a service described by its attribute table.
    ///
    /// Entry 0 is expected to be the service declaration; its value is the
    /// UUID the stack reports back once the table exists. Table creation is
    /// requested at once if the GATT application is already registered,
    /// otherwise when it registers. Registering the same UUID twice yields two
    /// independent services. Connections already open do not gain a session
    /// for the new service.
    pub fn register_service(
        &mut self,
        attrs: Vec<AttrDescriptor>,
        handler: Option<Box<dyn ServiceHandler>>,
    ) -> Result<ServiceId> {
        let handler = check_service(&attrs, handler)?;
        let id = self.services.add(attrs, handler);
        match self.services.get(id).and_then(|s| s.uuid()) {
            Some(uuid) => debug!("Registered service {} as {}", uuid, id),
            None => warn!("Registered {} without a service UUID in entry 0", id),
        }
        self.register_pending();
        Ok(id)
    }

    /// Bluetooth and WiFi share the radio: once WiFi is up, Bluetooth is
    /// switched off unless `keep_enabled` is configured.
    pub fn handle_wifi_ip_acquired(&mut self) {
        if self.config.keep_enabled || !self.config.enable {
            return;
        }
        info!("WiFi connected, disabling Bluetooth");
        self.config.enable = false;
        if let Err(e) = self.stack.disable_controller() {
            error!("Failed to disable Bluetooth controller: {}", e);
        }
    }

    /// Whether Bluetooth is still enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enable
    }

    fn register_pending(&mut self) {
        if let Some(gatt_if) = self.gatt_if {
            self.services.register_pending(&mut self.stack, gatt_if);
        }
    }

    /// Dispatch one GATT server event
    pub fn handle_gatts_event(&mut self, gatt_if: GattIf, event: GattsEvent) {
        match &event {
            GattsEvent::Connect(_) | GattsEvent::Disconnect(_) => info!("{}", event),
            _ => debug!("{}", event),
        }

        match &event {
            GattsEvent::Register { status, .. } => self.on_register(gatt_if, *status),
            GattsEvent::Read(p) => self.on_read(gatt_if, p, &event),
            GattsEvent::Write(p) => self.on_write(gatt_if, p, &event),
            GattsEvent::Mtu { conn_id, mtu } => self.on_mtu(gatt_if, *conn_id, *mtu),
            GattsEvent::CreateAttrTable(p) => self.on_attr_table_created(p, &event),
            GattsEvent::Connect(p) => self.on_connect(gatt_if, p, &event),
            GattsEvent::Disconnect(p) => self.on_disconnect(gatt_if, p, &event),
            GattsEvent::Start {
                status,
                service_handle,
            } if !status.is_ok() => {
                error!("Failed to start service at handle {}: {}", service_handle, status)
            }
            GattsEvent::ExecWrite { .. }
            | GattsEvent::Conf { .. }
            | GattsEvent::Unregister
            | GattsEvent::Create { .. }
            | GattsEvent::AddIncludedService { .. }
            | GattsEvent::AddChar { .. }
            | GattsEvent::AddCharDescr { .. }
            | GattsEvent::Delete { .. }
            | GattsEvent::Start { .. }
            | GattsEvent::Stop { .. }
            | GattsEvent::Open { .. }
            | GattsEvent::CancelOpen { .. }
            | GattsEvent::Close { .. }
            | GattsEvent::Listen
            | GattsEvent::Congest { .. }
            | GattsEvent::Response { .. }
            | GattsEvent::SetAttrValue { .. } => {}
        }
    }

    /// Dispatch one GAP event
    pub fn handle_gap_event(&mut self, event: GapEvent) {
        debug!("{}", event);
        if let GapEvent::AdvDataSetComplete { .. } = event {
            self.start_advertising();
        }
    }

    fn on_register(&mut self, gatt_if: GattIf, status: GattStatus) {
        if !status.is_ok() {
            error!("Failed to register GATT application: {}", status);
            return;
        }
        if let Err(e) = self.stack.set_device_name(&self.dev_name) {
            error!("Failed to set device name: {}", e);
        }
        let r = self.stack.config_adv_data(&self.config.adv_data);
        debug!("config_adv_data {:?}", r);

        self.gatt_if = Some(gatt_if);
        self.register_pending();
    }

    fn on_read(&mut self, gatt_if: GattIf, p: &ReadParams, event: &GattsEvent) {
        let obligation = ResponseObligation::for_read(gatt_if, p);
        let claimed = self.route_request(gatt_if, p.conn_id, p.handle, event, RequestKind::Read);
        if let Some(obligation) = obligation {
            obligation.settle(&mut self.stack, claimed);
        }
    }

    fn on_write(&mut self, gatt_if: GattIf, p: &WriteParams, event: &GattsEvent) {
        let obligation = ResponseObligation::for_write(gatt_if, p);
        let claimed = self.route_request(gatt_if, p.conn_id, p.handle, event, RequestKind::Write);
        if let Some(obligation) = obligation {
            obligation.settle(&mut self.stack, claimed);
        }
    }

    /// Hand a request to the session of the service owning `handle` on the
    /// given connection. Returns whether any handler claimed it.
    fn route_request(
        &mut self,
        gatt_if: GattIf,
        conn_id: ConnId,
        handle: Handle,
        event: &GattsEvent,
        kind: RequestKind,
    ) -> bool {
        let Some(conn) = self.connections.find_mut(gatt_if, conn_id) else {
            debug!("cid {}: no such connection", conn_id);
            return false;
        };
        let Some(service_id) = self.services.find_by_handle(handle) else {
            debug!("h {}: no service owns this handle", handle);
            return false;
        };
        let Some(service) = self.services.get_mut(service_id) else {
            return false;
        };

        let mut claimed = false;
        for session in conn.sessions.iter_mut().filter(|s| s.service() == service_id) {
            let outcome = service.handler.on_event(
                Some(SessionRef::new(&conn.info, session)),
                event,
                &mut self.stack,
            );
            claimed |= kind.claimed_by(outcome);
        }
        claimed
    }

    fn on_mtu(&mut self, gatt_if: GattIf, conn_id: ConnId, mtu: u16) {
        match self.connections.find_mut(gatt_if, conn_id) {
            Some(conn) => conn.info.mtu = mtu,
            None => debug!("cid {}: MTU update for unknown connection", conn_id),
        }
    }

    fn on_attr_table_created(&mut self, p: &AttrTableParams, event: &GattsEvent) {
        let target = self.services.find_requested_by_uuid(&p.svc_uuid);
        if !p.status.is_ok() {
            error!("Failed to register service attribute table: {}", p.status);
            if let Some(id) = target {
                self.services.set_state(id, TableState::Failed);
            }
            return;
        }
        let Some(id) = target else {
            warn!("No service waiting for attribute table {}", p.svc_uuid);
            return;
        };
        if !self.services.assign_handles(id, &p.handles) {
            warn!(
                "Service {} expects {} handles, stack assigned {}",
                p.svc_uuid,
                self.services.get(id).map_or(0, |s| s.num_attrs()),
                p.handles.len()
            );
            self.services.set_state(id, TableState::Failed);
            return;
        }
        let Some(&base_handle) = p.handles.first() else {
            return;
        };

        if let Some(service) = self.services.get_mut(id) {
            service.handler.on_event(None, event, &mut self.stack);
        }

        info!("Starting BT service {}", p.svc_uuid);
        let state = match self.stack.start_service(base_handle) {
            Ok(()) => TableState::Started,
            Err(e) => {
                error!("Failed to start service {}: {}", p.svc_uuid, e);
                TableState::Failed
            }
        };
        self.services.set_state(id, state);
    }

    fn on_connect(&mut self, gatt_if: GattIf, p: &ConnectParams, event: &GattsEvent) {
        if !p.is_connected {
            return;
        }

        let params = self.config.conn_params.for_peer(p.remote_bda);
        if let Err(e) = self.stack.update_conn_params(&params) {
            warn!("Failed to request connection parameters for {}: {}", p.remote_bda, e);
        }
        if self.config.adv_enable {
            self.start_advertising();
        }

        if let Some(stale) = self.connections.remove(gatt_if, p.conn_id) {
            warn!("cid {} reported connected again, dropping the stale link", p.conn_id);
            let lost = GattsEvent::Disconnect(DisconnectParams {
                conn_id: p.conn_id,
                remote_bda: stale.info.peer_addr,
                reason: HCI_ERR_CONNECTION_TIMEOUT,
            });
            self.release_connection(stale, &lost);
        }

        // The connection enters the registry only once every session exists.
        let mut conn = Connection::new(ConnectionInfo::new(gatt_if, p.conn_id, p.remote_bda));
        for (id, service) in self.services.iter_mut() {
            conn.sessions.push(Session::new(id));
            if let Some(session) = conn.sessions.last_mut() {
                service.handler.on_event(
                    Some(SessionRef::new(&conn.info, session)),
                    event,
                    &mut self.stack,
                );
            }
        }
        debug!("cid {}: {} sessions", p.conn_id, conn.sessions.len());
        self.connections.insert(conn);
    }

    fn on_disconnect(&mut self, gatt_if: GattIf, p: &DisconnectParams, event: &GattsEvent) {
        match self.connections.remove(gatt_if, p.conn_id) {
            Some(conn) => self.release_connection(conn, event),
            None => debug!("cid {}: not connected", p.conn_id),
        }
        if self.config.adv_enable {
            self.start_advertising();
        }
    }

    /// Notify every session of a closed connection, then drop them all
    fn release_connection(&mut self, conn: Connection, event: &GattsEvent) {
        let Connection { info, sessions } = conn;
        for mut session in sessions {
            if let Some(service) = self.services.get_mut(session.service()) {
                service.handler.on_event(
                    Some(SessionRef::new(&info, &mut session)),
                    event,
                    &mut self.stack,
                );
            }
        }
    }

    fn start_advertising(&mut self) {
        if let Err(e) = self.stack.start_advertising(&self.config.adv_params) {
            error!("Failed to start advertising: {}", e);
        }
    }
}
