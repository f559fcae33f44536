//! Unit tests for GATT server routing

use crate::att::GattStatus;
use crate::config::BtConfig;
use crate::error::{Error, StackError, StackResult};
use crate::gap::{AdvertisingData, AdvertisingParams, BdAddr, ConnUpdateParams};
use crate::gatt::*;
use crate::uuid::Uuid;
use rand::seq::SliceRandom;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

const GATT_IF: GattIf = 3;

/// One outbound call seen by the mock stack
#[derive(Debug, Clone, PartialEq, Eq)]
enum StackCall {
    AppRegister(u16),
    CreateAttrTable { gatt_if: GattIf, uuid: Option<Uuid>, num_attrs: usize },
    StartService(Handle),
    SendResponse {
        conn_id: ConnId,
        trans_id: TransId,
        status: GattStatus,
        with_value: bool,
    },
    SetDeviceName(String),
    ConfigAdvData,
    StartAdvertising,
    UpdateConnParams(ConnUpdateParams),
    DisableController,
}

/// Mock BLE stack recording every call
#[derive(Default)]
struct MockStack {
    calls: Vec<StackCall>,
    reject_create: bool,
    reject_start: bool,
}

impl MockStack {
    fn responses(&self) -> Vec<(ConnId, TransId, GattStatus)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                StackCall::SendResponse {
                    conn_id,
                    trans_id,
                    status,
                    ..
                } => Some((*conn_id, *trans_id, *status)),
                _ => None,
            })
            .collect()
    }

    fn count(&self, call: &StackCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    fn created_tables(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, StackCall::CreateAttrTable { .. }))
            .count()
    }
}

impl BleStack for MockStack {
    fn app_register(&mut self, app_id: u16) -> StackResult {
        self.calls.push(StackCall::AppRegister(app_id));
        Ok(())
    }

    fn create_attr_table(
        &mut self,
        gatt_if: GattIf,
        attrs: &[AttrDescriptor],
        _svc_inst_id: u8,
    ) -> StackResult {
        self.calls.push(StackCall::CreateAttrTable {
            gatt_if,
            uuid: attrs.first().and_then(|a| a.service_uuid()),
            num_attrs: attrs.len(),
        });
        if self.reject_create {
            return Err(StackError::Rejected(-1));
        }
        Ok(())
    }

    fn start_service(&mut self, service_handle: Handle) -> StackResult {
        self.calls.push(StackCall::StartService(service_handle));
        if self.reject_start {
            return Err(StackError::NotReady);
        }
        Ok(())
    }

    fn send_response(
        &mut self,
        _gatt_if: GattIf,
        conn_id: ConnId,
        trans_id: TransId,
        status: GattStatus,
        value: Option<&AttrValue>,
    ) -> StackResult {
        self.calls.push(StackCall::SendResponse {
            conn_id,
            trans_id,
            status,
            with_value: value.is_some(),
        });
        Ok(())
    }

    fn set_device_name(&mut self, name: &str) -> StackResult {
        self.calls.push(StackCall::SetDeviceName(name.to_string()));
        Ok(())
    }

    fn config_adv_data(&mut self, _data: &AdvertisingData) -> StackResult {
        self.calls.push(StackCall::ConfigAdvData);
        Ok(())
    }

    fn start_advertising(&mut self, _params: &AdvertisingParams) -> StackResult {
        self.calls.push(StackCall::StartAdvertising);
        Ok(())
    }

    fn update_conn_params(&mut self, params: &ConnUpdateParams) -> StackResult {
        self.calls.push(StackCall::UpdateConnParams(*params));
        Ok(())
    }

    fn disable_controller(&mut self) -> StackResult {
        self.calls.push(StackCall::DisableController);
        Ok(())
    }
}

/// What a recording handler saw: (label, event name, conn id)
type Seen = (&'static str, &'static str, Option<ConnId>);
type SeenLog = Arc<Mutex<Vec<Seen>>>;

fn recorder(label: &'static str, log: &SeenLog, outcome: HandlerOutcome) -> Box<dyn ServiceHandler> {
    let log = Arc::clone(log);
    handler_fn(move |session, event, _stack| {
        log.lock()
            .unwrap()
            .push((label, event.name(), session.map(|s| s.conn_id())));
        outcome
    })
}

fn seen(log: &SeenLog) -> Vec<Seen> {
    log.lock().unwrap().clone()
}

fn peer(conn_id: ConnId) -> BdAddr {
    BdAddr::new([0x24, 0x0a, 0xc4, 0x00, (conn_id >> 8) as u8, conn_id as u8])
}

/// Primary service with one characteristic: 3 attributes
fn service_attrs(uuid: u16) -> Vec<AttrDescriptor> {
    ServiceTable::primary(Uuid::from(uuid))
        .characteristic(
            Uuid::from(0xFF01u16),
            CharacteristicProperty::READ | CharacteristicProperty::WRITE,
            AttPermissions::read_write(),
            Vec::new(),
            64,
        )
        .build()
}

fn register_event(status: GattStatus) -> GattsEvent {
    GattsEvent::Register { status, app_id: GATTS_APP_ID }
}

fn table_created(uuid: u16, handles: Vec<Handle>) -> GattsEvent {
    GattsEvent::CreateAttrTable(AttrTableParams {
        status: GattStatus::Ok,
        svc_uuid: Uuid::from(uuid),
        svc_inst_id: 0,
        handles,
    })
}

fn connect(conn_id: ConnId) -> GattsEvent {
    GattsEvent::Connect(ConnectParams {
        conn_id,
        remote_bda: peer(conn_id),
        is_connected: true,
    })
}

fn disconnect(conn_id: ConnId) -> GattsEvent {
    GattsEvent::Disconnect(DisconnectParams {
        conn_id,
        remote_bda: peer(conn_id),
        reason: 0x13,
    })
}

fn read(conn_id: ConnId, trans_id: TransId, handle: Handle, need_rsp: bool) -> GattsEvent {
    GattsEvent::Read(ReadParams {
        conn_id,
        trans_id,
        bda: peer(conn_id),
        handle,
        offset: 0,
        is_long: false,
        need_rsp,
    })
}

fn write(conn_id: ConnId, trans_id: TransId, handle: Handle, need_rsp: bool) -> GattsEvent {
    GattsEvent::Write(WriteParams {
        conn_id,
        trans_id,
        bda: peer(conn_id),
        handle,
        offset: 0,
        value: vec![0x01, 0x00],
        need_rsp,
        is_prep: false,
    })
}

fn new_server() -> GattServer<MockStack> {
    GattServer::init(MockStack::default(), BtConfig::with_name("rustygatts"))
        .unwrap()
        .unwrap()
}

/// Server whose GATT application already registered, with the call log cleared
fn registered_server() -> GattServer<MockStack> {
    let mut server = new_server();
    server.handle_gatts_event(GATT_IF, register_event(GattStatus::Ok));
    server.stack_mut().calls.clear();
    server
}

/// Registered server with one started service (uuid 0x00FF) at handles 40..=42
fn server_with_service(log: &SeenLog, outcome: HandlerOutcome) -> (GattServer<MockStack>, ServiceId) {
    let mut server = registered_server();
    let id = server
        .register_service(service_attrs(0x00FF), Some(recorder("svc", log, outcome)))
        .unwrap();
    server.handle_gatts_event(GATT_IF, table_created(0x00FF, vec![40, 41, 42]));
    server.stack_mut().calls.clear();
    log.lock().unwrap().clear();
    (server, id)
}

#[test]
fn test_init_disabled_returns_no_server() {
    let config = BtConfig {
        enable: false,
        ..BtConfig::default()
    };
    assert!(GattServer::init(MockStack::default(), config).unwrap().is_none());
}

#[test]
fn test_init_requires_device_name() {
    let result = GattServer::init(MockStack::default(), BtConfig::default());
    assert_eq!(result.err(), Some(Error::MissingDeviceName));

    let config = BtConfig {
        device_id: Some("esp32_0A1B2C".into()),
        ..BtConfig::default()
    };
    let server = GattServer::init(MockStack::default(), config).unwrap().unwrap();
    assert_eq!(server.device_name(), "esp32_0A1B2C");
    assert_eq!(server.stack().calls, vec![StackCall::AppRegister(GATTS_APP_ID)]);
    assert_eq!(server.gatt_if(), None);
}

#[test]
fn test_register_service_validation() {
    let mut server = new_server();
    let log = SeenLog::default();

    assert_eq!(
        server.register_service(service_attrs(0x00FF), None).err(),
        Some(Error::MissingHandler)
    );
    assert_eq!(
        server
            .register_service(Vec::new(), Some(recorder("x", &log, HandlerOutcome::Unhandled)))
            .err(),
        Some(Error::EmptyAttributeTable)
    );

    assert!(server.services().is_empty());
}

#[test]
fn test_table_without_declaration_is_still_registered() {
    let mut server = registered_server();
    let log = SeenLog::default();

    let mut attrs = service_attrs(0x00FF);
    attrs.remove(0);
    let id = server
        .register_service(attrs, Some(recorder("x", &log, HandlerOutcome::Unhandled)))
        .unwrap();

    let service = server.services().get(id).unwrap();
    assert_eq!(service.uuid(), None);
    assert_eq!(service.state(), TableState::Requested);
    assert_eq!(
        server.stack().calls,
        vec![StackCall::CreateAttrTable {
            gatt_if: GATT_IF,
            uuid: None,
            num_attrs: 2,
        }]
    );
}

#[test]
fn test_service_registered_before_app_registration() {
    let log = SeenLog::default();
    let mut server = new_server();
    server.stack_mut().calls.clear();

    let id = server
        .register_service(service_attrs(0x00FF), Some(recorder("a", &log, HandlerOutcome::Unhandled)))
        .unwrap();
    assert_eq!(server.stack().created_tables(), 0);
    assert_eq!(server.services().get(id).unwrap().state(), TableState::Pending);

    server.handle_gatts_event(GATT_IF, register_event(GattStatus::Ok));
    assert_eq!(server.gatt_if(), Some(GATT_IF));
    assert_eq!(
        server.stack().calls,
        vec![
            StackCall::SetDeviceName("rustygatts".into()),
            StackCall::ConfigAdvData,
            StackCall::CreateAttrTable {
                gatt_if: GATT_IF,
                uuid: Some(Uuid::from(0x00FFu16)),
                num_attrs: 3,
            },
        ]
    );
    assert_eq!(server.services().get(id).unwrap().state(), TableState::Requested);

    server.handle_gatts_event(GATT_IF, table_created(0x00FF, vec![40, 41, 42]));
    let service = server.services().get(id).unwrap();
    assert!(service.is_started());
    assert_eq!(service.handles(), &[40, 41, 42]);
    assert_eq!(server.stack().count(&StackCall::StartService(40)), 1);
    assert_eq!(seen(&log), vec![("a", "CREAT_ATTR_TAB", None)]);
}

#[test]
fn test_service_registered_after_app_registration() {
    let log = SeenLog::default();
    let mut server = registered_server();
    server
        .register_service(service_attrs(0x00AA), Some(recorder("a", &log, HandlerOutcome::Unhandled)))
        .unwrap();
    assert_eq!(server.stack().created_tables(), 1);

    // A second registration only requests the new table
    server
        .register_service(service_attrs(0x00BB), Some(recorder("b", &log, HandlerOutcome::Unhandled)))
        .unwrap();
    assert_eq!(server.stack().created_tables(), 2);
}

#[test]
fn test_failed_app_registration_leaves_services_pending() {
    let log = SeenLog::default();
    let mut server = new_server();
    let id = server
        .register_service(service_attrs(0x00FF), Some(recorder("a", &log, HandlerOutcome::Unhandled)))
        .unwrap();
    server.stack_mut().calls.clear();

    server.handle_gatts_event(GATT_IF, register_event(GattStatus::Error));
    assert!(server.stack().calls.is_empty());
    assert_eq!(server.gatt_if(), None);
    assert_eq!(server.services().get(id).unwrap().state(), TableState::Pending);
}

#[test]
fn test_attr_table_failures_mark_service_failed() {
    let log = SeenLog::default();
    let mut server = registered_server();

    // Handle count disagrees with the descriptor table
    let short = server
        .register_service(service_attrs(0x0001), Some(recorder("a", &log, HandlerOutcome::Unhandled)))
        .unwrap();
    server.handle_gatts_event(GATT_IF, table_created(0x0001, vec![10, 11]));
    assert_eq!(server.services().get(short).unwrap().state(), TableState::Failed);
    assert_eq!(server.services().find_by_handle(10), None);

    // Stack reports an error status
    let refused = server
        .register_service(service_attrs(0x0002), Some(recorder("b", &log, HandlerOutcome::Unhandled)))
        .unwrap();
    server.handle_gatts_event(
        GATT_IF,
        GattsEvent::CreateAttrTable(AttrTableParams {
            status: GattStatus::DbFull,
            svc_uuid: Uuid::from(0x0002u16),
            svc_inst_id: 0,
            handles: Vec::new(),
        }),
    );
    assert_eq!(server.services().get(refused).unwrap().state(), TableState::Failed);

    // Stack rejects the create call outright
    server.stack_mut().reject_create = true;
    let rejected = server
        .register_service(service_attrs(0x0003), Some(recorder("c", &log, HandlerOutcome::Unhandled)))
        .unwrap();
    assert_eq!(server.services().get(rejected).unwrap().state(), TableState::Failed);

    assert!(!server
        .stack()
        .calls
        .iter()
        .any(|c| matches!(c, StackCall::StartService(_))));
    assert!(seen(&log).is_empty());
}

#[test]
fn test_start_failure_marks_service_failed() {
    let log = SeenLog::default();
    let mut server = registered_server();
    server.stack_mut().reject_start = true;
    let id = server
        .register_service(service_attrs(0x00FF), Some(recorder("a", &log, HandlerOutcome::Unhandled)))
        .unwrap();
    server.handle_gatts_event(GATT_IF, table_created(0x00FF, vec![40, 41, 42]));
    assert_eq!(server.services().get(id).unwrap().state(), TableState::Failed);
}

#[test]
fn test_unmatched_attr_table_is_ignored() {
    let log = SeenLog::default();
    let (mut server, id) = server_with_service(&log, HandlerOutcome::Unhandled);

    // Same UUID as a started service, nothing is waiting for it
    server.handle_gatts_event(GATT_IF, table_created(0x00FF, vec![50, 51, 52]));
    assert_eq!(server.services().get(id).unwrap().handles(), &[40, 41, 42]);
    assert_eq!(server.services().find_by_handle(50), None);

    // 32-bit UUID with the same numeric value does not match a 16-bit one
    server.handle_gatts_event(
        GATT_IF,
        GattsEvent::CreateAttrTable(AttrTableParams {
            status: GattStatus::Ok,
            svc_uuid: Uuid::Uuid32(0x00FF),
            svc_inst_id: 0,
            handles: vec![60, 61, 62],
        }),
    );
    assert!(server.stack().calls.is_empty());
    assert!(seen(&log).is_empty());
}

#[test]
fn test_duplicate_uuid_registrations_are_independent() {
    let log = SeenLog::default();
    let mut server = registered_server();
    let first = server
        .register_service(service_attrs(0x00FF), Some(recorder("first", &log, HandlerOutcome::Accept)))
        .unwrap();
    let second = server
        .register_service(service_attrs(0x00FF), Some(recorder("second", &log, HandlerOutcome::Accept)))
        .unwrap();
    assert_ne!(first, second);
    assert_eq!(server.services().find_by_uuid(&Uuid::from(0x00FFu16)), Some(first));

    server.handle_gatts_event(GATT_IF, table_created(0x00FF, vec![40, 41, 42]));
    server.handle_gatts_event(GATT_IF, table_created(0x00FF, vec![50, 51, 52]));
    assert!(server.services().get(first).unwrap().is_started());
    assert!(server.services().get(second).unwrap().is_started());

    for handle in 40..=42 {
        assert_eq!(server.services().find_by_handle(handle), Some(first));
    }
    for handle in 50..=52 {
        assert_eq!(server.services().find_by_handle(handle), Some(second));
    }
    assert_eq!(server.services().find_by_handle(43), None);

    server.handle_gatts_event(GATT_IF, connect(5));
    assert_eq!(server.find_connection(GATT_IF, 5).unwrap().sessions().len(), 2);
    log.lock().unwrap().clear();

    server.handle_gatts_event(GATT_IF, write(5, 1, 51, true));
    assert_eq!(seen(&log), vec![("second", "WRITE", Some(5))]);
}

#[test]
fn test_connect_creates_one_session_per_service() {
    let log = SeenLog::default();
    let mut server = registered_server();
    let started = server
        .register_service(service_attrs(0x00AA), Some(recorder("a", &log, HandlerOutcome::Unhandled)))
        .unwrap();
    server.handle_gatts_event(GATT_IF, table_created(0x00AA, vec![1, 2, 3]));
    // Table never created; still gets a session
    let requested = server
        .register_service(service_attrs(0x00BB), Some(recorder("b", &log, HandlerOutcome::Unhandled)))
        .unwrap();
    server.stack_mut().calls.clear();

    server.handle_gatts_event(GATT_IF, connect(5));

    let conn = server.find_connection(GATT_IF, 5).unwrap();
    assert_eq!(conn.info().peer_addr, peer(5));
    assert_eq!(conn.info().mtu, crate::att::ATT_DEFAULT_MTU);
    assert_eq!(conn.sessions().len(), 2);
    assert!(conn.has_session(started));
    assert!(conn.has_session(requested));
    assert_eq!(
        seen(&log),
        vec![("a", "CONNECT", Some(5)), ("b", "CONNECT", Some(5))]
    );
    assert_eq!(
        server.stack().calls,
        vec![
            StackCall::UpdateConnParams(ConnUpdateParams::default().for_peer(peer(5))),
            StackCall::StartAdvertising,
        ]
    );
}

#[test]
fn test_failed_connect_is_ignored() {
    let log = SeenLog::default();
    let (mut server, _) = server_with_service(&log, HandlerOutcome::Unhandled);
    server.handle_gatts_event(
        GATT_IF,
        GattsEvent::Connect(ConnectParams {
            conn_id: 5,
            remote_bda: peer(5),
            is_connected: false,
        }),
    );
    assert!(server.connections().is_empty());
    assert!(server.stack().calls.is_empty());
    assert!(seen(&log).is_empty());
}

#[test]
fn test_write_routed_to_session() {
    let log = SeenLog::default();
    let (mut server, _) = server_with_service(&log, HandlerOutcome::Accept);
    server.handle_gatts_event(GATT_IF, connect(5));
    server.stack_mut().calls.clear();
    log.lock().unwrap().clear();

    server.handle_gatts_event(GATT_IF, write(5, 7, 42, true));
    assert_eq!(seen(&log), vec![("svc", "WRITE", Some(5))]);
    assert_eq!(server.stack().responses(), vec![(5, 7, GattStatus::Ok)]);
}

#[test]
fn test_unclaimed_write_is_not_permitted() {
    for outcome in [HandlerOutcome::Unhandled, HandlerOutcome::Reject] {
        let log = SeenLog::default();
        let (mut server, _) = server_with_service(&log, outcome);
        server.handle_gatts_event(GATT_IF, connect(5));
        server.stack_mut().calls.clear();

        server.handle_gatts_event(GATT_IF, write(5, 7, 41, true));
        assert_eq!(
            server.stack().responses(),
            vec![(5, 7, GattStatus::WriteNotPermitted)]
        );
    }
}

#[test]
fn test_write_to_unknown_connection() {
    let log = SeenLog::default();
    let (mut server, _) = server_with_service(&log, HandlerOutcome::Accept);

    server.handle_gatts_event(GATT_IF, write(9, 1, 41, true));
    assert_eq!(
        server.stack().responses(),
        vec![(9, 1, GattStatus::WriteNotPermitted)]
    );
    assert!(seen(&log).is_empty());
    assert!(server.connections().is_empty());
}

#[test]
fn test_write_to_unowned_handle() {
    let log = SeenLog::default();
    let (mut server, _) = server_with_service(&log, HandlerOutcome::Accept);
    server.handle_gatts_event(GATT_IF, connect(5));
    server.stack_mut().calls.clear();
    log.lock().unwrap().clear();

    server.handle_gatts_event(GATT_IF, write(5, 2, 99, true));
    assert_eq!(
        server.stack().responses(),
        vec![(5, 2, GattStatus::WriteNotPermitted)]
    );
    assert!(seen(&log).is_empty());
}

#[test]
fn test_write_without_response_still_reaches_handler() {
    let log = SeenLog::default();
    let (mut server, _) = server_with_service(&log, HandlerOutcome::Accept);
    server.handle_gatts_event(GATT_IF, connect(5));
    server.stack_mut().calls.clear();
    log.lock().unwrap().clear();

    server.handle_gatts_event(GATT_IF, write(5, 3, 42, false));
    server.handle_gatts_event(GATT_IF, write(6, 4, 42, false));
    assert_eq!(seen(&log), vec![("svc", "WRITE", Some(5))]);
    assert!(server.stack().responses().is_empty());
}

#[test]
fn test_read_responses() {
    let log = SeenLog::default();
    let (mut server, _) = server_with_service(&log, HandlerOutcome::Unhandled);
    server.handle_gatts_event(GATT_IF, connect(5));
    server.stack_mut().calls.clear();

    // Unclaimed: exactly one denial
    server.handle_gatts_event(GATT_IF, read(5, 1, 42, true));
    // Unknown connection
    server.handle_gatts_event(GATT_IF, read(8, 2, 42, true));
    // No response wanted
    server.handle_gatts_event(GATT_IF, read(5, 3, 42, false));

    assert_eq!(
        server.stack().responses(),
        vec![
            (5, 1, GattStatus::ReadNotPermitted),
            (8, 2, GattStatus::ReadNotPermitted),
        ]
    );
}

#[test]
fn test_accepted_read_gets_no_coordinator_response() {
    let log = SeenLog::default();
    let (mut server, _) = server_with_service(&log, HandlerOutcome::Accept);
    server.handle_gatts_event(GATT_IF, connect(5));
    server.stack_mut().calls.clear();

    server.handle_gatts_event(GATT_IF, read(5, 1, 42, true));
    assert_eq!(seen(&log), vec![("svc", "READ", Some(5))]);
    assert!(server.stack().responses().is_empty());
}

#[test]
fn test_rejected_read_is_denied_once() {
    let log = SeenLog::default();
    let (mut server, _) = server_with_service(&log, HandlerOutcome::Reject);
    server.handle_gatts_event(GATT_IF, connect(5));
    server.stack_mut().calls.clear();

    server.handle_gatts_event(GATT_IF, read(5, 1, 42, true));
    assert_eq!(
        server.stack().responses(),
        vec![(5, 1, GattStatus::ReadNotPermitted)]
    );
}

#[test]
fn test_boolean_claim_on_read_leaves_response_to_handler() {
    let mut server = registered_server();
    server
        .register_service(
            service_attrs(0x00FF),
            Some(handler_fn(|_session, _event, _stack| HandlerOutcome::from(true))),
        )
        .unwrap();
    server.handle_gatts_event(GATT_IF, table_created(0x00FF, vec![40, 41, 42]));
    server.handle_gatts_event(GATT_IF, connect(5));
    server.stack_mut().calls.clear();

    server.handle_gatts_event(GATT_IF, read(5, 1, 42, true));
    assert!(server.stack().responses().is_empty());

    // The same claim on a write is acknowledged by the coordinator
    server.handle_gatts_event(GATT_IF, write(5, 2, 42, true));
    assert_eq!(server.stack().responses(), vec![(5, 2, GattStatus::Ok)]);
}

#[test]
fn test_deferred_read_is_answered_by_handler() {
    let mut server = registered_server();
    let handler = handler_fn(|session, event, stack| {
        let (Some(session), GattsEvent::Read(p)) = (session, event) else {
            return HandlerOutcome::Unhandled;
        };
        let value = AttrValue {
            handle: p.handle,
            offset: p.offset,
            value: b"1.2.3".to_vec(),
        };
        let r = stack.send_response(
            session.gatt_if(),
            session.conn_id(),
            p.trans_id,
            GattStatus::Ok,
            Some(&value),
        );
        assert!(r.is_ok());
        HandlerOutcome::Deferred
    });
    server.register_service(service_attrs(0x00FF), Some(handler)).unwrap();
    server.handle_gatts_event(GATT_IF, table_created(0x00FF, vec![40, 41, 42]));
    server.handle_gatts_event(GATT_IF, connect(5));
    server.stack_mut().calls.clear();

    server.handle_gatts_event(GATT_IF, read(5, 11, 42, true));
    assert_eq!(
        server.stack().calls,
        vec![StackCall::SendResponse {
            conn_id: 5,
            trans_id: 11,
            status: GattStatus::Ok,
            with_value: true,
        }]
    );
}

#[test]
fn test_mtu_update() {
    let log = SeenLog::default();
    let (mut server, _) = server_with_service(&log, HandlerOutcome::Unhandled);
    server.handle_gatts_event(GATT_IF, connect(5));

    server.handle_gatts_event(GATT_IF, GattsEvent::Mtu { conn_id: 5, mtu: 247 });
    server.handle_gatts_event(GATT_IF, GattsEvent::Mtu { conn_id: 6, mtu: 185 });
    assert_eq!(server.find_connection(GATT_IF, 5).unwrap().info().mtu, 247);
    assert!(server.find_connection(GATT_IF, 6).is_none());
}

#[test]
fn test_session_sees_negotiated_mtu_and_user_data() {
    let mut server = registered_server();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let handler = handler_fn(move |session, event, _stack| {
        let Some(mut session) = session else {
            return HandlerOutcome::Unhandled;
        };
        match event {
            GattsEvent::Connect(_) => session.set_user_data(0u32),
            GattsEvent::Write(_) => {
                if let Some(writes) = session.user_data::<u32>() {
                    *writes += 1;
                }
            }
            GattsEvent::Disconnect(_) => {
                let writes = session.take_user_data::<u32>();
                sink.lock().unwrap().push((session.mtu(), writes));
            }
            _ => {}
        }
        HandlerOutcome::Accept
    });
    server.register_service(service_attrs(0x00FF), Some(handler)).unwrap();
    server.handle_gatts_event(GATT_IF, table_created(0x00FF, vec![40, 41, 42]));

    server.handle_gatts_event(GATT_IF, connect(5));
    server.handle_gatts_event(GATT_IF, GattsEvent::Mtu { conn_id: 5, mtu: 512 });
    server.handle_gatts_event(GATT_IF, write(5, 1, 42, true));
    server.handle_gatts_event(GATT_IF, write(5, 2, 42, false));
    server.handle_gatts_event(GATT_IF, disconnect(5));

    assert_eq!(*observed.lock().unwrap(), vec![(512, Some(2))]);
}

#[test]
fn test_disconnect_releases_sessions() {
    let log = SeenLog::default();
    let (mut server, _) = server_with_service(&log, HandlerOutcome::Accept);
    server.handle_gatts_event(GATT_IF, connect(5));
    server.stack_mut().calls.clear();
    log.lock().unwrap().clear();

    server.handle_gatts_event(GATT_IF, disconnect(5));
    assert!(server.find_connection(GATT_IF, 5).is_none());
    assert_eq!(server.connections().session_count(), 0);
    assert_eq!(seen(&log), vec![("svc", "DISCONNECT", Some(5))]);
    assert_eq!(server.stack().calls, vec![StackCall::StartAdvertising]);

    // Second disconnect for the same link only resumes advertising
    server.handle_gatts_event(GATT_IF, disconnect(5));
    assert_eq!(seen(&log).len(), 1);
    assert_eq!(server.stack().count(&StackCall::StartAdvertising), 2);

    // Later requests on the closed link are denied without routing
    server.handle_gatts_event(GATT_IF, write(5, 9, 42, true));
    assert_eq!(
        server.stack().responses(),
        vec![(5, 9, GattStatus::WriteNotPermitted)]
    );
    assert_eq!(seen(&log).len(), 1);
}

#[test]
fn test_disconnect_in_any_order() {
    let log = SeenLog::default();
    let mut server = registered_server();
    for uuid in [0x0001u16, 0x0002, 0x0003] {
        server
            .register_service(service_attrs(uuid), Some(recorder("svc", &log, HandlerOutcome::Unhandled)))
            .unwrap();
    }

    let mut conn_ids: Vec<ConnId> = (0..16).collect();
    for &conn_id in &conn_ids {
        server.handle_gatts_event(GATT_IF, connect(conn_id));
    }
    assert_eq!(server.connections().len(), 16);
    assert_eq!(server.connections().session_count(), 48);

    conn_ids.shuffle(&mut rand::thread_rng());
    for (closed, &conn_id) in conn_ids.iter().enumerate() {
        log.lock().unwrap().clear();
        server.handle_gatts_event(GATT_IF, disconnect(conn_id));

        assert!(server.find_connection(GATT_IF, conn_id).is_none());
        assert_eq!(server.connections().len(), 16 - closed - 1);
        assert_eq!(server.connections().session_count(), 3 * (16 - closed - 1));
        assert_eq!(
            seen(&log),
            vec![("svc", "DISCONNECT", Some(conn_id)); 3]
        );
    }
}

#[test]
fn test_connection_ids_are_scoped_per_server_identity() {
    let log = SeenLog::default();
    let (mut server, _) = server_with_service(&log, HandlerOutcome::Accept);
    server.handle_gatts_event(GATT_IF, connect(5));
    server.handle_gatts_event(GATT_IF + 1, connect(5));
    assert_eq!(server.connections().len(), 2);

    server.handle_gatts_event(GATT_IF + 1, disconnect(5));
    assert!(server.find_connection(GATT_IF, 5).is_some());
    assert!(server.find_connection(GATT_IF + 1, 5).is_none());
}

#[test]
fn test_reconnect_replaces_stale_connection() {
    let log = SeenLog::default();
    let (mut server, _) = server_with_service(&log, HandlerOutcome::Unhandled);
    server.handle_gatts_event(GATT_IF, connect(5));
    log.lock().unwrap().clear();

    server.handle_gatts_event(GATT_IF, connect(5));
    assert_eq!(
        seen(&log),
        vec![("svc", "DISCONNECT", Some(5)), ("svc", "CONNECT", Some(5))]
    );
    assert_eq!(server.connections().len(), 1);
    assert_eq!(server.connections().session_count(), 1);
}

#[test]
fn test_late_service_gets_no_session_on_open_connection() {
    let log = SeenLog::default();
    let (mut server, first) = server_with_service(&log, HandlerOutcome::Accept);
    server.handle_gatts_event(GATT_IF, connect(5));

    let late = server
        .register_service(service_attrs(0x00EE), Some(recorder("late", &log, HandlerOutcome::Accept)))
        .unwrap();
    server.handle_gatts_event(GATT_IF, table_created(0x00EE, vec![60, 61, 62]));
    server.stack_mut().calls.clear();
    log.lock().unwrap().clear();

    let conn = server.find_connection(GATT_IF, 5).unwrap();
    assert!(conn.has_session(first));
    assert!(!conn.has_session(late));

    server.handle_gatts_event(GATT_IF, write(5, 1, 62, true));
    assert!(seen(&log).is_empty());
    assert_eq!(
        server.stack().responses(),
        vec![(5, 1, GattStatus::WriteNotPermitted)]
    );

    // A new connection picks it up
    server.handle_gatts_event(GATT_IF, connect(6));
    assert!(server.find_connection(GATT_IF, 6).unwrap().has_session(late));
}

#[test]
fn test_advertising_follows_config() {
    let config = BtConfig {
        adv_enable: false,
        ..BtConfig::with_name("quiet")
    };
    let mut server = GattServer::init(MockStack::default(), config).unwrap().unwrap();
    server.handle_gatts_event(GATT_IF, register_event(GattStatus::Ok));
    assert_eq!(server.stack().count(&StackCall::ConfigAdvData), 1);

    server.handle_gatts_event(GATT_IF, connect(1));
    server.handle_gatts_event(GATT_IF, disconnect(1));
    assert_eq!(server.stack().count(&StackCall::StartAdvertising), 0);

    // Payload configured: advertising starts regardless
    server.handle_gap_event(GapEvent::AdvDataSetComplete { status: 0 });
    assert_eq!(server.stack().count(&StackCall::StartAdvertising), 1);

    server.handle_gap_event(GapEvent::AdvStartComplete { status: 0 });
    assert_eq!(server.stack().count(&StackCall::StartAdvertising), 1);
}

#[test]
fn test_informational_events_change_nothing() {
    let log = SeenLog::default();
    let (mut server, _) = server_with_service(&log, HandlerOutcome::Accept);
    server.handle_gatts_event(GATT_IF, connect(5));
    server.stack_mut().calls.clear();
    log.lock().unwrap().clear();

    let events = vec![
        GattsEvent::ExecWrite {
            conn_id: 5,
            trans_id: 1,
            bda: peer(5),
            exec_write_flag: crate::att::ATT_EXEC_WRITE_COMMIT,
        },
        GattsEvent::Conf { conn_id: 5, status: GattStatus::Ok },
        GattsEvent::Start { status: GattStatus::Ok, service_handle: 40 },
        GattsEvent::Start { status: GattStatus::Busy, service_handle: 40 },
        GattsEvent::Congest { conn_id: 5, congested: true },
        GattsEvent::Response { status: GattStatus::Ok, handle: 42 },
        GattsEvent::Listen,
        GattsEvent::Unregister,
    ];
    for event in events {
        server.handle_gatts_event(GATT_IF, event);
    }
    server.handle_gap_event(GapEvent::SetPktLengthComplete {
        status: 0,
        rx_len: 251,
        tx_len: 251,
    });

    assert!(server.stack().calls.is_empty());
    assert!(seen(&log).is_empty());
    assert_eq!(server.connections().len(), 1);
}

#[test]
fn test_wifi_ip_disables_bluetooth_once() {
    let mut server = registered_server();
    assert!(server.is_enabled());

    server.handle_wifi_ip_acquired();
    server.handle_wifi_ip_acquired();
    assert!(!server.is_enabled());
    assert_eq!(server.stack().calls, vec![StackCall::DisableController]);
}

#[test]
fn test_keep_enabled_survives_wifi_ip() {
    let config = BtConfig {
        keep_enabled: true,
        ..BtConfig::with_name("rustygatts")
    };
    let mut server = GattServer::init(MockStack::default(), config).unwrap().unwrap();
    server.stack_mut().calls.clear();

    server.handle_wifi_ip_acquired();
    assert!(server.is_enabled());
    assert!(server.stack().calls.is_empty());
}

#[test]
fn test_shared_server_serializes_dispatch() {
    let log = SeenLog::default();
    let shared = SharedGattServer::init(MockStack::default(), BtConfig::with_name("shared"))
        .unwrap()
        .unwrap();
    shared.handle_gatts_event(GATT_IF, register_event(GattStatus::Ok));
    shared
        .register_service(service_attrs(0x00FF), Some(recorder("svc", &log, HandlerOutcome::Accept)))
        .unwrap();
    shared.handle_gatts_event(GATT_IF, table_created(0x00FF, vec![40, 41, 42]));

    let workers: Vec<_> = (0..4u16)
        .map(|worker| {
            let shared = shared.clone();
            thread::spawn(move || {
                for n in 0..8u16 {
                    let conn_id = worker * 100 + n;
                    shared.handle_gatts_event(GATT_IF, connect(conn_id));
                    shared.handle_gatts_event(GATT_IF, write(conn_id, n as TransId, 41, true));
                    if n % 2 == 0 {
                        shared.handle_gatts_event(GATT_IF, disconnect(conn_id));
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let server = shared.lock();
    assert_eq!(server.connections().len(), 16);
    assert_eq!(server.connections().session_count(), 16);
    assert_eq!(server.stack().responses().len(), 32);
    assert!(server
        .stack()
        .responses()
        .iter()
        .all(|(_, _, status)| *status == GattStatus::Ok));
}

#[test]
fn test_shared_server_wifi_ip_disables_bluetooth() {
    let shared = SharedGattServer::init(MockStack::default(), BtConfig::with_name("shared"))
        .unwrap()
        .unwrap();
    shared.handle_wifi_ip_acquired();
    let server = shared.lock();
    assert!(!server.is_enabled());
    assert_eq!(server.stack().count(&StackCall::DisableController), 1);
}

/// Run `f` on its own thread, failing instead of hanging if it never returns
fn within_timeout(f: impl FnOnce() + Send + 'static) {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        f();
        let _ = tx.send(());
    });
    rx.recv_timeout(Duration::from_secs(5))
        .expect("dispatch did not return");
}

type Registered = Arc<Mutex<Vec<crate::error::Result<ServiceId>>>>;

#[test]
fn test_handler_registers_service_during_dispatch() {
    let shared = SharedGattServer::init(MockStack::default(), BtConfig::with_name("shared"))
        .unwrap()
        .unwrap();
    shared.handle_gatts_event(GATT_IF, register_event(GattStatus::Ok));

    let log = SeenLog::default();
    let registered = Registered::default();
    let handler = {
        let shared = shared.clone();
        let log = Arc::clone(&log);
        let registered = Arc::clone(&registered);
        handler_fn(move |_session, event, _stack| {
            let GattsEvent::CreateAttrTable(p) = event else {
                return HandlerOutcome::Unhandled;
            };
            if p.svc_uuid == Uuid::from(0x00FFu16) {
                let mut registered = registered.lock().unwrap();
                registered.push(shared.register_service(
                    service_attrs(0x00EE),
                    Some(recorder("late", &log, HandlerOutcome::Accept)),
                ));
                registered.push(shared.register_service(service_attrs(0x00ED), None));
            }
            HandlerOutcome::Unhandled
        })
    };
    let first = shared
        .register_service(service_attrs(0x00FF), Some(handler))
        .unwrap();

    let worker = shared.clone();
    within_timeout(move || {
        worker.handle_gatts_event(GATT_IF, table_created(0x00FF, vec![40, 41, 42]));
    });

    let results = registered.lock().unwrap().clone();
    assert_eq!(results.len(), 2);
    let late = results[0].clone().unwrap();
    assert_eq!(late.index(), first.index() + 1);
    assert_eq!(results[1], Err(Error::MissingHandler));

    {
        let server = shared.lock();
        assert_eq!(server.services().len(), 2);
        assert_eq!(server.services().get(late).unwrap().state(), TableState::Requested);
        assert_eq!(server.stack().created_tables(), 2);
    }

    // The queued service is a full citizen once its table exists
    shared.handle_gatts_event(GATT_IF, table_created(0x00EE, vec![50, 51, 52]));
    shared.handle_gatts_event(GATT_IF, connect(5));
    shared.handle_gatts_event(GATT_IF, write(5, 1, 52, true));
    assert_eq!(seen(&log), vec![("late", "CONNECT", Some(5)), ("late", "WRITE", Some(5))]);
    assert_eq!(shared.lock().stack().responses(), vec![(5, 1, GattStatus::Ok)]);
}

#[test]
fn test_handler_feeds_event_during_dispatch() {
    let shared = SharedGattServer::init(MockStack::default(), BtConfig::with_name("shared"))
        .unwrap()
        .unwrap();
    shared.handle_gatts_event(GATT_IF, register_event(GattStatus::Ok));

    let handler = {
        let shared = shared.clone();
        handler_fn(move |_session, event, _stack| {
            if let GattsEvent::Connect(_) = event {
                shared.handle_gap_event(GapEvent::AdvDataSetComplete { status: 0 });
            }
            HandlerOutcome::Unhandled
        })
    };
    shared
        .register_service(service_attrs(0x00FF), Some(handler))
        .unwrap();
    shared.handle_gatts_event(GATT_IF, table_created(0x00FF, vec![40, 41, 42]));
    shared.lock().stack_mut().calls.clear();

    let worker = shared.clone();
    within_timeout(move || worker.handle_gatts_event(GATT_IF, connect(5)));

    let server = shared.lock();
    assert_eq!(server.connections().len(), 1);
    assert_eq!(server.stack().count(&StackCall::StartAdvertising), 2);
}
