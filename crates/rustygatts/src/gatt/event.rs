//! Inbound events delivered by the BLE stack
//!
//! Every event kind the stack can report is an explicit variant. Kinds that do
//! not affect routing state are still spelled out so the dispatcher can log
//! them and move on.

use super::types::Handle;
use crate::att::{GattStatus, ATT_EXEC_WRITE_CANCEL, ATT_EXEC_WRITE_COMMIT};
use crate::gap::BdAddr;
use crate::uuid::Uuid;
use std::fmt;

/// Server identity the stack assigns when the GATT application registers
pub type GattIf = u8;

/// Connection id, unique among live connections of one server identity
pub type ConnId = u16;

/// Transaction id correlating a request with its response
pub type TransId = u32;

/// Raw status code of a GAP completion
pub type BtStatus = u8;

/// Attribute read request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadParams {
    pub conn_id: ConnId,
    pub trans_id: TransId,
    pub bda: BdAddr,
    pub handle: Handle,
    pub offset: u16,
    /// Continuation of a long (blob) read
    pub is_long: bool,
    pub need_rsp: bool,
}

/// Attribute write request or command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteParams {
    pub conn_id: ConnId,
    pub trans_id: TransId,
    pub bda: BdAddr,
    pub handle: Handle,
    pub offset: u16,
    pub value: Vec<u8>,
    pub need_rsp: bool,
    /// Part of a prepared (queued) write
    pub is_prep: bool,
}

/// Link established (or failed to)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub conn_id: ConnId,
    pub remote_bda: BdAddr,
    pub is_connected: bool,
}

/// Link lost
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectParams {
    pub conn_id: ConnId,
    pub remote_bda: BdAddr,
    pub reason: u8,
}

/// Completion of an attribute table creation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrTableParams {
    pub status: GattStatus,
    pub svc_uuid: Uuid,
    pub svc_inst_id: u8,
    /// Handles in descriptor-table order
    pub handles: Vec<Handle>,
}

/// GATT server event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattsEvent {
    Register {
        status: GattStatus,
        app_id: u16,
    },
    Read(ReadParams),
    Write(WriteParams),
    ExecWrite {
        conn_id: ConnId,
        trans_id: TransId,
        bda: BdAddr,
        exec_write_flag: u8,
    },
    Mtu {
        conn_id: ConnId,
        mtu: u16,
    },
    Conf {
        conn_id: ConnId,
        status: GattStatus,
    },
    Unregister,
    Create {
        status: GattStatus,
        service_handle: Handle,
        service_uuid: Uuid,
        inst_id: u8,
        is_primary: bool,
    },
    AddIncludedService {
        status: GattStatus,
        attr_handle: Handle,
        service_handle: Handle,
    },
    AddChar {
        status: GattStatus,
        attr_handle: Handle,
        service_handle: Handle,
        char_uuid: Uuid,
    },
    AddCharDescr {
        status: GattStatus,
        attr_handle: Handle,
        service_handle: Handle,
        descr_uuid: Uuid,
    },
    Delete {
        status: GattStatus,
        service_handle: Handle,
    },
    Start {
        status: GattStatus,
        service_handle: Handle,
    },
    Stop {
        status: GattStatus,
        service_handle: Handle,
    },
    Connect(ConnectParams),
    Disconnect(DisconnectParams),
    Open {
        status: GattStatus,
    },
    CancelOpen {
        status: GattStatus,
    },
    Close {
        status: GattStatus,
        conn_id: ConnId,
    },
    Listen,
    Congest {
        conn_id: ConnId,
        congested: bool,
    },
    Response {
        status: GattStatus,
        handle: Handle,
    },
    CreateAttrTable(AttrTableParams),
    SetAttrValue {
        srvc_handle: Handle,
        attr_handle: Handle,
        status: GattStatus,
    },
}

impl GattsEvent {
    /// Short event name, as used in logs
    pub fn name(&self) -> &'static str {
        match self {
            GattsEvent::Register { .. } => "REG",
            GattsEvent::Read(_) => "READ",
            GattsEvent::Write(_) => "WRITE",
            GattsEvent::ExecWrite { .. } => "EXEC_WRITE",
            GattsEvent::Mtu { .. } => "MTU",
            GattsEvent::Conf { .. } => "CONF",
            GattsEvent::Unregister => "UNREG",
            GattsEvent::Create { .. } => "CREATE",
            GattsEvent::AddIncludedService { .. } => "ADD_INCL_SRVC",
            GattsEvent::AddChar { .. } => "ADD_CHAR",
            GattsEvent::AddCharDescr { .. } => "ADD_CHAR_DESCR",
            GattsEvent::Delete { .. } => "DELETE",
            GattsEvent::Start { .. } => "START",
            GattsEvent::Stop { .. } => "STOP",
            GattsEvent::Connect(_) => "CONNECT",
            GattsEvent::Disconnect(_) => "DISCONNECT",
            GattsEvent::Open { .. } => "OPEN",
            GattsEvent::CancelOpen { .. } => "CANCEL_OPEN",
            GattsEvent::Close { .. } => "CLOSE",
            GattsEvent::Listen => "LISTEN",
            GattsEvent::Congest { .. } => "CONGEST",
            GattsEvent::Response { .. } => "RESPONSE",
            GattsEvent::CreateAttrTable(_) => "CREAT_ATTR_TAB",
            GattsEvent::SetAttrValue { .. } => "SET_ATTR_VAL",
        }
    }
}

fn flag(set: bool, text: &'static str) -> &'static str {
    if set {
        text
    } else {
        ""
    }
}

impl fmt::Display for GattsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match self {
            GattsEvent::Register { status, app_id } => {
                write!(f, "{} st {} app {}", name, status, app_id)
            }
            GattsEvent::Read(p) => write!(
                f,
                "{} {} cid {} tid 0x{:08x} h {} off {}{}{}",
                name,
                p.bda,
                p.conn_id,
                p.trans_id,
                p.handle,
                p.offset,
                flag(p.is_long, " long"),
                flag(p.need_rsp, " need_rsp")
            ),
            GattsEvent::Write(p) => write!(
                f,
                "{} {} cid {} tid 0x{:08x} h {} off {} len {}{}{}",
                name,
                p.bda,
                p.conn_id,
                p.trans_id,
                p.handle,
                p.offset,
                p.value.len(),
                flag(p.is_prep, " prep"),
                flag(p.need_rsp, " need_rsp")
            ),
            GattsEvent::ExecWrite {
                conn_id,
                trans_id,
                bda,
                exec_write_flag,
            } => {
                let action = match *exec_write_flag {
                    ATT_EXEC_WRITE_CANCEL => "cancel",
                    ATT_EXEC_WRITE_COMMIT => "commit",
                    _ => "?",
                };
                write!(
                    f,
                    "{} {} cid {} tid 0x{:08x} {}",
                    name, bda, conn_id, trans_id, action
                )
            }
            GattsEvent::Mtu { conn_id, mtu } => write!(f, "{} cid {} mtu {}", name, conn_id, mtu),
            GattsEvent::Conf { conn_id, status } => {
                write!(f, "{} cid {} st {}", name, conn_id, status)
            }
            GattsEvent::Unregister | GattsEvent::Listen => write!(f, "{}", name),
            GattsEvent::Create {
                status,
                service_handle,
                service_uuid,
                inst_id,
                is_primary,
            } => write!(
                f,
                "{} st {} svch {} svcid {} {}{}",
                name,
                status,
                service_handle,
                service_uuid,
                inst_id,
                flag(*is_primary, " primary")
            ),
            GattsEvent::AddIncludedService {
                status,
                attr_handle,
                service_handle,
            } => write!(f, "{} st {} ah {} svch {}", name, status, attr_handle, service_handle),
            GattsEvent::AddChar {
                status,
                attr_handle,
                service_handle,
                char_uuid: uuid,
            }
            | GattsEvent::AddCharDescr {
                status,
                attr_handle,
                service_handle,
                descr_uuid: uuid,
            } => write!(
                f,
                "{} st {} ah {} svch {} uuid {}",
                name, status, attr_handle, service_handle, uuid
            ),
            GattsEvent::Delete {
                status,
                service_handle,
            }
            | GattsEvent::Start {
                status,
                service_handle,
            }
            | GattsEvent::Stop {
                status,
                service_handle,
            } => write!(f, "{} st {} svch {}", name, status, service_handle),
            GattsEvent::Connect(p) => write!(
                f,
                "{} cid {} addr {}{}",
                name,
                p.conn_id,
                p.remote_bda,
                flag(p.is_connected, " connected")
            ),
            GattsEvent::Disconnect(p) => write!(
                f,
                "{} cid {} addr {} reason 0x{:02x}",
                name, p.conn_id, p.remote_bda, p.reason
            ),
            GattsEvent::Open { status } | GattsEvent::CancelOpen { status } => {
                write!(f, "{} st {}", name, status)
            }
            GattsEvent::Close { status, conn_id } => {
                write!(f, "{} st {} cid {}", name, status, conn_id)
            }
            GattsEvent::Congest { conn_id, congested } => write!(
                f,
                "{} cid {}{}",
                name,
                conn_id,
                flag(*congested, " congested")
            ),
            GattsEvent::Response { status, handle } => {
                write!(f, "{} st {} ah {}", name, status, handle)
            }
            GattsEvent::CreateAttrTable(p) => write!(
                f,
                "{} st {} svc_uuid {} inst {} nh {}",
                name,
                p.status,
                p.svc_uuid,
                p.svc_inst_id,
                p.handles.len()
            ),
            GattsEvent::SetAttrValue {
                srvc_handle,
                attr_handle,
                status,
            } => write!(f, "{} sh {} ah {} st {}", name, srvc_handle, attr_handle, status),
        }
    }
}

/// GAP (advertising, scanning, security) event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapEvent {
    AdvDataSetComplete { status: BtStatus },
    ScanRspDataSetComplete { status: BtStatus },
    ScanParamSetComplete { status: BtStatus },
    ScanResult,
    AdvDataRawSetComplete { status: BtStatus },
    ScanRspDataRawSetComplete { status: BtStatus },
    AdvStartComplete { status: BtStatus },
    ScanStartComplete { status: BtStatus },
    AuthComplete,
    Key,
    SecReq,
    PasskeyNotif,
    PasskeyReq,
    OobReq,
    LocalIr,
    LocalEr,
    NcReq,
    AdvStopComplete { status: BtStatus },
    ScanStopComplete { status: BtStatus },
    SetStaticRandAddr { status: BtStatus },
    UpdateConnParams { status: BtStatus },
    SetPktLengthComplete {
        status: BtStatus,
        rx_len: u16,
        tx_len: u16,
    },
}

impl GapEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GapEvent::AdvDataSetComplete { .. } => "ADV_DATA_SET_COMPLETE",
            GapEvent::ScanRspDataSetComplete { .. } => "SCAN_RSP_DATA_SET_COMPLETE",
            GapEvent::ScanParamSetComplete { .. } => "SCAN_PARAM_SET_COMPLETE",
            GapEvent::ScanResult => "SCAN_RESULT",
            GapEvent::AdvDataRawSetComplete { .. } => "ADV_DATA_RAW_SET_COMPLETE",
            GapEvent::ScanRspDataRawSetComplete { .. } => "SCAN_RSP_DATA_RAW_SET_COMPLETE",
            GapEvent::AdvStartComplete { .. } => "ADV_START_COMPLETE",
            GapEvent::ScanStartComplete { .. } => "SCAN_START_COMPLETE",
            GapEvent::AuthComplete => "AUTH_CMPL",
            GapEvent::Key => "KEY",
            GapEvent::SecReq => "SEC_REQ",
            GapEvent::PasskeyNotif => "PASSKEY_NOTIF",
            GapEvent::PasskeyReq => "PASSKEY_REQ",
            GapEvent::OobReq => "OOB_REQ",
            GapEvent::LocalIr => "LOCAL_IR",
            GapEvent::LocalEr => "LOCAL_ER",
            GapEvent::NcReq => "NC_REQ",
            GapEvent::AdvStopComplete { .. } => "ADV_STOP_COMPLETE",
            GapEvent::ScanStopComplete { .. } => "SCAN_STOP_COMPLETE",
            GapEvent::SetStaticRandAddr { .. } => "SET_STATIC_RAND_ADDR",
            GapEvent::UpdateConnParams { .. } => "UPDATE_CONN_PARAMS",
            GapEvent::SetPktLengthComplete { .. } => "SET_PKT_LENGTH_COMPLETE",
        }
    }

    pub fn status(&self) -> Option<BtStatus> {
        match *self {
            GapEvent::AdvDataSetComplete { status }
            | GapEvent::ScanRspDataSetComplete { status }
            | GapEvent::ScanParamSetComplete { status }
            | GapEvent::AdvDataRawSetComplete { status }
            | GapEvent::ScanRspDataRawSetComplete { status }
            | GapEvent::AdvStartComplete { status }
            | GapEvent::ScanStartComplete { status }
            | GapEvent::AdvStopComplete { status }
            | GapEvent::ScanStopComplete { status }
            | GapEvent::SetStaticRandAddr { status }
            | GapEvent::UpdateConnParams { status }
            | GapEvent::SetPktLengthComplete { status, .. } => Some(status),
            _ => None,
        }
    }
}

impl fmt::Display for GapEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.status()) {
            (GapEvent::SetPktLengthComplete { status, rx_len, tx_len }, _) => write!(
                f,
                "{} st {} rx_len {} tx_len {}",
                self.name(),
                status,
                rx_len,
                tx_len
            ),
            (_, Some(status)) => write!(f, "{} st {}", self.name(), status),
            (_, None) => write!(f, "{}", self.name()),
        }
    }
}
