//! Connection Registry and per-connection sessions
//!
//! A connection owns one session per service that was registered when the
//! link came up. Sessions are created and released together with their
//! connection.

use super::event::{ConnId, GattIf};
use super::registry::ServiceId;
use crate::att::ATT_DEFAULT_MTU;
use crate::gap::BdAddr;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

/// Identity and negotiated state of one peer link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub gatt_if: GattIf,
    pub conn_id: ConnId,
    pub peer_addr: BdAddr,
    pub mtu: u16,
}

impl ConnectionInfo {
    /// A fresh link, at the default ATT MTU until renegotiated
    pub fn new(gatt_if: GattIf, conn_id: ConnId, peer_addr: BdAddr) -> Self {
        Self {
            gatt_if,
            conn_id,
            peer_addr,
            mtu: ATT_DEFAULT_MTU,
        }
    }
}

/// One service's context on one connection
pub struct Session {
    service: ServiceId,
    user_data: Option<Box<dyn Any + Send>>,
}

impl Session {
    pub(crate) fn new(service: ServiceId) -> Self {
        Self {
            service,
            user_data: None,
        }
    }

    pub fn service(&self) -> ServiceId {
        self.service
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("service", &self.service)
            .field("has_user_data", &self.user_data.is_some())
            .finish()
    }
}

/// A session together with the connection it belongs to, as seen by handlers
pub struct SessionRef<'a> {
    conn: &'a ConnectionInfo,
    session: &'a mut Session,
}

impl<'a> SessionRef<'a> {
    pub(crate) fn new(conn: &'a ConnectionInfo, session: &'a mut Session) -> Self {
        Self { conn, session }
    }

    pub fn connection(&self) -> &ConnectionInfo {
        self.conn
    }

    pub fn gatt_if(&self) -> GattIf {
        self.conn.gatt_if
    }

    pub fn conn_id(&self) -> ConnId {
        self.conn.conn_id
    }

    pub fn peer_addr(&self) -> BdAddr {
        self.conn.peer_addr
    }

    pub fn mtu(&self) -> u16 {
        self.conn.mtu
    }

    pub fn service(&self) -> ServiceId {
        self.session.service
    }

    /// Attach handler state to this session; dropped when the session is released
    pub fn set_user_data<T: Any + Send>(&mut self, data: T) {
        self.session.user_data = Some(Box::new(data));
    }

    pub fn user_data<T: Any + Send>(&mut self) -> Option<&mut T> {
        self.session.user_data.as_mut()?.downcast_mut::<T>()
    }

    pub fn take_user_data<T: Any + Send>(&mut self) -> Option<T> {
        match self.session.user_data.take()?.downcast::<T>() {
            Ok(data) => Some(*data),
            Err(other) => {
                self.session.user_data = Some(other);
                None
            }
        }
    }
}

/// An open peer link and its sessions
#[derive(Debug)]
pub struct Connection {
    pub(crate) info: ConnectionInfo,
    pub(crate) sessions: Vec<Session>,
}

impl Connection {
    pub(crate) fn new(info: ConnectionInfo) -> Self {
        Self {
            info,
            sessions: Vec::new(),
        }
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Whether this connection has a session for the given service
    pub fn has_session(&self, service: ServiceId) -> bool {
        self.sessions.iter().any(|s| s.service == service)
    }
}

/// Live connections keyed by (server identity, connection id)
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    conns: BTreeMap<(GattIf, ConnId), Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, gatt_if: GattIf, conn_id: ConnId) -> Option<&Connection> {
        self.conns.get(&(gatt_if, conn_id))
    }

    pub fn find_mut(&mut self, gatt_if: GattIf, conn_id: ConnId) -> Option<&mut Connection> {
        self.conns.get_mut(&(gatt_if, conn_id))
    }

    /// Insert a fully populated connection, returning any record it displaced
    pub(crate) fn insert(&mut self, conn: Connection) -> Option<Connection> {
        self.conns.insert((conn.info.gatt_if, conn.info.conn_id), conn)
    }

    pub(crate) fn remove(&mut self, gatt_if: GattIf, conn_id: ConnId) -> Option<Connection> {
        self.conns.remove(&(gatt_if, conn_id))
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.conns.values()
    }

    /// Total number of live sessions across all connections
    pub fn session_count(&self) -> usize {
        self.conns.values().map(|c| c.sessions.len()).sum()
    }
}
