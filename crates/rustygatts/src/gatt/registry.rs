//! Service Registry
//!
//! Owns every registered service for the lifetime of the server. Services are
//! never removed, so a `ServiceId` stays valid once issued.

use super::event::GattIf;
use super::handler::ServiceHandler;
use super::stack::BleStack;
use super::types::{AttrDescriptor, Handle};
use crate::uuid::Uuid;
use log::{debug, error};
use std::collections::BTreeMap;
use std::fmt;

/// Index of a service in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(pub(crate) usize);

impl ServiceId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "svc#{}", self.0)
    }
}

/// Attribute table lifecycle of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    /// Waiting for the GATT application to register
    Pending,
    /// Table creation requested, waiting for the stack to assign handles
    Requested,
    /// Handles assigned and start issued; the service serves traffic
    Started,
    /// The stack refused the table; never retried
    Failed,
}

/// A registered GATT service
pub struct Service {
    attrs: Vec<AttrDescriptor>,
    state: TableState,
    handles: Vec<Handle>,
    pub(crate) handler: Box<dyn ServiceHandler>,
}

impl Service {
    /// Service UUID, taken from the declaration in entry 0
    pub fn uuid(&self) -> Option<Uuid> {
        self.attrs.first().and_then(|decl| Uuid::from_bytes(&decl.value))
    }

    pub fn attrs(&self) -> &[AttrDescriptor] {
        &self.attrs
    }

    pub fn num_attrs(&self) -> usize {
        self.attrs.len()
    }

    pub fn state(&self) -> TableState {
        self.state
    }

    /// Handles assigned by the stack, in descriptor order; empty until created
    pub fn handles(&self) -> &[Handle] {
        &self.handles
    }

    /// Handle of the descriptor at `index`
    pub fn handle(&self, index: usize) -> Option<Handle> {
        self.handles.get(index).copied()
    }

    /// Service declaration handle, used to start the service
    pub fn base_handle(&self) -> Option<Handle> {
        self.handle(0)
    }

    pub fn is_started(&self) -> bool {
        self.state == TableState::Started
    }

    /// Match on the raw declaration value: both byte length and content must agree
    fn matches_uuid(&self, uuid: &Uuid) -> bool {
        match self.attrs.first() {
            Some(decl) => decl.value.len() == uuid.len() && decl.value == uuid.to_bytes(),
            None => false,
        }
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("uuid", &self.uuid())
            .field("num_attrs", &self.attrs.len())
            .field("state", &self.state)
            .field("handles", &self.handles)
            .finish()
    }
}

/// All registered services, plus an index from assigned handle to service
#[derive(Default)]
pub struct ServiceRegistry {
    services: Vec<Service>,
    by_handle: BTreeMap<Handle, ServiceId>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a service in the `Pending` state
    pub(crate) fn add(
        &mut self,
        attrs: Vec<AttrDescriptor>,
        handler: Box<dyn ServiceHandler>,
    ) -> ServiceId {
        let id = ServiceId(self.services.len());
        self.services.push(Service {
            attrs,
            state: TableState::Pending,
            handles: Vec::new(),
            handler,
        });
        id
    }

    pub fn get(&self, id: ServiceId) -> Option<&Service> {
        self.services.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: ServiceId) -> Option<&mut Service> {
        self.services.get_mut(id.0)
    }

    /// First service whose declaration carries `uuid`
    pub fn find_by_uuid(&self, uuid: &Uuid) -> Option<ServiceId> {
        self.services
            .iter()
            .position(|s| s.matches_uuid(uuid))
            .map(ServiceId)
    }

    /// First service carrying `uuid` that is still waiting for its handles.
    ///
    /// Completions are matched this way so that two registrations of the same
    /// UUID each receive their own table.
    pub(crate) fn find_requested_by_uuid(&self, uuid: &Uuid) -> Option<ServiceId> {
        self.services
            .iter()
            .position(|s| s.state == TableState::Requested && s.matches_uuid(uuid))
            .map(ServiceId)
    }

    /// Service owning the attribute handle `handle`
    pub fn find_by_handle(&self, handle: Handle) -> Option<ServiceId> {
        self.by_handle.get(&handle).copied()
    }

    /// Issue table creation for every service that has not been requested yet
    pub fn register_pending(&mut self, stack: &mut dyn BleStack, gatt_if: GattIf) {
        for (index, service) in self.services.iter_mut().enumerate() {
            if service.state != TableState::Pending {
                continue;
            }
            let r = stack.create_attr_table(gatt_if, &service.attrs, 0);
            debug!("create_attr_table svc#{} ({} attrs): {:?}", index, service.attrs.len(), r);
            service.state = match r {
                Ok(()) => TableState::Requested,
                Err(e) => {
                    error!("Failed to request attribute table for svc#{}: {}", index, e);
                    TableState::Failed
                }
            };
        }
    }

    /// Capture the handles the stack assigned to a requested service.
    ///
    /// Returns `false`, leaving the service untouched, if the handle count
    /// disagrees with the descriptor table.
    pub(crate) fn assign_handles(&mut self, id: ServiceId, handles: &[Handle]) -> bool {
        let Some(service) = self.services.get_mut(id.0) else {
            return false;
        };
        if service.attrs.len() != handles.len() {
            return false;
        }
        service.handles = handles.to_vec();
        for &handle in handles {
            self.by_handle
                .entry(handle)
                .and_modify(|owner| *owner = (*owner).min(id))
                .or_insert(id);
        }
        true
    }

    pub(crate) fn set_state(&mut self, id: ServiceId, state: TableState) {
        if let Some(service) = self.services.get_mut(id.0) {
            service.state = state;
        }
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ServiceId> {
        (0..self.services.len()).map(ServiceId)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (ServiceId, &mut Service)> {
        self.services
            .iter_mut()
            .enumerate()
            .map(|(index, service)| (ServiceId(index), service))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ServiceId, &Service)> {
        self.services
            .iter()
            .enumerate()
            .map(|(index, service)| (ServiceId(index), service))
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.services.iter()).finish()
    }
}
