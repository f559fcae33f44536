//! Thread-safe handle around a `GattServer`
//!
//! Stacks that deliver callbacks from more than one thread go through this
//! wrapper. One mutex guards the whole server, so registries and sessions are
//! only ever touched by one dispatch at a time.
//!
//! Handlers run with that mutex held. A handler that calls back into the
//! wrapper from the dispatching thread (to register a service, or to feed an
//! event) does not block: the call is queued and carried out once the current
//! dispatch returns, before the lock is released.

use super::event::{GapEvent, GattIf, GattsEvent};
use super::handler::ServiceHandler;
use super::registry::ServiceId;
use super::server::{check_service, GattServer};
use super::stack::BleStack;
use super::types::AttrDescriptor;
use crate::config::BtConfig;
use crate::error::Result;
use log::{debug, error, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

/// Work handed to the wrapper, run now or after the current dispatch
enum Op {
    Register {
        id: ServiceId,
        attrs: Vec<AttrDescriptor>,
        handler: Box<dyn ServiceHandler>,
    },
    Gatts(GattIf, GattsEvent),
    Gap(GapEvent),
    WifiIpAcquired,
}

#[derive(Default)]
struct Dispatch {
    /// Thread currently running handlers
    owner: Option<ThreadId>,
    /// Id the next queued registration receives
    next_id: usize,
    queue: VecDeque<Op>,
}

struct Inner<S: BleStack> {
    server: Mutex<GattServer<S>>,
    dispatch: Mutex<Dispatch>,
}

/// Cloneable, lock-protected `GattServer`
pub struct SharedGattServer<S: BleStack> {
    inner: Arc<Inner<S>>,
}

impl<S: BleStack> Clone for SharedGattServer<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Marks the calling thread as the dispatcher until dropped
struct OwnerGuard<'a> {
    dispatch: &'a Mutex<Dispatch>,
}

impl<'a> OwnerGuard<'a> {
    fn enter(dispatch: &'a Mutex<Dispatch>, owner: ThreadId, next_id: usize) -> Self {
        let mut state = relock(dispatch);
        state.owner = Some(owner);
        state.next_id = next_id;
        Self { dispatch }
    }
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        let mut state = relock(self.dispatch);
        state.owner = None;
        if !state.queue.is_empty() {
            warn!("Dropping {} calls queued by a failed dispatch", state.queue.len());
            state.queue.clear();
        }
    }
}

/// A handler that panicked mid-dispatch leaves the registries consistent
/// (every mutation is a single insert or remove), so a poisoned lock is taken
/// over rather than propagated.
fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn apply<S: BleStack>(server: &mut GattServer<S>, op: Op) {
    match op {
        Op::Register { id, attrs, handler } => match server.register_service(attrs, Some(handler)) {
            Ok(assigned) => debug_assert_eq!(assigned, id),
            Err(e) => error!("Queued registration of {} failed: {}", id, e),
        },
        Op::Gatts(gatt_if, event) => server.handle_gatts_event(gatt_if, event),
        Op::Gap(event) => server.handle_gap_event(event),
        Op::WifiIpAcquired => server.handle_wifi_ip_acquired(),
    }
}

impl<S: BleStack> SharedGattServer<S> {
    pub fn new(server: GattServer<S>) -> Self {
        Self {
            inner: Arc::new(Inner {
                server: Mutex::new(server),
                dispatch: Mutex::new(Dispatch::default()),
            }),
        }
    }

    /// Start the server and wrap it; `Ok(None)` when Bluetooth is disabled
    pub fn init(stack: S, config: BtConfig) -> Result<Option<Self>> {
        Ok(GattServer::init(stack, config)?.map(Self::new))
    }

    /// Lock the server for direct access.
    ///
    /// Must not be called from inside a handler; use the other methods there.
    pub fn lock(&self) -> MutexGuard<'_, GattServer<S>> {
        relock(&self.inner.server)
    }

    /// Register a service. From inside a handler the registration is
    /// validated at once and the service added right after the current
    /// dispatch; the returned id is final either way.
    pub fn register_service(
        &self,
        attrs: Vec<AttrDescriptor>,
        handler: Option<Box<dyn ServiceHandler>>,
    ) -> Result<ServiceId> {
        {
            let mut state = relock(&self.inner.dispatch);
            if state.owner == Some(thread::current().id()) {
                let handler = check_service(&attrs, handler)?;
                let id = ServiceId(state.next_id);
                state.next_id += 1;
                debug!("{} registered during dispatch, queued", id);
                state.queue.push_back(Op::Register { id, attrs, handler });
                return Ok(id);
            }
        }
        self.lock().register_service(attrs, handler)
    }

    pub fn handle_gatts_event(&self, gatt_if: GattIf, event: GattsEvent) {
        self.run(Op::Gatts(gatt_if, event))
    }

    pub fn handle_gap_event(&self, event: GapEvent) {
        self.run(Op::Gap(event))
    }

    pub fn handle_wifi_ip_acquired(&self) {
        self.run(Op::WifiIpAcquired)
    }

    fn run(&self, op: Op) {
        let me = thread::current().id();
        {
            let mut state = relock(&self.inner.dispatch);
            if state.owner == Some(me) {
                state.queue.push_back(op);
                return;
            }
        }

        let mut server = self.lock();
        let _owner = OwnerGuard::enter(&self.inner.dispatch, me, server.services().len());
        let mut next = Some(op);
        while let Some(op) = next {
            apply(&mut server, op);
            next = relock(&self.inner.dispatch).queue.pop_front();
        }
    }
}
