//! Application-level service handlers

use super::connection::SessionRef;
use super::event::GattsEvent;
use super::stack::BleStack;

/// What a handler did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerOutcome {
    /// Not interested; for requests the coordinator answers "not permitted"
    #[default]
    Unhandled,
    /// Read only: the handler has sent (or will send) the response itself
    /// through the stack
    Deferred,
    /// Request accepted
    Accept,
    /// Request refused
    Reject,
}

impl HandlerOutcome {
    /// Whether this outcome takes over the response to a read.
    ///
    /// Reads carry a value, which only the handler can produce, so an accepted
    /// read is answered by the handler just like a deferred one.
    pub fn claims_read(&self) -> bool {
        matches!(self, HandlerOutcome::Deferred | HandlerOutcome::Accept)
    }

    /// Whether this outcome accepts a write. Writes are always answered by the
    /// coordinator, so a deferral counts as acceptance.
    pub fn accepts_write(&self) -> bool {
        matches!(self, HandlerOutcome::Accept | HandlerOutcome::Deferred)
    }
}

impl From<bool> for HandlerOutcome {
    fn from(handled: bool) -> Self {
        if handled {
            HandlerOutcome::Accept
        } else {
            HandlerOutcome::Unhandled
        }
    }
}

/// Per-service event callback.
///
/// Invoked with no session for service-level events (attribute table
/// created), and with the affected session for connect, disconnect, read and
/// write. The stack is handed in so a handler can answer reads directly.
pub trait ServiceHandler: Send {
    fn on_event(
        &mut self,
        session: Option<SessionRef<'_>>,
        event: &GattsEvent,
        stack: &mut dyn BleStack,
    ) -> HandlerOutcome;
}

struct FnHandler<F>(F);

impl<F> ServiceHandler for FnHandler<F>
where
    F: FnMut(Option<SessionRef<'_>>, &GattsEvent, &mut dyn BleStack) -> HandlerOutcome + Send,
{
    fn on_event(
        &mut self,
        session: Option<SessionRef<'_>>,
        event: &GattsEvent,
        stack: &mut dyn BleStack,
    ) -> HandlerOutcome {
        (self.0)(session, event, stack)
    }
}

/// Wrap a closure (and whatever context it captures) as a service handler
pub fn handler_fn<F>(f: F) -> Box<dyn ServiceHandler>
where
    F: FnMut(Option<SessionRef<'_>>, &GattsEvent, &mut dyn BleStack) -> HandlerOutcome
        + Send
        + 'static,
{
    Box::new(FnHandler(f))
}
