//! Response Coordinator
//!
//! A request that needs a reply yields a `ResponseObligation`. Settling it
//! consumes the obligation, so the coordinator can answer a request at most
//! once; the dispatcher settles every obligation it creates.

use super::event::{ConnId, GattIf, ReadParams, TransId, WriteParams};
use super::handler::HandlerOutcome;
use super::stack::BleStack;
use crate::att::GattStatus;
use log::{debug, error};

/// Kind of request a response is owed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Read,
    Write,
}

impl RequestKind {
    /// Whether a handler outcome claims the request
    pub fn claimed_by(&self, outcome: HandlerOutcome) -> bool {
        match self {
            RequestKind::Read => outcome.claims_read(),
            RequestKind::Write => outcome.accepts_write(),
        }
    }

    /// Status sent when no handler claims the request
    pub fn denial(&self) -> GattStatus {
        match self {
            RequestKind::Read => GattStatus::ReadNotPermitted,
            RequestKind::Write => GattStatus::WriteNotPermitted,
        }
    }
}

/// A reply owed to the peer for one request
#[must_use = "every request that needs a response must be settled"]
#[derive(Debug, PartialEq, Eq)]
pub struct ResponseObligation {
    gatt_if: GattIf,
    conn_id: ConnId,
    trans_id: TransId,
    kind: RequestKind,
}

impl ResponseObligation {
    /// Obligation for a read, or `None` if the peer expects no reply
    pub fn for_read(gatt_if: GattIf, p: &ReadParams) -> Option<Self> {
        p.need_rsp.then_some(Self {
            gatt_if,
            conn_id: p.conn_id,
            trans_id: p.trans_id,
            kind: RequestKind::Read,
        })
    }

    /// Obligation for a write, or `None` if the peer expects no reply
    pub fn for_write(gatt_if: GattIf, p: &WriteParams) -> Option<Self> {
        p.need_rsp.then_some(Self {
            gatt_if,
            conn_id: p.conn_id,
            trans_id: p.trans_id,
            kind: RequestKind::Write,
        })
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Produce the single response for this request.
    ///
    /// Writes are always answered here: success if any handler accepted,
    /// "write not permitted" otherwise. Reads are answered here only when no
    /// handler claimed them; a claiming handler has already responded.
    /// Returns the status sent, if any.
    pub fn settle(self, stack: &mut dyn BleStack, claimed: bool) -> Option<GattStatus> {
        let status = match (self.kind, claimed) {
            (RequestKind::Read, true) => {
                debug!("tid 0x{:08x}: response sent by handler", self.trans_id);
                return None;
            }
            (RequestKind::Write, true) => GattStatus::Ok,
            (kind, false) => kind.denial(),
        };
        if let Err(e) = stack.send_response(self.gatt_if, self.conn_id, self.trans_id, status, None) {
            error!(
                "Failed to send response cid {} tid 0x{:08x}: {}",
                self.conn_id, self.trans_id, e
            );
        }
        Some(status)
    }
}
