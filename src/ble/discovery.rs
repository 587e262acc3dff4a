//! Attribute discovery walker.
//!
//! A strictly sequential, forward-only walk over the peer's attribute
//! table:
//!
//! ```text
//! FindService -> FindNotifyChar -> FindWriteChar -> FindCccDescriptor -> Done
//!      \______________\________________\__________________\____> Aborted
//! ```
//!
//! Each phase issues exactly one range query. The next query starts one
//! past the handle of the previous match and always ends at 0xFFFF, so a
//! successful session costs four round trips and never revisits a handle.
//! An empty response aborts the session; nothing is retried.
//!
//! The session is a plain value: [`DiscoverySession::on_response`] takes
//! the response and returns the next [`Step`] without touching any
//! transport, so every transition is testable on its own.

use super::attribute::{Attribute, AttributeKind, DiscoverRequest, HandleRange};
use crate::config::CentralConfig;

/// Discovery phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    FindService,
    FindNotifyChar,
    FindWriteChar,
    FindCccDescriptor,
    Done,
    Aborted,
}

impl Phase {
    /// Successor on a match. Terminal phases map to themselves.
    pub fn next(self) -> Self {
        match self {
            Phase::FindService => Phase::FindNotifyChar,
            Phase::FindNotifyChar => Phase::FindWriteChar,
            Phase::FindWriteChar => Phase::FindCccDescriptor,
            Phase::FindCccDescriptor => Phase::Done,
            Phase::Done => Phase::Done,
            Phase::Aborted => Phase::Aborted,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Aborted)
    }
}

/// Handles captured by a completed session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResolvedHandles {
    pub notify_value_handle: u16,
    pub write_value_handle: u16,
    pub ccc_handle: u16,
}

/// What the owner must do after feeding a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// Issue this query next.
    Query(DiscoverRequest),
    /// Walk finished; subscribe with these handles.
    Complete(ResolvedHandles),
    /// Nothing found in the given phase; the session is dead.
    Abort(Phase),
    /// Response arrived after the session reached a terminal phase.
    Stale,
}

/// Mutable discovery state for one connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoverySession {
    targets: CentralConfig,
    phase: Phase,
    cursor: HandleRange,
    notify_value_handle: Option<u16>,
    write_value_handle: Option<u16>,
    ccc_handle: Option<u16>,
}

impl DiscoverySession {
    /// Fresh session in `FindService` over the full handle range.
    pub fn new(targets: CentralConfig) -> Self {
        Self {
            targets,
            phase: Phase::FindService,
            cursor: HandleRange::full(),
            notify_value_handle: None,
            write_value_handle: None,
            ccc_handle: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Range the current (or next) query covers.
    pub fn cursor(&self) -> HandleRange {
        self.cursor
    }

    pub fn notify_value_handle(&self) -> Option<u16> {
        self.notify_value_handle
    }

    pub fn write_value_handle(&self) -> Option<u16> {
        self.write_value_handle
    }

    pub fn ccc_handle(&self) -> Option<u16> {
        self.ccc_handle
    }

    /// The query for the current phase, `None` once terminal.
    pub fn request(&self) -> Option<DiscoverRequest> {
        let (kind, uuid) = match self.phase {
            Phase::FindService => (AttributeKind::PrimaryService, self.targets.service_uuid),
            Phase::FindNotifyChar => (AttributeKind::Characteristic, self.targets.notify_char_uuid),
            Phase::FindWriteChar => (AttributeKind::Characteristic, self.targets.write_char_uuid),
            Phase::FindCccDescriptor => (AttributeKind::Descriptor, self.targets.ccc_uuid),
            Phase::Done | Phase::Aborted => return None,
        };
        Some(DiscoverRequest {
            kind,
            uuid,
            range: self.cursor,
        })
    }

    /// Feed the single response of the current phase.
    pub fn on_response(&mut self, found: Option<Attribute>) -> Step {
        let phase = self.phase;
        if phase.is_terminal() {
            return Step::Stale;
        }

        let Some(attr) = found else {
            self.phase = Phase::Aborted;
            return Step::Abort(phase);
        };

        match phase {
            Phase::FindNotifyChar => self.notify_value_handle = Some(attr.value_handle),
            Phase::FindWriteChar => self.write_value_handle = Some(attr.value_handle),
            Phase::FindCccDescriptor => self.ccc_handle = Some(attr.handle),
            _ => {}
        }

        let next = phase.next();
        if next == Phase::Done {
            self.phase = Phase::Done;
            return match self.resolved() {
                Some(handles) => Step::Complete(handles),
                None => {
                    self.phase = Phase::Aborted;
                    Step::Abort(phase)
                }
            };
        }

        match HandleRange::after(attr.handle) {
            Some(range) => {
                self.cursor = range;
                self.phase = next;
                match self.request() {
                    Some(request) => Step::Query(request),
                    None => Step::Stale,
                }
            }
            None => {
                // Matched the last handle; nothing left for the next phase.
                self.phase = Phase::Aborted;
                Step::Abort(next)
            }
        }
    }

    /// Force the session into `Aborted`. Returns the phase it was in.
    pub fn abort(&mut self) -> Phase {
        let phase = self.phase;
        self.phase = Phase::Aborted;
        phase
    }

    /// All three handles, once the walk reached `Done`.
    pub fn resolved(&self) -> Option<ResolvedHandles> {
        if self.phase != Phase::Done {
            return None;
        }
        Some(ResolvedHandles {
            notify_value_handle: self.notify_value_handle?,
            write_value_handle: self.write_value_handle?,
            ccc_handle: self.ccc_handle?,
        })
    }
}
