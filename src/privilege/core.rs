use std::collections::HashSet;

use crate::ports::{PrivilegeId, PrivilegeService};

/// Acquisition state for the set of required privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrivilegeState {
    Off,
    Started,
    Requested,
    Granted,
    Denied,
}

/// The only legal transitions. Everything the gate does is one of these
/// edges; `edge_allowed` is the single source of truth the property test
/// checks against.
///
/// - enable:  Off → Started
/// - request: Started → Requested, or Started → Denied on enqueue failure
/// - resolve: Requested → Granted | Denied
/// - pause:   any non-Off state → Started (grants cleared)
/// - disable: any non-Off state → Off
const ALLOWED_EDGES: &[(PrivilegeState, PrivilegeState)] = &[
    (PrivilegeState::Off, PrivilegeState::Started),
    (PrivilegeState::Started, PrivilegeState::Requested),
    (PrivilegeState::Started, PrivilegeState::Denied),
    (PrivilegeState::Requested, PrivilegeState::Granted),
    (PrivilegeState::Requested, PrivilegeState::Denied),
    (PrivilegeState::Started, PrivilegeState::Started),
    (PrivilegeState::Requested, PrivilegeState::Started),
    (PrivilegeState::Granted, PrivilegeState::Started),
    (PrivilegeState::Denied, PrivilegeState::Started),
    (PrivilegeState::Started, PrivilegeState::Off),
    (PrivilegeState::Requested, PrivilegeState::Off),
    (PrivilegeState::Granted, PrivilegeState::Off),
    (PrivilegeState::Denied, PrivilegeState::Off),
];

pub fn edge_allowed(from: PrivilegeState, to: PrivilegeState) -> bool {
    ALLOWED_EDGES.contains(&(from, to))
}

/// Drives the required privileges from `Off` to a `Granted`/`Denied` outcome.
///
/// Waiting is state, not a blocked call: the owner calls [`PrivilegeGate::tick`]
/// once per frame and the Requested → Granted transition lands on whatever
/// tick follows the last grant. A single denial is terminal for the session
/// even when other identifiers already succeeded.
pub struct PrivilegeGate {
    service: Box<dyn PrivilegeService>,
    required: Vec<PrivilegeId>,
    granted: HashSet<PrivilegeId>,
    state: PrivilegeState,
}

impl PrivilegeGate {
    pub fn new(service: impl PrivilegeService + 'static, required: Vec<PrivilegeId>) -> Self {
        Self {
            service: Box::new(service),
            required,
            granted: HashSet::new(),
            state: PrivilegeState::Off,
        }
    }

    pub fn state(&self) -> PrivilegeState {
        self.state
    }

    pub fn granted_ids(&self) -> &HashSet<PrivilegeId> {
        &self.granted
    }

    fn transition(&mut self, to: PrivilegeState) -> bool {
        if !edge_allowed(self.state, to) {
            return false;
        }
        self.state = to;
        true
    }

    /// Start the privilege subsystem. Failure is fatal for this instance:
    /// the gate stays `Off` and the owning feature should disable itself.
    pub fn enable(&mut self) -> bool {
        if self.state != PrivilegeState::Off {
            return true;
        }
        if !self.service.start() {
            return false;
        }
        self.transition(PrivilegeState::Started)
    }

    /// Advance the state machine by one poll. Idempotent in the terminal
    /// states.
    pub fn tick(&mut self) {
        match self.state {
            PrivilegeState::Started => self.issue_requests(),
            PrivilegeState::Requested => self.poll_outcomes(),
            PrivilegeState::Off | PrivilegeState::Granted | PrivilegeState::Denied => {}
        }
    }

    /// Grants do not survive a suspend: clear them and fall back to
    /// `Started` so the next tick re-requests everything.
    pub fn pause(&mut self) {
        if self.state == PrivilegeState::Off {
            return;
        }
        self.granted.clear();
        self.transition(PrivilegeState::Started);
    }

    /// Stop the subsystem and return to `Off`.
    pub fn disable(&mut self) {
        if self.state == PrivilegeState::Off {
            return;
        }
        self.service.stop();
        self.granted.clear();
        self.transition(PrivilegeState::Off);
    }

    fn issue_requests(&mut self) {
        for id in &self.required {
            if !self.service.request(id) {
                self.transition(PrivilegeState::Denied);
                return;
            }
        }
        self.transition(PrivilegeState::Requested);
    }

    fn poll_outcomes(&mut self) {
        for update in self.service.poll_updates() {
            if update.granted {
                self.granted.insert(update.id);
            } else {
                self.transition(PrivilegeState::Denied);
            }
        }

        if self.state != PrivilegeState::Requested {
            return;
        }

        // Membership poll, not completion order: the grant lands on whatever
        // tick follows the last success.
        if self.required.iter().all(|id| self.granted.contains(id)) {
            self.transition(PrivilegeState::Granted);
        }
    }
}
