//! Explicit worker lifecycle state machine (spec §4.2), kept as a lookup
//! table plus a manager per the teacher's and spec's shared preference
//! (spec §9): it makes the transition invariant machine-checkable and the
//! tests trivial.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Idle,
    Busy,
    Error,
    Stopped,
}

#[derive(Debug, Error)]
#[error("illegal worker state transition: {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: WorkerState,
    pub to: WorkerState,
}

/// `✓`/`✗`/`=` transition table from spec §4.2.
fn allowed(from: WorkerState, to: WorkerState) -> bool {
    use WorkerState::*;
    match (from, to) {
        (Idle, Idle) | (Busy, Busy) | (Error, Error) | (Stopped, Stopped) => true,
        (Idle, Busy) | (Idle, Error) | (Idle, Stopped) => true,
        (Busy, Idle) | (Busy, Error) | (Busy, Stopped) => true,
        (Error, Idle) | (Error, Stopped) => true,
        (Error, Busy) => false,
        (Stopped, Idle) | (Stopped, Error) => true,
        (Stopped, Busy) => false,
    }
}

/// Owns the current `WorkerState` for one Worker. Initial state: `stopped`.
#[derive(Debug)]
pub struct WorkerStatusManager {
    state: WorkerState,
}

impl WorkerStatusManager {
    pub fn new() -> Self {
        Self {
            state: WorkerState::Stopped,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Applies `to`, raising loudly on a transition absent from the table.
    pub fn transition(&mut self, to: WorkerState) -> Result<(), IllegalTransition> {
        if !allowed(self.state, to) {
            return Err(IllegalTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    pub fn can_process(&self) -> bool {
        self.state == WorkerState::Idle
    }

    pub fn healthy(&self) -> bool {
        matches!(self.state, WorkerState::Idle | WorkerState::Busy)
    }
}

impl Default for WorkerStatusManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use WorkerState::*;

    #[test]
    fn initial_state_is_stopped() {
        assert_eq!(WorkerStatusManager::new().state(), Stopped);
    }

    #[test]
    fn self_transition_is_a_no_op() {
        let mut mgr = WorkerStatusManager::new();
        mgr.transition(Idle).unwrap();
        mgr.transition(Idle).unwrap();
        assert_eq!(mgr.state(), Idle);
    }

    #[test]
    fn error_to_busy_is_rejected() {
        let mut mgr = WorkerStatusManager::new();
        mgr.transition(Idle).unwrap();
        mgr.transition(Error).unwrap();
        assert!(mgr.transition(Busy).is_err());
        assert_eq!(mgr.state(), Error);
    }

    #[test]
    fn stopped_to_busy_is_rejected() {
        let mut mgr = WorkerStatusManager::new();
        assert!(mgr.transition(Busy).is_err());
        assert_eq!(mgr.state(), Stopped);
    }

    #[test]
    fn every_accepted_transition_matches_the_table() {
        let states = [Idle, Busy, Error, Stopped];
        for &from in &states {
            for &to in &states {
                let mut mgr = WorkerStatusManager::new();
                mgr.state = from;
                let result = mgr.transition(to);
                assert_eq!(result.is_ok(), allowed(from, to));
            }
        }
    }

    #[test]
    fn can_process_and_healthy_predicates() {
        let mut mgr = WorkerStatusManager::new();
        mgr.transition(Idle).unwrap();
        assert!(mgr.can_process());
        assert!(mgr.healthy());
        mgr.transition(Busy).unwrap();
        assert!(!mgr.can_process());
        assert!(mgr.healthy());
        mgr.transition(Error).unwrap();
        assert!(!mgr.can_process());
        assert!(!mgr.healthy());
    }
}
