//! Automation state: the single in-flight send slot.
//!
//! Invariants enforced by the methods on [`AutomationState`]:
//! - `awaiting_target_app` implies `pending.is_some()`
//! - `retry_count` is zero whenever `awaiting_target_app` is false
//! - back in [`Phase::Idle`], `pending` is `None` and `retry_count` is zero

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::request::SendRequest;

/// Where the state machine currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No pending request.
    #[default]
    Idle,
    /// Launch requested; waiting for the target app to report UI activity.
    AwaitingTargetAppEvent,
    /// A search is scheduled or running.
    SearchingForControl,
    /// Control clicked; waiting to navigate back.
    Confirming,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::AwaitingTargetAppEvent => f.write_str("awaiting_target_app_event"),
            Self::SearchingForControl => f.write_str("searching_for_control"),
            Self::Confirming => f.write_str("confirming"),
        }
    }
}

/// Outcome of recording a search miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissOutcome {
    /// Budget left; try again. Carries the number of misses so far.
    Retry(u32),
    /// Budget exhausted after this many misses; the state is already reset.
    GaveUp(u32),
}

/// The single in-flight automation slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationState {
    pending: Option<SendRequest>,
    awaiting_target_app: bool,
    retry_count: u32,
    phase: Phase,
}

impl AutomationState {
    #[must_use]
    pub fn pending(&self) -> Option<&SendRequest> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn awaiting_target_app(&self) -> bool {
        self.awaiting_target_app
    }

    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Take ownership of a request and wait for the target app.
    pub fn begin(&mut self, request: SendRequest) {
        self.pending = Some(request);
        self.awaiting_target_app = true;
        self.retry_count = 0;
        self.phase = Phase::AwaitingTargetAppEvent;
    }

    /// A relevant notification arrived; a search is now scheduled.
    ///
    /// Returns `false` (and changes nothing) unless the machine was waiting
    /// for the target app.
    pub fn start_searching(&mut self) -> bool {
        if self.phase != Phase::AwaitingTargetAppEvent || !self.awaiting_target_app {
            return false;
        }
        self.phase = Phase::SearchingForControl;
        true
    }

    /// Record a failed search against a budget of `max_retries` attempts.
    pub fn record_miss(&mut self, max_retries: u32) -> MissOutcome {
        self.retry_count += 1;
        let misses = self.retry_count;
        if misses >= max_retries {
            self.reset();
            MissOutcome::GaveUp(misses)
        } else {
            MissOutcome::Retry(misses)
        }
    }

    /// The control was clicked; the request stays pending until cleanup.
    pub fn confirm(&mut self) {
        self.phase = Phase::Confirming;
    }

    /// Clear everything and return to [`Phase::Idle`], yielding the request
    /// that was pending.
    pub fn reset(&mut self) -> Option<SendRequest> {
        self.awaiting_target_app = false;
        self.retry_count = 0;
        self.phase = Phase::Idle;
        self.pending.take()
    }
}
