//! Automation events: what happened to a send request after the caller's
//! optimistic `true`.
//!
//! The bridge answers at launch time. Subscribers that care about the final
//! outcome listen for these events instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{EventId, RequestId};

/// UTC timestamp attached to events.
pub type Timestamp = DateTime<Utc>;

/// Why an attempt was abandoned without searching to exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    /// The platform unbound the automation service mid-attempt.
    ServiceLost,
    /// A queued request could not be launched once its turn came.
    LaunchFailed,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// The deep link was handed to the platform.
    Launched { link: String },
    /// The request is waiting for the current one to finish.
    Queued,
    /// The send control was clicked on the given attempt.
    Clicked { attempts: u32, strategy: String },
    /// Return navigation has been issued; the slot is free.
    Completed,
    /// No send control was found within the retry budget.
    GaveUp { attempts: u32 },
    /// The attempt ended early.
    Abandoned { reason: AbandonReason },
}

impl EventKind {
    /// Whether no further events will follow for the request.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::GaveUp { .. } | Self::Abandoned { .. }
        )
    }
}

/// An immutable record of a step in a send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationEvent {
    pub id: EventId,
    pub request_id: RequestId,
    #[serde(flatten)]
    pub kind: EventKind,
    pub timestamp: Timestamp,
}

impl AutomationEvent {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(request_id: RequestId, kind: EventKind) -> Self {
        Self {
            id: EventId::new(),
            request_id,
            kind,
            timestamp: Utc::now(),
        }
    }
}
