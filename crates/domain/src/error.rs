//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors.
//! Nothing here is fatal to the host process: every failure degrades to
//! "no further action".

/// Top-level error for automation operations.
#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    /// No automation service instance is currently bound by the platform.
    #[error("automation service not ready")]
    ServiceNotReady,

    /// Another send is in flight and the request could not be queued.
    #[error("a send is already in flight")]
    Busy,

    /// The host platform refused to open the deep link.
    #[error("failed to launch target app")]
    Launch(#[source] HostError),
}

/// Failure reported by a host platform port.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The platform facility is not reachable right now.
    #[error("host facility unavailable")]
    Unavailable,

    /// The platform rejected the request.
    #[error("host rejected request: {0}")]
    Rejected(String),
}

/// Configuration and input invariants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Country code is empty.
    #[error("country code must not be empty")]
    EmptyCountryCode,

    /// Country code contains something other than ASCII digits.
    #[error("country code must contain only digits, got {0:?}")]
    NonDigitCountryCode(String),

    /// Target package name is empty.
    #[error("target package must not be empty")]
    EmptyPackage,

    /// Deep-link host is empty.
    #[error("link host must not be empty")]
    EmptyLinkHost,

    /// Right-edge fraction is outside `(0, 1)`.
    #[error("right edge fraction must be within (0, 1), got {0}")]
    FractionOutOfRange(f64),

    /// Retry budget of zero would never search.
    #[error("max retries must be at least 1")]
    ZeroRetries,
}
