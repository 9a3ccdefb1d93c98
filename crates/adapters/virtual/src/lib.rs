//! # whatsend-adapter-virtual
//!
//! Simulated accessibility platform for testing and demonstration.
//!
//! [`VirtualPlatform`] stands in for both sides of the real device:
//!
//! | Role | Behaviour |
//! |------|-----------|
//! | Accessibility service | Records launches, clicks and back navigations; leases snapshots and counts the live ones |
//! | Target app | Serves loading frames then a conversation screen after each launch; emits a window-state notification |
//! | Settings | Holds the enabled-services string; counts settings-screen requests |
//!
//! Canned target-app screens live in [`screens`].
//!
//! ## Dependency rule
//!
//! Depends on `whatsend-app` (port traits) and `whatsend-domain` only.

mod platform;
pub mod screens;

pub use platform::{TargetApp, VirtualPlatform, VirtualSnapshot};
