//! # whatsend-app
//!
//! Application layer: the send automation engine and **port definitions**.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement:
//!   - `AutomationHost`: launch, UI snapshots, click, back navigation
//!   - `AccessibilitySettings`: enabled-services lookup, settings screen
//!   - `EventPublisher`: outcome events
//!   - `MessageDispatcher`: hand a send to the engine
//! - Run the **automation engine** (state machine) against a virtual clock,
//!   and drive it from a tokio task (`runtime`)
//! - Expose the **capability bridge** and its method-call dispatch
//! - Provide **in-process infrastructure** (outcome bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `whatsend-domain` only (plus `tokio` for channels and time).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod automation_engine;
pub mod config;
pub mod event_bus;
pub mod ports;
pub mod runtime;
pub mod scheduler;
pub mod services;
