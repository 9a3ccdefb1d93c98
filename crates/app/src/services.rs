//! Application services: the inbound side of the core.
//!
//! Services take port implementations through generic parameters
//! (constructor injection), so they never know which platform they run on.

pub mod bridge_service;
pub mod method_channel;
