//! # whatsend-domain
//!
//! Pure domain model for driving a messaging app through its accessibility
//! tree.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers and error conventions
//! - Normalize locally formatted **phone numbers** into international form
//! - Build the **deep link** that opens a prefilled chat in the target app
//! - Model **send requests** and the single-slot **automation state**
//! - Model **UI tree snapshots** and **UI-change notifications**
//! - Locate the **send control** with an ordered list of search strategies
//! - Define **automation events** (the observable outcome of an attempt)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;

pub mod automation;
pub mod deep_link;
pub mod event;
pub mod notification;
pub mod phone;
pub mod request;
pub mod search;
pub mod ui_tree;
