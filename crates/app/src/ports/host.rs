//! Host platform port: what a bound automation service can do.
//!
//! An implementation exists only while the platform keeps the automation
//! service bound. The engine holds it as an `Option` and degrades to
//! "cannot act" when it is gone.

use std::ops::Deref;

use whatsend_domain::deep_link::DeepLink;
use whatsend_domain::error::HostError;
use whatsend_domain::notification::EventFilter;
use whatsend_domain::ui_tree::{UiNode, UiTree};

/// Capabilities of a bound accessibility service.
pub trait AutomationHost {
    /// A leased snapshot of the active window.
    ///
    /// Dropping it returns the underlying nodes to the platform's pool, so
    /// callers keep it scoped to a single search cycle.
    type Snapshot: Deref<Target = UiTree>;

    /// Subscribe to UI-change notifications. Called once on connect.
    fn register_event_filter(&self, filter: &EventFilter);

    /// Open `link` as a new task.
    ///
    /// # Errors
    ///
    /// Returns [`HostError`] when the platform refuses to start the activity.
    fn open_uri(&self, link: &DeepLink) -> Result<(), HostError>;

    /// Snapshot the active window, if there is one.
    fn active_window(&self) -> Option<Self::Snapshot>;

    /// Current screen width in pixels.
    fn screen_width(&self) -> u32;

    /// Perform the primary (click) action on `node`. Returns whether the
    /// platform accepted the action.
    fn perform_click(&self, node: &UiNode) -> bool;

    /// Issue a global "back" navigation.
    fn navigate_back(&self) -> bool;
}
