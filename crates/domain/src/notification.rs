//! UI-change notifications delivered by the platform's accessibility layer.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which aspect of the foreground UI changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A window opened, closed, or changed focus.
    WindowStateChanged,
    /// Content inside a window changed.
    WindowContentChanged,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WindowStateChanged => f.write_str("window_state_changed"),
            Self::WindowContentChanged => f.write_str("window_content_changed"),
        }
    }
}

/// A single UI-change notification. Not retained after handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiChangeNotification {
    pub source_package: String,
    pub kind: NotificationKind,
}

impl UiChangeNotification {
    #[must_use]
    pub fn new(source_package: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            source_package: source_package.into(),
            kind,
        }
    }
}

/// Subscription the automation service registers with the platform when it
/// connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only notifications from these packages are delivered.
    pub packages: Vec<String>,
    pub kinds: Vec<NotificationKind>,
    /// Platform-side debounce between consecutive notifications.
    pub notification_timeout: Duration,
    /// Ask the platform to populate view identifiers on nodes.
    pub report_view_ids: bool,
    /// Ask the platform to include nodes it considers unimportant.
    pub include_not_important_views: bool,
}

impl EventFilter {
    /// Filter for window-state and window-content changes of one package.
    #[must_use]
    pub fn for_package(package: impl Into<String>, notification_timeout: Duration) -> Self {
        Self {
            packages: vec![package.into()],
            kinds: vec![
                NotificationKind::WindowStateChanged,
                NotificationKind::WindowContentChanged,
            ],
            notification_timeout,
            report_view_ids: true,
            include_not_important_views: true,
        }
    }

    /// Whether this filter lets `notification` through.
    #[must_use]
    pub fn accepts(&self, notification: &UiChangeNotification) -> bool {
        self.kinds.contains(&notification.kind)
            && self
                .packages
                .iter()
                .any(|p| *p == notification.source_package)
    }
}
