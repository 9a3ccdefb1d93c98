//! Simulated accessibility host.

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use whatsend_app::ports::{AccessibilitySettings, AutomationHost};
use whatsend_domain::deep_link::DeepLink;
use whatsend_domain::error::HostError;
use whatsend_domain::notification::{EventFilter, NotificationKind, UiChangeNotification};
use whatsend_domain::ui_tree::{UiNode, UiTree};

use crate::screens;

/// How the simulated target app behaves once launched.
#[derive(Debug, Clone)]
pub struct TargetApp {
    pub package: String,
    /// Loading frames served before the conversation screen.
    pub loading_frames: usize,
    /// Conversation screen, rebuilt with the message from each deep link.
    pub chat_screen: fn(&str) -> UiTree,
}

impl TargetApp {
    #[must_use]
    pub fn whatsapp(loading_frames: usize) -> Self {
        Self {
            package: "com.whatsapp".to_string(),
            loading_frames,
            chat_screen: screens::chat_with_send_id,
        }
    }
}

impl Default for TargetApp {
    fn default() -> Self {
        Self::whatsapp(1)
    }
}

#[derive(Default)]
struct Recorded {
    launches: Vec<String>,
    clicks: Vec<String>,
    backs: usize,
    settings_opened: usize,
    filters: Vec<EventFilter>,
}

struct Platform {
    target: TargetApp,
    screen_width: u32,
    enabled_services: Option<String>,
    refuse_launch: bool,
    frames: VecDeque<UiTree>,
    current: Option<UiTree>,
    notifications: Option<mpsc::UnboundedSender<UiChangeNotification>>,
    recorded: Recorded,
}

/// A fake platform that plays both the accessibility service and the
/// target app.
///
/// Clones share state, so a test can keep one while the engine owns another.
#[derive(Clone)]
pub struct VirtualPlatform {
    platform: Arc<Mutex<Platform>>,
    live_snapshots: Arc<AtomicUsize>,
}

impl Default for VirtualPlatform {
    fn default() -> Self {
        Self::new(TargetApp::default())
    }
}

impl VirtualPlatform {
    #[must_use]
    pub fn new(target: TargetApp) -> Self {
        Self {
            platform: Arc::new(Mutex::new(Platform {
                target,
                screen_width: screens::SCREEN_WIDTH,
                enabled_services: None,
                refuse_launch: false,
                frames: VecDeque::new(),
                current: None,
                notifications: None,
                recorded: Recorded::default(),
            })),
            live_snapshots: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Platform> {
        self.platform
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ── Scripting ──────────────────────────────────────────────────

    /// Deliver UI-change notifications on `sender`.
    pub fn connect_notifications(&self, sender: mpsc::UnboundedSender<UiChangeNotification>) {
        self.lock().notifications = Some(sender);
    }

    /// Mark the automation service with `component` as enabled.
    pub fn enable_service(&self, component: &str) {
        let mut platform = self.lock();
        let services = match platform.enabled_services.take() {
            Some(existing) if !existing.is_empty() => format!("{existing}:{component}"),
            _ => component.to_string(),
        };
        platform.enabled_services = Some(services);
    }

    /// Replace the raw enabled-services setting.
    pub fn set_enabled_services(&self, services: Option<String>) {
        self.lock().enabled_services = services;
    }

    pub fn set_screen_width(&self, width: u32) {
        self.lock().screen_width = width;
    }

    /// Make the next launches fail.
    pub fn refuse_launches(&self, refuse: bool) {
        self.lock().refuse_launch = refuse;
    }

    /// Put `tree` in the foreground right away.
    pub fn show(&self, tree: UiTree) {
        let mut platform = self.lock();
        platform.frames.clear();
        platform.current = Some(tree);
    }

    /// Queue frames served by the following snapshots, one each.
    pub fn queue_frames(&self, frames: impl IntoIterator<Item = UiTree>) {
        self.lock().frames.extend(frames);
    }

    /// Simulate the target app emitting a notification. Dropped unless a
    /// registered filter accepts it.
    pub fn emit(&self, kind: NotificationKind) -> bool {
        let platform = self.lock();
        let notification = UiChangeNotification::new(platform.target.package.clone(), kind);
        emit_filtered(&platform, notification)
    }

    // ── Inspection ─────────────────────────────────────────────────

    #[must_use]
    pub fn launches(&self) -> Vec<String> {
        self.lock().recorded.launches.clone()
    }

    #[must_use]
    pub fn clicks(&self) -> Vec<String> {
        self.lock().recorded.clicks.clone()
    }

    #[must_use]
    pub fn back_navigations(&self) -> usize {
        self.lock().recorded.backs
    }

    #[must_use]
    pub fn settings_opened(&self) -> usize {
        self.lock().recorded.settings_opened
    }

    #[must_use]
    pub fn registered_filters(&self) -> Vec<EventFilter> {
        self.lock().recorded.filters.clone()
    }

    /// Snapshots handed out and not yet dropped.
    #[must_use]
    pub fn live_snapshots(&self) -> usize {
        self.live_snapshots.load(Ordering::SeqCst)
    }
}

fn emit_filtered(platform: &Platform, notification: UiChangeNotification) -> bool {
    let accepted = platform
        .recorded
        .filters
        .iter()
        .any(|filter| filter.accepts(&notification));
    if !accepted {
        return false;
    }
    match &platform.notifications {
        Some(sender) => sender.send(notification).is_ok(),
        None => false,
    }
}

/// Leased copy of the foreground window.
pub struct VirtualSnapshot {
    tree: UiTree,
    live: Arc<AtomicUsize>,
}

impl Deref for VirtualSnapshot {
    type Target = UiTree;

    fn deref(&self) -> &UiTree {
        &self.tree
    }
}

impl Drop for VirtualSnapshot {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AutomationHost for VirtualPlatform {
    type Snapshot = VirtualSnapshot;

    fn register_event_filter(&self, filter: &EventFilter) {
        tracing::debug!(packages = ?filter.packages, "event filter registered");
        self.lock().recorded.filters.push(filter.clone());
    }

    fn open_uri(&self, link: &DeepLink) -> Result<(), HostError> {
        let mut platform = self.lock();
        if platform.refuse_launch {
            return Err(HostError::Rejected(format!("no activity for {link}")));
        }
        tracing::debug!(%link, "virtual target app launched");
        platform.recorded.launches.push(link.to_string());

        let message = prefilled_text(link.as_str());
        let loading = platform.target.loading_frames;
        let chat = (platform.target.chat_screen)(&message);
        platform.frames = std::iter::repeat_with(screens::loading)
            .take(loading)
            .chain(std::iter::once(chat))
            .collect();
        platform.current = None;

        let notification = UiChangeNotification::new(
            platform.target.package.clone(),
            NotificationKind::WindowStateChanged,
        );
        emit_filtered(&platform, notification);
        Ok(())
    }

    fn active_window(&self) -> Option<VirtualSnapshot> {
        let mut platform = self.lock();
        if let Some(next) = platform.frames.pop_front() {
            platform.current = Some(next);
        }
        let tree = platform.current.clone()?;
        self.live_snapshots.fetch_add(1, Ordering::SeqCst);
        Some(VirtualSnapshot {
            tree,
            live: Arc::clone(&self.live_snapshots),
        })
    }

    fn screen_width(&self) -> u32 {
        self.lock().screen_width
    }

    fn perform_click(&self, node: &UiNode) -> bool {
        let description = node.describe();
        tracing::debug!(node = %description, clickable = node.clickable, "virtual click");
        self.lock().recorded.clicks.push(description);
        node.clickable
    }

    fn navigate_back(&self) -> bool {
        let mut platform = self.lock();
        platform.recorded.backs += 1;
        platform.frames.clear();
        platform.current = None;
        true
    }
}

impl AccessibilitySettings for VirtualPlatform {
    fn enabled_services(&self) -> Option<String> {
        self.lock().enabled_services.clone()
    }

    fn open_accessibility_settings(&self) -> Result<(), HostError> {
        self.lock().recorded.settings_opened += 1;
        Ok(())
    }
}

/// Decoded `text` query parameter of a chat link, or empty.
fn prefilled_text(link: &str) -> String {
    link.split_once("?text=")
        .and_then(|(_, encoded)| urlencoding::decode(encoded).ok())
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default()
}
