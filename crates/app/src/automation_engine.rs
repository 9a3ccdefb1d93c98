//! Automation engine: the send state machine.
//!
//! The engine owns the single in-flight [`AutomationState`] and a virtual
//! clock. It reacts to three inputs:
//!
//! - [`send_message`](AutomationEngine::send_message) launches the target app
//! - [`handle_notification`](AutomationEngine::handle_notification) schedules
//!   a search once the target app shows UI activity
//! - [`advance_to`](AutomationEngine::advance_to) fires due timers: searches,
//!   retries, the post-click cleanup and the staggered back navigation
//!
//! A launch also arms an await timeout. If the target app stays silent
//! until it fires, the engine searches anyway, so every attempt ends in a
//! click, a give-up or an abandon within a bounded time.
//!
//! Every timer carries the generation of the attempt that scheduled it, so a
//! callback left over from an earlier attempt never acts on a newer one.

use std::time::Duration;

use serde::Serialize;

use whatsend_domain::automation::{AutomationState, MissOutcome, Phase};
use whatsend_domain::deep_link::DeepLink;
use whatsend_domain::error::AutomationError;
use whatsend_domain::event::{AbandonReason, AutomationEvent, EventKind};
use whatsend_domain::id::RequestId;
use whatsend_domain::notification::{EventFilter, UiChangeNotification};
use whatsend_domain::phone::PhoneNumber;
use whatsend_domain::request::SendRequest;
use whatsend_domain::search::{ControlLocator, ControlMatch, ScreenInfo};

use crate::config::{EngineConfig, OverlapPolicy};
use crate::ports::{AutomationHost, EventPublisher};
use crate::scheduler::Scheduler;

/// How a send request was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "request_id", rename_all = "snake_case")]
pub enum Submission {
    /// The deep link was handed to the platform.
    Launched(RequestId),
    /// The request waits for the in-flight one to finish.
    Queued(RequestId),
}

impl Submission {
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::Launched(id) | Self::Queued(id) => *id,
        }
    }
}

/// Point-in-time view of the engine, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub phase: Phase,
    pub pending: Option<RequestId>,
    pub retry_count: u32,
    pub queued: Option<RequestId>,
    pub host_attached: bool,
    pub returning: bool,
}

impl EngineStatus {
    /// Nothing in flight, nothing queued, no navigation outstanding.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.phase == Phase::Idle && self.queued.is_none() && !self.returning
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    AwaitTimeout { generation: u64 },
    Check { generation: u64 },
    Cleanup { generation: u64 },
    SecondBack { generation: u64 },
}

/// Single-instance send state machine.
pub struct AutomationEngine<H, P> {
    config: EngineConfig,
    locator: ControlLocator,
    host: Option<H>,
    publisher: P,
    state: AutomationState,
    queued: Option<SendRequest>,
    scheduler: Scheduler<Task>,
    generation: u64,
    returning: bool,
}

impl<H, P> AutomationEngine<H, P>
where
    H: AutomationHost,
    P: EventPublisher,
{
    /// Create an engine with no host attached.
    pub fn new(config: EngineConfig, publisher: P) -> Self {
        let locator = ControlLocator::from_config(&config.search);
        Self {
            config,
            locator,
            host: None,
            publisher,
            state: AutomationState::default(),
            queued: None,
            scheduler: Scheduler::new(),
            generation: 0,
            returning: false,
        }
    }

    /// Replace the search strategies.
    #[must_use]
    pub fn with_locator(mut self, locator: ControlLocator) -> Self {
        self.locator = locator;
        self
    }

    // ── Service lifecycle ──────────────────────────────────────────

    /// The platform bound the automation service.
    pub fn attach(&mut self, host: H) {
        let filter = EventFilter::for_package(
            self.config.target_package.clone(),
            self.config.timing.notification_timeout(),
        );
        host.register_event_filter(&filter);
        self.host = Some(host);
        tracing::info!(package = %self.config.target_package, "automation service connected");
    }

    /// The platform destroyed the automation service. Scheduled callbacks
    /// that fire afterwards abandon the attempt.
    pub fn detach(&mut self) -> Option<H> {
        tracing::info!("automation service destroyed");
        self.host.take()
    }

    #[must_use]
    pub fn host(&self) -> Option<&H> {
        self.host.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> &AutomationState {
        &self.state
    }

    #[must_use]
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            phase: self.state.phase(),
            pending: self.state.pending().map(|r| r.id),
            retry_count: self.state.retry_count(),
            queued: self.queued.as_ref().map(|r| r.id),
            host_attached: self.host.is_some(),
            returning: self.returning,
        }
    }

    // ── Clock ──────────────────────────────────────────────────────

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    /// When the next timer fires, if one is scheduled.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.scheduler.next_deadline()
    }

    /// Fire every timer due at or before `now`, in order.
    pub fn advance_to(&mut self, now: Duration) {
        while let Some(task) = self.scheduler.pop_due(now) {
            self.run(task);
        }
    }

    /// Advance the virtual clock by `delta`.
    pub fn advance_by(&mut self, delta: Duration) {
        self.advance_to(self.scheduler.now() + delta);
    }

    // ── Inputs ─────────────────────────────────────────────────────

    /// Start a send attempt.
    ///
    /// # Errors
    ///
    /// - [`AutomationError::ServiceNotReady`] when no host is attached; the
    ///   state is left untouched.
    /// - [`AutomationError::Busy`] when an attempt is in flight and the
    ///   overlap policy (or a full queue slot) refuses the request.
    /// - [`AutomationError::Launch`] when the platform refuses the deep link.
    pub fn send_message(
        &mut self,
        phone: &str,
        message: &str,
    ) -> Result<Submission, AutomationError> {
        if self.host.is_none() {
            tracing::warn!("send requested but automation service is not connected");
            return Err(AutomationError::ServiceNotReady);
        }

        let request = SendRequest::new(phone, message);
        if self.is_busy() {
            return self.enqueue(request);
        }
        self.launch(request)
    }

    /// React to a UI-change notification.
    ///
    /// Returns `true` when the notification scheduled a search.
    pub fn handle_notification(&mut self, notification: &UiChangeNotification) -> bool {
        if !self.state.awaiting_target_app()
            || notification.source_package != self.config.target_package
        {
            return false;
        }
        if !self.state.start_searching() {
            return false;
        }
        self.scheduler.cancel(|task| matches!(task, Task::AwaitTimeout { .. }));

        tracing::debug!(
            kind = %notification.kind,
            "target app activity, scheduling send-control search"
        );
        self.scheduler.schedule_after(
            self.config.timing.check_delay(),
            Task::Check {
                generation: self.generation,
            },
        );
        true
    }

    // ── Internals ──────────────────────────────────────────────────

    fn is_busy(&self) -> bool {
        !self.state.is_idle() || self.returning
    }

    fn enqueue(&mut self, request: SendRequest) -> Result<Submission, AutomationError> {
        if self.config.overlap == OverlapPolicy::Reject || self.queued.is_some() {
            tracing::warn!(policy = ?self.config.overlap, "send rejected, another send is in flight");
            return Err(AutomationError::Busy);
        }
        let id = request.id;
        tracing::info!(request_id = %id, "send queued behind in-flight attempt");
        self.queued = Some(request);
        self.publish(id, EventKind::Queued);
        Ok(Submission::Queued(id))
    }

    fn launch(&mut self, request: SendRequest) -> Result<Submission, AutomationError> {
        let host = self.host.as_ref().ok_or(AutomationError::ServiceNotReady)?;

        let phone = PhoneNumber::normalize(&request.phone, &self.config.country_code);
        let link = DeepLink::chat(&self.config.link_host, &phone, &request.message);
        host.open_uri(&link).map_err(|err| {
            tracing::warn!(%err, "platform refused to open deep link");
            AutomationError::Launch(err)
        })?;

        let id = request.id;
        tracing::info!(request_id = %id, %phone, "target app launch requested");
        self.generation += 1;
        self.state.begin(request);
        self.scheduler.schedule_after(
            self.config.timing.await_timeout(),
            Task::AwaitTimeout {
                generation: self.generation,
            },
        );
        self.publish(
            id,
            EventKind::Launched {
                link: link.to_string(),
            },
        );
        Ok(Submission::Launched(id))
    }

    fn run(&mut self, task: Task) {
        let current = self.generation;
        match task {
            Task::AwaitTimeout { generation }
                if generation == current && self.state.phase() == Phase::AwaitingTargetAppEvent =>
            {
                self.await_timed_out();
            }
            Task::Check { generation }
                if generation == current && self.state.phase() == Phase::SearchingForControl =>
            {
                self.check();
            }
            Task::Cleanup { generation }
                if generation == current && self.state.phase() == Phase::Confirming =>
            {
                self.cleanup();
            }
            Task::SecondBack { generation } if generation == current && self.returning => {
                self.second_back();
            }
            stale => tracing::trace!(?stale, current, "dropping stale timer"),
        }
    }

    fn await_timed_out(&mut self) {
        tracing::info!(
            timeout_ms = self.config.timing.await_timeout_ms,
            "no activity from target app, searching anyway"
        );
        if self.state.start_searching() {
            self.check();
        }
    }

    fn check(&mut self) {
        let Some(request_id) = self.state.pending().map(|r| r.id) else {
            return;
        };
        let Some(host) = self.host.as_ref() else {
            self.abandon(request_id, AbandonReason::ServiceLost);
            return;
        };

        let attempt = self.state.retry_count() + 1;
        let screen = ScreenInfo {
            width: host.screen_width(),
        };
        let clicked = match host.active_window() {
            Some(snapshot) => click_send_control(host, &self.locator, &snapshot, screen),
            None => {
                tracing::debug!(attempt, "no active window to search");
                None
            }
        };

        match clicked {
            Some(hit) => {
                tracing::info!(
                    request_id = %request_id,
                    attempt,
                    strategy = hit.strategy,
                    "send control clicked"
                );
                self.state.confirm();
                self.scheduler.schedule_after(
                    self.config.timing.cleanup_delay(),
                    Task::Cleanup {
                        generation: self.generation,
                    },
                );
                self.publish(
                    request_id,
                    EventKind::Clicked {
                        attempts: attempt,
                        strategy: hit.strategy.to_string(),
                    },
                );
            }
            None => match self.state.record_miss(self.config.timing.max_retries) {
                MissOutcome::Retry(misses) => {
                    tracing::debug!(
                        misses,
                        max = self.config.timing.max_retries,
                        "send control not found, retrying"
                    );
                    self.scheduler.schedule_after(
                        self.config.timing.check_delay(),
                        Task::Check {
                            generation: self.generation,
                        },
                    );
                }
                MissOutcome::GaveUp(attempts) => {
                    tracing::info!(request_id = %request_id, attempts, "max retries reached, giving up");
                    self.publish(request_id, EventKind::GaveUp { attempts });
                    self.launch_queued();
                }
            },
        }
    }

    fn cleanup(&mut self) {
        let Some(request) = self.state.reset() else {
            return;
        };

        match self.host.as_ref() {
            Some(host) => {
                host.navigate_back();
                self.returning = true;
                self.scheduler.schedule_after(
                    self.config.timing.back_stagger(),
                    Task::SecondBack {
                        generation: self.generation,
                    },
                );
                tracing::debug!(request_id = %request.id, "returning to caller");
            }
            None => {
                tracing::warn!(request_id = %request.id, "service gone, skipping return navigation");
            }
        }

        self.publish(request.id, EventKind::Completed);
        if !self.returning {
            self.launch_queued();
        }
    }

    fn second_back(&mut self) {
        self.returning = false;
        if let Some(host) = self.host.as_ref() {
            host.navigate_back();
        }
        self.launch_queued();
    }

    fn abandon(&mut self, request_id: RequestId, reason: AbandonReason) {
        tracing::warn!(request_id = %request_id, ?reason, "send attempt abandoned");
        self.state.reset();
        self.publish(request_id, EventKind::Abandoned { reason });
        self.launch_queued();
    }

    fn launch_queued(&mut self) {
        let Some(next) = self.queued.take() else {
            return;
        };
        let id = next.id;
        if let Err(err) = self.launch(next) {
            tracing::warn!(request_id = %id, %err, "queued send could not be launched");
            self.publish(
                id,
                EventKind::Abandoned {
                    reason: AbandonReason::LaunchFailed,
                },
            );
        }
    }

    fn publish(&self, request_id: RequestId, kind: EventKind) {
        self.publisher.publish(AutomationEvent::new(request_id, kind));
    }
}

/// Locate the send control in `snapshot` and click it.
///
/// Returns the match only when the platform accepted the click.
fn click_send_control<H: AutomationHost>(
    host: &H,
    locator: &ControlLocator,
    snapshot: &H::Snapshot,
    screen: ScreenInfo,
) -> Option<ControlMatch> {
    let hit = locator.locate(snapshot, screen)?;
    let node = snapshot.get(hit.node)?;
    if host.perform_click(node) {
        Some(hit)
    } else {
        tracing::warn!(node = %node.describe(), "platform refused click on send control");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::ops::Deref;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use whatsend_domain::error::HostError;
    use whatsend_domain::notification::NotificationKind;
    use whatsend_domain::ui_tree::{Rect, UiElement, UiNode, UiTree};

    // ── Fake host ──────────────────────────────────────────────────

    #[derive(Default)]
    struct HostLog {
        filters: Mutex<Vec<EventFilter>>,
        opened: Mutex<Vec<String>>,
        frames: Mutex<VecDeque<UiTree>>,
        fallback: Mutex<Option<UiTree>>,
        searches: AtomicUsize,
        live_snapshots: AtomicUsize,
        clicks: Mutex<Vec<String>>,
        backs: AtomicUsize,
        refuse_launch: Mutex<bool>,
    }

    #[derive(Clone, Default)]
    struct FakeHost(Arc<HostLog>);

    struct Lease {
        tree: UiTree,
        live: Arc<HostLog>,
    }

    impl Deref for Lease {
        type Target = UiTree;

        fn deref(&self) -> &UiTree {
            &self.tree
        }
    }

    impl Drop for Lease {
        fn drop(&mut self) {
            self.live.live_snapshots.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl FakeHost {
        fn showing(tree: UiTree) -> Self {
            let host = Self::default();
            *host.0.fallback.lock().unwrap() = Some(tree);
            host
        }

        fn with_frames(frames: Vec<UiTree>, fallback: UiTree) -> Self {
            let host = Self::showing(fallback);
            host.0.frames.lock().unwrap().extend(frames);
            host
        }

        fn opened(&self) -> Vec<String> {
            self.0.opened.lock().unwrap().clone()
        }

        fn clicks(&self) -> Vec<String> {
            self.0.clicks.lock().unwrap().clone()
        }

        fn searches(&self) -> usize {
            self.0.searches.load(Ordering::SeqCst)
        }

        fn backs(&self) -> usize {
            self.0.backs.load(Ordering::SeqCst)
        }

        fn live_snapshots(&self) -> usize {
            self.0.live_snapshots.load(Ordering::SeqCst)
        }
    }

    impl AutomationHost for FakeHost {
        type Snapshot = Lease;

        fn register_event_filter(&self, filter: &EventFilter) {
            self.0.filters.lock().unwrap().push(filter.clone());
        }

        fn open_uri(&self, link: &DeepLink) -> Result<(), HostError> {
            if *self.0.refuse_launch.lock().unwrap() {
                return Err(HostError::Rejected("no activity".to_string()));
            }
            self.0.opened.lock().unwrap().push(link.to_string());
            Ok(())
        }

        fn active_window(&self) -> Option<Lease> {
            self.0.searches.fetch_add(1, Ordering::SeqCst);
            let tree = self
                .0
                .frames
                .lock()
                .unwrap()
                .pop_front()
                .or_else(|| self.0.fallback.lock().unwrap().clone())?;
            self.0.live_snapshots.fetch_add(1, Ordering::SeqCst);
            Some(Lease {
                tree,
                live: Arc::clone(&self.0),
            })
        }

        fn screen_width(&self) -> u32 {
            1080
        }

        fn perform_click(&self, node: &UiNode) -> bool {
            self.0.clicks.lock().unwrap().push(node.describe());
            true
        }

        fn navigate_back(&self) -> bool {
            self.0.backs.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    // ── Spy publisher ──────────────────────────────────────────────

    #[derive(Default)]
    struct SpyPublisher {
        events: Mutex<Vec<AutomationEvent>>,
    }

    impl SpyPublisher {
        fn kinds(&self) -> Vec<EventKind> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.kind.clone())
                .collect()
        }
    }

    impl EventPublisher for SpyPublisher {
        fn publish(&self, event: AutomationEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    type Engine = AutomationEngine<FakeHost, Arc<SpyPublisher>>;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn chat_screen() -> UiTree {
        UiTree::from_element(
            UiElement::new("android.widget.FrameLayout")
                .bounds(Rect::new(0, 0, 1080, 2340))
                .child(
                    UiElement::new("android.widget.EditText")
                        .view_id("com.whatsapp:id/entry")
                        .text("hello"),
                )
                .child(
                    UiElement::new("android.widget.ImageButton")
                        .view_id("com.whatsapp:id/send")
                        .content_description("Send")
                        .clickable(true)
                        .bounds(Rect::new(950, 2200, 1060, 2310)),
                ),
        )
    }

    fn loading_screen() -> UiTree {
        UiTree::from_element(
            UiElement::new("android.widget.FrameLayout")
                .child(UiElement::new("android.widget.ProgressBar")),
        )
    }

    fn whatsapp_event() -> UiChangeNotification {
        UiChangeNotification::new("com.whatsapp", NotificationKind::WindowStateChanged)
    }

    fn engine_with(host: FakeHost, config: EngineConfig) -> (Engine, Arc<SpyPublisher>) {
        let spy = Arc::new(SpyPublisher::default());
        let mut engine = AutomationEngine::new(config, Arc::clone(&spy));
        engine.attach(host);
        (engine, spy)
    }

    fn engine(host: FakeHost) -> (Engine, Arc<SpyPublisher>) {
        engine_with(host, EngineConfig::default())
    }

    // ── Tests ──────────────────────────────────────────────────────

    #[test]
    fn should_register_event_filter_on_attach() {
        let host = FakeHost::default();
        let (_engine, _) = engine(host.clone());
        let filters = host.0.filters.lock().unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].packages, ["com.whatsapp"]);
        assert_eq!(filters[0].notification_timeout, ms(100));
        assert_eq!(filters[0].kinds.len(), 2);
    }

    #[test]
    fn should_fail_with_service_not_ready_when_detached() {
        let spy = Arc::new(SpyPublisher::default());
        let mut engine: Engine = AutomationEngine::new(EngineConfig::default(), spy.clone());

        let result = engine.send_message("0750 1234567", "hello");

        assert!(matches!(result, Err(AutomationError::ServiceNotReady)));
        assert_eq!(engine.state(), &AutomationState::default());
        assert!(spy.kinds().is_empty());
    }

    #[test]
    fn should_launch_deep_link_and_await_target_app() {
        let host = FakeHost::default();
        let (mut engine, spy) = engine(host.clone());

        let submission = engine.send_message("0750 1234567", "hello").unwrap();

        assert!(matches!(submission, Submission::Launched(_)));
        assert_eq!(
            host.opened(),
            ["https://wa.me/9647501234567?text=hello".to_string()]
        );
        assert_eq!(engine.state().phase(), Phase::AwaitingTargetAppEvent);
        assert!(engine.state().awaiting_target_app());
        assert_eq!(
            spy.kinds(),
            [EventKind::Launched {
                link: "https://wa.me/9647501234567?text=hello".to_string()
            }]
        );
    }

    #[test]
    fn should_leave_state_untouched_when_launch_is_refused() {
        let host = FakeHost::default();
        *host.0.refuse_launch.lock().unwrap() = true;
        let (mut engine, _) = engine(host);

        let result = engine.send_message("0750", "hi");

        assert!(matches!(result, Err(AutomationError::Launch(_))));
        assert!(engine.state().is_idle());
    }

    #[test]
    fn should_complete_full_send_cycle() {
        let host = FakeHost::showing(chat_screen());
        let (mut engine, spy) = engine(host.clone());

        engine.send_message("0750 1234567", "hello").unwrap();
        assert!(engine.handle_notification(&whatsapp_event()));
        assert_eq!(engine.state().phase(), Phase::SearchingForControl);

        engine.advance_by(ms(499));
        assert_eq!(host.searches(), 0);

        engine.advance_by(ms(1));
        assert_eq!(host.searches(), 1);
        assert_eq!(
            host.clicks(),
            ["android.widget.ImageButton[com.whatsapp:id/send]".to_string()]
        );
        assert_eq!(engine.state().phase(), Phase::Confirming);
        assert_eq!(host.backs(), 0);

        engine.advance_by(ms(500));
        assert_eq!(host.backs(), 1);
        assert!(engine.state().is_idle());
        assert!(engine.state().pending().is_none());

        engine.advance_by(ms(299));
        assert_eq!(host.backs(), 1);
        engine.advance_by(ms(1));
        assert_eq!(host.backs(), 2);

        assert_eq!(engine.state(), &AutomationState::default());
        assert_eq!(engine.next_deadline(), None);
        assert_eq!(host.live_snapshots(), 0);

        let kinds = spy.kinds();
        assert_eq!(kinds.len(), 3);
        assert_eq!(
            kinds[1],
            EventKind::Clicked {
                attempts: 1,
                strategy: "view_id".to_string()
            }
        );
        assert_eq!(kinds[2], EventKind::Completed);
    }

    #[test]
    fn should_give_up_after_exactly_max_retries_searches() {
        let host = FakeHost::showing(loading_screen());
        let (mut engine, spy) = engine(host.clone());

        engine.send_message("0750", "hi").unwrap();
        engine.handle_notification(&whatsapp_event());

        for expected in 1..=10 {
            engine.advance_by(ms(500));
            assert_eq!(host.searches(), expected);
        }
        assert!(engine.state().is_idle());
        assert!(engine.state().pending().is_none());
        assert_eq!(engine.state().retry_count(), 0);

        engine.advance_by(ms(10_000));
        assert_eq!(host.searches(), 10);
        assert!(host.clicks().is_empty());
        assert_eq!(host.backs(), 0);
        assert_eq!(host.live_snapshots(), 0);
        assert_eq!(
            spy.kinds().last(),
            Some(&EventKind::GaveUp { attempts: 10 })
        );
    }

    #[test]
    fn should_separate_retries_by_check_delay() {
        let host = FakeHost::showing(loading_screen());
        let (mut engine, _) = engine(host.clone());

        engine.send_message("0750", "hi").unwrap();
        engine.handle_notification(&whatsapp_event());
        engine.advance_by(ms(500));
        assert_eq!(engine.next_deadline(), Some(ms(1000)));
        engine.advance_by(ms(499));
        assert_eq!(host.searches(), 1);
        engine.advance_by(ms(1));
        assert_eq!(host.searches(), 2);
    }

    #[test]
    fn should_honour_configured_retry_budget() {
        let host = FakeHost::showing(loading_screen());
        let mut config = EngineConfig::default();
        config.timing.max_retries = 3;
        let (mut engine, _) = engine_with(host.clone(), config);

        engine.send_message("0750", "hi").unwrap();
        engine.handle_notification(&whatsapp_event());
        engine.advance_by(ms(60_000));

        assert_eq!(host.searches(), 3);
        assert!(engine.state().is_idle());
    }

    #[test]
    fn should_click_once_control_renders() {
        let host = FakeHost::with_frames(vec![loading_screen(), loading_screen()], chat_screen());
        let (mut engine, spy) = engine(host.clone());

        engine.send_message("0750", "hi").unwrap();
        engine.handle_notification(&whatsapp_event());
        engine.advance_by(ms(1500));

        assert_eq!(host.searches(), 3);
        assert_eq!(host.clicks().len(), 1);
        assert!(spy.kinds().contains(&EventKind::Clicked {
            attempts: 3,
            strategy: "view_id".to_string()
        }));
    }

    #[test]
    fn should_count_missing_window_as_miss() {
        let host = FakeHost::default();
        let (mut engine, _) = engine(host.clone());

        engine.send_message("0750", "hi").unwrap();
        engine.handle_notification(&whatsapp_event());
        engine.advance_by(ms(500));

        assert_eq!(engine.state().retry_count(), 1);
        assert_eq!(engine.state().phase(), Phase::SearchingForControl);
    }

    #[test]
    fn should_ignore_notifications_from_other_packages() {
        let host = FakeHost::showing(chat_screen());
        let (mut engine, _) = engine(host.clone());

        engine.send_message("0750", "hi").unwrap();
        let other = UiChangeNotification::new("com.android.chrome", NotificationKind::WindowStateChanged);
        assert!(!engine.handle_notification(&other));

        engine.advance_by(ms(4_999));
        assert_eq!(host.searches(), 0);
        assert_eq!(engine.state().retry_count(), 0);
        assert_eq!(engine.state().phase(), Phase::AwaitingTargetAppEvent);
    }

    #[test]
    fn should_ignore_notifications_while_idle() {
        let host = FakeHost::showing(chat_screen());
        let (mut engine, _) = engine(host.clone());

        assert!(!engine.handle_notification(&whatsapp_event()));
        engine.advance_by(ms(5_000));
        assert_eq!(host.searches(), 0);
    }

    #[test]
    fn should_coalesce_notification_bursts_into_one_search_chain() {
        let host = FakeHost::showing(loading_screen());
        let (mut engine, _) = engine(host.clone());

        engine.send_message("0750", "hi").unwrap();
        assert!(engine.handle_notification(&whatsapp_event()));
        for _ in 0..5 {
            let content = UiChangeNotification::new("com.whatsapp", NotificationKind::WindowContentChanged);
            assert!(!engine.handle_notification(&content));
        }
        engine.advance_by(ms(500));
        assert_eq!(host.searches(), 1);
    }

    #[test]
    fn should_not_search_again_while_confirming() {
        let host = FakeHost::showing(chat_screen());
        let (mut engine, _) = engine(host.clone());

        engine.send_message("0750", "hi").unwrap();
        engine.handle_notification(&whatsapp_event());
        engine.advance_by(ms(500));
        assert!(!engine.handle_notification(&whatsapp_event()));
        engine.advance_by(ms(2_000));
        assert_eq!(host.clicks().len(), 1);
    }

    #[test]
    fn should_abandon_when_service_detached_mid_retry() {
        let host = FakeHost::showing(loading_screen());
        let (mut engine, spy) = engine(host.clone());

        engine.send_message("0750", "hi").unwrap();
        engine.handle_notification(&whatsapp_event());
        engine.advance_by(ms(500));
        engine.detach();
        engine.advance_by(ms(500));

        assert_eq!(host.searches(), 1);
        assert!(engine.state().is_idle());
        assert_eq!(
            spy.kinds().last(),
            Some(&EventKind::Abandoned {
                reason: AbandonReason::ServiceLost
            })
        );
    }

    #[test]
    fn should_search_anyway_when_target_app_never_reports_activity() {
        let host = FakeHost::showing(chat_screen());
        let (mut engine, spy) = engine(host.clone());

        engine.send_message("0750", "hi").unwrap();
        engine.advance_by(ms(4_999));
        assert_eq!(host.searches(), 0);
        assert_eq!(engine.state().phase(), Phase::AwaitingTargetAppEvent);

        engine.advance_by(ms(1));
        assert_eq!(host.searches(), 1);
        assert_eq!(host.clicks().len(), 1);

        engine.advance_by(ms(800));
        assert_eq!(host.backs(), 2);
        assert!(engine.status().is_settled());
        assert_eq!(spy.kinds().last(), Some(&EventKind::Completed));
    }

    #[test]
    fn should_give_up_and_launch_queued_request_when_target_app_stays_silent() {
        let host = FakeHost::showing(loading_screen());
        let (mut engine, spy) = engine(host.clone());

        engine.send_message("0750", "first").unwrap();
        let second = engine.send_message("0751", "second").unwrap();
        assert!(matches!(second, Submission::Queued(_)));
        assert!(matches!(
            engine.send_message("0752", "third"),
            Err(AutomationError::Busy)
        ));

        // 5 s await timeout, then ten searches 500 ms apart; the first runs
        // as soon as the timeout fires.
        engine.advance_by(ms(5_000 + 9 * 500));

        assert_eq!(host.searches(), 10);
        assert!(spy.kinds().contains(&EventKind::GaveUp { attempts: 10 }));
        assert_eq!(host.opened().len(), 2);
        assert_eq!(engine.state().pending().unwrap().id, second.request_id());

        engine.advance_by(ms(60_000));
        assert!(engine.status().is_settled());
        assert_eq!(host.searches(), 20);
        assert!(engine.send_message("0752", "third").is_ok());
    }

    #[test]
    fn should_abandon_when_service_detached_before_first_notification() {
        let host = FakeHost::showing(chat_screen());
        let (mut engine, spy) = engine(host.clone());

        engine.send_message("0750", "hi").unwrap();
        engine.detach();
        engine.advance_by(ms(5_000));

        assert_eq!(host.searches(), 0);
        assert!(host.clicks().is_empty());
        assert!(engine.status().is_settled());
        assert_eq!(engine.next_deadline(), None);
        assert_eq!(
            spy.kinds().last(),
            Some(&EventKind::Abandoned {
                reason: AbandonReason::ServiceLost
            })
        );
    }

    #[test]
    fn should_cancel_await_timeout_once_target_app_reports_activity() {
        let host = FakeHost::showing(chat_screen());
        let (mut engine, _) = engine(host);

        engine.send_message("0750", "hi").unwrap();
        assert_eq!(engine.next_deadline(), Some(ms(5_000)));

        engine.handle_notification(&whatsapp_event());
        assert_eq!(engine.next_deadline(), Some(ms(500)));

        engine.advance_by(ms(1_300));
        assert_eq!(engine.next_deadline(), None);
    }

    #[test]
    fn should_complete_without_navigation_when_detached_while_confirming() {
        let host = FakeHost::showing(chat_screen());
        let (mut engine, spy) = engine(host.clone());

        engine.send_message("0750", "hi").unwrap();
        engine.handle_notification(&whatsapp_event());
        engine.advance_by(ms(500));
        engine.detach();
        engine.advance_by(ms(1_000));

        assert_eq!(host.backs(), 0);
        assert!(engine.state().is_idle());
        assert_eq!(spy.kinds().last(), Some(&EventKind::Completed));
    }

    #[test]
    fn should_queue_overlapping_request_and_launch_after_return() {
        let host = FakeHost::showing(chat_screen());
        let (mut engine, spy) = engine(host.clone());

        engine.send_message("0750", "first").unwrap();
        let second = engine.send_message("0751", "second").unwrap();
        assert!(matches!(second, Submission::Queued(_)));
        assert_eq!(host.opened().len(), 1);
        assert_eq!(engine.state().pending().unwrap().message, "first");

        engine.handle_notification(&whatsapp_event());
        engine.advance_by(ms(500 + 500 + 299));
        assert_eq!(host.opened().len(), 1);

        engine.advance_by(ms(1));
        assert_eq!(host.backs(), 2);
        assert_eq!(host.opened().len(), 2);
        assert!(host.opened()[1].ends_with("?text=second"));
        assert_eq!(engine.state().pending().unwrap().id, second.request_id());
        assert!(spy.kinds().contains(&EventKind::Queued));
    }

    #[test]
    fn should_reject_third_request_when_queue_slot_full() {
        let host = FakeHost::default();
        let (mut engine, _) = engine(host);

        engine.send_message("0750", "first").unwrap();
        engine.send_message("0751", "second").unwrap();
        let third = engine.send_message("0752", "third");

        assert!(matches!(third, Err(AutomationError::Busy)));
    }

    #[test]
    fn should_reject_overlap_under_reject_policy() {
        let host = FakeHost::default();
        let config = EngineConfig {
            overlap: OverlapPolicy::Reject,
            ..EngineConfig::default()
        };
        let (mut engine, _) = engine_with(host.clone(), config);

        engine.send_message("0750", "first").unwrap();
        let second = engine.send_message("0751", "second");

        assert!(matches!(second, Err(AutomationError::Busy)));
        assert_eq!(engine.state().pending().unwrap().message, "first");
        assert_eq!(host.opened().len(), 1);
    }

    #[test]
    fn should_launch_queued_request_after_give_up() {
        let host = FakeHost::showing(loading_screen());
        let (mut engine, _) = engine(host.clone());

        engine.send_message("0750", "first").unwrap();
        engine.send_message("0751", "second").unwrap();
        engine.handle_notification(&whatsapp_event());
        engine.advance_by(ms(5_000));

        assert_eq!(host.opened().len(), 2);
        assert_eq!(engine.state().phase(), Phase::AwaitingTargetAppEvent);
        assert_eq!(engine.state().pending().unwrap().message, "second");
    }

    #[test]
    fn should_drop_stale_timers_from_previous_attempt() {
        let host = FakeHost::showing(loading_screen());
        let (mut engine, _) = engine(host.clone());

        engine.send_message("0750", "first").unwrap();
        engine.handle_notification(&whatsapp_event());
        engine.advance_by(ms(5_000));
        assert!(engine.state().is_idle());

        engine.send_message("0751", "second").unwrap();
        engine.advance_by(ms(4_999));
        assert_eq!(host.searches(), 10);
        assert_eq!(engine.state().phase(), Phase::AwaitingTargetAppEvent);
    }

    #[test]
    fn should_report_status() {
        let host = FakeHost::default();
        let (mut engine, _) = engine(host);

        let launched = engine.send_message("0750", "first").unwrap();
        let queued = engine.send_message("0751", "second").unwrap();
        let status = engine.status();

        assert_eq!(status.phase, Phase::AwaitingTargetAppEvent);
        assert_eq!(status.pending, Some(launched.request_id()));
        assert_eq!(status.queued, Some(queued.request_id()));
        assert!(status.host_attached);
        assert!(!status.returning);
        assert!(!status.is_settled());
    }

    #[test]
    fn should_settle_only_after_second_back() {
        let host = FakeHost::showing(chat_screen());
        let (mut engine, _) = engine(host);

        assert!(engine.status().is_settled());
        engine.send_message("0750", "hi").unwrap();
        engine.handle_notification(&whatsapp_event());
        engine.advance_by(ms(1_000));
        assert!(engine.state().is_idle());
        assert!(!engine.status().is_settled());

        engine.advance_by(ms(300));
        assert!(engine.status().is_settled());
    }

    #[test]
    fn should_use_custom_locator() {
        let host = FakeHost::showing(chat_screen());
        let (engine, _) = engine(host.clone());
        let mut engine = engine.with_locator(ControlLocator::empty());

        engine.send_message("0750", "hi").unwrap();
        engine.handle_notification(&whatsapp_event());
        engine.advance_by(ms(500));

        assert!(host.clicks().is_empty());
        assert_eq!(engine.state().retry_count(), 1);
    }
}
