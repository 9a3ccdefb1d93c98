//! Engine runtime: drives an [`AutomationEngine`] from a tokio task.
//!
//! The engine itself is synchronous and owns a virtual clock. The runtime
//! serialises every input through one command channel and maps tokio time
//! onto that clock, so timers, notifications and send requests are handled
//! one at a time in deadline order.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use whatsend_domain::error::AutomationError;
use whatsend_domain::notification::UiChangeNotification;

use crate::automation_engine::{AutomationEngine, EngineStatus, Submission};
use crate::ports::{AutomationHost, EventPublisher, MessageDispatcher};

type SendReply = oneshot::Sender<Result<Submission, AutomationError>>;

enum Command<H> {
    Send {
        phone: String,
        message: String,
        reply: SendReply,
    },
    Notify(UiChangeNotification),
    Attach(H),
    Detach,
    Status(oneshot::Sender<EngineStatus>),
}

/// Cloneable handle to a running engine.
///
/// The engine task stops once every handle is dropped.
pub struct EngineHandle<H> {
    commands: mpsc::UnboundedSender<Command<H>>,
}

impl<H> Clone for EngineHandle<H> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
        }
    }
}

impl<H> EngineHandle<H>
where
    H: AutomationHost + Send + 'static,
{
    /// Move `engine` onto a tokio task and return a handle to it.
    pub fn spawn<P>(engine: AutomationEngine<H, P>) -> (Self, JoinHandle<()>)
    where
        P: EventPublisher + Send + 'static,
    {
        let (commands, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(engine, receiver));
        (Self { commands }, task)
    }

    /// Forward a UI-change notification. Returns `false` once the engine
    /// task has stopped.
    pub fn notify(&self, notification: UiChangeNotification) -> bool {
        self.commands.send(Command::Notify(notification)).is_ok()
    }

    /// Hand the platform service to the engine.
    pub fn attach(&self, host: H) -> bool {
        self.commands.send(Command::Attach(host)).is_ok()
    }

    /// The platform service went away.
    pub fn detach(&self) -> bool {
        self.commands.send(Command::Detach).is_ok()
    }

    /// Current engine status, or `None` when the engine task has stopped.
    pub async fn status(&self) -> Option<EngineStatus> {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::Status(reply)).ok()?;
        response.await.ok()
    }
}

impl<H> MessageDispatcher for EngineHandle<H>
where
    H: AutomationHost + Send + 'static,
{
    fn send_message(
        &self,
        phone: String,
        message: String,
    ) -> impl Future<Output = Result<Submission, AutomationError>> + Send {
        let (reply, response) = oneshot::channel();
        let delivered = self
            .commands
            .send(Command::Send {
                phone,
                message,
                reply,
            })
            .is_ok();
        async move {
            if !delivered {
                return Err(AutomationError::ServiceNotReady);
            }
            response
                .await
                .unwrap_or(Err(AutomationError::ServiceNotReady))
        }
    }
}

async fn run<H, P>(mut engine: AutomationEngine<H, P>, mut commands: mpsc::UnboundedReceiver<Command<H>>)
where
    H: AutomationHost,
    P: EventPublisher,
{
    let origin = Instant::now();
    tracing::debug!("automation engine started");

    loop {
        let deadline = engine.next_deadline().map(|due| origin + due);
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                engine.advance_to(elapsed_since(origin));
                apply(&mut engine, command);
            }
            () = wait_until(deadline) => {
                engine.advance_to(elapsed_since(origin));
            }
        }
    }

    tracing::debug!("automation engine stopped, all handles dropped");
}

fn apply<H, P>(engine: &mut AutomationEngine<H, P>, command: Command<H>)
where
    H: AutomationHost,
    P: EventPublisher,
{
    match command {
        Command::Send {
            phone,
            message,
            reply,
        } => {
            let result = engine.send_message(&phone, &message);
            if reply.send(result).is_err() {
                tracing::debug!("send caller went away before the reply");
            }
        }
        Command::Notify(notification) => {
            engine.handle_notification(&notification);
        }
        Command::Attach(host) => engine.attach(host),
        Command::Detach => {
            engine.detach();
        }
        Command::Status(reply) => {
            let _ = reply.send(engine.status());
        }
    }
}

fn elapsed_since(origin: Instant) -> Duration {
    Instant::now().saturating_duration_since(origin)
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::Deref;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use whatsend_domain::automation::Phase;
    use whatsend_domain::deep_link::DeepLink;
    use whatsend_domain::error::HostError;
    use whatsend_domain::event::{AbandonReason, EventKind};
    use whatsend_domain::notification::{EventFilter, NotificationKind};
    use whatsend_domain::ui_tree::{Rect, UiElement, UiNode, UiTree};

    use crate::config::EngineConfig;
    use crate::event_bus::InProcessEventBus;

    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        searches: AtomicUsize,
        clicks: AtomicUsize,
        backs: AtomicUsize,
    }

    #[derive(Clone)]
    struct StaticHost {
        screen: Arc<Mutex<UiTree>>,
        counters: Arc<Counters>,
    }

    struct Frame(UiTree);

    impl Deref for Frame {
        type Target = UiTree;

        fn deref(&self) -> &UiTree {
            &self.0
        }
    }

    impl StaticHost {
        fn new(screen: UiTree) -> Self {
            Self {
                screen: Arc::new(Mutex::new(screen)),
                counters: Arc::default(),
            }
        }

        fn count(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    impl AutomationHost for StaticHost {
        type Snapshot = Frame;

        fn register_event_filter(&self, _filter: &EventFilter) {}

        fn open_uri(&self, _link: &DeepLink) -> Result<(), HostError> {
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn active_window(&self) -> Option<Frame> {
            self.counters.searches.fetch_add(1, Ordering::SeqCst);
            Some(Frame(self.screen.lock().unwrap().clone()))
        }

        fn screen_width(&self) -> u32 {
            1080
        }

        fn perform_click(&self, _node: &UiNode) -> bool {
            self.counters.clicks.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn navigate_back(&self) -> bool {
            self.counters.backs.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    fn chat_screen() -> UiTree {
        UiTree::from_element(
            UiElement::new("android.widget.FrameLayout").child(
                UiElement::new("android.widget.ImageButton")
                    .view_id("com.whatsapp:id/send")
                    .clickable(true)
                    .bounds(Rect::new(950, 2200, 1060, 2310)),
            ),
        )
    }

    fn blank_screen() -> UiTree {
        UiTree::from_element(UiElement::new("android.widget.FrameLayout"))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn whatsapp_event() -> UiChangeNotification {
        UiChangeNotification::new("com.whatsapp", NotificationKind::WindowStateChanged)
    }

    fn start(host: &StaticHost) -> (EngineHandle<StaticHost>, InProcessEventBus) {
        let bus = InProcessEventBus::new(64);
        let engine = AutomationEngine::new(EngineConfig::default(), bus.clone());
        let (handle, _task) = EngineHandle::spawn(engine);
        handle.attach(host.clone());
        (handle, bus)
    }

    #[tokio::test(start_paused = true)]
    async fn should_drive_send_cycle_on_tokio_time() {
        let host = StaticHost::new(chat_screen());
        let (handle, bus) = start(&host);
        let mut events = bus.subscribe();

        let submission = handle
            .send_message("0750 1234567".to_string(), "hello".to_string())
            .await
            .unwrap();
        assert!(matches!(submission, Submission::Launched(_)));
        handle.notify(whatsapp_event());

        tokio::time::sleep(ms(490)).await;
        assert_eq!(StaticHost::count(&host.counters.clicks), 0);

        tokio::time::sleep(ms(20)).await;
        assert_eq!(StaticHost::count(&host.counters.clicks), 1);

        tokio::time::sleep(ms(500)).await;
        assert_eq!(StaticHost::count(&host.counters.backs), 1);

        tokio::time::sleep(ms(300)).await;
        assert_eq!(StaticHost::count(&host.counters.backs), 2);

        let status = handle.status().await.unwrap();
        assert_eq!(status.phase, Phase::Idle);
        assert_eq!(status.pending, None);

        let kinds: Vec<EventKind> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| event.kind)
            .collect();
        assert_eq!(kinds.len(), 3);
        assert_eq!(kinds[2], EventKind::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn should_give_up_after_ten_searches() {
        let host = StaticHost::new(blank_screen());
        let (handle, _bus) = start(&host);

        handle
            .send_message("0750".to_string(), "hi".to_string())
            .await
            .unwrap();
        handle.notify(whatsapp_event());
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(StaticHost::count(&host.counters.searches), 10);
        assert_eq!(handle.status().await.unwrap().phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn should_settle_when_target_app_never_reports_activity() {
        let host = StaticHost::new(blank_screen());
        let (handle, _bus) = start(&host);

        handle
            .send_message("0750".to_string(), "hi".to_string())
            .await
            .unwrap();
        tokio::time::sleep(ms(4_990)).await;
        assert_eq!(StaticHost::count(&host.counters.searches), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(StaticHost::count(&host.counters.searches), 10);
        assert!(handle.status().await.unwrap().is_settled());
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_service_not_ready_before_attach() {
        let bus = InProcessEventBus::new(8);
        let engine: AutomationEngine<StaticHost, _> =
            AutomationEngine::new(EngineConfig::default(), bus);
        let (handle, _task) = EngineHandle::spawn(engine);

        let result = handle
            .send_message("0750".to_string(), "hi".to_string())
            .await;

        assert!(matches!(result, Err(AutomationError::ServiceNotReady)));
    }

    #[tokio::test(start_paused = true)]
    async fn should_abandon_attempt_when_service_detached() {
        let host = StaticHost::new(blank_screen());
        let (handle, bus) = start(&host);
        let mut events = bus.subscribe();

        handle
            .send_message("0750".to_string(), "hi".to_string())
            .await
            .unwrap();
        handle.notify(whatsapp_event());
        handle.detach();
        tokio::time::sleep(ms(600)).await;

        assert_eq!(StaticHost::count(&host.counters.searches), 0);
        let last = std::iter::from_fn(|| events.try_recv().ok()).last().unwrap();
        assert_eq!(
            last.kind,
            EventKind::Abandoned {
                reason: AbandonReason::ServiceLost
            }
        );
        assert!(!handle.status().await.unwrap().host_attached);
    }

    #[tokio::test(start_paused = true)]
    async fn should_pick_up_screen_change_between_retries() {
        let host = StaticHost::new(blank_screen());
        let (handle, _bus) = start(&host);

        handle
            .send_message("0750".to_string(), "hi".to_string())
            .await
            .unwrap();
        handle.notify(whatsapp_event());
        tokio::time::sleep(ms(1_250)).await;
        assert_eq!(StaticHost::count(&host.counters.searches), 2);

        *host.screen.lock().unwrap() = chat_screen();
        tokio::time::sleep(ms(500)).await;

        assert_eq!(StaticHost::count(&host.counters.clicks), 1);
        assert_eq!(handle.status().await.unwrap().phase, Phase::Confirming);
    }

    #[tokio::test]
    async fn should_stop_engine_task_when_handles_dropped() {
        let bus = InProcessEventBus::new(8);
        let engine: AutomationEngine<StaticHost, _> =
            AutomationEngine::new(EngineConfig::default(), bus);
        let (handle, task) = EngineHandle::spawn(engine);

        drop(handle);

        task.await.unwrap();
    }
}
