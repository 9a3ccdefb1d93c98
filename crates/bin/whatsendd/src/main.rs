//! # whatsendd
//!
//! Composition root that wires the automation engine to a platform and
//! serves capability calls.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialise logging on stderr; stdout carries the protocol
//! - Construct the virtual platform (adapter) and bind it to the engine
//! - Construct the bridge and method channel, injecting ports
//! - Serve JSON-line method calls on stdin, stream outcome events on stdout
//! - On end of input, wait for the in-flight send to settle, then exit
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer. No domain logic belongs here.

mod config;
mod protocol;

use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use whatsend_adapter_virtual::{TargetApp, VirtualPlatform, screens};
use whatsend_app::automation_engine::AutomationEngine;
use whatsend_app::event_bus::InProcessEventBus;
use whatsend_app::runtime::EngineHandle;
use whatsend_app::services::bridge_service::BridgeService;
use whatsend_app::services::method_channel::MethodChannel;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::new(&config.logging.filter))
        .init();

    let engine_config = config.engine_config()?;

    // Platform
    let platform = VirtualPlatform::new(TargetApp {
        package: engine_config.target_package.clone(),
        loading_frames: config.simulator.render_frames,
        chat_screen: screens::chat_with_send_id,
    });
    if config.simulator.enabled_on_start {
        platform.enable_service(&config.service.component);
    }

    // Engine
    let event_bus = InProcessEventBus::new(256);
    let mut events = event_bus.subscribe();
    let engine = AutomationEngine::new(engine_config, event_bus);
    let (handle, _engine_task) = EngineHandle::spawn(engine);

    let (notifications_tx, mut notifications) = mpsc::unbounded_channel();
    platform.connect_notifications(notifications_tx);
    let forwarder = handle.clone();
    tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            if !forwarder.notify(notification) {
                break;
            }
        }
    });
    handle.attach(platform.clone());

    // Bridge
    let bridge = BridgeService::new(platform, handle.clone(), config.service.component.clone());
    let channel = MethodChannel::new(bridge);

    tracing::info!(
        package = %config.target.package,
        overlap = ?config.queue.overlap,
        "whatsendd ready, reading method calls from stdin"
    );

    let mut stdout = tokio::io::stdout();
    let stdin = BufReader::new(tokio::io::stdin());
    protocol::serve(stdin, &mut stdout, &channel, &mut events).await?;
    protocol::drain(&mut stdout, &mut events, || handle.status()).await?;

    tracing::info!("whatsendd stopped");
    Ok(())
}
