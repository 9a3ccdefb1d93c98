//! JSON-line protocol on stdin/stdout.
//!
//! Each input line is a method call:
//!
//! ```json
//! {"id": 1, "method": "sendWhatsAppMessage", "arguments": {"phone": "0750 1234567", "message": "hi"}}
//! ```
//!
//! Each output line is either a reply, carrying the call's `id` next to the
//! serialized `MethodResult`, or an outcome event wrapped as `{"event": ...}`.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::{self, error::RecvError};

use whatsend_app::automation_engine::EngineStatus;
use whatsend_app::ports::{AccessibilitySettings, MessageDispatcher};
use whatsend_app::services::method_channel::{MethodCall, MethodChannel, MethodResult};
use whatsend_domain::event::AutomationEvent;

const DRAIN_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    #[serde(flatten)]
    call: MethodCall,
}

/// Serve calls from `input` until it reaches end of file, interleaving
/// outcome events as they are published.
///
/// # Errors
///
/// Returns an IO error when reading `input` or writing `output` fails.
pub async fn serve<R, W, S, D>(
    input: R,
    output: &mut W,
    channel: &MethodChannel<S, D>,
    events: &mut broadcast::Receiver<AutomationEvent>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    S: AccessibilitySettings,
    D: MessageDispatcher,
{
    let mut lines = input.lines();
    let mut events_open = true;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let reply = respond(channel, &line).await;
                write_line(output, &reply).await?;
            }
            event = events.recv(), if events_open => match event {
                Ok(event) => write_event(output, &event).await?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "output fell behind, events dropped");
                }
                Err(RecvError::Closed) => events_open = false,
            },
        }
    }

    tracing::debug!("input closed");
    Ok(())
}

/// Keep forwarding events until `status` reports the engine settled.
///
/// # Errors
///
/// Returns an IO error when writing `output` fails.
pub async fn drain<W, F, Fut>(
    output: &mut W,
    events: &mut broadcast::Receiver<AutomationEvent>,
    status: F,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    F: Fn() -> Fut,
    Fut: Future<Output = Option<EngineStatus>>,
{
    while status().await.is_some_and(|status| !status.is_settled()) {
        match tokio::time::timeout(DRAIN_POLL, events.recv()).await {
            Ok(Ok(event)) => write_event(output, &event).await?,
            Ok(Err(RecvError::Lagged(_))) | Err(_) => {}
            Ok(Err(RecvError::Closed)) => return Ok(()),
        }
    }
    while let Ok(event) = events.try_recv() {
        write_event(output, &event).await?;
    }
    Ok(())
}

async fn respond<S, D>(channel: &MethodChannel<S, D>, line: &str) -> Value
where
    S: AccessibilitySettings,
    D: MessageDispatcher,
{
    match serde_json::from_str::<Request>(line) {
        Ok(request) => {
            let result = channel.handle(&request.call).await;
            reply(request.id, &result)
        }
        Err(err) => {
            tracing::warn!(%err, "malformed request line");
            let result = MethodResult::Error {
                code: "BAD_REQUEST".to_string(),
                message: err.to_string(),
                details: None,
            };
            reply(Value::Null, &result)
        }
    }
}

fn reply(id: Value, result: &MethodResult) -> Value {
    let mut value = serde_json::to_value(result).unwrap_or_else(|_| json!({}));
    if let Some(object) = value.as_object_mut() {
        object.insert("id".to_string(), id);
    }
    value
}

async fn write_event<W>(output: &mut W, event: &AutomationEvent) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_line(output, &json!({ "event": event })).await
}

async fn write_line<W>(output: &mut W, value: &Value) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = value.to_string();
    line.push('\n');
    output.write_all(line.as_bytes()).await?;
    output.flush().await
}
