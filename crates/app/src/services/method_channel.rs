//! Method channel: name-based dispatch of inbound capability calls.
//!
//! The calling application invokes operations by method name with a map of
//! string arguments and receives either a value, a tagged error, or
//! "not implemented".

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ports::{AccessibilitySettings, MessageDispatcher};
use crate::services::bridge_service::{BridgeError, BridgeService};

pub const IS_ACCESSIBILITY_ENABLED: &str = "isAccessibilityEnabled";
pub const OPEN_ACCESSIBILITY_SETTINGS: &str = "openAccessibilitySettings";
pub const SEND_WHATSAPP_MESSAGE: &str = "sendWhatsAppMessage";

/// An inbound call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            arguments: Map::new(),
        }
    }

    #[must_use]
    pub fn with_argument(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.to_string(), value.into());
        self
    }

    /// String argument `name`, or `""` when absent or not a string.
    #[must_use]
    pub fn string_argument(&self, name: &str) -> String {
        self.arguments
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

/// Reply to a [`MethodCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MethodResult {
    Success {
        value: Value,
    },
    Error {
        code: String,
        message: String,
        details: Option<Value>,
    },
    NotImplemented,
}

impl From<BridgeError> for MethodResult {
    fn from(err: BridgeError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
            details: None,
        }
    }
}

/// Routes [`MethodCall`]s onto a [`BridgeService`].
pub struct MethodChannel<S, D> {
    bridge: BridgeService<S, D>,
}

impl<S, D> MethodChannel<S, D>
where
    S: AccessibilitySettings,
    D: MessageDispatcher,
{
    pub fn new(bridge: BridgeService<S, D>) -> Self {
        Self { bridge }
    }

    #[must_use]
    pub fn bridge(&self) -> &BridgeService<S, D> {
        &self.bridge
    }

    /// Dispatch one call.
    pub async fn handle(&self, call: &MethodCall) -> MethodResult {
        tracing::debug!(method = %call.method, "method call");
        match call.method.as_str() {
            IS_ACCESSIBILITY_ENABLED => MethodResult::Success {
                value: Value::Bool(self.bridge.is_automation_enabled()),
            },
            OPEN_ACCESSIBILITY_SETTINGS => MethodResult::Success {
                value: Value::Bool(self.bridge.open_automation_settings()),
            },
            SEND_WHATSAPP_MESSAGE => {
                let phone = call.string_argument("phone");
                let message = call.string_argument("message");
                match self.bridge.send_message(phone, message).await {
                    Ok(sent) => MethodResult::Success {
                        value: Value::Bool(sent),
                    },
                    Err(err) => err.into(),
                }
            }
            other => {
                tracing::debug!(method = other, "unknown method");
                MethodResult::NotImplemented
            }
        }
    }
}
