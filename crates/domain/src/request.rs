//! Send request: one phone/message pair handed to the automation engine.

use serde::{Deserialize, Serialize};

use crate::id::RequestId;

/// A message the caller wants delivered through the target app's UI.
///
/// `phone` is kept exactly as the caller supplied it; normalization happens
/// at launch time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRequest {
    pub id: RequestId,
    pub phone: String,
    pub message: String,
}

impl SendRequest {
    /// Create a request with a fresh id.
    #[must_use]
    pub fn new(phone: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            phone: phone.into(),
            message: message.into(),
        }
    }
}
