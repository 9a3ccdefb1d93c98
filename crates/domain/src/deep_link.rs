//! Deep link into the target app's "chat with prefilled message" screen.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::phone::PhoneNumber;

/// Default click-to-chat host.
pub const DEFAULT_LINK_HOST: &str = "wa.me";

/// A fully formed `https://<host>/<number>?text=<message>` URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepLink(String);

impl DeepLink {
    /// Build the chat link for `phone`, percent-encoding `message`.
    #[must_use]
    pub fn chat(link_host: &str, phone: &PhoneNumber, message: &str) -> Self {
        let text = urlencoding::encode(message);
        Self(format!("https://{link_host}/{phone}?text={text}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeepLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
