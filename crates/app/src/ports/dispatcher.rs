//! Message dispatcher port: how the bridge hands a send to the engine.

use std::future::Future;

use whatsend_domain::error::AutomationError;

use crate::automation_engine::Submission;

/// Accepts send requests on behalf of the automation engine.
pub trait MessageDispatcher {
    /// Submit a phone/message pair.
    ///
    /// Resolves once the launch has been requested (or the request queued),
    /// not once the message is sent.
    fn send_message(
        &self,
        phone: String,
        message: String,
    ) -> impl Future<Output = Result<Submission, AutomationError>> + Send;
}
