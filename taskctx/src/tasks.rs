//! The `email:deliver` task.
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use taskctx_core::{error::BoxDynError, task::Task};
use thiserror::Error;

/// Type of the email delivery task
pub const TYPE_EMAIL_DELIVERY: &str = "email:deliver";

/// Payload of an `email:deliver` task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailDeliveryPayload {
    /// Recipient
    pub user_id: u64,
    /// Template to render
    pub template_id: String,
}

/// The task payload could not be decoded
#[derive(Debug, Error)]
#[error("invalid `email:deliver` payload: {0}")]
pub struct InvalidPayload(#[from] serde_json::Error);

/// Build an `email:deliver` task
pub fn new_email_delivery_task(
    user_id: u64,
    template_id: impl Into<String>,
) -> Result<Task, serde_json::Error> {
    Task::json(
        TYPE_EMAIL_DELIVERY,
        &EmailDeliveryPayload {
            user_id,
            template_id: template_id.into(),
        },
    )
}

/// Decodes the payload and "sends" the email
pub fn handle_email_delivery_task(task: &mut Task) -> BoxFuture<'_, Result<(), BoxDynError>> {
    Box::pin(async move {
        let payload: EmailDeliveryPayload = task.decode().map_err(InvalidPayload)?;
        tracing::info!(
            user_id = payload.user_id,
            template_id = %payload.template_id,
            "sending email to user"
        );
        Ok(())
    })
}
