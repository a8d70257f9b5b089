use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use tokio::sync::RwLock;

use crate::account::errors::AccountError;
use crate::userdb::User;

/// Outbound mail delivery, supplied by the host application.
///
/// `template` names the message (for example `account/email/email_confirmation`)
/// and `context` carries the values the template needs.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_mail(&self, template: &str, to: &str, context: &Value) -> Result<(), String>;
}

/// Default mailer: writes every message to the log.
pub struct TracingMailer;

#[async_trait]
impl Mailer for TracingMailer {
    async fn send_mail(&self, template: &str, to: &str, context: &Value) -> Result<(), String> {
        tracing::info!(template = %template, to = %to, context = %context, "Sending mail");
        Ok(())
    }
}

static MAILER: LazyLock<RwLock<Arc<dyn Mailer>>> =
    LazyLock::new(|| RwLock::new(Arc::new(TracingMailer)));

/// Install the mailer used for verification, reset and notification mails.
pub async fn set_mailer(mailer: Arc<dyn Mailer>) {
    *MAILER.write().await = mailer;
}

pub(crate) async fn send_mail(template: &str, to: &str, context: Value) -> Result<(), AccountError> {
    let mailer = MAILER.read().await.clone();
    mailer
        .send_mail(template, to, &context)
        .await
        .map_err(|e| {
            tracing::error!(template = %template, "Mail delivery failed: {}", e);
            AccountError::Mail(e)
        })
}

/// Security notification to the user's primary address, skipped when the
/// user has none.
pub(crate) async fn send_notification_mail(template: &str, user: &User) -> Result<(), AccountError> {
    let Some(email) = user.email.as_deref() else {
        tracing::debug!(user_id = %user.id, template = %template, "No address for notification");
        return Ok(());
    };
    send_mail(
        template,
        email,
        serde_json::json!({ "user_display": user.display_name() }),
    )
    .await
}
