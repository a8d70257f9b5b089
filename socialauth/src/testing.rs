//! Fixtures for exercising web integrations end to end.
//!
//! Only built for this crate's tests and with the `test-support` feature.

use async_trait::async_trait;
use chrono::Duration;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

use crate::account::{Mailer, set_mailer};
use crate::session::{Session, SessionError, load_session, save_session};
use crate::socialaccount::{SocialAccount, SocialAccountStore, SocialError};

/// Move every authentication record of a stored session `seconds` into the past.
pub async fn backdate_authentication(session_id: &str, seconds: i64) -> Result<Session, SessionError> {
    let mut session = load_session(session_id)
        .await?
        .ok_or(SessionError::SessionError)?;
    for record in session.stored.authentication_records.iter_mut() {
        record.at = record.at - Duration::seconds(seconds);
    }
    save_session(&session).await?;
    Ok(session)
}

/// Bind a provider identity to `user_id` without a provider round trip.
pub async fn link_social_account(
    user_id: &str,
    provider: &str,
    uid: &str,
) -> Result<SocialAccount, SocialError> {
    let mut account = SocialAccount::new(provider, uid, json!({ "id": uid }));
    account.user_id = user_id.to_string();
    SocialAccountStore::insert_account(&account).await?;
    Ok(account)
}

/// Captures sent mails so tests can pick codes and keys out of the context.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String, Value)>>,
}

impl RecordingMailer {
    /// Context of the latest mail rendered from `template` to `to`.
    pub fn last_for(&self, template: &str, to: &str) -> Option<Value> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .rev()
            .find(|(t, addr, _)| t == template && addr == to)
            .map(|(_, _, ctx)| ctx.clone())
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_mail(&self, template: &str, to: &str, context: &Value) -> Result<(), String> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((template.to_string(), to.to_string(), context.clone()));
        Ok(())
    }
}

/// Replace the process-wide mailer with a fresh [`RecordingMailer`].
pub async fn install_recording_mailer() -> Arc<RecordingMailer> {
    let mailer = Arc::new(RecordingMailer::default());
    set_mailer(mailer.clone()).await;
    mailer
}
