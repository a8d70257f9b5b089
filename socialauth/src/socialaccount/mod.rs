mod config;
mod errors;
mod main;
mod storage;
mod types;

pub use errors::SocialError;
pub use types::{
    AuthProcess, LoginState, ProviderEmail, SocialAccount, SocialApp, SocialLogin,
    SocialLoginOutcome, SocialToken,
};

pub(crate) use config::{SOCIALACCOUNT_QUERY_EMAIL, SOCIALACCOUNT_STATE_TTL};
pub(crate) use main::*;
pub(crate) use storage::SocialAccountStore;

pub(crate) async fn init() -> Result<(), SocialError> {
    SocialAccountStore::init().await
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::userdb::User;

    /// A provider login as an adapter would build it, not yet looked up.
    pub(crate) fn sample_login(provider: &str, uid: &str, email: &str, verified: bool) -> SocialLogin {
        let account = SocialAccount::new(provider, uid, serde_json::json!({ "id": uid }));
        let token = SocialToken {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: account.id.clone(),
            provider: provider.to_string(),
            token: format!("access-{uid}"),
            token_secret: Some(format!("refresh-{uid}")),
            expires_at: None,
        };
        SocialLogin {
            user: User::new(None, Some(email.to_string())),
            account,
            token: Some(token),
            email_addresses: vec![ProviderEmail {
                email: email.to_string(),
                verified,
                primary: true,
            }],
            state: LoginState::default(),
            is_existing: false,
        }
    }
}
