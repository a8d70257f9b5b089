use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::socialaccount::{LoginState, SocialToken};

/// Profile fields every adapter maps its provider's JSON onto.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommonFields {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub name: Option<String>,
}

/// Response of the token endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub id_token: Option<String>,
    pub raw: Map<String, Value>,
}

impl TokenResponse {
    /// Accepts JSON and form encoded bodies; `expires_in` may come as a string.
    pub(crate) fn from_fields(raw: Map<String, Value>) -> Option<Self> {
        let text = |key: &str| {
            raw.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let access_token = text("access_token")?;
        let expires_in = match raw.get("expires_in") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };

        Some(Self {
            access_token,
            refresh_token: text("refresh_token"),
            expires_in,
            id_token: text("id_token"),
            raw,
        })
    }

    pub(crate) fn to_social_token(&self, provider: &str) -> SocialToken {
        SocialToken {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: String::new(),
            provider: provider.to_string(),
            token: self.access_token.clone(),
            token_secret: self.refresh_token.clone(),
            expires_at: self
                .expires_in
                .filter(|secs| *secs > 0)
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

/// Query parameters the provider sends back to the callback URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// What survives between the redirect to the provider and its callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredOAuthState {
    pub(crate) provider: String,
    pub(crate) session_id: String,
    pub(crate) state: LoginState,
    pub(crate) pkce_verifier: Option<String>,
    pub(crate) nonce: Option<String>,
}

/// Public description of an enabled provider.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub client_id: String,
    pub flows: Vec<&'static str>,
}
