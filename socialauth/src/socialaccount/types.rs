use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

use crate::userdb::User;

/// Per-provider OAuth application credentials
#[derive(Debug, Clone, PartialEq)]
pub struct SocialApp {
    pub provider: String,
    pub client_id: String,
    pub secret: String,
    /// Extra key some providers need besides the secret
    pub key: Option<String>,
    /// Provider specific settings such as `scope` or `server_url`
    pub settings: Map<String, Value>,
}

impl SocialApp {
    pub fn setting_str(&self, name: &str) -> Option<&str> {
        self.settings.get(name).and_then(Value::as_str)
    }
}

/// Persisted binding between a local user and a remote identity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct SocialAccount {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    /// Identifier the provider assigns to the remote user
    pub uid: String,
    #[sqlx(json)]
    pub extra_data: Value,
    pub last_login: DateTime<Utc>,
    pub date_joined: DateTime<Utc>,
}

impl SocialAccount {
    pub(crate) fn new(provider: &str, uid: &str, extra_data: Value) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: String::new(),
            provider: provider.to_string(),
            uid: uid.to_string(),
            extra_data,
            last_login: now,
            date_joined: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct SocialToken {
    pub id: String,
    pub account_id: String,
    pub provider: String,
    /// Access token
    pub token: String,
    /// Refresh token for OAuth 2 providers
    pub token_secret: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// An address reported by the provider, with the provider's verification claim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderEmail {
    pub email: String,
    pub verified: bool,
    pub primary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthProcess {
    #[default]
    Login,
    Connect,
    Redirect,
}

impl std::str::FromStr for AuthProcess {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(Self::Login),
            "connect" => Ok(Self::Connect),
            "redirect" => Ok(Self::Redirect),
            other => Err(format!("Unknown process: {other}")),
        }
    }
}

/// What the user asked for when the provider dance started.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LoginState {
    #[serde(default)]
    pub process: AuthProcess,
    pub next: Option<String>,
    pub scope: Option<String>,
    pub auth_params: Option<String>,
}

/// A remote identity that just authenticated and is not yet bound to a local
/// user. Serializable so it can wait in the session for signup or reauthentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialLogin {
    pub user: User,
    pub account: SocialAccount,
    pub token: Option<SocialToken>,
    pub email_addresses: Vec<ProviderEmail>,
    #[serde(default)]
    pub state: LoginState,
    /// Set once the account was found in the store
    #[serde(default)]
    pub is_existing: bool,
}

impl SocialLogin {
    /// Address to use for signup: the primary one, else the first verified, else the first.
    pub fn email(&self) -> Option<&str> {
        self.email_addresses
            .iter()
            .find(|e| e.primary)
            .or_else(|| self.email_addresses.iter().find(|e| e.verified))
            .or_else(|| self.email_addresses.first())
            .map(|e| e.email.as_str())
    }

    pub(crate) fn is_email_verified(&self, email: &str) -> bool {
        self.email_addresses
            .iter()
            .any(|e| e.verified && e.email.eq_ignore_ascii_case(email))
    }

    pub(crate) fn authentication_extra(&self) -> Map<String, Value> {
        let mut extra = Map::new();
        extra.insert(
            "provider".to_string(),
            Value::String(self.account.provider.clone()),
        );
        extra.insert("uid".to_string(), Value::String(self.account.uid.clone()));
        extra
    }
}

/// Expected results of a social login, rendered by the web layer.
#[derive(Debug, Clone)]
pub enum SocialLoginOutcome {
    /// An existing account matched; log this user in.
    LoggedIn(User),
    /// A new user was created; log this user in.
    SignedUp(User),
    Connected(SocialAccount),
    /// The identity was already bound to the current user; its data was refreshed.
    AlreadyConnected(SocialAccount),
    /// More input is needed; the login waits in the session.
    SignupRequired,
    /// The identity belongs to another local user and stays there.
    ConnectedToOther,
    SignupClosed,
    /// The provider's email belongs to an existing local user. The login waits
    /// in the session so the user can pick another address.
    DuplicateEmail { email: String },
    /// The email is taken but enumeration prevention hides it; the owner was
    /// mailed instead.
    EnumerationHidden { email: String },
    Redirect { url: String },
    ReauthenticationRequired { url: String },
}
