use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

use crate::session::AuthenticationMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticatorType {
    Totp,
    RecoveryCodes,
}

impl AuthenticatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Totp => "totp",
            Self::RecoveryCodes => "recovery_codes",
        }
    }
}

impl TryFrom<String> for AuthenticatorType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "totp" => Ok(Self::Totp),
            "recovery_codes" => Ok(Self::RecoveryCodes),
            other => Err(format!("Unknown authenticator type: {other}")),
        }
    }
}

/// A second factor registered by a user. At most one per type and user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Authenticator {
    pub id: String,
    #[serde(skip_serializing)]
    pub user_id: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "authenticator_type", try_from = "String")]
    pub kind: AuthenticatorType,
    /// Type specific state: the TOTP secret, or the recovery code seed and used mask
    #[serde(skip_serializing)]
    #[sqlx(json)]
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Authenticator {
    pub(crate) fn new(user_id: &str, kind: AuthenticatorType, data: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            data,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    /// Extra fields recorded with the session's authentication record.
    pub(crate) fn authentication_extra(&self, reauthenticated: bool) -> Map<String, Value> {
        let mut extra = Map::new();
        extra.insert("id".to_string(), Value::String(self.id.clone()));
        extra.insert(
            "type".to_string(),
            Value::String(self.kind.as_str().to_string()),
        );
        if reauthenticated {
            extra.insert("reauthenticated".to_string(), Value::Bool(true));
        }
        extra
    }
}

/// A first-factor login parked in the session until the second factor arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PendingMfaLogin {
    pub(crate) user_id: String,
    pub(crate) method: AuthenticationMethod,
    #[serde(default)]
    pub(crate) extra: Map<String, Value>,
    pub(crate) at: DateTime<Utc>,
}
