use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use sqlx::FromRow;

use crate::session::errors::SessionError;
use crate::userdb::User as DbUser;

/// User information exposed to the web layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionUser {
    pub id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub display: String,
    pub has_usable_password: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for SessionUser {
    fn from(db_user: DbUser) -> Self {
        Self {
            display: db_user.display_name(),
            has_usable_password: db_user.has_usable_password(),
            id: db_user.id,
            username: db_user.username,
            email: db_user.email,
            created_at: db_user.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationMethod {
    Password,
    Socialaccount,
    Mfa,
    EmailVerification,
    /// One-time code mailed to the user
    Code,
}

/// One successful proof of identity within a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthenticationRecord {
    pub method: AuthenticationMethod,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub reauthenticated: bool,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredSession {
    pub(crate) user_id: Option<String>,
    pub(crate) csrf_token: String,
    #[serde(default)]
    pub(crate) authentication_records: Vec<AuthenticationRecord>,
    #[serde(default)]
    pub(crate) data: Map<String, Value>,
    pub(crate) expires_at: DateTime<Utc>,
}

/// Where the current request comes from. Never persisted with the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// One logged-in session of a user, as listed to that user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserSession {
    pub id: String,
    #[serde(skip_serializing)]
    pub(crate) session_key: String,
    #[serde(skip_serializing)]
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    /// Set when listing: this is the session making the request
    #[sqlx(skip)]
    pub is_current: bool,
}

/// A server-side session loaded from the cache store.
///
/// Mutations only touch the in-memory copy; call [`save_session`](crate::save_session)
/// to persist them.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) id: String,
    pub(crate) stored: StoredSession,
    pub(crate) client: ClientInfo,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.stored.user_id.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.stored.user_id.is_some()
    }

    pub fn csrf_token(&self) -> &str {
        &self.stored.csrf_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.stored.expires_at
    }

    pub fn authentication_records(&self) -> &[AuthenticationRecord] {
        &self.stored.authentication_records
    }

    pub fn client(&self) -> &ClientInfo {
        &self.client
    }

    /// Attach the requesting client's address and user agent, recorded
    /// with the user session on login.
    pub fn set_client(&mut self, client: ClientInfo) {
        self.client = client;
    }

    pub(crate) fn has_data(&self, key: &str) -> bool {
        self.stored.data.contains_key(key)
    }

    pub(crate) fn set_data<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), SessionError> {
        self.stored
            .data
            .insert(key.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    pub(crate) fn get_data<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
        match self.stored.data.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Remove and return a stashed value, so it is consumed exactly once.
    pub(crate) fn pop_data<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>, SessionError> {
        match self.stored.data.remove(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn remove_data(&mut self, key: &str) {
        self.stored.data.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn anonymous_session() -> Session {
        Session {
            id: "sid".to_string(),
            stored: StoredSession {
                user_id: None,
                csrf_token: "csrf".to_string(),
                authentication_records: vec![],
                data: Map::new(),
                expires_at: Utc::now() + Duration::seconds(60),
            },
            client: ClientInfo::default(),
        }
    }

    #[test]
    fn test_session_data_set_get_pop() {
        let mut session = anonymous_session();
        session.set_data("answer", &42u32).unwrap();

        assert!(session.has_data("answer"));
        assert_eq!(session.get_data::<u32>("answer").unwrap(), Some(42));
        assert_eq!(session.pop_data::<u32>("answer").unwrap(), Some(42));
        assert_eq!(session.pop_data::<u32>("answer").unwrap(), None);
    }

    #[test]
    fn test_session_data_type_mismatch_is_error() {
        let mut session = anonymous_session();
        session.set_data("name", &"text").unwrap();

        assert!(matches!(
            session.get_data::<u32>("name"),
            Err(SessionError::Serde(_))
        ));
    }

    #[test]
    fn test_stored_session_tolerates_missing_optional_fields() {
        let json = r#"{"user_id":null,"csrf_token":"t","expires_at":"2030-01-01T00:00:00Z"}"#;
        let stored: StoredSession = serde_json::from_str(json).unwrap();
        assert!(stored.authentication_records.is_empty());
        assert!(stored.data.is_empty());
    }

    #[test]
    fn test_authentication_method_serialization() {
        let record = AuthenticationRecord {
            method: AuthenticationMethod::Socialaccount,
            at: Utc::now(),
            reauthenticated: false,
            extra: Map::new(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["method"], "socialaccount");
    }
}
