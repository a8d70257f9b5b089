use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Prefix marking a password hash that can never match.
pub(crate) const UNUSABLE_PASSWORD_PREFIX: &str = "!";

/// Represents a local user account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct User {
    /// Database-assigned sequence number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<i64>,
    /// Unique user identifier
    pub id: String,
    /// Login name, unique case-insensitively when present
    pub username: Option<String>,
    /// Primary email address, mirrored from the email address table
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    /// Argon2 PHC string, or an unusable marker for social-only users
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, not yet persisted, user with a fresh id
    pub fn new(username: Option<String>, email: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            sequence_number: None,
            id: uuid::Uuid::new_v4().to_string(),
            username,
            email,
            first_name: String::new(),
            last_name: String::new(),
            password_hash: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// True iff a password hash is present and is not the unusable marker.
    pub fn has_usable_password(&self) -> bool {
        match &self.password_hash {
            Some(hash) => !hash.is_empty() && !hash.starts_with(UNUSABLE_PASSWORD_PREFIX),
            None => false,
        }
    }

    pub(crate) fn set_unusable_password(&mut self) {
        self.password_hash = Some(UNUSABLE_PASSWORD_PREFIX.to_string());
    }

    /// Human readable name: full name, else username, else email.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string();
        if !full.is_empty() {
            return full;
        }
        self.username
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.id.clone())
    }
}

#[derive(Debug, Clone)]
pub(crate) enum UserSearchField {
    Id(String),
    Username(String),
    Email(String),
}

impl std::fmt::Display for UserSearchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserSearchField::Id(id) => write!(f, "id={id}"),
            UserSearchField::Username(username) => write!(f, "username={username}"),
            UserSearchField::Email(email) => write!(f, "email={email}"),
        }
    }
}
