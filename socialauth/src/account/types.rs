use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailVerificationMode {
    None,
    Optional,
    Mandatory,
}

impl FromStr for EmailVerificationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "optional" => Ok(Self::Optional),
            "mandatory" => Ok(Self::Mandatory),
            other => Err(format!("Unknown email verification mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginMethod {
    Email,
    Username,
}

impl LoginMethod {
    pub(crate) fn parse_list(raw: &str) -> Vec<Self> {
        let mut methods = Vec::new();
        for item in raw.split(',').map(|s| s.trim().to_ascii_lowercase()) {
            let method = match item.as_str() {
                "email" => Self::Email,
                "username" => Self::Username,
                _ => continue,
            };
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        methods
    }
}

/// An email address owned by a user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct EmailAddress {
    #[serde(skip_serializing, default)]
    pub id: String,
    #[serde(skip_serializing, default)]
    pub user_id: String,
    pub email: String,
    pub verified: bool,
    #[sqlx(rename = "is_primary")]
    pub primary: bool,
    #[serde(skip_serializing, default)]
    pub created_at: DateTime<Utc>,
}

impl EmailAddress {
    pub(crate) fn new(user_id: &str, email: &str, verified: bool, primary: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            email: normalize_email(email),
            verified,
            primary,
            created_at: Utc::now(),
        }
    }
}

/// Whether an email address may be claimed by a new account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EmailAssessment {
    Unique,
    Taken,
    /// Taken, but the caller must not reveal that to the client.
    TakenPreventEnumeration,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_verification_mode_from_str() {
        assert_eq!(
            "Mandatory".parse::<EmailVerificationMode>().unwrap(),
            EmailVerificationMode::Mandatory
        );
        assert_eq!(
            " none ".parse::<EmailVerificationMode>().unwrap(),
            EmailVerificationMode::None
        );
        assert!("sometimes".parse::<EmailVerificationMode>().is_err());
    }

    #[test]
    fn test_login_method_parse_list() {
        assert_eq!(
            LoginMethod::parse_list("email, username"),
            vec![LoginMethod::Email, LoginMethod::Username]
        );
        assert_eq!(
            LoginMethod::parse_list("username,bogus,username"),
            vec![LoginMethod::Username]
        );
        assert!(LoginMethod::parse_list("").is_empty());
    }

    #[test]
    fn test_email_address_new_normalizes() {
        let address = EmailAddress::new("u1", "  Alice@Example.COM ", false, true);
        assert_eq!(address.email, "alice@example.com");
        assert!(address.primary);
        assert!(!address.verified);
    }

    #[test]
    fn test_email_address_serializes_public_fields_only() {
        let address = EmailAddress::new("u1", "a@example.com", true, false);
        let json = serde_json::to_value(&address).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"email": "a@example.com", "verified": true, "primary": false})
        );
    }
}
