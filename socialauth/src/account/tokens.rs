//! Stateless, HMAC signed keys for email verification and password reset.
//!
//! A key is `base64url(payload).base64url(mac)`. Email verification keys
//! expire after a number of days. Password reset tokens additionally mix the
//! user's current password hash into the MAC, so a token stops working as
//! soon as the password changes.

use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::account::config::{
    ACCOUNT_EMAIL_VERIFICATION_EXPIRE_DAYS, ACCOUNT_PASSWORD_RESET_TIMEOUT,
};
use crate::account::errors::AccountError;
use crate::config::AUTH_SERVER_SECRET;
use crate::userdb::User;
use crate::utils::{base64url_decode, base64url_encode};

type HmacSha256 = Hmac<Sha256>;

const EMAIL_VERIFICATION_PURPOSE: &[u8] = b"socialauth.email_verification";
const PASSWORD_RESET_PURPOSE: &[u8] = b"socialauth.password_reset";

#[derive(Debug, Serialize, Deserialize)]
struct EmailVerificationPayload {
    u: String,
    e: String,
    t: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PasswordResetPayload {
    u: String,
    t: i64,
}

fn new_mac(purpose: &[u8], payload: &str, binding: &str) -> Result<HmacSha256, AccountError> {
    let mut mac = HmacSha256::new_from_slice(&AUTH_SERVER_SECRET)
        .map_err(|e| AccountError::Crypto(e.to_string()))?;
    mac.update(purpose);
    mac.update(b"|");
    mac.update(payload.as_bytes());
    mac.update(b"|");
    mac.update(binding.as_bytes());
    Ok(mac)
}

fn sign<T: Serialize>(purpose: &[u8], payload: &T, binding: &str) -> Result<String, AccountError> {
    let json = serde_json::to_string(payload).map_err(|e| AccountError::Crypto(e.to_string()))?;
    let encoded = base64url_encode(json.as_bytes());
    let tag = new_mac(purpose, &encoded, binding)?
        .finalize()
        .into_bytes();
    Ok(format!("{encoded}.{}", base64url_encode(&tag)))
}

/// Split a key and decode its payload without checking the MAC.
fn split_key<T: for<'de> Deserialize<'de>>(key: &str) -> Result<(T, &str, Vec<u8>), AccountError> {
    let (encoded, tag) = key
        .split_once('.')
        .ok_or_else(|| AccountError::InvalidToken("malformed key".to_string()))?;
    let tag = base64url_decode(tag).map_err(|_| AccountError::InvalidToken("malformed key".into()))?;
    let json =
        base64url_decode(encoded).map_err(|_| AccountError::InvalidToken("malformed key".into()))?;
    let payload: T = serde_json::from_slice(&json)
        .map_err(|_| AccountError::InvalidToken("malformed key".to_string()))?;
    Ok((payload, encoded, tag))
}

fn verify_tag(purpose: &[u8], encoded: &str, binding: &str, tag: &[u8]) -> Result<(), AccountError> {
    new_mac(purpose, encoded, binding)?
        .verify_slice(tag)
        .map_err(|_| {
            tracing::warn!("Rejected key with invalid signature");
            AccountError::InvalidToken("bad signature".to_string())
        })
}

pub(crate) fn make_email_verification_key(
    user_id: &str,
    email: &str,
) -> Result<String, AccountError> {
    let payload = EmailVerificationPayload {
        u: user_id.to_string(),
        e: email.to_string(),
        t: Utc::now().timestamp(),
    };
    sign(EMAIL_VERIFICATION_PURPOSE, &payload, "")
}

/// Returns `(user_id, email)` for a valid, unexpired key.
pub(crate) fn parse_email_verification_key(key: &str) -> Result<(String, String), AccountError> {
    let (payload, encoded, tag) = split_key::<EmailVerificationPayload>(key)?;
    verify_tag(EMAIL_VERIFICATION_PURPOSE, encoded, "", &tag)?;

    let expires = payload.t + Duration::days(*ACCOUNT_EMAIL_VERIFICATION_EXPIRE_DAYS).num_seconds();
    if Utc::now().timestamp() > expires {
        return Err(AccountError::InvalidToken("key expired".to_string()));
    }
    Ok((payload.u, payload.e))
}

fn reset_binding(user: &User) -> String {
    format!(
        "{}|{}",
        user.password_hash.as_deref().unwrap_or_default(),
        user.email.as_deref().unwrap_or_default()
    )
}

pub(crate) fn make_password_reset_token(user: &User) -> Result<String, AccountError> {
    let payload = PasswordResetPayload {
        u: user.id.clone(),
        t: Utc::now().timestamp(),
    };
    sign(PASSWORD_RESET_PURPOSE, &payload, &reset_binding(user))
}

/// User id named by a reset token. The token is not yet verified.
pub(crate) fn password_reset_token_user_id(token: &str) -> Result<String, AccountError> {
    let (payload, _, _) = split_key::<PasswordResetPayload>(token)?;
    Ok(payload.u)
}

pub(crate) fn check_password_reset_token(user: &User, token: &str) -> Result<(), AccountError> {
    let (payload, encoded, tag) = split_key::<PasswordResetPayload>(token)?;
    if payload.u != user.id {
        return Err(AccountError::InvalidToken("user mismatch".to_string()));
    }
    verify_tag(PASSWORD_RESET_PURPOSE, encoded, &reset_binding(user), &tag)?;

    if Utc::now().timestamp() > payload.t + *ACCOUNT_PASSWORD_RESET_TIMEOUT {
        return Err(AccountError::InvalidToken("token expired".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_verification_key_roundtrip() {
        let key = make_email_verification_key("user-1", "a@example.com").unwrap();
        let (user_id, email) = parse_email_verification_key(&key).unwrap();
        assert_eq!(user_id, "user-1");
        assert_eq!(email, "a@example.com");
    }

    #[test]
    fn test_email_verification_key_tampering_is_rejected() {
        let key = make_email_verification_key("user-1", "a@example.com").unwrap();
        let (_, tag) = key.split_once('.').unwrap();

        let forged_payload = base64url_encode(
            serde_json::json!({"u": "user-2", "e": "a@example.com", "t": Utc::now().timestamp()})
                .to_string()
                .as_bytes(),
        );
        let forged = format!("{forged_payload}.{tag}");

        assert!(matches!(
            parse_email_verification_key(&forged),
            Err(AccountError::InvalidToken(_))
        ));
        assert!(parse_email_verification_key("garbage").is_err());
    }

    #[test]
    fn test_expired_email_verification_key() {
        let payload = EmailVerificationPayload {
            u: "user-1".to_string(),
            e: "a@example.com".to_string(),
            t: (Utc::now() - Duration::days(365)).timestamp(),
        };
        let key = sign(EMAIL_VERIFICATION_PURPOSE, &payload, "").unwrap();

        assert!(matches!(
            parse_email_verification_key(&key),
            Err(AccountError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_password_reset_token_invalidated_by_password_change() {
        let mut user = User::new(None, Some("r@example.com".to_string()));
        user.password_hash = Some("$argon2id$old".to_string());

        let token = make_password_reset_token(&user).unwrap();
        assert_eq!(password_reset_token_user_id(&token).unwrap(), user.id);
        assert!(check_password_reset_token(&user, &token).is_ok());

        user.password_hash = Some("$argon2id$new".to_string());
        assert!(check_password_reset_token(&user, &token).is_err());
    }

    #[test]
    fn test_password_reset_token_is_not_an_email_key() {
        let user = User::new(None, Some("r@example.com".to_string()));
        let token = make_password_reset_token(&user).unwrap();
        assert!(parse_email_verification_key(&token).is_err());
    }
}
