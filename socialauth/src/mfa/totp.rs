//! Time-based one-time passwords (RFC 6238) on top of HOTP (RFC 4226).

use data_encoding::BASE32;
use ring::hmac;
use serde_json::json;

use crate::session::{Session, save_session};
use crate::storage::store_cache_if_absent;
use crate::utils::gen_random_bytes;

use super::config::{MFA_TOTP_DIGITS, MFA_TOTP_PERIOD};
use super::errors::MfaError;
use super::recovery_codes::{activate_recovery_codes, delete_dangling_recovery_codes};
use super::storage::AuthenticatorStore;
use super::types::{Authenticator, AuthenticatorType};

/// Session key holding the secret offered to the user until activation
pub(crate) const SECRET_SESSION_KEY: &str = "mfa.totp.secret";

const USED_CODE_CACHE_PREFIX: &str = "mfa_totp_used";
const SECRET_LENGTH: usize = 20;

pub(crate) fn generate_totp_secret() -> Result<String, MfaError> {
    Ok(BASE32.encode(&gen_random_bytes(SECRET_LENGTH)?))
}

/// The pending secret in the session, created if missing or when `regenerate`.
/// The caller persists the session.
pub(crate) fn get_totp_secret(session: &mut Session, regenerate: bool) -> Result<String, MfaError> {
    if !regenerate {
        if let Some(secret) = session.get_data::<String>(SECRET_SESSION_KEY)? {
            return Ok(secret);
        }
    }
    let secret = generate_totp_secret()?;
    session.set_data(SECRET_SESSION_KEY, &secret)?;
    Ok(secret)
}

pub(crate) fn hotp_counter_from_time() -> u64 {
    let now = chrono::Utc::now().timestamp().max(0) as u64;
    now / (*MFA_TOTP_PERIOD).max(1)
}

pub(crate) fn hotp_value(secret: &str, counter: u64) -> Result<u32, MfaError> {
    let key_bytes = BASE32
        .decode(secret.trim().to_ascii_uppercase().as_bytes())
        .map_err(|e| MfaError::InvalidData(format!("Invalid TOTP secret: {e}")))?;

    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, &key_bytes);
    let digest = hmac::sign(&key, &counter.to_be_bytes());
    let digest = digest.as_ref();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let truncated = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    Ok(truncated % 10u32.pow(*MFA_TOTP_DIGITS))
}

pub(crate) fn format_hotp_value(value: u32) -> String {
    format!("{:0width$}", value, width = *MFA_TOTP_DIGITS as usize)
}

/// Whether `code` matches the current period for `secret`.
pub(crate) fn validate_totp_code(secret: &str, code: &str) -> Result<bool, MfaError> {
    let expected = format_hotp_value(hotp_value(secret, hotp_counter_from_time())?);
    Ok(code.trim() == expected)
}

/// `otpauth://` provisioning URL for authenticator apps.
pub(crate) fn build_totp_url(label: &str, issuer: &str, secret: &str) -> String {
    let mut params = url::form_urlencoded::Serializer::new(String::new());
    params.append_pair("secret", secret);
    params.append_pair("issuer", issuer);
    if *MFA_TOTP_DIGITS != 6 {
        params.append_pair("digits", &MFA_TOTP_DIGITS.to_string());
    }
    if *MFA_TOTP_PERIOD != 30 {
        params.append_pair("period", &MFA_TOTP_PERIOD.to_string());
    }
    format!(
        "otpauth://totp/{}?{}",
        urlencoding::encode(label),
        params.finish()
    )
}

fn authenticator_secret(authenticator: &Authenticator) -> Result<&str, MfaError> {
    authenticator.data["secret"]
        .as_str()
        .ok_or_else(|| MfaError::InvalidData("TOTP authenticator without secret".to_string()))
}

/// Check `code` against a stored TOTP authenticator. A code is accepted once per period.
pub(crate) async fn validate_user_totp(
    authenticator: &Authenticator,
    code: &str,
) -> Result<bool, MfaError> {
    let secret = authenticator_secret(authenticator)?;
    if !validate_totp_code(secret, code)? {
        return Ok(false);
    }

    let key = format!("user={}&code={}", authenticator.user_id, code.trim());
    let first_use =
        store_cache_if_absent::<_, MfaError>(USED_CODE_CACHE_PREFIX, &key, &"y", *MFA_TOTP_PERIOD)
            .await?;
    if !first_use {
        tracing::warn!(user_id = %authenticator.user_id, "Rejected reused TOTP code");
    }
    Ok(first_use)
}

/// Activate TOTP with the secret pending in the session. Recovery codes are
/// generated alongside when the user has none yet.
pub(crate) async fn activate_totp(
    session: &mut Session,
    user_id: &str,
    code: &str,
) -> Result<(Authenticator, Authenticator), MfaError> {
    if AuthenticatorStore::get_authenticator(user_id, AuthenticatorType::Totp)
        .await?
        .is_some()
    {
        return Err(MfaError::AlreadyActive);
    }

    let secret = session
        .get_data::<String>(SECRET_SESSION_KEY)?
        .ok_or(MfaError::NoPendingSecret)?;

    if !validate_totp_code(&secret, code)? {
        tracing::warn!(user_id = %user_id, "Incorrect code during TOTP activation");
        return Err(MfaError::IncorrectCode);
    }

    let authenticator = Authenticator::new(
        user_id,
        AuthenticatorType::Totp,
        json!({ "secret": secret }),
    );
    AuthenticatorStore::insert(&authenticator).await?;

    session.remove_data(SECRET_SESSION_KEY);
    save_session(session).await?;

    let recovery_codes = activate_recovery_codes(user_id).await?;
    tracing::info!(user_id = %user_id, "TOTP activated");
    Ok((authenticator, recovery_codes))
}

/// Remove TOTP, and the recovery codes when no other authenticator remains.
pub(crate) async fn deactivate_totp(user_id: &str) -> Result<(), MfaError> {
    let authenticator = AuthenticatorStore::get_authenticator(user_id, AuthenticatorType::Totp)
        .await?
        .ok_or(MfaError::NotFound)?;

    AuthenticatorStore::delete(&authenticator.id).await?;
    delete_dangling_recovery_codes(user_id).await?;
    tracing::info!(user_id = %user_id, "TOTP deactivated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::create_session;
    use crate::test_utils::{init_test_environment, unique_name};
    use serial_test::serial;

    // RFC 4226 appendix D secret "12345678901234567890"
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    #[test]
    fn test_hotp_rfc4226_vectors() {
        let expected = [755224, 287082, 359152, 969429, 338314];
        for (counter, value) in expected.iter().enumerate() {
            assert_eq!(hotp_value(RFC_SECRET, counter as u64).unwrap(), *value);
        }
    }

    #[test]
    fn test_hotp_accepts_lowercase_secret() {
        assert_eq!(
            hotp_value(&RFC_SECRET.to_lowercase(), 0).unwrap(),
            hotp_value(RFC_SECRET, 0).unwrap()
        );
        assert!(hotp_value("not base32!", 0).is_err());
    }

    #[test]
    fn test_format_hotp_value_zero_pads() {
        assert_eq!(format_hotp_value(42), "000042");
    }

    #[test]
    fn test_generated_secret_decodes() {
        let secret = generate_totp_secret().unwrap();
        assert_eq!(secret.len(), 32);
        assert_eq!(BASE32.decode(secret.as_bytes()).unwrap().len(), SECRET_LENGTH);
    }

    #[test]
    fn test_build_totp_url() {
        let url = build_totp_url("alice@example.com", "My Site", "ABC");
        assert_eq!(
            url,
            "otpauth://totp/alice%40example.com?secret=ABC&issuer=My+Site"
        );
    }

    #[test]
    fn test_secret_in_session_is_stable() {
        let mut session = create_session().unwrap();
        let first = get_totp_secret(&mut session, false).unwrap();
        assert_eq!(get_totp_secret(&mut session, false).unwrap(), first);
        assert_ne!(get_totp_secret(&mut session, true).unwrap(), first);
    }

    fn current_code(secret: &str) -> String {
        format_hotp_value(hotp_value(secret, hotp_counter_from_time()).unwrap())
    }

    #[tokio::test]
    #[serial]
    async fn test_activate_validate_and_deactivate() {
        init_test_environment().await;
        let user_id = unique_name("totp-user");
        let mut session = create_session().unwrap();

        assert!(matches!(
            activate_totp(&mut session, &user_id, "000000").await,
            Err(MfaError::NoPendingSecret)
        ));

        let secret = get_totp_secret(&mut session, false).unwrap();
        let code = current_code(&secret);
        let wrong = format_hotp_value((code.parse::<u32>().unwrap() + 1) % 1_000_000);
        assert!(matches!(
            activate_totp(&mut session, &user_id, &wrong).await,
            Err(MfaError::IncorrectCode)
        ));

        let (totp, codes) = activate_totp(&mut session, &user_id, &code).await.unwrap();
        assert_eq!(totp.kind, AuthenticatorType::Totp);
        assert_eq!(codes.kind, AuthenticatorType::RecoveryCodes);
        assert!(!session.has_data(SECRET_SESSION_KEY));

        let stored = AuthenticatorStore::get_authenticator(&user_id, AuthenticatorType::Totp)
            .await
            .unwrap()
            .unwrap();
        assert!(validate_user_totp(&stored, &code).await.unwrap());
        // Same code twice within one period is refused
        assert!(!validate_user_totp(&stored, &code).await.unwrap());

        deactivate_totp(&user_id).await.unwrap();
        assert!(
            AuthenticatorStore::get_authenticators(&user_id)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(matches!(
            deactivate_totp(&user_id).await,
            Err(MfaError::NotFound)
        ));
    }
}
