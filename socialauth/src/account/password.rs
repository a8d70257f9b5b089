use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use std::sync::LazyLock;

use crate::account::config::ACCOUNT_PASSWORD_MIN_LENGTH;
use crate::account::errors::AccountError;
use crate::utils::gen_random_bytes;

const MAX_PASSWORD_LENGTH: usize = 4096;

/// Hash compared against when the user does not exist, so the failure path
/// costs the same as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("dummy-password-for-timing").ok());

pub(crate) fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt_bytes = gen_random_bytes(16)?;
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| AccountError::PasswordHash(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountError::PasswordHash(e.to_string()))
}

/// False for malformed or unusable hashes.
pub(crate) fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

pub(crate) fn burn_dummy_verification(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

pub(crate) fn validate_password(password: &str) -> Result<(), AccountError> {
    let min_length = *ACCOUNT_PASSWORD_MIN_LENGTH;

    if password.chars().count() < min_length {
        return Err(AccountError::validation(
            "password",
            format!("This password is too short. It must contain at least {min_length} characters."),
        ));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AccountError::validation("password", "This password is too long."));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(AccountError::validation(
            "password",
            "This password is entirely numeric.",
        ));
    }
    Ok(())
}
