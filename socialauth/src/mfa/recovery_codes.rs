//! Single-use recovery codes derived from a stored seed.
//!
//! Only the seed and a bit mask of consumed codes are persisted; the codes
//! themselves are recomputed on demand.

use data_encoding::HEXLOWER;
use ring::hmac;
use serde_json::json;

use crate::utils::gen_random_bytes;

use super::config::{MFA_RECOVERY_CODE_COUNT, MFA_RECOVERY_CODE_DIGITS};
use super::errors::MfaError;
use super::storage::AuthenticatorStore;
use super::types::{Authenticator, AuthenticatorType};

const SEED_BYTES: usize = 40;
const SHA1_DIGEST_LEN: usize = 20;

pub(crate) fn generate_seed() -> Result<String, MfaError> {
    Ok(HEXLOWER.encode(&gen_random_bytes(SEED_BYTES)?))
}

/// Codes for `seed`. Each code hashes every index label before it, so the
/// sequence is stable for a given seed, count and digit setting.
pub(crate) fn generate_codes(seed: &str) -> Vec<String> {
    let digits = *MFA_RECOVERY_CODE_DIGITS;
    let byte_count = ((digits / 2) as usize).min(SHA1_DIGEST_LEN);
    let modulus = 10u128.pow(digits);

    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, seed.as_bytes());
    let mut context = hmac::Context::with_key(&key);

    (0..*MFA_RECOVERY_CODE_COUNT)
        .map(|i| {
            context.update(format!("{i:>3},").as_bytes());
            let digest = context.clone().sign();
            let value = digest.as_ref()[..byte_count]
                .iter()
                .fold(0u128, |acc, b| (acc << 8) | u128::from(*b));
            format!("{:0width$}", value % modulus, width = digits as usize)
        })
        .collect()
}

fn seed_and_mask(authenticator: &Authenticator) -> Result<(&str, u64), MfaError> {
    let seed = authenticator.data["seed"]
        .as_str()
        .ok_or_else(|| MfaError::InvalidData("Recovery codes without seed".to_string()))?;
    let used_mask = authenticator.data["used_mask"].as_u64().unwrap_or(0);
    Ok((seed, used_mask))
}

pub(crate) fn unused_codes(authenticator: &Authenticator) -> Result<Vec<String>, MfaError> {
    let (seed, used_mask) = seed_and_mask(authenticator)?;
    Ok(generate_codes(seed)
        .into_iter()
        .enumerate()
        .filter(|(i, _)| used_mask & (1 << i) == 0)
        .map(|(_, code)| code)
        .collect())
}

/// Consume `code` if it is one of the unused codes.
pub(crate) async fn validate_recovery_code(
    authenticator: &mut Authenticator,
    code: &str,
) -> Result<bool, MfaError> {
    let (seed, used_mask) = seed_and_mask(authenticator)?;
    let code = code.trim();

    let Some(index) = generate_codes(seed)
        .iter()
        .enumerate()
        .position(|(i, c)| used_mask & (1 << i) == 0 && c == code)
    else {
        return Ok(false);
    };

    let used_mask = used_mask | (1 << index);
    authenticator.data["used_mask"] = json!(used_mask);
    AuthenticatorStore::update_data(&authenticator.id, &authenticator.data).await?;
    tracing::info!(user_id = %authenticator.user_id, "Recovery code used");
    Ok(true)
}

/// Recovery codes for the user, created on first call.
pub(crate) async fn activate_recovery_codes(user_id: &str) -> Result<Authenticator, MfaError> {
    if let Some(existing) =
        AuthenticatorStore::get_authenticator(user_id, AuthenticatorType::RecoveryCodes).await?
    {
        return Ok(existing);
    }

    let authenticator = Authenticator::new(
        user_id,
        AuthenticatorType::RecoveryCodes,
        json!({ "seed": generate_seed()?, "used_mask": 0 }),
    );
    AuthenticatorStore::insert(&authenticator).await?;
    Ok(authenticator)
}

/// Replace the seed, invalidating every previously issued code.
pub(crate) async fn regenerate_recovery_codes(user_id: &str) -> Result<Authenticator, MfaError> {
    match AuthenticatorStore::get_authenticator(user_id, AuthenticatorType::RecoveryCodes).await? {
        Some(mut existing) => {
            existing.data = json!({ "seed": generate_seed()?, "used_mask": 0 });
            AuthenticatorStore::update_data(&existing.id, &existing.data).await?;
            tracing::info!(user_id = %user_id, "Recovery codes regenerated");
            Ok(existing)
        }
        None => activate_recovery_codes(user_id).await,
    }
}

/// Recovery codes alone are not a second factor; drop them once nothing else is left.
pub(crate) async fn delete_dangling_recovery_codes(user_id: &str) -> Result<(), MfaError> {
    let authenticators = AuthenticatorStore::get_authenticators(user_id).await?;
    if authenticators
        .iter()
        .all(|a| a.kind == AuthenticatorType::RecoveryCodes)
    {
        for authenticator in authenticators {
            AuthenticatorStore::delete(&authenticator.id).await?;
        }
    }
    Ok(())
}
