use chrono::Utc;
use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use serde_json::{Map, Value};

use crate::jwt::errors::JwtError;
use crate::storage::store_cache_if_absent;

use super::jwks::fetch_jwks;

const JTI_CACHE_PREFIX: &str = "jwt_jti";

pub type Claims = Map<String, Value>;

/// Verify the signature of `credential` against the provider's key set and
/// check `iss`, `aud` and the time claims.
pub async fn verify_and_decode(
    credential: &str,
    jwks_url: &str,
    issuer: &str,
    audience: &str,
) -> Result<Claims, JwtError> {
    let header = decode_header(credential)?;
    let kid = header
        .kid
        .ok_or_else(|| JwtError::MissingKeyComponent("kid".to_string()))?;

    let jwks = fetch_jwks(jwks_url).await?;
    let jwk = jwks.find(&kid).ok_or(JwtError::NoMatchingKey)?;
    let key = DecodingKey::from_jwk(jwk)?;

    decode_with_key(credential, &key, header.alg, issuer, audience)
}

pub(super) fn decode_with_key(
    credential: &str,
    key: &DecodingKey,
    alg: jsonwebtoken::Algorithm,
    issuer: &str,
    audience: &str,
) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(alg);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    validation.leeway = 2;

    let data = decode::<Claims>(credential, key, &validation).map_err(|e| {
        tracing::warn!("JWT validation failed: {}", e);
        JwtError::from(e)
    })?;
    Ok(data.claims)
}

/// Blacklist the token's `(iss, jti)` until it expires. A second use fails
/// with [`JwtError::Replayed`]. Tokens without `iss`, `exp` or `jti` are not
/// tracked.
pub async fn verify_jti(claims: &Claims) -> Result<(), JwtError> {
    let (Some(iss), Some(exp), Some(jti)) = (
        claims.get("iss").and_then(Value::as_str),
        claims.get("exp").and_then(Value::as_i64),
        claims.get("jti").and_then(Value::as_str),
    ) else {
        return Ok(());
    };

    let ttl = (exp - Utc::now().timestamp()).max(1) as u64;
    let key = format!("jwt:iss={iss},jti={jti}");
    let fresh = store_cache_if_absent::<_, JwtError>(JTI_CACHE_PREFIX, &key, &true, ttl).await?;
    if !fresh {
        tracing::warn!(iss = %iss, "Replayed JWT rejected");
        return Err(JwtError::Replayed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_test_environment, unique_name};
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use serde_json::json;
    use serial_test::serial;

    const SECRET: &[u8] = b"secret-key-for-tests";

    fn token(claims: Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    fn claims(iss: &str, aud: &str, exp_offset: i64) -> Value {
        json!({
            "iss": iss,
            "aud": aud,
            "sub": "user-1",
            "exp": Utc::now().timestamp() + exp_offset,
            "jti": unique_name("jti"),
        })
    }

    #[test]
    fn test_decode_checks_issuer_audience_and_expiry() {
        let key = DecodingKey::from_secret(SECRET);
        let good = token(claims("https://idp.example.com", "client", 300));
        let decoded = decode_with_key(
            &good,
            &key,
            Algorithm::HS256,
            "https://idp.example.com",
            "client",
        )
        .unwrap();
        assert_eq!(decoded["sub"], "user-1");

        for (iss, aud) in [("https://other.example.com", "client"), ("https://idp.example.com", "other")] {
            assert!(matches!(
                decode_with_key(&good, &key, Algorithm::HS256, iss, aud),
                Err(JwtError::InvalidToken(_))
            ));
        }

        let expired = token(claims("https://idp.example.com", "client", -3600));
        assert!(
            decode_with_key(&expired, &key, Algorithm::HS256, "https://idp.example.com", "client")
                .is_err()
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_jti_is_accepted_once() {
        init_test_environment().await;
        let claims = claims("https://idp.example.com", "client", 300);
        let claims = claims.as_object().unwrap().clone();

        verify_jti(&claims).await.unwrap();
        assert!(matches!(verify_jti(&claims).await, Err(JwtError::Replayed)));
    }

    #[tokio::test]
    #[serial]
    async fn test_jti_skipped_without_required_claims() {
        init_test_environment().await;
        let mut claims = claims("https://idp.example.com", "client", 300)
            .as_object()
            .unwrap()
            .clone();
        claims.remove("jti");

        verify_jti(&claims).await.unwrap();
        verify_jti(&claims).await.unwrap();
    }
}
