use std::time::Duration;

use jsonwebtoken::jwk::JwkSet;

use crate::jwt::errors::JwtError;
use crate::storage::{get_data, store_cache_keyed};

const JWKS_CACHE_PREFIX: &str = "jwks";
const JWKS_CACHE_TTL: u64 = 600;

/// Key set published at `jwks_url`, served from the cache while it is fresh.
pub(super) async fn fetch_jwks(jwks_url: &str) -> Result<JwkSet, JwtError> {
    if let Some(jwks) = get_data::<JwkSet, JwtError>(JWKS_CACHE_PREFIX, jwks_url).await? {
        tracing::debug!("Returning cached JWKs");
        return Ok(jwks);
    }

    let jwks = fetch_jwks_no_cache(jwks_url).await?;
    store_cache_keyed::<_, JwtError>(JWKS_CACHE_PREFIX, jwks_url, &jwks, JWKS_CACHE_TTL).await?;
    tracing::debug!(keys = jwks.keys.len(), "JWKs fetched from URL");
    Ok(jwks)
}

async fn fetch_jwks_no_cache(jwks_url: &str) -> Result<JwkSet, JwtError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| JwtError::JwksFetch(e.to_string()))?;

    let response = client
        .get(jwks_url)
        .send()
        .await
        .map_err(|e| JwtError::JwksFetch(e.to_string()))?;

    if !response.status().is_success() {
        tracing::error!(status = %response.status(), "JWKS fetch failed");
        return Err(JwtError::JwksFetch(format!(
            "Unexpected status {}",
            response.status()
        )));
    }

    response
        .json::<JwkSet>()
        .await
        .map_err(|e| JwtError::JwksFetch(format!("Failed to parse JWKS: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_environment;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn test_cached_jwks_is_served_without_fetch() {
        init_test_environment().await;
        let jwks: JwkSet = serde_json::from_value(serde_json::json!({
            "keys": [{
                "kty": "oct",
                "kid": "test-key",
                "alg": "HS256",
                "k": "c2VjcmV0LWtleS1mb3ItdGVzdHM"
            }]
        }))
        .unwrap();

        // Unroutable URL; the fetch would fail if the cache were bypassed
        let url = "http://127.0.0.1:9/jwks.json";
        store_cache_keyed::<_, JwtError>(JWKS_CACHE_PREFIX, url, &jwks, 60)
            .await
            .unwrap();

        let fetched = fetch_jwks(url).await.unwrap();
        assert!(fetched.find("test-key").is_some());
    }
}
