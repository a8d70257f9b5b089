use serde::{Deserialize, Serialize};

use crate::providers::client::{fetch_json, get_client};
use crate::providers::errors::ProviderError;
use crate::storage::{get_data, store_cache_keyed};

const DISCOVERY_CACHE_PREFIX: &str = "oidc_discovery";
const DISCOVERY_CACHE_TTL: u64 = 3600;
const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// OpenID Provider metadata, OpenID Connect Discovery 1.0 section 3.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OidcDiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: Option<String>,
    pub jwks_uri: String,
    pub scopes_supported: Option<Vec<String>>,
    pub id_token_signing_alg_values_supported: Option<Vec<String>>,
}

/// Discovery document for `server_url`, which may be the issuer or the
/// well-known URL itself. Cached per URL.
pub(crate) async fn fetch_oidc_discovery(
    server_url: &str,
) -> Result<OidcDiscoveryDocument, ProviderError> {
    let issuer_url = server_url
        .trim_end_matches('/')
        .trim_end_matches(WELL_KNOWN_PATH)
        .trim_end_matches('/');

    if let Some(document) =
        get_data::<OidcDiscoveryDocument, ProviderError>(DISCOVERY_CACHE_PREFIX, issuer_url).await?
    {
        return Ok(document);
    }

    let discovery_url = format!("{issuer_url}{WELL_KNOWN_PATH}");
    tracing::debug!("Fetching OIDC discovery from: {}", discovery_url);

    let value = fetch_json(get_client()?.get(&discovery_url))
        .await
        .map_err(|e| ProviderError::Discovery(e.to_string()))?;
    let document: OidcDiscoveryDocument = serde_json::from_value(value)
        .map_err(|e| ProviderError::Discovery(format!("Invalid discovery document: {e}")))?;
    check_issuer(&document, issuer_url)?;

    store_cache_keyed::<_, ProviderError>(
        DISCOVERY_CACHE_PREFIX,
        issuer_url,
        &document,
        DISCOVERY_CACHE_TTL,
    )
    .await?;

    tracing::debug!(
        authorization_endpoint = %document.authorization_endpoint,
        token_endpoint = %document.token_endpoint,
        "Fetched OIDC discovery document"
    );
    Ok(document)
}

fn check_issuer(document: &OidcDiscoveryDocument, issuer_url: &str) -> Result<(), ProviderError> {
    if document.issuer.trim_end_matches('/') != issuer_url {
        tracing::error!(
            "Issuer mismatch in discovery document. Expected: {}, Found: {}",
            issuer_url,
            document.issuer
        );
        return Err(ProviderError::Discovery(format!(
            "Issuer mismatch: discovered={}, expected={issuer_url}",
            document.issuer
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) async fn seed_discovery_cache(server_url: &str, document: &OidcDiscoveryDocument) {
    store_cache_keyed::<_, ProviderError>(
        DISCOVERY_CACHE_PREFIX,
        server_url.trim_end_matches('/'),
        document,
        DISCOVERY_CACHE_TTL,
    )
    .await
    .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_environment;
    use serde_json::json;
    use serial_test::serial;

    fn document(issuer: &str) -> OidcDiscoveryDocument {
        serde_json::from_value(json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{issuer}/authorize"),
            "token_endpoint": format!("{issuer}/token"),
            "jwks_uri": format!("{issuer}/jwks"),
            "response_types_supported": ["code"]
        }))
        .unwrap()
    }

    #[test]
    fn test_minimal_document_and_issuer_check() {
        let doc = document("https://idp.example.com");
        assert!(doc.userinfo_endpoint.is_none());
        assert!(check_issuer(&doc, "https://idp.example.com").is_ok());
        assert!(matches!(
            check_issuer(&doc, "https://evil.example.com"),
            Err(ProviderError::Discovery(_))
        ));
    }

    #[tokio::test]
    #[serial]
    async fn test_cached_document_accepts_well_known_url() {
        init_test_environment().await;
        seed_discovery_cache("https://cached.example.com", &document("https://cached.example.com"))
            .await;

        let doc = fetch_oidc_discovery("https://cached.example.com/.well-known/openid-configuration")
            .await
            .unwrap();
        assert_eq!(doc.token_endpoint, "https://cached.example.com/token");
    }
}
