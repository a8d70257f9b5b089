use std::time::Duration;

use http::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::{ORIGIN, SA_ROUTE_PREFIX};
use crate::providers::errors::ProviderError;
use crate::providers::types::TokenResponse;
use crate::socialaccount::SocialApp;
use crate::utils::{base64url_encode, gen_random_string};

use super::Provider;

const USER_AGENT: &str = concat!("socialauth/", env!("CARGO_PKG_VERSION"));

/// HTTP client for provider calls. Requests time out after 30 seconds;
/// idle connections are pooled per host.
pub(crate) fn get_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(32)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ProviderError::FetchUserInfo(format!("Failed to create HTTP client: {e}")))
}

/// Where the provider sends the user back.
pub(crate) fn callback_url(provider_id: &str) -> String {
    format!(
        "{}{}/{}/login/callback/",
        ORIGIN.as_str(),
        SA_ROUTE_PREFIX.as_str(),
        provider_id
    )
}

/// PKCE verifier and its S256 challenge.
pub(crate) fn pkce_pair() -> Result<(String, String), ProviderError> {
    let verifier = gen_random_string(32)?;
    let challenge = base64url_encode(&Sha256::digest(verifier.as_bytes()));
    Ok((verifier, challenge))
}

/// Scope to request: the caller's, else the app's configured one, else the provider default.
pub(crate) fn resolve_scope(
    provider: &dyn Provider,
    app: &SocialApp,
    requested: Option<&str>,
) -> String {
    let configured = requested
        .or_else(|| app.setting_str("scope"))
        .map(|s| {
            s.split([',', ' '])
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });
    let scope = configured.unwrap_or_else(|| {
        provider
            .default_scope()
            .into_iter()
            .map(str::to_string)
            .collect()
    });
    let mut deduped: Vec<String> = Vec::new();
    for item in scope {
        if !deduped.contains(&item) {
            deduped.push(item);
        }
    }
    deduped.join(provider.scope_delimiter())
}

pub(crate) fn build_authorize_url(
    base: &str,
    params: &[(String, String)],
) -> Result<String, ProviderError> {
    let params = params.iter().filter(|(_, v)| !v.is_empty());
    Url::parse_with_params(base, params)
        .map(String::from)
        .map_err(|e| ProviderError::InvalidProfile(format!("Invalid authorize URL {base}: {e}")))
}

/// Trade the authorization code for tokens.
pub(crate) async fn exchange_code(
    provider: &dyn Provider,
    app: &SocialApp,
    code: &str,
    pkce_verifier: Option<&str>,
) -> Result<TokenResponse, ProviderError> {
    let mut form = vec![
        ("grant_type", "authorization_code".to_string()),
        ("code", code.to_string()),
        ("redirect_uri", callback_url(provider.id())),
    ];
    if !provider.basic_auth() {
        form.push(("client_id", app.client_id.clone()));
        form.push(("client_secret", app.secret.clone()));
    }
    if let Some(verifier) = pkce_verifier {
        form.push(("code_verifier", verifier.to_string()));
    }

    let mut request = get_client()?
        .post(provider.access_token_url(app))
        .header(ACCEPT, "application/json")
        .form(&form);
    if provider.basic_auth() {
        request = request.basic_auth(&app.client_id, Some(&app.secret));
    }

    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::TokenExchange(e.to_string()))?;
    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::TokenExchange(e.to_string()))?;

    if !status.is_success() {
        tracing::error!(provider = %provider.id(), %status, "Token exchange failed");
        return Err(ProviderError::TokenExchange(format!(
            "Unexpected status {status}"
        )));
    }

    let fields = parse_token_body(&body, is_json);
    TokenResponse::from_fields(fields).ok_or_else(|| {
        tracing::error!(provider = %provider.id(), "Token response without access token");
        ProviderError::TokenExchange("Error retrieving access token".to_string())
    })
}

fn parse_token_body(body: &str, is_json: bool) -> Map<String, Value> {
    if is_json || body.trim_start().starts_with('{') {
        if let Ok(Value::Object(map)) = serde_json::from_str(body) {
            return map;
        }
    }
    url::form_urlencoded::parse(body.as_bytes())
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect()
}

/// Send `request` and decode the JSON body, failing on error statuses.
pub(crate) async fn fetch_json(request: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::FetchUserInfo(e.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::FetchUserInfo(e.to_string()))?;

    if !status.is_success() {
        tracing::error!(%status, "Provider API call failed");
        return Err(ProviderError::FetchUserInfo(format!(
            "Unexpected status {status}"
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| ProviderError::FetchUserInfo(format!("Failed to deserialize response body: {e}")))
}

/// GET `url` with a bearer token.
pub(crate) async fn get_json(url: &str, access_token: &str) -> Result<Value, ProviderError> {
    fetch_json(get_client()?.get(url).bearer_auth(access_token)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::get_provider;

    #[test]
    fn test_pkce_challenge_is_s256_of_verifier() {
        let (verifier, challenge) = pkce_pair().unwrap();
        assert_eq!(challenge, base64url_encode(&Sha256::digest(verifier.as_bytes())));
        assert_eq!(challenge.len(), 43);
        assert_ne!(verifier, challenge);
    }

    #[test]
    fn test_parse_token_body_formats() {
        let json = parse_token_body(r#"{"access_token":"a","expires_in":10}"#, true);
        assert_eq!(json["access_token"], "a");

        let form = parse_token_body("access_token=b&scope=user%3Aemail&token_type=bearer", false);
        assert_eq!(form["access_token"], "b");
        assert_eq!(form["scope"], "user:email");
    }

    #[test]
    fn test_build_authorize_url_skips_empty_params() {
        let url = build_authorize_url(
            "https://example.com/authorize",
            &[
                ("client_id".to_string(), "cid".to_string()),
                ("scope".to_string(), String::new()),
                ("redirect_uri".to_string(), "https://app/cb/".to_string()),
            ],
        )
        .unwrap();
        assert!(url.starts_with("https://example.com/authorize?client_id=cid"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp%2Fcb%2F"));
        assert!(!url.contains("scope="));
    }

    #[test]
    fn test_resolve_scope_precedence() {
        let provider = get_provider("discord").unwrap();
        let mut app = SocialApp {
            provider: "discord".to_string(),
            client_id: "cid".to_string(),
            secret: String::new(),
            key: None,
            settings: Map::new(),
        };
        assert_eq!(resolve_scope(provider, &app, None), "email identify");

        app.settings
            .insert("scope".to_string(), Value::String("identify,guilds".to_string()));
        assert_eq!(resolve_scope(provider, &app, None), "identify guilds");
        assert_eq!(resolve_scope(provider, &app, Some("email email")), "email");
    }
}
