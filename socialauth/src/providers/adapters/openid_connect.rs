use async_trait::async_trait;
use serde_json::Value;

use crate::jwt::{verify_and_decode, verify_jti};
use crate::providers::Provider;
use crate::providers::client::get_json;
use crate::providers::discovery::fetch_oidc_discovery;
use crate::providers::errors::ProviderError;
use crate::providers::types::{CommonFields, TokenResponse};
use crate::socialaccount::{ProviderEmail, SocialApp};

use super::{single_email, str_field, uid_field};

/// Generic OpenID Connect provider configured by its issuer URL.
pub(crate) struct OpenIdConnectProvider;

/// Verify an ID token and check its nonce and `jti`.
pub(super) async fn verified_id_token_claims(
    id_token: &str,
    jwks_url: &str,
    issuer: &str,
    audience: &str,
    nonce: Option<&str>,
) -> Result<Value, ProviderError> {
    let claims = verify_and_decode(id_token, jwks_url, issuer, audience).await?;

    if let Some(expected) = nonce {
        let actual = claims.get("nonce").and_then(Value::as_str);
        if actual != Some(expected) {
            tracing::warn!(issuer = %issuer, "ID token nonce mismatch");
            return Err(ProviderError::NonceMismatch);
        }
    }

    verify_jti(&claims).await?;
    Ok(Value::Object(claims))
}

fn setting(app: &SocialApp, name: &str) -> String {
    app.setting_str(name).unwrap_or_default().to_string()
}

#[async_trait]
impl Provider for OpenIdConnectProvider {
    fn id(&self) -> &'static str {
        "openid_connect"
    }

    fn name(&self) -> &'static str {
        "OpenID Connect"
    }

    fn authorize_url(&self, app: &SocialApp) -> String {
        setting(app, "authorization_endpoint")
    }

    fn access_token_url(&self, app: &SocialApp) -> String {
        setting(app, "token_endpoint")
    }

    fn profile_url(&self, app: &SocialApp) -> String {
        setting(app, "userinfo_endpoint")
    }

    fn default_scope(&self) -> Vec<&'static str> {
        vec!["openid", "profile", "email"]
    }

    fn uses_pkce(&self) -> bool {
        true
    }

    fn uses_nonce(&self) -> bool {
        true
    }

    fn extract_uid(&self, data: &Value) -> Result<String, ProviderError> {
        uid_field(data, "sub")
    }

    fn extract_common_fields(&self, data: &Value) -> CommonFields {
        CommonFields {
            email: str_field(data, "email"),
            username: str_field(data, "preferred_username"),
            first_name: str_field(data, "given_name"),
            last_name: str_field(data, "family_name"),
            name: str_field(data, "name"),
        }
    }

    fn extract_email_addresses(&self, data: &Value) -> Vec<ProviderEmail> {
        single_email(data, "email", "email_verified")
    }

    /// Fill the endpoints in from the issuer's discovery document.
    async fn prepare_app(&self, mut app: SocialApp) -> Result<SocialApp, ProviderError> {
        let server_url = app
            .setting_str("server_url")
            .ok_or_else(|| ProviderError::NotConfigured(format!("{}: missing server URL", app.provider)))?
            .to_string();
        let document = fetch_oidc_discovery(&server_url).await?;

        let mut put = |name: &str, value: String| {
            app.settings.insert(name.to_string(), Value::String(value));
        };
        put("issuer", document.issuer);
        put("authorization_endpoint", document.authorization_endpoint);
        put("token_endpoint", document.token_endpoint);
        put("jwks_uri", document.jwks_uri);
        if let Some(userinfo) = document.userinfo_endpoint {
            put("userinfo_endpoint", userinfo);
        }
        Ok(app)
    }

    /// Claims come from the ID token, overlaid by the userinfo response when
    /// the issuer has that endpoint.
    async fn complete_login(
        &self,
        app: &SocialApp,
        token: &TokenResponse,
        nonce: Option<&str>,
    ) -> Result<Value, ProviderError> {
        let mut data = match token.id_token.as_deref() {
            Some(id_token) => {
                verified_id_token_claims(
                    id_token,
                    &setting(app, "jwks_uri"),
                    &setting(app, "issuer"),
                    &app.client_id,
                    nonce,
                )
                .await?
            }
            None => Value::Object(Default::default()),
        };

        let userinfo_url = self.profile_url(app);
        if !userinfo_url.is_empty() {
            let userinfo = get_json(&userinfo_url, &token.access_token).await?;
            merge_userinfo(&mut data, userinfo)?;
        }
        Ok(data)
    }
}

/// Userinfo must describe the ID token's subject.
fn merge_userinfo(claims: &mut Value, userinfo: Value) -> Result<(), ProviderError> {
    let (Some(claims), Value::Object(userinfo)) = (claims.as_object_mut(), userinfo) else {
        return Err(ProviderError::InvalidProfile("Userinfo is not an object".to_string()));
    };
    if let (Some(sub), Some(info_sub)) = (claims.get("sub"), userinfo.get("sub")) {
        if sub != info_sub {
            tracing::warn!("Userinfo subject does not match ID token");
            return Err(ProviderError::InvalidProfile("Userinfo subject mismatch".to_string()));
        }
    }
    claims.extend(userinfo);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::discovery::{OidcDiscoveryDocument, seed_discovery_cache};
    use crate::test_utils::init_test_environment;
    use serde_json::json;
    use serial_test::serial;

    #[test]
    fn test_extract_fields() {
        let data = json!({
            "sub": "248289761001",
            "name": "Jane Doe",
            "given_name": "Jane",
            "family_name": "Doe",
            "preferred_username": "j.doe",
            "email": "janedoe@example.com",
            "email_verified": true
        });
        assert_eq!(OpenIdConnectProvider.extract_uid(&data).unwrap(), "248289761001");
        let fields = OpenIdConnectProvider.extract_common_fields(&data);
        assert_eq!(fields.username.as_deref(), Some("j.doe"));
        assert_eq!(fields.last_name.as_deref(), Some("Doe"));
        assert!(OpenIdConnectProvider.extract_email_addresses(&data)[0].verified);
    }

    #[test]
    fn test_merge_userinfo_requires_same_subject() {
        let mut claims = json!({"sub": "1", "email": "a@example.com"});
        merge_userinfo(&mut claims, json!({"sub": "1", "name": "A"})).unwrap();
        assert_eq!(claims["name"], "A");
        assert_eq!(claims["email"], "a@example.com");

        let mut claims = json!({"sub": "1"});
        assert!(merge_userinfo(&mut claims, json!({"sub": "2"})).is_err());
    }

    #[tokio::test]
    #[serial]
    async fn test_prepare_app_fills_endpoints_from_discovery() {
        init_test_environment().await;
        let document: OidcDiscoveryDocument = serde_json::from_value(json!({
            "issuer": "https://idp.example.com",
            "authorization_endpoint": "https://idp.example.com/oauth2/authorize",
            "token_endpoint": "https://idp.example.com/oauth2/token",
            "userinfo_endpoint": "https://idp.example.com/oauth2/userinfo",
            "jwks_uri": "https://idp.example.com/oauth2/jwks"
        }))
        .unwrap();
        seed_discovery_cache("https://idp.example.com", &document).await;

        let mut app = crate::providers::test_support::app("openid_connect");
        app.settings.insert(
            "server_url".to_string(),
            Value::String("https://idp.example.com".to_string()),
        );
        let app = OpenIdConnectProvider.prepare_app(app).await.unwrap();
        assert_eq!(
            OpenIdConnectProvider.authorize_url(&app),
            "https://idp.example.com/oauth2/authorize"
        );
        assert_eq!(app.setting_str("jwks_uri"), Some("https://idp.example.com/oauth2/jwks"));

        let app = crate::providers::test_support::app("openid_connect");
        assert!(matches!(
            OpenIdConnectProvider.prepare_app(app).await,
            Err(ProviderError::NotConfigured(_))
        ));
    }
}
