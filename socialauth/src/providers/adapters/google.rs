use async_trait::async_trait;
use serde_json::Value;

use crate::providers::Provider;
use crate::providers::client::get_json;
use crate::providers::errors::ProviderError;
use crate::providers::types::{CommonFields, TokenResponse};
use crate::socialaccount::{ProviderEmail, SOCIALACCOUNT_QUERY_EMAIL, SocialApp};

use super::openid_connect::verified_id_token_claims;
use super::{str_field, uid_field};

const GOOGLE_ISSUER: &str = "https://accounts.google.com";
const GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

pub(crate) struct GoogleProvider;

#[async_trait]
impl Provider for GoogleProvider {
    fn id(&self) -> &'static str {
        "google"
    }

    fn name(&self) -> &'static str {
        "Google"
    }

    fn authorize_url(&self, _app: &SocialApp) -> String {
        "https://accounts.google.com/o/oauth2/v2/auth".to_string()
    }

    fn access_token_url(&self, _app: &SocialApp) -> String {
        "https://oauth2.googleapis.com/token".to_string()
    }

    fn profile_url(&self, _app: &SocialApp) -> String {
        "https://openidconnect.googleapis.com/v1/userinfo".to_string()
    }

    fn default_scope(&self) -> Vec<&'static str> {
        if *SOCIALACCOUNT_QUERY_EMAIL {
            vec!["openid", "profile", "email"]
        } else {
            vec!["openid", "profile"]
        }
    }

    fn uses_pkce(&self) -> bool {
        true
    }

    fn uses_nonce(&self) -> bool {
        true
    }

    fn extra_authorize_params(&self, _app: &SocialApp) -> Vec<(String, String)> {
        vec![("access_type".to_string(), "online".to_string())]
    }

    /// ID tokens carry `sub`; the legacy userinfo endpoint used `id`.
    fn extract_uid(&self, data: &Value) -> Result<String, ProviderError> {
        uid_field(data, "sub").or_else(|_| uid_field(data, "id"))
    }

    fn extract_common_fields(&self, data: &Value) -> CommonFields {
        CommonFields {
            email: str_field(data, "email"),
            first_name: str_field(data, "given_name"),
            last_name: str_field(data, "family_name"),
            name: str_field(data, "name"),
            ..Default::default()
        }
    }

    fn extract_email_addresses(&self, data: &Value) -> Vec<ProviderEmail> {
        let verified = ["email_verified", "verified_email"]
            .iter()
            .any(|key| data.get(*key).and_then(Value::as_bool) == Some(true));
        str_field(data, "email")
            .map(|email| ProviderEmail {
                email,
                verified,
                primary: true,
            })
            .into_iter()
            .collect()
    }

    async fn complete_login(
        &self,
        app: &SocialApp,
        token: &TokenResponse,
        nonce: Option<&str>,
    ) -> Result<Value, ProviderError> {
        match token.id_token.as_deref() {
            Some(id_token) => {
                verified_id_token_claims(id_token, GOOGLE_JWKS_URL, GOOGLE_ISSUER, &app.client_id, nonce)
                    .await
            }
            None => get_json(&self.profile_url(app), &token.access_token).await,
        }
    }
}
