use async_trait::async_trait;
use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::providers::Provider;
use crate::providers::client::{fetch_json, get_client};
use crate::providers::errors::ProviderError;
use crate::providers::types::{CommonFields, TokenResponse};
use crate::socialaccount::{ProviderEmail, SOCIALACCOUNT_QUERY_EMAIL, SocialApp};

use super::{str_field, uid_field};

const GRAPH_API_VERSION: &str = "v19.0";
const PROFILE_FIELDS: &str = "id,email,name,first_name,last_name,short_name";

pub(crate) struct FacebookProvider;

/// `appsecret_proof`: HMAC-SHA256 of the access token keyed by the app secret.
fn appsecret_proof(secret: &str, access_token: &str) -> Result<String, ProviderError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| ProviderError::FetchUserInfo(format!("Invalid app secret: {e}")))?;
    mac.update(access_token.as_bytes());
    Ok(HEXLOWER.encode(&mac.finalize().into_bytes()))
}

#[async_trait]
impl Provider for FacebookProvider {
    fn id(&self) -> &'static str {
        "facebook"
    }

    fn name(&self) -> &'static str {
        "Facebook"
    }

    fn authorize_url(&self, _app: &SocialApp) -> String {
        format!("https://www.facebook.com/{GRAPH_API_VERSION}/dialog/oauth")
    }

    fn access_token_url(&self, _app: &SocialApp) -> String {
        format!("https://graph.facebook.com/{GRAPH_API_VERSION}/oauth/access_token")
    }

    fn profile_url(&self, _app: &SocialApp) -> String {
        format!("https://graph.facebook.com/{GRAPH_API_VERSION}/me")
    }

    fn default_scope(&self) -> Vec<&'static str> {
        if *SOCIALACCOUNT_QUERY_EMAIL {
            vec!["email"]
        } else {
            Vec::new()
        }
    }

    fn scope_delimiter(&self) -> &'static str {
        ","
    }

    fn extract_uid(&self, data: &Value) -> Result<String, ProviderError> {
        uid_field(data, "id")
    }

    fn extract_common_fields(&self, data: &Value) -> CommonFields {
        CommonFields {
            email: str_field(data, "email"),
            username: str_field(data, "short_name"),
            first_name: str_field(data, "first_name"),
            last_name: str_field(data, "last_name"),
            name: str_field(data, "name"),
        }
    }

    /// Facebook addresses are not known to be verified.
    fn extract_email_addresses(&self, data: &Value) -> Vec<ProviderEmail> {
        str_field(data, "email")
            .map(|email| ProviderEmail {
                email,
                verified: false,
                primary: true,
            })
            .into_iter()
            .collect()
    }

    async fn complete_login(
        &self,
        app: &SocialApp,
        token: &TokenResponse,
        _nonce: Option<&str>,
    ) -> Result<Value, ProviderError> {
        let proof = appsecret_proof(&app.secret, &token.access_token)?;
        let request = get_client()?
            .get(self.profile_url(app))
            .bearer_auth(&token.access_token)
            .query(&[("fields", PROFILE_FIELDS), ("appsecret_proof", proof.as_str())]);
        fetch_json(request).await
    }
}
