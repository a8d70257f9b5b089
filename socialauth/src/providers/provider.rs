use async_trait::async_trait;
use serde_json::Value;

use crate::providers::errors::ProviderError;
use crate::providers::types::{CommonFields, TokenResponse};
use crate::socialaccount::{ProviderEmail, SocialApp};

use super::client::get_json;

/// One OAuth2 identity provider: its endpoints and how its profile JSON maps
/// onto a local user.
#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn authorize_url(&self, app: &SocialApp) -> String;

    fn access_token_url(&self, app: &SocialApp) -> String;

    fn profile_url(&self, app: &SocialApp) -> String;

    fn default_scope(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn scope_delimiter(&self) -> &'static str {
        " "
    }

    fn uses_pkce(&self) -> bool {
        false
    }

    /// Send a nonce with the authorization request and expect it back in the ID token.
    fn uses_nonce(&self) -> bool {
        false
    }

    /// Authenticate to the token endpoint with HTTP basic auth instead of form fields.
    fn basic_auth(&self) -> bool {
        false
    }

    fn extra_authorize_params(&self, _app: &SocialApp) -> Vec<(String, String)> {
        Vec::new()
    }

    fn extract_uid(&self, data: &Value) -> Result<String, ProviderError>;

    fn extract_common_fields(&self, data: &Value) -> CommonFields;

    fn extract_email_addresses(&self, _data: &Value) -> Vec<ProviderEmail> {
        Vec::new()
    }

    fn extract_extra_data(&self, data: &Value) -> Value {
        data.clone()
    }

    /// Resolve anything the app needs at runtime, such as discovered endpoints.
    async fn prepare_app(&self, app: SocialApp) -> Result<SocialApp, ProviderError> {
        Ok(app)
    }

    /// Fetch the profile JSON for a freshly issued token.
    async fn complete_login(
        &self,
        app: &SocialApp,
        token: &TokenResponse,
        _nonce: Option<&str>,
    ) -> Result<Value, ProviderError> {
        get_json(&self.profile_url(app), &token.access_token).await
    }
}
