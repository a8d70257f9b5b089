use async_trait::async_trait;
use serde_json::Value;

use crate::providers::Provider;
use crate::providers::client::{fetch_json, get_client};
use crate::providers::errors::ProviderError;
use crate::providers::types::{CommonFields, TokenResponse};
use crate::socialaccount::{ProviderEmail, SocialApp};

use super::{str_field, uid_field};

pub(crate) struct TwitchProvider;

/// Helix wraps the user in `data[0]`.
fn first_user(response: Value) -> Result<Value, ProviderError> {
    response
        .get("data")
        .and_then(Value::as_array)
        .and_then(|users| users.first())
        .filter(|user| user.get("id").is_some())
        .cloned()
        .ok_or_else(|| ProviderError::InvalidProfile("Invalid data from Twitch API".to_string()))
}

#[async_trait]
impl Provider for TwitchProvider {
    fn id(&self) -> &'static str {
        "twitch"
    }

    fn name(&self) -> &'static str {
        "Twitch"
    }

    fn authorize_url(&self, _app: &SocialApp) -> String {
        "https://id.twitch.tv/oauth2/authorize".to_string()
    }

    fn access_token_url(&self, _app: &SocialApp) -> String {
        "https://id.twitch.tv/oauth2/token".to_string()
    }

    fn profile_url(&self, _app: &SocialApp) -> String {
        "https://api.twitch.tv/helix/users".to_string()
    }

    fn default_scope(&self) -> Vec<&'static str> {
        vec!["user:read:email"]
    }

    fn extract_uid(&self, data: &Value) -> Result<String, ProviderError> {
        uid_field(data, "id")
    }

    fn extract_common_fields(&self, data: &Value) -> CommonFields {
        CommonFields {
            email: str_field(data, "email"),
            username: str_field(data, "login"),
            name: str_field(data, "display_name"),
            ..Default::default()
        }
    }

    /// Twitch only returns the address once it is verified.
    fn extract_email_addresses(&self, data: &Value) -> Vec<ProviderEmail> {
        str_field(data, "email")
            .map(|email| ProviderEmail {
                email,
                verified: true,
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
        let request = get_client()?
            .get(self.profile_url(app))
            .bearer_auth(&token.access_token)
            .header("Client-ID", &app.client_id);
        first_user(fetch_json(request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_user_unwraps_helix_response() {
        let response = json!({
            "data": [{
                "id": "141981764",
                "login": "twitchdev",
                "display_name": "TwitchDev",
                "email": "not-real@email.com"
            }]
        });
        let user = first_user(response).unwrap();
        assert_eq!(TwitchProvider.extract_uid(&user).unwrap(), "141981764");
        assert_eq!(
            TwitchProvider.extract_common_fields(&user).name.as_deref(),
            Some("TwitchDev")
        );

        assert!(first_user(json!({"data": []})).is_err());
        assert!(first_user(json!({"data": [{"login": "x"}]})).is_err());
    }
}
