use async_trait::async_trait;
use serde_json::Value;

use crate::providers::Provider;
use crate::providers::errors::ProviderError;
use crate::providers::types::CommonFields;
use crate::socialaccount::{ProviderEmail, SocialApp};

use super::{single_email, str_field, uid_field};

pub(crate) struct DiscordProvider;

#[async_trait]
impl Provider for DiscordProvider {
    fn id(&self) -> &'static str {
        "discord"
    }

    fn name(&self) -> &'static str {
        "Discord"
    }

    fn authorize_url(&self, _app: &SocialApp) -> String {
        "https://discord.com/api/oauth2/authorize".to_string()
    }

    fn access_token_url(&self, _app: &SocialApp) -> String {
        "https://discord.com/api/oauth2/token".to_string()
    }

    fn profile_url(&self, _app: &SocialApp) -> String {
        "https://discord.com/api/users/@me".to_string()
    }

    fn default_scope(&self) -> Vec<&'static str> {
        vec!["email", "identify"]
    }

    fn uses_pkce(&self) -> bool {
        true
    }

    fn extract_uid(&self, data: &Value) -> Result<String, ProviderError> {
        uid_field(data, "id")
    }

    fn extract_common_fields(&self, data: &Value) -> CommonFields {
        let username = str_field(data, "username");
        CommonFields {
            email: str_field(data, "email"),
            name: str_field(data, "global_name").or_else(|| username.clone()),
            username,
            ..Default::default()
        }
    }

    fn extract_email_addresses(&self, data: &Value) -> Vec<ProviderEmail> {
        single_email(data, "email", "verified")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_fields() {
        let data = json!({
            "id": "80351110224678912",
            "username": "nelly",
            "global_name": "Nelly",
            "discriminator": "0",
            "email": "nelly@discord.com",
            "verified": true
        });
        assert_eq!(DiscordProvider.extract_uid(&data).unwrap(), "80351110224678912");
        let fields = DiscordProvider.extract_common_fields(&data);
        assert_eq!(fields.username.as_deref(), Some("nelly"));
        assert_eq!(fields.name.as_deref(), Some("Nelly"));
        assert!(DiscordProvider.extract_email_addresses(&data)[0].verified);

        let legacy = json!({"id": "1", "username": "old", "global_name": null});
        assert_eq!(
            DiscordProvider.extract_common_fields(&legacy).name.as_deref(),
            Some("old")
        );
    }
}
