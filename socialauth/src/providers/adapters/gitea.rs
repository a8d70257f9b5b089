use async_trait::async_trait;
use serde_json::Value;

use crate::providers::Provider;
use crate::providers::errors::ProviderError;
use crate::providers::types::CommonFields;
use crate::socialaccount::{ProviderEmail, SocialApp};

use super::{server_url, str_field, uid_field};

const GITEA_URL: &str = "https://gitea.com";

pub(crate) struct GiteaProvider;

#[async_trait]
impl Provider for GiteaProvider {
    fn id(&self) -> &'static str {
        "gitea"
    }

    fn name(&self) -> &'static str {
        "Gitea"
    }

    fn authorize_url(&self, app: &SocialApp) -> String {
        format!("{}/login/oauth/authorize", server_url(app, GITEA_URL))
    }

    fn access_token_url(&self, app: &SocialApp) -> String {
        format!("{}/login/oauth/access_token", server_url(app, GITEA_URL))
    }

    fn profile_url(&self, app: &SocialApp) -> String {
        format!("{}/api/v1/user", server_url(app, GITEA_URL))
    }

    fn uses_pkce(&self) -> bool {
        true
    }

    fn extract_uid(&self, data: &Value) -> Result<String, ProviderError> {
        uid_field(data, "id")
    }

    fn extract_common_fields(&self, data: &Value) -> CommonFields {
        CommonFields {
            email: str_field(data, "email"),
            username: str_field(data, "username").or_else(|| str_field(data, "login")),
            name: str_field(data, "full_name"),
            ..Default::default()
        }
    }

    /// Gitea does not report whether the address was confirmed.
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_fields_with_null_username() {
        let data = json!({
            "id": 4940,
            "login": "giteauser",
            "full_name": "",
            "email": "giteauser@example.com",
            "active": true,
            "username": null
        });
        assert_eq!(GiteaProvider.extract_uid(&data).unwrap(), "4940");
        let fields = GiteaProvider.extract_common_fields(&data);
        assert_eq!(fields.username.as_deref(), Some("giteauser"));
        assert_eq!(fields.name, None);
        assert!(!GiteaProvider.extract_email_addresses(&data)[0].verified);
    }
}
