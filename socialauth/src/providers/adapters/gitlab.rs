use async_trait::async_trait;
use serde_json::Value;

use crate::providers::Provider;
use crate::providers::errors::ProviderError;
use crate::providers::types::CommonFields;
use crate::socialaccount::{ProviderEmail, SocialApp};

use super::{server_url, str_field, uid_field};

const GITLAB_URL: &str = "https://gitlab.com";

pub(crate) struct GitLabProvider;

#[async_trait]
impl Provider for GitLabProvider {
    fn id(&self) -> &'static str {
        "gitlab"
    }

    fn name(&self) -> &'static str {
        "GitLab"
    }

    fn authorize_url(&self, app: &SocialApp) -> String {
        format!("{}/oauth/authorize", server_url(app, GITLAB_URL))
    }

    fn access_token_url(&self, app: &SocialApp) -> String {
        format!("{}/oauth/token", server_url(app, GITLAB_URL))
    }

    fn profile_url(&self, app: &SocialApp) -> String {
        format!("{}/api/v4/user", server_url(app, GITLAB_URL))
    }

    fn default_scope(&self) -> Vec<&'static str> {
        vec!["read_user"]
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
            username: str_field(data, "username"),
            name: str_field(data, "name"),
            ..Default::default()
        }
    }

    /// GitLab reports confirmation as a timestamp.
    fn extract_email_addresses(&self, data: &Value) -> Vec<ProviderEmail> {
        str_field(data, "email")
            .map(|email| ProviderEmail {
                email,
                verified: str_field(data, "confirmed_at").is_some(),
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
    fn test_extract_fields() {
        let data = json!({
            "id": 2,
            "username": "mr.bob",
            "email": "mr.bob@example.com",
            "name": "Mr Bob",
            "confirmed_at": "2015-03-02T16:53:58.370Z",
            "web_url": "https://gitlab.example.com/mr.bob"
        });
        assert_eq!(GitLabProvider.extract_uid(&data).unwrap(), "2");
        assert_eq!(
            GitLabProvider.extract_common_fields(&data).username.as_deref(),
            Some("mr.bob")
        );
        assert!(GitLabProvider.extract_email_addresses(&data)[0].verified);

        let unconfirmed = json!({"id": 3, "email": "x@example.com", "confirmed_at": null});
        assert!(!GitLabProvider.extract_email_addresses(&unconfirmed)[0].verified);
    }

    #[test]
    fn test_self_hosted_urls() {
        let mut app = crate::providers::test_support::app("gitlab");
        app.settings.insert(
            "server_url".to_string(),
            Value::String("https://gitlab.internal".to_string()),
        );
        assert_eq!(
            GitLabProvider.profile_url(&app),
            "https://gitlab.internal/api/v4/user"
        );
        assert_eq!(
            GitLabProvider.access_token_url(&app),
            "https://gitlab.internal/oauth/token"
        );
    }
}
