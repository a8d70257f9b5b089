use async_trait::async_trait;
use serde_json::Value;

use crate::providers::Provider;
use crate::providers::client::{fetch_json, get_client};
use crate::providers::errors::ProviderError;
use crate::providers::types::{CommonFields, TokenResponse};
use crate::socialaccount::{ProviderEmail, SOCIALACCOUNT_QUERY_EMAIL, SocialApp};

use super::{server_url, str_field, uid_field};

const GITHUB_URL: &str = "https://github.com";
const GITHUB_API_URL: &str = "https://api.github.com";

pub(crate) struct GitHubProvider;

impl GitHubProvider {
    /// GitHub Enterprise serves its API under `{server}/api/v3`.
    fn api_url(app: &SocialApp) -> String {
        match app.setting_str("server_url") {
            Some(url) => format!("{}/api/v3", url.trim_end_matches('/')),
            None => GITHUB_API_URL.to_string(),
        }
    }

    async fn fetch_emails(app: &SocialApp, access_token: &str) -> Result<Vec<Value>, ProviderError> {
        let response = get_client()?
            .get(format!("{}/user/emails", Self::api_url(app)))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::FetchUserInfo(e.to_string()))?;

        // Documented to happen for some token types
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(ProviderError::FetchUserInfo(format!(
                "Unexpected status {}",
                response.status()
            )));
        }
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| ProviderError::FetchUserInfo(e.to_string()))
    }
}

#[async_trait]
impl Provider for GitHubProvider {
    fn id(&self) -> &'static str {
        "github"
    }

    fn name(&self) -> &'static str {
        "GitHub"
    }

    fn authorize_url(&self, app: &SocialApp) -> String {
        format!("{}/login/oauth/authorize", server_url(app, GITHUB_URL))
    }

    fn access_token_url(&self, app: &SocialApp) -> String {
        format!("{}/login/oauth/access_token", server_url(app, GITHUB_URL))
    }

    fn profile_url(&self, app: &SocialApp) -> String {
        format!("{}/user", Self::api_url(app))
    }

    fn default_scope(&self) -> Vec<&'static str> {
        if *SOCIALACCOUNT_QUERY_EMAIL {
            vec!["user:email"]
        } else {
            Vec::new()
        }
    }

    fn extract_uid(&self, data: &Value) -> Result<String, ProviderError> {
        uid_field(data, "id")
    }

    fn extract_common_fields(&self, data: &Value) -> CommonFields {
        CommonFields {
            email: str_field(data, "email"),
            username: str_field(data, "login"),
            name: str_field(data, "name"),
            ..Default::default()
        }
    }

    fn extract_email_addresses(&self, data: &Value) -> Vec<ProviderEmail> {
        data.get("emails")
            .and_then(Value::as_array)
            .map(|emails| {
                emails
                    .iter()
                    .filter_map(|e| {
                        Some(ProviderEmail {
                            email: str_field(e, "email")?,
                            verified: e.get("verified").and_then(Value::as_bool).unwrap_or(false),
                            primary: e.get("primary").and_then(Value::as_bool).unwrap_or(false),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn extract_extra_data(&self, data: &Value) -> Value {
        let mut data = data.clone();
        if let Some(map) = data.as_object_mut() {
            map.remove("emails");
        }
        data
    }

    async fn complete_login(
        &self,
        app: &SocialApp,
        token: &TokenResponse,
        _nonce: Option<&str>,
    ) -> Result<Value, ProviderError> {
        let request = get_client()?
            .get(self.profile_url(app))
            .bearer_auth(&token.access_token);
        let mut data = fetch_json(request).await?;

        if *SOCIALACCOUNT_QUERY_EMAIL {
            let emails = Self::fetch_emails(app, &token.access_token).await?;
            if str_field(&data, "email").is_none() {
                let primary = emails
                    .iter()
                    .find(|e| e.get("primary").and_then(Value::as_bool) == Some(true))
                    .or_else(|| emails.first())
                    .and_then(|e| str_field(e, "email"));
                if let (Some(map), Some(email)) = (data.as_object_mut(), primary) {
                    map.insert("email".to_string(), Value::String(email));
                }
            }
            if let Some(map) = data.as_object_mut() {
                map.insert("emails".to_string(), Value::Array(emails));
            }
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile() -> Value {
        json!({
            "login": "octocat",
            "id": 1,
            "avatar_url": "https://github.com/images/error/octocat_happy.gif",
            "html_url": "https://github.com/octocat",
            "name": "monalisa octocat",
            "email": null,
            "emails": [
                {"email": "octocat@github.com", "verified": true, "primary": true},
                {"email": "old@example.com", "verified": false, "primary": false}
            ]
        })
    }

    #[test]
    fn test_extract_fields() {
        let data = profile();
        assert_eq!(GitHubProvider.extract_uid(&data).unwrap(), "1");

        let fields = GitHubProvider.extract_common_fields(&data);
        assert_eq!(fields.username.as_deref(), Some("octocat"));
        assert_eq!(fields.name.as_deref(), Some("monalisa octocat"));
        assert_eq!(fields.email, None);

        let emails = GitHubProvider.extract_email_addresses(&data);
        assert_eq!(emails.len(), 2);
        assert!(emails[0].primary && emails[0].verified);
        assert!(!emails[1].verified);

        let extra = GitHubProvider.extract_extra_data(&data);
        assert!(extra.get("emails").is_none());
        assert_eq!(extra["html_url"], "https://github.com/octocat");
    }

    #[test]
    fn test_enterprise_urls() {
        let mut app = crate::providers::test_support::app("github");
        assert_eq!(GitHubProvider.profile_url(&app), "https://api.github.com/user");

        app.settings.insert(
            "server_url".to_string(),
            Value::String("https://git.example.com/".to_string()),
        );
        assert_eq!(
            GitHubProvider.authorize_url(&app),
            "https://git.example.com/login/oauth/authorize"
        );
        assert_eq!(
            GitHubProvider.profile_url(&app),
            "https://git.example.com/api/v3/user"
        );
    }
}
