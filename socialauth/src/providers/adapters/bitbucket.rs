use async_trait::async_trait;
use serde_json::Value;

use crate::providers::Provider;
use crate::providers::client::get_json;
use crate::providers::errors::ProviderError;
use crate::providers::types::{CommonFields, TokenResponse};
use crate::socialaccount::{ProviderEmail, SOCIALACCOUNT_QUERY_EMAIL, SocialApp};

use super::{str_field, uid_field};

const API_BASE: &str = "https://api.bitbucket.org/";
const EMAILS_URL: &str = "https://api.bitbucket.org/2.0/user/emails";
/// Upper bound on followed `next` links.
const MAX_EMAIL_PAGES: usize = 10;

pub(crate) struct BitbucketProvider;

/// Link to the following page of a paginated response. The access token goes
/// along, so only links back into the Bitbucket API are followed.
fn next_page(page: &Value, pages_read: usize) -> Option<String> {
    if pages_read >= MAX_EMAIL_PAGES {
        return None;
    }
    let next = str_field(page, "next")?;
    if next.starts_with(API_BASE) {
        Some(next)
    } else {
        tracing::warn!("Ignoring Bitbucket pagination link outside the API: {}", next);
        None
    }
}

#[async_trait]
impl Provider for BitbucketProvider {
    fn id(&self) -> &'static str {
        "bitbucket"
    }

    fn name(&self) -> &'static str {
        "Bitbucket"
    }

    fn authorize_url(&self, _app: &SocialApp) -> String {
        "https://bitbucket.org/site/oauth2/authorize".to_string()
    }

    fn access_token_url(&self, _app: &SocialApp) -> String {
        "https://bitbucket.org/site/oauth2/access_token".to_string()
    }

    fn profile_url(&self, _app: &SocialApp) -> String {
        "https://api.bitbucket.org/2.0/user".to_string()
    }

    fn default_scope(&self) -> Vec<&'static str> {
        vec!["account", "email"]
    }

    fn extract_uid(&self, data: &Value) -> Result<String, ProviderError> {
        uid_field(data, "uuid").or_else(|_| uid_field(data, "account_id"))
    }

    fn extract_common_fields(&self, data: &Value) -> CommonFields {
        CommonFields {
            email: str_field(data, "email"),
            username: str_field(data, "username").or_else(|| str_field(data, "nickname")),
            name: str_field(data, "display_name"),
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
                            verified: e.get("is_confirmed").and_then(Value::as_bool).unwrap_or(false),
                            primary: e.get("is_primary").and_then(Value::as_bool).unwrap_or(false),
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
        let mut data = get_json(&self.profile_url(app), &token.access_token).await?;
        if !*SOCIALACCOUNT_QUERY_EMAIL {
            return Ok(data);
        }

        let mut emails = Vec::new();
        let mut next = Some(EMAILS_URL.to_string());
        let mut pages = 0;
        while let Some(url) = next.take() {
            pages += 1;
            let page = get_json(&url, &token.access_token).await?;
            if let Some(values) = page.get("values").and_then(Value::as_array) {
                emails.extend(values.iter().cloned());
            }
            next = next_page(&page, pages);
        }

        let primary = emails
            .iter()
            .find(|e| e.get("is_primary").and_then(Value::as_bool) == Some(true))
            .or_else(|| emails.first())
            .and_then(|e| str_field(e, "email"));
        if let Some(map) = data.as_object_mut() {
            if let Some(email) = primary {
                map.insert("email".to_string(), Value::String(email));
            }
            map.insert("emails".to_string(), Value::Array(emails));
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_fields() {
        let data = json!({
            "uuid": "{23d3d9c4-2b7f-4a7e-9e3f-0c4a4c1d2b3a}",
            "username": "tutorials",
            "display_name": "tutorials account",
            "email": "tutorials@bitbucket.org",
            "emails": [
                {"email": "tutorials@bitbucket.org", "is_primary": true, "is_confirmed": true},
                {"email": "other@example.com", "is_primary": false, "is_confirmed": false}
            ]
        });

        assert_eq!(
            BitbucketProvider.extract_uid(&data).unwrap(),
            "{23d3d9c4-2b7f-4a7e-9e3f-0c4a4c1d2b3a}"
        );
        let fields = BitbucketProvider.extract_common_fields(&data);
        assert_eq!(fields.username.as_deref(), Some("tutorials"));
        assert_eq!(fields.email.as_deref(), Some("tutorials@bitbucket.org"));

        let emails = BitbucketProvider.extract_email_addresses(&data);
        assert_eq!(emails.len(), 2);
        assert!(emails[0].verified && emails[0].primary);
        assert!(BitbucketProvider.extract_extra_data(&data).get("emails").is_none());
    }

    #[test]
    fn test_next_page_stays_on_api_host() {
        let page = json!({ "next": "https://api.bitbucket.org/2.0/user/emails?page=2" });
        assert_eq!(
            next_page(&page, 1).as_deref(),
            Some("https://api.bitbucket.org/2.0/user/emails?page=2")
        );
        assert!(next_page(&page, MAX_EMAIL_PAGES).is_none());

        for link in [
            "https://attacker.example/collect",
            "http://api.bitbucket.org/2.0/user/emails?page=2",
            "https://api.bitbucket.org.attacker.example/2.0/user/emails",
        ] {
            assert!(next_page(&json!({ "next": link }), 1).is_none(), "{link}");
        }
        assert!(next_page(&json!({ "values": [] }), 1).is_none());
    }
}
