use async_trait::async_trait;
use serde_json::Value;

use crate::providers::Provider;
use crate::providers::errors::ProviderError;
use crate::providers::types::CommonFields;
use crate::socialaccount::SocialApp;

use super::{str_field, uid_field};

pub(crate) struct RedditProvider;

#[async_trait]
impl Provider for RedditProvider {
    fn id(&self) -> &'static str {
        "reddit"
    }

    fn name(&self) -> &'static str {
        "Reddit"
    }

    fn authorize_url(&self, _app: &SocialApp) -> String {
        "https://www.reddit.com/api/v1/authorize".to_string()
    }

    fn access_token_url(&self, _app: &SocialApp) -> String {
        "https://www.reddit.com/api/v1/access_token".to_string()
    }

    fn profile_url(&self, _app: &SocialApp) -> String {
        "https://oauth.reddit.com/api/v1/me".to_string()
    }

    fn default_scope(&self) -> Vec<&'static str> {
        vec!["identity"]
    }

    fn basic_auth(&self) -> bool {
        true
    }

    fn extra_authorize_params(&self, _app: &SocialApp) -> Vec<(String, String)> {
        vec![("duration".to_string(), "permanent".to_string())]
    }

    /// Reddit accounts are identified by name.
    fn extract_uid(&self, data: &Value) -> Result<String, ProviderError> {
        uid_field(data, "name")
    }

    fn extract_common_fields(&self, data: &Value) -> CommonFields {
        CommonFields {
            username: str_field(data, "name"),
            ..Default::default()
        }
    }
}
