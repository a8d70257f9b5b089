use async_trait::async_trait;
use serde_json::Value;

use crate::providers::Provider;
use crate::providers::errors::ProviderError;
use crate::providers::types::CommonFields;
use crate::socialaccount::{ProviderEmail, SocialApp};

use super::{str_field, uid_field};

const PROFILE_FIELDS: &str =
    "id,displayName,givenName,surname,mail,userPrincipalName,mailNickname,preferredLanguage";

pub(crate) struct MicrosoftProvider;

impl MicrosoftProvider {
    fn tenant_url(app: &SocialApp, path: &str) -> String {
        let tenant = app.setting_str("tenant").unwrap_or("common");
        format!("https://login.microsoftonline.com/{tenant}{path}")
    }

    fn email(data: &Value) -> Option<String> {
        str_field(data, "mail").or_else(|| {
            str_field(data, "userPrincipalName").filter(|upn| upn.contains('@'))
        })
    }
}

#[async_trait]
impl Provider for MicrosoftProvider {
    fn id(&self) -> &'static str {
        "microsoft"
    }

    fn name(&self) -> &'static str {
        "Microsoft Graph"
    }

    fn authorize_url(&self, app: &SocialApp) -> String {
        Self::tenant_url(app, "/oauth2/v2.0/authorize")
    }

    fn access_token_url(&self, app: &SocialApp) -> String {
        Self::tenant_url(app, "/oauth2/v2.0/token")
    }

    fn profile_url(&self, _app: &SocialApp) -> String {
        format!("https://graph.microsoft.com/v1.0/me?$select={PROFILE_FIELDS}")
    }

    fn default_scope(&self) -> Vec<&'static str> {
        vec!["User.Read"]
    }

    fn uses_pkce(&self) -> bool {
        true
    }

    fn extract_uid(&self, data: &Value) -> Result<String, ProviderError> {
        uid_field(data, "id")
    }

    fn extract_common_fields(&self, data: &Value) -> CommonFields {
        CommonFields {
            email: Self::email(data),
            username: str_field(data, "mailNickname"),
            first_name: str_field(data, "givenName"),
            last_name: str_field(data, "surname"),
            name: str_field(data, "displayName"),
        }
    }

    /// Graph does not say whether `mail` was verified.
    fn extract_email_addresses(&self, data: &Value) -> Vec<ProviderEmail> {
        Self::email(data)
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
    fn test_extract_fields_falls_back_to_principal_name() {
        let data = json!({
            "id": "16f5a7b6-5a15-4568-aa5a-31bb117e9967",
            "displayName": "Anne Weiler",
            "givenName": "Anne",
            "surname": "Weiler",
            "mail": null,
            "userPrincipalName": "annew@contoso.com"
        });
        let fields = MicrosoftProvider.extract_common_fields(&data);
        assert_eq!(fields.email.as_deref(), Some("annew@contoso.com"));
        assert_eq!(fields.first_name.as_deref(), Some("Anne"));
        assert_eq!(fields.last_name.as_deref(), Some("Weiler"));

        let no_email = json!({"id": "x", "userPrincipalName": "annew_contoso"});
        assert!(MicrosoftProvider.extract_email_addresses(&no_email).is_empty());
    }

    #[test]
    fn test_tenant_urls() {
        let mut app = crate::providers::test_support::app("microsoft");
        assert!(MicrosoftProvider.authorize_url(&app).contains("/common/oauth2/v2.0/authorize"));
        app.settings
            .insert("tenant".to_string(), Value::String("organizations".to_string()));
        assert!(MicrosoftProvider.access_token_url(&app).contains("/organizations/oauth2/v2.0/token"));
    }
}
