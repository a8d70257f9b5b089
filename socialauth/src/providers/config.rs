use std::collections::HashMap;
use std::sync::LazyLock;

use serde_json::{Map, Value};

use crate::socialaccount::SocialApp;

/// Enabled provider ids, in display order
pub(crate) static SOCIALACCOUNT_PROVIDERS: LazyLock<Vec<String>> = LazyLock::new(|| {
    std::env::var("SOCIALACCOUNT_PROVIDERS")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
});

/// Apps of the enabled providers whose credentials are configured.
pub(super) static SOCIAL_APPS: LazyLock<HashMap<String, SocialApp>> = LazyLock::new(|| {
    SOCIALACCOUNT_PROVIDERS
        .iter()
        .filter_map(|id| {
            let app = app_from_env(id);
            if app.is_none() {
                tracing::warn!(provider = %id, "Provider enabled without client credentials, skipping");
            }
            app.map(|app| (id.clone(), app))
        })
        .collect()
});

/// Optional per-provider settings copied into `SocialApp::settings`.
const SETTING_NAMES: [&str; 3] = ["SCOPE", "SERVER_URL", "TENANT"];

fn app_from_env(id: &str) -> Option<SocialApp> {
    let var = |name: &str| {
        std::env::var(format!("SOCIALACCOUNT_{}_{name}", id.to_ascii_uppercase()))
            .ok()
            .filter(|v| !v.trim().is_empty())
    };

    let client_id = var("CLIENT_ID")?;
    let secret = var("SECRET").unwrap_or_default();

    let mut settings = Map::new();
    for name in SETTING_NAMES {
        if let Some(value) = var(name) {
            settings.insert(name.to_ascii_lowercase(), Value::String(value));
        }
    }

    Some(SocialApp {
        provider: id.to_string(),
        client_id,
        secret,
        key: var("KEY"),
        settings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_from_env_reads_credentials_and_settings() {
        unsafe {
            std::env::set_var("SOCIALACCOUNT_EXAMPLEIDP_CLIENT_ID", "cid");
            std::env::set_var("SOCIALACCOUNT_EXAMPLEIDP_SECRET", "sec");
            std::env::set_var("SOCIALACCOUNT_EXAMPLEIDP_SERVER_URL", "https://idp.example.com");
        }

        let app = app_from_env("exampleidp").unwrap();
        assert_eq!(app.client_id, "cid");
        assert_eq!(app.secret, "sec");
        assert_eq!(app.setting_str("server_url"), Some("https://idp.example.com"));
        assert!(app.setting_str("scope").is_none());

        assert!(app_from_env("missingidp").is_none());
    }

    #[test]
    fn test_test_environment_providers_are_loaded() {
        dotenvy::from_filename(".env_test").ok();
        assert!(SOCIALACCOUNT_PROVIDERS.iter().any(|p| p == "github"));
        assert!(SOCIAL_APPS.contains_key("github"));
    }
}
