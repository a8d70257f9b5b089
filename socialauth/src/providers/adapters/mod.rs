mod bitbucket;
mod discord;
mod facebook;
mod gitea;
mod github;
mod gitlab;
mod google;
mod microsoft;
mod openid_connect;
mod reddit;
mod twitch;

pub(crate) use bitbucket::BitbucketProvider;
pub(crate) use discord::DiscordProvider;
pub(crate) use facebook::FacebookProvider;
pub(crate) use gitea::GiteaProvider;
pub(crate) use github::GitHubProvider;
pub(crate) use gitlab::GitLabProvider;
pub(crate) use google::GoogleProvider;
pub(crate) use microsoft::MicrosoftProvider;
pub(crate) use openid_connect::OpenIdConnectProvider;
pub(crate) use reddit::RedditProvider;
pub(crate) use twitch::TwitchProvider;

use serde_json::Value;

use crate::providers::errors::ProviderError;
use crate::socialaccount::ProviderEmail;

/// Non-empty string field.
pub(super) fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn bool_field(data: &Value, key: &str) -> bool {
    match data.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Provider ids come as JSON numbers or strings.
pub(super) fn uid_field(data: &Value, key: &str) -> Result<String, ProviderError> {
    match data.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ProviderError::InvalidProfile(format!(
            "Missing \"{key}\" in profile"
        ))),
    }
}

/// The single address in `email_key`, verified when `verified_key` says so.
pub(super) fn single_email(data: &Value, email_key: &str, verified_key: &str) -> Vec<ProviderEmail> {
    str_field(data, email_key)
        .map(|email| ProviderEmail {
            email,
            verified: bool_field(data, verified_key),
            primary: true,
        })
        .into_iter()
        .collect()
}

/// Base URL for self-hosted instances, without a trailing slash.
pub(super) fn server_url<'a>(app: &'a crate::socialaccount::SocialApp, default: &'a str) -> &'a str {
    app.setting_str("server_url")
        .unwrap_or(default)
        .trim_end_matches('/')
}
