use crate::providers::adapters::{
    BitbucketProvider, DiscordProvider, FacebookProvider, GitHubProvider, GitLabProvider,
    GiteaProvider, GoogleProvider, MicrosoftProvider, OpenIdConnectProvider, RedditProvider,
    TwitchProvider,
};
use crate::providers::config::{SOCIAL_APPS, SOCIALACCOUNT_PROVIDERS};
use crate::providers::errors::ProviderError;
use crate::providers::types::ProviderInfo;
use crate::socialaccount::SocialApp;

use super::Provider;

static PROVIDERS: &[&dyn Provider] = &[
    &BitbucketProvider,
    &DiscordProvider,
    &FacebookProvider,
    &GiteaProvider,
    &GitHubProvider,
    &GitLabProvider,
    &GoogleProvider,
    &MicrosoftProvider,
    &OpenIdConnectProvider,
    &RedditProvider,
    &TwitchProvider,
];

/// Adapter for `id`, whether or not it is enabled.
pub fn get_provider(id: &str) -> Option<&'static dyn Provider> {
    PROVIDERS.iter().copied().find(|p| p.id() == id)
}

/// Enabled providers with credentials, in configured order.
pub fn list_providers() -> Vec<ProviderInfo> {
    SOCIALACCOUNT_PROVIDERS
        .iter()
        .filter_map(|id| {
            let provider = get_provider(id)?;
            let app = SOCIAL_APPS.get(id)?;
            Some(ProviderInfo {
                id: provider.id().to_string(),
                name: provider.name().to_string(),
                client_id: app.client_id.clone(),
                flows: vec!["provider_redirect"],
            })
        })
        .collect()
}

/// Adapter and ready-to-use app for an enabled provider.
pub(crate) async fn provider_app(
    id: &str,
) -> Result<(&'static dyn Provider, SocialApp), ProviderError> {
    let provider = get_provider(id).ok_or_else(|| {
        tracing::warn!(provider = %id, "Login requested for unknown provider");
        ProviderError::UnknownProvider(id.to_string())
    })?;
    let app = SOCIAL_APPS
        .get(id)
        .cloned()
        .ok_or_else(|| ProviderError::NotConfigured(id.to_string()))?;
    let app = provider.prepare_app(app).await?;
    Ok((provider, app))
}
