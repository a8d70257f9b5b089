//! Third-party identity providers and the OAuth2 redirect dance.

mod adapters;
mod client;
mod config;
mod discovery;
mod errors;
mod flow;
mod provider;
mod registry;
mod types;

pub use errors::ProviderError;
pub use provider::Provider;
pub use registry::{get_provider, list_providers};
pub use types::{CallbackParams, CommonFields, ProviderInfo, TokenResponse};

pub(crate) use flow::{begin_login, finish_login, sociallogin_from_response};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::socialaccount::SocialApp;

    pub(crate) fn app(provider: &str) -> SocialApp {
        SocialApp {
            provider: provider.to_string(),
            client_id: format!("{provider}-client"),
            secret: format!("{provider}-secret"),
            key: None,
            settings: Default::default(),
        }
    }
}
