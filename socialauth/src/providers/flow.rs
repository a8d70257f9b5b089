use serde_json::Value;
use subtle::ConstantTimeEq;

use crate::providers::client::{
    build_authorize_url, callback_url, exchange_code, pkce_pair, resolve_scope,
};
use crate::providers::errors::ProviderError;
use crate::providers::registry::provider_app;
use crate::providers::types::{CallbackParams, StoredOAuthState};
use crate::session::Session;
use crate::socialaccount::{
    LoginState, ProviderEmail, SOCIALACCOUNT_STATE_TTL, SocialAccount, SocialLogin, SocialToken,
};
use crate::storage::{store_cache_auto, take_data};
use crate::userdb::User;
use crate::utils::gen_random_string;

use super::Provider;

const STATE_CACHE_PREFIX: &str = "social_state";

/// Provider error code for a user who declined authorization.
const LOGIN_CANCELLED_ERROR: &str = "access_denied";

/// Start the redirect dance and return the provider's authorization URL.
///
/// The login state, PKCE verifier and nonce wait in the cache under a random
/// state id that is only valid for this session.
pub(crate) async fn begin_login(
    provider_id: &str,
    state: LoginState,
    session: &Session,
) -> Result<String, ProviderError> {
    let (provider, app) = provider_app(provider_id).await?;

    let (pkce_verifier, pkce_challenge) = if provider.uses_pkce() {
        let (verifier, challenge) = pkce_pair()?;
        (Some(verifier), Some(challenge))
    } else {
        (None, None)
    };
    let nonce = if provider.uses_nonce() {
        Some(gen_random_string(32)?)
    } else {
        None
    };

    let mut params = vec![
        ("client_id".to_string(), app.client_id.clone()),
        ("redirect_uri".to_string(), callback_url(provider.id())),
        ("scope".to_string(), resolve_scope(provider, &app, state.scope.as_deref())),
        ("response_type".to_string(), "code".to_string()),
    ];
    params.extend(provider.extra_authorize_params(&app));
    if let Some(auth_params) = state.auth_params.as_deref() {
        params.extend(
            url::form_urlencoded::parse(auth_params.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
    }

    let stored = StoredOAuthState {
        provider: provider.id().to_string(),
        session_id: session.id().to_string(),
        state,
        pkce_verifier,
        nonce: nonce.clone(),
    };
    let state_id =
        store_cache_auto::<_, ProviderError>(STATE_CACHE_PREFIX, &stored, *SOCIALACCOUNT_STATE_TTL)
            .await?;

    params.push(("state".to_string(), state_id));
    if let Some(challenge) = pkce_challenge {
        params.push(("code_challenge".to_string(), challenge));
        params.push(("code_challenge_method".to_string(), "S256".to_string()));
    }
    if let Some(nonce) = nonce {
        params.push(("nonce".to_string(), nonce));
    }

    tracing::debug!(provider = %provider.id(), "Redirecting to provider");
    build_authorize_url(&provider.authorize_url(&app), &params)
}

/// Handle the provider's callback and build the transient [`SocialLogin`].
///
/// The state is consumed even when the provider reports an error.
pub(crate) async fn finish_login(
    provider_id: &str,
    params: &CallbackParams,
    session: &Session,
) -> Result<SocialLogin, ProviderError> {
    let stored = match params.state.as_deref() {
        Some(state_id) => {
            take_data::<StoredOAuthState, ProviderError>(STATE_CACHE_PREFIX, state_id).await?
        }
        None => None,
    };

    if let Some(error) = params.error.as_deref() {
        tracing::info!(
            provider = %provider_id,
            error = %error,
            description = ?params.error_description,
            "Provider reported an authorization error"
        );
        return Err(if error == LOGIN_CANCELLED_ERROR {
            ProviderError::Cancelled
        } else {
            ProviderError::Denied(error.to_string())
        });
    }

    let stored = stored.ok_or_else(|| {
        tracing::warn!(provider = %provider_id, "Callback with unknown or expired state");
        ProviderError::InvalidState
    })?;
    let same_session: bool = stored
        .session_id
        .as_bytes()
        .ct_eq(session.id().as_bytes())
        .into();
    if stored.provider != provider_id || !same_session {
        tracing::warn!(provider = %provider_id, "Callback state bound to another session or provider");
        return Err(ProviderError::InvalidState);
    }

    let code = params
        .code
        .as_deref()
        .ok_or_else(|| ProviderError::Denied("missing code".to_string()))?;

    let (provider, app) = provider_app(provider_id).await?;
    let token = exchange_code(provider, &app, code, stored.pkce_verifier.as_deref()).await?;
    let data = provider
        .complete_login(&app, &token, stored.nonce.as_deref())
        .await?;

    let mut login =
        sociallogin_from_response(provider, Some(token.to_social_token(provider.id())), &data)?;
    login.state = stored.state;
    tracing::info!(provider = %provider_id, uid = %login.account.uid, "Provider login completed");
    Ok(login)
}

/// Map a provider profile onto a not yet persisted [`SocialLogin`].
pub(crate) fn sociallogin_from_response(
    provider: &dyn Provider,
    token: Option<SocialToken>,
    data: &Value,
) -> Result<SocialLogin, ProviderError> {
    let uid = provider.extract_uid(data)?;
    let common = provider.extract_common_fields(data);
    let mut email_addresses = provider.extract_email_addresses(data);
    cleanup_email_addresses(common.email.as_deref(), &mut email_addresses);

    let account = SocialAccount::new(provider.id(), &uid, provider.extract_extra_data(data));

    let (first_name, last_name) = match (common.first_name, common.last_name, common.name) {
        (None, None, Some(name)) => match name.split_once(char::is_whitespace) {
            Some((first, last)) => (first.to_string(), last.trim().to_string()),
            None => (name, String::new()),
        },
        (first, last, _) => (first.unwrap_or_default(), last.unwrap_or_default()),
    };

    let mut login = SocialLogin {
        user: User::new(common.username, None),
        account,
        token,
        email_addresses,
        state: LoginState::default(),
        is_existing: false,
    };
    login.user.email = login.email().map(str::to_string);
    login.user.first_name = first_name;
    login.user.last_name = last_name;
    login.user.set_unusable_password();
    Ok(login)
}

/// Keep each address once, add the profile's own address, and leave exactly
/// one primary.
fn cleanup_email_addresses(email: Option<&str>, addresses: &mut Vec<ProviderEmail>) {
    let mut unique: Vec<ProviderEmail> = Vec::with_capacity(addresses.len() + 1);
    for address in addresses.drain(..) {
        match unique
            .iter_mut()
            .find(|a| a.email.eq_ignore_ascii_case(&address.email))
        {
            Some(existing) => {
                existing.verified |= address.verified;
                existing.primary |= address.primary;
            }
            None => unique.push(address),
        }
    }

    if let Some(email) = email {
        if !unique.iter().any(|a| a.email.eq_ignore_ascii_case(email)) {
            unique.push(ProviderEmail {
                email: email.to_string(),
                verified: false,
                primary: false,
            });
        }
    }

    let primary = unique
        .iter()
        .position(|a| a.primary)
        .or_else(|| unique.iter().position(|a| a.verified))
        .or(if unique.is_empty() { None } else { Some(0) });
    for (i, address) in unique.iter_mut().enumerate() {
        address.primary = Some(i) == primary;
    }
    *addresses = unique;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::get_provider;
    use crate::session::create_session;
    use crate::socialaccount::AuthProcess;
    use crate::storage::get_data;
    use crate::test_utils::init_test_environment;
    use proptest::prelude::*;
    use serde_json::json;
    use serial_test::serial;

    fn state_param(url: &str) -> String {
        url::Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[test]
    fn test_sociallogin_from_response_builds_transient_login() {
        let github = get_provider("github").unwrap();
        let data = json!({
            "id": 583231,
            "login": "octocat",
            "name": "The Octocat",
            "email": "octocat@github.com",
            "emails": [{"email": "work@example.com", "verified": true, "primary": false}]
        });

        let login = sociallogin_from_response(github, None, &data).unwrap();
        assert_eq!(login.account.provider, "github");
        assert_eq!(login.account.uid, "583231");
        assert!(login.account.extra_data.get("emails").is_none());
        assert!(!login.is_existing);

        assert_eq!(login.user.username.as_deref(), Some("octocat"));
        assert_eq!(login.user.first_name, "The");
        assert_eq!(login.user.last_name, "Octocat");
        assert!(!login.user.has_usable_password());

        // The verified provider address wins primary over the unverified profile one
        assert_eq!(login.email_addresses.len(), 2);
        assert_eq!(login.email(), Some("work@example.com"));
        assert_eq!(login.user.email.as_deref(), Some("work@example.com"));
        assert_eq!(login.email_addresses.iter().filter(|e| e.primary).count(), 1);
    }

    #[test]
    fn test_cleanup_merges_duplicates() {
        let mut addresses = vec![
            ProviderEmail { email: "A@example.com".into(), verified: false, primary: true },
            ProviderEmail { email: "a@example.com".into(), verified: true, primary: false },
            ProviderEmail { email: "b@example.com".into(), verified: true, primary: true },
        ];
        cleanup_email_addresses(Some("a@EXAMPLE.com"), &mut addresses);
        assert_eq!(addresses.len(), 2);
        assert!(addresses[0].verified && addresses[0].primary);
        assert!(!addresses[1].primary);
    }

    #[test]
    fn test_sociallogin_requires_uid() {
        let discord = get_provider("discord").unwrap();
        assert!(matches!(
            sociallogin_from_response(discord, None, &json!({"username": "x"})),
            Err(ProviderError::InvalidProfile(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_uid_and_username_survive_mapping(id in any::<u64>(), login in "[a-z][a-z0-9-]{0,20}") {
            for provider_id in ["github", "gitlab", "gitea"] {
                let provider = get_provider(provider_id).unwrap();
                let data = json!({ "id": id, "login": login, "username": login });
                let mapped = sociallogin_from_response(provider, None, &data).unwrap();
                prop_assert_eq!(&mapped.account.uid, &id.to_string());
                prop_assert_eq!(mapped.user.username.as_deref(), Some(login.as_str()));
                prop_assert!(mapped.email_addresses.is_empty());
            }
        }

        #[test]
        fn prop_at_most_one_primary(flags in proptest::collection::vec((any::<bool>(), any::<bool>()), 0..6)) {
            let mut addresses: Vec<ProviderEmail> = flags
                .iter()
                .enumerate()
                .map(|(i, (verified, primary))| ProviderEmail {
                    email: format!("user{i}@example.com"),
                    verified: *verified,
                    primary: *primary,
                })
                .collect();
            let count = addresses.len();
            cleanup_email_addresses(None, &mut addresses);
            let primaries = addresses.iter().filter(|a| a.primary).count();
            prop_assert_eq!(primaries, usize::from(count > 0));
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_begin_login_binds_state_to_session() {
        init_test_environment().await;
        let session = create_session().unwrap();
        let state = LoginState {
            process: AuthProcess::Connect,
            next: Some("/settings/".to_string()),
            ..Default::default()
        };

        let url = begin_login("gitlab", state, &session).await.unwrap();
        assert!(url.starts_with("https://gitlab.com/oauth/authorize?"));
        assert!(url.contains("client_id=test-gitlab-client-id"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains(
            "redirect_uri=https%3A%2F%2Fexample.com%2Faccounts%2Fgitlab%2Flogin%2Fcallback%2F"
        ));

        let stored: StoredOAuthState = get_data::<_, ProviderError>(STATE_CACHE_PREFIX, &state_param(&url))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.session_id, session.id());
        assert_eq!(stored.state.process, AuthProcess::Connect);
        assert!(stored.pkce_verifier.is_some());
        assert!(stored.nonce.is_none());
    }

    #[tokio::test]
    #[serial]
    async fn test_callback_errors_consume_state() {
        init_test_environment().await;
        let session = create_session().unwrap();

        let url = begin_login("github", LoginState::default(), &session).await.unwrap();
        let state = state_param(&url);
        let params = CallbackParams {
            state: Some(state.clone()),
            error: Some("access_denied".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            finish_login("github", &params, &session).await,
            Err(ProviderError::Cancelled)
        ));

        let replay = CallbackParams {
            state: Some(state),
            code: Some("code".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            finish_login("github", &replay, &session).await,
            Err(ProviderError::InvalidState)
        ));

        let url = begin_login("github", LoginState::default(), &session).await.unwrap();
        let params = CallbackParams {
            state: Some(state_param(&url)),
            error: Some("server_error".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            finish_login("github", &params, &session).await,
            Err(ProviderError::Denied(e)) if e == "server_error"
        ));
    }

    #[tokio::test]
    #[serial]
    async fn test_callback_from_other_session_is_rejected() {
        init_test_environment().await;
        let victim = create_session().unwrap();
        let attacker = create_session().unwrap();

        let url = begin_login("discord", LoginState::default(), &attacker).await.unwrap();
        let params = CallbackParams {
            state: Some(state_param(&url)),
            code: Some("attacker-code".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            finish_login("discord", &params, &victim).await,
            Err(ProviderError::InvalidState)
        ));
    }
}
