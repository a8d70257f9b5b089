use crate::account::config::ACCOUNT_LOGIN_METHODS;
use crate::account::errors::AccountError;
use crate::account::password::{burn_dummy_verification, verify_password};
use crate::account::storage::EmailAddressStore;
use crate::account::types::LoginMethod;
use crate::userdb::{User, UserSearchField, UserStore};

async fn find_user_for_login(login: &str) -> Result<Option<User>, AccountError> {
    let login = login.trim();
    if login.is_empty() {
        return Ok(None);
    }

    if login.contains('@') && ACCOUNT_LOGIN_METHODS.contains(&LoginMethod::Email) {
        // Prefer the owner of a verified address over an unverified claim
        for address in EmailAddressStore::find_by_email(login).await? {
            if let Some(user) = UserStore::get_user(&address.user_id).await? {
                return Ok(Some(user));
            }
        }
        if let Some(user) = UserStore::get_user_by(UserSearchField::Email(login.to_string())).await? {
            return Ok(Some(user));
        }
    }

    if ACCOUNT_LOGIN_METHODS.contains(&LoginMethod::Username) {
        return Ok(UserStore::get_user_by(UserSearchField::Username(login.to_string())).await?);
    }

    Ok(None)
}

/// Check `password` for the user identified by `login` (email or username).
pub(crate) async fn authenticate(login: &str, password: &str) -> Result<User, AccountError> {
    let Some(user) = find_user_for_login(login).await? else {
        burn_dummy_verification(password);
        tracing::warn!("Login attempt for unknown account");
        return Err(AccountError::InvalidCredentials);
    };

    let valid = match user.password_hash.as_deref() {
        Some(hash) if user.has_usable_password() => verify_password(password, hash),
        _ => {
            burn_dummy_verification(password);
            false
        }
    };

    if !valid {
        tracing::warn!(user_id = %user.id, "Login attempt with wrong password");
        return Err(AccountError::InvalidCredentials);
    }
    if !user.is_active {
        tracing::warn!(user_id = %user.id, "Login attempt for inactive account");
        return Err(AccountError::Inactive);
    }

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::main::signup::{SignupResult, signup};
    use crate::account::types::SignupRequest;
    use crate::test_utils::{init_test_environment, unique_name};
    use serial_test::serial;

    async fn create_user(name: &str) -> User {
        match signup(SignupRequest {
            email: Some(format!("{name}@example.com")),
            username: Some(name.to_string()),
            password: "correct-password".to_string(),
            ..Default::default()
        })
        .await
        .unwrap()
        {
            SignupResult::Created(user) => user,
            SignupResult::EnumerationHidden => panic!("unexpected enumeration result"),
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_authenticate_by_email_and_username() {
        init_test_environment().await;
        let name = unique_name("auth");
        let user = create_user(&name).await;

        let by_email = authenticate(&format!("{}@EXAMPLE.com", name.to_uppercase()), "correct-password")
            .await
            .unwrap();
        assert_eq!(by_email.id, user.id);

        let by_username = authenticate(&name, "correct-password").await.unwrap();
        assert_eq!(by_username.id, user.id);
    }

    #[tokio::test]
    #[serial]
    async fn test_authenticate_failures() {
        init_test_environment().await;
        let name = unique_name("authfail");
        let mut user = create_user(&name).await;

        assert!(matches!(
            authenticate(&name, "wrong-password").await,
            Err(AccountError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate("nobody-here@example.com", "whatever").await,
            Err(AccountError::InvalidCredentials)
        ));
        assert!(matches!(
            authenticate("", "whatever").await,
            Err(AccountError::InvalidCredentials)
        ));

        user.is_active = false;
        UserStore::upsert_user(user).await.unwrap();
        assert!(matches!(
            authenticate(&name, "correct-password").await,
            Err(AccountError::Inactive)
        ));
    }

    #[tokio::test]
    #[serial]
    async fn test_social_only_user_cannot_password_login() {
        init_test_environment().await;
        let mut user = User::new(Some(unique_name("social")), None);
        user.set_unusable_password();
        let user = UserStore::upsert_user(user).await.unwrap();

        let result = authenticate(user.username.as_deref().unwrap(), "!").await;
        assert!(matches!(result, Err(AccountError::InvalidCredentials)));
    }
}
