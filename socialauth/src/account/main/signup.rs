use serde_json::json;

use crate::account::config::{
    ACCOUNT_EMAIL_VERIFICATION, ACCOUNT_LOGIN_METHODS, ACCOUNT_PREVENT_ENUMERATION,
    ACCOUNT_SIGNUP_OPEN,
};
use crate::account::errors::AccountError;
use crate::account::mailer::send_mail;
use crate::account::password::{hash_password, validate_password};
use crate::account::storage::EmailAddressStore;
use crate::account::types::{
    EmailAddress, EmailAssessment, EmailVerificationMode, LoginMethod, SignupRequest,
    normalize_email,
};
use crate::userdb::{User, UserSearchField, UserStore};
use crate::utils::gen_random_bytes;

use super::email_verification::send_email_verification;

const MAX_USERNAME_LENGTH: usize = 150;

#[derive(Debug)]
pub(crate) enum SignupResult {
    Created(User),
    /// The email belongs to someone else; the client is told the same thing
    /// as on success and the owner is notified by mail instead.
    EnumerationHidden,
}

pub(crate) async fn signup(request: SignupRequest) -> Result<SignupResult, AccountError> {
    if !*ACCOUNT_SIGNUP_OPEN {
        tracing::info!("Signup attempt while signup is closed");
        return Err(AccountError::SignupClosed);
    }

    let email = match request.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => Some(validate_email(email)?),
        _ => None,
    };
    let username = match request.username.as_deref().map(str::trim) {
        Some(username) if !username.is_empty() => Some(validate_username(username)?),
        _ => None,
    };

    if ACCOUNT_LOGIN_METHODS.contains(&LoginMethod::Email) && email.is_none() {
        return Err(AccountError::validation("email", "This field is required."));
    }
    if !ACCOUNT_LOGIN_METHODS.contains(&LoginMethod::Email) && username.is_none() {
        return Err(AccountError::validation("username", "This field is required."));
    }

    validate_password(&request.password)?;

    if let Some(username) = &username {
        if UserStore::get_user_by(UserSearchField::Username(username.clone()))
            .await?
            .is_some()
        {
            return Err(AccountError::UsernameTaken);
        }
    }

    if let Some(email) = &email {
        match assess_unique_email(email).await? {
            EmailAssessment::Unique => {}
            EmailAssessment::Taken => return Err(AccountError::EmailTaken),
            EmailAssessment::TakenPreventEnumeration => {
                send_mail(
                    "account/email/account_already_exists",
                    email,
                    json!({ "email": email }),
                )
                .await?;
                return Ok(SignupResult::EnumerationHidden);
            }
        }
    }

    let mut user = User::new(username, email.clone());
    user.first_name = request.first_name.unwrap_or_default();
    user.last_name = request.last_name.unwrap_or_default();
    user.password_hash = Some(hash_password(&request.password)?);
    let user = UserStore::upsert_user(user).await?;

    if let Some(email) = &email {
        EmailAddressStore::add_email(EmailAddress::new(&user.id, email, false, true)).await?;
        if *ACCOUNT_EMAIL_VERIFICATION != EmailVerificationMode::None {
            send_email_verification(&user, email).await?;
        }
    }

    tracing::info!(user_id = %user.id, "User signed up");
    Ok(SignupResult::Created(user))
}

/// Whether `email` is free to be claimed by a new or existing account.
///
/// Any address on record counts, verified or not, as does a user's mirrored
/// primary email.
pub(crate) async fn assess_unique_email(email: &str) -> Result<EmailAssessment, AccountError> {
    let taken = !EmailAddressStore::find_by_email(email).await?.is_empty()
        || UserStore::get_user_by(UserSearchField::Email(normalize_email(email)))
            .await?
            .is_some();

    Ok(match (taken, *ACCOUNT_PREVENT_ENUMERATION) {
        (false, _) => EmailAssessment::Unique,
        (true, false) => EmailAssessment::Taken,
        (true, true) => EmailAssessment::TakenPreventEnumeration,
    })
}

pub(crate) fn validate_email(email: &str) -> Result<String, AccountError> {
    let email = normalize_email(email);
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(|c| c.is_whitespace())
                && !domain.contains('@')
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AccountError::validation("email", "Enter a valid email address."))
    }
}

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '.' | '@' | '+' | '-' | '_')
}

pub(crate) fn validate_username(username: &str) -> Result<String, AccountError> {
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AccountError::validation("username", "Username is too long."));
    }
    if !username.chars().all(is_username_char) {
        return Err(AccountError::validation(
            "username",
            "Usernames can only contain letters, digits and @/./+/-/_.",
        ));
    }
    Ok(username.to_string())
}

fn sanitize_username(candidate: &str) -> String {
    candidate
        .to_lowercase()
        .chars()
        .filter(|c| is_username_char(*c))
        .take(MAX_USERNAME_LENGTH - 5)
        .collect()
}

/// First free username derived from `candidates`, appending a numeric
/// suffix when every candidate is taken.
pub(crate) async fn generate_unique_username(candidates: &[&str]) -> Result<String, AccountError> {
    let sanitized: Vec<String> = candidates
        .iter()
        .map(|c| sanitize_username(c))
        .filter(|c| !c.is_empty())
        .collect();

    for candidate in &sanitized {
        if UserStore::get_user_by(UserSearchField::Username(candidate.clone()))
            .await?
            .is_none()
        {
            return Ok(candidate.clone());
        }
    }

    let base = sanitized.first().cloned().unwrap_or_else(|| "user".to_string());
    for _ in 0..10 {
        let bytes = gen_random_bytes(2)?;
        let suffix = u16::from_be_bytes([bytes[0], bytes[1]]) % 10_000;
        let candidate = format!("{base}{suffix}");
        if UserStore::get_user_by(UserSearchField::Username(candidate.clone()))
            .await?
            .is_none()
        {
            return Ok(candidate);
        }
    }

    Err(AccountError::UsernameTaken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_test_environment, unique_name};
    use proptest::prelude::*;
    use serial_test::serial;

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email(" A@Example.com ").unwrap(), "a@example.com");
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a@").is_err());
        assert!(validate_email("a b@example.com").is_err());
        assert!(validate_email("a@b@example.com").is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("john.doe+1@x").is_ok());
        assert!(validate_username("john doe").is_err());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LENGTH + 1)).is_err());
    }

    proptest! {
        #[test]
        fn prop_sanitized_usernames_validate(candidate in ".{0,200}") {
            let sanitized = sanitize_username(&candidate);
            prop_assert!(validate_username(&sanitized).is_ok());
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_signup_creates_user_and_primary_email() {
        init_test_environment().await;
        let name = unique_name("signup");
        let email = format!("{name}@example.com");

        let result = signup(SignupRequest {
            email: Some(email.clone()),
            username: Some(name.clone()),
            password: "a-strong-password".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

        let SignupResult::Created(user) = result else {
            panic!("expected a created user");
        };
        assert!(user.has_usable_password());
        assert_eq!(user.email.as_deref(), Some(email.as_str()));

        let primary = EmailAddressStore::get_primary(&user.id).await.unwrap().unwrap();
        assert_eq!(primary.email, email);
        assert!(!primary.verified);
    }

    #[tokio::test]
    #[serial]
    async fn test_signup_rejects_taken_username_and_hides_taken_email() {
        init_test_environment().await;
        let name = unique_name("taken");
        let email = format!("{name}@example.com");

        signup(SignupRequest {
            email: Some(email.clone()),
            username: Some(name.clone()),
            password: "a-strong-password".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

        let result = signup(SignupRequest {
            email: Some(format!("other-{email}")),
            username: Some(name.to_uppercase()),
            password: "a-strong-password".to_string(),
            ..Default::default()
        })
        .await;
        assert!(matches!(result, Err(AccountError::UsernameTaken)));

        // Enumeration prevention is on by default
        let result = signup(SignupRequest {
            email: Some(email.to_uppercase()),
            username: Some(unique_name("fresh")),
            password: "a-strong-password".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
        assert!(matches!(result, SignupResult::EnumerationHidden));
        assert_eq!(EmailAddressStore::find_by_email(&email).await.unwrap().len(), 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_signup_requires_email_and_valid_password() {
        init_test_environment().await;

        let result = signup(SignupRequest {
            username: Some(unique_name("noemail")),
            password: "a-strong-password".to_string(),
            ..Default::default()
        })
        .await;
        assert!(matches!(result, Err(AccountError::Validation { ref param, .. }) if param == "email"));

        let result = signup(SignupRequest {
            email: Some(format!("{}@example.com", unique_name("weak"))),
            password: "short".to_string(),
            ..Default::default()
        })
        .await;
        assert!(matches!(result, Err(AccountError::Validation { ref param, .. }) if param == "password"));
    }

    #[tokio::test]
    #[serial]
    async fn test_generate_unique_username() {
        init_test_environment().await;
        let base = unique_name("gen");

        let first = generate_unique_username(&["", &format!("{base} !!")])
            .await
            .unwrap();
        assert_eq!(first, base);

        UserStore::upsert_user(User::new(Some(first.clone()), None))
            .await
            .unwrap();

        let second = generate_unique_username(&[&base]).await.unwrap();
        assert_ne!(second, base);
        assert!(second.starts_with(&base));
    }
}
