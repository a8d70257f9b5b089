use serde_json::json;

use crate::account::{
    ACCOUNT_EMAIL_VERIFICATION, ACCOUNT_SIGNUP_OPEN, AccountError, EmailAddress,
    EmailAddressStore, EmailAssessment, EmailVerificationMode, assess_unique_email,
    generate_unique_username, send_email_verification, validate_email, validate_username,
};
use crate::session::{Session, save_session};
use crate::socialaccount::config::{
    SOCIALACCOUNT_AUTO_SIGNUP, SOCIALACCOUNT_EMAIL_REQUIRED, SOCIALACCOUNT_STORE_TOKENS,
};
use crate::socialaccount::errors::SocialError;
use crate::socialaccount::storage::SocialAccountStore;
use crate::socialaccount::types::{SocialLogin, SocialLoginOutcome};
use crate::userdb::{User, UserSearchField, UserStore};

const PENDING_SIGNUP_SESSION_KEY: &str = "socialaccount_sociallogin";

pub(crate) fn clear_pending_signup(session: &mut Session) {
    session.remove_data(PENDING_SIGNUP_SESSION_KEY);
}

/// The social login waiting for signup input, if any.
pub(crate) fn pending_signup(session: &Session) -> Result<Option<SocialLogin>, SocialError> {
    Ok(session.get_data(PENDING_SIGNUP_SESSION_KEY)?)
}

async fn stash_pending_signup(session: &mut Session, login: &SocialLogin) -> Result<(), SocialError> {
    session.set_data(PENDING_SIGNUP_SESSION_KEY, login)?;
    save_session(session).await?;
    Ok(())
}

/// Signup path for a social login that matched no stored account.
pub(crate) async fn process_signup(
    session: &mut Session,
    login: SocialLogin,
) -> Result<SocialLoginOutcome, SocialError> {
    if !*ACCOUNT_SIGNUP_OPEN {
        tracing::info!(provider = %login.account.provider, "Social signup while signup is closed");
        return Ok(SocialLoginOutcome::SignupClosed);
    }

    if !*SOCIALACCOUNT_AUTO_SIGNUP {
        stash_pending_signup(session, &login).await?;
        return Ok(SocialLoginOutcome::SignupRequired);
    }

    match login.email().map(str::to_string) {
        Some(email) => {
            let assessment = assess_unique_email(&email).await?;
            if let Some(outcome) = refuse_taken_email(session, &login, email, assessment).await? {
                return Ok(outcome);
            }
        }
        None if *SOCIALACCOUNT_EMAIL_REQUIRED => {
            stash_pending_signup(session, &login).await?;
            return Ok(SocialLoginOutcome::SignupRequired);
        }
        None => {}
    }

    let user = save_user(login, None).await?;
    Ok(SocialLoginOutcome::SignedUp(user))
}

/// Stop an auto signup whose provider address belongs to someone else.
/// `None` when the address is free.
async fn refuse_taken_email(
    session: &mut Session,
    login: &SocialLogin,
    email: String,
    assessment: EmailAssessment,
) -> Result<Option<SocialLoginOutcome>, SocialError> {
    match assessment {
        EmailAssessment::Unique => Ok(None),
        EmailAssessment::Taken => {
            // The existing address may be unverified; merging would hand
            // its owner's account to whoever controls this identity.
            tracing::info!(provider = %login.account.provider, "Social signup email already in use");
            stash_pending_signup(session, login).await?;
            Ok(Some(SocialLoginOutcome::DuplicateEmail { email }))
        }
        EmailAssessment::TakenPreventEnumeration => {
            crate::account::send_mail(
                "account/email/account_already_exists",
                &email,
                json!({ "email": email }),
            )
            .await?;
            Ok(Some(SocialLoginOutcome::EnumerationHidden { email }))
        }
    }
}

/// Finish a pending social signup with the address (and username) the user supplied.
pub(crate) async fn signup_with_email(
    session: &mut Session,
    email: Option<&str>,
    username: Option<&str>,
) -> Result<SocialLoginOutcome, SocialError> {
    let mut login = pending_signup(session)?.ok_or(SocialError::NoPendingSignup)?;

    if !*ACCOUNT_SIGNUP_OPEN {
        return Ok(SocialLoginOutcome::SignupClosed);
    }

    let email = match email.map(str::trim).filter(|e| !e.is_empty()) {
        Some(email) => Some(validate_email(email)?),
        None if *SOCIALACCOUNT_EMAIL_REQUIRED => {
            return Err(AccountError::validation("email", "This field is required.").into());
        }
        None => None,
    };

    if let Some(email) = &email {
        if assess_unique_email(email).await? != EmailAssessment::Unique {
            return Err(AccountError::EmailTaken.into());
        }
    }

    if let Some(username) = username.map(str::trim).filter(|u| !u.is_empty()) {
        let username = validate_username(username)?;
        if UserStore::get_user_by(UserSearchField::Username(username.clone()))
            .await?
            .is_some()
        {
            return Err(AccountError::UsernameTaken.into());
        }
        login.user.username = Some(username);
    }

    clear_pending_signup(session);
    save_session(session).await?;

    let user = save_user(login, email.as_deref()).await?;
    Ok(SocialLoginOutcome::SignedUp(user))
}

/// Create the local user for `login` and bind the social account to it.
///
/// `chosen_email` replaces the provider's address; it counts as verified only
/// when the provider vouched for the same address.
async fn save_user(mut login: SocialLogin, chosen_email: Option<&str>) -> Result<User, SocialError> {
    let mut user = login.user.clone();
    user.set_unusable_password();

    let username_ok = match user.username.as_deref() {
        Some(name) => match validate_username(name) {
            Ok(name) => UserStore::get_user_by(UserSearchField::Username(name))
                .await?
                .is_none(),
            Err(_) => false,
        },
        None => false,
    };
    if !username_ok {
        let email = chosen_email.or(login.email()).unwrap_or_default();
        let email_local = email.split('@').next().unwrap_or_default();
        let candidates = [
            user.username.as_deref().unwrap_or_default(),
            user.first_name.as_str(),
            user.last_name.as_str(),
            email_local,
            login.account.provider.as_str(),
        ];
        user.username = Some(generate_unique_username(&candidates).await?);
    }

    let primary_email = chosen_email
        .map(str::to_string)
        .or_else(|| login.email().map(str::to_string));
    user.email = primary_email.clone();
    let user = UserStore::upsert_user(user).await?;

    login.account.user_id = user.id.clone();
    SocialAccountStore::insert_account(&login.account).await?;

    if let Some(token) = login.token.as_mut() {
        token.account_id = login.account.id.clone();
        if *SOCIALACCOUNT_STORE_TOKENS {
            SocialAccountStore::upsert_token(token).await?;
        }
    }

    setup_user_emails(&user, &login, primary_email.as_deref()).await?;

    tracing::info!(
        user_id = %user.id,
        provider = %login.account.provider,
        "User signed up through social login"
    );
    Ok(user)
}

/// Copy addresses onto the new user, keeping the provider's verification
/// claims. Addresses another user holds verified are skipped.
async fn setup_user_emails(
    user: &User,
    login: &SocialLogin,
    primary: Option<&str>,
) -> Result<(), SocialError> {
    let mut addresses: Vec<(String, bool)> = Vec::new();
    if let Some(primary) = primary {
        addresses.push((primary.to_string(), login.is_email_verified(primary)));
    }
    for provided in &login.email_addresses {
        if !addresses
            .iter()
            .any(|(e, _)| e.eq_ignore_ascii_case(&provided.email))
        {
            addresses.push((provided.email.clone(), provided.verified));
        }
    }

    let mut primary_set = false;
    for (email, verified) in addresses {
        let held_elsewhere = EmailAddressStore::find_by_email(&email)
            .await?
            .iter()
            .any(|a| a.verified && a.user_id != user.id);
        if held_elsewhere {
            continue;
        }

        let is_primary = !primary_set;
        let address =
            EmailAddressStore::add_email(EmailAddress::new(&user.id, &email, verified, is_primary))
                .await?;
        primary_set = true;

        if is_primary
            && !address.verified
            && *ACCOUNT_EMAIL_VERIFICATION != EmailVerificationMode::None
        {
            send_email_verification(user, &address.email).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::create_session;
    use crate::socialaccount::test_support::sample_login;
    use crate::test_utils::{init_test_environment, unique_name};
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn test_auto_signup_creates_user_with_verified_email() {
        init_test_environment().await;
        let uid = unique_name("auto");
        let email = format!("{uid}@example.com");
        let mut session = create_session().unwrap();

        let outcome = process_signup(&mut session, sample_login("github", &uid, &email, true))
            .await
            .unwrap();
        let SocialLoginOutcome::SignedUp(user) = outcome else {
            panic!("expected signup, got {outcome:?}");
        };

        assert_eq!(user.email.as_deref(), Some(email.as_str()));
        assert!(user.username.is_some());
        let addresses = EmailAddressStore::get_emails(&user.id).await.unwrap();
        assert_eq!(addresses.len(), 1);
        assert!(addresses[0].verified);
        assert!(addresses[0].primary);

        let account = SocialAccountStore::get_by_provider_uid("github", &uid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.user_id, user.id);
        assert!(SocialAccountStore::get_token(&account.id).await.unwrap().is_some());
    }

    #[tokio::test]
    #[serial]
    async fn test_duplicate_email_never_merges() {
        init_test_environment().await;
        let email = format!("{}@example.com", unique_name("taken"));
        let existing = UserStore::upsert_user(User::new(None, Some(email.clone())))
            .await
            .unwrap();
        EmailAddressStore::add_email(EmailAddress::new(&existing.id, &email, false, true))
            .await
            .unwrap();

        let uid = unique_name("dup");
        let mut session = create_session().unwrap();
        let outcome = process_signup(&mut session, sample_login("google", &uid, &email, true))
            .await
            .unwrap();

        // ACCOUNT_PREVENT_ENUMERATION defaults to on
        assert!(
            matches!(outcome, SocialLoginOutcome::EnumerationHidden { email: ref e } if *e == email)
        );
        assert!(pending_signup(&session).unwrap().is_none());
        assert!(
            SocialAccountStore::get_by_provider_uid("google", &uid)
                .await
                .unwrap()
                .is_none()
        );
        let owner_accounts = SocialAccountStore::get_accounts_by_user(&existing.id)
            .await
            .unwrap();
        assert!(owner_accounts.is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn test_taken_email_stashes_pending_signup() {
        init_test_environment().await;
        let uid = unique_name("taken");
        let email = format!("{uid}@example.com");
        let login = sample_login("github", &uid, &email, true);
        let mut session = create_session().unwrap();

        let outcome = refuse_taken_email(&mut session, &login, email.clone(), EmailAssessment::Taken)
            .await
            .unwrap();
        assert!(
            matches!(outcome, Some(SocialLoginOutcome::DuplicateEmail { email: ref e }) if *e == email)
        );

        let pending = pending_signup(&session).unwrap().unwrap();
        assert_eq!(pending.account.uid, uid);
        assert!(
            SocialAccountStore::get_by_provider_uid("github", &uid)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_hidden_taken_email_keeps_nothing() {
        init_test_environment().await;
        let uid = unique_name("hidden");
        let email = format!("{uid}@example.com");
        let login = sample_login("github", &uid, &email, true);
        let mut session = create_session().unwrap();

        let outcome = refuse_taken_email(
            &mut session,
            &login,
            email.clone(),
            EmailAssessment::TakenPreventEnumeration,
        )
        .await
        .unwrap();
        assert!(
            matches!(outcome, Some(SocialLoginOutcome::EnumerationHidden { email: ref e }) if *e == email)
        );
        assert!(pending_signup(&session).unwrap().is_none());

        let free = refuse_taken_email(&mut session, &login, email, EmailAssessment::Unique)
            .await
            .unwrap();
        assert!(free.is_none());
    }

    #[tokio::test]
    #[serial]
    async fn test_pending_signup_completed_with_other_email() {
        init_test_environment().await;
        let uid = unique_name("pend");
        let provider_email = format!("{uid}@provider.example");
        let mut session = create_session().unwrap();

        stash_pending_signup(&mut session, &sample_login("gitlab", &uid, &provider_email, true))
            .await
            .unwrap();
        assert!(pending_signup(&session).unwrap().is_some());

        let chosen = format!("{uid}@chosen.example");
        let outcome = signup_with_email(&mut session, Some(&chosen), None)
            .await
            .unwrap();
        let SocialLoginOutcome::SignedUp(user) = outcome else {
            panic!("expected signup, got {outcome:?}");
        };
        assert!(pending_signup(&session).unwrap().is_none());
        assert_eq!(user.email.as_deref(), Some(chosen.as_str()));

        let chosen_address = EmailAddressStore::get_email(&user.id, &chosen)
            .await
            .unwrap()
            .unwrap();
        assert!(chosen_address.primary);
        assert!(!chosen_address.verified);

        let provider_address = EmailAddressStore::get_email(&user.id, &provider_email)
            .await
            .unwrap()
            .unwrap();
        assert!(provider_address.verified);
    }

    #[tokio::test]
    #[serial]
    async fn test_signup_with_email_without_pending_login() {
        init_test_environment().await;
        let mut session = create_session().unwrap();
        let result = signup_with_email(&mut session, Some("x@example.com"), None).await;
        assert!(matches!(result, Err(SocialError::NoPendingSignup)));
    }
}
