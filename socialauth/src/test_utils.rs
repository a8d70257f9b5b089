//! Shared test initialization for every test module in the crate.
//!
//! Loads `.env_test` once and makes sure all tables exist. Stores create their
//! SQLite tables at the point of use, so no retry logic is needed here.

use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Load the test environment and initialize all stores.
///
/// ```rust,ignore
/// #[tokio::test]
/// #[serial]
/// async fn my_test() {
///     init_test_environment().await;
/// }
/// ```
pub(crate) async fn init_test_environment() {
    static ENV_INIT: Once = Once::new();
    ENV_INIT.call_once(|| {
        if dotenvy::from_filename(".env_test").is_err() {
            dotenvy::dotenv().ok();
        }
    });

    if let Err(e) = crate::userdb::init().await {
        eprintln!("Warning: Failed to initialize UserStore: {e}");
    }
    if let Err(e) = crate::session::init().await {
        eprintln!("Warning: Failed to initialize UserSessionStore: {e}");
    }
    if let Err(e) = crate::account::init().await {
        eprintln!("Warning: Failed to initialize EmailAddressStore: {e}");
    }
    if let Err(e) = crate::socialaccount::init().await {
        eprintln!("Warning: Failed to initialize SocialAccountStore: {e}");
    }
    if let Err(e) = crate::mfa::init().await {
        eprintln!("Warning: Failed to initialize AuthenticatorStore: {e}");
    }
}

/// Unique name for test fixtures sharing one in-memory database.
pub(crate) fn unique_name(prefix: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}{n}{}", &random[..8])
}
