mod connect;
mod login;
mod signup;

pub(crate) use connect::{connect, disconnect, list_accounts, validate_disconnect};
pub(crate) use login::{complete_login, lookup};
pub(crate) use signup::{clear_pending_signup, pending_signup, signup_with_email};
