//! Recent-authentication gate for sensitive actions.

mod config;
mod errors;
mod main;
mod types;

pub use errors::ReauthError;
pub use main::{
    did_recently_authenticate, has_pending_reauthentication, raise_if_reauthentication_required,
    reauthenticate_with_password, reauthenticate_with_totp, resume_request, stash_and_reauthenticate,
    suspend_request, take_released_request,
};
pub use types::{ResumeAction, ResumeState, StashedRequest};

pub(crate) use config::ACCOUNT_REAUTHENTICATION_REQUIRED;
