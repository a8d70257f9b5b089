mod config;
mod errors;
mod main;
mod storage;
mod types;

pub use config::{SESSION_COOKIE_NAME, SESSION_TOKEN_HEADER};
pub use errors::SessionError;
pub use main::{
    delete_session, get_session_id_from_headers, get_user_from_session, load_or_create_session,
    load_session, prepare_logout_response, save_session, session_cookie_header,
    touch_user_session,
};
pub use types::{AuthenticationMethod, AuthenticationRecord, ClientInfo, Session, SessionUser, UserSession};

pub(crate) use main::{
    create_session, end_user_sessions, list_user_sessions, login_session, logout_session,
    record_authentication, renew_session,
};

pub(crate) async fn init() -> Result<(), SessionError> {
    storage::UserSessionStore::init().await
}
