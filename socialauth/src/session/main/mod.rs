mod csrf;
mod session;
mod user_sessions;

pub use session::{
    delete_session, get_session_id_from_headers, get_user_from_session, load_or_create_session,
    load_session, prepare_logout_response, save_session, session_cookie_header,
};
pub use user_sessions::touch_user_session;

pub(crate) use session::{create_session, login_session, logout_session, record_authentication, renew_session};
pub(crate) use user_sessions::{end_user_sessions, list_user_sessions};
