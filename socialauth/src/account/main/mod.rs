mod authenticate;
mod email_management;
mod email_verification;
mod login;
mod login_by_code;
mod password;
mod signup;

pub(crate) use authenticate::authenticate;
pub(crate) use email_management::{
    add_email_address, list_email_addresses, remove_email_address, set_primary_email,
};
pub(crate) use email_verification::{confirm_email_verification, send_email_verification};
pub(crate) use login::{login, logout, pending_email_verification};
pub(crate) use login_by_code::{confirm_login_code, pending_login_code, request_login_code};
pub(crate) use password::{
    change_password, password_reset_user, request_password_reset, reset_password,
};
pub(crate) use signup::{
    SignupResult, assess_unique_email, generate_unique_username, signup, validate_email,
    validate_username,
};
