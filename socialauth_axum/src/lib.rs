//! Axum integration for socialauth
//!
//! Provides the browser and headless routers, the [`AuthUser`] extractor and
//! the middleware that replays requests suspended for reauthentication.

mod browser;
mod config;
mod error;
mod headless;
mod middleware;
mod router;
mod session;

#[cfg(test)]
mod test_utils;

pub use config::{
    HEADLESS_CLIENTS, HEADLESS_ONLY, HeadlessClient, SA_HEADLESS_PREFIX, SA_LOGIN_REDIRECT_URL,
    SA_LOGOUT_REDIRECT_URL, SA_REDIRECT_ANON,
};
pub use error::{ApiError, ErrorDetail, IntoResponseError};
pub use middleware::{
    is_authenticated_or_error, is_authenticated_or_redirect, is_authenticated_with_user,
    resume_stashed_request,
};
pub use router::{
    headless_router, headless_router_no_trace, socialauth_router, socialauth_router_no_trace,
};
pub use session::{AuthRedirect, AuthUser, SessionContext};

// Re-export the route prefix and initialization function from socialauth crate
pub use socialauth::{SA_ROUTE_PREFIX, init};
