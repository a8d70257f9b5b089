//! Central configuration for the socialauth_axum crate

use std::sync::LazyLock;

use socialauth::SA_ROUTE_PREFIX;

/// Where to send a browser after a successful login
/// Default: "/"
pub static SA_LOGIN_REDIRECT_URL: LazyLock<String> = LazyLock::new(|| {
    std::env::var("SA_LOGIN_REDIRECT_URL").unwrap_or_else(|_| "/".to_string())
});

/// Where to send a browser after logout
/// Default: "/"
pub static SA_LOGOUT_REDIRECT_URL: LazyLock<String> = LazyLock::new(|| {
    std::env::var("SA_LOGOUT_REDIRECT_URL").unwrap_or_else(|_| "/".to_string())
});

/// Where anonymous GET requests to protected pages are redirected
/// Default: "/accounts/login/"
pub static SA_REDIRECT_ANON: LazyLock<String> = LazyLock::new(|| {
    std::env::var("SA_REDIRECT_ANON").unwrap_or_else(|_| format!("{}/login/", *SA_ROUTE_PREFIX))
});

/// Mount point of the headless JSON API
/// Default: "/_allauth"
pub static SA_HEADLESS_PREFIX: LazyLock<String> = LazyLock::new(|| {
    std::env::var("SA_HEADLESS_PREFIX").unwrap_or_else(|_| "/_allauth".to_string())
});

/// Serve only the headless API, no browser routes
pub static HEADLESS_ONLY: LazyLock<bool> = LazyLock::new(|| {
    std::env::var("HEADLESS_ONLY")
        .map(|val| val.to_lowercase() == "true")
        .unwrap_or(false)
});

/// Headless client kinds to serve
pub static HEADLESS_CLIENTS: LazyLock<Vec<HeadlessClient>> = LazyLock::new(|| {
    let raw = std::env::var("HEADLESS_CLIENTS").unwrap_or_else(|_| "browser,app".to_string());
    parse_clients(&raw)
});

/// Largest request body kept for replay after reauthentication
pub(crate) const MAX_STASHED_BODY: usize = 64 * 1024;

/// How a headless client carries its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlessClient {
    /// Session cookie and CSRF header
    Browser,
    /// `X-Session-Token` header
    App,
}

impl HeadlessClient {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::App => "app",
        }
    }
}

fn parse_clients(raw: &str) -> Vec<HeadlessClient> {
    let mut clients = Vec::new();
    for item in raw.split(',').map(|s| s.trim().to_lowercase()) {
        let client = match item.as_str() {
            "browser" => HeadlessClient::Browser,
            "app" => HeadlessClient::App,
            _ => continue,
        };
        if !clients.contains(&client) {
            clients.push(client);
        }
    }
    clients
}
