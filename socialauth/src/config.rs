//! Central configuration for the socialauth crate

use std::sync::LazyLock;

/// Route prefix for all socialauth endpoints
///
/// This is the main prefix under which the browser routes are mounted.
/// Default: "/accounts"
pub static SA_ROUTE_PREFIX: LazyLock<String> = LazyLock::new(|| {
    std::env::var("SA_ROUTE_PREFIX").unwrap_or_else(|_| "/accounts".to_string())
});

/// Absolute origin of this server, used to build provider callback URLs.
pub static ORIGIN: LazyLock<String> = LazyLock::new(|| {
    std::env::var("ORIGIN")
        .expect("ORIGIN must be set")
        .trim_end_matches('/')
        .to_string()
});

/// Secret used to sign email verification keys and password reset tokens.
pub(crate) static AUTH_SERVER_SECRET: LazyLock<Vec<u8>> =
    LazyLock::new(|| match std::env::var("AUTH_SERVER_SECRET") {
        Ok(secret) => secret.into_bytes(),
        Err(_) => {
            tracing::warn!("AUTH_SERVER_SECRET is not set, using an insecure default");
            "default_secret_key_change_in_production"
                .to_string()
                .into_bytes()
        }
    });

/// Parse a boolean flag from the environment, falling back to `default`.
pub(crate) fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => parse_flag(&value).unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a numeric setting from the environment, falling back to `default`.
pub(crate) fn env_number<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_route_prefix_default() {
        let original_value = env::var("SA_ROUTE_PREFIX").ok();

        unsafe {
            env::remove_var("SA_ROUTE_PREFIX");
        }

        // The LazyLock may already be initialized, so test the same logic it uses
        let prefix = env::var("SA_ROUTE_PREFIX").unwrap_or_else(|_| "/accounts".to_string());
        assert_eq!(prefix, "/accounts");

        if let Some(value) = original_value {
            unsafe {
                env::set_var("SA_ROUTE_PREFIX", value);
            }
        }
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" YES "), Some(true));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_env_number_fallback() {
        unsafe {
            env::set_var("SA_TEST_NUMBER_SETTING", "not-a-number");
        }
        assert_eq!(env_number("SA_TEST_NUMBER_SETTING", 42u64), 42);

        unsafe {
            env::set_var("SA_TEST_NUMBER_SETTING", "7");
        }
        assert_eq!(env_number("SA_TEST_NUMBER_SETTING", 42u64), 7);

        unsafe {
            env::remove_var("SA_TEST_NUMBER_SETTING");
        }
        assert_eq!(env_number("SA_TEST_NUMBER_SETTING", 42u64), 42);
    }
}
