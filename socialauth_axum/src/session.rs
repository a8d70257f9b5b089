use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, OptionalFromRequestParts},
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use http::{HeaderMap, Method, StatusCode, request::Parts};

use super::config::SA_REDIRECT_ANON;
use super::middleware::ReplayedRequest;
use socialauth::{
    ClientInfo, SESSION_TOKEN_HEADER, Session, SessionError, SessionUser,
    get_session_id_from_headers, get_user_from_session, load_or_create_session,
    session_cookie_header, touch_user_session,
};

/// Request header carrying the CSRF token for cookie sessions
pub(crate) const CSRF_TOKEN_HEADER: &str = "X-CSRF-Token";

/// The caller's session, loaded from the `X-Session-Token` header or the
/// session cookie. A new anonymous session is started when neither names a
/// live session.
///
/// For state-changing methods on cookie sessions the `X-CSRF-Token` header is
/// verified here. Form posts without the header must pass their `csrf_token`
/// field to [`SessionContext::verify_form_csrf`].
pub struct SessionContext {
    pub session: Session,
    original_id: Option<String>,
    via_token: bool,
    csrf_pending: bool,
}

impl SessionContext {
    pub(crate) async fn load(headers: &HeaderMap) -> Result<Self, SessionError> {
        let requested = get_session_id_from_headers(headers)?.map(str::to_string);
        let session = load_or_create_session(requested.as_deref()).await?;
        let original_id = match &requested {
            Some(id) if id == session.id() => Some(id.clone()),
            _ => None,
        };
        Ok(Self {
            session,
            original_id,
            via_token: headers.contains_key(SESSION_TOKEN_HEADER),
            csrf_pending: false,
        })
    }

    /// Whether the session came from the store rather than being started now
    pub fn existed(&self) -> bool {
        self.original_id.is_some()
    }

    /// Whether the client carries its session in `X-Session-Token`
    pub fn via_token(&self) -> bool {
        self.via_token
    }

    /// Whether the session id changed during this request
    pub fn rotated(&self) -> bool {
        self.original_id.as_deref() != Some(self.session.id())
    }

    /// Set-Cookie headers to send when the session id changed.
    pub fn cookie_headers(&self) -> HeaderMap {
        if self.via_token || !self.rotated() {
            return HeaderMap::new();
        }
        session_cookie_header(&self.session).unwrap_or_else(|e| {
            tracing::error!("Failed to build session cookie: {}", e);
            HeaderMap::new()
        })
    }

    pub fn verify_form_csrf(&self, token: Option<&str>) -> Result<(), SessionError> {
        if !self.csrf_pending {
            return Ok(());
        }
        self.session.verify_csrf_token(token)
    }

    /// Attach the peer address and user agent, and note the request against
    /// the user session when logged in.
    async fn record_client(&mut self, parts: &Parts) {
        self.session.set_client(client_info(parts));
        if let Err(e) = touch_user_session(&self.session).await {
            tracing::warn!("Failed to record user session activity: {}", e);
        }
    }

    fn check_csrf(&mut self, parts: &Parts) -> Result<(), SessionError> {
        let state_changing = matches!(
            parts.method,
            Method::POST | Method::PUT | Method::DELETE | Method::PATCH
        );
        if !state_changing
            || self.via_token
            || !self.existed()
            || parts.extensions.get::<ReplayedRequest>().is_some()
        {
            return Ok(());
        }

        if let Some(header_token) = parts
            .headers
            .get(CSRF_TOKEN_HEADER)
            .and_then(|h| h.to_str().ok())
        {
            return self.session.verify_csrf_token(Some(header_token));
        }

        let is_form_like = parts
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .is_some_and(|ct| {
                ct.starts_with("application/x-www-form-urlencoded")
                    || ct.starts_with("multipart/form-data")
            });

        if is_form_like {
            self.csrf_pending = true;
            Ok(())
        } else {
            tracing::warn!("CSRF protection: X-CSRF-Token header missing for non-form request");
            Err(SessionError::CsrfToken("CSRF token missing".to_string()))
        }
    }
}

impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        let mut ctx = SessionContext::load(&parts.headers).await.map_err(|e| {
            tracing::error!("Failed to load session: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string())
        })?;
        ctx.check_csrf(parts)
            .map_err(|e| (StatusCode::FORBIDDEN, e.to_string()))?;
        ctx.record_client(parts).await;
        Ok(ctx)
    }
}

/// Peer address when the server was started with connect info.
fn client_info(parts: &Parts) -> ClientInfo {
    ClientInfo {
        ip: parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string()),
        user_agent: parts
            .headers
            .get(http::header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string),
    }
}

pub struct AuthRedirect {
    method: Method,
}

impl AuthRedirect {
    fn new(method: Method) -> Self {
        Self { method }
    }
}

impl IntoResponse for AuthRedirect {
    fn into_response(self) -> Response {
        if self.method == Method::GET {
            tracing::debug!("Redirecting to {}", SA_REDIRECT_ANON.as_str());
            Redirect::temporary(SA_REDIRECT_ANON.as_str()).into_response()
        } else {
            tracing::debug!("Unauthorized");
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}

/// Authenticated user information, available as an Axum extractor
///
/// Rejects anonymous requests: GET requests are redirected to the login page,
/// others get 401. CSRF rules are the same as for [`SessionContext`].
///
/// # Example
///
/// ```no_run
/// use axum::{routing::get, Router};
/// use socialauth_axum::AuthUser;
///
/// async fn protected_handler(user: AuthUser) -> String {
///     format!("Hello, {}!", user.display)
/// }
///
/// let app: Router = Router::new()
///     .route("/protected", get(protected_handler));
/// ```
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    /// Display name
    pub display: String,
    pub has_usable_password: bool,
    pub created_at: DateTime<Utc>,
    /// CSRF token associated with the user's session
    pub csrf_token: String,
}

impl From<&AuthUser> for SessionUser {
    fn from(auth_user: &AuthUser) -> Self {
        SessionUser {
            id: auth_user.id.clone(),
            username: auth_user.username.clone(),
            email: auth_user.email.clone(),
            display: auth_user.display.clone(),
            has_usable_password: auth_user.has_usable_password,
            created_at: auth_user.created_at,
        }
    }
}

impl From<SessionUser> for AuthUser {
    fn from(session_user: SessionUser) -> Self {
        AuthUser {
            id: session_user.id,
            username: session_user.username,
            email: session_user.email,
            display: session_user.display,
            has_usable_password: session_user.has_usable_password,
            created_at: session_user.created_at,
            csrf_token: String::new(),
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthRedirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let method = parts.method.clone();
        let ctx = <SessionContext as FromRequestParts<S>>::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthRedirect::new(method.clone()))?;

        if !ctx.existed() || !ctx.session.is_authenticated() {
            return Err(AuthRedirect::new(method));
        }

        let session_user = get_user_from_session(ctx.session.id())
            .await
            .map_err(|e| {
                tracing::debug!("Failed to get user from session: {}", e);
                AuthRedirect::new(method.clone())
            })?;

        let mut auth_user = AuthUser::from(session_user);
        auth_user.csrf_token = ctx.session.csrf_token().to_string();
        Ok(auth_user)
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthRedirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let result: Result<Self, Self::Rejection> =
            <AuthUser as FromRequestParts<S>>::from_request_parts(parts, state).await;
        Ok(result.ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_user_auth_user_conversion() {
        let now = Utc::now();
        let session_user = SessionUser {
            id: "user123".to_string(),
            username: Some("alice".to_string()),
            email: Some("alice@example.com".to_string()),
            display: "alice".to_string(),
            has_usable_password: true,
            created_at: now,
        };

        let auth_user = AuthUser::from(session_user.clone());
        assert_eq!(auth_user.id, "user123");
        assert!(auth_user.csrf_token.is_empty());

        let back = SessionUser::from(&auth_user);
        assert_eq!(back, session_user);
    }

    #[test]
    fn test_client_info_from_request() {
        let addr: SocketAddr = "198.51.100.4:5000".parse().unwrap();
        let (parts, _) = http::Request::builder()
            .header(http::header::USER_AGENT, "test-agent/1.0")
            .extension(ConnectInfo(addr))
            .body(())
            .unwrap()
            .into_parts();
        let client = client_info(&parts);
        assert_eq!(client.ip.as_deref(), Some("198.51.100.4"));
        assert_eq!(client.user_agent.as_deref(), Some("test-agent/1.0"));

        let (bare, _) = http::Request::builder().body(()).unwrap().into_parts();
        assert_eq!(client_info(&bare), ClientInfo::default());
    }

    #[test]
    fn test_auth_redirect_by_method() {
        let response = AuthRedirect::new(Method::GET).into_response();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

        let response = AuthRedirect::new(Method::POST).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
