use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use http::{HeaderValue, Method, header::CONTENT_LENGTH, header::CONTENT_TYPE};

use super::config::SA_REDIRECT_ANON;
use super::session::{AuthUser, SessionContext};
use socialauth::{StashedRequest, get_user_from_session, has_pending_reauthentication, take_released_request};

/// Marks a request rebuilt from a stash after reauthentication.
///
/// Its CSRF token was verified when it was first submitted.
#[derive(Clone, Debug)]
pub(crate) struct ReplayedRequest;

/// Reissue a request that was suspended for reauthentication.
///
/// After reauthenticating, the browser is sent back to the path of the
/// suspended request with a GET. This middleware swaps that GET for the
/// stashed method and body. It has to wrap the whole application, outside
/// the router, so the replayed method takes part in routing:
///
/// ```no_run
/// use axum::{Router, ServiceExt, extract::Request, middleware::from_fn};
/// use socialauth_axum::resume_stashed_request;
/// use tower::Layer;
///
/// let app = Router::new();
/// let app = from_fn(resume_stashed_request).layer(app);
/// let _service = ServiceExt::<Request>::into_make_service(app);
/// ```
pub async fn resume_stashed_request(req: Request, next: Next) -> Response {
    if req.method() != Method::GET {
        return next.run(req).await;
    }

    let mut ctx = match SessionContext::load(req.headers()).await {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::debug!("No session to resume a request for: {}", e);
            return next.run(req).await;
        }
    };
    if !ctx.existed() || !has_pending_reauthentication(&ctx.session) {
        return next.run(req).await;
    }

    let path = req.uri().path().to_string();
    match take_released_request(&mut ctx.session, &path).await {
        Ok(Some(stashed)) => match rebuild_request(req, &stashed) {
            Ok(replayed) => next.run(replayed).await,
            Err(e) => {
                tracing::error!("Failed to rebuild stashed request: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Ok(None) => next.run(req).await,
        Err(e) => {
            tracing::error!("Failed to load stashed request: {}", e);
            next.run(req).await
        }
    }
}

fn rebuild_request(req: Request, stashed: &StashedRequest) -> Result<Request, String> {
    let (mut parts, _) = req.into_parts();
    let body = stashed.body().map_err(|e| e.to_string())?;

    parts.method = Method::from_bytes(stashed.method.as_bytes()).map_err(|e| e.to_string())?;
    parts.uri = stashed.uri().parse().map_err(|e: http::uri::InvalidUri| e.to_string())?;
    parts.headers.remove(CONTENT_TYPE);
    if let Some(content_type) = &stashed.content_type {
        let value = HeaderValue::from_str(content_type).map_err(|e| e.to_string())?;
        parts.headers.insert(CONTENT_TYPE, value);
    }
    parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    parts.extensions.insert(ReplayedRequest);

    Ok(Request::from_parts(parts, Body::from(body)))
}

async fn authenticated_user(req: &Request) -> Option<AuthUser> {
    let ctx = SessionContext::load(req.headers()).await.ok()?;
    if !ctx.existed() || !ctx.session.is_authenticated() {
        return None;
    }
    let user = get_user_from_session(ctx.session.id()).await.ok()?;
    let mut auth_user = AuthUser::from(user);
    auth_user.csrf_token = ctx.session.csrf_token().to_string();
    Some(auth_user)
}

/// Reject anonymous requests with 401.
pub async fn is_authenticated_or_error(req: Request, next: Next) -> Response {
    match authenticated_user(&req).await {
        Some(_) => next.run(req).await,
        None => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
    }
}

/// Send anonymous GET requests to the login page, reject others with 401.
pub async fn is_authenticated_or_redirect(req: Request, next: Next) -> Response {
    match authenticated_user(&req).await {
        Some(_) => next.run(req).await,
        None if req.method() == Method::GET => {
            Redirect::temporary(SA_REDIRECT_ANON.as_str()).into_response()
        }
        None => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
    }
}

/// Like [`is_authenticated_or_error`], and makes the user available as an
/// `Extension<AuthUser>`.
pub async fn is_authenticated_with_user(mut req: Request, next: Next) -> Response {
    match authenticated_user(&req).await {
        Some(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        None => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_rebuild_request_restores_method_and_body() {
        let req = Request::builder()
            .method(Method::GET)
            .uri("/accounts/3rdparty/disconnect/")
            .header("cookie", "sessionid=abc")
            .body(Body::empty())
            .unwrap();
        let stashed = StashedRequest::new(
            "POST",
            "/accounts/3rdparty/disconnect/",
            Some("x=1"),
            Some("application/x-www-form-urlencoded"),
            b"provider=github&account=42",
        );

        let rebuilt = rebuild_request(req, &stashed).unwrap();
        assert_eq!(rebuilt.method(), Method::POST);
        assert_eq!(rebuilt.uri().to_string(), "/accounts/3rdparty/disconnect/?x=1");
        assert_eq!(
            rebuilt.headers().get(CONTENT_TYPE).unwrap(),
            "application/x-www-form-urlencoded"
        );
        assert_eq!(rebuilt.headers().get("cookie").unwrap(), "sessionid=abc");
        assert!(rebuilt.extensions().get::<ReplayedRequest>().is_some());

        let body = to_bytes(rebuilt.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"provider=github&account=42");
    }
}
