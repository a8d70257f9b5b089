//! Routers for the browser and headless endpoints

use axum::Router;
use tower_http::LatencyUnit;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::config::{HEADLESS_CLIENTS, HEADLESS_ONLY};

fn traced(router: Router) -> Router {
    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(
                DefaultMakeSpan::new()
                    .level(Level::INFO)
                    .include_headers(true),
            )
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(
                DefaultOnResponse::new()
                    .level(Level::INFO)
                    .latency_unit(LatencyUnit::Millis),
            ),
    )
}

/// Redirect based endpoints, to be mounted at `SA_ROUTE_PREFIX`:
/// - {SA_ROUTE_PREFIX}/{provider}/login/
/// - {SA_ROUTE_PREFIX}/{provider}/login/callback/
/// - {SA_ROUTE_PREFIX}/3rdparty/...
/// - {SA_ROUTE_PREFIX}/reauthenticate/, /2fa/authenticate/, /logout/
///
/// With `HEADLESS_ONLY=true` only the provider callbacks are served.
pub fn socialauth_router() -> Router {
    traced(socialauth_router_no_trace())
}

/// Same as `socialauth_router()` without the HTTP tracing middleware.
pub fn socialauth_router_no_trace() -> Router {
    if *HEADLESS_ONLY {
        super::browser::callback_router()
    } else {
        super::browser::router()
    }
}

/// JSON API, to be mounted at `SA_HEADLESS_PREFIX`. One copy per enabled
/// client kind under `/{client}/v1`.
pub fn headless_router() -> Router {
    traced(headless_router_no_trace())
}

/// Same as `headless_router()` without the HTTP tracing middleware.
pub fn headless_router_no_trace() -> Router {
    HEADLESS_CLIENTS
        .iter()
        .fold(Router::new(), |router, client| {
            router.nest(
                &format!("/{}/v1", client.as_str()),
                super::headless::router(*client),
            )
        })
}
