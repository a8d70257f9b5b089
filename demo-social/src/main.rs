use axum::{Router, ServiceExt, body::Body, http::Request, middleware::from_fn, routing::get};
use dotenvy::dotenv;
use std::net::SocketAddr;
use tower::Layer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use socialauth_axum::{
    SA_HEADLESS_PREFIX, SA_ROUTE_PREFIX, headless_router, resume_stashed_request,
    socialauth_router,
};

mod handlers;

use crate::handlers::{index, protected};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}=debug,socialauth=debug,socialauth_axum=debug",
                    env!("CARGO_CRATE_NAME")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    socialauth_axum::init().await?;

    let app = Router::new()
        .route("/", get(index))
        .route("/protected", get(protected))
        .nest(SA_ROUTE_PREFIX.as_str(), socialauth_router())
        .nest(SA_HEADLESS_PREFIX.as_str(), headless_router());

    // Outside the router so a replayed request is routed by its own method
    let app = from_fn(resume_stashed_request).layer(app);
    // axum_server hands over hyper bodies; the middleware expects axum's Body
    let app = tower::ServiceExt::map_request(app, |req: Request<_>| req.map(Body::new));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("HTTP server listening on {}", addr);

    // Connect info gives the user session list its client addresses
    axum_server::bind(addr)
        .serve(ServiceExt::<Request<_>>::into_make_service_with_connect_info::<SocketAddr>(app))
        .await?;
    Ok(())
}
