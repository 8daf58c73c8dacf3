use crate::{api::handlers::{credentials, health, preflight}, turn::config::ConfigStore};
use anyhow::Result;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderName, HeaderValue, Request},
    routing::get,
    Router,
};
use std::{future::Future, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;

pub mod handlers;
mod openapi;
pub use self::openapi::openapi;

/// Build the router serving credentials at `/` and the health check.
#[must_use]
pub fn router(store: Arc<ConfigStore>) -> Router {
    Router::new()
        .route("/", get(credentials).post(credentials).options(preflight))
        .route("/health", get(health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(store)),
        )
}

/// Bind `[::]:port` and serve until `shutdown` resolves.
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails
pub async fn new<F>(port: u16, store: Arc<ConfigStore>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    serve(listener, store, shutdown).await
}

/// Serve on an already bound listener.
/// # Errors
/// Returns an error if the server fails
pub async fn serve<F>(listener: TcpListener, store: Arc<ConfigStore>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(store).into_make_service())
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let method = request.method().as_str();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let origin = headers
        .get("origin")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("");

    debug_span!("http-request", method, path, origin, request_id)
}
