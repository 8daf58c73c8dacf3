use crate::{
    turn::{config::ConfigStore, unix_now},
    GIT_COMMIT_HASH,
};
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    secret: String,
    relays: usize,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "A valid shared secret is available", body = Health),
        (status = 503, description = "No valid shared secret", body = Health)
    ),
    tag = "health",
)]
// axum handler for health
pub async fn health(Extension(store): Extension<Arc<ConfigStore>>) -> impl IntoResponse {
    let config = store.snapshot();
    let secret_ok = config.current_secret(unix_now()).is_ok();

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        secret: if secret_ok {
            "ok".to_string()
        } else {
            "unavailable".to_string()
        },
        relays: config.relay_uris.len(),
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .unwrap_or_else(|err| {
            debug!("Failed to parse X-App header: {}", err);
            HeaderMap::new()
        });

    let status = if secret_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, headers, Json(health))
}
