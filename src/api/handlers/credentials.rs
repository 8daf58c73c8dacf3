use crate::turn::{
    config::ConfigStore,
    credential,
    origin::{self, CorsHeaders, Decision},
    unix_now,
};
use axum::{
    extract::{Extension, Form, Query},
    http::{header::ORIGIN, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};
use utoipa::{IntoParams, ToSchema};

pub const MISSING_USERNAME: &str = "Must supply a username.";
pub const INVALID_HOST: &str = "Invalid host.";
pub const NO_SECRET: &str = "No secret available.";

#[derive(IntoParams, Debug, Deserialize, Default)]
#[into_params(parameter_in = Query)]
pub struct UsernameArgs {
    /// Name the TURN username is derived from
    #[serde(default)]
    pub username: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TurnCredentials {
    /// `{expiry}:{username}`
    pub username: String,
    /// base64(HMAC-SHA1(secret, username))
    pub password: String,
    pub uris: Vec<String>,
    /// Lifetime in seconds
    pub ttl: u64,
}

#[utoipa::path(
    method(get, post),
    path = "/",
    params(UsernameArgs),
    responses (
        (status = 200, description = "TURN credentials", body = TurnCredentials, content_type = "application/json"),
        (status = 400, description = "Missing username or origin not allowed", body = String),
        (status = 503, description = "No valid shared secret", body = String),
    ),
    tag = "credentials",
)]
// axum handler for credential issuance
#[instrument(skip(store, headers, query, form))]
pub async fn credentials(
    Extension(store): Extension<Arc<ConfigStore>>,
    headers: HeaderMap,
    query: Option<Query<Vec<(String, String)>>>,
    form: Option<Form<Vec<(String, String)>>>,
) -> Response {
    let username = username(query, form);
    if username.is_empty() {
        debug!("Request without username");
        return (StatusCode::BAD_REQUEST, MISSING_USERNAME).into_response();
    }

    let config = store.snapshot();

    let cors = match authorize(&headers, &config.allowed_origins) {
        Ok(cors) => cors,
        Err(response) => return response,
    };

    let now = unix_now();

    let secret = match config.current_secret(now) {
        Ok(secret) => secret,
        Err(e) => {
            error!("Refusing to issue credentials: {}", e);
            return (StatusCode::SERVICE_UNAVAILABLE, cors, NO_SECRET).into_response();
        }
    };

    match credential::issue(&username, secret.as_bytes(), config.ttl, now) {
        Ok(credential) => {
            debug!(username = %credential.username, "issued credentials");

            let body = TurnCredentials {
                username: credential.username,
                password: credential.password,
                uris: config.relay_uris.clone(),
                ttl: config.ttl.as_secs(),
            };

            (StatusCode::OK, cors, Json(body)).into_response()
        }
        Err(e) => {
            error!("Failed to issue credentials: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, cors, e.to_string()).into_response()
        }
    }
}

// CORS preflight for `/`
#[instrument(skip(store, headers))]
pub async fn preflight(
    Extension(store): Extension<Arc<ConfigStore>>,
    headers: HeaderMap,
) -> Response {
    let config = store.snapshot();

    match authorize(&headers, &config.allowed_origins) {
        Ok(cors) => (StatusCode::NO_CONTENT, cors, ()).into_response(),
        Err(response) => response,
    }
}

// The urlencoded body wins over the query string. Repeated keys take the
// first value.
fn username(
    query: Option<Query<Vec<(String, String)>>>,
    form: Option<Form<Vec<(String, String)>>>,
) -> String {
    let from_form = form.and_then(|Form(pairs)| first_username(pairs)).unwrap_or_default();
    if !from_form.is_empty() {
        return from_form;
    }
    query.and_then(|Query(pairs)| first_username(pairs)).unwrap_or_default()
}

fn first_username(pairs: Vec<(String, String)>) -> Option<String> {
    pairs
        .into_iter()
        .find_map(|(key, value)| (key == "username").then_some(value))
}

fn authorize(
    headers: &HeaderMap,
    allow_list: &std::collections::BTreeSet<String>,
) -> Result<Option<CorsHeaders>, Response> {
    let declared = match headers.get(ORIGIN).map(|value| value.to_str()) {
        None => "",
        Some(Ok(origin)) => origin,
        Some(Err(_)) => {
            warn!("Rejecting non-ASCII origin");
            return Err((StatusCode::BAD_REQUEST, INVALID_HOST).into_response());
        }
    };

    match origin::authorize(declared, allow_list) {
        Decision::Allow(cors) => Ok(cors),
        Decision::Reject(e) => {
            warn!("Rejecting request: {}", e);
            Err((StatusCode::BAD_REQUEST, INVALID_HOST).into_response())
        }
    }
}
