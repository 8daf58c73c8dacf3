use axum::{
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
        },
        HeaderValue,
    },
    response::{IntoResponseParts, ResponseParts},
};
use crate::turn::error::Error;
use std::{collections::BTreeSet, convert::Infallible};

pub const ALLOW_METHODS: &str = "GET";
pub const ALLOW_HEADERS: &str = "Content-Type, Content-Length, Accept-Encoding, X-CSRF-Token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// `None` for clients that did not declare an origin.
    Allow(Option<CorsHeaders>),
    /// Carries `Error::InvalidOrigin` with the declared origin.
    Reject(Error),
}

/// CORS headers reflecting the matched origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsHeaders {
    allow_origin: HeaderValue,
}

impl CorsHeaders {
    #[must_use]
    pub fn allow_origin(&self) -> &HeaderValue {
        &self.allow_origin
    }
}

impl IntoResponseParts for CorsHeaders {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let headers = res.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin);
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        Ok(res)
    }
}

/// Decide whether a request declaring `origin` may be served.
///
/// Matching is exact and case-sensitive. An empty origin is a non-browser
/// client and is always allowed, without CORS headers. With an empty
/// allow-list every declared origin is rejected.
#[must_use]
pub fn authorize(origin: &str, allow_list: &BTreeSet<String>) -> Decision {
    if origin.is_empty() {
        return Decision::Allow(None);
    }

    let reject = || Decision::Reject(Error::InvalidOrigin(origin.to_string()));

    if !allow_list.contains(origin) {
        return reject();
    }

    match HeaderValue::from_str(origin) {
        Ok(allow_origin) => Decision::Allow(Some(CorsHeaders { allow_origin })),
        Err(_) => reject(),
    }
}
