//! TURN REST credentials.
//!
//! The username handed to the client embeds its own expiry as unix seconds
//! (`{expiry}:{username}`) and the password is the standard base64 encoding of
//! `HMAC-SHA1(secret, signed_username)`. A TURN server holding the same secret
//! recomputes the password and rejects the credential once the embedded
//! timestamp has passed, so nothing is stored here.

use crate::turn::error::Error;
use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::time::Duration;

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

/// Issue a credential for `username` valid for `ttl` from `now` (unix seconds).
///
/// # Errors
/// Returns `Error::InvalidInput` when `username` is empty.
pub fn issue(username: &str, secret: &[u8], ttl: Duration, now: i64) -> Result<Credential, Error> {
    if username.is_empty() {
        return Err(Error::InvalidInput);
    }

    let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    let expiry = now.saturating_add(ttl);
    let signed_username = format!("{expiry}:{username}");
    let password = sign(secret, &signed_username)?;

    Ok(Credential {
        username: signed_username,
        password,
    })
}

/// base64(HMAC-SHA1(secret, message))
///
/// # Errors
/// Returns `Error::InvalidKey` if the MAC cannot be keyed.
pub fn sign(secret: &[u8], message: &str) -> Result<String, Error> {
    let mut mac = HmacSha1::new_from_slice(secret).map_err(|_| Error::InvalidKey)?;
    mac.update(message.as_bytes());

    Ok(Base64::encode_string(&mac.finalize().into_bytes()))
}
