//! # turnhttp (TURN REST credentials)
//!
//! `turnhttp` hands out short-lived credentials for TURN relays following the
//! TURN REST API convention. A client asks for credentials over HTTP and gets
//! back a username of the form `<expiry>:<name>`, an HMAC-SHA1 password keyed
//! by a secret it shares with the relays, the relay URIs and the lifetime.
//!
//! ## Configuration sources
//!
//! The shared secret, the relay list and the allowed browser origins can each
//! come from a static value, an HTTP endpoint polled at a fixed rate, or a
//! Redis compatible key-value store. Polled values are swapped in atomically;
//! a failed poll keeps the last value that loaded successfully.
//!
//! ## Secret rotation
//!
//! When secrets live in the key-value store, the `rotate` subcommand writes a
//! fresh secret every rotation period with a lifetime of two periods. The
//! server always signs with the oldest secret that is still valid, so relays
//! that only learn about new secrets on their own schedule keep accepting
//! every credential issued.

pub mod api;
pub mod cli;
pub mod turn;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
