pub mod config;
pub mod credential;
pub mod error;
pub mod kv;
pub mod origin;
pub mod rotation;
pub mod source;
pub mod sync;

pub use self::error::Error;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in unix seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX)
        })
}
