pub mod credentials;
pub use self::credentials::{credentials, preflight};

pub mod health;
pub use self::health::health;
