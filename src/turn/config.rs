//! Serving configuration shared between request handlers and synchronizers.
//!
//! `ServingConfig` is immutable once published. `ConfigStore` swaps whole
//! values atomically, so a snapshot never mixes fields from two versions.

use crate::turn::{
    error::Error,
    rotation::{self, SecretRecord},
};
use arc_swap::ArcSwap;
use std::{collections::BTreeSet, sync::Arc, time::Duration};
use tracing::debug;

const RELAY_PORTS: [u16; 2] = [3478, 3479];
const RELAY_TRANSPORTS: [&str; 2] = ["udp", "tcp"];
const URI_SCHEMES: [&str; 3] = ["turn:", "turns:", "stun:"];

#[derive(Debug, Clone)]
pub struct ServingConfig {
    pub secrets: Vec<SecretRecord>,
    pub ttl: Duration,
    pub relay_uris: Vec<String>,
    pub allowed_origins: BTreeSet<String>,
}

impl ServingConfig {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            secrets: Vec::new(),
            ttl,
            relay_uris: Vec::new(),
            allowed_origins: BTreeSet::new(),
        }
    }

    /// The secret to sign new credentials with, see [`rotation::current_secret`].
    ///
    /// # Errors
    /// Returns `Error::NoSecretAvailable` when no record is valid at `now`.
    pub fn current_secret(&self, now: i64) -> Result<&SecretRecord, Error> {
        rotation::current_secret(&self.secrets, now)
    }

    fn apply(&mut self, update: ConfigUpdate) {
        match update {
            ConfigUpdate::Secrets(secrets) => self.secrets = secrets,
            ConfigUpdate::RelayUris(uris) => self.relay_uris = uris,
            ConfigUpdate::AllowedOrigins(origins) => self.allowed_origins = origins,
        }
    }
}

/// Dynamically sourced fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Secret,
    RelayUris,
    AllowedOrigins,
}

impl Field {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Secret => "secret",
            Self::RelayUris => "relay_uris",
            Self::AllowedOrigins => "allowed_origins",
        }
    }
}

/// A new value for one field. Multi-valued fields are replaced as a unit.
#[derive(Debug, Clone)]
pub enum ConfigUpdate {
    Secrets(Vec<SecretRecord>),
    RelayUris(Vec<String>),
    AllowedOrigins(BTreeSet<String>),
}

impl ConfigUpdate {
    #[must_use]
    pub fn field(&self) -> Field {
        match self {
            Self::Secrets(_) => Field::Secret,
            Self::RelayUris(_) => Field::RelayUris,
            Self::AllowedOrigins(_) => Field::AllowedOrigins,
        }
    }
}

#[derive(Debug)]
pub struct ConfigStore {
    current: ArcSwap<ServingConfig>,
}

impl ConfigStore {
    #[must_use]
    pub fn new(config: ServingConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(config),
        }
    }

    /// Point-in-time view of the whole configuration.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ServingConfig> {
        self.current.load_full()
    }

    /// Replace one field, leaving the others as currently published.
    ///
    /// Concurrent publishers of different fields do not lose each other's
    /// writes: the copy-and-swap is retried if another publish won the race.
    pub fn publish(&self, update: ConfigUpdate) {
        let field = update.field();

        self.current.rcu(|current| {
            let mut next = ServingConfig::clone(current);
            next.apply(update.clone());
            next
        });

        debug!(field = field.as_str(), "configuration published");
    }
}

/// Expand TURN server addresses into relay URIs.
///
/// Bare addresses yield UDP and TCP URIs on ports 3478 and 3479; entries that
/// already carry a `turn:`, `turns:` or `stun:` scheme are kept verbatim.
#[must_use]
pub fn relay_uris<S: AsRef<str>>(servers: &[S]) -> Vec<String> {
    let mut uris = Vec::with_capacity(servers.len() * RELAY_PORTS.len() * RELAY_TRANSPORTS.len());

    for server in servers {
        let server = server.as_ref().trim();
        if server.is_empty() {
            continue;
        }

        if URI_SCHEMES.iter().any(|scheme| server.starts_with(scheme)) {
            uris.push(server.to_string());
            continue;
        }

        for port in RELAY_PORTS {
            for transport in RELAY_TRANSPORTS {
                uris.push(format!("turn:{server}:{port}?transport={transport}"));
            }
        }
    }

    uris
}

/// Split a comma separated list, dropping blanks.
#[must_use]
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::{ExposeSecret, SecretString};
    use std::thread;

    fn config() -> ServingConfig {
        let mut config = ServingConfig::new(Duration::from_secs(86_400));
        config.secrets = vec![SecretRecord::permanent(SecretString::from(
            "s3cr3t".to_string(),
        ))];
        config.relay_uris = relay_uris(&["10.0.0.1"]);
        config.allowed_origins = BTreeSet::from(["https://a.example.com".to_string()]);
        config
    }

    #[test]
    fn relay_uris_expand_addresses() {
        assert_eq!(
            relay_uris(&["10.0.0.1", "10.0.0.2"]),
            vec![
                "turn:10.0.0.1:3478?transport=udp",
                "turn:10.0.0.1:3478?transport=tcp",
                "turn:10.0.0.1:3479?transport=udp",
                "turn:10.0.0.1:3479?transport=tcp",
                "turn:10.0.0.2:3478?transport=udp",
                "turn:10.0.0.2:3478?transport=tcp",
                "turn:10.0.0.2:3479?transport=udp",
                "turn:10.0.0.2:3479?transport=tcp",
            ]
        );
    }

    #[test]
    fn relay_uris_keep_explicit_uris() {
        assert_eq!(
            relay_uris(&["turns:relay.example.com:443?transport=tcp", " ", "stun:10.0.0.3"]),
            vec!["turns:relay.example.com:443?transport=tcp", "stun:10.0.0.3"]
        );
    }

    #[test]
    fn split_list_drops_blanks() {
        assert_eq!(split_list("a, b,,c ,"), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn publish_replaces_only_one_field() {
        let store = ConfigStore::new(config());
        let before = store.snapshot();

        store.publish(ConfigUpdate::RelayUris(vec!["turn:10.9.9.9".to_string()]));

        let after = store.snapshot();
        assert_eq!(after.relay_uris, vec!["turn:10.9.9.9"]);
        assert_eq!(after.allowed_origins, before.allowed_origins);
        assert_eq!(after.ttl, before.ttl);
        assert_eq!(
            after
                .current_secret(0)
                .ok()
                .map(|s| s.value().expose_secret().to_string()),
            Some("s3cr3t".to_string())
        );
        // Snapshots taken earlier are unaffected.
        assert_eq!(before.relay_uris.len(), 4);
    }

    #[test]
    fn concurrent_snapshots_are_never_torn() {
        let store = Arc::new(ConfigStore::new(config()));

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for version in 0..2_000 {
                    let uris = vec![format!("turn:v{version}"); 4];
                    let origins = BTreeSet::from([format!("https://v{version}.example.com")]);
                    store.publish(ConfigUpdate::RelayUris(uris));
                    store.publish(ConfigUpdate::AllowedOrigins(origins));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let snapshot = store.snapshot();
                        let first = &snapshot.relay_uris[0];
                        assert!(snapshot.relay_uris.iter().all(|uri| uri == first));
                        assert_eq!(snapshot.allowed_origins.len(), 1);
                    }
                })
            })
            .collect();

        assert!(writer.join().is_ok());
        for reader in readers {
            assert!(reader.join().is_ok());
        }

        let last = store.snapshot();
        assert_eq!(last.relay_uris, vec!["turn:v1999".to_string(); 4]);
    }

    #[test]
    fn concurrent_publishers_keep_each_others_fields() {
        let store = Arc::new(ConfigStore::new(config()));

        let uris = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for version in 0..1_000 {
                    store.publish(ConfigUpdate::RelayUris(vec![format!("turn:v{version}")]));
                }
            })
        };
        let origins = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for version in 0..1_000 {
                    store.publish(ConfigUpdate::AllowedOrigins(BTreeSet::from([format!(
                        "https://v{version}.example.com"
                    )])));
                }
            })
        };

        assert!(uris.join().is_ok());
        assert!(origins.join().is_ok());

        let last = store.snapshot();
        assert_eq!(last.relay_uris, vec!["turn:v999".to_string()]);
        assert!(last.allowed_origins.contains("https://v999.example.com"));
    }
}
