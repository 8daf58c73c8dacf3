//! Where each dynamic configuration field comes from.

use crate::turn::{
    config::{relay_uris, ConfigUpdate, Field},
    error::Error,
    kv::KeyValueStore,
    rotation::{self, RotatingSecretStore, SecretRecord},
};
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use std::{collections::BTreeSet, fmt};
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug, Clone)]
pub enum KeyValueSource {
    /// Time-stamped secret records under a key prefix.
    Secrets(RotatingSecretStore),
    /// A set-typed key read in full.
    Set { store: KeyValueStore, key: String },
}

#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Fixed at startup, never refreshed.
    Static,
    /// JSON document fetched with an unauthenticated GET.
    Polled(Url),
    KeyValue(KeyValueSource),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Polled(url) => write!(f, "{url}"),
            Self::KeyValue(KeyValueSource::Secrets(store)) => {
                write!(f, "kv:{}/*", store.prefix())
            }
            Self::KeyValue(KeyValueSource::Set { key, .. }) => write!(f, "kv:{key}"),
        }
    }
}

impl ConfigSource {
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, Self::Static)
    }

    /// Fetch a fresh value for `field`.
    ///
    /// An empty result is an error so the caller keeps serving the last
    /// known-good value.
    ///
    /// # Errors
    /// Returns an error on network, decode or store failures, on an empty
    /// result, or when the source cannot provide `field`.
    #[instrument(skip(self, client, field), fields(source = %self, field = field.as_str()))]
    pub async fn fetch(&self, field: Field, client: &Client, now: i64) -> Result<ConfigUpdate> {
        let update = match (self, field) {
            (Self::Static, _) => return Err(anyhow!("static sources are not fetched")),

            (Self::Polled(url), Field::Secret) => {
                let secret: String = get_json(client, url).await?;
                decode_secret(secret)?
            }
            (Self::Polled(url), Field::RelayUris) => {
                let servers: Vec<String> = get_json(client, url).await?;
                decode_relay_uris(&servers)?
            }
            (Self::Polled(url), Field::AllowedOrigins) => {
                let origins: Vec<String> = get_json(client, url).await?;
                decode_allowed_origins(origins)?
            }

            (Self::KeyValue(KeyValueSource::Secrets(store)), Field::Secret) => {
                let records = store.records(now).await?;
                rotation::current_secret(&records, now)?;
                ConfigUpdate::Secrets(records)
            }
            (Self::KeyValue(KeyValueSource::Set { store, key }), Field::RelayUris) => {
                decode_relay_uris(&store.members(key).await?)?
            }
            (Self::KeyValue(KeyValueSource::Set { store, key }), Field::AllowedOrigins) => {
                decode_allowed_origins(store.members(key).await?)?
            }
            (Self::KeyValue(_), field) => {
                return Err(anyhow!(
                    "key-value source cannot provide {}",
                    field.as_str()
                ))
            }
        };

        debug!("fetched");

        Ok(update)
    }
}

async fn get_json<T: DeserializeOwned>(client: &Client, url: &Url) -> Result<T> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("GET {url} - {status}"));
    }

    response
        .json::<T>()
        .await
        .with_context(|| format!("Error decoding JSON from {url}"))
}

/// A polled secret is a single JSON string.
///
/// # Errors
/// Returns `Error::EmptySource` for an empty string.
pub fn decode_secret(secret: String) -> Result<ConfigUpdate> {
    if secret.is_empty() {
        return Err(Error::EmptySource.into());
    }
    Ok(ConfigUpdate::Secrets(vec![SecretRecord::permanent(
        SecretString::from(secret),
    )]))
}

/// Relay sources list server addresses or ready-made URIs.
///
/// # Errors
/// Returns `Error::EmptySource` when nothing usable remains.
pub fn decode_relay_uris(servers: &[String]) -> Result<ConfigUpdate> {
    let uris = relay_uris(servers);
    if uris.is_empty() {
        return Err(Error::EmptySource.into());
    }
    Ok(ConfigUpdate::RelayUris(uris))
}

/// # Errors
/// Returns `Error::EmptySource` when nothing usable remains.
pub fn decode_allowed_origins(origins: Vec<String>) -> Result<ConfigUpdate> {
    let origins: BTreeSet<String> = origins
        .into_iter()
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect();
    if origins.is_empty() {
        return Err(Error::EmptySource.into());
    }
    Ok(ConfigUpdate::AllowedOrigins(origins))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::turn::rotation::select_active;
    use secrecy::ExposeSecret;
    use serde_json::json;
    use std::net::TcpListener;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn source(server: &MockServer, route: &str) -> ConfigSource {
        ConfigSource::Polled(Url::parse(&format!("{}{route}", server.uri())).unwrap())
    }

    #[test]
    fn empty_values_are_rejected() {
        assert!(decode_secret(String::new()).is_err());
        assert!(decode_relay_uris(&[]).is_err());
        assert!(decode_relay_uris(&[" ".to_string()]).is_err());
        assert!(decode_allowed_origins(vec![String::new()]).is_err());
    }

    #[test]
    fn origins_are_trimmed_and_deduplicated() {
        let update = decode_allowed_origins(vec![
            " https://a.example.com".to_string(),
            "https://a.example.com".to_string(),
            "https://b.example.com".to_string(),
        ])
        .unwrap();
        let ConfigUpdate::AllowedOrigins(origins) = update else {
            panic!("unexpected update {update:?}");
        };
        assert_eq!(origins.len(), 2);
    }

    #[test]
    fn static_source_is_not_dynamic() {
        assert!(!ConfigSource::Static.is_dynamic());
        assert!(ConfigSource::Polled(Url::parse("http://localhost/").unwrap()).is_dynamic());
    }

    #[tokio::test]
    async fn polled_secret() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!("fresh")))
            .mount(&server)
            .await;

        let update = source(&server, "/secret")
            .fetch(Field::Secret, &Client::new(), 0)
            .await?;
        let ConfigUpdate::Secrets(records) = update else {
            panic!("unexpected update {update:?}");
        };
        let active = select_active(&records, 0).map(|r| r.value().expose_secret().to_string());
        assert_eq!(active.as_deref(), Some("fresh"));
        Ok(())
    }

    #[tokio::test]
    async fn polled_servers_are_expanded() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/servers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["10.0.0.1"])))
            .mount(&server)
            .await;

        let update = source(&server, "/servers")
            .fetch(Field::RelayUris, &Client::new(), 0)
            .await?;
        let ConfigUpdate::RelayUris(uris) = update else {
            panic!("unexpected update {update:?}");
        };
        assert_eq!(uris.len(), 4);
        assert_eq!(uris[0], "turn:10.0.0.1:3478?transport=udp");
        Ok(())
    }

    #[tokio::test]
    async fn polled_errors_are_reported() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = Client::new();
        for route in ["/broken", "/garbage", "/empty"] {
            let result = source(&server, route)
                .fetch(Field::AllowedOrigins, &client, 0)
                .await;
            assert!(result.is_err(), "{route} should fail");
        }
        Ok(())
    }

    #[tokio::test]
    async fn static_source_cannot_be_fetched() {
        let result = ConfigSource::Static
            .fetch(Field::Secret, &Client::new(), 0)
            .await;
        assert!(result.is_err());
    }
}
