use crate::{
    api,
    cli::actions::signal::shutdown_signal,
    turn::{
        config::{relay_uris, ConfigStore, Field, ServingConfig},
        kv::KeyValueStore,
        rotation::{RotatingSecretStore, SecretRecord},
        source::{ConfigSource, KeyValueSource},
        sync::Synchronizer,
    },
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{debug, error, info};
use url::Url;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum SecretArg {
    Static(SecretString),
    Url(Url),
    Prefix(String),
}

#[derive(Debug, PartialEq, Eq)]
pub enum ListArg {
    Static(Vec<String>),
    Url(Url),
    Key(String),
}

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub ttl: Duration,
    pub rate: Duration,
    pub rotation_period: Duration,
    pub redis: Option<String>,
    pub secret: SecretArg,
    pub relays: ListArg,
    pub origins: Option<ListArg>,
}

/// Execute the server action.
///
/// Every dynamically sourced field is loaded once before the listener binds;
/// a failure there is fatal. Afterwards one synchronizer per field refreshes
/// it every `rate` until shutdown.
/// # Errors
/// Returns an error if the initial load fails or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let client = reqwest::Client::builder()
        .user_agent(crate::APP_USER_AGENT)
        .timeout(FETCH_TIMEOUT)
        .build()?;

    let kv = match &args.redis {
        Some(url) => {
            let kv = KeyValueStore::open(url)?;
            kv.ping().await.context("key-value store is unreachable")?;
            Some(kv)
        }
        None => None,
    };

    let mut config = ServingConfig::new(args.ttl);

    let secret_source = match args.secret {
        SecretArg::Static(secret) => {
            config.secrets = vec![SecretRecord::permanent(secret)];
            ConfigSource::Static
        }
        SecretArg::Url(url) => ConfigSource::Polled(url),
        SecretArg::Prefix(prefix) => ConfigSource::KeyValue(KeyValueSource::Secrets(
            RotatingSecretStore::new(require_store(kv.as_ref())?, &prefix, args.rotation_period),
        )),
    };

    let (relay_source, servers) = list_source(args.relays, kv.as_ref())?;
    config.relay_uris = relay_uris(&servers);

    let (origin_source, hosts) = match args.origins {
        Some(origins) => list_source(origins, kv.as_ref())?,
        None => (ConfigSource::Static, Vec::new()),
    };
    config.allowed_origins = hosts.into_iter().collect();

    let store = Arc::new(ConfigStore::new(config));

    let synchronizers: Vec<Synchronizer> = [
        (Field::Secret, secret_source),
        (Field::RelayUris, relay_source),
        (Field::AllowedOrigins, origin_source),
    ]
    .into_iter()
    .filter(|(_, source)| source.is_dynamic())
    .map(|(field, source)| {
        Synchronizer::new(field, source, args.rate, client.clone(), Arc::clone(&store))
    })
    .collect();

    for synchronizer in &synchronizers {
        synchronizer.bootstrap().await?;
        debug!("Loaded {}", synchronizer.field().as_str());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles: Vec<_> = synchronizers
        .into_iter()
        .map(|synchronizer| synchronizer.spawn(shutdown_rx.clone()))
        .collect();
    drop(shutdown_rx);

    let result = api::new(args.port, store, shutdown_signal()).await;

    if shutdown_tx.send(true).is_err() {
        debug!("No synchronizers running");
    }
    for handle in handles {
        if let Err(e) = handle.await {
            error!("Synchronizer task failed: {}", e);
        }
    }

    result
}

fn require_store(kv: Option<&KeyValueStore>) -> Result<KeyValueStore> {
    kv.cloned()
        .context("--redis is required for key-value sources")
}

fn list_source(list: ListArg, kv: Option<&KeyValueStore>) -> Result<(ConfigSource, Vec<String>)> {
    Ok(match list {
        ListArg::Static(items) => (ConfigSource::Static, items),
        ListArg::Url(url) => (ConfigSource::Polled(url), Vec::new()),
        ListArg::Key(key) => (
            ConfigSource::KeyValue(KeyValueSource::Set {
                store: require_store(kv)?,
                key,
            }),
            Vec::new(),
        ),
    })
}

fn log_startup_args(args: &Args) {
    let secret_source = match &args.secret {
        SecretArg::Static(_) => "static".to_string(),
        SecretArg::Url(url) => url.to_string(),
        SecretArg::Prefix(prefix) => format!(
            "kv:{prefix}/* (rotation period {}s)",
            args.rotation_period.as_secs()
        ),
    };
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("ttl", format!("{}s", args.ttl.as_secs())),
        ("rate", format!("{}s", args.rate.as_secs())),
        ("secret", secret_source),
        ("servers", describe_list(Some(&args.relays))),
        ("hosts", describe_list(args.origins.as_ref())),
        (
            "redis",
            args.redis
                .as_deref()
                .map_or_else(|| "none".to_string(), redact_url),
        ),
    ];
    log_entries("Startup configuration", &entries);
}

fn describe_list(list: Option<&ListArg>) -> String {
    match list {
        None => "none".to_string(),
        Some(ListArg::Static(items)) => items.join(","),
        Some(ListArg::Url(url)) => url.to_string(),
        Some(ListArg::Key(key)) => format!("kv:{key}"),
    }
}

fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-url".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\n{title}:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}
