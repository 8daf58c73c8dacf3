use crate::{
    cli::actions::signal::shutdown_signal,
    turn::{
        kv::KeyValueStore,
        rotation::{random_secret, RotatingSecretStore},
        unix_now,
    },
};
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

#[derive(Debug)]
pub struct Args {
    pub redis: String,
    pub prefix: String,
    pub rotation_period: Duration,
    pub secret_length: usize,
}

/// Write a fresh secret every rotation period until Ctrl-C or SIGTERM.
///
/// Write failures are logged and retried on the next period; an unreachable
/// store at startup is fatal.
/// # Errors
/// Returns an error if the store URL is invalid or the store is unreachable at startup.
pub async fn execute(args: Args) -> Result<()> {
    let kv = KeyValueStore::open(&args.redis)?;
    kv.ping().await.context("key-value store is unreachable")?;

    let store = RotatingSecretStore::new(kv, &args.prefix, args.rotation_period);

    info!(
        prefix = store.prefix(),
        rotation_period_seconds = args.rotation_period.as_secs(),
        secret_length = args.secret_length,
        "Secret rotation started"
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        match store.rotate(&random_secret(args.secret_length), unix_now()).await {
            Ok(key) => info!(key = %key, "Secret rotated"),
            Err(e) => error!("Failed to rotate secret: {:#}", e),
        }

        tokio::select! {
            () = sleep(args.rotation_period) => {}
            () = &mut shutdown => {
                info!("Secret rotation stopped");
                return Ok(());
            }
        }
    }
}
