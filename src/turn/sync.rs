//! Background refresh of dynamically sourced configuration fields.

use crate::turn::{
    config::{ConfigStore, Field},
    source::ConfigSource,
    unix_now,
};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle, time::sleep};
use tracing::{error, info, Instrument, info_span};

/// One refresh loop per dynamic field, so a failing source never delays another.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    field: Field,
    source: ConfigSource,
    interval: Duration,
    client: reqwest::Client,
    store: Arc<ConfigStore>,
}

impl Synchronizer {
    #[must_use]
    pub fn new(
        field: Field,
        source: ConfigSource,
        interval: Duration,
        client: reqwest::Client,
        store: Arc<ConfigStore>,
    ) -> Self {
        Self {
            field,
            source,
            interval,
            client,
            store,
        }
    }

    #[must_use]
    pub fn field(&self) -> Field {
        self.field
    }

    async fn fetch_and_publish(&self) -> Result<()> {
        let update = self
            .source
            .fetch(self.field, &self.client, unix_now())
            .await?;
        self.store.publish(update);
        Ok(())
    }

    /// Initial fetch at startup; unlike [`Synchronizer::refresh`] a failure is returned.
    ///
    /// # Errors
    /// Returns an error if the source cannot provide a usable value.
    pub async fn bootstrap(&self) -> Result<()> {
        self.fetch_and_publish()
            .await
            .with_context(|| format!("Failed to load {} from {}", self.field.as_str(), self.source))
    }

    /// Fetch once and publish on success. Failures leave the published value untouched.
    pub async fn refresh(&self) -> bool {
        match self.fetch_and_publish().await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to refresh {}: {:#}", self.field.as_str(), e);
                false
            }
        }
    }

    /// Sleep, refresh, repeat until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// The initial value is expected to be published already, so the first
    /// fetch happens one interval after start. There is no backoff.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            source = %self.source,
            interval_seconds = self.interval.as_secs_f64(),
            "synchronizer started"
        );

        loop {
            tokio::select! {
                () = sleep(self.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("synchronizer stopped");
                        return;
                    }
                    continue;
                }
            }

            self.refresh().await;
        }
    }

    /// Spawn [`Synchronizer::run`] on the runtime.
    #[must_use]
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let span = info_span!("synchronizer", field = self.field.as_str());
        tokio::spawn(self.run(shutdown).instrument(span))
    }
}
