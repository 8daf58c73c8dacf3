//! Time-stamped shared secrets and the rotating key-value backed store.
//!
//! A rotation writer stores one record per rotation period under
//! `{prefix}/{issued_at}` with an expiry of two periods, so at any instant one
//! or two records are valid. New credentials are always signed with the
//! oldest valid record: a fresh secret is only used after it has existed for
//! a full period (time for every TURN server to pick it up), and the record in
//! use keeps at least one period of validity left.

use crate::turn::{
    error::Error,
    kv::{KeyValueStore, StoredEntry},
};
use anyhow::Result;
use rand::{distributions::Alphanumeric, Rng};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone)]
pub struct SecretRecord {
    pub issued_at: i64,
    /// `None` for secrets that do not expire (static or polled).
    pub valid_until: Option<i64>,
    value: SecretString,
}

impl SecretRecord {
    #[must_use]
    pub fn new(issued_at: i64, valid_until: Option<i64>, value: SecretString) -> Self {
        Self {
            issued_at,
            valid_until,
            value,
        }
    }

    /// A secret without expiry.
    #[must_use]
    pub fn permanent(value: SecretString) -> Self {
        Self::new(0, None, value)
    }

    /// A record written by the rotation writer at `issued_at`, assuming the
    /// writer uses the same rotation period.
    #[must_use]
    pub fn rotated(issued_at: i64, rotation_period: Duration, value: SecretString) -> Self {
        let grace = i64::try_from(rotation_period.as_secs().saturating_mul(2)).unwrap_or(i64::MAX);
        Self::new(issued_at, Some(issued_at.saturating_add(grace)), value)
    }

    #[must_use]
    pub fn is_valid(&self, now: i64) -> bool {
        self.valid_until.map_or(true, |until| now < until)
    }

    #[must_use]
    pub fn value(&self) -> &SecretString {
        &self.value
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.value.expose_secret().as_bytes()
    }
}

/// Valid records ordered by `issued_at`, oldest first.
#[must_use]
pub fn valid_records(records: &[SecretRecord], now: i64) -> Vec<&SecretRecord> {
    let mut valid: Vec<&SecretRecord> = records.iter().filter(|r| r.is_valid(now)).collect();
    valid.sort_by_key(|r| r.issued_at);
    valid
}

/// The record used for new issuance: the oldest still-valid one.
#[must_use]
pub fn select_active(records: &[SecretRecord], now: i64) -> Option<&SecretRecord> {
    records
        .iter()
        .filter(|r| r.is_valid(now))
        .min_by_key(|r| r.issued_at)
}

/// The secret new credentials should be signed with.
///
/// # Errors
/// Returns `Error::NoSecretAvailable` when no record is valid at `now`.
pub fn current_secret(records: &[SecretRecord], now: i64) -> Result<&SecretRecord, Error> {
    select_active(records, now).ok_or(Error::NoSecretAvailable)
}

/// Extract `issued_at` from a `{prefix}/{unix-seconds}` key.
#[must_use]
pub fn parse_issued_at(prefix: &str, key: &str) -> Option<i64> {
    key.strip_prefix(prefix)?
        .strip_prefix('/')?
        .parse::<i64>()
        .ok()
}

/// Build records from stored entries, skipping malformed keys and keys that
/// vanished between listing and reading.
///
/// The store's remaining TTL is authoritative for `valid_until`; keys without
/// one fall back to `issued_at + 2 * rotation_period`.
#[must_use]
pub fn records_from_entries(
    prefix: &str,
    rotation_period: Duration,
    now: i64,
    entries: Vec<StoredEntry>,
) -> Vec<SecretRecord> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let Some(issued_at) = parse_issued_at(prefix, &entry.key) else {
                warn!(key = %entry.key, "ignoring secret key without timestamp suffix");
                return None;
            };
            let value = SecretString::from(entry.value.filter(|v| !v.is_empty())?);
            let assumed = SecretRecord::rotated(issued_at, rotation_period, value);

            let Some(ttl) = entry.ttl else {
                return Some(assumed);
            };

            let expires_at = now.saturating_add(i64::try_from(ttl).unwrap_or(i64::MAX));
            if assumed.valid_until.is_some_and(|until| expires_at > until) {
                warn!(
                    key = %entry.key,
                    expires_at,
                    assumed = ?assumed.valid_until,
                    "secret outlives two rotation periods, check --rotation-period against the writer"
                );
            }

            Some(SecretRecord::new(issued_at, Some(expires_at), assumed.value))
        })
        .collect()
}

#[must_use]
pub fn random_secret(length: usize) -> SecretString {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    SecretString::from(secret)
}

#[derive(Debug, Clone)]
pub struct RotatingSecretStore {
    store: KeyValueStore,
    prefix: String,
    rotation_period: Duration,
}

impl RotatingSecretStore {
    #[must_use]
    pub fn new(store: KeyValueStore, prefix: &str, rotation_period: Duration) -> Self {
        Self {
            store,
            prefix: prefix.trim_end_matches('/').to_string(),
            rotation_period,
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn rotation_period(&self) -> Duration {
        self.rotation_period
    }

    /// Valid records, oldest first.
    ///
    /// # Errors
    /// Returns an error if the store cannot be queried.
    #[instrument(skip(self), fields(prefix = %self.prefix))]
    pub async fn records(&self, now: i64) -> Result<Vec<SecretRecord>> {
        let entries = self.store.prefixed_entries(&self.prefix).await?;
        let records = records_from_entries(&self.prefix, self.rotation_period, now, entries);

        let valid: Vec<SecretRecord> = valid_records(&records, now)
            .into_iter()
            .cloned()
            .collect();

        debug!(total = records.len(), valid = valid.len(), "secret records");

        Ok(valid)
    }

    /// Write a new secret issued at `now`, expiring after two rotation periods.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    #[instrument(skip(self, secret), fields(prefix = %self.prefix))]
    pub async fn rotate(&self, secret: &SecretString, now: i64) -> Result<String> {
        let key = format!("{}/{now}", self.prefix);
        let expiry = self.rotation_period.as_secs().saturating_mul(2).max(1);

        self.store
            .put_expiring(&key, secret.expose_secret(), expiry)
            .await?;

        Ok(key)
    }
}
