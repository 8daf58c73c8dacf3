use anyhow::{Context, Result};
use redis::AsyncCommands;
use tracing::instrument;

/// A key read with its value and remaining time to live in seconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredEntry {
    pub key: String,
    /// `None` when the key expired between listing and reading.
    pub value: Option<String>,
    /// `None` when the key has no expiry.
    pub ttl: Option<u64>,
}

/// Thin async wrapper over the key-value store holding rotated secrets and
/// set-typed lists.
#[derive(Clone, Debug)]
pub struct KeyValueStore {
    client: redis::Client,
}

impl KeyValueStore {
    /// # Errors
    /// Returns an error if `url` is not a valid connection URL.
    pub fn open(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid key-value store URL")?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .context("failed to connect to key-value store")
    }

    /// # Errors
    /// Returns an error if the store is unreachable.
    #[instrument(skip(self))]
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// All `{prefix}/*` keys with their values and TTLs.
    ///
    /// # Errors
    /// Returns an error if the store cannot be queried.
    #[instrument(skip(self))]
    pub async fn prefixed_entries(&self, prefix: &str) -> Result<Vec<StoredEntry>> {
        let mut conn = self.connection().await?;

        let keys: Vec<String> = conn.keys(format!("{prefix}/*")).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        let mut pipe = redis::pipe();
        for key in &keys {
            pipe.cmd("TTL").arg(key);
        }
        let ttls: Vec<i64> = pipe.query_async(&mut conn).await?;

        Ok(entries(keys, values, ttls))
    }

    /// Members of a set-typed key, sorted.
    ///
    /// # Errors
    /// Returns an error if the store cannot be queried.
    #[instrument(skip(self))]
    pub async fn members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.connection().await?;

        let mut members: Vec<String> = conn.smembers(key).await?;
        members.sort();

        Ok(members)
    }

    /// # Errors
    /// Returns an error if the write fails.
    #[instrument(skip(self, value))]
    pub async fn put_expiring(&self, key: &str, value: &str, seconds: u64) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, seconds).await?;
        Ok(())
    }
}

// TTL replies -1 (no expiry) and -2 (gone) carry no expiry; a gone key also
// has no value.
fn entries(keys: Vec<String>, values: Vec<Option<String>>, ttls: Vec<i64>) -> Vec<StoredEntry> {
    keys.into_iter()
        .zip(values)
        .zip(ttls)
        .map(|((key, value), ttl)| StoredEntry {
            key,
            value,
            ttl: u64::try_from(ttl).ok(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_replies_map_to_expiry() {
        let keys = vec!["p/1".to_string(), "p/2".to_string(), "p/3".to_string()];
        let values = vec![Some("a".to_string()), Some("b".to_string()), None];
        let entries = entries(keys, values, vec![120, -1, -2]);

        assert_eq!(entries[0].ttl, Some(120));
        assert_eq!(entries[1].ttl, None);
        assert_eq!(entries[2].ttl, None);
        assert_eq!(entries[2].value, None);
        assert_eq!(entries[0].value.as_deref(), Some("a"));
    }

    #[test]
    fn open_rejects_malformed_url() {
        assert!(KeyValueStore::open("not a url").is_err());
    }

    #[test]
    fn open_does_not_connect() {
        // Nothing listens here; opening only parses the URL.
        assert!(KeyValueStore::open("redis://127.0.0.1:1/").is_ok());
    }
}
