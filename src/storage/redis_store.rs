// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Redis-backed metadata store.
//!
//! Records are Redis hashes with a key expiry. Expiry notifications come from
//! keyspace events on `__keyevent@<db>__:expired`, which requires the server
//! to run with `notify-keyspace-events` containing `Ex`. [`RedisStore::connect`]
//! tries to enable that and keeps going when the server refuses (managed
//! offerings usually lock `CONFIG`).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tracing::{info, warn};
use url::Url;

use super::{ExpiryEvents, FieldSet, MetadataStore, StoreError, StoreResult, FIELD_VIEWS_COUNT};
use crate::config::RedisConfig;

const KEYSPACE_EVENTS_PARAM: &str = "notify-keyspace-events";

/// Increment the view counter only when the record still exists. Returns -1
/// otherwise so that a missing key is never recreated.
const CONSUME_VIEW_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return redis.call('HINCRBY', KEYS[1], ARGV[1], 1)
end
return -1
"#;

#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    conn: ConnectionManager,
    db: i64,
    consume_script: Script,
}

impl RedisStore {
    /// Open a managed connection and verify it with `PING`.
    pub async fn connect(config: &RedisConfig) -> StoreResult<Self> {
        let url = connection_url(config)?;
        let client = Client::open(url.as_str())?;
        let conn = ConnectionManager::new(client.clone()).await?;

        let store = Self {
            client,
            conn,
            db: config.db,
            consume_script: Script::new(CONSUME_VIEW_SCRIPT),
        };
        store.ping().await?;
        store.enable_expiry_events().await;

        info!(host = %config.host, port = config.port, db = config.db, "Connected to Redis");
        Ok(store)
    }

    async fn enable_expiry_events(&self) {
        let mut conn = self.conn.clone();
        let current: HashMap<String, String> = match redis::cmd("CONFIG")
            .arg("GET")
            .arg(KEYSPACE_EVENTS_PARAM)
            .query_async(&mut conn)
            .await
        {
            Ok(current) => current,
            Err(e) => {
                warn!(error = %e, "Could not read keyspace event flags");
                HashMap::new()
            }
        };
        let current = current
            .get(KEYSPACE_EVENTS_PARAM)
            .map(String::as_str)
            .unwrap_or_default();

        let Some(flags) = with_expiry_events(current) else {
            info!(flags = %current, "Keyspace expiry events already enabled");
            return;
        };

        let result: redis::RedisResult<()> = redis::cmd("CONFIG")
            .arg("SET")
            .arg(KEYSPACE_EVENTS_PARAM)
            .arg(&flags)
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => info!(flags = %flags, "Enabled keyspace expiry events"),
            Err(e) => warn!(
                error = %e,
                "Could not enable keyspace expiry events; \
                 expired file bundles are only removed if the server already publishes them"
            ),
        }
    }

    fn expired_channel(&self) -> String {
        format!("__keyevent@{}__:expired", self.db)
    }
}

/// Flags needed on top of `current` for keyevent notifications of expired
/// keys, or `None` when `current` already has them. `A` includes `x`.
fn with_expiry_events(current: &str) -> Option<String> {
    let has_keyevent = current.contains('E');
    let has_expired = current.contains('x') || current.contains('A');
    if has_keyevent && has_expired {
        return None;
    }

    let mut flags = current.to_string();
    if !has_keyevent {
        flags.push('E');
    }
    if !has_expired {
        flags.push('x');
    }
    Some(flags)
}

fn connection_url(config: &RedisConfig) -> StoreResult<Url> {
    let mut url = Url::parse(&format!("redis://{}:{}/{}", config.host, config.port, config.db))
        .map_err(|e| StoreError::Invalid(format!("redis url: {e}")))?;

    if let Some(password) = config.password.as_deref() {
        url.set_password(Some(password))
            .map_err(|_| StoreError::Invalid("redis url cannot carry a password".to_string()))?;
    }
    Ok(url)
}

#[async_trait]
impl MetadataStore for RedisStore {
    async fn create(&self, key: &str, fields: &FieldSet, ttl: Duration) -> StoreResult<()> {
        let ttl_secs = ttl.as_secs();
        if ttl_secs == 0 {
            return Err(StoreError::Invalid("ttl must be at least one second".to_string()));
        }
        if fields.is_empty() {
            return Err(StoreError::Invalid("record has no fields".to_string()));
        }

        let items: Vec<(String, Vec<u8>)> = fields
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .hset_multiple(key, &items)
            .ignore()
            .expire(key, ttl_secs as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn read_all(&self, key: &str) -> StoreResult<FieldSet> {
        let mut conn = self.conn.clone();
        let values: HashMap<String, Vec<u8>> = conn.hgetall(key).await?;
        if values.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(values.into_iter().collect())
    }

    async fn set_field(&self, key: &str, name: &str, value: &[u8]) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(key, name, value.to_vec()).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn remaining_ttl(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn.ttl(key).await?;
        // -2: no such key, -1: no expiry attached
        if ttl < 0 {
            return Err(StoreError::NotFound);
        }
        Ok(ttl as u64)
    }

    async fn consume_view(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.conn.clone();
        let consumed: i64 = self
            .consume_script
            .key(key)
            .arg(FIELD_VIEWS_COUNT)
            .invoke_async(&mut conn)
            .await?;
        if consumed < 0 {
            return Err(StoreError::NotFound);
        }
        Ok(consumed)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl ExpiryEvents for RedisStore {
    async fn subscribe_expired(&self) -> StoreResult<BoxStream<'static, String>> {
        let channel = self.expired_channel();
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(channel.as_str()).await?;
        info!(channel = %channel, "Subscribed to Redis expiry events");

        let events = pubsub.into_on_message().filter_map(|msg| async move {
            match msg.get_payload::<String>() {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(error = %e, "Dropping undecodable expiry event");
                    None
                }
            }
        });
        Ok(events.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RedisConfig {
        RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
        }
    }

    #[test]
    fn expiry_events_are_merged_into_existing_flags() {
        assert_eq!(with_expiry_events("").as_deref(), Some("Ex"));
        assert_eq!(with_expiry_events("KEA"), None);
        assert_eq!(with_expiry_events("Ex"), None);
        assert_eq!(with_expiry_events("Kg").as_deref(), Some("KgEx"));
        assert_eq!(with_expiry_events("Kx").as_deref(), Some("KxE"));
        assert_eq!(with_expiry_events("Eg$").as_deref(), Some("Eg$x"));
    }

    #[test]
    fn url_without_password() {
        let url = connection_url(&config()).unwrap();
        assert_eq!(url.as_str(), "redis://localhost:6379/0");
    }

    #[test]
    fn url_carries_password_and_db() {
        let url = connection_url(&RedisConfig {
            password: Some("p@ss word".to_string()),
            db: 4,
            ..config()
        })
        .unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(6379));
        assert_eq!(url.path(), "/4");
        assert!(url.password().is_some());
        assert_ne!(url.password(), Some("p@ss word"));
    }

    #[test]
    fn invalid_host_is_rejected() {
        let err = connection_url(&RedisConfig {
            host: "bad host".to_string(),
            ..config()
        })
        .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }
}
