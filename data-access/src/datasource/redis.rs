//! Key-value data source: thin pass-throughs to Redis commands.

use std::collections::BTreeSet;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

use common::{AppError, AppResult};

use super::DataSource;
use crate::connection::{Connection, RedisConnection};

/// Strings, hashes, sets and RedisJSON documents over a Redis connection.
#[derive(Clone, Copy)]
pub struct RedisDataSource<'c> {
    connection: &'c RedisConnection,
}

impl<'c> RedisDataSource<'c> {
    /// Wraps a Redis connection.
    ///
    /// # Errors
    /// `AppError::UnsupportedOperation` for any other connection kind.
    pub fn new(connection: &'c dyn Connection) -> AppResult<Self> {
        let connection = connection
            .as_any()
            .downcast_ref::<RedisConnection>()
            .ok_or_else(|| {
                AppError::UnsupportedOperation(format!(
                    "{} connection {} is not a key-value store",
                    connection.kind(),
                    connection.name()
                ))
            })?;
        Ok(Self { connection })
    }

    fn conn(&self) -> AppResult<ConnectionManager> {
        self.connection.manager()
    }

    /// `SET key value`
    pub async fn set_key(&self, key: &str, value: &str) -> AppResult<()> {
        let mut conn = self.conn()?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    /// `GET key`; `None` when the key is absent.
    pub async fn get_key(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn()?;
        Ok(conn.get(key).await?)
    }

    /// `DEL key`; returns the number of keys removed.
    pub async fn delete_key(&self, key: &str) -> AppResult<u64> {
        let mut conn = self.conn()?;
        Ok(conn.del(key).await?)
    }

    pub async fn key_exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.conn()?;
        Ok(conn.exists(key).await?)
    }

    /// `HSET key field value`; returns the number of fields created.
    pub async fn set_hash_field(&self, key: &str, field: &str, value: &str) -> AppResult<u64> {
        let mut conn = self.conn()?;
        Ok(conn.hset(key, field, value).await?)
    }

    pub async fn get_hash_field(&self, key: &str, field: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn()?;
        Ok(conn.hget(key, field).await?)
    }

    /// `HDEL key field`; returns the number of fields removed.
    pub async fn delete_hash_field(&self, key: &str, field: &str) -> AppResult<u64> {
        let mut conn = self.conn()?;
        Ok(conn.hdel(key, field).await?)
    }

    /// `SADD key value`; returns the number of members added.
    pub async fn set_set_value(&self, key: &str, value: &str) -> AppResult<u64> {
        let mut conn = self.conn()?;
        Ok(conn.sadd(key, value).await?)
    }

    /// `SMEMBERS key`
    pub async fn get_set_values(&self, key: &str) -> AppResult<BTreeSet<String>> {
        let mut conn = self.conn()?;
        Ok(conn.smembers(key).await?)
    }

    /// `SREM key value`; returns the number of members removed.
    pub async fn remove_set_value(&self, key: &str, value: &str) -> AppResult<u64> {
        let mut conn = self.conn()?;
        Ok(conn.srem(key, value).await?)
    }

    /// Stores `value` as a RedisJSON document at the root path.
    pub async fn set_json_value<T>(&self, key: &str, value: &T) -> AppResult<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let payload = serde_json::to_string(value)?;
        let mut conn = self.conn()?;
        redis::cmd("JSON.SET")
            .arg(key)
            .arg(".")
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Reads a RedisJSON document. Absent keys and payloads that do not
    /// decode as `T` both yield `None`.
    pub async fn get_json_value<T>(&self, key: &str) -> AppResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let mut conn = self.conn()?;
        let payload: Option<String> = redis::cmd("JSON.GET")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(payload.and_then(|raw| decode_json(key, &raw)))
    }
}

fn decode_json<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(key = %key, error = %e, "JSON value did not decode");
            None
        }
    }
}

#[async_trait]
impl DataSource for RedisDataSource<'_> {
    fn connection(&self) -> &dyn Connection {
        self.connection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{FromConfig, SqliteConnection};
    use common::models::ConfigMap;
    use serde_json::{json, Value};

    fn config(value: Value) -> ConfigMap {
        value.as_object().cloned().unwrap()
    }

    fn local() -> RedisConnection {
        RedisConnection::from_config(&config(json!({
            "name": "cache", "host": "127.0.0.1", "port": 6379,
            "database_index": 15, "password": "",
        })))
        .unwrap()
    }

    #[test]
    fn test_decode_json() {
        assert_eq!(decode_json::<Value>("k", r#"{"a":1}"#), Some(json!({"a": 1})));
        assert_eq!(decode_json::<Value>("k", "not json"), None);
        assert_eq!(decode_json::<u32>("k", r#""text""#), None);
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let conn = local();
        let ds = RedisDataSource::new(&conn).unwrap();
        assert!(matches!(ds.get_key("k").await, Err(AppError::NotConnected(_))));
        assert!(!ds.check_health().await);

        let sqlite = SqliteConnection::from_config(&config(json!({
            "name": "mem", "database": ":memory:",
        })))
        .unwrap();
        assert!(matches!(
            RedisDataSource::new(&sqlite),
            Err(AppError::UnsupportedOperation(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires a Redis server on 127.0.0.1:6379"]
    async fn test_commands_live() {
        let mut conn = local();
        conn.connect().await.unwrap();
        let ds = RedisDataSource::new(&conn).unwrap();

        ds.set_key("greeting", "hello").await.unwrap();
        assert_eq!(ds.get_key("greeting").await.unwrap().as_deref(), Some("hello"));
        assert!(ds.key_exists("greeting").await.unwrap());
        assert_eq!(ds.delete_key("greeting").await.unwrap(), 1);
        assert_eq!(ds.get_key("greeting").await.unwrap(), None);

        assert_eq!(ds.set_hash_field("user:1", "name", "Ada").await.unwrap(), 1);
        assert_eq!(
            ds.get_hash_field("user:1", "name").await.unwrap().as_deref(),
            Some("Ada")
        );
        assert_eq!(ds.delete_hash_field("user:1", "name").await.unwrap(), 1);

        ds.set_set_value("tags", "a").await.unwrap();
        ds.set_set_value("tags", "b").await.unwrap();
        let members = ds.get_set_values("tags").await.unwrap();
        assert!(members.contains("a") && members.contains("b"));
        assert_eq!(ds.remove_set_value("tags", "a").await.unwrap(), 1);
        ds.delete_key("tags").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a Redis server with the RedisJSON module"]
    async fn test_json_live() {
        let mut conn = local();
        conn.connect().await.unwrap();
        let ds = RedisDataSource::new(&conn).unwrap();
        ds.set_json_value("doc", &json!({"model": "Pixel", "version": 7}))
            .await
            .unwrap();
        let doc: Option<Value> = ds.get_json_value("doc").await.unwrap();
        assert_eq!(doc, Some(json!({"model": "Pixel", "version": 7})));
        assert_eq!(ds.get_json_value::<Value>("missing").await.unwrap(), None);
        ds.delete_key("doc").await.unwrap();
    }
}
