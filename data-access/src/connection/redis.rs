use std::any::Any;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{ClientTlsConfig, ErrorKind, RedisError, TlsCertificates};

use common::models::connection::parse_params;
use common::models::{ConfigMap, ConnectionItem, ConnectionKind, KeyValueParams};
use common::{AppError, AppResult};

use super::{Connection, FromConfig};

/// Redis connection backed by a multiplexed, auto-reconnecting manager.
pub struct RedisConnection {
    params: KeyValueParams,
    manager: Option<ConnectionManager>,
}

impl std::fmt::Debug for RedisConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConnection")
            .field("params", &self.params)
            .field("connected", &self.manager.is_some())
            .finish()
    }
}

impl RedisConnection {
    pub fn params(&self) -> &KeyValueParams {
        &self.params
    }

    /// A handle to the live manager. Handles are cheap clones sharing one
    /// multiplexed connection.
    ///
    /// # Errors
    /// `AppError::NotConnected` while disconnected.
    pub fn manager(&self) -> AppResult<ConnectionManager> {
        self.manager
            .clone()
            .ok_or_else(|| AppError::NotConnected(self.params.name.clone()))
    }

    /// Client URL for the given scheme. The password segment is left out
    /// when the password is empty.
    fn url(&self, scheme: &str) -> String {
        let p = &self.params;
        if p.password.is_empty() {
            format!("{}://{}:{}/{}", scheme, p.host, p.port, p.database_index)
        } else {
            format!(
                "{}://:{}@{}:{}/{}",
                scheme, p.password, p.host, p.port, p.database_index
            )
        }
    }

    async fn client(&self) -> AppResult<redis::Client> {
        match self.params.ssl.complete() {
            Some(tls) => {
                let certificates = TlsCertificates {
                    client_tls: Some(ClientTlsConfig {
                        client_cert: tokio::fs::read(tls.cert).await?,
                        client_key: tokio::fs::read(tls.key).await?,
                    }),
                    root_cert: Some(tokio::fs::read(tls.ca).await?),
                };
                Ok(redis::Client::build_with_tls(self.url("rediss"), certificates)?)
            }
            None => Ok(redis::Client::open(self.url("redis"))?),
        }
    }
}

impl FromConfig for RedisConnection {
    const REQUIRED_KEYS: &'static [&'static str] =
        &["name", "host", "port", "database_index", "password"];

    fn from_config(config: &ConfigMap) -> AppResult<Self> {
        Ok(Self {
            params: parse_params(config, Self::REQUIRED_KEYS)?,
            manager: None,
        })
    }
}

#[async_trait]
impl Connection for RedisConnection {
    fn name(&self) -> &str {
        &self.params.name
    }

    fn kind(&self) -> ConnectionKind {
        ConnectionKind::Redis
    }

    fn is_connected(&self) -> bool {
        self.manager.is_some()
    }

    fn describe(&self) -> ConnectionItem {
        ConnectionItem {
            name: self.params.name.clone(),
            kind: self.kind(),
            host: Some(self.params.host.clone()),
            port: Some(self.params.port),
            database: Some(self.params.database_index.to_string()),
            tls: self.params.ssl.complete().is_some(),
            connected: self.is_connected(),
        }
    }

    async fn connect(&mut self) -> AppResult<()> {
        self.disconnect().await?;
        let client = self.client().await?;
        let timeout = self.params.pool.connect_timeout();
        let manager = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| RedisError::from((ErrorKind::IoError, "connection timed out")))??;
        tracing::info!(
            name = %self.params.name,
            host = %self.params.host,
            db = self.params.database_index,
            "Connected"
        );
        self.manager = Some(manager);
        Ok(())
    }

    async fn disconnect(&mut self) -> AppResult<()> {
        if self.manager.take().is_some() {
            tracing::info!(name = %self.params.name, "Disconnected");
        }
        Ok(())
    }

    async fn check_health(&self) -> bool {
        let Some(manager) = &self.manager else {
            return false;
        };
        let mut conn = manager.clone();
        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(name = %self.params.name, error = %e, "Health check failed");
                false
            }
        }
    }

    /// `redis://:<password>@<host>:<port>/<database_index>`
    fn create_connection_string(&self) -> String {
        let p = &self.params;
        format!(
            "redis://:{}@{}:{}/{}",
            p.password, p.host, p.port, p.database_index
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
