//! Connections loaded from the YAML file, shared across requests.
//!
//! Reads (listing, health checks, table reads) take the read lock; reconnect
//! takes the write lock since it needs `&mut` access to the connection.

use std::path::Path;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use common::errors::{AppError, AppResult};
use common::models::{ConnectionItem, ConnectionKind, Record};
use data_access::sql::TableSchema;
use data_access::{
    Connection, ConnectionsConfigurationParser, ConnectionsFactory, MongoDataSource,
    RecordSource, SqlDataSource,
};

/// Outcome of a health check.
#[derive(Debug, Clone, Copy)]
pub struct HealthCheck {
    pub healthy: bool,
    pub latency: Duration,
}

/// Named connections, in configuration file order.
pub struct ConnectionRegistry {
    connections: RwLock<Vec<Box<dyn Connection>>>,
}

impl ConnectionRegistry {
    pub fn new(connections: Vec<Box<dyn Connection>>) -> Self {
        Self {
            connections: RwLock::new(connections),
        }
    }

    /// Parses the connections file. Nothing is connected yet.
    pub fn from_file(factory: &ConnectionsFactory, path: impl AsRef<Path>) -> AppResult<Self> {
        let connections = ConnectionsConfigurationParser::new(factory).parse(path)?;
        Ok(Self::new(connections))
    }

    /// Connects every connection. Failures are logged and skipped so one
    /// unreachable backend does not keep the service down.
    /// Returns how many connections are live afterwards.
    pub async fn connect_all(&self) -> usize {
        let mut connections = self.connections.write().await;
        let mut live = 0;
        for conn in connections.iter_mut() {
            match conn.connect().await {
                Ok(()) => live += 1,
                Err(e) => {
                    tracing::warn!(name = %conn.name(), kind = %conn.kind(), error = %e, "Connection failed at startup");
                }
            }
        }
        tracing::info!(live, total = connections.len(), "Connections established");
        live
    }

    pub async fn disconnect_all(&self) {
        let mut connections = self.connections.write().await;
        for conn in connections.iter_mut() {
            if let Err(e) = conn.disconnect().await {
                tracing::warn!(name = %conn.name(), error = %e, "Disconnect failed");
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn list(&self) -> Vec<ConnectionItem> {
        self.connections
            .read()
            .await
            .iter()
            .map(|c| c.describe())
            .collect()
    }

    pub async fn get(&self, name: &str) -> AppResult<ConnectionItem> {
        let connections = self.connections.read().await;
        Ok(find(&connections, name)?.describe())
    }

    /// Runs the connection's health check and times it.
    pub async fn test(&self, name: &str) -> AppResult<HealthCheck> {
        let connections = self.connections.read().await;
        let conn = find(&connections, name)?;
        let start = Instant::now();
        let healthy = conn.check_health().await;
        Ok(HealthCheck {
            healthy,
            latency: start.elapsed(),
        })
    }

    /// Drops the live client and opens a new one. Relational connections
    /// re-reflect their schema as part of connecting.
    pub async fn reconnect(&self, name: &str) -> AppResult<ConnectionItem> {
        let mut connections = self.connections.write().await;
        let conn = connections
            .iter_mut()
            .find(|c| c.name() == name)
            .ok_or_else(|| AppError::ConnectionNotFound(name.to_string()))?;
        conn.disconnect().await?;
        conn.connect().await?;
        tracing::info!(name = %name, "Connection re-established");
        Ok(conn.describe())
    }

    /// Reflected tables of a relational connection.
    pub async fn tables(&self, name: &str) -> AppResult<Vec<TableSchema>> {
        let connections = self.connections.read().await;
        let conn = find(&connections, name)?;
        let sql = conn.as_sql().ok_or_else(|| {
            AppError::UnsupportedOperation(format!(
                "{} connection {} has no tables",
                conn.kind(),
                name
            ))
        })?;
        Ok(sql.engine()?.schema().tables().cloned().collect())
    }

    /// Every record of a table or collection, optionally filtered.
    pub async fn records(
        &self,
        name: &str,
        entity: &str,
        filter: Option<&str>,
    ) -> AppResult<Vec<Record>> {
        let connections = self.connections.read().await;
        let conn = find(&connections, name)?;
        match conn.kind() {
            ConnectionKind::MySql | ConnectionKind::Postgres | ConnectionKind::Sqlite => {
                SqlDataSource::new(conn)?.fetch_records(entity, filter).await
            }
            ConnectionKind::MongoDb => {
                MongoDataSource::new(conn)?.fetch_records(entity, filter).await
            }
            ConnectionKind::Redis => Err(AppError::UnsupportedOperation(format!(
                "redis connection {} has no records",
                name
            ))),
        }
    }
}

fn find<'a>(connections: &'a [Box<dyn Connection>], name: &str) -> AppResult<&'a dyn Connection> {
    connections
        .iter()
        .find(|c| c.name() == name)
        .map(|c| &**c)
        .ok_or_else(|| AppError::ConnectionNotFound(name.to_string()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const CONNECTIONS: &str = r#"
connections:
  - type: sqlite
    name: local
    database: ":memory:"
  - type: redis
    name: cache
    host: 127.0.0.1
    port: 1
    database_index: 0
    password: ""
    connect_timeout_secs: 1
"#;

    /// `local` is connected and holds a `phones` table; `cache` is not.
    pub(crate) async fn registry() -> ConnectionRegistry {
        let factory = ConnectionsFactory::with_default_types();
        let connections = ConnectionsConfigurationParser::new(&factory)
            .parse_str(CONNECTIONS)
            .unwrap();
        let registry = ConnectionRegistry::new(connections);
        {
            let mut connections = registry.connections.write().await;
            let local = &mut connections[0];
            local.connect().await.unwrap();
            let ds = SqlDataSource::new(&**local).unwrap();
            for sql in [
                "CREATE TABLE phones (id INTEGER PRIMARY KEY, model TEXT, version INTEGER)",
                "INSERT INTO phones (id, model, version) VALUES (1, 'Pixel', 7), (2, 'Galaxy', 23)",
            ] {
                ds.query(sql, &[]).await.unwrap();
            }
            local.as_sql_mut().unwrap().refresh_schema().await.unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_list_and_get() {
        let registry = registry().await;
        let names: Vec<String> = registry.list().await.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["local", "cache"]);
        assert!(registry.get("local").await.unwrap().connected);
        assert!(!registry.get("cache").await.unwrap().connected);
        assert!(matches!(
            registry.get("nope").await,
            Err(AppError::ConnectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_health_check() {
        let registry = registry().await;
        assert!(registry.test("local").await.unwrap().healthy);
        assert!(!registry.test("cache").await.unwrap().healthy);
    }

    #[tokio::test]
    async fn test_connect_all_skips_failures() {
        let registry = registry().await;
        assert_eq!(registry.connect_all().await, 1);
        registry.disconnect_all().await;
        assert!(registry.list().await.iter().all(|c| !c.connected));
    }

    #[tokio::test]
    async fn test_tables_and_records() {
        let registry = registry().await;
        let tables = registry.tables("local").await.unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "phones");

        let rows = registry
            .records("local", "phones", Some("version > 10"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["model"], "Galaxy");

        assert!(matches!(
            registry.tables("cache").await,
            Err(AppError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            registry.records("cache", "x", None).await,
            Err(AppError::UnsupportedOperation(_))
        ));
    }

    #[tokio::test]
    async fn test_reconnect_in_memory_starts_empty() {
        let registry = registry().await;
        let item = registry.reconnect("local").await.unwrap();
        assert!(item.connected);
        assert!(registry.tables("local").await.unwrap().is_empty());
        assert!(registry.reconnect("cache").await.is_err());
    }
}
