use std::any::Any;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlSslMode};

use common::models::connection::parse_params;
use common::models::{ConfigMap, ConnectionItem, ConnectionKind, RelationalParams};
use common::AppResult;

use super::relational::SqlState;
use super::{impl_sql_connection, Connection, FromConfig, SqlConnection};
use crate::sql::SqlPool;

/// MySQL connection.
#[derive(Debug)]
pub struct MySqlConnection {
    params: RelationalParams,
    state: SqlState,
}

impl MySqlConnection {
    pub fn params(&self) -> &RelationalParams {
        &self.params
    }

    /// Driver options. TLS is enabled (verifying the server against the CA)
    /// only when key, cert and CA are all configured.
    fn connect_options(&self) -> MySqlConnectOptions {
        let p = &self.params;
        let options = MySqlConnectOptions::new()
            .host(&p.host)
            .port(p.port)
            .username(&p.username)
            .password(&p.password)
            .database(&p.database);
        match p.ssl.complete() {
            Some(tls) => options
                .ssl_mode(MySqlSslMode::VerifyCa)
                .ssl_ca(tls.ca)
                .ssl_client_cert(tls.cert)
                .ssl_client_key(tls.key),
            None => options,
        }
    }
}

impl FromConfig for MySqlConnection {
    const REQUIRED_KEYS: &'static [&'static str] =
        &["name", "host", "port", "database", "username", "password"];

    fn from_config(config: &ConfigMap) -> AppResult<Self> {
        Ok(Self {
            params: parse_params(config, Self::REQUIRED_KEYS)?,
            state: SqlState::default(),
        })
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    fn name(&self) -> &str {
        &self.params.name
    }

    fn kind(&self) -> ConnectionKind {
        ConnectionKind::MySql
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn describe(&self) -> ConnectionItem {
        ConnectionItem {
            name: self.params.name.clone(),
            kind: self.kind(),
            host: Some(self.params.host.clone()),
            port: Some(self.params.port),
            database: Some(self.params.database.clone()),
            tls: self.params.ssl.complete().is_some(),
            connected: self.is_connected(),
        }
    }

    async fn connect(&mut self) -> AppResult<()> {
        let pool = MySqlPoolOptions::new()
            .max_connections(self.params.pool.max_connections)
            .acquire_timeout(self.params.pool.connect_timeout())
            .connect_with(self.connect_options())
            .await?;
        self.state.attach(&self.params.name, SqlPool::MySql(pool)).await
    }

    async fn disconnect(&mut self) -> AppResult<()> {
        self.state.detach(&self.params.name).await;
        Ok(())
    }

    async fn check_health(&self) -> bool {
        self.state.check_health(&self.params.name).await
    }

    /// `<driver>://<user>:<password>@<host>:<port>/<database>`
    fn create_connection_string(&self) -> String {
        let p = &self.params;
        format!(
            "{}://{}:{}@{}:{}/{}",
            p.driver, p.username, p.password, p.host, p.port, p.database
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_sql(&self) -> Option<&dyn SqlConnection> {
        Some(self)
    }

    fn as_sql_mut(&mut self) -> Option<&mut dyn SqlConnection> {
        Some(self)
    }
}

impl_sql_connection!(MySqlConnection);
