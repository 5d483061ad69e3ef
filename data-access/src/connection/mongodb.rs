use std::any::Any;
use std::path::PathBuf;

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, Tls, TlsOptions};
use mongodb::Client;

use common::models::connection::parse_params;
use common::models::{ConfigMap, ConnectionItem, ConnectionKind, DocumentParams};
use common::{AppError, AppResult};

use super::{Connection, FromConfig};

/// MongoDB connection.
#[derive(Debug)]
pub struct MongoDbConnection {
    params: DocumentParams,
    client: Option<Client>,
}

impl MongoDbConnection {
    pub fn params(&self) -> &DocumentParams {
        &self.params
    }

    /// Live client.
    ///
    /// # Errors
    /// `AppError::NotConnected` while disconnected.
    pub fn client(&self) -> AppResult<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::NotConnected(self.params.name.clone()))
    }

    fn base_uri(&self) -> String {
        let p = &self.params;
        format!("mongodb://{}:{}@{}:{}", p.username, p.password, p.host, p.port)
    }

    async fn client_options(&self) -> AppResult<ClientOptions> {
        let mut options = ClientOptions::parse(self.base_uri()).await?;
        options.app_name = Some(self.params.name.clone());
        options.connect_timeout = Some(self.params.pool.connect_timeout());
        options.server_selection_timeout = Some(self.params.pool.connect_timeout());
        options.max_pool_size = Some(self.params.pool.max_connections);
        if let Some(tls) = self.params.ssl.complete() {
            // The driver reads certificate and key from one PEM file.
            let mut tls_options = TlsOptions::default();
            tls_options.ca_file_path = Some(PathBuf::from(tls.ca));
            tls_options.cert_key_file_path = Some(PathBuf::from(tls.cert));
            options.tls = Some(Tls::Enabled(tls_options));
        }
        Ok(options)
    }
}

impl FromConfig for MongoDbConnection {
    const REQUIRED_KEYS: &'static [&'static str] = &["name", "host", "port", "username", "password"];

    fn from_config(config: &ConfigMap) -> AppResult<Self> {
        Ok(Self {
            params: parse_params(config, Self::REQUIRED_KEYS)?,
            client: None,
        })
    }
}

#[async_trait]
impl Connection for MongoDbConnection {
    fn name(&self) -> &str {
        &self.params.name
    }

    fn kind(&self) -> ConnectionKind {
        ConnectionKind::MongoDb
    }

    fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn describe(&self) -> ConnectionItem {
        ConnectionItem {
            name: self.params.name.clone(),
            kind: self.kind(),
            host: Some(self.params.host.clone()),
            port: Some(self.params.port),
            database: self.params.database.clone(),
            tls: self.params.ssl.complete().is_some(),
            connected: self.is_connected(),
        }
    }

    /// Builds the client. The driver connects lazily, so an unreachable
    /// server surfaces on the first operation or health check.
    async fn connect(&mut self) -> AppResult<()> {
        self.disconnect().await?;
        let client = Client::with_options(self.client_options().await?)?;
        tracing::info!(name = %self.params.name, host = %self.params.host, "Connected");
        self.client = Some(client);
        Ok(())
    }

    async fn disconnect(&mut self) -> AppResult<()> {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
            tracing::info!(name = %self.params.name, "Disconnected");
        }
        Ok(())
    }

    async fn check_health(&self) -> bool {
        let Some(client) = &self.client else {
            return false;
        };
        match client
            .database("admin")
            .run_command(doc! { "ismaster": 1 })
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(name = %self.params.name, error = %e, "Health check failed");
                false
            }
        }
    }

    fn create_connection_string(&self) -> String {
        match self.params.ssl.complete() {
            Some(tls) => format!(
                "{}/?ssl=true&ssl_certfile={}&ssl_keyfile={}&ssl_ca_certs={}",
                self.base_uri(),
                tls.cert,
                tls.key,
                tls.ca
            ),
            None => self.base_uri(),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
