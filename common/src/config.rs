//! Service configuration.
//!
//! Values come from environment variables (a `.env` file is loaded by the
//! binary before this runs). Connection definitions themselves live in the
//! YAML file named by `CONNECTIONS_FILE`.

use serde::{Deserialize, Serialize};

/// Default bind address.
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default bind port.
pub const DEFAULT_PORT: u16 = 8081;
/// Default connections file, relative to the working directory.
pub const DEFAULT_CONNECTIONS_FILE: &str = "connections.yaml";

/// Application configuration shared by services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Service name used in logs and response metadata.
    pub service_name: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Path of the YAML file listing connections.
    pub connections_file: String,
    /// Connect every configured connection at startup.
    pub connect_on_startup: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connections_file: DEFAULT_CONNECTIONS_FILE.to_string(),
            connect_on_startup: true,
        }
    }
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn load_with_service(service_name: &str) -> Self {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// Unparseable values fall back to defaults.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            service_name: service_name.to_string(),
            host: lookup("SERVER_HOST").unwrap_or(defaults.host),
            port: lookup("SERVER_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            connections_file: lookup("CONNECTIONS_FILE").unwrap_or(defaults.connections_file),
            connect_on_startup: lookup("CONNECT_ON_STARTUP")
                .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(defaults.connect_on_startup),
        }
    }

    /// `host:port` bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
