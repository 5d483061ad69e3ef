//! Type-tag → constructor registry.

use std::collections::HashMap;

use common::models::ConfigMap;
use common::{AppError, AppResult};

use crate::connection::{
    Connection, FromConfig, MongoDbConnection, MySqlConnection, PostgresConnection,
    RedisConnection, SqliteConnection,
};

/// Builds a connection from its configuration map.
pub type ConnectionCreator =
    Box<dyn Fn(&ConfigMap) -> AppResult<Box<dyn Connection>> + Send + Sync>;

/// Creates connections by type tag.
///
/// Built once at startup and passed by reference to whatever needs it.
#[derive(Default)]
pub struct ConnectionsFactory {
    creators: HashMap<String, ConnectionCreator>,
}

impl ConnectionsFactory {
    /// An empty factory with no registered types.
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory with every built-in backend registered under
    /// `mysql`, `postgres`, `postgresql`, `sqlite`, `mongodb` and `redis`.
    pub fn with_default_types() -> Self {
        let mut factory = Self::new();
        factory.register::<MySqlConnection>("mysql");
        factory.register::<PostgresConnection>("postgres");
        factory.register::<PostgresConnection>("postgresql");
        factory.register::<SqliteConnection>("sqlite");
        factory.register::<MongoDbConnection>("mongodb");
        factory.register::<RedisConnection>("redis");
        factory
    }

    /// Associates a tag with a constructor, replacing any earlier one.
    pub fn register_type<F>(&mut self, tag: impl Into<String>, creator: F)
    where
        F: Fn(&ConfigMap) -> AppResult<Box<dyn Connection>> + Send + Sync + 'static,
    {
        let tag = tag.into();
        tracing::debug!(tag = %tag, "Connection type registered");
        self.creators.insert(tag, Box::new(creator));
    }

    /// Registers a connection type through its [`FromConfig`] constructor.
    pub fn register<C>(&mut self, tag: impl Into<String>)
    where
        C: Connection + FromConfig + 'static,
    {
        self.register_type(tag, |config| {
            Ok(Box::new(C::from_config(config)?) as Box<dyn Connection>)
        });
    }

    /// Creates a connection of the given type.
    ///
    /// # Errors
    /// `AppError::UnknownConnectionType` when the tag was never registered,
    /// otherwise whatever the constructor reports.
    pub fn create(&self, tag: &str, config: &ConfigMap) -> AppResult<Box<dyn Connection>> {
        let creator = self
            .creators
            .get(tag)
            .ok_or_else(|| AppError::UnknownConnectionType(tag.to_string()))?;
        creator(config)
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.creators.contains_key(tag)
    }

    /// Registered tags, sorted.
    pub fn registered_types(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.creators.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}
