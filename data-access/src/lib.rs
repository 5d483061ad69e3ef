//! Uniform data access over MySQL, PostgreSQL, SQLite, MongoDB and Redis.
//!
//! Layers, each only calling the one below:
//!
//! - `parser`: YAML connections file → configuration maps
//! - `factory`: type tag + configuration map → [`Connection`]
//! - `connection`: lifecycle of one backend client (connect, health, reflect)
//! - `datasource`: CRUD, query and join operations over a borrowed connection
//! - `repository`: reads spanning two data sources
//!
//! `sql` holds the relational plumbing shared by the SQL connections:
//! pools, dialects, statement building and schema reflection.

pub mod connection;
pub mod datasource;
pub mod factory;
pub mod parser;
pub mod repository;
pub mod sql;

pub use connection::{
    Connection, FromConfig, MongoDbConnection, MySqlConnection, PostgresConnection,
    RedisConnection, SqlConnection, SqliteConnection,
};
pub use datasource::{
    DataSource, JoinedRecord, MongoDataSource, RecordSource, RedisDataSource, SqlDataSource,
};
pub use factory::{ConnectionCreator, ConnectionsFactory};
pub use parser::ConnectionsConfigurationParser;
pub use repository::MultiSourceRepository;
