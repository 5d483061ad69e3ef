//! Shared data models.

pub mod connection;
pub mod query;
pub mod record;

// Re-export commonly used types
pub use connection::{
    ConfigMap, ConnectionItem, ConnectionKind, DocumentParams, EmbeddedParams, KeyValueParams,
    PoolSettings, RelationalParams, SslConfig, TlsPaths,
};
pub use query::{ColumnInfo, QueryResult};
pub use record::{DataFrame, Record};
