//! 连接服务路由模块

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{
    get_connection, health_check, list_connections, list_records, list_tables,
    reconnect_connection, test_connection,
};
use crate::state::AppState;

/// 创建连接管理路由
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/connections", get(list_connections))
        .route("/api/connections/{name}", get(get_connection))
        .route("/api/connections/{name}/test", get(test_connection))
        .route("/api/connections/{name}/reconnect", post(reconnect_connection))
        .route("/api/connections/{name}/tables", get(list_tables))
        .route(
            "/api/connections/{name}/tables/{table}/records",
            get(list_records),
        )
        .route("/api/health", get(health_check))
}
