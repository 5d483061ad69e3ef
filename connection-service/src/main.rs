//! 数据库连接服务
//!
//! 从 YAML 配置文件加载连接，启动时建立连接，并提供：
//! - 连接列表与详情
//! - 健康检查与重新连接
//! - 反射表结构与记录读取

mod handlers;
mod registry;
mod routes;
mod service;
mod state;

use anyhow::Context;
use axum::{middleware, routing::get, Json, Router};
use common::config::AppConfig;
use common::middleware::request_id::request_id_middleware;
use data_access::ConnectionsFactory;
use registry::ConnectionRegistry;
use state::AppState;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

pub(crate) const SERVICE_NAME: &str = "connection-service";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "连接服务 API",
        version = "0.1.0",
        description = "基于配置文件的统一数据访问服务"
    ),
    paths(
        handlers::list_connections,
        handlers::get_connection,
        handlers::test_connection,
        handlers::reconnect_connection,
        handlers::list_tables,
        handlers::list_records,
        handlers::health_check,
    ),
    components(schemas(
        common::models::ConnectionItem,
        common::models::ConnectionKind,
        data_access::sql::TableSchema,
        data_access::sql::ColumnSchema,
        handlers::ConnectionTestResult,
        handlers::RecordsPage,
        handlers::HealthResponse,
    )),
    tags(
        (name = "connections", description = "连接管理端点"),
        (name = "schema", description = "表结构与记录端点"),
        (name = "health", description = "健康检查端点")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 优先加载 .env（不存在时忽略）
    dotenvy::dotenv().ok();

    // 初始化日志追踪
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME);

    // 解析连接配置文件
    let factory = ConnectionsFactory::with_default_types();
    let registry = ConnectionRegistry::from_file(&factory, &config.connections_file)
        .with_context(|| format!("加载连接配置失败: {}", config.connections_file))?;
    if config.connect_on_startup {
        registry.connect_all().await;
    }

    let state = AppState::new(config.clone(), registry);
    let app = create_router(state.clone());

    // 启动服务
    let addr = config.bind_address();
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务运行失败")?;

    // 关闭所有连接
    state.registry.disconnect_all().await;
    info!(service = SERVICE_NAME, "服务已停止");
    Ok(())
}

fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "无法监听关闭信号");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app() -> Router {
        let registry = registry::tests::registry().await;
        create_router(AppState::new(AppConfig::from_lookup(SERVICE_NAME, |_| None), registry))
    }

    async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_list_and_get_connections() {
        let (status, body) = call(app().await, Method::GET, "/api/connections").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["name"], "local");
        assert_eq!(body["data"][1]["kind"], "redis");
        assert!(body["data"][1].get("password").is_none());

        let (status, body) = call(app().await, Method::GET, "/api/connections/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "CONNECTION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_connection_health() {
        let (status, body) = call(app().await, Method::GET, "/api/connections/local/test").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["success"], true);

        let (_, body) = call(app().await, Method::GET, "/api/connections/cache/test").await;
        assert_eq!(body["data"]["success"], false);
        assert!(body["data"]["error"].is_string());
    }

    #[tokio::test]
    async fn test_tables_and_records() {
        let (status, body) = call(app().await, Method::GET, "/api/connections/local/tables").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["name"], "phones");

        let (status, body) = call(
            app().await,
            Method::GET,
            "/api/connections/local/tables/phones/records?filter=version%20%3E%2010",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["count"], 1);
        assert_eq!(body["data"]["records"][0]["model"], "Galaxy");

        let (status, body) = call(
            app().await,
            Method::GET,
            "/api/connections/local/tables/tablets/records",
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "UNKNOWN_TABLE");

        let (status, _) = call(app().await, Method::GET, "/api/connections/cache/tables").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reconnect() {
        let (status, body) =
            call(app().await, Method::POST, "/api/connections/local/reconnect").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["connected"], true);
    }

    #[tokio::test]
    async fn test_health_and_openapi() {
        let (status, body) = call(app().await, Method::GET, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connections"], 2);

        let (status, body) = call(app().await, Method::GET, "/api-docs/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]
            .get("/api/connections/{name}/tables/{table}/records")
            .is_some());
    }
}
