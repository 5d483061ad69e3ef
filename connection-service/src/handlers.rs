//! Handler模块

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use common::errors::AppError;
use common::models::{ConnectionItem, Record};
use common::response::ApiResponse;
use data_access::sql::TableSchema;

use crate::service::{ConnectionService, ConnectionServiceTrait};
use crate::state::AppState;
use crate::SERVICE_NAME;

/// 列出配置文件中的所有连接（不含密码）
#[utoipa::path(
    get,
    path = "/api/connections",
    tag = "connections",
    responses(
        (status = 200, description = "连接列表", body = ApiResponse<Vec<ConnectionItem>>)
    )
)]
pub async fn list_connections(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ConnectionItem>>>, AppError> {
    let service = ConnectionService::new(state.registry);
    let data = service.list().await;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME)))
}

/// 根据名称获取连接
#[utoipa::path(
    get,
    path = "/api/connections/{name}",
    tag = "connections",
    params(
        ("name" = String, Path, description = "连接名称")
    ),
    responses(
        (status = 200, description = "连接详情", body = ApiResponse<ConnectionItem>),
        (status = 404, description = "连接未找到")
    )
)]
pub async fn get_connection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<ConnectionItem>>, AppError> {
    let service = ConnectionService::new(state.registry);
    let data = service.get(&name).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME)))
}

/// 测试数据库连接
#[utoipa::path(
    get,
    path = "/api/connections/{name}/test",
    tag = "connections",
    params(
        ("name" = String, Path, description = "连接名称")
    ),
    responses(
        (status = 200, description = "连接测试结果", body = ApiResponse<ConnectionTestResult>),
        (status = 404, description = "连接未找到")
    )
)]
pub async fn test_connection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<ConnectionTestResult>>, AppError> {
    let service = ConnectionService::new(state.registry);
    let check = service.test(&name).await?;
    let latency_ms = check.latency.as_millis() as u64;
    Ok(Json(ApiResponse::ok_with_service(
        ConnectionTestResult {
            name,
            success: check.healthy,
            latency_ms,
            error: (!check.healthy).then(|| "health check failed".to_string()),
        },
        SERVICE_NAME,
    )))
}

/// 断开并重新建立连接
#[utoipa::path(
    post,
    path = "/api/connections/{name}/reconnect",
    tag = "connections",
    params(
        ("name" = String, Path, description = "连接名称")
    ),
    responses(
        (status = 200, description = "重新连接成功", body = ApiResponse<ConnectionItem>),
        (status = 404, description = "连接未找到")
    )
)]
pub async fn reconnect_connection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<ConnectionItem>>, AppError> {
    let service = ConnectionService::new(state.registry);
    let data = service.reconnect(&name).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME)))
}

/// 列出关系型连接反射得到的表结构
#[utoipa::path(
    get,
    path = "/api/connections/{name}/tables",
    tag = "schema",
    params(
        ("name" = String, Path, description = "连接名称")
    ),
    responses(
        (status = 200, description = "表结构列表", body = ApiResponse<Vec<TableSchema>>),
        (status = 404, description = "连接未找到"),
        (status = 400, description = "非关系型连接")
    )
)]
pub async fn list_tables(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<Vec<TableSchema>>>, AppError> {
    let service = ConnectionService::new(state.registry);
    let data = service.tables(&name).await?;
    Ok(Json(ApiResponse::ok_with_service(data, SERVICE_NAME)))
}

/// 读取表或集合中的记录
#[utoipa::path(
    get,
    path = "/api/connections/{name}/tables/{table}/records",
    tag = "schema",
    params(
        ("name" = String, Path, description = "连接名称"),
        ("table" = String, Path, description = "表名或集合名"),
        RecordsQuery
    ),
    responses(
        (status = 200, description = "记录列表", body = ApiResponse<RecordsPage>),
        (status = 404, description = "连接或表未找到"),
        (status = 400, description = "过滤条件不安全或连接不支持")
    )
)]
pub async fn list_records(
    State(state): State<AppState>,
    Path((name, table)): Path<(String, String)>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<ApiResponse<RecordsPage>>, AppError> {
    let service = ConnectionService::new(state.registry);
    let records = service
        .records(&name, &table, query.filter.as_deref())
        .await?;
    Ok(Json(ApiResponse::ok_with_service(
        RecordsPage {
            table,
            count: records.len(),
            records,
        },
        SERVICE_NAME,
    )))
}

/// 健康检查端点
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        connections: state.registry.len().await,
    })
}

/// 记录查询参数
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecordsQuery {
    /// SQL 布尔表达式，或 MongoDB 的 JSON 过滤文档
    pub filter: Option<String>,
}

/// 连接测试结果
#[derive(Serialize, ToSchema)]
pub struct ConnectionTestResult {
    /// 连接名称
    pub name: String,
    /// 测试是否成功
    pub success: bool,
    /// 健康检查耗时（毫秒）
    pub latency_ms: u64,
    /// 错误信息（如果测试失败）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 记录列表
#[derive(Serialize, ToSchema)]
pub struct RecordsPage {
    /// 表名或集合名
    pub table: String,
    /// 记录数
    pub count: usize,
    #[schema(value_type = Vec<Object>)]
    pub records: Vec<Record>,
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// 服务状态
    pub status: String,
    /// 服务名称
    pub service: String,
    /// 服务版本
    pub version: String,
    /// 当前时间戳
    pub timestamp: DateTime<Utc>,
    /// 已配置的连接数
    pub connections: usize,
}
