//! 连接服务模块

use std::sync::Arc;

use async_trait::async_trait;

use common::errors::AppResult;
use common::models::{ConnectionItem, Record};
use data_access::sql::TableSchema;

use crate::registry::{ConnectionRegistry, HealthCheck};

/// 连接服务 Trait
#[async_trait]
pub trait ConnectionServiceTrait: Send + Sync {
    /// 列出所有连接
    async fn list(&self) -> Vec<ConnectionItem>;

    /// 根据名称获取连接
    async fn get(&self, name: &str) -> AppResult<ConnectionItem>;

    /// 健康检查并计时
    async fn test(&self, name: &str) -> AppResult<HealthCheck>;

    /// 断开并重新连接
    async fn reconnect(&self, name: &str) -> AppResult<ConnectionItem>;

    /// 反射得到的表结构
    async fn tables(&self, name: &str) -> AppResult<Vec<TableSchema>>;

    /// 读取表（或集合）中的全部记录
    async fn records(&self, name: &str, table: &str, filter: Option<&str>)
        -> AppResult<Vec<Record>>;
}

/// 基于配置文件的连接服务
pub struct ConnectionService {
    registry: Arc<ConnectionRegistry>,
}

impl ConnectionService {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl ConnectionServiceTrait for ConnectionService {
    async fn list(&self) -> Vec<ConnectionItem> {
        self.registry.list().await
    }

    async fn get(&self, name: &str) -> AppResult<ConnectionItem> {
        self.registry.get(name).await
    }

    async fn test(&self, name: &str) -> AppResult<HealthCheck> {
        let check = self.registry.test(name).await?;
        tracing::debug!(name = %name, healthy = check.healthy, latency_ms = check.latency.as_millis() as u64, "连接测试完成");
        Ok(check)
    }

    async fn reconnect(&self, name: &str) -> AppResult<ConnectionItem> {
        self.registry.reconnect(name).await
    }

    async fn tables(&self, name: &str) -> AppResult<Vec<TableSchema>> {
        self.registry.tables(name).await
    }

    async fn records(
        &self,
        name: &str,
        table: &str,
        filter: Option<&str>,
    ) -> AppResult<Vec<Record>> {
        let records = self.registry.records(name, table, filter).await?;
        tracing::info!(name = %name, table = %table, rows = records.len(), "记录已读取");
        Ok(records)
    }
}
