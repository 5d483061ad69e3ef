use common::{AppError, AppResult};

use crate::sql::{SqlEngine, SqlPool, TableDefinition};

/// Connection-side state shared by the relational backends: the live engine
/// (absent while disconnected) and the user-defined tables registered on it.
#[derive(Debug, Default)]
pub(crate) struct SqlState {
    engine: Option<SqlEngine>,
    models: Vec<TableDefinition>,
}

impl SqlState {
    pub(crate) fn engine(&self, name: &str) -> AppResult<&SqlEngine> {
        self.engine
            .as_ref()
            .ok_or_else(|| AppError::NotConnected(name.to_string()))
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.engine.is_some()
    }

    /// Reflects the schema of a freshly opened pool and makes it current.
    /// Any previous engine is closed first.
    pub(crate) async fn attach(&mut self, name: &str, pool: SqlPool) -> AppResult<()> {
        self.detach(name).await;
        let engine = SqlEngine::open(pool).await?;
        tracing::info!(
            name = %name,
            dialect = %engine.dialect(),
            tables = engine.schema().len(),
            "Connected"
        );
        self.engine = Some(engine);
        Ok(())
    }

    pub(crate) async fn detach(&mut self, name: &str) {
        if let Some(engine) = self.engine.take() {
            engine.close().await;
            tracing::info!(name = %name, "Disconnected");
        }
    }

    pub(crate) async fn check_health(&self, name: &str) -> bool {
        let Some(engine) = &self.engine else {
            return false;
        };
        match engine.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "Health check failed");
                false
            }
        }
    }

    pub(crate) fn register_model(&mut self, definition: TableDefinition) -> AppResult<()> {
        definition.validate()?;
        match self.models.iter_mut().find(|m| m.name == definition.name) {
            Some(existing) => *existing = definition,
            None => self.models.push(definition),
        }
        Ok(())
    }

    pub(crate) fn models(&self) -> &[TableDefinition] {
        &self.models
    }

    pub(crate) async fn create_all(&mut self, name: &str) -> AppResult<()> {
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| AppError::NotConnected(name.to_string()))?;
        for definition in &self.models {
            engine.create_table(definition).await?;
        }
        engine.refresh_schema().await
    }

    pub(crate) async fn refresh_schema(&mut self, name: &str) -> AppResult<()> {
        self.engine
            .as_mut()
            .ok_or_else(|| AppError::NotConnected(name.to_string()))?
            .refresh_schema()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{ColumnDefinition, ColumnType};

    #[test]
    fn test_register_model_replaces_by_name() {
        let mut state = SqlState::default();
        let first = TableDefinition::new("phones")
            .column(ColumnDefinition::new("id", ColumnType::Integer).primary_key());
        let second = first
            .clone()
            .column(ColumnDefinition::new("model", ColumnType::Text));
        state.register_model(first).unwrap();
        state.register_model(second).unwrap();
        assert_eq!(state.models().len(), 1);
        assert_eq!(state.models()[0].columns.len(), 2);
        assert!(state.register_model(TableDefinition::new("empty")).is_err());
    }

    #[tokio::test]
    async fn test_disconnected_state() {
        let mut state = SqlState::default();
        assert!(!state.is_connected());
        assert!(!state.check_health("x").await);
        assert!(matches!(state.engine("x"), Err(AppError::NotConnected(_))));
        assert!(matches!(
            state.create_all("x").await,
            Err(AppError::NotConnected(_))
        ));
        state.detach("x").await;
    }
}
