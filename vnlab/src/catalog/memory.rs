//! In-memory catalog

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::catalog::tables::{CatalogTables, TableStore};
use crate::errors::LabError;

/// Catalog held entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tables: RwLock<CatalogTables>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TableStore for MemoryCatalog {
    async fn prepare(&self) -> Result<(), LabError> {
        self.tables.read().await.check_version()
    }

    async fn read<R, F>(&self, f: F) -> Result<R, LabError>
    where
        R: Send,
        F: FnOnce(&CatalogTables) -> R + Send,
    {
        let tables = self.tables.read().await;
        Ok(f(&tables))
    }

    async fn write<R, F>(&self, f: F) -> Result<R, LabError>
    where
        R: Send,
        F: FnOnce(&mut CatalogTables) -> Result<R, LabError> + Send,
    {
        let mut tables = self.tables.write().await;
        f(&mut tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::models::records::{BuildIntent, NewDeployment};

    #[tokio::test]
    async fn test_intents_put_and_clear() {
        let catalog = MemoryCatalog::new();
        catalog.migrate().await.unwrap();

        let intent = BuildIntent {
            id: uuid::Uuid::new_v4(),
            deployment: "lab1".into(),
            networks: vec!["net1".into()],
            hosts: vec![],
            created_at: chrono::Utc::now(),
        };
        catalog.put_intent(intent.clone()).await.unwrap();
        assert_eq!(catalog.list_intents().await.unwrap(), vec![intent.clone()]);

        assert!(catalog.clear_intent(intent.id).await.unwrap());
        assert!(!catalog.clear_intent(intent.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_deployment_roundtrip() {
        let catalog = MemoryCatalog::new();
        let created = catalog
            .create_deployment(NewDeployment {
                name: "empty".into(),
                hosts: vec![],
                networks: vec![],
            })
            .await
            .unwrap();

        let found = catalog.find_deployment_by_name("empty").await.unwrap();
        assert_eq!(found, Some(created.record.clone()));
        assert_eq!(
            catalog.find_deployment_by_id(created.record.id).await.unwrap(),
            Some(created.record)
        );
    }
}
