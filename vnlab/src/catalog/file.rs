//! Catalog persisted as a single JSON document

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::catalog::tables::{CatalogTables, TableStore};
use crate::errors::LabError;
use crate::filesys::file::File;

/// Catalog stored in `catalog.json`.
///
/// Each write loads the document, applies the change and replaces the file
/// atomically. Calls are serialized within the process.
#[derive(Debug)]
pub struct FileCatalog {
    file: File,
    lock: Mutex<()>,
}

impl FileCatalog {
    pub fn new(file: File) -> Self {
        Self {
            file,
            lock: Mutex::new(()),
        }
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    /// Missing file reads as an empty catalog
    async fn load(&self) -> Result<CatalogTables, LabError> {
        if !self.file.exists().await {
            return Ok(CatalogTables::new());
        }
        let tables: CatalogTables = self.file.read_json().await.map_err(|e| {
            LabError::Persistence(format!(
                "failed to read catalog {}: {}",
                self.file.path().display(),
                e
            ))
        })?;
        tables.check_version()?;
        Ok(tables)
    }

    async fn save(&self, tables: &CatalogTables) -> Result<(), LabError> {
        self.file.write_json_atomic(tables).await.map_err(|e| {
            LabError::Persistence(format!(
                "failed to write catalog {}: {}",
                self.file.path().display(),
                e
            ))
        })
    }
}

#[async_trait]
impl TableStore for FileCatalog {
    async fn prepare(&self) -> Result<(), LabError> {
        let _guard = self.lock.lock().await;
        if self.file.exists().await {
            self.load().await?;
            return Ok(());
        }
        self.save(&CatalogTables::new()).await?;
        info!("Created catalog {}", self.file.path().display());
        Ok(())
    }

    async fn read<R, F>(&self, f: F) -> Result<R, LabError>
    where
        R: Send,
        F: FnOnce(&CatalogTables) -> R + Send,
    {
        let _guard = self.lock.lock().await;
        let tables = self.load().await?;
        Ok(f(&tables))
    }

    async fn write<R, F>(&self, f: F) -> Result<R, LabError>
    where
        R: Send,
        F: FnOnce(&mut CatalogTables) -> Result<R, LabError> + Send,
    {
        let _guard = self.lock.lock().await;
        let mut tables = self.load().await?;
        let result = f(&mut tables)?;
        self.save(&tables).await?;
        Ok(result)
    }
}
