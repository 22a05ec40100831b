//! History backend selection.

use std::path::Path;

use brewline_core::repository::history::{HistoryRepository, InMemoryHistoryRepository};
use brewline_types::config::HistoryBackend;
use brewline_types::error::RepositoryError;
use brewline_types::history::HistoryRecord;

use crate::sqlite::history::SqliteHistoryRepository;
use crate::sqlite::pool::{DatabasePool, database_url};

/// The history repository a worker was configured with.
pub enum HistoryStore {
    Sqlite(SqliteHistoryRepository),
    Memory(InMemoryHistoryRepository),
}

impl HistoryStore {
    /// Open the configured backend. SQLite lives at `{data_dir}/brewline.db`.
    pub async fn open(backend: HistoryBackend, data_dir: &Path) -> Result<Self, RepositoryError> {
        match backend {
            HistoryBackend::Memory => {
                tracing::warn!("using in-memory history; orders will not survive a restart");
                Ok(Self::Memory(InMemoryHistoryRepository::new()))
            }
            HistoryBackend::Sqlite => {
                tokio::fs::create_dir_all(data_dir)
                    .await
                    .map_err(|e| RepositoryError::Connection(e.to_string()))?;
                let url = database_url(data_dir);
                let pool = DatabasePool::new(&url)
                    .await
                    .map_err(|e| RepositoryError::Connection(e.to_string()))?;
                tracing::info!(url = %url, "opened history database");
                Ok(Self::Sqlite(SqliteHistoryRepository::new(pool)))
            }
        }
    }

    pub fn backend(&self) -> HistoryBackend {
        match self {
            Self::Sqlite(_) => HistoryBackend::Sqlite,
            Self::Memory(_) => HistoryBackend::Memory,
        }
    }
}

impl HistoryRepository for HistoryStore {
    async fn append(&self, record: &HistoryRecord) -> Result<(), RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.append(record).await,
            Self::Memory(repo) => repo.append(record).await,
        }
    }

    async fn load(&self, instance_key: &str) -> Result<Vec<HistoryRecord>, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.load(instance_key).await,
            Self::Memory(repo) => repo.load(instance_key).await,
        }
    }

    async fn list_open(&self) -> Result<Vec<String>, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.list_open().await,
            Self::Memory(repo) => repo.list_open().await,
        }
    }

    async fn exists(&self, instance_key: &str) -> Result<bool, RepositoryError> {
        match self {
            Self::Sqlite(repo) => repo.exists(instance_key).await,
            Self::Memory(repo) => repo.exists(instance_key).await,
        }
    }
}
