use crate::memory::InMemoryTapStore;
#[cfg(feature = "sqlite")]
use crate::sqlite::SqliteTapStore;
use crate::traits::TapStore;
use crate::StorageResult;
use std::sync::Arc;
use tracing::info;

/// Mirror backend configuration.
#[derive(Debug, Clone, Default)]
pub enum StoreConfig {
    /// Keep agents and intents in process memory only.
    #[default]
    Memory,
    /// Persist to SQLite at `database_url` (`sqlite://path` or `sqlite::memory:`).
    #[cfg(feature = "sqlite")]
    Sqlite {
        database_url: String,
        max_connections: u32,
    },
}

impl StoreConfig {
    pub fn memory() -> Self {
        Self::Memory
    }

    #[cfg(feature = "sqlite")]
    pub fn sqlite(database_url: impl Into<String>) -> Self {
        Self::Sqlite {
            database_url: database_url.into(),
            max_connections: 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            #[cfg(feature = "sqlite")]
            Self::Sqlite { .. } => "sqlite",
        }
    }
}

#[derive(Clone)]
enum Backend {
    Memory(Arc<InMemoryTapStore>),
    #[cfg(feature = "sqlite")]
    Sqlite(Arc<SqliteTapStore>),
}

/// An opened store with an explicit close.
///
/// Created once at process start and passed by reference to the components
/// that mirror ledger state.
#[derive(Clone)]
pub struct StoreHandle {
    backend: Backend,
}

impl StoreHandle {
    pub async fn open(config: StoreConfig) -> StorageResult<Self> {
        let backend = match config {
            StoreConfig::Memory => Backend::Memory(Arc::new(InMemoryTapStore::new())),
            #[cfg(feature = "sqlite")]
            StoreConfig::Sqlite {
                database_url,
                max_connections,
            } => Backend::Sqlite(Arc::new(
                SqliteTapStore::connect_with_options(&database_url, max_connections).await?,
            )),
        };
        let handle = Self { backend };
        info!(backend = handle.backend_label(), "store opened");
        Ok(handle)
    }

    pub fn backend_label(&self) -> &'static str {
        match self.backend {
            Backend::Memory(_) => "memory",
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(_) => "sqlite",
        }
    }

    /// Shared trait-object view for the intent manager and friends.
    pub fn store(&self) -> Arc<dyn TapStore> {
        match &self.backend {
            Backend::Memory(store) => store.clone(),
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(store) => store.clone(),
        }
    }

    pub async fn close(&self) {
        match &self.backend {
            Backend::Memory(_) => {}
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(store) => store.close().await,
        }
        info!(backend = self.backend_label(), "store closed");
    }
}
