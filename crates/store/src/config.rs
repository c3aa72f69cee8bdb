//! Store configuration.

use habit_core::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::memory::MemoryStore;
use crate::sqlite::SqliteStore;
use crate::store::SessionStore;

/// Which store implementation to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Volatile, process-local
    Memory,
    /// SQLite file at `StoreConfig::path`
    #[default]
    Sqlite,
}

/// Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Database file (SQLite backend only)
    #[serde(default = "default_path")]
    pub path: PathBuf,
}

fn default_path() -> PathBuf {
    PathBuf::from("data/sessions.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_path(),
        }
    }
}

impl StoreConfig {
    /// Opens the configured store.
    pub fn open(&self) -> Result<Arc<dyn SessionStore>> {
        Ok(match self.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Sqlite => Arc::new(SqliteStore::open(self.path.clone())?),
        })
    }
}
