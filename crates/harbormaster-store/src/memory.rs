//! In-memory state store for tests and dry runs.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use harbormaster_core::store::StateStore;
use harbormaster_core::{Error, Result};

/// BTreeMap-backed store; `list` comes out in key order for free.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with initial pairs.
    pub fn with_entries(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            entries: Mutex::new(pairs.into_iter().collect()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Store("state store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        Ok(self
            .lock()?
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
