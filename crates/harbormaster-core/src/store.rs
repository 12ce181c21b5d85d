//! State store trait.
//!
//! Durable key/value pairs keyed by logical name. One reserved key holds
//! the tracked commit SHA; the others hold per-package tracking records.
//! No transactions: the reconciliation loop is strictly sequential, so
//! there is exactly one writer.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a value, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, creating or overwriting the key.
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// All pairs whose key starts with `prefix`, in key order.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, String)>>;
}
