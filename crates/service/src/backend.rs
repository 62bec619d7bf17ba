use async_trait::async_trait;

use crate::errors::StoreError;

/// Storage contract consumed by the HTTP layer.
/// Implementations persist opaque state documents and arbitrate the advisory
/// lock for each state id.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Full content of the state document; `StoreError::NotFound` when it was never written.
    async fn get(&self, id: &str) -> Result<Vec<u8>, StoreError>;
    /// Create or replace the state document.
    async fn update(&self, id: &str, state: &[u8]) -> Result<(), StoreError>;
    /// Delete the state document; deleting a missing document succeeds.
    async fn purge(&self, id: &str) -> Result<(), StoreError>;
    /// Acquire or refresh the lock; returns the stored lock record.
    async fn lock(&self, id: &str, lock_info: &[u8]) -> Result<Vec<u8>, StoreError>;
    /// Release the lock held by the holder named in `lock_info`.
    async fn unlock(&self, id: &str, lock_info: &[u8]) -> Result<(), StoreError>;
}
