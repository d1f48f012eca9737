//! SKU persistence.
//!
//! [`InMemorySkuRepository`] is a thread-safe store that detects
//! duplicates under its write lock, so concurrent saves of the same id
//! produce exactly one success.

use super::sku_id::{Sku, SkuId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use tracing::{info, trace};

/// Persistence failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// The id is already stored
    #[error("sku already exists: {0}")]
    AlreadyExists(String),
    /// Any other storage failure
    #[error("{0}")]
    Backend(String),
}

/// Storage for SKUs
#[async_trait]
pub trait SkuRepository: Send + Sync {
    /// Look up a SKU by id
    async fn find(&self, id: &SkuId) -> Result<Option<Sku>, RepositoryError>;

    /// Store a new SKU; fails with `AlreadyExists` if the id is taken
    async fn save(&self, sku: Sku) -> Result<(), RepositoryError>;
}

/// In-memory SKU store
pub struct InMemorySkuRepository {
    data: RwLock<HashMap<SkuId, Sku>>,
    /// Maximum number of stored SKUs (0 = unbounded)
    max_skus: usize,
}

impl InMemorySkuRepository {
    pub fn new(max_skus: usize) -> Self {
        info!(max_skus, "Initializing in-memory sku repository");
        Self {
            data: RwLock::new(HashMap::new()),
            max_skus,
        }
    }

    pub fn len(&self) -> usize {
        self.data.read().map(|data| data.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySkuRepository {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl SkuRepository for InMemorySkuRepository {
    async fn find(&self, id: &SkuId) -> Result<Option<Sku>, RepositoryError> {
        let data = self
            .data
            .read()
            .map_err(|_| RepositoryError::Backend("repository lock poisoned".to_string()))?;
        Ok(data.get(id).cloned())
    }

    async fn save(&self, sku: Sku) -> Result<(), RepositoryError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| RepositoryError::Backend("repository lock poisoned".to_string()))?;

        if data.contains_key(sku.id()) {
            return Err(RepositoryError::AlreadyExists(sku.id().to_string()));
        }
        if self.max_skus > 0 && data.len() >= self.max_skus {
            return Err(RepositoryError::Backend("repository full".to_string()));
        }

        trace!(sku = %sku.id(), "Stored sku");
        data.insert(sku.id().clone(), sku);
        Ok(())
    }
}
