//! The create-SKU command: validate, then persist.

use super::repository::{RepositoryError, SkuRepository};
use super::sku_id::{InvalidSku, Sku, SkuId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Request to store one SKU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSku {
    pub sku: String,
}

impl CreateSku {
    pub fn new(sku: impl Into<String>) -> Self {
        Self { sku: sku.into() }
    }
}

/// Why a SKU was not created
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateSkuError {
    #[error(transparent)]
    InvalidSku(#[from] InvalidSku),

    #[error("sku already exists: {0}")]
    AlreadyExists(String),

    #[error("error creating sku {sku}: {reason}")]
    Creating { sku: String, reason: String },
}

/// Domain handler invoked once per ingested message
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: CreateSku) -> Result<(), CreateSkuError>;
}

/// Validates and stores SKUs in a [`SkuRepository`]
pub struct CreateSkuHandler {
    repository: Arc<dyn SkuRepository>,
}

impl CreateSkuHandler {
    pub fn new(repository: Arc<dyn SkuRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl CommandHandler for CreateSkuHandler {
    async fn handle(&self, command: CreateSku) -> Result<(), CreateSkuError> {
        let id = SkuId::new(&command.sku)?;

        match self.repository.save(Sku::new(id.clone())).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::AlreadyExists(_)) => {
                Err(CreateSkuError::AlreadyExists(id.to_string()))
            }
            Err(RepositoryError::Backend(reason)) => Err(CreateSkuError::Creating {
                sku: id.to_string(),
                reason,
            }),
        }
    }
}
