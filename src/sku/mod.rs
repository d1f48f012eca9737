//! SKU domain: identifier validation, persistence and the create command.
//!
//! The ingest server only sees the [`CommandHandler`] seam; everything
//! behind it can be swapped without touching the dispatch loop.

mod handler;
mod repository;
mod sku_id;

pub use handler::{CommandHandler, CreateSku, CreateSkuError, CreateSkuHandler};
pub use repository::InMemorySkuRepository;
#[cfg(test)]
pub use sku_id::InvalidSku;
