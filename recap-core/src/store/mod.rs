//! Persistence gateway for summary records.
//!
//! `SummaryStore` is the seam the HTTP layer talks to. `PgSummaryStore` is the
//! production backend; `MemorySummaryStore` keeps records in process and backs
//! the tests and the server's `--in-memory` mode.

mod memory;
mod postgres;

pub use memory::MemorySummaryStore;
pub use postgres::PgSummaryStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RecapError;
use crate::models::{NewSummary, Summary, SummaryFilter};

#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Persist a validated summary and return the stored record.
    async fn create(&self, new: NewSummary) -> Result<Summary, RecapError>;

    /// Records matching `filter`, newest first.
    async fn list(&self, filter: &SummaryFilter) -> Result<Vec<Summary>, RecapError>;

    async fn get(&self, id: Uuid) -> Result<Option<Summary>, RecapError>;

    /// Remove a record, returning it if it existed.
    async fn delete(&self, id: Uuid) -> Result<Option<Summary>, RecapError>;

    /// Short description of the backend, e.g. the server version.
    async fn health(&self) -> Result<String, RecapError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
