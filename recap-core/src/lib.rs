pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod normalize;
pub mod store;
pub mod upstream;

pub use auth::authenticate;
pub use config::{FailurePolicy, RecapConfig};
pub use error::RecapError;
pub use models::{EmailSummary, NewSummary, Summary, SummaryFilter};
pub use normalize::{classify, normalize_body, normalize_value, PayloadShape};
pub use store::{MemorySummaryStore, PgSummaryStore, SummaryStore};
pub use upstream::{create_source, EmailSource, FallbackEmailSource, UpstreamError, WebhookEmailSource};
