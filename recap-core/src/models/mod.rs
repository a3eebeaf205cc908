pub mod email;
pub mod summary;

pub use email::EmailSummary;
pub use summary::{NewSummary, Summary, SummaryFilter};
