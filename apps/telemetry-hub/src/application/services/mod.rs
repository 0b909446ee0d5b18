//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `IngestionService`: validates, stores, evaluates and publishes readings
//! - `HistoryQueryService`: snapshot reads for catch-up on (re)connect

mod history_query;
mod ingestion;

pub use history_query::HistoryQueryService;
pub use ingestion::{IngestStats, IngestionService};
