// Flight aggregation service core
// Fetches flights from several sources, de-duplicates them and keeps a two-tier cache warm

use std::sync::Arc;

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod flight;
pub mod logging;
pub mod orchestrator;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod source;

// What every cache slot and source entry holds
pub type SharedFlights = Arc<flight::FlightSet>;

// Re-export key types for convenience
pub use aggregator::{deduplicate, merge};
pub use cache::{CacheConfig, CacheStats, CacheStore, TtlCache};
pub use config::AppConfig;
pub use error::{ConfigError, SchedulerError, SourceError};
pub use fetcher::{FlightsTransport, HttpTransport, SourceFetcher};
pub use flight::{Flight, FlightNumber, FlightSet, Slice};
pub use orchestrator::{RefreshOrchestrator, RefreshReport, Refresher};
pub use retry::RetryConfig;
pub use scheduler::{CronSchedule, Scheduler};
pub use service::FlightsService;
pub use source::Source;
