// One refresh cycle: fetch every source concurrently, merge what came back,
// de-duplicate and publish into the hot and regular slots.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{error, info, warn};

use crate::{
    aggregator::{deduplicate, merge},
    cache::{CacheStore, HOT_CACHED_FLIGHTS, REGULAR_CACHED_FLIGHTS},
    error::SourceError,
    fetcher::SourceFetcher,
    flight::FlightSet,
    SharedFlights,
};

pub const DEFAULT_HOT_CACHE_TTL_SEC: u64 = 60;

// Outcome of one refresh cycle
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub sources_total: usize,
    pub sources_contributing: usize,
    // Malformed source endpoints; the only errors that leave the refresh cycle
    pub configuration_errors: Vec<SourceError>,
    pub merged_flights: usize,
    pub published_flights: usize,
    pub completed_at: DateTime<Utc>,
}

#[async_trait]
pub trait Refresher: Send + Sync + 'static {
    async fn refresh_cache(&self) -> RefreshReport;
}

// Non-positive values fall back to the default TTL
pub fn hot_cache_ttl(hot_cache_ttl_sec: i64) -> Duration {
    if hot_cache_ttl_sec > 0 {
        Duration::from_secs(hot_cache_ttl_sec as u64)
    } else {
        Duration::from_secs(DEFAULT_HOT_CACHE_TTL_SEC)
    }
}

pub struct RefreshOrchestrator {
    sources: Vec<String>,
    fetcher: SourceFetcher,
    store: Arc<dyn CacheStore<SharedFlights>>,
    hot_ttl: Duration,
}

impl RefreshOrchestrator {
    pub fn new(
        sources: Vec<String>,
        fetcher: SourceFetcher,
        store: Arc<dyn CacheStore<SharedFlights>>,
        hot_cache_ttl_sec: i64,
    ) -> Self {
        Self {
            sources,
            fetcher,
            store,
            hot_ttl: hot_cache_ttl(hot_cache_ttl_sec),
        }
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn hot_ttl(&self) -> Duration {
        self.hot_ttl
    }

    /// Fetches every source concurrently and waits for all of them.
    /// A failing source never cancels its siblings; malformed endpoints are
    /// logged and returned.
    pub async fn populate_flights_in_cache(&self) -> Vec<SourceError> {
        let results = join_all(self.sources.iter().map(|source| self.fetcher.fetch(source))).await;

        results
            .into_iter()
            .filter_map(Result::err)
            .inspect(|e| error!("Skipping misconfigured flight source: {}", e))
            .collect()
    }
}

#[async_trait]
impl Refresher for RefreshOrchestrator {
    async fn refresh_cache(&self) -> RefreshReport {
        info!("Refreshing flights cache from {} sources", self.sources.len());

        let configuration_errors = self.populate_flights_in_cache().await;

        let cached: Vec<SharedFlights> = self
            .sources
            .iter()
            .filter_map(|source| self.fetcher.cached(source))
            .collect();

        let merged = merge(cached.iter().map(|set| set.as_ref()));
        let merged_flights = merged.len();
        let unique = Arc::new(FlightSet::new(deduplicate(merged)));
        let published_flights = unique.len();

        if cached.is_empty() {
            warn!("No flight source responded, publishing an empty flight list");
        }

        let hot_ok = self
            .store
            .set(HOT_CACHED_FLIGHTS, unique.clone(), Some(self.hot_ttl));
        let regular_ok = self.store.set(REGULAR_CACHED_FLIGHTS, unique, None);
        if !hot_ok || !regular_ok {
            error!(
                "Failed to publish flights (hot: {}, regular: {})",
                hot_ok, regular_ok
            );
        }

        let report = RefreshReport {
            sources_total: self.sources.len(),
            sources_contributing: cached.len(),
            configuration_errors,
            merged_flights,
            published_flights,
            completed_at: Utc::now(),
        };

        info!(
            "Flights cache refreshed: {}/{} sources, {} flights merged, {} unique",
            report.sources_contributing,
            report.sources_total,
            report.merged_flights,
            report.published_flights
        );

        report
    }
}
