// Query side of the flights cache plus startup wiring of the refresh job

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    cache::{CacheStore, HOT_CACHED_FLIGHTS, REGULAR_CACHED_FLIGHTS},
    error::SchedulerError,
    flight::FlightSet,
    orchestrator::Refresher,
    scheduler::Scheduler,
    SharedFlights,
};

// Name of the recurring job keeping the cache warm
pub const REFRESH_CACHE_JOB: &str = "refreshCache";
// Every 5 minutes
pub const DEFAULT_FETCH_CRON_PATTERN: &str = "0 */5 * * * *";

pub struct FlightsService {
    store: Arc<dyn CacheStore<SharedFlights>>,
    refresher: Arc<dyn Refresher>,
    scheduler: Arc<Scheduler>,
}

impl FlightsService {
    pub fn new(
        store: Arc<dyn CacheStore<SharedFlights>>,
        refresher: Arc<dyn Refresher>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            store,
            refresher,
            scheduler,
        }
    }

    /// Kicks off a first refresh without waiting for it, then (re)registers the
    /// recurring refresh job. Calling this again replaces the job.
    /// A missing or blank pattern falls back to every 5 minutes.
    pub fn init(&self, fetch_cron_pattern: Option<&str>) -> Result<(), SchedulerError> {
        let pattern = fetch_cron_pattern
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_FETCH_CRON_PATTERN);

        self.spawn_refresh();

        let refresher = self.refresher.clone();
        self.scheduler.replace(REFRESH_CACHE_JOB, pattern, move || {
            let refresher = refresher.clone();
            async move {
                refresher.refresh_cache().await;
            }
        })
    }

    /// Flights from the hot slot when it is warm. Otherwise a background
    /// refresh is started and the regular slot answers right away; that is
    /// `None` only before the first refresh has ever completed.
    pub async fn find_all(&self) -> Option<SharedFlights> {
        if let Some(flights) = self.store.get(HOT_CACHED_FLIGHTS) {
            debug!("Flights found in hot cache");
            return Some(flights);
        }

        info!("Hot cache expired, refreshing flights in the background");
        self.spawn_refresh();

        let flights = self.store.get(REGULAR_CACHED_FLIGHTS);
        match &flights {
            Some(_) => debug!("Flights found in regular cache"),
            None => warn!("Flights not available yet, regular cache is empty"),
        }
        flights
    }

    // For callers that render "not available yet" as an empty list
    pub async fn find_all_or_empty(&self) -> SharedFlights {
        match self.find_all().await {
            Some(flights) => flights,
            None => Arc::new(FlightSet::empty()),
        }
    }

    // Fire and forget; a panic stays inside the spawned task
    fn spawn_refresh(&self) -> JoinHandle<()> {
        let refresher = self.refresher.clone();
        tokio::spawn(async move {
            refresher.refresh_cache().await;
        })
    }
}
