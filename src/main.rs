use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};

use flight_aggregator::{
    logging, AppConfig, CacheStore, FlightsService, HttpTransport, RefreshOrchestrator, Scheduler,
    SharedFlights, SourceFetcher, TtlCache,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("Failed to load configuration")?;

    logging::init_logging(&config.log_level);

    tracing::info!("Flight aggregator starting...");
    tracing::info!(
        "{} sources, hot cache TTL {}s, refresh pattern {:?}",
        config.sources.len(),
        config.hot_cache_ttl_sec,
        config.fetch_cron_pattern
    );

    let store: Arc<dyn CacheStore<SharedFlights>> = Arc::new(TtlCache::new(config.cache.clone()));
    let transport = Arc::new(
        HttpTransport::new(config.request_timeout_ms).context("Failed to build HTTP client")?,
    );
    let fetcher = SourceFetcher::new(transport, store.clone(), config.retry.clone());
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        config.sources.clone(),
        fetcher,
        store.clone(),
        config.hot_cache_ttl_sec,
    ));
    let scheduler = Arc::new(Scheduler::new());
    let service = FlightsService::new(store, orchestrator, scheduler.clone());

    service
        .init(Some(config.fetch_cron_pattern.as_str()))
        .context("Failed to schedule the cache refresh")?;

    // report what is served once the startup refresh had time to finish
    let wait = Duration::from_millis(config.request_timeout_ms)
        .saturating_mul(config.retry.total_attempts())
        .saturating_add(
            Duration::from_millis(config.retry.retry_delay_ms)
                .saturating_mul(config.retry.max_retries),
        );
    let report_startup = async {
        tokio::time::sleep(wait).await;
        let flights = service.find_all_or_empty().await;
        tracing::info!("Serving {} flights", flights.len());
        std::future::pending::<()>().await
    };

    tokio::select! {
        _ = report_startup => {}
        res = tokio::signal::ctrl_c() => res.context("Failed to listen for shutdown signal")?,
    }

    tracing::info!("Shutting down, stopping scheduled jobs");
    scheduler.stop_all();

    Ok(())
}
