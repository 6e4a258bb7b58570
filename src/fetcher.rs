// Source fetching: one HTTP GET per flight source with bounded retry.
// A source that stays down only loses its own cache entry; nothing propagates
// to the caller except a malformed endpoint.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, error, warn};

use crate::{
    cache::CacheStore,
    error::SourceError,
    flight::FlightSet,
    retry::{with_retry, RetryConfig},
    source::Source,
    SharedFlights,
};

// Raw access to an upstream source; swapped for a mock in tests
#[async_trait]
pub trait FlightsTransport: Send + Sync + 'static {
    // Body of a successful (2xx) GET to `source`
    async fn get(&self, source: &Source) -> Result<Bytes, SourceError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    timeout_ms: u64,
}

impl HttpTransport {
    pub fn new(timeout_ms: u64) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self { client, timeout_ms })
    }

    fn map_error(&self, source: &Source, err: reqwest::Error) -> SourceError {
        if err.is_timeout() {
            SourceError::Timeout {
                endpoint: source.to_string(),
                timeout_ms: self.timeout_ms,
            }
        } else {
            SourceError::SourceUnavailable {
                endpoint: source.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl FlightsTransport for HttpTransport {
    async fn get(&self, source: &Source) -> Result<Bytes, SourceError> {
        let response = self
            .client
            .get(source.url().clone())
            .send()
            .await
            .map_err(|e| self.map_error(source, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::ApiResponseError {
                endpoint: source.to_string(),
                status_code: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|e| self.map_error(source, e))
    }
}

pub struct SourceFetcher {
    transport: Arc<dyn FlightsTransport>,
    store: Arc<dyn CacheStore<SharedFlights>>,
    retry: RetryConfig,
}

impl SourceFetcher {
    pub fn new(
        transport: Arc<dyn FlightsTransport>,
        store: Arc<dyn CacheStore<SharedFlights>>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            transport,
            store,
            retry,
        }
    }

    /// Fetches `endpoint` and caches its flights under the endpoint itself.
    ///
    /// Only a malformed endpoint is an error. When every attempt fails, or the
    /// cache refuses the result, the source's entry is removed so stale flights
    /// never outlive a refresh cycle.
    pub async fn fetch(&self, endpoint: &str) -> Result<(), SourceError> {
        let source = Source::parse(endpoint)?;
        let label = format!("fetching flights from source {}", source);

        match with_retry(&self.retry, &label, |_| self.fetch_once(&source)).await {
            Ok(flights) => {
                let count = flights.len();
                if self.store.set(source.as_str(), Arc::new(flights), None) {
                    debug!("Cached {} flights from source {}", count, source);
                } else {
                    warn!(
                        "Cache rejected {} flights from source {}, dropping its contribution",
                        count, source
                    );
                    self.store.delete(source.as_str());
                }
            }
            Err(e) => {
                error!(
                    "failed to fetch flights from source {} after {} attempts: {}",
                    source,
                    self.retry.total_attempts(),
                    e
                );
                self.store.delete(source.as_str());
            }
        }

        Ok(())
    }

    // Last successfully fetched flights of `endpoint`
    pub fn cached(&self, endpoint: &str) -> Option<SharedFlights> {
        self.store.get(endpoint)
    }

    async fn fetch_once(&self, source: &Source) -> Result<FlightSet, SourceError> {
        let body = self.transport.get(source).await?;

        FlightSet::from_json(&body).map_err(|e| SourceError::InvalidPayload {
            endpoint: source.to_string(),
            message: e.to_string(),
        })
    }
}

// In-process stand-in for upstream flight sources
pub mod mock_transport {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, Clone)]
    pub enum MockResponse {
        Flights(FlightSet),
        Body(Bytes),
        Status(u16),
        Down,
    }

    #[derive(Default)]
    pub struct MockTransport {
        responses: Mutex<HashMap<String, MockResponse>>,
        requests: Mutex<HashMap<String, usize>>,
        request_count: AtomicUsize,
        fail_next_requests: AtomicUsize,
        delay_ms: AtomicUsize,
        complete_outage: AtomicBool,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn add_flights(&self, endpoint: &str, flights: FlightSet) {
            self.set_response(endpoint, MockResponse::Flights(flights));
        }

        pub fn add_body(&self, endpoint: &str, body: &str) {
            self.set_response(endpoint, MockResponse::Body(Bytes::from(body.to_string())));
        }

        pub fn set_status(&self, endpoint: &str, status_code: u16) {
            self.set_response(endpoint, MockResponse::Status(status_code));
        }

        pub fn set_down(&self, endpoint: &str) {
            self.set_response(endpoint, MockResponse::Down);
        }

        pub fn set_response(&self, endpoint: &str, response: MockResponse) {
            self.responses.lock().insert(endpoint.to_string(), response);
        }

        // Every source fails while set
        pub fn set_complete_outage(&self, outage: bool) {
            self.complete_outage.store(outage, Ordering::SeqCst);
        }

        // The next `count` requests fail regardless of source
        pub fn fail_next_requests(&self, count: usize) {
            self.fail_next_requests.store(count, Ordering::SeqCst);
        }

        pub fn set_delay(&self, delay_ms: usize) {
            self.delay_ms.store(delay_ms, Ordering::SeqCst);
        }

        pub fn request_count(&self) -> usize {
            self.request_count.load(Ordering::SeqCst)
        }

        pub fn requests_to(&self, endpoint: &str) -> usize {
            self.requests.lock().get(endpoint).copied().unwrap_or(0)
        }

        fn unavailable(source: &Source, message: &str) -> SourceError {
            SourceError::SourceUnavailable {
                endpoint: source.to_string(),
                message: message.to_string(),
            }
        }
    }

    #[async_trait]
    impl FlightsTransport for MockTransport {
        async fn get(&self, source: &Source) -> Result<Bytes, SourceError> {
            self.request_count.fetch_add(1, Ordering::SeqCst);
            *self
                .requests
                .lock()
                .entry(source.as_str().to_string())
                .or_default() += 1;

            let delay = self.delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay as u64)).await;
            }

            if self.complete_outage.load(Ordering::SeqCst) {
                return Err(Self::unavailable(source, "Service unavailable"));
            }

            let failed = self
                .fail_next_requests
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(SourceError::ApiResponseError {
                    endpoint: source.to_string(),
                    status_code: 500,
                });
            }

            let response = self.responses.lock().get(source.as_str()).cloned();
            match response {
                Some(MockResponse::Flights(flights)) => serde_json::to_vec(&flights)
                    .map(Bytes::from)
                    .map_err(|e| Self::unavailable(source, &e.to_string())),
                Some(MockResponse::Body(body)) => Ok(body),
                Some(MockResponse::Status(status_code)) if (200..300).contains(&status_code) => {
                    Ok(Bytes::new())
                }
                Some(MockResponse::Status(status_code)) => Err(SourceError::ApiResponseError {
                    endpoint: source.to_string(),
                    status_code,
                }),
                Some(MockResponse::Down) => Err(Self::unavailable(source, "connection refused")),
                None => Err(SourceError::ApiResponseError {
                    endpoint: source.to_string(),
                    status_code: 404,
                }),
            }
        }
    }
}
