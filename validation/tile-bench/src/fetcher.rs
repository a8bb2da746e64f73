//! Concurrent viewport fetching.
//!
//! All tiles of a viewport are requested at once and joined before the
//! viewport is considered fetched. A failing tile never cancels its siblings:
//! every tile settles into its own [`FetchOutcome`].

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::BenchResult;
use crate::template::UrlTemplate;
use tile_common::TileCoord;

/// A transport-level failure: no HTTP status was received.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Status and body size of a completed tile response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileResponse {
    pub status: u16,
    pub bytes: usize,
}

/// Sends one tile GET request.
#[async_trait]
pub trait TileTransport: Send + Sync {
    /// GET `url` with `query`, consuming the whole body.
    async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<TileResponse, TransportError>;
}

/// Creates the transport used by one trial.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> BenchResult<Arc<dyn TileTransport>>;
}

/// reqwest-backed transport. One instance owns one connection pool.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport. `timeout` is `None` unless explicitly opted in.
    pub fn new(timeout: Option<Duration>) -> BenchResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl TileTransport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<TileResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(TileResponse {
            status,
            bytes: body.len(),
        })
    }
}

/// Builds a fresh [`HttpTransport`] for every trial.
#[derive(Debug, Clone, Default)]
pub struct HttpTransportFactory {
    timeout: Option<Duration>,
}

impl HttpTransportFactory {
    pub fn new(timeout: Option<Duration>) -> Self {
        if let Some(timeout) = timeout {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Request timeout enabled; slow tiles will be reported as transport failures"
            );
        }
        Self { timeout }
    }
}

impl TransportFactory for HttpTransportFactory {
    fn create(&self) -> BenchResult<Arc<dyn TileTransport>> {
        let transport: Arc<dyn TileTransport> = Arc::new(HttpTransport::new(self.timeout)?);
        Ok(transport)
    }
}

/// How a single tile request settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Response { status: u16, bytes: usize },
    TransportFailure(String),
}

impl FetchOutcome {
    /// The server did not fail: any status below 500, including 4xx.
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Response { status, .. } if *status < 500)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchOutcome::Response { status, .. } => Some(*status),
            FetchOutcome::TransportFailure(_) => None,
        }
    }

    pub fn bytes(&self) -> usize {
        match self {
            FetchOutcome::Response { bytes, .. } => *bytes,
            FetchOutcome::TransportFailure(_) => 0,
        }
    }
}

/// Result of fetching one tile.
#[derive(Debug, Clone)]
pub struct TileFetch {
    pub tile: TileCoord,
    pub url: String,
    pub outcome: FetchOutcome,
    pub elapsed: Duration,
}

/// Fetch every tile concurrently and wait for all of them.
///
/// URLs are expanded before any request is sent. The output has one entry
/// per input tile, in input order, duplicates included.
pub async fn fetch_viewport(
    transport: &dyn TileTransport,
    template: &UrlTemplate,
    tiles: &[TileCoord],
    query: &[(String, String)],
) -> Vec<TileFetch> {
    let requests: Vec<(TileCoord, String)> = tiles
        .iter()
        .map(|tile| (*tile, template.expand(tile)))
        .collect();

    let fetches = requests
        .into_iter()
        .map(|(tile, url)| fetch_tile(transport, tile, url, query));

    join_all(fetches).await
}

async fn fetch_tile(
    transport: &dyn TileTransport,
    tile: TileCoord,
    url: String,
    query: &[(String, String)],
) -> TileFetch {
    let start = Instant::now();
    let outcome = match transport.get(&url, query).await {
        Ok(response) => {
            if response.status >= 500 {
                debug!(tile = %tile, status = response.status, "Tile request returned server error");
            }
            FetchOutcome::Response {
                status: response.status,
                bytes: response.bytes,
            }
        }
        Err(e) => {
            debug!(tile = %tile, url = %url, error = %e, "Tile request failed");
            FetchOutcome::TransportFailure(e.0)
        }
    };

    TileFetch {
        tile,
        url,
        outcome,
        elapsed: start.elapsed(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::metrics::RunTally;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tile_common::{surrounding_tiles, ViewportExtent};

    /// Scripted transport keyed on `(x, y)` parsed from `http://mock/{z}/{x}/{y}`.
    pub(crate) struct ScriptedTransport {
        script: Box<dyn Fn(u32, u32) -> (Result<TileResponse, TransportError>, u64) + Send + Sync>,
        pub calls: AtomicUsize,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
        pub queries: Mutex<Vec<Vec<(String, String)>>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new<F>(script: F) -> Self
        where
            F: Fn(u32, u32) -> (Result<TileResponse, TransportError>, u64) + Send + Sync + 'static,
        {
            Self {
                script: Box::new(script),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                queries: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn status(status: u16) -> Self {
            Self::new(move |_, _| (Ok(TileResponse { status, bytes: 4 }), 0))
        }
    }

    #[async_trait]
    impl TileTransport for ScriptedTransport {
        async fn get(
            &self,
            url: &str,
            query: &[(String, String)],
        ) -> Result<TileResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_vec());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let parts: Vec<u32> = url
                .trim_start_matches("http://mock/")
                .split('/')
                .map(|p| p.parse().unwrap())
                .collect();
            let (result, delay_ms) = (self.script)(parts[1], parts[2]);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    pub(crate) fn mock_template() -> UrlTemplate {
        UrlTemplate::parse("http://mock/{z}/{x}/{y}").unwrap()
    }

    fn row(z: u32, y: u32, xs: std::ops::RangeInclusive<u32>) -> Vec<TileCoord> {
        xs.map(|x| TileCoord::new(z, x, y)).collect()
    }

    #[tokio::test]
    async fn test_server_errors_are_counted() {
        // column 2 fails with 502, column 4 with 500: 2 of 5 tiles
        let transport = ScriptedTransport::new(|x, _| {
            let status = match x {
                2 => 502,
                4 => 500,
                1 => 404,
                _ => 200,
            };
            (Ok(TileResponse { status, bytes: 10 }), 0)
        });
        let tiles = row(5, 3, 0..=4);

        let fetches = fetch_viewport(&transport, &mock_template(), &tiles, &[]).await;
        let tally = RunTally::from_fetches(&fetches);

        assert_eq!(fetches.len(), 5);
        assert_eq!(tally.error_count, 2);
        assert_eq!(tally.success_count, 3);
    }

    #[tokio::test]
    async fn test_counts_independent_of_arrival_order() {
        // later tiles answer first
        let transport = ScriptedTransport::new(|x, _| {
            let status = if x % 3 == 0 { 503 } else { 200 };
            (Ok(TileResponse { status, bytes: 1 }), 30 - 3 * x as u64)
        });
        let tiles = row(6, 10, 0..=9);

        let fetches = fetch_viewport(&transport, &mock_template(), &tiles, &[]).await;
        let tally = RunTally::from_fetches(&fetches);

        // x in {0, 3, 6, 9}
        assert_eq!(tally.error_count, 4);
        assert_eq!(tally.success_count, 6);
        let order: Vec<TileCoord> = fetches.iter().map(|f| f.tile).collect();
        assert_eq!(order, tiles);
    }

    #[tokio::test]
    async fn test_transport_failure_is_contained() {
        let transport = ScriptedTransport::new(|x, y| {
            if (x, y) == (5, 5) {
                (Err(TransportError("connection refused".into())), 0)
            } else {
                (Ok(TileResponse { status: 200, bytes: 8 }), 5)
            }
        });
        let tiles = surrounding_tiles(5, 5, 4, ViewportExtent::new(3, 3));

        let fetches = fetch_viewport(&transport, &mock_template(), &tiles, &[]).await;
        let tally = RunTally::from_fetches(&fetches);

        assert_eq!(fetches.len(), 9);
        assert_eq!(tally.error_count, 1);
        assert_eq!(tally.success_count, 8);
        assert_eq!(
            fetches[4].outcome,
            FetchOutcome::TransportFailure("connection refused".into())
        );
        assert_eq!(transport.calls.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_requests_are_concurrent() {
        let transport = ScriptedTransport::new(|_, _| (Ok(TileResponse { status: 200, bytes: 0 }), 50));
        let tiles = surrounding_tiles(20, 20, 6, ViewportExtent::default());

        let start = Instant::now();
        let fetches = fetch_viewport(&transport, &mock_template(), &tiles, &[]).await;

        assert_eq!(fetches.len(), 63);
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 63);
        // sequential would take 63 * 50ms
        assert!(start.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_duplicate_tiles_are_all_fetched() {
        let transport = ScriptedTransport::status(200);
        let tiles = surrounding_tiles(0, 0, 3, ViewportExtent::new(3, 3));

        let fetches = fetch_viewport(&transport, &mock_template(), &tiles, &[]).await;

        assert_eq!(fetches.len(), 9);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 9);
        let mut per_url: HashMap<&str, usize> = HashMap::new();
        for f in &fetches {
            *per_url.entry(f.url.as_str()).or_default() += 1;
        }
        assert_eq!(per_url.len(), 4);
        assert_eq!(per_url["http://mock/3/0/0"], 4);
        assert_eq!(per_url["http://mock/3/1/0"], 2);
        assert_eq!(per_url["http://mock/3/0/1"], 2);
        assert_eq!(per_url["http://mock/3/1/1"], 1);
    }

    #[tokio::test]
    async fn test_query_is_sent_with_every_tile() {
        let transport = ScriptedTransport::status(200);
        let tiles = row(2, 1, 0..=2);
        let query = vec![("bidx".to_string(), "1".to_string())];

        fetch_viewport(&transport, &mock_template(), &tiles, &query).await;

        let queries = transport.queries.lock().unwrap();
        assert_eq!(queries.len(), 3);
        assert!(queries.iter().all(|q| *q == query));
    }

    #[test]
    fn test_outcome_classification() {
        assert!(FetchOutcome::Response { status: 200, bytes: 0 }.is_success());
        assert!(FetchOutcome::Response { status: 404, bytes: 0 }.is_success());
        assert!(FetchOutcome::Response { status: 499, bytes: 0 }.is_success());
        assert!(!FetchOutcome::Response { status: 500, bytes: 0 }.is_success());
        assert!(!FetchOutcome::Response { status: 504, bytes: 0 }.is_success());
        assert!(!FetchOutcome::TransportFailure("dns".into()).is_success());
        assert_eq!(FetchOutcome::TransportFailure("dns".into()).status(), None);
    }
}
