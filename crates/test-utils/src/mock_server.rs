//! In-process mock tile server.
//!
//! Serves `GET /tiles/{z}/{x}/{y}` (optionally with a `.png` suffix on `y`)
//! on an ephemeral localhost port. The status code and delay of every
//! response come from a caller-supplied responder, and every request is
//! recorded so tests can assert on the tiles and query parameters received.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A tile request as seen by the mock server.
#[derive(Debug, Clone, PartialEq)]
pub struct TileRequest {
    pub z: u32,
    pub x: u32,
    pub y: u32,
    /// Decoded query pairs, in arrival order.
    pub query: Vec<(String, String)>,
}

impl TileRequest {
    /// All values sent for a query key.
    pub fn param(&self, key: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// Scripted response for one tile.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub delay: Duration,
    pub body: Vec<u8>,
}

impl MockResponse {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            delay: Duration::ZERO,
            body: b"tile".to_vec(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

type Responder = dyn Fn(&TileRequest) -> MockResponse + Send + Sync;

struct ServerState {
    responder: Box<Responder>,
    requests: Mutex<Vec<TileRequest>>,
}

/// Mock tile server bound to `127.0.0.1` on a random port.
///
/// The server task is aborted when the value is dropped.
pub struct MockTileServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    handle: JoinHandle<()>,
}

impl MockTileServer {
    /// Start a server whose responses are produced by `responder`.
    pub async fn start<F>(responder: F) -> std::io::Result<Self>
    where
        F: Fn(&TileRequest) -> MockResponse + Send + Sync + 'static,
    {
        let state = Arc::new(ServerState {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/tiles/:z/:x/:y", get(tile_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    /// Start a server that answers every tile with `status`.
    pub async fn always(status: u16) -> std::io::Result<Self> {
        Self::start(move |_| MockResponse::status(status)).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://127.0.0.1:<port>/tiles/{z}/{x}/{y}`
    pub fn url_template(&self) -> String {
        format!("http://{}/tiles/{{z}}/{{x}}/{{y}}", self.addr)
    }

    /// Same as [`url_template`](Self::url_template) with a `.png` suffix.
    pub fn png_url_template(&self) -> String {
        format!("{}.png", self.url_template())
    }

    /// Number of tile requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests().len()
    }

    /// Snapshot of every tile request received so far.
    pub fn requests(&self) -> Vec<TileRequest> {
        match self.state.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Drop for MockTileServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn tile_handler(
    State(state): State<Arc<ServerState>>,
    Path((z, x, y)): Path<(u32, u32, String)>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    let Ok(y) = y.trim_end_matches(".png").parse::<u32>() else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let request = TileRequest { z, x, y, query };
    let response = (state.responder)(&request);
    if let Ok(mut requests) = state.requests.lock() {
        requests.push(request);
    }

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, response.body).into_response()
}

/// URL template pointing at a localhost port with nothing listening on it.
///
/// Requests against it fail at the transport level (connection refused).
pub async fn unreachable_template() -> std::io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{}/tiles/{{z}}/{{x}}/{{y}}", addr))
}
