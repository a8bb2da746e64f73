//! Viewport tile benchmark for XYZ tile servers.
//!
//! This crate provides tools to:
//! - Project a focal point onto the WebMercatorQuad grid and enumerate the
//!   tiles a map viewport shows around it
//! - Fetch a whole viewport concurrently against one or more tile endpoints
//! - Repeat each (source, zoom) case as warm-up plus recorded rounds
//! - Output results in multiple formats (console, JSON, CSV)

pub mod config;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod params;
pub mod report;
pub mod runner;
pub mod template;

pub use config::{BenchConfig, FocalPoint, TileSourceConfig, MIN_ROUNDS, MIN_WARMUP_ITERATIONS};
pub use error::{BenchError, BenchResult};
pub use fetcher::{
    fetch_viewport, FetchOutcome, HttpTransport, HttpTransportFactory, TileFetch, TileResponse,
    TileTransport, TransportError, TransportFactory,
};
pub use metrics::{CaseStats, GitInfo, RunTally, TrialRecord};
pub use params::{ParamMap, ParamValue};
pub use report::ResultsReport;
pub use runner::{BenchmarkReport, BenchmarkRunner, CaseResult, Selection};
pub use template::{TemplateError, UrlTemplate};
