//! Scenario configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::error::{BenchError, BenchResult};
use crate::params::{encode_query, merge_params, ParamMap};
use crate::template::UrlTemplate;
use tile_common::tile::MAX_ZOOM;
use tile_common::ViewportExtent;

/// Fewest recorded rounds per case.
pub const MIN_ROUNDS: u32 = 3;

/// Fewest unrecorded warm-up trials per case.
pub const MIN_WARMUP_ITERATIONS: u32 = 2;

/// Benchmark scenario loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Benchmark group reported alongside every case.
    #[serde(default)]
    pub group: Option<String>,
    pub focal_point: FocalPoint,
    #[serde(default)]
    pub viewport: ViewportExtent,
    pub zooms: Vec<u32>,
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    #[serde(default = "default_warmup_iterations")]
    pub warmup_iterations: u32,
    /// Per-request timeout. Unset by default: a timeout would cap the very
    /// latency being measured.
    #[serde(default)]
    pub timeout_secs: Option<f64>,
    #[serde(default)]
    pub base_params: ParamMap,
    pub sources: Vec<TileSourceConfig>,
}

/// Geographic point the viewport is centered on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocalPoint {
    pub lng: f64,
    pub lat: f64,
}

/// One tile endpoint under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileSourceConfig {
    pub name: String,
    /// XYZ URL template with `{z}`, `{x}` and `{y}`.
    pub url: String,
    #[serde(default)]
    pub extra_params: ParamMap,
}

/// `None` unless `secs` is a positive, representable number of seconds.
fn timeout_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
}

fn default_rounds() -> u32 {
    MIN_ROUNDS
}

fn default_warmup_iterations() -> u32 {
    MIN_WARMUP_ITERATIONS
}

impl BenchConfig {
    /// Load configuration from YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> BenchResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> BenchResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Validate configuration.
    pub fn validate(&self) -> BenchResult<()> {
        if !self.focal_point.lng.is_finite() || !self.focal_point.lat.is_finite() {
            return Err(BenchError::config("focal_point must be finite"));
        }
        if self.zooms.is_empty() {
            return Err(BenchError::config("at least one zoom must be specified"));
        }
        if let Some(z) = self.zooms.iter().find(|&&z| z > MAX_ZOOM) {
            return Err(BenchError::config(format!(
                "zoom {} exceeds maximum {}",
                z, MAX_ZOOM
            )));
        }
        if self.rounds < MIN_ROUNDS {
            return Err(BenchError::config(format!(
                "rounds must be >= {}",
                MIN_ROUNDS
            )));
        }
        if self.warmup_iterations < MIN_WARMUP_ITERATIONS {
            return Err(BenchError::config(format!(
                "warmup_iterations must be >= {}",
                MIN_WARMUP_ITERATIONS
            )));
        }
        if let Some(t) = self.timeout_secs {
            if timeout_duration(t).is_none() {
                return Err(BenchError::config(format!(
                    "timeout_secs must be a positive number of seconds, got {}",
                    t
                )));
            }
        }
        if self.sources.is_empty() {
            return Err(BenchError::config("at least one source must be specified"));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.name.as_str()) {
                return Err(BenchError::config(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            if source.url.trim().is_empty() {
                return Err(BenchError::config(format!(
                    "source '{}' has no url",
                    source.name
                )));
            }
            UrlTemplate::parse(&source.url)?;
        }
        Ok(())
    }

    /// Look up a source by name.
    pub fn source(&self, name: &str) -> BenchResult<&TileSourceConfig> {
        self.sources
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| BenchError::UnknownSource(name.to_string()))
    }

    /// Per-request timeout, if set to a representable duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.and_then(timeout_duration)
    }

    /// Group name, falling back to the scenario name.
    pub fn group_name(&self) -> &str {
        self.group.as_deref().unwrap_or(&self.name)
    }
}

impl TileSourceConfig {
    pub fn template(&self) -> BenchResult<UrlTemplate> {
        Ok(UrlTemplate::parse(&self.url)?)
    }

    /// Query pairs sent with every tile of this source.
    pub fn query(&self, base: &ParamMap) -> Vec<(String, String)> {
        encode_query(&merge_params(base, &self.extra_params))
    }
}
