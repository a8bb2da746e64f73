//! Trial tallies and per-case statistics.

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::fetcher::{FetchOutcome, TileFetch};

/// Success/error counts for the tiles of one trial.
///
/// A tile succeeds when the server answered with a status below 500. 4xx
/// responses count as successes: the benchmark measures whether the server
/// failed, not whether the request was meaningful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTally {
    pub success_count: u64,
    pub error_count: u64,
}

impl RunTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fetches(fetches: &[TileFetch]) -> Self {
        let mut tally = Self::new();
        for fetch in fetches {
            tally.record(&fetch.outcome);
        }
        tally
    }

    pub fn record(&mut self, outcome: &FetchOutcome) {
        if outcome.is_success() {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.success_count + self.error_count
    }

    /// Add another tally's counts into this one.
    pub fn absorb(&mut self, other: &RunTally) {
        self.success_count += other.success_count;
        self.error_count += other.error_count;
    }
}

/// One measured trial: a full viewport fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Wall-clock time of the whole trial, in seconds.
    pub elapsed_secs: f64,
    pub tally: RunTally,
    pub tiles: usize,
    pub bytes: u64,
    /// Per-tile latencies in microseconds.
    #[serde(skip)]
    pub tile_latencies_us: Vec<u64>,
}

impl TrialRecord {
    pub fn new(elapsed: Duration, fetches: &[TileFetch]) -> Self {
        Self {
            elapsed_secs: elapsed.as_secs_f64(),
            tally: RunTally::from_fetches(fetches),
            tiles: fetches.len(),
            bytes: fetches.iter().map(|f| f.outcome.bytes() as u64).sum(),
            tile_latencies_us: fetches
                .iter()
                .map(|f| f.elapsed.as_micros() as u64)
                .collect(),
        }
    }
}

/// Timing statistics over the recorded rounds of one case.
///
/// Trial times are in seconds, tile latencies in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseStats {
    pub rounds: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation; 0 with fewer than two rounds.
    pub stddev: f64,
    pub median: f64,
    /// Trials per second (1 / mean).
    pub ops: f64,
    pub tile_latency_p50_ms: f64,
    pub tile_latency_p95_ms: f64,
    pub tile_latency_p99_ms: f64,
    pub tile_latency_max_ms: f64,
}

impl CaseStats {
    pub fn from_trials(trials: &[TrialRecord]) -> Self {
        if trials.is_empty() {
            return Self::default();
        }

        let mut times: Vec<f64> = trials.iter().map(|t| t.elapsed_secs).collect();
        times.sort_by(|a, b| a.total_cmp(b));

        let n = times.len();
        let mean = times.iter().sum::<f64>() / n as f64;
        let stddev = if n > 1 {
            let var = times.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };
        let median = if n % 2 == 1 {
            times[n / 2]
        } else {
            (times[n / 2 - 1] + times[n / 2]) / 2.0
        };

        let mut stats = Self {
            rounds: n,
            min: times[0],
            max: times[n - 1],
            mean,
            stddev,
            median,
            ops: if mean > 0.0 { 1.0 / mean } else { 0.0 },
            ..Self::default()
        };

        // auto-resizing; record() grows the trackable range as needed
        if let Ok(mut histogram) = Histogram::<u64>::new(3) {
            for latency in trials.iter().flat_map(|t| t.tile_latencies_us.iter()) {
                histogram.record(*latency).ok();
            }
            if !histogram.is_empty() {
                stats.tile_latency_p50_ms = histogram.value_at_percentile(50.0) as f64 / 1000.0;
                stats.tile_latency_p95_ms = histogram.value_at_percentile(95.0) as f64 / 1000.0;
                stats.tile_latency_p99_ms = histogram.value_at_percentile(99.0) as f64 / 1000.0;
                stats.tile_latency_max_ms = histogram.max() as f64 / 1000.0;
            }
        }

        stats
    }
}

/// Git repository information captured at test time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitInfo {
    pub commit_hash: String,
    pub commit_short: String,
    pub branch: String,
    pub is_dirty: bool,
}

impl GitInfo {
    /// Capture current git repository state, if run inside a repository.
    pub fn capture() -> Option<Self> {
        let commit_hash = git(&["rev-parse", "HEAD"])?;
        let commit_short = commit_hash.chars().take(7).collect();
        let branch = git(&["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_else(|| "unknown".into());
        let is_dirty = git(&["status", "--porcelain"]).is_some_and(|s| !s.is_empty());

        Some(GitInfo {
            commit_hash,
            commit_short,
            branch,
            is_dirty,
        })
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = std::process::Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}
