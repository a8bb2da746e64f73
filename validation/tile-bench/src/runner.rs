//! Trial driver: runs every (source, zoom) case as warm-up plus recorded rounds.
//!
//! A trial is one full viewport fetch: project the focal point, enumerate the
//! viewport, fetch all tiles concurrently and tally the outcomes. Trials run
//! strictly one after another; only the tiles inside a trial overlap.

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::{BenchConfig, FocalPoint, TileSourceConfig};
use crate::error::{BenchError, BenchResult};
use crate::fetcher::{fetch_viewport, HttpTransportFactory, TransportFactory};
use crate::metrics::{CaseStats, GitInfo, RunTally, TrialRecord};
use crate::template::UrlTemplate;
use tile_common::tile::MAX_ZOOM;
use tile_common::{TileCoord, ViewportExtent, WebMercatorQuad};

/// Subset of the scenario to run. Empty lists select everything.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub sources: Vec<String>,
    pub zooms: Vec<u32>,
}

/// Results of one (source, zoom) case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub name: String,
    pub group: String,
    pub source: String,
    pub zoom: u32,
    pub center: TileCoord,
    pub tiles_per_trial: usize,
    pub stats: CaseStats,
    /// Counts summed over the recorded rounds.
    pub extra_info: RunTally,
    pub trials: Vec<TrialRecord>,
}

/// Results of a whole scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub name: String,
    pub description: String,
    pub group: String,
    pub timestamp: String,
    pub focal_point: FocalPoint,
    pub viewport: ViewportExtent,
    pub rounds: u32,
    pub warmup_iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_info: Option<GitInfo>,
    pub cases: Vec<CaseResult>,
}

impl BenchmarkReport {
    /// Counts over every case.
    pub fn totals(&self) -> RunTally {
        let mut total = RunTally::new();
        for case in &self.cases {
            total.absorb(&case.extra_info);
        }
        total
    }
}

/// Everything a trial needs that does not change between rounds.
struct TrialPlan<'a> {
    source: &'a TileSourceConfig,
    template: UrlTemplate,
    query: Vec<(String, String)>,
}

/// Executes benchmark cases sequentially.
pub struct BenchmarkRunner {
    config: BenchConfig,
    transports: Arc<dyn TransportFactory>,
    projection: WebMercatorQuad,
    show_progress: bool,
}

impl BenchmarkRunner {
    /// Create a runner. The configuration is validated up front.
    pub fn new(config: BenchConfig, transports: Arc<dyn TransportFactory>) -> BenchResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            transports,
            projection: WebMercatorQuad,
            show_progress: false,
        })
    }

    /// Create a runner that fetches over HTTP with a new client per trial.
    pub fn with_http(config: BenchConfig) -> BenchResult<Self> {
        config.validate()?;
        let factory = HttpTransportFactory::new(config.timeout());
        Self::new(config, Arc::new(factory))
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Resolve a selection into (source, zoom) cases, sources outer.
    pub fn cases(&self, selection: &Selection) -> BenchResult<Vec<(&TileSourceConfig, u32)>> {
        let sources: Vec<&TileSourceConfig> = if selection.sources.is_empty() {
            self.config.sources.iter().collect()
        } else {
            selection
                .sources
                .iter()
                .map(|name| self.config.source(name))
                .collect::<BenchResult<_>>()?
        };

        let zooms = if selection.zooms.is_empty() {
            &self.config.zooms
        } else {
            &selection.zooms
        };
        if let Some(z) = zooms.iter().find(|&&z| z > MAX_ZOOM) {
            return Err(BenchError::config(format!(
                "zoom {} exceeds maximum {}",
                z, MAX_ZOOM
            )));
        }

        Ok(sources
            .into_iter()
            .flat_map(move |source| zooms.iter().map(move |&zoom| (source, zoom)))
            .collect())
    }

    /// Run every selected case.
    pub async fn run(&self, selection: &Selection) -> BenchResult<BenchmarkReport> {
        let cases = self.cases(selection)?;
        let trials_per_case = (self.config.warmup_iterations + self.config.rounds) as u64;

        info!(
            scenario = %self.config.name,
            cases = cases.len(),
            rounds = self.config.rounds,
            warmup = self.config.warmup_iterations,
            "Starting benchmark"
        );

        let pb = if self.show_progress {
            let pb = ProgressBar::new(cases.len() as u64 * trials_per_case);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} trials {msg}")
            {
                pb.set_style(style.progress_chars("##-"));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut results = Vec::with_capacity(cases.len());
        for (source, zoom) in cases {
            pb.set_message(format!("{} z{}", source.name, zoom));
            let plan = self.plan(source)?;
            results.push(self.run_planned_case(&plan, zoom, &pb).await?);
        }
        pb.finish_with_message("Complete!");

        Ok(BenchmarkReport {
            name: self.config.name.clone(),
            description: self.config.description.clone(),
            group: self.config.group_name().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            focal_point: self.config.focal_point,
            viewport: self.config.viewport,
            rounds: self.config.rounds,
            warmup_iterations: self.config.warmup_iterations,
            git_info: GitInfo::capture(),
            cases: results,
        })
    }

    /// Run one case: warm-up trials, then recorded rounds.
    pub async fn run_case(&self, source: &str, zoom: u32) -> BenchResult<CaseResult> {
        let plan = self.plan(self.config.source(source)?)?;
        self.run_planned_case(&plan, zoom, &ProgressBar::hidden()).await
    }

    /// Run a single trial and return its record.
    pub async fn run_trial(&self, source: &str, zoom: u32) -> BenchResult<TrialRecord> {
        let plan = self.plan(self.config.source(source)?)?;
        let (_, record) = self.execute_trial(&plan, zoom).await?;
        Ok(record)
    }

    /// Center tile and expanded URLs of one viewport, without fetching.
    pub fn viewport_urls(&self, source: &str, zoom: u32) -> BenchResult<(TileCoord, Vec<String>)> {
        let plan = self.plan(self.config.source(source)?)?;
        let center = self.center_tile(zoom)?;
        let urls = center
            .surrounding(self.config.viewport)
            .iter()
            .map(|tile| plan.template.expand(tile))
            .collect();
        Ok((center, urls))
    }

    fn plan<'a>(&self, source: &'a TileSourceConfig) -> BenchResult<TrialPlan<'a>> {
        Ok(TrialPlan {
            source,
            template: source.template()?,
            query: source.query(&self.config.base_params),
        })
    }

    fn center_tile(&self, zoom: u32) -> BenchResult<TileCoord> {
        let FocalPoint { lng, lat } = self.config.focal_point;
        Ok(self.projection.tile(lng, lat, zoom)?)
    }

    #[instrument(skip(self, plan, pb), fields(source = %plan.source.name))]
    async fn run_planned_case(
        &self,
        plan: &TrialPlan<'_>,
        zoom: u32,
        pb: &ProgressBar,
    ) -> BenchResult<CaseResult> {
        for i in 0..self.config.warmup_iterations {
            let (_, record) = self.execute_trial(plan, zoom).await?;
            debug!(iteration = i, elapsed_secs = record.elapsed_secs, "Warm-up trial complete");
            pb.inc(1);
        }

        let mut center = self.center_tile(zoom)?;
        let mut trials = Vec::with_capacity(self.config.rounds as usize);
        for round in 0..self.config.rounds {
            let (trial_center, record) = self.execute_trial(plan, zoom).await?;
            debug!(
                round,
                elapsed_secs = record.elapsed_secs,
                success = record.tally.success_count,
                errors = record.tally.error_count,
                "Trial complete"
            );
            center = trial_center;
            trials.push(record);
            pb.inc(1);
        }

        let mut extra_info = RunTally::new();
        for trial in &trials {
            extra_info.absorb(&trial.tally);
        }
        let stats = CaseStats::from_trials(&trials);

        if extra_info.error_count > 0 {
            warn!(
                zoom,
                errors = extra_info.error_count,
                success = extra_info.success_count,
                "Case finished with tile errors"
            );
        }
        info!(
            zoom,
            mean_secs = stats.mean,
            stddev_secs = stats.stddev,
            success = extra_info.success_count,
            errors = extra_info.error_count,
            "Case complete"
        );

        Ok(CaseResult {
            name: format!("{}[z{}]", plan.source.name, zoom),
            group: self.config.group_name().to_string(),
            source: plan.source.name.clone(),
            zoom,
            center,
            tiles_per_trial: self.config.viewport.tile_count(),
            stats,
            extra_info,
            trials,
        })
    }

    /// One measured trial. The transport, and with it the connection pool,
    /// lives only for the duration of the trial.
    async fn execute_trial(
        &self,
        plan: &TrialPlan<'_>,
        zoom: u32,
    ) -> BenchResult<(TileCoord, TrialRecord)> {
        let start = Instant::now();

        let center = self.center_tile(zoom)?;
        let tiles = center.surrounding(self.config.viewport);
        let transport = self.transports.create()?;
        let fetches = fetch_viewport(transport.as_ref(), &plan.template, &tiles, &plan.query).await;
        drop(transport);

        Ok((center, TrialRecord::new(start.elapsed(), &fetches)))
    }
}
