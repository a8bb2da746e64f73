//! Results reporting and formatting.

use crate::runner::BenchmarkReport;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

/// Formats benchmark results for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format results as a console table, one row per case.
    pub fn format_table(report: &BenchmarkReport) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                "Case",
                "Center",
                "Min (s)",
                "Max (s)",
                "Mean (s)",
                "StdDev (s)",
                "Median (s)",
                "OPS",
                "Tile p50/p95/p99 (ms)",
                "Success",
                "Errors",
            ]);

        for case in &report.cases {
            let s = &case.stats;
            table.add_row(vec![
                case.name.clone(),
                case.center.to_string(),
                format!("{:.4}", s.min),
                format!("{:.4}", s.max),
                format!("{:.4}", s.mean),
                format!("{:.4}", s.stddev),
                format!("{:.4}", s.median),
                format!("{:.2}", s.ops),
                format!(
                    "{:.1} / {:.1} / {:.1}",
                    s.tile_latency_p50_ms, s.tile_latency_p95_ms, s.tile_latency_p99_ms
                ),
                case.extra_info.success_count.to_string(),
                case.extra_info.error_count.to_string(),
            ]);
        }

        let totals = report.totals();
        format!(
            "Benchmark: {} (group: {})\nViewport: {}x{} tiles around ({}, {}), {} rounds after {} warm-up\n{}\nTotal tiles: {} success, {} errors",
            report.name,
            report.group,
            report.viewport.width,
            report.viewport.height,
            report.focal_point.lng,
            report.focal_point.lat,
            report.rounds,
            report.warmup_iterations,
            table,
            totals.success_count,
            totals.error_count,
        )
    }

    /// Format results as JSON.
    pub fn format_json(report: &BenchmarkReport) -> serde_json::Result<String> {
        serde_json::to_string_pretty(report)
    }

    /// Format results as CSV rows, one per case, without header.
    pub fn format_csv(report: &BenchmarkReport) -> String {
        report
            .cases
            .iter()
            .map(|case| {
                let s = &case.stats;
                format!(
                    "{},{},{},{},{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.1},{:.1},{},{}",
                    report.timestamp,
                    report.group,
                    case.source,
                    case.zoom,
                    case.center,
                    s.rounds,
                    s.min,
                    s.max,
                    s.mean,
                    s.stddev,
                    s.median,
                    s.tile_latency_p50_ms,
                    s.tile_latency_p99_ms,
                    case.extra_info.success_count,
                    case.extra_info.error_count
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// CSV header row.
    pub fn csv_header() -> &'static str {
        "timestamp,group,source,zoom,center,rounds,min,max,mean,stddev,median,tile_p50_ms,tile_p99_ms,success_count,error_count"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FocalPoint;
    use crate::metrics::{CaseStats, RunTally};
    use crate::runner::CaseResult;
    use tile_common::{TileCoord, ViewportExtent};

    fn report() -> BenchmarkReport {
        let case = |source: &str, zoom: u32, errors: u64| CaseResult {
            name: format!("{}[z{}]", source, zoom),
            group: "boreal".to_string(),
            source: source.to_string(),
            zoom,
            center: TileCoord::new(zoom, 13, 19),
            tiles_per_trial: 63,
            stats: CaseStats {
                rounds: 3,
                min: 0.5,
                max: 0.9,
                mean: 0.7,
                stddev: 0.2,
                median: 0.7,
                ops: 1.0 / 0.7,
                ..CaseStats::default()
            },
            extra_info: RunTally {
                success_count: 189 - errors,
                error_count: errors,
            },
            trials: Vec::new(),
        };

        BenchmarkReport {
            name: "boreal".to_string(),
            description: String::new(),
            group: "boreal".to_string(),
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
            focal_point: FocalPoint { lng: -102.0, lat: 57.0 },
            viewport: ViewportExtent::default(),
            rounds: 3,
            warmup_iterations: 2,
            git_info: None,
            cases: vec![case("titiler-pgstac", 6, 0), case("mosaicjson", 6, 4)],
        }
    }

    #[test]
    fn test_table_contains_cases_and_totals() {
        let table = ResultsReport::format_table(&report());
        assert!(table.contains("titiler-pgstac[z6]"));
        assert!(table.contains("mosaicjson[z6]"));
        assert!(table.contains("6/13/19"));
        assert!(table.contains("Total tiles: 374 success, 4 errors"));
    }

    #[test]
    fn test_csv_matches_header() {
        let report = report();
        let csv = ResultsReport::format_csv(&report);
        let header_cols = ResultsReport::csv_header().split(',').count();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            assert_eq!(line.split(',').count(), header_cols);
        }
        assert!(csv.ends_with(",185,4"));
    }

    #[test]
    fn test_json_extra_info() {
        let json = ResultsReport::format_json(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["cases"][1]["extra_info"]["error_count"], 4);
        assert_eq!(value["cases"][1]["extra_info"]["success_count"], 185);
        assert_eq!(value["viewport"]["width"], 7);
        assert!(value.get("git_info").is_none());
    }
}
