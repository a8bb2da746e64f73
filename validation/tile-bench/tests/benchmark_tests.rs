//! End-to-end benchmark runs against an in-process tile server.

use std::collections::BTreeSet;
use std::time::Duration;

use tile_bench::{BenchConfig, BenchmarkRunner, ResultsReport, RunTally, Selection};
use tile_common::TileCoord;
use test_utils::{
    params, scenario_yaml, unreachable_template, write_scenario, MockResponse, MockTileServer,
    BOREAL_ZOOMS,
};

fn runner_for(templates: &[&str], zooms: &[u32]) -> BenchmarkRunner {
    let file = write_scenario(&scenario_yaml(templates, zooms)).unwrap();
    let config = BenchConfig::from_file(file.path()).unwrap();
    BenchmarkRunner::with_http(config).unwrap()
}

// ============================================================================
// Outcome counting
// ============================================================================

#[tokio::test]
async fn test_server_errors_counted_per_tile() {
    // Zoom 6 center column is x = 13
    let server = MockTileServer::start(|req| {
        if req.x == 13 {
            MockResponse::status(503)
        } else {
            MockResponse::status(200)
        }
    })
    .await
    .unwrap();
    let runner = runner_for(&[&server.url_template()], &[6]);

    let case = runner.run_case("source-0", 6).await.unwrap();

    assert_eq!(case.center, TileCoord::new(6, 13, 19));
    assert_eq!(case.tiles_per_trial, 9);
    // 3 recorded rounds, 3 failing tiles each
    assert_eq!(case.extra_info, RunTally { success_count: 18, error_count: 9 });
    // warm-up trials hit the server too
    assert_eq!(server.request_count(), 45);
}

#[tokio::test]
async fn test_client_errors_are_successes() {
    let server = MockTileServer::always(404).await.unwrap();
    let runner = runner_for(&[&server.url_template()], &[7]);

    let record = runner.run_trial("source-0", 7).await.unwrap();
    assert_eq!(record.tally, RunTally { success_count: 9, error_count: 0 });
}

#[tokio::test]
async fn test_unreachable_server_does_not_abort() {
    let template = unreachable_template().await.unwrap();
    let runner = runner_for(&[&template], &[6]);

    let case = runner.run_case("source-0", 6).await.unwrap();
    assert_eq!(case.extra_info, RunTally { success_count: 0, error_count: 27 });
    assert_eq!(case.trials.len(), 3);
}

// ============================================================================
// Requests seen by the server
// ============================================================================

#[tokio::test]
async fn test_server_receives_merged_params() {
    let first = MockTileServer::always(200).await.unwrap();
    let second = MockTileServer::always(200).await.unwrap();
    let runner = runner_for(&[&first.url_template(), &second.url_template()], &[8]);

    runner.run(&Selection::default()).await.unwrap();

    let request = &first.requests()[0];
    assert_eq!(request.param("bidx"), vec![params::BIDX]);
    assert_eq!(request.param("rescale"), vec![params::RESCALE]);
    assert_eq!(request.param("colormap_name"), vec![params::COLORMAP_NAME]);
    assert_eq!(request.param("color_formula"), vec![params::COLOR_FORMULA]);
    assert_eq!(request.param("assets"), vec![params::ASSETS]);
    assert_eq!(request.param("nodata"), vec![params::NODATA]);

    let request = &second.requests()[0];
    assert_eq!(request.param("bidx"), vec![params::BIDX]);
    assert!(request.param("assets").is_empty());
    assert!(request.param("nodata").is_empty());
}

#[tokio::test]
async fn test_png_template_covers_viewport() {
    let server = MockTileServer::always(200).await.unwrap();
    let runner = runner_for(&[&server.png_url_template()], &[6]);

    runner.run_trial("source-0", 6).await.unwrap();

    let tiles: BTreeSet<(u32, u32, u32)> = server
        .requests()
        .iter()
        .map(|r| (r.z, r.x, r.y))
        .collect();
    let expected: BTreeSet<(u32, u32, u32)> = (18..=20)
        .flat_map(|y| (12..=14).map(move |x| (6, x, y)))
        .collect();
    assert_eq!(tiles, expected);
}

#[tokio::test]
async fn test_slow_tiles_reflected_in_trial_time() {
    let server = MockTileServer::start(|req| {
        let response = MockResponse::status(200);
        if (req.x, req.y) == (13, 19) {
            response.with_delay(Duration::from_millis(150))
        } else {
            response
        }
    })
    .await
    .unwrap();
    let runner = runner_for(&[&server.url_template()], &[6]);

    let record = runner.run_trial("source-0", 6).await.unwrap();
    assert!(record.elapsed_secs >= 0.15);
    // tiles are fetched together, so one slow tile does not serialize the rest
    assert!(record.elapsed_secs < 0.15 * 9.0);
}

// ============================================================================
// Full runs and reports
// ============================================================================

#[tokio::test]
async fn test_full_run_report() {
    let server = MockTileServer::always(200).await.unwrap();
    let runner = runner_for(&[&server.url_template()], &[6, 7]);

    let report = runner.run(&Selection::default()).await.unwrap();
    assert_eq!(report.group, "fixture");
    assert_eq!(report.cases.len(), 2);
    assert_eq!(report.cases[0].name, "source-0[z6]");
    assert_eq!(report.cases[1].name, "source-0[z7]");
    assert_eq!(report.totals(), RunTally { success_count: 54, error_count: 0 });
    assert!(report.cases.iter().all(|c| c.stats.rounds == 3 && c.stats.min > 0.0));

    let json = ResultsReport::format_json(&report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["cases"][0]["extra_info"]["success_count"], 27);
    assert_eq!(value["cases"][1]["center"]["y"], 39);
}

#[test]
fn test_bundled_boreal_scenario() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/scenarios/icesat2-boreal.yaml");
    let config = BenchConfig::from_file(path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.zooms, BOREAL_ZOOMS.to_vec());
    assert_eq!(config.sources.len(), 2);

    let runner = BenchmarkRunner::with_http(config).unwrap();
    let (center, urls) = runner.viewport_urls("titiler-pgstac", 10).unwrap();
    assert_eq!(center, TileCoord::new(10, 221, 313));
    assert_eq!(urls.len(), 63);
    assert!(urls.iter().all(|u| u.starts_with("https://titiler-pgstac.maap-project.org/")));

    let (_, urls) = runner.viewport_urls("mosaicjson", 6).unwrap();
    assert!(urls.iter().all(|u| u.ends_with(".png")));
}
