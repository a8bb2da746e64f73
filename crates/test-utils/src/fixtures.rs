//! Common test fixtures for tile benchmark tests.

use std::io::Write;
use tempfile::NamedTempFile;

/// Focal point of the boreal biomass benchmark, as (lng, lat).
pub const BOREAL_FOCAL_POINT: (f64, f64) = (-102.0, 57.0);

/// Zoom levels swept by the boreal benchmark.
pub const BOREAL_ZOOMS: [u32; 5] = [6, 7, 8, 9, 10];

/// Base query parameters shared by every boreal tile source.
pub mod params {
    pub const BIDX: &str = "1";
    pub const RESCALE: &str = "0,400";
    pub const COLORMAP_NAME: &str = "gist_earth_r";
    pub const COLOR_FORMULA: &str = "gamma r 1.06";

    /// Extra params of the first fixture source.
    pub const ASSETS: &str = "tif";
    pub const NODATA: &str = "nan";
}

/// Scenario YAML with one source per template and the boreal base params.
///
/// Sources are named `source-0`, `source-1`, ... in template order. The
/// first source carries `assets`/`nodata` extra params.
pub fn scenario_yaml(templates: &[&str], zooms: &[u32]) -> String {
    let zooms = zooms
        .iter()
        .map(|z| z.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let mut yaml = format!(
        r#"name: fixture
description: Fixture scenario
group: fixture
focal_point:
  lng: {}
  lat: {}
viewport:
  width: 3
  height: 3
zooms: [{}]
base_params:
  bidx: {}
  rescale: "{}"
  colormap_name: {}
  color_formula: "{}"
sources:
"#,
        BOREAL_FOCAL_POINT.0,
        BOREAL_FOCAL_POINT.1,
        zooms,
        params::BIDX,
        params::RESCALE,
        params::COLORMAP_NAME,
        params::COLOR_FORMULA,
    );

    for (i, template) in templates.iter().enumerate() {
        yaml.push_str(&format!("  - name: source-{}\n    url: \"{}\"\n", i, template));
        if i == 0 {
            yaml.push_str(&format!(
                "    extra_params:\n      assets: {}\n      nodata: \"{}\"\n",
                params::ASSETS,
                params::NODATA
            ));
        }
    }
    yaml
}

/// Write `contents` to a temporary `.yaml` file.
///
/// The file is removed when the returned handle is dropped.
pub fn write_scenario(contents: &str) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}
