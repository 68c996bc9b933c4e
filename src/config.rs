use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Dashboard settings.  Every field has a default, so a config file only
/// needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub title: String,
    pub subtitle: String,
    /// Provider claims extract (`.csv` or `.parquet`).
    pub data_path: PathBuf,
    /// GeoJSON state boundaries keyed by a `name` property.
    pub boundaries_path: PathBuf,
    /// Initial map centre as `[latitude, longitude]`.
    pub map_center: [f64; 2],
    /// Initial zoom, slippy-map convention (0 shows the whole world).
    pub zoom_start: u8,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            title: "Patient Density Report".to_string(),
            subtitle: "Source : CMS LDS Data".to_string(),
            data_path: PathBuf::from("Sample_Data_RMap_07022023.csv"),
            boundaries_path: PathBuf::from("us-state-boundaries.geojson"),
            map_center: [38.0, -90.0],
            zoom_start: 3,
        }
    }
}

impl DashboardConfig {
    /// Read a JSON config file; `None` gives the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Longitude/latitude span shown at `zoom_start` in a view `width_px`
    /// wide, using 256-pixel web-map tiles.
    pub fn initial_span(&self, width_px: f32, height_px: f32) -> [f64; 2] {
        let world_px = 256.0 * 2f64.powi(i32::from(self.zoom_start));
        let lon_span = 360.0 * f64::from(width_px) / world_px;
        let lat_span = lon_span * f64::from(height_px) / f64::from(width_px.max(1.0));
        [lon_span, lat_span]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg = DashboardConfig::from_json(r#"{"data_path": "claims.parquet", "zoom_start": 4}"#)
            .unwrap();
        assert_eq!(cfg.data_path, PathBuf::from("claims.parquet"));
        assert_eq!(cfg.zoom_start, 4);
        assert_eq!(cfg.title, "Patient Density Report");
        assert_eq!(cfg.map_center, [38.0, -90.0]);
    }

    #[test]
    fn no_path_means_defaults() {
        assert_eq!(DashboardConfig::load(None).unwrap(), DashboardConfig::default());
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(DashboardConfig::from_json(r#"{"zoom_start": "far"}"#).is_err());
    }

    #[test]
    fn zoom_three_spans_about_140_degrees_at_800_px() {
        let [lon, lat] = DashboardConfig::default().initial_span(800.0, 500.0);
        assert!((lon - 140.625).abs() < 1e-9);
        assert!((lat - 87.890625).abs() < 1e-9);
    }
}
