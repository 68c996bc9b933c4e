use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::DashboardConfig;
use crate::data::boundary::{self, BoundarySet};
use crate::data::filter::{ColumnControl, FilterState, Selection, apply_filters};
use crate::data::loader;
use crate::data::model::ProviderTable;
use crate::report::map::{ProviderMap, SitePopup, build_map};
use crate::report::metrics::SummaryMetrics;
use crate::report::table::detail_table;

// ---------------------------------------------------------------------------
// Render pass
// ---------------------------------------------------------------------------

/// Everything one pass over the current widget state produces.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub record_count: usize,
    pub metrics: SummaryMetrics,
    pub map: ProviderMap,
    pub detail: ProviderTable,
    /// Columns the viewer may pick to filter on (empty while disabled).
    pub filter_columns: Vec<String>,
    pub controls: Vec<ColumnControl>,
}

/// Filter `source`, then derive metrics, map and detail table.  Any failure
/// aborts the whole pass.
pub fn render_pass(source: &ProviderTable, filters: &FilterState) -> Result<Snapshot> {
    let outcome = apply_filters(source, filters).context("applying filters")?;
    let table = outcome.table;
    let metrics = SummaryMetrics::compute(&table).context("computing metrics")?;
    let map = build_map(&table).context("building map")?;
    let detail = detail_table(&table).context("building detail table")?;

    log::debug!(
        "Render pass: {} of {} records, {} claims",
        table.len(),
        source.len(),
        metrics.claims_label()
    );

    Ok(Snapshot {
        record_count: table.len(),
        metrics,
        map,
        detail,
        filter_columns: outcome.available_columns,
        controls: outcome.controls,
    })
}

// ---------------------------------------------------------------------------
// Layer visibility
// ---------------------------------------------------------------------------

/// Which named map layers are switched off.  Everything starts visible.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerVisibility {
    hidden: BTreeSet<String>,
}

impl LayerVisibility {
    pub fn is_visible(&self, layer: &str) -> bool {
        !self.hidden.contains(layer)
    }

    pub fn set_visible(&mut self, layer: &str, visible: bool) {
        if visible {
            self.hidden.remove(layer);
        } else {
            self.hidden.insert(layer.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: DashboardConfig,

    /// File the current table came from.
    pub data_path: PathBuf,

    /// Full record set (None until a file loads).
    pub source: Option<ProviderTable>,

    /// State polygons for the choropleth (None if unavailable).
    pub boundaries: Option<BoundarySet>,

    /// Viewer's filter widgets.
    pub filters: FilterState,

    /// Result of the latest successful pass.
    pub snapshot: Option<Snapshot>,

    pub layers: LayerVisibility,

    /// Popup of the last clicked circle.
    pub popup: Option<SitePopup>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Ask the map view to return to the configured centre and zoom.
    pub reset_view: bool,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            data_path: config.data_path.clone(),
            config,
            source: None,
            boundaries: None,
            filters: FilterState::default(),
            snapshot: None,
            layers: LayerVisibility::default(),
            popup: None,
            status_message: None,
            reset_view: true,
        }
    }

    /// Load the configured data and boundary files.
    pub fn load_configured(&mut self) {
        self.load_boundaries(self.config.boundaries_path.clone());
        self.load_data(self.config.data_path.clone());
    }

    pub fn load_data(&mut self, path: PathBuf) {
        self.data_path = path;
        match loader::load_file(&self.data_path) {
            Ok(table) => self.set_dataset(table),
            Err(e) => {
                log::error!("Failed to load {}: {e:#}", self.data_path.display());
                self.source = None;
                self.snapshot = None;
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Re-read the current file from scratch.
    pub fn reload(&mut self) {
        self.load_data(self.data_path.clone());
    }

    pub fn load_boundaries(&mut self, path: PathBuf) {
        match boundary::load_boundaries(&path) {
            Ok(set) => self.boundaries = Some(set),
            Err(e) => {
                log::error!("Failed to load boundaries: {e:#}");
                self.boundaries = None;
                self.status_message = Some(format!("Boundaries unavailable: {e:#}"));
            }
        }
    }

    /// Ingest a newly loaded table, resetting filters and recomputing.
    pub fn set_dataset(&mut self, table: ProviderTable) {
        self.filters = FilterState::default();
        self.popup = None;
        self.source = Some(table);
        self.status_message = None;
        self.refresh();
    }

    /// Recompute the snapshot from the full record set.
    pub fn refresh(&mut self) {
        let Some(source) = &self.source else {
            return;
        };
        match render_pass(source, &self.filters) {
            Ok(snapshot) => {
                if let Some(boundaries) = &self.boundaries {
                    for key in snapshot.map.choropleth.unmatched_keys(boundaries) {
                        log::warn!("No boundary for choropleth key '{key}'");
                    }
                }
                self.snapshot = Some(snapshot);
                if self
                    .status_message
                    .as_deref()
                    .is_some_and(|m| m.starts_with("Error"))
                {
                    self.status_message = None;
                }
            }
            Err(e) => {
                log::error!("Render pass aborted: {e:#}");
                self.snapshot = None;
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    pub fn set_filters_enabled(&mut self, enabled: bool) {
        self.filters.enabled = enabled;
        self.refresh();
    }

    pub fn toggle_filter_column(&mut self, column: &str) {
        self.filters.toggle_column(column);
        self.refresh();
    }

    pub fn set_selection(&mut self, column: &str, selection: Selection) {
        self.filters.set_selection(column, selection);
        self.refresh();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::columns;
    use crate::data::loader::load_csv_reader;
    use crate::data::model::CellValue;

    const CSV: &str = "\
ORG_NPI_NUM,ZIP_CODE,Claims,Provider Organization Name (Legal Business Name),Provider First Line Business Practice Location Address,Provider Business Mailing Address City Name,Provider Business Mailing Address State Name,Final_Latitude,Final_Longitude,% non-white,Masked Racial Diversity,% treated with extirpation,Masked Extirpation
1001,43210,150,Buckeye Dental,1 High St,Columbus,OH,40.0,-83.0,0.25,20-30%,0.05,<10%
1002,44101,50,Lake Clinic,2 Lake Ave,Cleveland,OH,41.5,-81.7,0.4,40-50%,0.01,<10%
1003,90001,300,Coast Care,3 Ocean Blvd,Los Angeles,CA,34.0,-118.2,0.6,50-60%,0.2,10-20%
";

    fn source() -> ProviderTable {
        load_csv_reader(CSV.as_bytes()).unwrap()
    }

    fn state_totals(table: &ProviderTable) -> Vec<CellValue> {
        table.column(columns::STATE_CLAIM_TOTAL).unwrap().values.clone()
    }

    #[test]
    fn end_to_end_without_filters() {
        let table = source();
        assert_eq!(
            state_totals(&table),
            vec![
                CellValue::Float(200.0),
                CellValue::Float(200.0),
                CellValue::Float(300.0)
            ]
        );

        let snapshot = render_pass(&table, &FilterState::default()).unwrap();
        assert_eq!(snapshot.metrics.total_claims, 500.0);
        assert_eq!(snapshot.metrics.facility_count, 3);
        assert_eq!(snapshot.metrics.claims_label(), "500.0");
        assert_eq!(snapshot.detail.len(), 3);
        assert!(snapshot.filter_columns.is_empty());
    }

    #[test]
    fn end_to_end_with_threshold() {
        let filters = FilterState {
            enabled: true,
            ..FilterState::default()
        };
        let snapshot = render_pass(&source(), &filters).unwrap();
        assert_eq!(snapshot.metrics.total_claims, 450.0);
        assert_eq!(snapshot.record_count, 2);
        // The aggregate is computed before filtering and not recomputed.
        assert_eq!(snapshot.map.choropleth.values.get("OH"), Some(&200.0));
        assert!(snapshot.filter_columns.contains(&columns::CLAIMS.to_string()));
    }

    #[test]
    fn failed_pass_clears_the_snapshot_and_reports() {
        let mut state = AppState::new(DashboardConfig::default());
        state.set_dataset(source());
        assert!(state.snapshot.is_some());

        state.filters.enabled = true;
        state.toggle_filter_column("Provider Phone Number");
        assert!(state.snapshot.is_none());
        assert!(state.status_message.as_deref().unwrap().starts_with("Error"));

        state.toggle_filter_column("Provider Phone Number");
        assert!(state.snapshot.is_some());
        assert!(state.status_message.is_none());
    }

    #[test]
    fn new_dataset_resets_filters() {
        let mut state = AppState::new(DashboardConfig::default());
        state.set_dataset(source());
        state.set_filters_enabled(true);
        state.toggle_filter_column(columns::CLAIMS);
        state.set_dataset(source());
        assert!(!state.filters.enabled);
        assert!(state.filters.columns.is_empty());
    }

    #[test]
    fn layers_toggle_independently() {
        let mut layers = LayerVisibility::default();
        assert!(layers.is_visible("#Claims"));
        layers.set_visible("#Claims", false);
        assert!(!layers.is_visible("#Claims"));
        assert!(layers.is_visible("Extirpation"));
        layers.set_visible("#Claims", true);
        assert!(layers.is_visible("#Claims"));
    }
}
