use std::collections::BTreeMap;

use eframe::egui::Color32;

use crate::color::{self, BinnedScale};
use crate::data::boundary::{BoundarySet, StateBoundary};
use crate::data::columns;
use crate::data::model::{CellValue, Column, ProviderTable};
use crate::error::{DataError, MapError};
use crate::geo::{self, LonLat};

pub const CHOROPLETH_LAYER: &str = "State Level Counts";

/// Leaflet-style circle styling shared by the overlay layers.
pub const CIRCLE_WEIGHT: f32 = 2.0;
pub const CIRCLE_FILL_OPACITY: f32 = 0.1;
pub const CHOROPLETH_LINE_OPACITY: f32 = 0.8;
pub const CHOROPLETH_FILL_OPACITY: f32 = 0.6;

// ---------------------------------------------------------------------------
// Layer configuration
// ---------------------------------------------------------------------------

/// How one point-overlay layer sizes and colours its circles.
#[derive(Debug, Clone, Copy)]
pub struct CircleLayerDef {
    pub name: &'static str,
    /// Column whose value, times `scale`, is the radius in metres.
    pub radius_column: &'static str,
    pub scale: f64,
    pub color: fn() -> Color32,
}

/// The three overlays, drawn in this order.
pub const CIRCLE_LAYERS: [CircleLayerDef; 3] = [
    CircleLayerDef {
        name: "#Claims",
        radius_column: columns::CLAIMS,
        scale: 100.0,
        color: color::blue,
    },
    CircleLayerDef {
        name: "Racial Diversity",
        radius_column: columns::NON_WHITE_PCT,
        scale: 1_000.0,
        color: color::red,
    },
    CircleLayerDef {
        name: "Extirpation",
        radius_column: columns::EXTIRPATION_PCT,
        scale: 10_000.0,
        color: color::green,
    },
];

// ---------------------------------------------------------------------------
// Map model
// ---------------------------------------------------------------------------

/// Popup text attached to every circle of a site.  Only the masked
/// metrics are shown; the raw percentages only drive the radius.
#[derive(Debug, Clone, PartialEq)]
pub struct SitePopup {
    pub site_name: String,
    pub npi: String,
    pub claims: String,
    pub racial_diversity: String,
    pub extirpation: String,
}

impl SitePopup {
    pub fn lines(&self) -> [String; 5] {
        [
            format!("Site Name - {}", self.site_name),
            format!("NPI - {}", self.npi),
            format!("Claims - {}", self.claims),
            format!("%Non-white - {}", self.racial_diversity),
            format!("%Extirpation - {}", self.extirpation),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Circle {
    pub center: LonLat,
    pub radius_m: f64,
    /// Index into [`ProviderMap::popups`].
    pub popup: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircleLayer {
    pub name: &'static str,
    pub color: Color32,
    pub circles: Vec<Circle>,
}

/// A state region and its aggregate, if the data has one for it.
#[derive(Debug, Clone)]
pub struct Region<'a> {
    pub boundary: &'a StateBoundary,
    pub value: Option<f64>,
}

/// State-level shading keyed by state name.
#[derive(Debug, Clone, PartialEq)]
pub struct Choropleth {
    pub name: &'static str,
    pub values: BTreeMap<String, f64>,
    pub scale: Option<BinnedScale>,
}

impl Choropleth {
    /// Fill colour for a region; `None` draws outline only.
    pub fn fill_for(&self, state: &str) -> Option<Color32> {
        let value = self.values.get(state)?;
        let scale = self.scale.as_ref()?;
        Some(color::with_opacity(
            scale.color_for(*value),
            CHOROPLETH_FILL_OPACITY,
        ))
    }

    /// Pair every boundary with its value.  Boundaries without data and
    /// data keys without a boundary are both tolerated.
    pub fn regions<'a>(&self, boundaries: &'a BoundarySet) -> Vec<Region<'a>> {
        boundaries
            .states
            .iter()
            .map(|boundary| Region {
                boundary,
                value: self.values.get(&boundary.name).copied(),
            })
            .collect()
    }

    /// Data keys the boundary source has no polygon for.
    pub fn unmatched_keys(&self, boundaries: &BoundarySet) -> Vec<String> {
        self.values
            .keys()
            .filter(|k| boundaries.get(k).is_none())
            .cloned()
            .collect()
    }
}

/// Everything the map panel draws.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderMap {
    pub choropleth: Choropleth,
    pub layers: Vec<CircleLayer>,
    pub popups: Vec<SitePopup>,
}

impl ProviderMap {
    /// Popup of the smallest visible circle under `point`.
    pub fn popup_at(&self, point: LonLat, visible: impl Fn(&str) -> bool) -> Option<&SitePopup> {
        self.layers
            .iter()
            .filter(|layer| visible(layer.name))
            .flat_map(|layer| layer.circles.iter())
            .filter(|c| geo::circle_contains(c.center, c.radius_m, point))
            .min_by(|a, b| a.radius_m.total_cmp(&b.radius_m))
            .and_then(|c| self.popups.get(c.popup))
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Build the choropleth and the three circle layers from `table`.
pub fn build_map(table: &ProviderTable) -> Result<ProviderMap, MapError> {
    let choropleth = build_choropleth(table)?;
    let centers = site_centers(table)?;
    let popups = site_popups(table)?;
    let layers = CIRCLE_LAYERS
        .iter()
        .map(|def| build_circle_layer(table, &centers, def))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ProviderMap {
        choropleth,
        layers,
        popups,
    })
}

/// State totals keyed by the full state name when the table carries one,
/// otherwise by the mailing-address state.
pub fn build_choropleth(table: &ProviderTable) -> Result<Choropleth, DataError> {
    let keys = table
        .column(columns::MAPPED_STATE_NAME)
        .map_or_else(|| table.require(columns::MAILING_STATE), Ok)?;
    let totals = table.require(columns::STATE_CLAIM_TOTAL)?;

    let mut values = BTreeMap::new();
    for (key, total) in keys.values.iter().zip(&totals.values) {
        if let (false, Some(t)) = (key.is_null(), total.as_f64()) {
            values.insert(key.to_string(), t);
        }
    }
    let scale = BinnedScale::yl_gn(values.values().copied());

    Ok(Choropleth {
        name: CHOROPLETH_LAYER,
        values,
        scale,
    })
}

/// One circle per record.  A missing radius value draws a zero-radius
/// circle; the record is never skipped.
pub fn build_circle_layer(
    table: &ProviderTable,
    centers: &[LonLat],
    def: &CircleLayerDef,
) -> Result<CircleLayer, MapError> {
    let radii = table.require(def.radius_column)?;
    let circles = centers
        .iter()
        .zip(&radii.values)
        .enumerate()
        .map(|(row, (center, value))| Circle {
            center: *center,
            radius_m: value.as_f64().unwrap_or(0.0) * def.scale,
            popup: row,
        })
        .collect();

    Ok(CircleLayer {
        name: def.name,
        color: (def.color)(),
        circles,
    })
}

/// `[lon, lat]` of every record; a missing coordinate aborts the build.
pub fn site_centers(table: &ProviderTable) -> Result<Vec<LonLat>, MapError> {
    let lat = table.require(columns::LATITUDE)?;
    let lon = table.require(columns::LONGITUDE)?;
    (0..table.len())
        .map(|row| Ok([coordinate(lon, row)?, coordinate(lat, row)?]))
        .collect()
}

fn coordinate(column: &Column, row: usize) -> Result<f64, MapError> {
    column.values[row]
        .as_f64()
        .ok_or_else(|| MapError::MissingCoordinate {
            row,
            column: column.name.clone(),
        })
}

pub fn site_popups(table: &ProviderTable) -> Result<Vec<SitePopup>, DataError> {
    let name = table.require(columns::ORG_NAME)?;
    let npi = table.require(columns::NPI)?;
    let claims = table.require(columns::CLAIMS)?;
    let diversity = table.require(columns::MASKED_RACIAL_DIVERSITY)?;
    let extirpation = table.require(columns::MASKED_EXTIRPATION)?;
    let cell = |c: &Column, row: usize| display(&c.values[row]);

    Ok((0..table.len())
        .map(|row| SitePopup {
            site_name: cell(name, row),
            npi: cell(npi, row),
            claims: cell(claims, row),
            racial_diversity: cell(diversity, row),
            extirpation: cell(extirpation, row),
        })
        .collect())
}

fn display(value: &CellValue) -> String {
    match value {
        CellValue::Null => "-".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::boundary::parse_boundaries;
    use crate::data::loader::load_csv_reader;

    const CSV: &str = "\
ORG_NPI_NUM,ZIP_CODE,Claims,Provider Organization Name (Legal Business Name),Provider Business Mailing Address State Name,Mapped_State_Name,Final_Latitude,Final_Longitude,% non-white,Masked Racial Diversity,% treated with extirpation,Masked Extirpation
1001,43210,150,Buckeye Dental,OH,Ohio,40.0,-83.0,0.25,20-30%,0.05,<10%
1002,44101,50,Lake Clinic,OH,Ohio,41.5,-81.7,,10-20%,0.01,<10%
1003,90001,300,Coast Care,CA,California,34.0,-118.2,0.6,50-60%,0.2,10-20%
";

    const BOUNDARIES: &str = r#"{"type": "FeatureCollection", "features": [
        {"type": "Feature", "properties": {"name": "Ohio"},
         "geometry": {"type": "Polygon", "coordinates": [[[-84.8, 38.4], [-80.5, 38.4], [-80.5, 42.0], [-84.8, 42.0]]]}},
        {"type": "Feature", "properties": {"name": "Texas"},
         "geometry": {"type": "Polygon", "coordinates": [[[-106, 26], [-94, 26], [-94, 36], [-106, 36]]]}}
    ]}"#;

    fn table() -> ProviderTable {
        load_csv_reader(CSV.as_bytes()).unwrap()
    }

    #[test]
    fn three_layers_with_scaled_radii() {
        let map = build_map(&table()).unwrap();
        let names: Vec<_> = map.layers.iter().map(|l| l.name).collect();
        assert_eq!(names, vec!["#Claims", "Racial Diversity", "Extirpation"]);

        let claims = &map.layers[0];
        assert_eq!(claims.circles.len(), 3);
        assert_eq!(claims.circles[0].radius_m, 15_000.0);
        assert_eq!(claims.circles[0].center, [-83.0, 40.0]);
        assert_eq!(claims.color, color::blue());

        assert_eq!(map.layers[1].circles[0].radius_m, 250.0);
        // Missing percentage: zero-radius circle, not a skipped record.
        assert_eq!(map.layers[1].circles[1].radius_m, 0.0);
        assert!((map.layers[2].circles[2].radius_m - 2_000.0).abs() < 1e-9);
    }

    #[test]
    fn popups_show_masked_metrics_only() {
        let map = build_map(&table()).unwrap();
        let lines = map.popups[0].lines();
        assert_eq!(lines[0], "Site Name - Buckeye Dental");
        assert_eq!(lines[1], "NPI - 1001");
        assert_eq!(lines[2], "Claims - 150.0");
        assert_eq!(lines[3], "%Non-white - 20-30%");
        assert_eq!(lines[4], "%Extirpation - <10%");
    }

    #[test]
    fn choropleth_tolerates_key_mismatches() {
        let map = build_map(&table()).unwrap();
        let boundaries = parse_boundaries(BOUNDARIES).unwrap();
        let chor = &map.choropleth;

        assert_eq!(chor.values.get("Ohio"), Some(&200.0));
        assert_eq!(chor.values.get("California"), Some(&300.0));
        assert!(chor.fill_for("Ohio").is_some());
        assert!(chor.fill_for("Texas").is_none());
        assert_eq!(chor.unmatched_keys(&boundaries), vec!["California".to_string()]);

        let regions = chor.regions(&boundaries);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[1].value, None);
    }

    #[test]
    fn choropleth_falls_back_to_mailing_state() {
        let t = table()
            .select(&[columns::MAILING_STATE, columns::STATE_CLAIM_TOTAL])
            .unwrap();
        let chor = build_choropleth(&t).unwrap();
        assert_eq!(chor.values.get("OH"), Some(&200.0));
        assert_eq!(chor.values.get("CA"), Some(&300.0));
    }

    #[test]
    fn missing_coordinate_aborts_the_map() {
        let csv = CSV.replace("41.5,-81.7", ",-81.7");
        let t = load_csv_reader(csv.as_bytes()).unwrap();
        assert!(matches!(
            build_map(&t),
            Err(MapError::MissingCoordinate { row: 1, .. })
        ));
    }

    #[test]
    fn clicks_pick_the_smallest_visible_circle() {
        let map = build_map(&table()).unwrap();
        let all = |_: &str| true;
        let popup = map.popup_at([-83.0, 40.0], all).unwrap();
        assert_eq!(popup.site_name, "Buckeye Dental");

        let none = |_: &str| false;
        assert!(map.popup_at([-83.0, 40.0], none).is_none());
        assert!(map.popup_at([0.0, 0.0], all).is_none());
    }
}
