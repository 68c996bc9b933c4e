use std::path::Path;

use anyhow::{Context, Result, bail};
use geojson::{GeoJson, Position, Value};

use crate::geo::{self, LonLat};

// ---------------------------------------------------------------------------
// Boundaries
// ---------------------------------------------------------------------------

/// One polygon of a state: outer ring plus its fill triangles.
#[derive(Debug, Clone)]
pub struct Polygon {
    pub ring: Vec<LonLat>,
    pub triangles: Vec<[LonLat; 3]>,
}

/// A state outline keyed by its `name` property.
#[derive(Debug, Clone)]
pub struct StateBoundary {
    pub name: String,
    pub polygons: Vec<Polygon>,
}

impl StateBoundary {
    pub fn contains(&self, point: LonLat) -> bool {
        self.polygons.iter().any(|p| geo::ring_contains(&p.ring, point))
    }
}

/// The state polygon collection the choropleth is drawn over.
#[derive(Debug, Clone, Default)]
pub struct BoundarySet {
    pub states: Vec<StateBoundary>,
}

impl BoundarySet {
    pub fn get(&self, name: &str) -> Option<&StateBoundary> {
        self.states.iter().find(|s| s.name == name)
    }

    /// State under a map position, for the hover tooltip.
    pub fn locate(&self, point: LonLat) -> Option<&StateBoundary> {
        self.states.iter().find(|s| s.contains(point))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }
}

/// Load state boundaries from a GeoJSON file.
pub fn load_boundaries(path: &Path) -> Result<BoundarySet> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let set = parse_boundaries(&text).with_context(|| format!("parsing {}", path.display()))?;
    log::info!(
        "Loaded {} state boundaries from {}",
        set.len(),
        path.display()
    );
    Ok(set)
}

/// Parse a GeoJSON `FeatureCollection` (or a single `Feature`).  Features
/// without a string `name` property or with a geometry other than
/// (Multi)Polygon are skipped.
pub fn parse_boundaries(text: &str) -> Result<BoundarySet> {
    let geojson: GeoJson = text.parse().context("parsing GeoJSON")?;
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => bail!("Expected a FeatureCollection, got a bare geometry"),
    };

    let mut states = Vec::new();
    for (i, feature) in features.into_iter().enumerate() {
        let Some(name) = feature.property("name").and_then(|v| v.as_str()) else {
            log::debug!("Feature {i} has no name property, skipped");
            continue;
        };

        let outer_rings: Vec<&Vec<Position>> = match feature.geometry.as_ref().map(|g| &g.value) {
            Some(Value::Polygon(rings)) => rings.iter().take(1).collect(),
            Some(Value::MultiPolygon(polygons)) => {
                polygons.iter().filter_map(|rings| rings.first()).collect()
            }
            _ => {
                log::debug!("Feature '{name}' has no polygon geometry, skipped");
                continue;
            }
        };

        let polygons = outer_rings
            .into_iter()
            .map(|raw| to_ring(raw).with_context(|| format!("feature '{name}'")))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .map(|ring| Polygon {
                triangles: geo::triangulate(&ring),
                ring,
            })
            .collect();

        states.push(StateBoundary {
            name: name.to_string(),
            polygons,
        });
    }

    Ok(BoundarySet { states })
}

/// Positions may carry an altitude; only longitude and latitude are kept.
fn to_ring(raw: &[Position]) -> Result<Vec<LonLat>> {
    raw.iter()
        .enumerate()
        .map(|(j, pos)| match pos.as_slice() {
            [lon, lat, ..] => Ok([*lon, *lat]),
            _ => bail!("position {j} has fewer than two coordinates"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "Ohio"},
             "geometry": {"type": "Polygon",
                          "coordinates": [[[-84.8, 38.4], [-80.5, 38.4], [-80.5, 42.0], [-84.8, 42.0], [-84.8, 38.4]]]}},
            {"type": "Feature", "properties": {"name": "Hawaii"},
             "geometry": {"type": "MultiPolygon",
                          "coordinates": [[[[-156, 19, 0], [-155, 19, 0], [-155, 20, 0]]],
                                          [[[-158, 21], [-157, 21], [-157, 22]]]]}},
            {"type": "Feature", "properties": {"name": "Nowhere"},
             "geometry": {"type": "Point", "coordinates": [0, 0]}},
            {"type": "Feature", "properties": {},
             "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1]]]}}
        ]
    }"#;

    #[test]
    fn polygons_and_multipolygons_are_kept() {
        let set = parse_boundaries(SAMPLE).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("Ohio").unwrap().polygons[0].triangles.len(), 2);
        assert_eq!(set.get("Hawaii").unwrap().polygons.len(), 2);
        assert!(set.get("Nowhere").is_none());
    }

    #[test]
    fn single_feature_is_accepted() {
        let set = parse_boundaries(
            r#"{"type": "Feature", "properties": {"name": "Ohio"},
                "geometry": {"type": "Polygon",
                             "coordinates": [[[-84.8, 38.4], [-80.5, 38.4], [-80.5, 42.0], [-84.8, 38.4]]]}}"#,
        )
        .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.states[0].polygons[0].ring.len(), 4);
    }

    #[test]
    fn locate_finds_the_enclosing_state() {
        let set = parse_boundaries(SAMPLE).unwrap();
        assert_eq!(set.locate([-82.9, 40.0]).map(|s| s.name.as_str()), Some("Ohio"));
        assert!(set.locate([-100.0, 40.0]).is_none());
    }

    #[test]
    fn non_collections_are_rejected() {
        assert!(parse_boundaries(r#"{"type": "Point", "coordinates": [0, 0]}"#).is_err());
        assert!(parse_boundaries("not json").is_err());
    }
}
