//! Area-based field mappings
//!
//! Built from area reference features of one [`AreaType`]. Each feature's id
//! and name resolve to the feature, and its polygon geometry answers
//! point-in-polygon lookups for records that carry coordinates but no area
//! code.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use super::AreaType;

/// GeoJSON-shaped polygon geometry in WGS84 (`[lon, lat]` positions)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    /// Outer ring followed by holes
    Polygon(Vec<Vec<[f64; 2]>>),
    MultiPolygon(Vec<Vec<Vec<[f64; 2]>>>),
}

impl Geometry {
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        match self {
            Geometry::Polygon(rings) => polygon_contains(rings, lon, lat),
            Geometry::MultiPolygon(polygons) => {
                polygons.iter().any(|rings| polygon_contains(rings, lon, lat))
            }
        }
    }
}

fn polygon_contains(rings: &[Vec<[f64; 2]>], lon: f64, lat: f64) -> bool {
    match rings.split_first() {
        Some((outer, holes)) => {
            ring_contains(outer, lon, lat) && !holes.iter().any(|h| ring_contains(h, lon, lat))
        }
        None => false,
    }
}

/// Even-odd ray casting
fn ring_contains(ring: &[[f64; 2]], lon: f64, lat: f64) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// One area reference feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaFeature {
    pub feature_id: String,
    pub name: String,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

/// Feature lookup for one area type
#[derive(Debug, Clone)]
pub struct AreaMapping {
    area_type: AreaType,
    features: BTreeMap<String, AreaFeature>,
    /// Lowercased feature id or name -> feature id
    by_code: HashMap<String, String>,
}

impl AreaMapping {
    pub fn build(area_type: AreaType, features: impl IntoIterator<Item = AreaFeature>) -> Self {
        let mut by_id: BTreeMap<String, AreaFeature> = BTreeMap::new();
        for mut feature in features {
            let id = feature.feature_id.trim().to_string();
            feature.feature_id.clone_from(&id);
            feature.name = feature.name.trim().to_string();
            if by_id.insert(id.clone(), feature).is_some() {
                warn!(area_type = %area_type, feature_id = %id, "Duplicate area feature, keeping the later one");
            }
        }

        let mut by_code = HashMap::with_capacity(by_id.len() * 2);
        // Names first so an id always wins over a name that happens to look like one
        for (id, feature) in &by_id {
            by_code.insert(feature.name.to_lowercase(), id.clone());
        }
        for id in by_id.keys() {
            by_code.insert(id.to_lowercase(), id.clone());
        }

        Self {
            area_type,
            features: by_id,
            by_code,
        }
    }

    pub fn area_type(&self) -> AreaType {
        self.area_type
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, feature_id: &str) -> Option<&AreaFeature> {
        self.features.get(feature_id)
    }

    /// Look up a feature by id or name, case-insensitively
    pub fn lookup(&self, code: &str) -> Option<&AreaFeature> {
        self.by_code
            .get(&code.trim().to_lowercase())
            .and_then(|id| self.features.get(id))
    }

    /// First feature (in id order) whose geometry contains the point
    pub fn locate(&self, lon: f64, lat: f64) -> Option<&AreaFeature> {
        self.features.values().find(|f| {
            f.geometry
                .as_ref()
                .is_some_and(|geometry| geometry.contains(lon, lat))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Geometry {
        Geometry::Polygon(vec![vec![
            [x0, y0],
            [x0 + size, y0],
            [x0 + size, y0 + size],
            [x0, y0 + size],
            [x0, y0],
        ]])
    }

    #[test]
    fn test_polygon_with_hole() {
        let geometry = Geometry::Polygon(vec![
            vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
            vec![[4.0, 4.0], [6.0, 4.0], [6.0, 6.0], [4.0, 6.0], [4.0, 4.0]],
        ]);
        assert!(geometry.contains(1.0, 1.0));
        assert!(!geometry.contains(5.0, 5.0));
        assert!(!geometry.contains(11.0, 5.0));
    }

    #[test]
    fn test_lookup_and_locate() {
        let mapping = AreaMapping::build(
            AreaType::County,
            vec![
                AreaFeature {
                    feature_id: "1".to_string(),
                    name: "Stockholm".to_string(),
                    geometry: Some(square(17.0, 59.0, 2.0)),
                },
                AreaFeature {
                    feature_id: "3".to_string(),
                    name: "Uppsala".to_string(),
                    geometry: Some(square(17.0, 59.5, 2.0)),
                },
            ],
        );

        assert_eq!(mapping.lookup(" stockholm ").unwrap().feature_id, "1");
        assert_eq!(mapping.lookup("3").unwrap().name, "Uppsala");
        assert!(mapping.lookup("Skåne").is_none());

        // Overlap goes to the lowest feature id
        assert_eq!(mapping.locate(18.0, 59.8).unwrap().feature_id, "1");
        assert_eq!(mapping.locate(18.0, 61.0).unwrap().feature_id, "3");
        assert!(mapping.locate(10.0, 50.0).is_none());
    }

    #[test]
    fn test_padded_ids_are_stored_trimmed() {
        let mapping = AreaMapping::build(
            AreaType::Municipality,
            vec![AreaFeature {
                feature_id: " 0180 ".to_string(),
                name: " Stockholm ".to_string(),
                geometry: None,
            }],
        );

        let feature = mapping.lookup("0180").unwrap();
        assert_eq!(feature.feature_id, "0180");
        assert_eq!(feature.name, "Stockholm");
        assert_eq!(mapping.get("0180").map(|f| f.feature_id.as_str()), Some("0180"));
        assert_eq!(mapping.lookup("stockholm").unwrap().feature_id, "0180");
    }

    #[test]
    fn test_geometry_deserializes_from_geojson() {
        let json = r#"{"featureId":"25","name":"Norrbotten","geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}}"#;
        let feature: AreaFeature = serde_json::from_str(json).unwrap();
        assert!(matches!(feature.geometry, Some(Geometry::Polygon(_))));
    }
}
