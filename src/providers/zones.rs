//! Authoritative flood-zone polygons (e.g. published flood-extent layers).
//!
//! Reads the subset of GeoJSON we need: a `FeatureCollection` of `Polygon`
//! features whose properties carry `source` and `risk`. Only the outer ring
//! of each polygon is used.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::{GroundTruthZoneProvider, ZoneCheck};

#[derive(Debug, Clone, PartialEq)]
pub struct FloodZone {
    /// Outer ring as `(lon, lat)` vertices.
    pub ring: Vec<(f64, f64)>,
    pub source: String,
    pub risk: String,
}

impl FloodZone {
    /// Ray-casting point-in-polygon test.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let ring = &self.ring;
        if ring.len() < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = ring.len() - 1;
        for i in 0..ring.len() {
            let (xi, yi) = ring[i];
            let (xj, yj) = ring[j];
            if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Properties,
    geometry: Geometry,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    risk: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    coordinates: Vec<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, Default)]
pub struct PolygonZoneProvider {
    zones: Vec<FloodZone>,
}

impl PolygonZoneProvider {
    pub fn new(zones: Vec<FloodZone>) -> Self {
        Self { zones }
    }

    /// Demo extent around Cuttack on the Mahanadi.
    pub fn builtin() -> Self {
        Self::new(vec![FloodZone {
            ring: vec![
                (85.80, 20.45),
                (85.95, 20.45),
                (85.95, 20.55),
                (85.80, 20.55),
                (85.80, 20.45),
            ],
            source: "Bhuvan-2024".to_string(),
            risk: "High".to_string(),
        }])
    }

    pub fn from_geojson_str(s: &str) -> Result<Self> {
        let fc: FeatureCollection = serde_json::from_str(s).context("parsing flood zone geojson")?;
        let mut zones = Vec::with_capacity(fc.features.len());
        for f in fc.features {
            if f.geometry.kind != "Polygon" {
                bail!("unsupported geometry type: {}", f.geometry.kind);
            }
            let Some(outer) = f.geometry.coordinates.into_iter().next() else {
                continue;
            };
            zones.push(FloodZone {
                ring: outer.into_iter().map(|[lon, lat]| (lon, lat)).collect(),
                source: f.properties.source.unwrap_or_else(|| "unknown".into()),
                risk: f.properties.risk.unwrap_or_else(|| "unknown".into()),
            });
        }
        Ok(Self::new(zones))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading flood zones from {}", path.display()))?;
        Self::from_geojson_str(&content)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn lookup(&self, lat: f64, lon: f64) -> ZoneCheck {
        self.zones
            .iter()
            .find(|z| z.contains(lat, lon))
            .map(|z| ZoneCheck {
                in_flood_zone: true,
                source: Some(z.source.clone()),
                risk_level: Some(z.risk.clone()),
            })
            .unwrap_or_else(ZoneCheck::outside)
    }
}

#[async_trait]
impl GroundTruthZoneProvider for PolygonZoneProvider {
    async fn check(&self, lat: f64, lon: f64) -> Result<ZoneCheck> {
        Ok(self.lookup(lat, lon))
    }

    fn name(&self) -> &'static str {
        "polygon-zones"
    }
}
