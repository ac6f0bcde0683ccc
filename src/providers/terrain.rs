use anyhow::Result;
use async_trait::async_trait;

use super::TerrainFeatureProvider;
use crate::report::FeatureSet;

/// Serves one feature set for every location. Raster sampling lives outside
/// this crate; this covers deployments without rasters and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedTerrainProvider {
    features: FeatureSet,
}

impl FixedTerrainProvider {
    pub fn new(features: FeatureSet) -> Self {
        Self { features }
    }

    /// Neutral defaults everywhere (HAND 5 m, slope 2°, no local relief).
    pub fn neutral() -> Self {
        Self::new(FeatureSet::neutral())
    }
}

#[async_trait]
impl TerrainFeatureProvider for FixedTerrainProvider {
    async fn get(&self, _lat: f64, _lon: f64) -> Result<FeatureSet> {
        Ok(self.features)
    }

    fn name(&self) -> &'static str {
        "fixed-terrain"
    }
}
