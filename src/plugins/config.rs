// Vegetation configuration (RON) loading & validation.
use std::f64::consts::PI;

use bevy::prelude::*;
use serde::Deserialize;
#[cfg(not(target_arch = "wasm32"))]
use std::fs;

use crate::error::{Result, VegetationError};
use crate::plugins::foliage::FoliageParams;
use crate::plugins::grass::SectorPolicy;
use crate::plugins::radial_field::{
    ExclusionWedge, FieldParams, RadialBias, GRASS_EXCLUSION_RADIUS_FRACTION,
    TREE_EXCLUSION_RADIUS_FRACTION,
};
use crate::plugins::shading::ShadingConfig;

pub const CONFIG_PATH: &str = "assets/vegetation.ron";

/// Upper bounds that keep construction cost bounded.
pub const MAX_GRASS_COUNT: usize = 250_000;
pub const MAX_TREE_COUNT: usize = 20_000;
pub const MAX_VARIANTS: usize = 16;
pub const MAX_SECTORS: usize = 64;

/// Everything `build_vegetation` needs. Missing RON fields fall back to `Default`.
#[derive(Resource, Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VegetationConfig {
    pub grass: FieldParams,
    pub trees: FieldParams,
    pub variant_count: usize,
    pub sector_count: usize,
    pub lod: SectorPolicy,
    pub foliage: FoliageParams,
    pub shading: ShadingConfig,
}

impl Default for VegetationConfig {
    fn default() -> Self {
        Self::for_world(20.0)
    }
}

impl VegetationConfig {
    /// Radii derived from the play-area size: trees in `1.1..1.9 × size`, grass in
    /// `1.05..1.95 × size`, both with the path wedge at `[π/8, 3π/8)`.
    pub fn for_world(size: f64) -> Self {
        let wedge = |radius_fraction| ExclusionWedge {
            start: PI / 8.0,
            end: PI * 3.0 / 8.0,
            radius_fraction,
        };
        Self {
            grass: FieldParams {
                count: 12_000,
                inner_radius: size * 1.05,
                outer_radius: size * 1.95,
                exclusion: Some(wedge(GRASS_EXCLUSION_RADIUS_FRACTION)),
                bias: RadialBias::Uniform,
            },
            trees: FieldParams {
                count: 160,
                inner_radius: size * 1.1,
                outer_radius: size * 1.9,
                exclusion: Some(wedge(TREE_EXCLUSION_RADIUS_FRACTION)),
                bias: RadialBias::CUBIC,
            },
            variant_count: 4,
            sector_count: 6,
            lod: SectorPolicy::default(),
            foliage: FoliageParams::default(),
            shading: ShadingConfig::default(),
        }
    }

    /// Fail fast on anything that would produce degenerate output.
    pub fn validate(&self) -> Result<()> {
        self.grass.validate("grass")?;
        self.trees.validate("trees")?;
        if self.grass.count > MAX_GRASS_COUNT {
            return Err(VegetationError::invalid("grass.count", self.grass.count, "too many grass instances"));
        }
        if self.trees.count > MAX_TREE_COUNT {
            return Err(VegetationError::invalid("trees.count", self.trees.count, "too many tree instances"));
        }
        if self.variant_count == 0 || self.variant_count > MAX_VARIANTS {
            return Err(VegetationError::invalid(
                "variant_count",
                self.variant_count,
                "must be in 1..=16",
            ));
        }
        if self.sector_count == 0 || self.sector_count > MAX_SECTORS {
            return Err(VegetationError::invalid(
                "sector_count",
                self.sector_count,
                "must be in 1..=64",
            ));
        }
        self.lod.validate()?;
        self.foliage.validate()?;
        self.shading.validate()?;
        Ok(())
    }
}

/// Parse and validate a RON document.
pub fn parse_config(data: &str) -> Result<VegetationConfig> {
    let cfg: VegetationConfig =
        ron::from_str(data).map_err(|e| VegetationError::Parse(e.to_string()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// PreStartup: insert `VegetationConfig` from disk unless one was inserted already.
pub(crate) fn load_vegetation_config(mut commands: Commands, existing: Option<Res<VegetationConfig>>) {
    if existing.is_some() {
        return;
    }

    #[cfg(target_arch = "wasm32")]
    {
        // No filesystem in the browser; embed at compile time.
        let data = include_str!("../../assets/vegetation.ron");
        commands.insert_resource(parse_or_default(data, "embedded vegetation.ron"));
        return;
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        match fs::read_to_string(CONFIG_PATH) {
            Ok(data) => commands.insert_resource(parse_or_default(&data, CONFIG_PATH)),
            Err(e) => {
                warn!("Vegetation: no config at {CONFIG_PATH} ({e}), using defaults");
                commands.insert_resource(VegetationConfig::default());
            }
        }
    }
}

fn parse_or_default(data: &str, source: &str) -> VegetationConfig {
    match ron::from_str::<VegetationConfig>(data) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Vegetation: failed to parse {source}: {e}; using defaults");
            VegetationConfig::default()
        }
    }
}
