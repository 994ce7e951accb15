//! Convenience re-exports for frequently used types & plugins.
pub use crate::error::{Result, VegetationError};
pub use crate::plugins::camera::{CameraPlugin, OrbitCamera, OrbitCameraConfig, OrbitCameraState};
pub use crate::plugins::config::{parse_config, VegetationConfig};
pub use crate::plugins::foliage::{synthesize_foliage, FoliageMesh, FoliageParams, ShadingMode};
pub use crate::plugins::grass::{evaluate_sector, lod_ratio, GrassSector, SectorArena, SectorPolicy, SectorView};
pub use crate::plugins::instancing::{InstanceRaw, InstancedBatch, VegetationRenderPlugin};
pub use crate::plugins::placement::{seeded_random, PlacementSeed};
pub use crate::plugins::radial_field::{sample_field, ExclusionWedge, FieldParams, PlacedInstance, RadialBias};
pub use crate::plugins::shading::{ShadingConfig, ShadingSettings};
pub use crate::plugins::trees::VariantGroups;
pub use crate::plugins::vegetation::{
    build_vegetation, update_vegetation, VegetationPlugin, VegetationScene, VegetationState, VegetationViewer,
};
