// Procedural vegetation ring: construction + per-frame sector LOD.
//
// Construction (pure, `build_vegetation`):
//  - sample_field (grass) -> build_sectors -> one instance buffer per sector
//  - sample_field (trees) -> VariantGroups -> one foliage batch per variant + trunk batch
//  - build_foliage_variants -> metaball meshes
//
// Runtime (Bevy):
//  - rebuild_vegetation: (re)spawn batch entities whenever VegetationConfig changes
//  - sync_vegetation: update_vegetation + push visible counts into InstancedBatch
//
// NOTE: construction is a bounded one-shot cost dominated by iso-surface extraction;
// never run it per frame.

use std::sync::Arc;

use bevy::prelude::*;
use bevy::render::view::NoFrustumCulling;

use crate::error::Result;
use crate::plugins::colliders::spawn_trunk_colliders;
use crate::plugins::config::{load_vegetation_config, VegetationConfig};
use crate::plugins::foliage::FoliageMesh;
use crate::plugins::grass::{blade_mesh, build_sectors, SectorArena, SectorPolicy};
use crate::plugins::instancing::{InstanceRaw, InstancedBatch, VegetationRenderPlugin};
use crate::plugins::placement::{GRASS_SEED, TREE_SEED};
use crate::plugins::radial_field::{sample_field, PlacedInstance, GRASS_SCALE, TREE_SCALE};
use crate::plugins::shading::ShadingSettings;
use crate::plugins::trees::{build_foliage_variants, foliage_instances, trunk_instances, trunk_mesh, VariantGroups};

/// One foliage variant: its mesh and every tree instance using it.
#[derive(Clone, Debug)]
pub struct FoliageBatch {
    pub variant: usize,
    pub mesh: FoliageMesh,
    pub instances: Arc<[InstanceRaw]>,
}

/// Counts reported after construction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VegetationStats {
    pub grass_placed: usize,
    pub grass_dropped: usize,
    pub blades: usize,
    pub trees_placed: usize,
    pub trees_dropped: usize,
    pub foliage_blobs: Vec<usize>,
    pub foliage_triangles: Vec<usize>,
}

/// Output of `build_vegetation`.
#[derive(Clone, Debug)]
pub struct VegetationScene {
    pub sectors: SectorArena,
    pub trunk_batch: Arc<[InstanceRaw]>,
    pub foliage_batches: Vec<FoliageBatch>,
    pub trees: Vec<PlacedInstance>,
    pub stats: VegetationStats,
}

/// Build everything for one configuration. Invalid configs fail before any work.
pub fn build_vegetation(config: &VegetationConfig) -> Result<VegetationScene> {
    config.validate()?;

    let grass = sample_field(GRASS_SEED, &config.grass, GRASS_SCALE);
    let sectors = build_sectors(&grass.instances, config.sector_count, GRASS_SEED);

    let trees = sample_field(TREE_SEED, &config.trees, TREE_SCALE);
    let groups = VariantGroups::assign(&trees.instances, config.variant_count, TREE_SEED);
    let meshes = build_foliage_variants(config.variant_count, &config.foliage)?;

    let foliage_batches: Vec<FoliageBatch> = meshes
        .into_iter()
        .enumerate()
        .map(|(variant, mesh)| FoliageBatch {
            variant,
            instances: foliage_instances(groups.group(variant), TREE_SEED).into(),
            mesh,
        })
        .collect();

    let stats = VegetationStats {
        grass_placed: grass.instances.len(),
        grass_dropped: grass.dropped,
        blades: sectors.sectors.iter().map(|s| s.full_count as usize).sum(),
        trees_placed: trees.instances.len(),
        trees_dropped: trees.dropped,
        foliage_blobs: foliage_batches.iter().map(|b| b.mesh.blob_count).collect(),
        foliage_triangles: foliage_batches.iter().map(|b| b.mesh.triangle_count()).collect(),
    };

    Ok(VegetationScene {
        sectors,
        trunk_batch: trunk_instances(&trees.instances).into(),
        foliage_batches,
        trees: trees.instances,
        stats,
    })
}

/// Mutable per-frame state. Only sector visibility & counts change after construction.
#[derive(Resource, Default)]
pub struct VegetationState {
    pub sectors: SectorArena,
    pub policy: SectorPolicy,
    /// Set once a build succeeded; cleared while no scene is spawned.
    pub ready: bool,
    entities: Vec<Entity>,
}

impl VegetationState {
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }
}

/// Advance the wind clock and recompute sector visibility / LOD.
/// O(sector count); allocates nothing.
pub fn update_vegetation(
    state: &mut VegetationState,
    shading: &mut ShadingSettings,
    camera_position: Vec3,
    camera_forward: Vec3,
    delta: f32,
) {
    shading.advance(delta);
    let camera = Vec2::new(camera_position.x, camera_position.z);
    let forward = Vec2::new(camera_forward.x, camera_forward.z);
    state.sectors.update(&state.policy, camera, forward);
}

/// Entity the sector LOD is evaluated against (the host tags its camera).
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct VegetationViewer;

/// Draw entity of grass sector `index`.
#[derive(Component, Debug, Clone, Copy)]
pub struct GrassSectorDraw {
    pub index: usize,
}

#[derive(Component, Debug, Clone, Copy)]
pub struct TrunkDraw;

#[derive(Component, Debug, Clone, Copy)]
pub struct FoliageDraw {
    pub variant: usize,
}

pub struct VegetationPlugin;
impl Plugin for VegetationPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(VegetationRenderPlugin)
            .init_resource::<VegetationState>()
            .init_resource::<ShadingSettings>()
            .add_systems(PreStartup, load_vegetation_config)
            .add_systems(
                Update,
                (
                    rebuild_vegetation.run_if(resource_exists_and_changed::<VegetationConfig>),
                    sync_vegetation,
                )
                    .chain(),
            );
    }
}

fn rebuild_vegetation(
    mut commands: Commands,
    config: Res<VegetationConfig>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut state: ResMut<VegetationState>,
    mut shading: ResMut<ShadingSettings>,
) {
    for e in state.entities.drain(..) {
        commands.entity(e).despawn_recursive();
    }
    state.sectors = SectorArena::default();
    state.ready = false;

    let scene = match build_vegetation(&config) {
        Ok(scene) => scene,
        Err(e) => {
            error!("Vegetation: construction failed: {e}");
            return;
        }
    };
    shading.config = config.shading;
    state.policy = config.lod;

    let mut entities = Vec::with_capacity(scene.sectors.len() + scene.foliage_batches.len() + scene.trees.len() + 1);

    let blade = meshes.add(blade_mesh());
    for (index, sector) in scene.sectors.sectors.iter().enumerate() {
        entities.push(
            commands
                .spawn((
                    SpatialBundle::default(),
                    blade.clone(),
                    InstancedBatch::new(sector.instances.clone()),
                    GrassSectorDraw { index },
                    NoFrustumCulling,
                ))
                .id(),
        );
    }

    entities.push(
        commands
            .spawn((
                SpatialBundle::default(),
                meshes.add(trunk_mesh()),
                InstancedBatch::new(scene.trunk_batch.clone()),
                TrunkDraw,
                NoFrustumCulling,
            ))
            .id(),
    );

    for batch in &scene.foliage_batches {
        entities.push(
            commands
                .spawn((
                    SpatialBundle::default(),
                    meshes.add(batch.mesh.to_mesh()),
                    InstancedBatch::new(batch.instances.clone()),
                    FoliageDraw { variant: batch.variant },
                    NoFrustumCulling,
                ))
                .id(),
        );
    }

    entities.extend(spawn_trunk_colliders(&mut commands, &scene.trees));

    let stats = &scene.stats;
    info!(
        "Vegetation: grass {} placed ({} dropped) -> {} blades in {} sectors",
        stats.grass_placed,
        stats.grass_dropped,
        stats.blades,
        scene.sectors.len()
    );
    info!(
        "Vegetation: trees {} placed ({} dropped), {} variants, blobs {:?}, triangles {:?}",
        stats.trees_placed,
        stats.trees_dropped,
        scene.foliage_batches.len(),
        stats.foliage_blobs,
        stats.foliage_triangles
    );

    state.sectors = scene.sectors;
    state.entities = entities;
    state.ready = true;
}

fn sync_vegetation(
    time: Res<Time>,
    viewer: Query<&Transform, With<VegetationViewer>>,
    mut state: ResMut<VegetationState>,
    mut shading: ResMut<ShadingSettings>,
    mut draws: Query<(&GrassSectorDraw, &mut InstancedBatch)>,
) {
    let Ok(camera) = viewer.get_single() else {
        shading.advance(time.delta_seconds());
        return;
    };
    update_vegetation(
        &mut state,
        &mut shading,
        camera.translation,
        *camera.forward(),
        time.delta_seconds(),
    );

    for (draw, mut batch) in &mut draws {
        let Some(sector) = state.sectors.sectors.get(draw.index) else { continue; };
        // write only on change so extraction & change detection stay quiet
        if batch.visible_count != sector.current_count {
            batch.visible_count = sector.current_count;
        }
    }
}
