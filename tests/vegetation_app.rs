use bevy::prelude::*;
use grove::plugins::colliders::TrunkCollider;
use grove::plugins::config::VegetationConfig;
use grove::plugins::foliage::FoliageParams;
use grove::plugins::instancing::InstancedBatch;
use grove::plugins::shading::ShadingSettings;
use grove::plugins::vegetation::*;

// Small scene so construction stays quick in debug builds.
fn small_config() -> VegetationConfig {
    let mut cfg = VegetationConfig::default();
    cfg.grass.count = 1_200;
    cfg.trees.count = 24;
    cfg.foliage = FoliageParams {
        resolution: 16,
        ..FoliageParams::default()
    };
    cfg
}

// Minimal headless app: no window, no render sub-app.
fn build_app(config: VegetationConfig) -> App {
    let mut app = App::new();
    app.add_plugins((MinimalPlugins, AssetPlugin::default()))
        .init_asset::<Mesh>()
        .insert_resource(config) // pre-inserted config wins over assets/vegetation.ron
        .add_plugins(VegetationPlugin);
    app
}

fn count<F: bevy::ecs::query::QueryFilter>(app: &mut App) -> usize {
    app.world_mut().query_filtered::<Entity, F>().iter(app.world()).count()
}

#[test]
fn builds_every_batch() {
    let cfg = small_config();
    let expected_trees = build_vegetation(&cfg).unwrap().trees.len();
    let mut app = build_app(cfg);
    app.update();

    assert!(app.world().resource::<VegetationState>().ready);
    assert_eq!(count::<With<GrassSectorDraw>>(&mut app), 6);
    assert_eq!(count::<With<FoliageDraw>>(&mut app), 4);
    assert_eq!(count::<With<TrunkDraw>>(&mut app), 1);
    assert_eq!(count::<With<TrunkCollider>>(&mut app), expected_trees);
}

#[test]
fn stats_report_blobs_per_variant() {
    let scene = build_vegetation(&small_config()).unwrap();
    assert_eq!(scene.stats.foliage_blobs.len(), 4);
    for (batch, &blobs) in scene.foliage_batches.iter().zip(&scene.stats.foliage_blobs) {
        assert_eq!(blobs, batch.mesh.blob_count);
        assert!((7..=13).contains(&blobs), "variant {} has {blobs} blobs", batch.variant);
    }
}

#[test]
fn viewer_drives_sector_counts() {
    let mut app = build_app(small_config());
    app.world_mut().spawn((
        Transform::from_xyz(0.0, 1.5, 0.0).looking_at(Vec3::new(10.0, 1.5, 0.0), Vec3::Y),
        VegetationViewer,
    ));
    app.update();
    app.update();

    let state = app.world().resource::<VegetationState>();
    let expected: Vec<(usize, u32, bool)> = state
        .sectors
        .sectors
        .iter()
        .enumerate()
        .map(|(i, s)| (i, s.current_count, s.visible))
        .collect();
    assert!(expected.iter().any(|e| e.2), "some sector should face the camera");
    assert!(expected.iter().any(|e| !e.2), "sectors behind the camera should be hidden");

    let mut q = app.world_mut().query::<(&GrassSectorDraw, &InstancedBatch)>();
    for (draw, batch) in q.iter(app.world()) {
        let (_, current, visible) = expected[draw.index];
        assert_eq!(batch.visible_count, current);
        if !visible {
            assert_eq!(batch.visible_count, 0);
        }
        assert!(batch.visible_count <= batch.full_count());
    }
}

#[test]
fn config_change_rebuilds_scene() {
    let mut app = build_app(small_config());
    app.update();
    assert_eq!(count::<With<GrassSectorDraw>>(&mut app), 6);

    app.world_mut().resource_mut::<VegetationConfig>().sector_count = 4;
    app.update();
    assert_eq!(count::<With<GrassSectorDraw>>(&mut app), 4);
    assert_eq!(app.world().resource::<VegetationState>().sectors.len(), 4);
}

#[test]
fn invalid_config_spawns_nothing() {
    let mut cfg = small_config();
    cfg.trees.inner_radius = 80.0;
    let mut app = build_app(cfg);
    app.update();

    assert!(!app.world().resource::<VegetationState>().ready);
    assert_eq!(count::<With<InstancedBatch>>(&mut app), 0);
    assert_eq!(count::<With<TrunkCollider>>(&mut app), 0);
}

#[test]
fn update_advances_wind_without_viewer_state() {
    let mut state = VegetationState::default();
    let mut shading = ShadingSettings::default();
    update_vegetation(&mut state, &mut shading, Vec3::ZERO, Vec3::X, 0.25);
    update_vegetation(&mut state, &mut shading, Vec3::ZERO, Vec3::X, 0.25);
    assert!((shading.time - 0.5).abs() < 1e-6);
    assert!(state.sectors.is_empty());
}
