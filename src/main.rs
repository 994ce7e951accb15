use bevy::diagnostic::{FrameTimeDiagnosticsPlugin, LogDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

use grove::plugins::camera::CameraPlugin;
use grove::plugins::vegetation::VegetationPlugin;

fn main() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    App::new()
        .insert_resource(ClearColor(Color::srgb(0.62, 0.72, 0.80)))
        .insert_resource(Msaa::Sample4)
        .insert_resource(AmbientLight {
            color: Color::srgb(0.55, 0.55, 0.60),
            brightness: 600.0,
        })
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window { title: "Grove".into(), ..default() }),
            ..default()
        }))
        .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
        .add_plugins(VegetationPlugin)   // config, construction, sector LOD, instanced draws
        .add_plugins(CameraPlugin)       // orbit viewer
        .add_plugins(FrameTimeDiagnosticsPlugin)
        .add_plugins(LogDiagnosticsPlugin::default())
        .add_systems(Startup, spawn_ground_and_light)
        .run();
}

fn spawn_ground_and_light(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn((
        PbrBundle {
            mesh: meshes.add(Plane3d::default().mesh().size(200.0, 200.0)),
            material: materials.add(StandardMaterial {
                base_color: Color::srgb(0.24, 0.42, 0.20),
                perceptual_roughness: 0.95,
                ..default()
            }),
            ..default()
        },
        RigidBody::Fixed,
        Collider::cuboid(100.0, 0.05, 100.0),
    ));

    commands.spawn(DirectionalLightBundle {
        directional_light: DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: true,
            ..default()
        },
        transform: Transform::from_xyz(40.0, 100.0, 30.0).looking_at(Vec3::ZERO, Vec3::Y),
        ..default()
    });
}
