use bevy::input::mouse::{MouseMotion, MouseWheel};
use bevy::prelude::*;
use bevy::window::{CursorGrabMode, PrimaryWindow};

use crate::plugins::vegetation::VegetationViewer;

/// Marker component for the single orbit camera.
#[derive(Component)]
pub struct OrbitCamera;

/// Runtime mutable orbit state (user-controlled angles & zoom).
#[derive(Resource, Debug, Clone, Copy)]
pub struct OrbitCameraState {
    pub yaw: f32,    // radians
    pub pitch: f32,  // radians
    pub radius: f32, // world units
    /// Seconds since the last user input; drives the idle orbit.
    pub idle: f32,
}

/// Orbit constraints & sensitivities.
#[derive(Resource, Debug, Clone, Copy)]
pub struct OrbitCameraConfig {
    pub pitch_min: f32,
    pub pitch_max: f32,
    pub radius_min: f32,
    pub radius_max: f32,
    pub zoom_speed: f32,
    pub sens_yaw: f32,
    pub sens_pitch: f32,
    pub target: Vec3,
    /// Idle seconds before the camera starts circling on its own.
    pub idle_delay: f32,
    pub idle_speed: f32, // rad/s
}

impl Default for OrbitCameraConfig {
    fn default() -> Self {
        Self {
            pitch_min: 2f32.to_radians(),
            pitch_max: 70f32.to_radians(),
            radius_min: 5.0,
            radius_max: 90.0,
            zoom_speed: 2.0,
            sens_yaw: 0.005,
            sens_pitch: 0.005,
            target: Vec3::new(0.0, 1.5, 0.0),
            idle_delay: 4.0,
            idle_speed: 0.12,
        }
    }
}

impl Default for OrbitCameraState {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 12f32.to_radians(),
            radius: 34.0,
            idle: 0.0,
        }
    }
}

/// Tracks whether the cursor is currently locked for orbit control.
#[derive(Resource, Default)]
pub struct OrbitCaptureState {
    pub captured: bool,
}

/// Camera transform for an orbit around `target`.
pub fn orbit_transform(state: &OrbitCameraState, target: Vec3) -> Transform {
    let rot = Quat::from_rotation_y(state.yaw) * Quat::from_rotation_x(-state.pitch);
    let pos = target + rot * (Vec3::Z * state.radius);
    Transform::from_translation(pos).looking_at(target, Vec3::Y)
}

pub struct CameraPlugin;
impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<OrbitCameraConfig>()
            .init_resource::<OrbitCameraState>()
            .init_resource::<OrbitCaptureState>()
            .add_systems(Startup, spawn_orbit_camera)
            .add_systems(
                Update,
                (orbit_camera_capture, orbit_camera_input, orbit_camera_idle, orbit_camera_apply).chain(),
            );
    }
}

fn spawn_orbit_camera(mut commands: Commands, state: Res<OrbitCameraState>, cfg: Res<OrbitCameraConfig>) {
    commands.spawn((
        Camera3dBundle {
            transform: orbit_transform(&state, cfg.target),
            ..default()
        },
        OrbitCamera,
        VegetationViewer,
    ));
}

fn orbit_camera_capture(
    buttons: Res<ButtonInput<MouseButton>>,
    mut windows: Query<&mut Window, With<PrimaryWindow>>,
    mut cap: ResMut<OrbitCaptureState>,
) {
    if let Ok(mut win) = windows.get_single_mut() {
        let want = buttons.pressed(MouseButton::Right);
        if want && !cap.captured {
            win.cursor.visible = false;
            win.cursor.grab_mode = CursorGrabMode::Locked;
            cap.captured = true;
        } else if !want && cap.captured {
            win.cursor.visible = true;
            win.cursor.grab_mode = CursorGrabMode::None;
            cap.captured = false;
        }
    }
}

/// Scroll to zoom, right-drag to orbit.
fn orbit_camera_input(
    time: Res<Time>,
    mut state: ResMut<OrbitCameraState>,
    cfg: Res<OrbitCameraConfig>,
    buttons: Res<ButtonInput<MouseButton>>,
    mut ev_motion: EventReader<MouseMotion>,
    mut ev_wheel: EventReader<MouseWheel>,
) {
    let mut touched = false;
    for w in ev_wheel.read() {
        state.radius = (state.radius - w.y * cfg.zoom_speed).clamp(cfg.radius_min, cfg.radius_max);
        touched = true;
    }

    if buttons.pressed(MouseButton::Right) {
        for m in ev_motion.read() {
            state.yaw -= m.delta.x * cfg.sens_yaw;
            state.pitch += m.delta.y * cfg.sens_pitch;
        }
        state.pitch = state.pitch.clamp(cfg.pitch_min, cfg.pitch_max);
        touched = true;
    } else {
        ev_motion.clear();
    }

    if touched {
        state.idle = 0.0;
    } else {
        state.idle += time.delta_seconds();
    }
}

fn orbit_camera_idle(time: Res<Time>, cfg: Res<OrbitCameraConfig>, mut state: ResMut<OrbitCameraState>) {
    if state.idle < cfg.idle_delay {
        return;
    }
    state.yaw = (state.yaw + cfg.idle_speed * time.delta_seconds()) % std::f32::consts::TAU;
}

fn orbit_camera_apply(
    state: Res<OrbitCameraState>,
    cfg: Res<OrbitCameraConfig>,
    mut q_cam: Query<&mut Transform, With<OrbitCamera>>,
) {
    let Ok(mut cam_t) = q_cam.get_single_mut() else { return; };
    *cam_t = orbit_transform(&state, cfg.target);
}
