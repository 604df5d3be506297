use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::input::{keyboard::KeyCode, ButtonInput};
use bevy::prelude::*;

use crate::actions::{ActionState, PlayerAction};
use crate::placement::core::{sample_below, LayerMask};
use crate::placement::preview::PreviewController;
use crate::setup::MainCamera;
use crate::world::surface::ActiveSurface;

pub const MOVE_SPEED: f32 = 25.0;
pub const ROTATE_SPEED: f32 = 0.2;
pub const MAX_CAMERA_DT: f32 = 0.05; // never use a dt larger than 50ms
/// Wheel pixels per "line" on touchpads.
pub const PIXELS_PER_LINE: f32 = 50.0;

const DIGITS: [KeyCode; 9] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
    KeyCode::Digit7,
    KeyCode::Digit8,
    KeyCode::Digit9,
];

#[derive(Component)]
pub struct CameraOrbit {
    pub focus: Vec3,
    pub radius: f32,
    pub yaw: f32,
    pub pitch: f32,
}

pub fn input_mapping_system(
    keys: Res<ButtonInput<KeyCode>>,
    buttons: Res<ButtonInput<MouseButton>>,
    mut scroll_evr: EventReader<MouseWheel>,
    mut action_state: ResMut<ActionState>,
) {
    action_state.set(PlayerAction::MoveForward, keys.pressed(KeyCode::KeyW));
    action_state.set(PlayerAction::MoveBackward, keys.pressed(KeyCode::KeyS));
    action_state.set(PlayerAction::MoveLeft, keys.pressed(KeyCode::KeyA));
    action_state.set(PlayerAction::MoveRight, keys.pressed(KeyCode::KeyD));

    action_state.set(PlayerAction::EnterPlacement, keys.just_pressed(KeyCode::KeyB));
    action_state.set(PlayerAction::CyclePrefab, keys.just_pressed(KeyCode::Tab));
    action_state.set(PlayerAction::RotateLeft, keys.just_pressed(KeyCode::KeyQ));
    action_state.set(PlayerAction::RotateRight, keys.just_pressed(KeyCode::KeyE));
    action_state.set(PlayerAction::Commit, buttons.just_pressed(MouseButton::Left));
    action_state.set(PlayerAction::Cancel, keys.just_pressed(KeyCode::Escape));
    for (i, key) in DIGITS.iter().enumerate() {
        action_state.set(PlayerAction::SelectPrefab(i as u8), keys.just_pressed(*key));
    }

    let lines: f32 = scroll_evr
        .read()
        .map(|ev| match ev.unit {
            MouseScrollUnit::Line => ev.y,
            MouseScrollUnit::Pixel => ev.y / PIXELS_PER_LINE,
        })
        .sum();
    action_state.set_scroll(lines);
}

/// Pan/orbit/zoom around a ground-following focus. The wheel zooms only while
/// no placement session is using it for rotation.
pub fn camera_controller(
    time: Res<Time>,
    mouse_buttons: Res<ButtonInput<MouseButton>>,
    mut motion_evr: EventReader<MouseMotion>,
    action_state: Res<ActionState>,
    preview: Res<PreviewController>,
    surface: Option<Res<ActiveSurface>>,
    mut query: Query<(&mut Transform, &mut CameraOrbit), With<MainCamera>>,
) {
    let dt = time.delta_secs().min(MAX_CAMERA_DT);

    let Ok((mut tf, mut orbit)) = query.single_mut() else { return; };

    // 1) Camera-relative movement
    let forward = Vec2::new(-orbit.yaw.cos(), -orbit.yaw.sin());
    let right = Vec2::new(-forward.y, forward.x);

    let mut dir = Vec2::ZERO;
    if action_state.pressed(PlayerAction::MoveForward) { dir += forward; }
    if action_state.pressed(PlayerAction::MoveBackward) { dir -= forward; }
    if action_state.pressed(PlayerAction::MoveLeft) { dir -= right; }
    if action_state.pressed(PlayerAction::MoveRight) { dir += right; }

    if dir != Vec2::ZERO {
        let delta = dir.normalize() * MOVE_SPEED * dt;
        orbit.focus.x += delta.x;
        orbit.focus.z += delta.y;
    }

    // 2) Ground the focus Y
    let ground_at = |p: Vec3| -> Option<f32> {
        let surface = surface.as_ref()?;
        sample_below(&*surface.0, p, 500.0, 1000.0, LayerMask::ALL).map(|hit| hit.height())
    };
    orbit.focus.y = ground_at(orbit.focus).unwrap_or(0.0);

    // 3) Zoom
    if !preview.is_active() {
        orbit.radius = (orbit.radius - action_state.scroll()).clamp(2.0, 200.0);
    }

    // 4) Orbit
    if mouse_buttons.pressed(MouseButton::Middle) {
        for ev in motion_evr.read() {
            orbit.yaw += ev.delta.x * ROTATE_SPEED * dt;
            orbit.pitch += ev.delta.y * ROTATE_SPEED * dt;
        }
    } else {
        motion_evr.clear();
    }

    orbit.pitch = orbit.pitch.clamp(0.05, std::f32::consts::FRAC_PI_2 - 0.01);

    // 5) Position camera
    let xz_radius = orbit.radius * orbit.pitch.cos();
    let offset = Vec3::new(
        xz_radius * orbit.yaw.cos(),
        orbit.radius * orbit.pitch.sin(),
        xz_radius * orbit.yaw.sin(),
    );

    tf.translation = orbit.focus + offset;

    // 6) Prevent underground camera
    let terrain_y = ground_at(tf.translation).unwrap_or(0.0);
    if tf.translation.y < terrain_y + 2.5 {
        tf.translation.y = terrain_y + 2.5;
    }

    tf.look_at(orbit.focus, Vec3::Y);
}
