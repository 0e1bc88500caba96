//! Free-fly build camera
//!
//! WASD + Space/Shift to move, mouse to look. The camera's forward ray is the aim ray
//! the build tool uses.

use bevy::input::mouse::MouseMotion;
use bevy::prelude::*;
use bevy::window::{CursorGrabMode, CursorOptions, PrimaryWindow};
use std::f32::consts::FRAC_PI_2;

use shared::AimRay;

/// Mouse sensitivity (radians per pixel)
const MOUSE_SENSITIVITY: f32 = 0.003;

/// Movement speed in m/s; doubled while Ctrl is held
const FLY_SPEED: f32 = 12.0;

const START_POSITION: Vec3 = Vec3::new(0.0, 8.0, 16.0);

/// Marker + look angles for the build camera
#[derive(Component, Debug, Default)]
pub struct FlyCamera {
    pub yaw: f32,
    pub pitch: f32,
}

impl FlyCamera {
    fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }
}

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_camera);
        app.add_systems(Update, (grab_cursor, look, fly).chain());
    }
}

fn spawn_camera(mut commands: Commands) {
    let camera = FlyCamera {
        yaw: 0.0,
        pitch: -0.35,
    };
    commands.spawn((
        Camera3d::default(),
        Transform::from_translation(START_POSITION).with_rotation(camera.rotation()),
        camera,
    ));
}

/// Lock the cursor on click, release it with Escape
fn grab_cursor(
    windows: Query<Entity, With<PrimaryWindow>>,
    mut cursor_opts: Query<&mut CursorOptions>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
) {
    let Ok(window_entity) = windows.single() else {
        return;
    };
    let Ok(mut cursor) = cursor_opts.get_mut(window_entity) else {
        return;
    };

    if mouse_button.just_pressed(MouseButton::Left) {
        cursor.grab_mode = CursorGrabMode::Locked;
        cursor.visible = false;
    }
    if keyboard.just_pressed(KeyCode::Escape) {
        cursor.grab_mode = CursorGrabMode::None;
        cursor.visible = true;
    }
}

fn look(mut mouse_motion: MessageReader<MouseMotion>, mut cameras: Query<(&mut FlyCamera, &mut Transform)>) {
    let mut delta = Vec2::ZERO;
    for motion in mouse_motion.read() {
        delta += motion.delta;
    }
    if delta == Vec2::ZERO {
        return;
    }

    for (mut camera, mut transform) in cameras.iter_mut() {
        camera.yaw -= delta.x * MOUSE_SENSITIVITY;
        camera.pitch = (camera.pitch - delta.y * MOUSE_SENSITIVITY).clamp(-FRAC_PI_2 + 0.01, FRAC_PI_2 - 0.01);
        transform.rotation = camera.rotation();
    }
}

fn fly(time: Res<Time>, keyboard: Res<ButtonInput<KeyCode>>, mut cameras: Query<&mut Transform, With<FlyCamera>>) {
    for mut transform in cameras.iter_mut() {
        let forward = transform.forward().as_vec3();
        let right = transform.right().as_vec3();

        let mut direction = Vec3::ZERO;
        if keyboard.pressed(KeyCode::KeyW) {
            direction += forward;
        }
        if keyboard.pressed(KeyCode::KeyS) {
            direction -= forward;
        }
        if keyboard.pressed(KeyCode::KeyD) {
            direction += right;
        }
        if keyboard.pressed(KeyCode::KeyA) {
            direction -= right;
        }
        if keyboard.pressed(KeyCode::Space) {
            direction += Vec3::Y;
        }
        if keyboard.pressed(KeyCode::ShiftLeft) {
            direction -= Vec3::Y;
        }

        let speed = if keyboard.pressed(KeyCode::ControlLeft) {
            FLY_SPEED * 2.0
        } else {
            FLY_SPEED
        };
        transform.translation += direction.normalize_or_zero() * speed * time.delta_secs();
    }
}

/// The aim ray for this frame, if a build camera exists
pub fn aim_ray(cameras: &Query<&Transform, With<FlyCamera>>) -> Option<AimRay> {
    let transform = cameras.iter().next()?;
    Some(AimRay::new(transform.translation, transform.forward().as_vec3()))
}
