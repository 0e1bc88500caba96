//! Build Client - Renders structures and drives the build tool
//!
//! Updated for Lightyear 0.25 / Bevy 0.17

mod build_mode;
mod camera;
mod connection;
mod particles;
mod physics;
mod structures;

use bevy::asset::AssetPlugin;
use bevy::light::DirectionalLightShadowMap;
use bevy::prelude::*;
use bevy::window::WindowResolution;
use lightyear::prelude::client::ClientPlugins;
use shared::{protocol::*, ConstructionPlugin, ProtocolPlugin, SERVER_ADDR, SERVER_PORT};

/// Side length of the visible ground plane
const GROUND_SIZE: f32 = 400.0;

/// Get the asset path - for bundled macOS apps, use path relative to executable
fn get_asset_path() -> String {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let bundled_assets = exe_dir.join("assets");
            if bundled_assets.exists() {
                info!("Using bundled assets at: {:?}", bundled_assets);
                return bundled_assets.to_string_lossy().to_string();
            }
        }
    }
    // Fall back to default "assets" folder (for development)
    "assets".to_string()
}

fn main() {
    let asset_path = get_asset_path();
    let config_path = format!("{}/construction.ron", asset_path);

    let mut app = App::new();

    app.add_plugins(
        DefaultPlugins
            .set(WindowPlugin {
                primary_window: Some(Window {
                    title: "Fortify".to_string(),
                    resolution: WindowResolution::new(1280, 720),
                    ..default()
                }),
                ..default()
            })
            .set(AssetPlugin {
                file_path: asset_path,
                ..default()
            }),
    );

    // Lightyear client plugins (tick_duration = 60Hz)
    app.add_plugins(ClientPlugins {
        tick_duration: tick_duration(),
    });
    app.add_plugins(ProtocolPlugin);

    // Registry, scheduler, config and the construction system sets
    app.add_plugins(ConstructionPlugin { config_path });

    app.add_plugins((
        physics::PhysicsPlugin,
        camera::CameraPlugin,
        structures::StructuresPlugin,
        build_mode::BuildModePlugin,
        particles::ParticlesPlugin,
        connection::ConnectionPlugin,
    ));

    app.add_systems(Startup, setup_scene);

    info!("Starting client, server at {}:{}", SERVER_ADDR, SERVER_PORT);
    app.run();
}

/// Sun, ambient light and a ground plane to build on
fn setup_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.insert_resource(DirectionalLightShadowMap { size: 1024 });
    commands.insert_resource(ClearColor(Color::srgb(0.55, 0.7, 0.9)));
    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 300.0,
        ..default()
    });

    commands.spawn((
        DirectionalLight {
            illuminance: 10_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(30.0, 60.0, 20.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(GROUND_SIZE, GROUND_SIZE))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.35, 0.5, 0.3),
            perceptual_roughness: 1.0,
            ..default()
        })),
        Transform::default(),
    ));

    info!("Client scene initialized");
}
