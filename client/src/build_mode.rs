//! Build mode system for placing structures
//!
//! Drives the shared [`BuildModeController`] from keyboard and mouse input, draws a
//! green/red ghost of the current candidate and shows the selection plus material
//! stock in a small HUD.

use bevy::prelude::*;
use std::collections::HashMap;

use shared::{
    AimRay, BuildModeController, BuildModeState, ConstructionConfig, ConstructionScheduler, ConstructionSet,
    DamageOutcome, DamageStructure, Inventory, MaterialKind, PhysicsWorld, StructureKind, StructureRegistry,
    ALL_MATERIALS, ALL_STRUCTURE_KINDS,
};

use crate::camera::{aim_ray, FlyCamera};
use crate::connection::ServerLink;
use crate::physics::RapierBodies;
use crate::structures::ClientBackend;

// UI Colors
const UI_BG: Color = Color::srgba(0.08, 0.08, 0.1, 0.85);
const UI_TEXT: Color = Color::srgb(0.9, 0.9, 0.9);
const UI_ACCENT: Color = Color::srgb(0.95, 0.75, 0.3);

/// Plugin for the build mode system
pub struct BuildModePlugin;

impl Plugin for BuildModePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<BuildModeController>();

        app.add_systems(Startup, (setup_inventory, setup_ghost, setup_hud));

        app.add_systems(
            Update,
            (strike_structures, apply_structure_damage)
                .chain()
                .in_set(ConstructionSet::Damage),
        );
        app.add_systems(
            Update,
            (handle_build_input, update_preview, update_ghost)
                .chain()
                .in_set(ConstructionSet::Preview),
        );
        app.add_systems(Update, commit_placement.in_set(ConstructionSet::Commit));
        app.add_systems(Update, update_hud.after(ConstructionSet::Commit));
    }
}

/// Translucent preview of the candidate
#[derive(Component)]
pub struct BuildGhost;

#[derive(Component)]
pub struct BuildHud;

#[derive(Resource)]
pub struct GhostAssets {
    pub meshes: HashMap<StructureKind, Handle<Mesh>>,
    pub valid_material: Handle<StandardMaterial>,
    pub invalid_material: Handle<StandardMaterial>,
}

// =============================================================================
// SETUP
// =============================================================================

/// Local copy of the player's materials until the server sends its own
fn setup_inventory(mut commands: Commands, config: Res<ConstructionConfig>) {
    commands.insert_resource(config.starting_inventory());
}

fn setup_ghost(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let valid_material = materials.add(StandardMaterial {
        base_color: Color::srgba(0.2, 0.8, 0.2, 0.5),
        alpha_mode: AlphaMode::Blend,
        unlit: true,
        ..default()
    });

    let invalid_material = materials.add(StandardMaterial {
        base_color: Color::srgba(0.8, 0.2, 0.2, 0.5),
        alpha_mode: AlphaMode::Blend,
        unlit: true,
        ..default()
    });

    let ghost_meshes: HashMap<_, _> = ALL_STRUCTURE_KINDS
        .iter()
        .map(|kind| {
            let size = kind.footprint().size();
            (*kind, meshes.add(Cuboid::new(size.x, size.y, size.z)))
        })
        .collect();

    if let Some(mesh) = ghost_meshes.get(&StructureKind::default()) {
        commands.spawn((
            BuildGhost,
            Mesh3d(mesh.clone()),
            MeshMaterial3d(valid_material.clone()),
            Transform::default(),
            Visibility::Hidden,
        ));
    }

    commands.insert_resource(GhostAssets {
        meshes: ghost_meshes,
        valid_material,
        invalid_material,
    });
}

fn setup_hud(mut commands: Commands) {
    commands.spawn((
        BuildHud,
        Text::new(""),
        TextFont {
            font_size: 14.0,
            ..default()
        },
        TextColor(UI_TEXT),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(20.0),
            bottom: Val::Px(20.0),
            padding: UiRect::all(Val::Px(10.0)),
            ..default()
        },
        BackgroundColor(UI_BG),
    ));
}

// =============================================================================
// INPUT
// =============================================================================

/// Structure kind bound to a number key
fn kind_for_key(key: KeyCode) -> Option<StructureKind> {
    let index = match key {
        KeyCode::Digit1 => 0,
        KeyCode::Digit2 => 1,
        KeyCode::Digit3 => 2,
        KeyCode::Digit4 => 3,
        _ => return None,
    };
    ALL_STRUCTURE_KINDS.get(index).copied()
}

fn material_for_key(key: KeyCode) -> Option<MaterialKind> {
    let index = match key {
        KeyCode::KeyZ => 0,
        KeyCode::KeyX => 1,
        KeyCode::KeyC => 2,
        _ => return None,
    };
    ALL_MATERIALS.get(index).copied()
}

/// B toggles build mode, 1-4 pick a piece, Z/X/C pick a material, R rotates
fn handle_build_input(keyboard: Res<ButtonInput<KeyCode>>, mut controller: ResMut<BuildModeController>) {
    if keyboard.just_pressed(KeyCode::KeyB) {
        controller.toggle();
    }
    if !controller.is_active() {
        return;
    }

    for key in keyboard.get_just_pressed() {
        if let Some(kind) = kind_for_key(*key) {
            controller.select_kind(kind);
        } else if let Some(material) = material_for_key(*key) {
            controller.select_material(material);
        }
    }
    if keyboard.just_pressed(KeyCode::KeyR) {
        controller.rotate();
    }
}

// =============================================================================
// PREVIEW
// =============================================================================

fn update_preview(
    cameras: Query<&Transform, With<FlyCamera>>,
    config: Res<ConstructionConfig>,
    registry: Res<StructureRegistry>,
    inventory: Res<Inventory>,
    physics: RapierBodies,
    mut controller: ResMut<BuildModeController>,
) {
    if !controller.is_active() {
        return;
    }
    let Some(aim) = aim_ray(&cameras) else {
        return;
    };
    controller.update_preview(aim, &physics, &*registry, &*inventory, &config);
}

/// Move the ghost onto the candidate and colour it by verdict
fn update_ghost(
    controller: Res<BuildModeController>,
    assets: Option<Res<GhostAssets>>,
    mut ghosts: Query<
        (
            &mut Transform,
            &mut Visibility,
            &mut Mesh3d,
            &mut MeshMaterial3d<StandardMaterial>,
        ),
        With<BuildGhost>,
    >,
) {
    let Some(assets) = assets else {
        return;
    };
    let Ok((mut transform, mut visibility, mut mesh, mut material)) = ghosts.single_mut() else {
        return;
    };

    let Some(preview) = controller.preview().filter(|_| controller.is_active()) else {
        *visibility = Visibility::Hidden;
        return;
    };

    let candidate = preview.candidate;
    *visibility = Visibility::Visible;
    transform.translation = candidate.kind.footprint().world_center(candidate.position, candidate.orientation);
    transform.rotation = candidate.orientation.rotation();

    if let Some(handle) = assets.meshes.get(&candidate.kind) {
        if mesh.0 != *handle {
            mesh.0 = handle.clone();
        }
    }
    let wanted = if preview.is_valid() {
        &assets.valid_material
    } else {
        &assets.invalid_material
    };
    if material.0 != *wanted {
        material.0 = wanted.clone();
    }
}

// =============================================================================
// PLACEMENT & DAMAGE
// =============================================================================

/// Left click places the previewed structure
#[allow(clippy::too_many_arguments)]
fn commit_placement(
    mouse: Res<ButtonInput<MouseButton>>,
    time: Res<Time>,
    mut controller: ResMut<BuildModeController>,
    mut registry: ResMut<StructureRegistry>,
    mut scheduler: ResMut<ConstructionScheduler>,
    mut inventory: ResMut<Inventory>,
    mut backend: ClientBackend,
    mut network: ServerLink,
) {
    if !controller.is_active() || !mouse.just_pressed(MouseButton::Left) {
        return;
    }

    if let Some(structure) = controller.commit(
        time.elapsed_secs_f64(),
        &mut registry,
        &mut scheduler,
        &mut backend,
        &mut *inventory,
        &mut network,
    ) {
        info!(
            "Placed {} {} at {:?}",
            structure.material.display_name(),
            structure.kind.display_name(),
            structure.position
        );
    }
}

/// F hits whatever structure is under the crosshair
fn strike_structures(
    keyboard: Res<ButtonInput<KeyCode>>,
    cameras: Query<&Transform, With<FlyCamera>>,
    config: Res<ConstructionConfig>,
    physics: RapierBodies,
    mut damage: MessageWriter<DamageStructure>,
) {
    if !keyboard.just_pressed(KeyCode::KeyF) {
        return;
    }
    let Some(AimRay { origin, direction }) = aim_ray(&cameras) else {
        return;
    };
    let Some(id) = physics
        .raycast(origin, origin + direction * config.reach)
        .and_then(|hit| hit.structure)
    else {
        return;
    };
    damage.write(DamageStructure {
        id,
        amount: config.strike_damage,
    });
}

fn apply_structure_damage(
    mut requests: MessageReader<DamageStructure>,
    mut registry: ResMut<StructureRegistry>,
    mut backend: ClientBackend,
) {
    for DamageStructure { id, amount } in requests.read() {
        match registry.apply_damage(*id, *amount, &mut backend) {
            DamageOutcome::Destroyed(structure) => {
                info!("{} {} destroyed", structure.material.display_name(), structure.kind.display_name());
            }
            DamageOutcome::Damaged { remaining } => {
                let percent = registry.find(*id).map_or(0.0, |s| s.health_fraction() * 100.0);
                debug!("Structure {} at {:.0} HP ({:.0}%)", id, remaining, percent);
            }
            DamageOutcome::NotFound => {}
        }
    }
}

// =============================================================================
// HUD
// =============================================================================

fn hud_text(controller: &BuildModeController, inventory: &Inventory) -> String {
    let mode = match controller.state() {
        BuildModeState::Inactive => return "[B] Build".to_string(),
        BuildModeState::NoTarget => "no target".to_string(),
        BuildModeState::Valid => "ready".to_string(),
        BuildModeState::Invalid(reason) => reason.to_string(),
    };

    let stock = ALL_MATERIALS
        .iter()
        .map(|material| format!("{}: {}", material.display_name(), inventory.count(*material)))
        .collect::<Vec<_>>()
        .join("  ");

    format!(
        "BUILD: {} {} ({})\n{}\n[1-4] piece  [Z/X/C] material  [R] rotate  [F] strike  [B] exit",
        controller.selected_material().display_name(),
        controller.selected_kind().display_name(),
        mode,
        stock
    )
}

fn update_hud(
    controller: Res<BuildModeController>,
    inventory: Res<Inventory>,
    mut huds: Query<(&mut Text, &mut TextColor), With<BuildHud>>,
) {
    if !controller.is_changed() && !inventory.is_changed() {
        return;
    }
    for (mut text, mut color) in huds.iter_mut() {
        **text = hud_text(&controller, &inventory);
        color.0 = if controller.is_active() { UI_ACCENT } else { UI_TEXT };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_keys_map_to_kinds() {
        assert_eq!(kind_for_key(KeyCode::Digit1), Some(ALL_STRUCTURE_KINDS[0]));
        assert_eq!(kind_for_key(KeyCode::Digit4), Some(ALL_STRUCTURE_KINDS[3]));
        assert_eq!(kind_for_key(KeyCode::Digit5), None);
    }

    #[test]
    fn test_material_keys() {
        assert_eq!(material_for_key(KeyCode::KeyZ), Some(MaterialKind::Wood));
        assert_eq!(material_for_key(KeyCode::KeyX), Some(MaterialKind::Stone));
        assert_eq!(material_for_key(KeyCode::KeyC), Some(MaterialKind::Metal));
        assert_eq!(material_for_key(KeyCode::KeyV), None);
    }

    #[test]
    fn test_hud_shows_stock_only_in_build_mode() {
        let mut controller = BuildModeController::new();
        let inventory = Inventory::with_materials(&[(MaterialKind::Wood, 120)]);

        assert_eq!(hud_text(&controller, &inventory), "[B] Build");

        controller.enter();
        let text = hud_text(&controller, &inventory);
        assert!(text.contains("no target"));
        assert!(text.contains("Wood: 120"));
        assert!(text.contains("Metal: 0"));
    }
}
