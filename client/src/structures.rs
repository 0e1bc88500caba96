//! Structure rendering
//!
//! Scene collaborator for the registry: one mesh entity per structure, coloured by
//! material and grown from the ground up while under construction.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use std::collections::HashMap;

use shared::{
    BodyDescriptor, CollaboratorError, ConstructionSet, MaterialKind, MeshDescriptor, PhysicsWorld, RayHit,
    SceneGraph, StructureId, StructureKind, StructureRegistry, ALL_MATERIALS, ALL_STRUCTURE_KINDS,
};

use crate::physics::RapierBodies;

/// Thinnest a structure is drawn at while building, as a fraction of full height
const MIN_BUILD_SCALE: f32 = 0.05;

/// Marker for rendered structure entities
#[derive(Component, Debug, Clone, Copy)]
pub struct StructureVisual {
    pub id: StructureId,
    /// Placement origin (bottom of the footprint)
    pub origin: Vec3,
    pub height: f32,
}

/// Shared meshes and materials for structures
#[derive(Resource)]
pub struct StructureAssets {
    pub meshes: HashMap<StructureKind, Handle<Mesh>>,
    pub materials: HashMap<MaterialKind, Handle<StandardMaterial>>,
}

/// Visual entity per structure
#[derive(Resource, Default)]
pub struct StructureVisuals {
    pub map: HashMap<StructureId, Entity>,
}

pub struct StructuresPlugin;

impl Plugin for StructuresPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<StructureVisuals>();
        app.add_systems(Startup, setup_structure_assets);
        app.add_systems(Update, update_structure_visuals.after(ConstructionSet::Advance));
    }
}

pub fn material_color(material: MaterialKind) -> Color {
    match material {
        MaterialKind::Wood => Color::srgb(0.55, 0.38, 0.22),
        MaterialKind::Stone => Color::srgb(0.55, 0.55, 0.58),
        MaterialKind::Metal => Color::srgb(0.35, 0.42, 0.50),
    }
}

fn setup_structure_assets(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let meshes = ALL_STRUCTURE_KINDS
        .iter()
        .map(|kind| {
            let size = kind.footprint().size();
            (*kind, meshes.add(Cuboid::new(size.x, size.y, size.z)))
        })
        .collect();

    let materials = ALL_MATERIALS
        .iter()
        .map(|material| {
            let handle = materials.add(StandardMaterial {
                base_color: material_color(*material),
                perceptual_roughness: 0.9,
                metallic: if *material == MaterialKind::Metal { 0.6 } else { 0.0 },
                ..default()
            });
            (*material, handle)
        })
        .collect();

    commands.insert_resource(StructureAssets { meshes, materials });
}

/// [`SceneGraph`] that spawns structure meshes
#[derive(SystemParam)]
pub struct StructureScene<'w, 's> {
    commands: Commands<'w, 's>,
    assets: Option<Res<'w, StructureAssets>>,
    visuals: ResMut<'w, StructureVisuals>,
}

impl SceneGraph for StructureScene<'_, '_> {
    fn add_to_scene(&mut self, id: StructureId, mesh: &MeshDescriptor) -> Result<(), CollaboratorError> {
        let Some(assets) = self.assets.as_ref() else {
            return Err(CollaboratorError::Unavailable("scene"));
        };
        let (Some(mesh_handle), Some(material_handle)) =
            (assets.meshes.get(&mesh.kind), assets.materials.get(&mesh.material))
        else {
            return Err(CollaboratorError::Rejected {
                collaborator: "scene",
                reason: format!("no assets for {:?} {:?}", mesh.material, mesh.kind),
            });
        };

        let visual = StructureVisual {
            id,
            origin: mesh.position,
            height: mesh.size.y,
        };
        let entity = self
            .commands
            .spawn((
                visual,
                Mesh3d(mesh_handle.clone()),
                MeshMaterial3d(material_handle.clone()),
                build_transform(&visual, mesh.orientation.rotation(), MIN_BUILD_SCALE),
            ))
            .id();
        self.visuals.map.insert(id, entity);
        Ok(())
    }

    fn remove_from_scene(&mut self, id: StructureId) -> Result<(), CollaboratorError> {
        let Some(entity) = self.visuals.map.remove(&id) else {
            return Err(CollaboratorError::Rejected {
                collaborator: "scene",
                reason: format!("no mesh for structure {}", id),
            });
        };
        self.commands.entity(entity).despawn();
        Ok(())
    }
}

/// Scene and physics together, as the registry wants them
#[derive(SystemParam)]
pub struct ClientBackend<'w, 's> {
    pub scene: StructureScene<'w, 's>,
    pub physics: RapierBodies<'w, 's>,
}

impl SceneGraph for ClientBackend<'_, '_> {
    fn add_to_scene(&mut self, id: StructureId, mesh: &MeshDescriptor) -> Result<(), CollaboratorError> {
        self.scene.add_to_scene(id, mesh)
    }

    fn remove_from_scene(&mut self, id: StructureId) -> Result<(), CollaboratorError> {
        self.scene.remove_from_scene(id)
    }
}

impl PhysicsWorld for ClientBackend<'_, '_> {
    fn add_body(&mut self, id: StructureId, body: &BodyDescriptor) -> Result<(), CollaboratorError> {
        self.physics.add_body(id, body)
    }

    fn remove_body(&mut self, id: StructureId) -> Result<(), CollaboratorError> {
        self.physics.remove_body(id)
    }

    fn raycast(&self, from: Vec3, to: Vec3) -> Option<RayHit> {
        self.physics.raycast(from, to)
    }
}

/// Transform for a structure drawn at `scale` of its height, standing on its origin
fn build_transform(visual: &StructureVisual, rotation: Quat, scale: f32) -> Transform {
    Transform {
        translation: visual.origin + Vec3::Y * (visual.height * scale * 0.5),
        rotation,
        scale: Vec3::new(1.0, scale, 1.0),
    }
}

/// Grow structures with their construction progress
fn update_structure_visuals(
    time: Res<Time>,
    registry: Res<StructureRegistry>,
    mut visuals: Query<(&StructureVisual, &mut Transform)>,
) {
    let now = time.elapsed_secs_f64();
    for (visual, mut transform) in visuals.iter_mut() {
        let Some(structure) = registry.find(visual.id) else {
            continue;
        };
        let scale = structure.build_progress(now).max(MIN_BUILD_SCALE);
        if (transform.scale.y - scale).abs() > f32::EPSILON {
            *transform = build_transform(visual, structure.rotation(), scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_transform_stands_on_origin() {
        let visual = StructureVisual {
            id: StructureId(1),
            origin: Vec3::new(4.0, 0.0, 0.0),
            height: 4.0,
        };
        let half_built = build_transform(&visual, Quat::IDENTITY, 0.5);
        assert_eq!(half_built.translation, Vec3::new(4.0, 1.0, 0.0));
        assert_eq!(half_built.scale, Vec3::new(1.0, 0.5, 1.0));

        let done = build_transform(&visual, Quat::IDENTITY, 1.0);
        assert_eq!(done.translation.y, 2.0);
    }

    #[test]
    fn test_every_material_has_distinct_color() {
        let colors: Vec<_> = ALL_MATERIALS.iter().map(|m| material_color(*m)).collect();
        assert_ne!(colors[0], colors[1]);
        assert_ne!(colors[1], colors[2]);
    }
}
