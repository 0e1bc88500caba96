//! Rapier-backed physics collaborator
//!
//! Each structure gets its own fixed collider entity, tagged with the structure id so
//! raycast hits can be mapped back. The ground is one large fixed box.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use std::collections::HashMap;

use shared::{BodyDescriptor, CollaboratorError, PhysicsWorld, RayHit, ShapeDescriptor, StructureId};

/// Half size of the ground collider
const GROUND_HALF_EXTENT: f32 = 500.0;
const GROUND_THICKNESS: f32 = 0.5;

/// Links a collider entity to the structure it belongs to
#[derive(Component, Debug, Clone, Copy)]
pub struct StructureBody(pub StructureId);

/// Collider entity per structure
#[derive(Resource, Default)]
pub struct StructureBodies {
    pub map: HashMap<StructureId, Entity>,
}

pub struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(RapierPhysicsPlugin::<NoUserData>::default());
        app.init_resource::<StructureBodies>();
        app.add_systems(Startup, spawn_ground);
    }
}

fn spawn_ground(mut commands: Commands) {
    commands.spawn((
        Name::new("Ground collider"),
        RigidBody::Fixed,
        Collider::cuboid(GROUND_HALF_EXTENT, GROUND_THICKNESS * 0.5, GROUND_HALF_EXTENT),
        Transform::from_xyz(0.0, -GROUND_THICKNESS * 0.5, 0.0),
    ));
}

/// [`PhysicsWorld`] over the Rapier context
#[derive(SystemParam)]
pub struct RapierBodies<'w, 's> {
    commands: Commands<'w, 's>,
    rapier: ReadRapierContext<'w, 's>,
    bodies: ResMut<'w, StructureBodies>,
    tags: Query<'w, 's, &'static StructureBody>,
}

impl PhysicsWorld for RapierBodies<'_, '_> {
    fn add_body(&mut self, id: StructureId, body: &BodyDescriptor) -> Result<(), CollaboratorError> {
        if body.mass != 0.0 {
            return Err(CollaboratorError::Rejected {
                collaborator: "physics",
                reason: format!("structures must be fixed, got mass {}", body.mass),
            });
        }
        let ShapeDescriptor::Cuboid { half_extents } = body.shape;

        let entity = self
            .commands
            .spawn((
                StructureBody(id),
                RigidBody::Fixed,
                Collider::cuboid(half_extents.x, half_extents.y, half_extents.z),
                Transform::from_translation(body.translation).with_rotation(body.rotation),
            ))
            .id();
        self.bodies.map.insert(id, entity);
        Ok(())
    }

    fn remove_body(&mut self, id: StructureId) -> Result<(), CollaboratorError> {
        let Some(entity) = self.bodies.map.remove(&id) else {
            return Err(CollaboratorError::Rejected {
                collaborator: "physics",
                reason: format!("no body for structure {}", id),
            });
        };
        self.commands.entity(entity).despawn();
        Ok(())
    }

    fn raycast(&self, from: Vec3, to: Vec3) -> Option<RayHit> {
        let delta = to - from;
        let length = delta.length();
        if length <= f32::EPSILON {
            return None;
        }
        let Ok(context) = self.rapier.single() else {
            return None;
        };

        let (entity, hit) =
            context.cast_ray_and_get_normal(from, delta / length, length, true, QueryFilter::default())?;
        Some(RayHit {
            point: hit.point,
            normal: hit.normal,
            structure: self.tags.get(entity).ok().map(|tag| tag.0),
        })
    }
}
