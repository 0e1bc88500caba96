//! Lightweight static-body physics.
//!
//! Structures never move, so a table of fixed boxes plus a flat ground plane is all the
//! server needs to answer aim raycasts. The client uses Rapier instead; both sit behind
//! the same `PhysicsWorld` contract.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::collaborators::{BodyDescriptor, CollaboratorError, PhysicsWorld, RayHit, ShapeDescriptor};
use crate::spatial::Aabb;
use crate::structures::StructureId;

/// Height of the ground plane
pub const GROUND_HEIGHT: f32 = 0.0;

/// Fixed boxes keyed by structure id, plus an optional infinite ground plane.
#[derive(Resource, Debug, Clone)]
pub struct StaticBodies {
    bodies: HashMap<StructureId, Aabb>,
    ground: bool,
}

impl Default for StaticBodies {
    fn default() -> Self {
        Self::with_ground()
    }
}

impl StaticBodies {
    pub fn with_ground() -> Self {
        Self {
            bodies: HashMap::new(),
            ground: true,
        }
    }

    pub fn without_ground() -> Self {
        Self {
            bodies: HashMap::new(),
            ground: false,
        }
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn contains(&self, id: StructureId) -> bool {
        self.bodies.contains_key(&id)
    }

    fn ground_hit(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<(f32, Vec3)> {
        if !self.ground || direction.y >= -1e-6 || origin.y < GROUND_HEIGHT {
            return None;
        }
        let t = (GROUND_HEIGHT - origin.y) / direction.y;
        (t <= max_distance).then_some((t, Vec3::Y))
    }
}

impl PhysicsWorld for StaticBodies {
    fn add_body(&mut self, id: StructureId, body: &BodyDescriptor) -> Result<(), CollaboratorError> {
        if body.mass != 0.0 {
            return Err(CollaboratorError::Rejected {
                collaborator: "physics",
                reason: format!("only fixed bodies are supported, got mass {}", body.mass),
            });
        }
        let ShapeDescriptor::Cuboid { half_extents } = body.shape;
        self.bodies
            .insert(id, Aabb::from_oriented(body.translation, half_extents, body.rotation));
        Ok(())
    }

    fn remove_body(&mut self, id: StructureId) -> Result<(), CollaboratorError> {
        self.bodies.remove(&id);
        Ok(())
    }

    fn raycast(&self, from: Vec3, to: Vec3) -> Option<RayHit> {
        let delta = to - from;
        let length = delta.length();
        if length <= f32::EPSILON {
            return None;
        }
        let direction = delta / length;

        let mut best = self.ground_hit(from, direction, length).map(|(t, normal)| RayHit {
            point: from + direction * t,
            normal,
            structure: None,
        });
        let mut best_t = best.map(|hit| (hit.point - from).length()).unwrap_or(f32::INFINITY);

        for (id, aabb) in &self.bodies {
            let Some((t, normal)) = aabb.ray_intersection(from, direction, length) else {
                continue;
            };
            if t < best_t {
                best_t = t;
                best = Some(RayHit {
                    point: from + direction * t,
                    normal,
                    structure: Some(*id),
                });
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_box(center: Vec3, half_extents: Vec3) -> BodyDescriptor {
        BodyDescriptor {
            shape: ShapeDescriptor::Cuboid { half_extents },
            mass: 0.0,
            translation: center,
            rotation: Quat::IDENTITY,
        }
    }

    #[test]
    fn test_ray_hits_ground() {
        let world = StaticBodies::with_ground();
        let hit = world.raycast(Vec3::new(0.0, 10.0, 0.0), Vec3::new(0.0, -10.0, 0.0)).unwrap();
        assert!(hit.point.abs_diff_eq(Vec3::ZERO, 1e-4));
        assert_eq!(hit.normal, Vec3::Y);
        assert_eq!(hit.structure, None);
    }

    #[test]
    fn test_nearest_body_wins() {
        let mut world = StaticBodies::with_ground();
        world.add_body(StructureId(1), &fixed_box(Vec3::new(0.0, 2.0, -10.0), Vec3::splat(1.0))).unwrap();
        world.add_body(StructureId(2), &fixed_box(Vec3::new(0.0, 2.0, -20.0), Vec3::splat(1.0))).unwrap();

        let hit = world.raycast(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 2.0, -40.0)).unwrap();
        assert_eq!(hit.structure, Some(StructureId(1)));
        assert_eq!(hit.normal, Vec3::Z);

        world.remove_body(StructureId(1)).unwrap();
        let hit = world.raycast(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 2.0, -40.0)).unwrap();
        assert_eq!(hit.structure, Some(StructureId(2)));
    }

    #[test]
    fn test_dynamic_body_rejected() {
        let mut world = StaticBodies::without_ground();
        let mut body = fixed_box(Vec3::ZERO, Vec3::ONE);
        body.mass = 1.0;
        assert!(world.add_body(StructureId(1), &body).is_err());
        assert!(world.is_empty());
    }

    #[test]
    fn test_segment_too_short() {
        let mut world = StaticBodies::without_ground();
        world.add_body(StructureId(1), &fixed_box(Vec3::new(0.0, 0.0, -10.0), Vec3::ONE)).unwrap();
        assert!(world.raycast(Vec3::ZERO, Vec3::new(0.0, 0.0, -5.0)).is_none());
    }
}
