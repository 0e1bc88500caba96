//! Structure registry
//!
//! Owns every placed structure. Creating or removing a structure is the only way the
//! scene and physics collaborators get asked to build or tear down their side of it,
//! so each teardown happens exactly once.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::collaborators::{BodyDescriptor, MeshDescriptor, ShapeDescriptor, StructureBackend};
use crate::config::DEFAULT_GRID_SIZE;
use crate::grid::{cell_of, Orientation};
use crate::spatial::{Aabb, StructureGrid};
use crate::structures::{MaterialKind, Structure, StructureId, StructureKind};
use crate::validation::OverlapQuery;

/// Result of [`StructureRegistry::apply_damage`]
#[derive(Debug, Clone, PartialEq)]
pub enum DamageOutcome {
    /// Unknown id (already removed, or never existed)
    NotFound,
    Damaged { remaining: f32 },
    /// Hit points reached zero; the structure has been removed
    Destroyed(Structure),
}

/// Authoritative table of placed structures.
#[derive(Resource, Debug)]
pub struct StructureRegistry {
    structures: HashMap<StructureId, Structure>,
    /// Spatial index of structure bounds for overlap checks
    grid: StructureGrid,
    /// (kind, grid cell) -> id. Footprints never overlap, so this is unique and lets
    /// peers name a structure without sharing ids.
    by_cell: HashMap<(StructureKind, IVec3), StructureId>,
    grid_size: f32,
    next_id: u64,
    /// Structures destroyed by damage since the last drain
    destroyed: Vec<Structure>,
}

impl Default for StructureRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_GRID_SIZE)
    }
}

impl StructureRegistry {
    pub fn new(grid_size: f32) -> Self {
        Self {
            structures: HashMap::new(),
            grid: StructureGrid::new(grid_size),
            by_cell: HashMap::new(),
            grid_size,
            next_id: 1,
            destroyed: Vec::new(),
        }
    }

    /// Register a new structure and ask the collaborators for its mesh and body.
    ///
    /// Starts at zero hit points, under construction. A collaborator failure is logged
    /// and the structure is kept without that attachment (no body means visual-only).
    pub fn create<B: StructureBackend + ?Sized>(
        &mut self,
        kind: StructureKind,
        material: MaterialKind,
        position: Vec3,
        orientation: Orientation,
        now: f64,
        backend: &mut B,
    ) -> Structure {
        let id = StructureId(self.next_id);
        self.next_id += 1;

        let mut structure = Structure::new(id, kind, material, position, orientation, now);
        let footprint = kind.footprint();

        let mesh = MeshDescriptor {
            kind,
            material,
            size: footprint.size(),
            position,
            orientation,
        };
        match backend.add_to_scene(id, &mesh) {
            Ok(()) => structure.attachments.mesh = true,
            Err(e) => warn!("Structure {} has no mesh: {}", id, e),
        }

        let body = BodyDescriptor {
            shape: ShapeDescriptor::Cuboid {
                half_extents: footprint.half_extents,
            },
            mass: 0.0,
            translation: footprint.world_center(position, orientation),
            rotation: orientation.rotation(),
        };
        match backend.add_body(id, &body) {
            Ok(()) => structure.attachments.body = true,
            Err(e) => warn!("Structure {} has no collision body, keeping it visual-only: {}", id, e),
        }

        self.grid.insert(id, structure.bounds());
        self.by_cell.insert((kind, cell_of(position, self.grid_size)), id);
        self.structures.insert(id, structure.clone());

        info!(
            "Created {} {} {} at {:?}",
            material.display_name(),
            kind.display_name(),
            id,
            position
        );

        structure
    }

    pub fn find(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(&id)
    }

    /// Find a structure by kind and placement position
    pub fn find_at(&self, kind: StructureKind, position: Vec3) -> Option<&Structure> {
        if !position.is_finite() {
            return None;
        }
        let id = self.by_cell.get(&(kind, cell_of(position, self.grid_size)))?;
        self.structures.get(id)
    }

    pub fn contains(&self, id: StructureId) -> bool {
        self.structures.contains_key(&id)
    }

    pub(crate) fn get_mut(&mut self, id: StructureId) -> Option<&mut Structure> {
        self.structures.get_mut(&id)
    }

    /// Evict a structure and tear down its mesh and body. Unknown ids are a no-op.
    pub fn remove<B: StructureBackend + ?Sized>(&mut self, id: StructureId, backend: &mut B) -> Option<Structure> {
        let structure = self.structures.remove(&id)?;

        self.grid.remove(id);
        let key = (structure.kind, cell_of(structure.position, self.grid_size));
        if self.by_cell.get(&key) == Some(&id) {
            self.by_cell.remove(&key);
        }

        if structure.attachments.mesh {
            if let Err(e) = backend.remove_from_scene(id) {
                warn!("Failed to remove mesh of structure {}: {}", id, e);
            }
        }
        if structure.attachments.body {
            if let Err(e) = backend.remove_body(id) {
                warn!("Failed to remove body of structure {}: {}", id, e);
            }
        }

        info!("Removed {} {}", structure.kind.display_name(), id);
        Some(structure)
    }

    /// Reduce hit points, clamped at zero. Reaching zero removes the structure and
    /// queues a destruction notification (see [`Self::take_destroyed`]).
    pub fn apply_damage<B: StructureBackend + ?Sized>(
        &mut self,
        id: StructureId,
        amount: f32,
        backend: &mut B,
    ) -> DamageOutcome {
        let Some(structure) = self.structures.get_mut(&id) else {
            return DamageOutcome::NotFound;
        };

        if !(amount > 0.0) {
            return DamageOutcome::Damaged {
                remaining: structure.current_hit_points,
            };
        }

        if structure.under_construction {
            structure.construction_damage += amount;
        }
        structure.current_hit_points = (structure.current_hit_points - amount).max(0.0);

        if structure.current_hit_points > 0.0 {
            return DamageOutcome::Damaged {
                remaining: structure.current_hit_points,
            };
        }

        let Some(destroyed) = self.remove(id, backend) else {
            return DamageOutcome::NotFound;
        };
        info!("{} {} destroyed", destroyed.kind.display_name(), id);
        self.destroyed.push(destroyed.clone());
        DamageOutcome::Destroyed(destroyed)
    }

    /// Drain destruction notifications
    pub fn take_destroyed(&mut self) -> Vec<Structure> {
        std::mem::take(&mut self.destroyed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Structure> {
        self.structures.values()
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    pub fn grid_size(&self) -> f32 {
        self.grid_size
    }
}

impl OverlapQuery for StructureRegistry {
    fn first_overlap(&self, bounds: &Aabb) -> Option<StructureId> {
        self.grid.first_overlap(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Facing;
    use crate::testing::RecordingBackend;

    fn wall_at(registry: &mut StructureRegistry, backend: &mut RecordingBackend, position: Vec3) -> Structure {
        registry.create(
            StructureKind::Wall,
            MaterialKind::Wood,
            position,
            Orientation::new(Facing::AlongZ),
            0.0,
            backend,
        )
    }

    #[test]
    fn test_create_assigns_unique_ids() {
        let mut registry = StructureRegistry::default();
        let mut backend = RecordingBackend::default();

        let a = wall_at(&mut registry, &mut backend, Vec3::ZERO);
        let b = wall_at(&mut registry, &mut backend, Vec3::new(8.0, 0.0, 0.0));

        assert_ne!(a.id, b.id);
        assert_eq!(registry.len(), 2);
        assert_eq!(a.current_hit_points, 0.0);
        assert!(a.under_construction);
        assert_eq!(backend.meshes.len(), 2);
        assert_eq!(backend.physics.len(), 2);
    }

    #[test]
    fn test_find_and_find_at() {
        let mut registry = StructureRegistry::default();
        let mut backend = RecordingBackend::default();
        let wall = wall_at(&mut registry, &mut backend, Vec3::new(4.0, 0.0, -8.0));

        assert_eq!(registry.find(wall.id).map(|s| s.kind), Some(StructureKind::Wall));
        assert_eq!(
            registry.find_at(StructureKind::Wall, Vec3::new(4.0, 0.0, -8.0)).map(|s| s.id),
            Some(wall.id)
        );
        assert!(registry.find_at(StructureKind::Floor, Vec3::new(4.0, 0.0, -8.0)).is_none());
        assert!(registry.find(StructureId(999)).is_none());
    }

    #[test]
    fn test_remove_twice_tears_down_once() {
        let mut registry = StructureRegistry::default();
        let mut backend = RecordingBackend::default();
        let wall = wall_at(&mut registry, &mut backend, Vec3::ZERO);

        assert!(registry.remove(wall.id, &mut backend).is_some());
        assert!(registry.remove(wall.id, &mut backend).is_none());

        assert_eq!(backend.scene_removals, vec![wall.id]);
        assert_eq!(backend.body_removals, vec![wall.id]);
        assert!(registry.first_overlap(&wall.bounds()).is_none());
    }

    #[test]
    fn test_lethal_damage_removes_structure() {
        let mut registry = StructureRegistry::default();
        let mut backend = RecordingBackend::default();
        let wall = wall_at(&mut registry, &mut backend, Vec3::ZERO);
        registry.get_mut(wall.id).unwrap().current_hit_points = 150.0;
        registry.get_mut(wall.id).unwrap().under_construction = false;

        let outcome = registry.apply_damage(wall.id, 200.0, &mut backend);

        assert!(matches!(outcome, DamageOutcome::Destroyed(ref s) if s.id == wall.id && s.current_hit_points == 0.0));
        assert!(registry.find(wall.id).is_none());
        assert_eq!(backend.scene_removals.len(), 1);
        assert_eq!(backend.body_removals.len(), 1);

        let destroyed = registry.take_destroyed();
        assert_eq!(destroyed.len(), 1);
        assert!(registry.take_destroyed().is_empty());
    }

    #[test]
    fn test_partial_damage_keeps_structure() {
        let mut registry = StructureRegistry::default();
        let mut backend = RecordingBackend::default();
        let wall = wall_at(&mut registry, &mut backend, Vec3::ZERO);
        registry.get_mut(wall.id).unwrap().current_hit_points = 150.0;

        let outcome = registry.apply_damage(wall.id, 50.0, &mut backend);
        assert_eq!(outcome, DamageOutcome::Damaged { remaining: 100.0 });
        assert!(backend.scene_removals.is_empty());
    }

    #[test]
    fn test_damage_unknown_id_is_noop() {
        let mut registry = StructureRegistry::default();
        let mut backend = RecordingBackend::default();
        assert_eq!(
            registry.apply_damage(StructureId(42), 10.0, &mut backend),
            DamageOutcome::NotFound
        );
    }

    #[test]
    fn test_physics_failure_keeps_visual_only_structure() {
        let mut registry = StructureRegistry::default();
        let mut backend = RecordingBackend {
            physics_offline: true,
            ..Default::default()
        };
        let wall = wall_at(&mut registry, &mut backend, Vec3::ZERO);

        assert!(registry.contains(wall.id));
        assert!(wall.attachments.mesh);
        assert!(!wall.attachments.body);

        registry.remove(wall.id, &mut backend);
        assert_eq!(backend.scene_removals, vec![wall.id]);
        assert!(backend.body_removals.is_empty());
    }
}
