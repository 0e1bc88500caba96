//! Construction scheduler
//!
//! Ramps hit points of structures under construction. Driven by a monotonic clock
//! passed in each tick, so it has no timers of its own and tests can step it freely.

use bevy::prelude::*;
use std::collections::BTreeSet;

use crate::registry::StructureRegistry;
use crate::structures::StructureId;

/// Working set of structures still being built.
#[derive(Resource, Debug, Default, Clone)]
pub struct ConstructionScheduler {
    in_progress: BTreeSet<StructureId>,
}

impl ConstructionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ramping a freshly created structure
    pub fn track(&mut self, id: StructureId) {
        self.in_progress.insert(id);
    }

    pub fn is_tracking(&self, id: StructureId) -> bool {
        self.in_progress.contains(&id)
    }

    pub fn in_progress_count(&self) -> usize {
        self.in_progress.len()
    }

    /// Advance every tracked structure to `now` (seconds on the host clock).
    ///
    /// Hit points follow `max * progress` minus damage taken while building, clamped
    /// to `[0, max]`. Structures that finish, or that were removed from the registry,
    /// leave the working set. Returns the ids that finished this tick.
    pub fn advance(&mut self, now: f64, registry: &mut StructureRegistry) -> Vec<StructureId> {
        let mut finished = Vec::new();

        self.in_progress.retain(|&id| {
            let Some(structure) = registry.get_mut(id) else {
                return false;
            };
            if !structure.under_construction {
                return false;
            }

            let progress = structure.build_progress(now);
            let ramp = structure.max_hit_points * progress - structure.construction_damage;
            structure.current_hit_points = ramp.clamp(0.0, structure.max_hit_points);

            if progress >= 1.0 {
                structure.under_construction = false;
                debug!(
                    "{} {} finished building with {} HP",
                    structure.kind.display_name(),
                    id,
                    structure.current_hit_points
                );
                finished.push(id);
                return false;
            }
            true
        });

        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Orientation;
    use crate::structures::{MaterialKind, StructureKind};
    use crate::testing::RecordingBackend;

    fn setup(material: MaterialKind) -> (StructureRegistry, ConstructionScheduler, RecordingBackend, StructureId) {
        let mut registry = StructureRegistry::default();
        let mut scheduler = ConstructionScheduler::new();
        let mut backend = RecordingBackend::default();
        let structure = registry.create(
            StructureKind::Wall,
            material,
            Vec3::ZERO,
            Orientation::UNROTATED,
            100.0,
            &mut backend,
        );
        scheduler.track(structure.id);
        (registry, scheduler, backend, structure.id)
    }

    #[test]
    fn test_wood_ramp() {
        let (mut registry, mut scheduler, _backend, id) = setup(MaterialKind::Wood);

        scheduler.advance(102.0, &mut registry);
        let wall = registry.find(id).unwrap();
        assert!((wall.current_hit_points - 75.0).abs() < 1e-3);
        assert!(wall.under_construction);
        assert_eq!(scheduler.in_progress_count(), 1);

        let finished = scheduler.advance(104.5, &mut registry);
        let wall = registry.find(id).unwrap();
        assert_eq!(finished, vec![id]);
        assert_eq!(wall.current_hit_points, 150.0);
        assert!(!wall.under_construction);
        assert_eq!(scheduler.in_progress_count(), 0);

        // No further work once finished
        assert!(scheduler.advance(200.0, &mut registry).is_empty());
        assert_eq!(registry.find(id).unwrap().current_hit_points, 150.0);
    }

    #[test]
    fn test_hit_points_never_exceed_max() {
        let (mut registry, mut scheduler, _backend, id) = setup(MaterialKind::Stone);
        scheduler.advance(10_000.0, &mut registry);
        let wall = registry.find(id).unwrap();
        assert_eq!(wall.current_hit_points, wall.max_hit_points);
    }

    #[test]
    fn test_clock_before_start_stays_at_zero() {
        let (mut registry, mut scheduler, _backend, id) = setup(MaterialKind::Wood);
        scheduler.advance(50.0, &mut registry);
        assert_eq!(registry.find(id).unwrap().current_hit_points, 0.0);
        assert!(scheduler.is_tracking(id));
    }

    #[test]
    fn test_damage_while_building_is_kept() {
        let (mut registry, mut scheduler, mut backend, id) = setup(MaterialKind::Wood);

        scheduler.advance(102.0, &mut registry);
        registry.apply_damage(id, 25.0, &mut backend);
        assert!((registry.find(id).unwrap().current_hit_points - 50.0).abs() < 1e-3);

        scheduler.advance(104.0, &mut registry);
        let wall = registry.find(id).unwrap();
        assert!((wall.current_hit_points - 125.0).abs() < 1e-3);
        assert!(!wall.under_construction);
    }

    #[test]
    fn test_removed_structure_leaves_working_set() {
        let (mut registry, mut scheduler, mut backend, id) = setup(MaterialKind::Metal);
        registry.remove(id, &mut backend);
        assert!(scheduler.advance(101.0, &mut registry).is_empty());
        assert_eq!(scheduler.in_progress_count(), 0);
    }
}
