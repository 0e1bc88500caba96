//! Placement validation
//!
//! Decides whether a candidate piece may be committed: the player must afford it and
//! its bounds must not overlap anything already built. Validation never mutates the
//! ledger or the registry, so it is safe to run every frame for the preview.

use bevy::prelude::*;
use thiserror::Error;

use crate::collaborators::ResourceLedger;
use crate::grid::Orientation;
use crate::spatial::Aabb;
use crate::structures::{build_cost, MaterialKind, Structure, StructureId, StructureKind};

/// A placement being previewed. Recomputed each frame, dropped once committed or
/// abandoned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementCandidate {
    pub position: Vec3,
    pub orientation: Orientation,
    pub kind: StructureKind,
    pub material: MaterialKind,
}

impl PlacementCandidate {
    pub fn bounds(&self) -> Aabb {
        self.kind.footprint().world_bounds(self.position, self.orientation)
    }

    pub fn cost(&self) -> u32 {
        build_cost(self.kind, self.material)
    }
}

/// Why a placement was refused. These are ordinary outcomes, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlacementRejection {
    #[error("not enough {material:?}: need {required}, have {available}")]
    InsufficientResources {
        material: MaterialKind,
        required: u32,
        available: u32,
    },

    #[error("overlaps structure {existing}")]
    Overlap { existing: StructureId },

    #[error("position is not a finite point")]
    InvalidPosition,
}

/// Anything that can answer "what already occupies these bounds?"
///
/// Slices answer by brute force; the registry answers from its spatial grid.
pub trait OverlapQuery {
    fn first_overlap(&self, bounds: &Aabb) -> Option<StructureId>;
}

impl OverlapQuery for [Structure] {
    fn first_overlap(&self, bounds: &Aabb) -> Option<StructureId> {
        self.iter()
            .find(|structure| structure.bounds().intersects(bounds))
            .map(|structure| structure.id)
    }
}

impl OverlapQuery for Vec<Structure> {
    fn first_overlap(&self, bounds: &Aabb) -> Option<StructureId> {
        self.as_slice().first_overlap(bounds)
    }
}

/// Validate a candidate with explicit bounds and cost.
pub fn validate<Q, L>(
    candidate: &PlacementCandidate,
    footprint_bounds: &Aabb,
    existing: &Q,
    ledger: &L,
    cost: u32,
) -> Result<(), PlacementRejection>
where
    Q: OverlapQuery + ?Sized,
    L: ResourceLedger + ?Sized,
{
    // NaN bounds intersect nothing and NaN cells collapse onto the origin
    if !candidate.position.is_finite() {
        return Err(PlacementRejection::InvalidPosition);
    }

    let available = ledger.get(candidate.material);
    if available < cost {
        return Err(PlacementRejection::InsufficientResources {
            material: candidate.material,
            required: cost,
            available,
        });
    }

    if let Some(existing) = existing.first_overlap(footprint_bounds) {
        return Err(PlacementRejection::Overlap { existing });
    }

    Ok(())
}

/// Validate a candidate using its kind's footprint and the material cost table.
pub fn validate_candidate<Q, L>(
    candidate: &PlacementCandidate,
    existing: &Q,
    ledger: &L,
) -> Result<(), PlacementRejection>
where
    Q: OverlapQuery + ?Sized,
    L: ResourceLedger + ?Sized,
{
    validate(candidate, &candidate.bounds(), existing, ledger, candidate.cost())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Facing;
    use crate::items::Inventory;

    fn candidate(kind: StructureKind, position: Vec3) -> PlacementCandidate {
        PlacementCandidate {
            position,
            orientation: Orientation::new(Facing::AlongZ),
            kind,
            material: MaterialKind::Wood,
        }
    }

    fn placed(id: u64, kind: StructureKind, position: Vec3) -> Structure {
        Structure::new(
            StructureId(id),
            kind,
            MaterialKind::Wood,
            position,
            Orientation::new(Facing::AlongZ),
            0.0,
        )
    }

    #[test]
    fn test_insufficient_resources() {
        let ledger = Inventory::with_materials(&[(MaterialKind::Wood, 5)]);
        let wall = candidate(StructureKind::Wall, Vec3::ZERO);
        let existing: Vec<Structure> = Vec::new();

        let result = validate(&wall, &wall.bounds(), &existing, &ledger, 10);
        assert_eq!(
            result,
            Err(PlacementRejection::InsufficientResources {
                material: MaterialKind::Wood,
                required: 10,
                available: 5,
            })
        );
        assert_eq!(ledger.get(MaterialKind::Wood), 5);
    }

    #[test]
    fn test_floor_overlapping_wall() {
        let ledger = Inventory::with_materials(&[(MaterialKind::Wood, 100)]);
        let existing = vec![placed(1, StructureKind::Wall, Vec3::ZERO)];

        let floor = candidate(StructureKind::Floor, Vec3::ZERO);
        assert_eq!(
            validate_candidate(&floor, &existing, &ledger),
            Err(PlacementRejection::Overlap { existing: StructureId(1) })
        );
    }

    #[test]
    fn test_adjacent_floors_are_valid() {
        let ledger = Inventory::with_materials(&[(MaterialKind::Wood, 100)]);
        let existing = vec![placed(1, StructureKind::Floor, Vec3::ZERO)];

        let next = candidate(StructureKind::Floor, Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(validate_candidate(&next, &existing, &ledger), Ok(()));

        let above = candidate(StructureKind::Floor, Vec3::new(0.0, 4.0, 0.0));
        assert_eq!(validate_candidate(&above, &existing, &ledger), Ok(()));
    }

    #[test]
    fn test_resources_checked_before_overlap() {
        let ledger = Inventory::default();
        let existing = vec![placed(1, StructureKind::Wall, Vec3::ZERO)];
        let wall = candidate(StructureKind::Wall, Vec3::ZERO);

        assert!(matches!(
            validate_candidate(&wall, &existing, &ledger),
            Err(PlacementRejection::InsufficientResources { .. })
        ));
    }

    #[test]
    fn test_non_finite_position_is_rejected() {
        let ledger = Inventory::with_materials(&[(MaterialKind::Wood, 100)]);
        let existing = vec![placed(1, StructureKind::Wall, Vec3::ZERO)];

        for position in [Vec3::new(f32::NAN, 0.0, 0.0), Vec3::new(0.0, f32::INFINITY, 0.0)] {
            let wall = candidate(StructureKind::Wall, position);
            assert_eq!(
                validate_candidate(&wall, &existing, &ledger),
                Err(PlacementRejection::InvalidPosition)
            );
        }
    }
}
