//! Applying server messages to a peer's registry
//!
//! Inbound structures go straight through [`StructureRegistry::create`] and never touch
//! validation, the local ledger or the network. Positions are snapped to the registry's
//! grid before lookup so `(kind, cell)` names the same structure on every peer.

use bevy::prelude::*;

use crate::collaborators::StructureBackend;
use crate::construction::ConstructionScheduler;
use crate::grid::snap;
use crate::protocol::{BuildRejected, StructurePlaced, StructureRemoved};
use crate::registry::StructureRegistry;
use crate::structures::{Structure, StructureId};

/// Create a structure another player placed. Returns `None` if the cell already holds
/// one of that kind or the position is garbage.
pub fn apply_structure_placed<B>(
    placed: &StructurePlaced,
    now: f64,
    registry: &mut StructureRegistry,
    scheduler: &mut ConstructionScheduler,
    backend: &mut B,
) -> Option<StructureId>
where
    B: StructureBackend + ?Sized,
{
    if !placed.position.is_finite() {
        warn!("Ignoring {} at non-finite position", placed.kind.display_name());
        return None;
    }
    let position = snap(placed.position, registry.grid_size());
    if registry.find_at(placed.kind, position).is_some() {
        return None;
    }

    let structure = registry.create(placed.kind, placed.material, position, placed.orientation, now, backend);
    scheduler.track(structure.id);
    Some(structure.id)
}

/// Remove the structure a removal message names, if we have it
pub fn apply_structure_removed<B>(
    removed: &StructureRemoved,
    registry: &mut StructureRegistry,
    backend: &mut B,
) -> Option<Structure>
where
    B: StructureBackend + ?Sized,
{
    let position = snap(removed.position, registry.grid_size());
    let Some(id) = registry.find_at(removed.kind, position).map(|s| s.id) else {
        debug!("Removal of unknown {} at {:?}", removed.kind.display_name(), position);
        return None;
    };
    registry.remove(id, backend)
}

/// Undo our refused build and adopt whatever the server has in its place.
///
/// Works whether the occupant's own `StructurePlaced` was seen before (and skipped
/// because our copy held the cell) or arrives later.
pub fn apply_build_rejected<B>(
    rejected: &BuildRejected,
    now: f64,
    registry: &mut StructureRegistry,
    scheduler: &mut ConstructionScheduler,
    backend: &mut B,
) where
    B: StructureBackend + ?Sized,
{
    let removed = StructureRemoved {
        kind: rejected.kind,
        position: rejected.position,
    };
    if apply_structure_removed(&removed, registry, backend).is_some() {
        info!("Server refused our {} at {:?}", rejected.kind.display_name(), rejected.position);
    }

    if let Some(occupant) = rejected.occupant {
        apply_structure_placed(&occupant, now, registry, scheduler, backend);
    }
}
