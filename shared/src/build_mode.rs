//! Build mode controller
//!
//! Host-independent state machine behind the build tool. Each frame the host feeds it an
//! aim ray and it recomputes the placement candidate; on commit it drives the ledger,
//! registry, scheduler and network in one synchronous sequence.

use bevy::prelude::*;

use crate::collaborators::{AimRay, NetworkTransport, PhysicsWorld, RayHit, ResourceLedger, StructureBackend};
use crate::config::ConstructionConfig;
use crate::construction::ConstructionScheduler;
use crate::grid::{orientation_from_normal, snap};
use crate::protocol::BuildEvent;
use crate::registry::StructureRegistry;
use crate::structures::{MaterialKind, Structure, StructureKind};
use crate::validation::{validate_candidate, OverlapQuery, PlacementCandidate, PlacementRejection};

/// Externally visible state of the build tool
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuildModeState {
    Inactive,
    /// Build mode is on but the aim ray hit nothing within reach
    NoTarget,
    Valid,
    Invalid(PlacementRejection),
}

/// Latest candidate and its validation result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preview {
    pub candidate: PlacementCandidate,
    pub verdict: Result<(), PlacementRejection>,
}

impl Preview {
    pub fn is_valid(&self) -> bool {
        self.verdict.is_ok()
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub struct BuildModeController {
    active: bool,
    selected_kind: StructureKind,
    selected_material: MaterialKind,
    /// Player-added yaw on top of the surface-derived orientation
    quarter_turns: u8,
    preview: Option<Preview>,
}

impl BuildModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn enter(&mut self) {
        if !self.active {
            info!("Build mode on ({})", self.selected_kind.display_name());
        }
        self.active = true;
    }

    /// Leave build mode. Only the preview is discarded.
    pub fn exit(&mut self) {
        if self.active {
            info!("Build mode off");
        }
        self.active = false;
        self.preview = None;
    }

    pub fn toggle(&mut self) {
        if self.active {
            self.exit();
        } else {
            self.enter();
        }
    }

    pub fn select_kind(&mut self, kind: StructureKind) {
        self.selected_kind = kind;
    }

    pub fn select_material(&mut self, material: MaterialKind) {
        self.selected_material = material;
    }

    /// Add a 90° turn to subsequent previews
    pub fn rotate(&mut self) {
        self.quarter_turns = (self.quarter_turns + 1) % 4;
    }

    pub fn selected_kind(&self) -> StructureKind {
        self.selected_kind
    }

    pub fn selected_material(&self) -> MaterialKind {
        self.selected_material
    }

    pub fn quarter_turns(&self) -> u8 {
        self.quarter_turns
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn state(&self) -> BuildModeState {
        if !self.active {
            return BuildModeState::Inactive;
        }
        match self.preview {
            None => BuildModeState::NoTarget,
            Some(Preview { verdict: Ok(()), .. }) => BuildModeState::Valid,
            Some(Preview { verdict: Err(reason), .. }) => BuildModeState::Invalid(reason),
        }
    }

    /// Candidate for the current selection placed against `hit`.
    ///
    /// The hit point is pushed off the surface before snapping: half a cell sideways so
    /// building against a wall lands in the neighbouring cell, a quarter cell vertically
    /// so stacking on top of a piece rounds up to its top face.
    ///
    /// Pieces own whole cells. A floor's top face sits well below the next grid level,
    /// so aiming at it resolves to the floor's own cell and any piece previewed there
    /// overlaps the floor. Build the next storey by aiming at a wall's top instead.
    pub fn candidate_from_hit(&self, hit: &RayHit, grid_size: f32) -> PlacementCandidate {
        let normal = hit.normal.normalize_or_zero();
        let push = Vec3::new(normal.x * 0.5, normal.y * 0.25, normal.z * 0.5) * grid_size;
        let position = if hit.structure.is_some() {
            snap(hit.point + push, grid_size)
        } else {
            snap(hit.point, grid_size)
        };

        PlacementCandidate {
            position,
            orientation: orientation_from_normal(normal).with_quarter_turns(self.quarter_turns),
            kind: self.selected_kind,
            material: self.selected_material,
        }
    }

    /// Recompute the preview from this frame's aim ray.
    pub fn update_preview<P, Q, L>(
        &mut self,
        aim: AimRay,
        physics: &P,
        existing: &Q,
        ledger: &L,
        config: &ConstructionConfig,
    ) -> BuildModeState
    where
        P: PhysicsWorld + ?Sized,
        Q: OverlapQuery + ?Sized,
        L: ResourceLedger + ?Sized,
    {
        if !self.active {
            return BuildModeState::Inactive;
        }

        self.preview = physics.raycast(aim.origin, aim.point_at(config.reach)).map(|hit| {
            let candidate = self.candidate_from_hit(&hit, config.grid_size);
            let verdict = validate_candidate(&candidate, existing, ledger);
            Preview { candidate, verdict }
        });

        self.state()
    }

    /// Place the previewed candidate.
    ///
    /// Re-validates against the current registry and ledger first; a rejection (or no
    /// preview) is a silent no-op. On success the ledger is debited, the structure is
    /// created and scheduled, and a build event goes out. A failed send is logged and
    /// the placement stands.
    #[allow(clippy::too_many_arguments)]
    pub fn commit<B, L, N>(
        &mut self,
        now: f64,
        registry: &mut StructureRegistry,
        scheduler: &mut ConstructionScheduler,
        backend: &mut B,
        ledger: &mut L,
        network: &mut N,
    ) -> Option<Structure>
    where
        B: StructureBackend + ?Sized,
        L: ResourceLedger + ?Sized,
        N: NetworkTransport + ?Sized,
    {
        if !self.active {
            return None;
        }
        let candidate = self.preview?.candidate;

        if let Err(reason) = validate_candidate(&candidate, &*registry, &*ledger) {
            debug!("Placement rejected: {}", reason);
            self.preview = Some(Preview {
                candidate,
                verdict: Err(reason),
            });
            return None;
        }

        ledger.debit(candidate.material, candidate.cost());
        let structure = registry.create(
            candidate.kind,
            candidate.material,
            candidate.position,
            candidate.orientation,
            now,
            backend,
        );
        scheduler.track(structure.id);

        let event = BuildEvent {
            kind: candidate.kind,
            material: candidate.material,
            position: candidate.position,
            orientation: candidate.orientation,
        };
        if let Err(e) = network.send(event) {
            warn!("Structure {} was not replicated: {}", structure.id, e);
        }

        // The spot is now taken; the next update_preview will show it
        self.preview = Some(Preview {
            candidate,
            verdict: Err(PlacementRejection::Overlap { existing: structure.id }),
        });

        Some(structure)
    }
}
