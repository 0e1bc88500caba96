//! Server-side structure placement and removal
//!
//! The server keeps its own registry, validates every build request against it and the
//! sender's inventory, and relays accepted changes to the other clients.

use bevy::prelude::*;
use lightyear::prelude::*;
use lightyear::prelude::server::*;

use shared::{
    snap, validate_candidate, BodyDescriptor, BuildEvent, BuildRejected, CollaboratorError, ConstructionConfig,
    ConstructionScheduler, DemolishEvent, Inventory, InventoryUpdate, MeshDescriptor, PhysicsWorld,
    PlacementCandidate, PlacementRejection, RayHit, ReliableChannel, ResourceLedger, SceneGraph, StaticBodies,
    StructureId, StructurePlaced, StructureRegistry, StructureRemoved,
};

/// Headless collaborators: no scene, static boxes for physics
#[derive(Resource, Default)]
pub struct HeadlessBackend {
    pub physics: StaticBodies,
}

impl SceneGraph for HeadlessBackend {
    fn add_to_scene(&mut self, _id: StructureId, _mesh: &MeshDescriptor) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn remove_from_scene(&mut self, _id: StructureId) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

impl PhysicsWorld for HeadlessBackend {
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

/// Outcome of one build request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuildOutcome {
    Accepted(StructurePlaced),
    /// Sender's optimistic placement must be undone
    Rejected(BuildRejected),
}

/// Validate and apply a single build request against `inventory`.
pub fn apply_build_request(
    event: &BuildEvent,
    now: f64,
    config: &ConstructionConfig,
    registry: &mut StructureRegistry,
    scheduler: &mut ConstructionScheduler,
    backend: &mut HeadlessBackend,
    inventory: &mut Inventory,
) -> BuildOutcome {
    let candidate = PlacementCandidate {
        position: snap(event.position, config.grid_size),
        orientation: event.orientation,
        kind: event.kind,
        material: event.material,
    };

    if let Err(reason) = validate_candidate(&candidate, &*registry, &*inventory) {
        info!("Rejected {} at {:?}: {}", candidate.kind.display_name(), candidate.position, reason);
        let occupant = match reason {
            PlacementRejection::Overlap { existing } => registry.find(existing).map(StructurePlaced::from),
            _ => None,
        };
        return BuildOutcome::Rejected(BuildRejected {
            kind: candidate.kind,
            position: candidate.position,
            occupant,
        });
    }

    inventory.debit(candidate.material, candidate.cost());
    let structure = registry.create(
        candidate.kind,
        candidate.material,
        candidate.position,
        candidate.orientation,
        now,
        backend,
    );
    scheduler.track(structure.id);

    BuildOutcome::Accepted(StructurePlaced::from(&structure))
}

/// Remove the structure a demolish request names. Returns the removal to relay, or
/// `None` if nothing of that kind sits in the snapped cell.
pub fn apply_demolish_request(
    event: &DemolishEvent,
    config: &ConstructionConfig,
    registry: &mut StructureRegistry,
    backend: &mut HeadlessBackend,
) -> Option<StructureRemoved> {
    let position = snap(event.position, config.grid_size);
    let id = registry.find_at(event.kind, position)?.id;
    registry.remove(id, backend)?;
    Some(StructureRemoved {
        kind: event.kind,
        position,
    })
}

/// Handle build requests from clients
#[allow(clippy::too_many_arguments)]
pub fn handle_build_events(
    time: Res<Time>,
    config: Res<ConstructionConfig>,
    mut registry: ResMut<StructureRegistry>,
    mut scheduler: ResMut<ConstructionScheduler>,
    mut backend: ResMut<HeadlessBackend>,
    mut clients: Query<(Entity, &RemoteId, &mut MessageReceiver<BuildEvent>, &mut Inventory), With<ClientOf>>,
    mut placed_senders: Query<(Entity, &mut MessageSender<StructurePlaced>), With<ClientOf>>,
    mut rejected_senders: Query<&mut MessageSender<BuildRejected>, With<ClientOf>>,
    mut inventory_senders: Query<&mut MessageSender<InventoryUpdate>, With<ClientOf>>,
) {
    let now = time.elapsed_secs_f64();
    let mut accepted = Vec::new();

    for (client_entity, remote_id, mut receiver, mut inventory) in clients.iter_mut() {
        let mut touched = false;

        for event in receiver.receive() {
            info!(
                "Build request from {:?}: {} {} at {:?}",
                remote_id.0,
                event.material.display_name(),
                event.kind.display_name(),
                event.position
            );
            touched = true;

            match apply_build_request(
                &event,
                now,
                &config,
                &mut registry,
                &mut scheduler,
                &mut backend,
                &mut inventory,
            ) {
                BuildOutcome::Accepted(placed) => accepted.push((client_entity, placed)),
                BuildOutcome::Rejected(rejected) => {
                    if let Ok(mut sender) = rejected_senders.get_mut(client_entity) {
                        sender.send::<ReliableChannel>(rejected);
                    }
                }
            }
        }

        if touched {
            if let Ok(mut sender) = inventory_senders.get_mut(client_entity) {
                sender.send::<ReliableChannel>(InventoryUpdate {
                    inventory: inventory.clone(),
                });
            }
        }
    }

    for (origin, placed) in accepted {
        for (client_entity, mut sender) in placed_senders.iter_mut() {
            if client_entity != origin {
                sender.send::<ReliableChannel>(placed);
            }
        }
    }
}

/// Handle structures destroyed on a client
pub fn handle_demolish_events(
    mut registry: ResMut<StructureRegistry>,
    mut backend: ResMut<HeadlessBackend>,
    config: Res<ConstructionConfig>,
    mut clients: Query<(Entity, &RemoteId, &mut MessageReceiver<DemolishEvent>), With<ClientOf>>,
    mut removed_senders: Query<(Entity, &mut MessageSender<StructureRemoved>), With<ClientOf>>,
) {
    let mut removed = Vec::new();

    for (client_entity, remote_id, mut receiver) in clients.iter_mut() {
        for event in receiver.receive() {
            let Some(message) = apply_demolish_request(&event, &config, &mut registry, &mut backend) else {
                debug!("Demolish from {:?} for unknown {} at {:?}", remote_id.0, event.kind.display_name(), event.position);
                continue;
            };
            info!("Client {:?} demolished {} at {:?}", remote_id.0, event.kind.display_name(), message.position);
            removed.push((client_entity, message));
        }
    }

    for (origin, message) in removed {
        for (client_entity, mut sender) in removed_senders.iter_mut() {
            if client_entity != origin {
                sender.send::<ReliableChannel>(message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{MaterialKind, Orientation, StructureKind};

    fn build(kind: StructureKind, position: Vec3) -> BuildEvent {
        BuildEvent {
            kind,
            material: MaterialKind::Wood,
            position,
            orientation: Orientation::UNROTATED,
        }
    }

    struct Host {
        config: ConstructionConfig,
        registry: StructureRegistry,
        scheduler: ConstructionScheduler,
        backend: HeadlessBackend,
    }

    impl Host {
        fn new() -> Self {
            Self {
                config: ConstructionConfig::default(),
                registry: StructureRegistry::default(),
                scheduler: ConstructionScheduler::new(),
                backend: HeadlessBackend::default(),
            }
        }

        fn apply(&mut self, event: BuildEvent, inventory: &mut Inventory) -> BuildOutcome {
            apply_build_request(
                &event,
                0.0,
                &self.config,
                &mut self.registry,
                &mut self.scheduler,
                &mut self.backend,
                inventory,
            )
        }
    }

    #[test]
    fn test_accepted_build_debits_and_snaps() {
        let mut host = Host::new();
        let mut inventory = Inventory::with_materials(&[(MaterialKind::Wood, 30)]);

        let outcome = host.apply(build(StructureKind::Wall, Vec3::new(3.9, 0.2, -0.3)), &mut inventory);

        assert!(matches!(outcome, BuildOutcome::Accepted(placed) if placed.position == Vec3::new(4.0, 0.0, 0.0)));
        assert_eq!(inventory.count(MaterialKind::Wood), 20);
        assert_eq!(host.registry.len(), 1);
        assert_eq!(host.scheduler.in_progress_count(), 1);
        assert_eq!(host.backend.physics.len(), 1);
    }

    #[test]
    fn test_overlapping_build_is_rejected_with_occupant() {
        let mut host = Host::new();
        let mut inventory = Inventory::with_materials(&[(MaterialKind::Wood, 30)]);

        host.apply(build(StructureKind::Wall, Vec3::ZERO), &mut inventory);
        let outcome = host.apply(build(StructureKind::Floor, Vec3::ZERO), &mut inventory);

        assert_eq!(
            outcome,
            BuildOutcome::Rejected(BuildRejected {
                kind: StructureKind::Floor,
                position: Vec3::ZERO,
                occupant: Some(StructurePlaced {
                    kind: StructureKind::Wall,
                    material: MaterialKind::Wood,
                    position: Vec3::ZERO,
                    orientation: Orientation::UNROTATED,
                }),
            })
        );
        assert_eq!(inventory.count(MaterialKind::Wood), 20);
        assert_eq!(host.registry.len(), 1);
    }

    #[test]
    fn test_non_finite_build_is_rejected() {
        let mut host = Host::new();
        let mut inventory = Inventory::with_materials(&[(MaterialKind::Wood, 30)]);
        host.apply(build(StructureKind::Wall, Vec3::ZERO), &mut inventory);

        for position in [Vec3::new(f32::NAN, 0.0, 0.0), Vec3::new(0.0, 0.0, f32::NEG_INFINITY)] {
            let outcome = host.apply(build(StructureKind::Wall, position), &mut inventory);
            assert!(matches!(outcome, BuildOutcome::Rejected(BuildRejected { occupant: None, .. })));
        }
        assert_eq!(host.registry.len(), 1);
        assert_eq!(inventory.count(MaterialKind::Wood), 20);

        // The real wall still answers for its cell
        let demolish = DemolishEvent {
            kind: StructureKind::Wall,
            position: Vec3::ZERO,
        };
        assert!(apply_demolish_request(&demolish, &host.config, &mut host.registry, &mut host.backend).is_some());
        assert!(host.registry.is_empty());
    }

    #[test]
    fn test_demolish_removes_snapped_structure() {
        let mut host = Host::new();
        let mut inventory = Inventory::with_materials(&[(MaterialKind::Wood, 30)]);
        host.apply(build(StructureKind::Wall, Vec3::new(4.0, 0.0, 0.0)), &mut inventory);

        let demolish = DemolishEvent {
            kind: StructureKind::Wall,
            position: Vec3::new(4.3, 0.1, -0.2),
        };
        let removed = apply_demolish_request(&demolish, &host.config, &mut host.registry, &mut host.backend);

        assert_eq!(
            removed,
            Some(StructureRemoved {
                kind: StructureKind::Wall,
                position: Vec3::new(4.0, 0.0, 0.0),
            })
        );
        assert!(host.registry.is_empty());
        assert!(host.backend.physics.is_empty());
    }

    #[test]
    fn test_demolish_of_unknown_structure_is_ignored() {
        let mut host = Host::new();
        let mut inventory = Inventory::with_materials(&[(MaterialKind::Wood, 30)]);
        host.apply(build(StructureKind::Wall, Vec3::ZERO), &mut inventory);

        for (kind, position) in [
            (StructureKind::Floor, Vec3::ZERO),
            (StructureKind::Wall, Vec3::new(8.0, 0.0, 0.0)),
            (StructureKind::Wall, Vec3::new(f32::NAN, 0.0, 0.0)),
        ] {
            let demolish = DemolishEvent { kind, position };
            assert!(apply_demolish_request(&demolish, &host.config, &mut host.registry, &mut host.backend).is_none());
        }
        assert_eq!(host.registry.len(), 1);
    }

    #[test]
    fn test_unaffordable_build_is_rejected() {
        let mut host = Host::new();
        let mut inventory = Inventory::new();

        let outcome = host.apply(build(StructureKind::Ramp, Vec3::ZERO), &mut inventory);
        assert!(matches!(outcome, BuildOutcome::Rejected(_)));
        assert!(host.registry.is_empty());
    }
}
