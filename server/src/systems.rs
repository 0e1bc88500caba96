//! Server-side connection handling
//!
//! Updated for Lightyear 0.25

use bevy::prelude::*;
use lightyear::prelude::*;
use lightyear::prelude::server::*;

use shared::{
    BuildEvent, BuildRejected, ConstructionConfig, DemolishEvent, Inventory, InventoryUpdate, ReliableChannel,
    StructurePlaced, StructureRegistry, StructureRemoved,
};

/// Handle new client connections - setup message channels and the player's materials
/// In Lightyear 0.25, we query for newly added ClientOf + Connected entities
pub fn handle_connections(
    mut commands: Commands,
    config: Res<ConstructionConfig>,
    // Query for client links that just got Connected
    new_clients: Query<(Entity, &RemoteId), Added<Connected>>,
    // Filter to only get client links (not the server itself)
    client_filter: Query<(), With<ClientOf>>,
) {
    for (client_entity, remote_id) in new_clients.iter() {
        if client_filter.get(client_entity).is_err() {
            continue;
        }

        info!("Client connected: {:?}", remote_id.0);

        commands.entity(client_entity).insert((
            config.starting_inventory(),
            // Client -> Server
            MessageReceiver::<BuildEvent>::default(),
            MessageReceiver::<DemolishEvent>::default(),
            // Server -> Client
            MessageSender::<StructurePlaced>::default(),
            MessageSender::<StructureRemoved>::default(),
            MessageSender::<BuildRejected>::default(),
            MessageSender::<InventoryUpdate>::default(),
        ));
    }
}

/// Every structure as the message a joining client needs to recreate it
pub fn world_snapshot(registry: &StructureRegistry) -> Vec<StructurePlaced> {
    registry.iter().map(StructurePlaced::from).collect()
}

/// Send the current world and the player's materials to links whose senders just
/// came up
pub fn sync_new_clients(
    registry: Res<StructureRegistry>,
    mut new_links: Query<
        (
            &RemoteId,
            &Inventory,
            &mut MessageSender<StructurePlaced>,
            &mut MessageSender<InventoryUpdate>,
        ),
        (With<ClientOf>, Added<MessageSender<StructurePlaced>>),
    >,
) {
    if new_links.is_empty() {
        return;
    }
    let snapshot = world_snapshot(&registry);

    for (remote_id, inventory, mut placed_sender, mut inventory_sender) in new_links.iter_mut() {
        for placed in &snapshot {
            placed_sender.send::<ReliableChannel>(*placed);
        }
        inventory_sender.send::<ReliableChannel>(InventoryUpdate {
            inventory: inventory.clone(),
        });

        info!("Sent {} structures to {:?}", snapshot.len(), remote_id.0);
    }
}

/// Log disconnects. Structures a player built stay in the world.
pub fn handle_disconnections(trigger: On<Add, Disconnected>, client_entities: Query<&RemoteId>) {
    match client_entities.get(trigger.entity) {
        Ok(remote_id) => info!("Client {:?} disconnected", remote_id.0),
        Err(_) => warn!("Disconnect trigger for entity {:?} but no RemoteId found", trigger.entity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{MaterialKind, Orientation, StaticBodies, StructureKind};

    #[test]
    fn test_snapshot_lists_every_structure() {
        let mut registry = StructureRegistry::default();
        let mut backend = crate::building::HeadlessBackend {
            physics: StaticBodies::without_ground(),
        };
        assert!(world_snapshot(&registry).is_empty());

        let wall = registry.create(
            StructureKind::Wall,
            MaterialKind::Stone,
            Vec3::new(4.0, 0.0, 0.0),
            Orientation::UNROTATED.with_quarter_turns(1),
            0.0,
            &mut backend,
        );
        registry.create(
            StructureKind::Floor,
            MaterialKind::Wood,
            Vec3::new(0.0, 4.0, 0.0),
            Orientation::UNROTATED,
            0.0,
            &mut backend,
        );

        let snapshot = world_snapshot(&registry);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains(&StructurePlaced {
            kind: StructureKind::Wall,
            material: MaterialKind::Stone,
            position: Vec3::new(4.0, 0.0, 0.0),
            orientation: wall.orientation,
        }));
        assert!(snapshot
            .iter()
            .any(|p| p.kind == StructureKind::Floor && p.position == Vec3::new(0.0, 4.0, 0.0)));
    }
}
