//! Connection systems
//!
//! Server link, outbound build events and inbound structure replication.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use lightyear::prelude::*;
use lightyear::prelude::client::*;
use std::net::SocketAddr;

use shared::{
    apply_build_rejected, apply_structure_placed, apply_structure_removed, publish_destroyed, BuildEvent,
    BuildRejected, CollaboratorError, ConstructionScheduler, ConstructionSet, DemolishEvent, Inventory,
    InventoryUpdate, NetworkTransport, ReliableChannel, StructureDestroyed, StructurePlaced, StructureRegistry,
    StructureRemoved, PRIVATE_KEY, PROTOCOL_ID, SERVER_ADDR, SERVER_PORT,
};

use crate::structures::ClientBackend;

/// Marker component for our client entity
#[derive(Component)]
pub struct BuildClient;

pub struct ConnectionPlugin;

impl Plugin for ConnectionPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, start_connection);
        app.add_systems(Update, check_connection);
        app.add_systems(
            Update,
            (
                receive_structure_placed,
                receive_build_rejected,
                receive_structure_removed,
                receive_inventory_update,
            )
                .chain()
                .in_set(ConstructionSet::Commit),
        );
        app.add_systems(
            Update,
            send_demolish_events
                .after(publish_destroyed)
                .in_set(ConstructionSet::Notify),
        );
    }
}

/// Start connection to server
/// In Lightyear 0.25, we spawn a Client entity with the appropriate networking components
/// and then trigger the Connect event to initiate the connection
fn start_connection(mut commands: Commands) {
    let server_addr: SocketAddr = match format!("{}:{}", SERVER_ADDR, SERVER_PORT).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid server address, building offline: {}", e);
            return;
        }
    };
    let local_addr = SocketAddr::from(([0, 0, 0, 0], 0));

    let client_id = rand::random::<u64>();
    let auth = Authentication::Manual {
        server_addr,
        protocol_id: PROTOCOL_ID,
        private_key: PRIVATE_KEY,
        client_id,
    };
    let netcode = match NetcodeClient::new(auth, NetcodeConfig::default()) {
        Ok(netcode) => netcode,
        Err(e) => {
            error!("Failed to create netcode client, building offline: {:?}", e);
            return;
        }
    };

    info!("Connecting to {} as client {}", server_addr, client_id);

    let client_entity = commands
        .spawn((
            BuildClient,
            Client::default(),
            UdpIo::default(),
            LocalAddr(local_addr),
            PeerAddr(server_addr),
            netcode,
            // Client -> Server
            MessageSender::<BuildEvent>::default(),
            MessageSender::<DemolishEvent>::default(),
            // Server -> Client
            MessageReceiver::<StructurePlaced>::default(),
            MessageReceiver::<StructureRemoved>::default(),
            MessageReceiver::<BuildRejected>::default(),
            MessageReceiver::<InventoryUpdate>::default(),
        ))
        .id();

    commands.trigger(Connect { entity: client_entity });
}

/// Log connection changes
fn check_connection(
    new_connections: Query<Entity, (With<BuildClient>, Added<Connected>)>,
    new_disconnections: Query<Entity, (With<BuildClient>, Added<Disconnected>)>,
) {
    for _entity in new_connections.iter() {
        info!("Connected to server!");
    }
    for _entity in new_disconnections.iter() {
        warn!("Disconnected from server, building offline");
    }
}

/// [`NetworkTransport`] over the connected client entity
#[derive(SystemParam)]
pub struct ServerLink<'w, 's> {
    senders: Query<'w, 's, &'static mut MessageSender<BuildEvent>, (With<BuildClient>, With<Connected>)>,
}

impl NetworkTransport for ServerLink<'_, '_> {
    fn send(&mut self, event: BuildEvent) -> Result<(), CollaboratorError> {
        let Ok(mut sender) = self.senders.single_mut() else {
            return Err(CollaboratorError::Unavailable("network"));
        };
        sender.send::<ReliableChannel>(event);
        Ok(())
    }
}

/// Create structures other players placed
fn receive_structure_placed(
    time: Res<Time>,
    mut registry: ResMut<StructureRegistry>,
    mut scheduler: ResMut<ConstructionScheduler>,
    mut backend: ClientBackend,
    mut receivers: Query<&mut MessageReceiver<StructurePlaced>, With<BuildClient>>,
) {
    let now = time.elapsed_secs_f64();
    for mut receiver in receivers.iter_mut() {
        for placed in receiver.receive() {
            apply_structure_placed(&placed, now, &mut registry, &mut scheduler, &mut backend);
        }
    }
}

/// Swap our refused builds for what the server actually has there
fn receive_build_rejected(
    time: Res<Time>,
    mut registry: ResMut<StructureRegistry>,
    mut scheduler: ResMut<ConstructionScheduler>,
    mut backend: ClientBackend,
    mut receivers: Query<&mut MessageReceiver<BuildRejected>, With<BuildClient>>,
) {
    let now = time.elapsed_secs_f64();
    for mut receiver in receivers.iter_mut() {
        for rejected in receiver.receive() {
            apply_build_rejected(&rejected, now, &mut registry, &mut scheduler, &mut backend);
        }
    }
}

/// Remove structures destroyed elsewhere
fn receive_structure_removed(
    mut registry: ResMut<StructureRegistry>,
    mut backend: ClientBackend,
    mut receivers: Query<&mut MessageReceiver<StructureRemoved>, With<BuildClient>>,
) {
    for mut receiver in receivers.iter_mut() {
        for removed in receiver.receive() {
            apply_structure_removed(&removed, &mut registry, &mut backend);
        }
    }
}

/// Take the server's material counts over our optimistic ones
fn receive_inventory_update(
    mut inventory: ResMut<Inventory>,
    mut receivers: Query<&mut MessageReceiver<InventoryUpdate>, With<BuildClient>>,
) {
    for mut receiver in receivers.iter_mut() {
        if let Some(update) = receiver.receive().last() {
            *inventory = update.inventory;
        }
    }
}

/// Tell the server about structures we destroyed
fn send_demolish_events(
    mut destroyed: MessageReader<StructureDestroyed>,
    mut senders: Query<&mut MessageSender<DemolishEvent>, (With<BuildClient>, With<Connected>)>,
) {
    let Ok(mut sender) = senders.single_mut() else {
        destroyed.clear();
        return;
    };
    for StructureDestroyed { structure } in destroyed.read() {
        sender.send::<ReliableChannel>(DemolishEvent {
            kind: structure.kind,
            position: structure.position,
        });
    }
}
