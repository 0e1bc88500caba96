//! Build server - headless Bevy app that owns the authoritative structure registry
//!
//! Updated for Lightyear 0.25 / Bevy 0.17

mod building;
mod systems;

use bevy::prelude::*;
use bevy::app::ScheduleRunnerPlugin;
use lightyear::prelude::*;
use lightyear::prelude::server::*;
// UDP/Netcode types re-exported through prelude::server (when features enabled)
use shared::{
    get_server_bind_addr, tick_duration, ConstructionPlugin, ConstructionSet, ProtocolPlugin, PRIVATE_KEY,
    PROTOCOL_ID, SERVER_PORT,
};
use std::net::SocketAddr;

use building::HeadlessBackend;

/// Marker for our server entity
#[derive(Component)]
struct BuildServer;

/// Spawn the server entity with all required networking components
fn spawn_server(mut commands: Commands) {
    let bind_addr = get_server_bind_addr();
    let server_addr: SocketAddr = format!("{}:{}", bind_addr, SERVER_PORT)
        .parse()
        .expect("Invalid server bind address");

    info!("Spawning server entity, binding to {:?}", server_addr);

    commands.spawn((
        BuildServer,
        Server::default(),
        ServerUdpIo::default(),
        LocalAddr(server_addr),
        NetcodeServer::new(NetcodeConfig {
            protocol_id: PROTOCOL_ID,
            private_key: PRIVATE_KEY,
            ..default()
        }),
    ));
}

/// Start the server after it's spawned
fn start_server(
    mut commands: Commands,
    server_query: Query<Entity, (With<BuildServer>, Without<Started>, Without<Starting>)>,
) {
    for server_entity in server_query.iter() {
        info!("Starting server...");
        commands.trigger(Start { entity: server_entity });
    }
}

/// Check if server is started (run condition)
fn server_is_started(server_query: Query<(), (With<BuildServer>, With<Started>)>) -> bool {
    !server_query.is_empty()
}

fn main() {
    let mut app = App::new();

    // Headless plugins (no rendering), looping at the network tick rate
    app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(tick_duration())));
    app.add_plugins(bevy::log::LogPlugin::default());

    app.add_plugins(ServerPlugins {
        tick_duration: tick_duration(),
    });
    app.add_plugins(ProtocolPlugin);
    app.add_plugins(ConstructionPlugin::default());

    app.init_resource::<HeadlessBackend>();

    app.add_systems(Startup, spawn_server);
    app.add_systems(Update, start_server);

    app.add_systems(
        Update,
        (systems::handle_connections, systems::sync_new_clients)
            .chain()
            .before(ConstructionSet::Advance)
            .run_if(server_is_started),
    );
    app.add_systems(
        Update,
        (building::handle_build_events, building::handle_demolish_events)
            .chain()
            .in_set(ConstructionSet::Commit)
            .run_if(server_is_started),
    );
    app.add_observer(systems::handle_disconnections);

    info!("Starting server on port {}", SERVER_PORT);
    app.run();
}
