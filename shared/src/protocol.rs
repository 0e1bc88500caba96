//! Lightyear network protocol definition
//!
//! Structures are never replicated as entities. Peers exchange placement messages and
//! each side runs its own registry; `(kind, snapped position)` names a structure on the
//! wire (see `StructureRegistry::find_at`).

use bevy::prelude::*;
use lightyear::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::grid::Orientation;
use crate::items::Inventory;
use crate::structures::{MaterialKind, Structure, StructureKind};

// --- Messages ---

/// Client -> Server: a structure was committed locally
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
pub struct BuildEvent {
    pub kind: StructureKind,
    pub material: MaterialKind,
    /// Snapped placement position
    pub position: Vec3,
    pub orientation: Orientation,
}

/// Client -> Server: a structure was destroyed locally
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
pub struct DemolishEvent {
    pub kind: StructureKind,
    pub position: Vec3,
}

/// Server -> Client: another player placed a structure
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
pub struct StructurePlaced {
    pub kind: StructureKind,
    pub material: MaterialKind,
    pub position: Vec3,
    pub orientation: Orientation,
}

impl From<&Structure> for StructurePlaced {
    fn from(structure: &Structure) -> Self {
        Self {
            kind: structure.kind,
            material: structure.material,
            position: structure.position,
            orientation: structure.orientation,
        }
    }
}

/// Server -> Client: the receiver's own build was refused.
///
/// Carries whatever the server has in the way, so the sender can swap its optimistic
/// copy for the real occupant in one step.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
pub struct BuildRejected {
    pub kind: StructureKind,
    pub position: Vec3,
    pub occupant: Option<StructurePlaced>,
}

/// Server -> Client: a structure is gone
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
pub struct StructureRemoved {
    pub kind: StructureKind,
    pub position: Vec3,
}

/// Server -> Client: authoritative material counts for the receiving player
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct InventoryUpdate {
    pub inventory: Inventory,
}

// --- Channels ---
// In Lightyear 0.25, Channel trait is auto-implemented for all Send + Sync + 'static types

/// Reliable channel for all construction messages
pub struct ReliableChannel;

// --- Protocol Plugin ---

pub struct ProtocolPlugin;

impl Plugin for ProtocolPlugin {
    fn build(&self, app: &mut App) {
        // Client -> Server
        app.register_message::<BuildEvent>()
            .add_direction(NetworkDirection::ClientToServer);
        app.register_message::<DemolishEvent>()
            .add_direction(NetworkDirection::ClientToServer);

        // Server -> Client
        app.register_message::<StructurePlaced>()
            .add_direction(NetworkDirection::ServerToClient);
        app.register_message::<StructureRemoved>()
            .add_direction(NetworkDirection::ServerToClient);
        app.register_message::<BuildRejected>()
            .add_direction(NetworkDirection::ServerToClient);
        app.register_message::<InventoryUpdate>()
            .add_direction(NetworkDirection::ServerToClient);

        // Placement has to arrive, and in order: a removal must never overtake its build
        app.add_channel::<ReliableChannel>(ChannelSettings {
            mode: ChannelMode::OrderedReliable(ReliableSettings::default()),
            ..default()
        })
        .add_direction(NetworkDirection::Bidirectional);
    }
}

// --- Network Configuration ---

pub const SERVER_PORT: u16 = 5000;
pub const SERVER_ADDR: &str = "127.0.0.1";
pub const PROTOCOL_ID: u64 = 0x4655_5254_4946_5901;

/// Server bind address
pub fn get_server_bind_addr() -> &'static str {
    "0.0.0.0"
}

/// Shared private key for local development
pub const PRIVATE_KEY: [u8; 32] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08,
    0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10,
    0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18,
    0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f, 0x20,
];

/// Fixed timestep for the server tick (60 Hz)
pub const FIXED_TIMESTEP_HZ: f64 = 60.0;

/// Tick duration for lightyear plugins
pub fn tick_duration() -> Duration {
    Duration::from_secs_f64(1.0 / FIXED_TIMESTEP_HZ)
}
