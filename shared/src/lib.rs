//! Shared construction core: grid math, placement validation, the structure registry,
//! the construction scheduler, the build-mode controller, the network protocol and
//! the rules for applying replicated changes.
//! Used by both the client and the headless server.

pub mod build_mode;
pub mod collaborators;
pub mod config;
pub mod construction;
pub mod grid;
pub mod items;
pub mod physics;
pub mod plugin;
pub mod protocol;
pub mod registry;
pub mod replication;
pub mod spatial;
pub mod structures;
pub mod validation;

#[cfg(test)]
mod testing;

pub use build_mode::*;
pub use collaborators::*;
pub use config::*;
pub use construction::*;
pub use grid::*;
pub use items::*;
pub use physics::*;
pub use plugin::*;
pub use protocol::*;
pub use registry::*;
pub use replication::*;
pub use spatial::*;
pub use structures::*;
pub use validation::*;
