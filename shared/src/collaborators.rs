//! Contracts for the systems the build core drives but does not own: rendering,
//! physics, networking and the player's resource ledger.
//!
//! The core only ever hands these collaborators a [`StructureId`] plus a plain
//! descriptor. Whatever mesh, body or entity they create stays theirs; the id is the
//! only back-reference.

use bevy::prelude::*;
use thiserror::Error;

use crate::grid::Orientation;
use crate::protocol::BuildEvent;
use crate::structures::{MaterialKind, StructureId, StructureKind};

/// A collaborator call that could not be carried out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("{0} collaborator is not available")]
    Unavailable(&'static str),

    #[error("{collaborator} rejected the request: {reason}")]
    Rejected {
        collaborator: &'static str,
        reason: String,
    },
}

/// Collision shape requested for a structure body
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeDescriptor {
    Cuboid { half_extents: Vec3 },
}

/// Static rigid body request. `mass == 0.0` means fixed/static.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyDescriptor {
    pub shape: ShapeDescriptor,
    pub mass: f32,
    /// World-space center of the shape
    pub translation: Vec3,
    pub rotation: Quat,
}

/// Mesh creation request; geometry and material tier are picked by the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshDescriptor {
    pub kind: StructureKind,
    pub material: MaterialKind,
    /// Full box size (meters)
    pub size: Vec3,
    /// Placement origin (bottom of the footprint)
    pub position: Vec3,
    pub orientation: Orientation,
}

/// Nearest hit returned by a physics raycast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub normal: Vec3,
    /// Structure that was hit, if the hit object is one
    pub structure: Option<StructureId>,
}

/// Aim ray supplied by the camera each frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimRay {
    pub origin: Vec3,
    /// Unit direction
    pub direction: Vec3,
}

impl AimRay {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

pub trait PhysicsWorld {
    fn add_body(&mut self, id: StructureId, body: &BodyDescriptor) -> Result<(), CollaboratorError>;

    fn remove_body(&mut self, id: StructureId) -> Result<(), CollaboratorError>;

    /// Nearest hit on the segment `from -> to`
    fn raycast(&self, from: Vec3, to: Vec3) -> Option<RayHit>;
}

pub trait SceneGraph {
    fn add_to_scene(&mut self, id: StructureId, mesh: &MeshDescriptor) -> Result<(), CollaboratorError>;

    fn remove_from_scene(&mut self, id: StructureId) -> Result<(), CollaboratorError>;
}

/// Outbound placement events. Fire-and-forget: the caller never waits for an ack.
pub trait NetworkTransport {
    fn send(&mut self, event: BuildEvent) -> Result<(), CollaboratorError>;
}

/// The player's material stock
pub trait ResourceLedger {
    fn get(&self, material: MaterialKind) -> u32;

    /// Remove up to `amount`, returns the amount actually removed
    fn debit(&mut self, material: MaterialKind, amount: u32) -> u32;
}

/// Everything the registry needs to externalize a structure's lifecycle.
pub trait StructureBackend: SceneGraph + PhysicsWorld {}

impl<T: SceneGraph + PhysicsWorld> StructureBackend for T {}
