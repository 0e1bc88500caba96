//! Recording collaborators for unit tests.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::collaborators::{
    BodyDescriptor, CollaboratorError, MeshDescriptor, NetworkTransport, PhysicsWorld, RayHit, SceneGraph,
};
use crate::physics::StaticBodies;
use crate::protocol::BuildEvent;
use crate::structures::StructureId;

/// Scene + physics stand-in. Physics is a real `StaticBodies` so raycasts work;
/// every teardown is recorded so tests can count them.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub meshes: HashMap<StructureId, MeshDescriptor>,
    pub physics: StaticBodies,
    pub scene_removals: Vec<StructureId>,
    pub body_removals: Vec<StructureId>,
    pub scene_offline: bool,
    pub physics_offline: bool,
}

impl SceneGraph for RecordingBackend {
    fn add_to_scene(&mut self, id: StructureId, mesh: &MeshDescriptor) -> Result<(), CollaboratorError> {
        if self.scene_offline {
            return Err(CollaboratorError::Unavailable("scene"));
        }
        self.meshes.insert(id, *mesh);
        Ok(())
    }

    fn remove_from_scene(&mut self, id: StructureId) -> Result<(), CollaboratorError> {
        self.meshes.remove(&id);
        self.scene_removals.push(id);
        Ok(())
    }
}

impl PhysicsWorld for RecordingBackend {
    fn add_body(&mut self, id: StructureId, body: &BodyDescriptor) -> Result<(), CollaboratorError> {
        if self.physics_offline {
            return Err(CollaboratorError::Unavailable("physics"));
        }
        self.physics.add_body(id, body)
    }

    fn remove_body(&mut self, id: StructureId) -> Result<(), CollaboratorError> {
        self.body_removals.push(id);
        self.physics.remove_body(id)
    }

    fn raycast(&self, from: Vec3, to: Vec3) -> Option<RayHit> {
        self.physics.raycast(from, to)
    }
}

#[derive(Debug, Default)]
pub struct RecordingNetwork {
    pub sent: Vec<BuildEvent>,
    pub offline: bool,
}

impl NetworkTransport for RecordingNetwork {
    fn send(&mut self, event: BuildEvent) -> Result<(), CollaboratorError> {
        if self.offline {
            return Err(CollaboratorError::Unavailable("network"));
        }
        self.sent.push(event);
        Ok(())
    }
}
