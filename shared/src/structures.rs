//! Structure definitions for the build system
//!
//! Defines structure kinds, build materials, their footprints and stats, and the
//! `Structure` record owned by the registry.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::grid::Orientation;
use crate::spatial::Aabb;

/// Process-unique structure identifier, assigned by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructureId(pub u64);

impl fmt::Display for StructureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Types of pieces that can be built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum StructureKind {
    #[default]
    Wall,
    Floor,
    Ramp,
    Roof,
}

/// All structure kinds, in hotkey order
pub const ALL_STRUCTURE_KINDS: &[StructureKind] = &[
    StructureKind::Wall,
    StructureKind::Floor,
    StructureKind::Ramp,
    StructureKind::Roof,
];

/// Local-space bounding geometry of a structure kind. The origin sits on the bottom face,
/// so a piece placed at y = 0 stands on the ground.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub half_extents: Vec3,
    /// Offset from the placement origin to the box center (unrotated)
    pub center_offset: Vec3,
}

impl Footprint {
    const fn new(width: f32, height: f32, depth: f32) -> Self {
        Self {
            half_extents: Vec3::new(width * 0.5, height * 0.5, depth * 0.5),
            center_offset: Vec3::new(0.0, height * 0.5, 0.0),
        }
    }

    /// Full size of the footprint box
    pub fn size(&self) -> Vec3 {
        self.half_extents * 2.0
    }

    /// World-space center for a piece placed at `position` with `orientation`
    pub fn world_center(&self, position: Vec3, orientation: Orientation) -> Vec3 {
        position + orientation.rotation() * self.center_offset
    }

    /// World-space bounds for a piece placed at `position` with `orientation`
    pub fn world_bounds(&self, position: Vec3, orientation: Orientation) -> Aabb {
        Aabb::from_center_yaw_quarters(
            self.world_center(position, orientation),
            self.half_extents,
            orientation.yaw_quarters(),
        )
    }
}

impl StructureKind {
    pub const fn display_name(&self) -> &'static str {
        match self {
            StructureKind::Wall => "Wall",
            StructureKind::Floor => "Floor",
            StructureKind::Ramp => "Ramp",
            StructureKind::Roof => "Roof",
        }
    }

    /// Footprint geometry (meters). Sized for the default 4 m grid.
    pub const fn footprint(&self) -> Footprint {
        match self {
            StructureKind::Wall => Footprint::new(4.0, 4.0, 0.2),
            StructureKind::Floor => Footprint::new(4.0, 0.2, 4.0),
            // Physics approximates the slope with its bounding box
            StructureKind::Ramp => Footprint::new(4.0, 4.0, 4.0),
            StructureKind::Roof => Footprint::new(4.0, 1.0, 4.0),
        }
    }

    /// Resource units consumed by one piece; multiplied by the material's per-unit cost
    pub const fn resource_units(&self) -> u32 {
        match self {
            StructureKind::Wall => 10,
            StructureKind::Floor => 10,
            StructureKind::Ramp => 10,
            StructureKind::Roof => 10,
        }
    }
}

/// Building materials, which double as the resources spent to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum MaterialKind {
    #[default]
    Wood,
    Stone,
    Metal,
}

/// All materials, in hotkey order
pub const ALL_MATERIALS: &[MaterialKind] = &[MaterialKind::Wood, MaterialKind::Stone, MaterialKind::Metal];

/// Fixed per-material numbers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialStats {
    pub max_hit_points: f32,
    pub build_duration_secs: f32,
    pub cost_per_unit: u32,
}

impl MaterialKind {
    pub const fn display_name(&self) -> &'static str {
        match self {
            MaterialKind::Wood => "Wood",
            MaterialKind::Stone => "Stone",
            MaterialKind::Metal => "Metal",
        }
    }

    pub const fn stats(&self) -> MaterialStats {
        match self {
            MaterialKind::Wood => MaterialStats {
                max_hit_points: 150.0,
                build_duration_secs: 4.0,
                cost_per_unit: 1,
            },
            MaterialKind::Stone => MaterialStats {
                max_hit_points: 300.0,
                build_duration_secs: 8.0,
                cost_per_unit: 1,
            },
            MaterialKind::Metal => MaterialStats {
                max_hit_points: 500.0,
                build_duration_secs: 12.0,
                cost_per_unit: 2,
            },
        }
    }
}

/// Resources required to build `kind` out of `material`
pub const fn build_cost(kind: StructureKind, material: MaterialKind) -> u32 {
    kind.resource_units() * material.stats().cost_per_unit
}

/// Which collaborator-owned resources a structure currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attachments {
    pub mesh: bool,
    pub body: bool,
}

/// A placed structure.
///
/// Owned by [`crate::registry::StructureRegistry`]; everything outside the registry only
/// sees shared references, so identity and placement never change after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub id: StructureId,
    pub kind: StructureKind,
    pub material: MaterialKind,
    pub position: Vec3,
    pub orientation: Orientation,
    pub current_hit_points: f32,
    pub max_hit_points: f32,
    /// Host clock (seconds) when construction began
    pub construction_start: f64,
    pub under_construction: bool,
    /// Damage absorbed while still building; subtracted from the ramp
    pub construction_damage: f32,
    pub attachments: Attachments,
}

impl Structure {
    pub(crate) fn new(
        id: StructureId,
        kind: StructureKind,
        material: MaterialKind,
        position: Vec3,
        orientation: Orientation,
        now: f64,
    ) -> Self {
        Self {
            id,
            kind,
            material,
            position,
            orientation,
            current_hit_points: 0.0,
            max_hit_points: material.stats().max_hit_points,
            construction_start: now,
            under_construction: true,
            construction_damage: 0.0,
            attachments: Attachments::default(),
        }
    }

    pub fn bounds(&self) -> Aabb {
        self.kind.footprint().world_bounds(self.position, self.orientation)
    }

    pub fn rotation(&self) -> Quat {
        self.orientation.rotation()
    }

    /// Fraction of max hit points remaining (0.0 - 1.0)
    pub fn health_fraction(&self) -> f32 {
        if self.max_hit_points <= 0.0 {
            return 0.0;
        }
        (self.current_hit_points / self.max_hit_points).clamp(0.0, 1.0)
    }

    /// Construction progress at `now` (0.0 - 1.0), independent of damage
    pub fn build_progress(&self, now: f64) -> f32 {
        if !self.under_construction {
            return 1.0;
        }
        let duration = self.material.stats().build_duration_secs as f64;
        if duration <= 0.0 {
            return 1.0;
        }
        ((now - self.construction_start) / duration).clamp(0.0, 1.0) as f32
    }
}
