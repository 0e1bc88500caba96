//! Grid math for structure placement
//!
//! Pure helpers: snapping world positions onto the build grid and turning the surface
//! normal under the crosshair into a placement orientation.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// A normal component must exceed this share of unit length to count as dominant.
pub const DOMINANCE_THRESHOLD: f32 = 0.9;

/// Which way the surface we are building against faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Facing {
    /// No dominant axis (sloped or degenerate normal)
    #[default]
    Unrotated,
    /// Floor/ceiling-like surface (normal mostly ±Y)
    Vertical,
    /// Wall-like surface facing ±X
    AlongX,
    /// Wall-like surface facing ±Z
    AlongZ,
}

/// Placement orientation: the facing derived from the hit normal plus any
/// quarter turns the player added with the rotate key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Orientation {
    pub facing: Facing,
    /// Extra yaw in 90° steps, always kept in 0..4
    pub quarter_turns: u8,
}

impl Orientation {
    pub const UNROTATED: Orientation = Orientation {
        facing: Facing::Unrotated,
        quarter_turns: 0,
    };

    pub fn new(facing: Facing) -> Self {
        Self {
            facing,
            quarter_turns: 0,
        }
    }

    pub fn with_quarter_turns(self, quarter_turns: u8) -> Self {
        Self {
            quarter_turns: quarter_turns % 4,
            ..self
        }
    }

    /// Total yaw in quarter turns. Structures facing X are turned 90° so their
    /// thin side lies against the surface.
    pub fn yaw_quarters(&self) -> u8 {
        let base = match self.facing {
            Facing::AlongX => 1,
            Facing::Unrotated | Facing::Vertical | Facing::AlongZ => 0,
        };
        (base + self.quarter_turns) % 4
    }

    /// World rotation for this orientation (Y-axis only).
    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw_quarters() as f32 * FRAC_PI_2)
    }
}

/// Round each axis to the nearest multiple of `grid_size`.
///
/// A non-positive or non-finite grid size leaves the position untouched.
pub fn snap(world_position: Vec3, grid_size: f32) -> Vec3 {
    if grid_size <= 0.0 || !grid_size.is_finite() {
        return world_position;
    }
    (world_position / grid_size).round() * grid_size
}

/// Integer grid cell of an already snapped position.
pub fn cell_of(snapped: Vec3, grid_size: f32) -> IVec3 {
    if grid_size <= 0.0 || !grid_size.is_finite() {
        return snapped.round().as_ivec3();
    }
    (snapped / grid_size).round().as_ivec3()
}

/// Classify a surface normal into one of the canonical facings.
pub fn orientation_from_normal(surface_normal: Vec3) -> Orientation {
    let n = surface_normal.normalize_or_zero().abs();

    let facing = if n.y > DOMINANCE_THRESHOLD {
        Facing::Vertical
    } else if n.x > DOMINANCE_THRESHOLD {
        Facing::AlongX
    } else if n.z > DOMINANCE_THRESHOLD {
        Facing::AlongZ
    } else {
        Facing::Unrotated
    };

    Orientation::new(facing)
}
