//! Spatial hashing for fast structure overlap lookups.
//!
//! Instead of testing a placement against every structure O(n), structures are bucketed
//! into grid cells and a query only visits the cells its bounds touch. Placement
//! validation runs every frame while build mode is open, so this keeps it flat as
//! bases grow to hundreds of pieces.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::structures::StructureId;

/// Bounds closer than this are touching, not overlapping. Grid-adjacent pieces share
/// faces exactly and must be allowed next to each other.
pub const OVERLAP_EPSILON: f32 = 1e-3;

/// An axis-aligned bounding box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Bounds of a box turned around Y by whole quarter turns. Odd turns swap the
    /// X and Z extents; no trigonometry so adjacent pieces stay exactly flush.
    pub fn from_center_yaw_quarters(center: Vec3, half_extents: Vec3, yaw_quarters: u8) -> Self {
        let half = if yaw_quarters % 2 == 1 {
            Vec3::new(half_extents.z, half_extents.y, half_extents.x)
        } else {
            half_extents
        };
        Self::from_center_half_extents(center, half)
    }

    /// Tightest axis-aligned bounds of an arbitrarily rotated box.
    pub fn from_oriented(center: Vec3, half_extents: Vec3, rotation: Quat) -> Self {
        let m = Mat3::from_quat(rotation);
        let half = m.x_axis.abs() * half_extents.x + m.y_axis.abs() * half_extents.y + m.z_axis.abs() * half_extents.z;
        Self::from_center_half_extents(center, half)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Strict 3D overlap; shared faces do not count.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x - OVERLAP_EPSILON
            && other.min.x < self.max.x - OVERLAP_EPSILON
            && self.min.y < other.max.y - OVERLAP_EPSILON
            && other.min.y < self.max.y - OVERLAP_EPSILON
            && self.min.z < other.max.z - OVERLAP_EPSILON
            && other.min.z < self.max.z - OVERLAP_EPSILON
    }

    /// Slab test. Returns the distance along `direction` (unit length) to the entry
    /// point and the outward face normal there, if the ray hits within `max_distance`.
    pub fn ray_intersection(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<(f32, Vec3)> {
        let mut t_min = 0.0_f32;
        let mut t_max = max_distance;
        let mut normal = Vec3::ZERO;

        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if d.abs() < 1e-8 {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let mut t0 = (lo - o) * inv;
            let mut t1 = (hi - o) * inv;
            // Entering through the min face means the outward normal points negative
            let mut face = -1.0;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
                face = 1.0;
            }

            if t0 > t_min {
                t_min = t0;
                normal = Vec3::ZERO;
                normal[axis] = face;
            }
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }

        // Origin inside the box: report the hit at the origin facing back along the ray
        if normal == Vec3::ZERO {
            normal = -direction;
        }
        Some((t_min, normal))
    }
}

/// Spatial hash grid of structure bounds.
///
/// Each structure is listed in every cell its bounds overlap, so a query only needs
/// the cells covered by the query bounds.
#[derive(Debug, Clone)]
pub struct StructureGrid {
    cell_size: f32,
    /// Map from cell to the structures overlapping it.
    cells: HashMap<IVec3, Vec<StructureId>>,
    /// Bounds of every indexed structure.
    bounds: HashMap<StructureId, Aabb>,
}

impl Default for StructureGrid {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_GRID_SIZE)
    }
}

impl StructureGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: if cell_size > 0.0 { cell_size } else { crate::config::DEFAULT_GRID_SIZE },
            cells: HashMap::new(),
            bounds: HashMap::new(),
        }
    }

    /// Convert world position to grid cell coordinates.
    #[inline]
    fn world_to_cell(&self, pos: Vec3) -> IVec3 {
        (pos / self.cell_size).floor().as_ivec3()
    }

    fn cell_range(&self, aabb: &Aabb) -> (IVec3, IVec3) {
        (self.world_to_cell(aabb.min), self.world_to_cell(aabb.max))
    }

    pub fn insert(&mut self, id: StructureId, aabb: Aabb) {
        if self.bounds.contains_key(&id) {
            self.remove(id);
        }

        let (min_cell, max_cell) = self.cell_range(&aabb);
        for cx in min_cell.x..=max_cell.x {
            for cy in min_cell.y..=max_cell.y {
                for cz in min_cell.z..=max_cell.z {
                    self.cells.entry(IVec3::new(cx, cy, cz)).or_default().push(id);
                }
            }
        }
        self.bounds.insert(id, aabb);
    }

    pub fn remove(&mut self, id: StructureId) {
        let Some(aabb) = self.bounds.remove(&id) else {
            return;
        };

        let (min_cell, max_cell) = self.cell_range(&aabb);
        for cx in min_cell.x..=max_cell.x {
            for cy in min_cell.y..=max_cell.y {
                for cz in min_cell.z..=max_cell.z {
                    let cell = IVec3::new(cx, cy, cz);
                    if let Some(ids) = self.cells.get_mut(&cell) {
                        ids.retain(|other| *other != id);
                        if ids.is_empty() {
                            self.cells.remove(&cell);
                        }
                    }
                }
            }
        }
    }

    /// First indexed structure whose bounds overlap `aabb`.
    pub fn first_overlap(&self, aabb: &Aabb) -> Option<StructureId> {
        let (min_cell, max_cell) = self.cell_range(aabb);
        for cx in min_cell.x..=max_cell.x {
            for cy in min_cell.y..=max_cell.y {
                for cz in min_cell.z..=max_cell.z {
                    let Some(ids) = self.cells.get(&IVec3::new(cx, cy, cz)) else {
                        continue;
                    };
                    for id in ids {
                        if self.bounds.get(id).is_some_and(|b| b.intersects(aabb)) {
                            return Some(*id);
                        }
                    }
                }
            }
        }
        None
    }

    /// Get the number of structures in the grid.
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Check if the grid is empty.
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}
