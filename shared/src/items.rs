//! Material inventory
//!
//! The player's stock of build materials. Used as the resource ledger for placement:
//! validation reads it, a committed build debits it.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::collaborators::ResourceLedger;
use crate::structures::MaterialKind;

/// Most of a single material a player can carry
pub const MAX_MATERIAL_STACK: u32 = 999;

/// Material stock, keyed by material.
///
/// A component on the server (one per client link) and a resource on the client (the
/// local player's copy).
#[derive(Component, Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    materials: BTreeMap<MaterialKind, u32>,
}

impl Inventory {
    /// Create an empty inventory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an inventory holding the given amounts (clamped to the stack limit)
    pub fn with_materials(amounts: &[(MaterialKind, u32)]) -> Self {
        let mut inventory = Self::new();
        for (material, quantity) in amounts {
            inventory.add_material(*material, *quantity);
        }
        inventory
    }

    /// Add materials, returns the overflow that did not fit
    pub fn add_material(&mut self, material: MaterialKind, quantity: u32) -> u32 {
        let current = self.count(material);
        let space = MAX_MATERIAL_STACK.saturating_sub(current);
        let added = quantity.min(space);
        if added > 0 {
            self.materials.insert(material, current + added);
        }
        quantity - added
    }

    /// Remove materials, returns amount actually removed
    pub fn remove_material(&mut self, material: MaterialKind, quantity: u32) -> u32 {
        let current = self.count(material);
        let removed = quantity.min(current);
        if current - removed == 0 {
            self.materials.remove(&material);
        } else {
            self.materials.insert(material, current - removed);
        }
        removed
    }

    /// Count total quantity of a material
    pub fn count(&self, material: MaterialKind) -> u32 {
        self.materials.get(&material).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

impl ResourceLedger for Inventory {
    fn get(&self, material: MaterialKind) -> u32 {
        self.count(material)
    }

    fn debit(&mut self, material: MaterialKind, amount: u32) -> u32 {
        self.remove_material(material, amount)
    }
}

// =============================================================================
// TESTS
// =============================================================================
