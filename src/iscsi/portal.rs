//! Target portal registry
//!
//! The set of portals this proxy has registered with the host initiator.
//! Portals are stored normalized, so `10.0.0.5:0` and `10.0.0.5:3260` are the
//! same entry. Listing preserves insertion order.

use super::types::TargetPortal;

#[derive(Debug, Clone, Default)]
pub struct TargetPortalRegistry {
    portals: Vec<TargetPortal>,
}

impl TargetPortalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a portal. Returns false if it was already present.
    pub fn add(&mut self, portal: &TargetPortal) -> bool {
        let portal = portal.normalized();
        if self.portals.contains(&portal) {
            return false;
        }
        log::info!("Registered target portal {}", portal);
        self.portals.push(portal);
        true
    }

    /// Remove a portal. Returns false if it was not registered.
    pub fn remove(&mut self, portal: &TargetPortal) -> bool {
        let portal = portal.normalized();
        let before = self.portals.len();
        self.portals.retain(|p| p != &portal);

        let removed = self.portals.len() != before;
        if removed {
            log::info!("Removed target portal {}", portal);
        }
        removed
    }

    pub fn contains(&self, portal: &TargetPortal) -> bool {
        self.portals.contains(&portal.normalized())
    }

    pub fn list(&self) -> Vec<TargetPortal> {
        self.portals.clone()
    }

    pub fn len(&self) -> usize {
        self.portals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.portals.is_empty()
    }
}
