use concierge_shared::{Direction, ProductType};

use crate::models::{CartItem, ItemId, ItemStatus};

/// Session-scoped cart. Keeps insertion order for display; ids are unique.
pub struct CartStore {
    items: Vec<CartItem>,
}

impl CartStore {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Adds an item under a fresh id and returns that id.
    pub fn add(&mut self, mut item: CartItem) -> ItemId {
        while self.contains(&item.id()) {
            item.set_id(ItemId::new());
        }
        let id = item.id();
        self.items.push(item);
        id
    }

    pub fn contains(&self, item_id: &ItemId) -> bool {
        self.items.iter().any(|item| item.id() == *item_id)
    }

    pub fn get(&self, item_id: &ItemId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id() == *item_id)
    }

    pub fn get_mut(&mut self, item_id: &ItemId) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|item| item.id() == *item_id)
    }

    /// Returns true if an item existed and was removed.
    pub fn remove(&mut self, item_id: &ItemId) -> bool {
        let initial = self.items.len();
        self.items.retain(|item| item.id() != *item_id);
        self.items.len() < initial
    }

    pub fn list_ready(&self) -> Vec<&CartItem> {
        self.items
            .iter()
            .filter(|item| item.status() == ItemStatus::ReadyForReservation)
            .collect()
    }

    /// Mutable handles to every ready item. Each handle is unique, so they
    /// can be processed concurrently without further locking.
    pub fn ready_items_mut(&mut self) -> Vec<&mut CartItem> {
        self.items
            .iter_mut()
            .filter(|item| item.status() == ItemStatus::ReadyForReservation)
            .collect()
    }

    /// Reserved items still waiting for their contact submission.
    pub fn awaiting_contact_mut(&mut self) -> Vec<&mut CartItem> {
        self.items
            .iter_mut()
            .filter(|item| item.status() == ItemStatus::Reserved && item.reservation().is_some())
            .collect()
    }

    pub fn has_awaiting_contact(&self) -> bool {
        self.items
            .iter()
            .any(|item| item.status() == ItemStatus::Reserved && item.reservation().is_some())
    }

    pub fn total_tickets(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |total, item| total.saturating_add(item.total_tickets()))
    }

    /// Drops items that reached a terminal state. Returns how many were removed.
    pub fn remove_finished(&mut self) -> usize {
        let initial = self.items.len();
        self.items.retain(|item| !item.status().is_terminal());
        initial - self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CartItem> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CartItem> {
        self.items.iter_mut()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("Cart item not found: {0}")]
    NotFound(ItemId),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: ItemStatus,
        to: ItemStatus,
    },

    #[error("{direction} leg is not part of {product_type}")]
    LegNotRequired {
        direction: Direction,
        product_type: ProductType,
    },

    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),
}
