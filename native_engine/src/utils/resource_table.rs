/// Generational registry owning engine resources.
///
/// The table owns every inserted item; callers keep a ticket (a slot map key
/// made of index + generation). A ticket never keeps its item alive and is
/// revoked as soon as the item is removed or the table is cleared, so stale
/// tickets coming back from the scripting side resolve to `None` instead of
/// aliasing a newer resource.
///
/// Full-table operations snapshot the live tickets before visiting them and
/// re-validate each ticket before the visit. A visit may therefore remove any
/// item (including ones not yet visited) without corrupting the traversal or
/// visiting an item twice.
///
/// # Example
///
/// ```ignore
/// let mut table: ResourceTable<TextureKey, TextureData> = ResourceTable::new();
/// let ticket = table.insert(texture);
/// table.apply_to_all(|texture| texture.flags = SamplerFlags::empty());
/// table.remove(ticket); // texture dropped, ticket revoked
/// assert!(table.get(ticket).is_none());
/// ```

use std::ops::{Index, IndexMut};
use slotmap::{Key, SlotMap};

pub struct ResourceTable<K: Key, T> {
    entries: SlotMap<K, T>,
}

impl<K: Key, T> ResourceTable<K, T> {
    /// Create a new empty table
    pub fn new() -> Self {
        Self {
            entries: SlotMap::with_key(),
        }
    }

    /// Take ownership of an item and return its ticket
    pub fn insert(&mut self, item: T) -> K {
        self.entries.insert(item)
    }

    /// Insert an item that needs to know its own ticket
    pub fn insert_with_ticket(&mut self, make: impl FnOnce(K) -> T) -> K {
        self.entries.insert_with_key(make)
    }

    /// Remove an item, revoking its ticket
    ///
    /// Returns `None` if the ticket was already revoked.
    pub fn remove(&mut self, ticket: K) -> Option<T> {
        self.entries.remove(ticket)
    }

    pub fn get(&self, ticket: K) -> Option<&T> {
        self.entries.get(ticket)
    }

    pub fn get_mut(&mut self, ticket: K) -> Option<&mut T> {
        self.entries.get_mut(ticket)
    }

    /// Whether the ticket still designates a live item
    pub fn contains(&self, ticket: K) -> bool {
        self.entries.contains_key(ticket)
    }

    /// Number of live items
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tickets of every live item, in slot order
    pub fn tickets(&self) -> Vec<K> {
        self.entries.keys().collect()
    }

    /// Visit every live item
    pub fn apply_to_all(&mut self, mut f: impl FnMut(&mut T)) {
        self.for_each_live(|table, ticket| {
            if let Some(item) = table.get_mut(ticket) {
                f(item);
            }
        });
    }

    /// Visit every item live at call time, with full access to the table
    ///
    /// `f` may insert or remove items. Items removed before their turn are
    /// skipped; items inserted during the traversal are not visited.
    pub fn for_each_live(&mut self, mut f: impl FnMut(&mut Self, K)) {
        for ticket in self.tickets() {
            if self.contains(ticket) {
                f(self, ticket);
            }
        }
    }

    /// Drop every item, revoking all tickets
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: Key, T> Default for ResourceTable<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Panics if the ticket was revoked
impl<K: Key, T> Index<K> for ResourceTable<K, T> {
    type Output = T;

    fn index(&self, ticket: K) -> &T {
        &self.entries[ticket]
    }
}

/// Panics if the ticket was revoked
impl<K: Key, T> IndexMut<K> for ResourceTable<K, T> {
    fn index_mut(&mut self, ticket: K) -> &mut T {
        &mut self.entries[ticket]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "resource_table_tests.rs"]
mod tests;
