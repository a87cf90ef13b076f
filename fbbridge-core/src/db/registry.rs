//! Arena of native handles owned by one database.
//!
//! Transactions, statements and blobs never hold their native handle
//! themselves. They hold a [`ResourceId`] into the registry of their
//! database and look the handle up under the database lock. Every attach
//! starts a new generation; slots from an earlier generation belong to a
//! connection that no longer exists and their handles must not be passed
//! to the library.

use std::collections::BTreeMap;

use strum::Display;

use crate::ffi::ApiHandle;

/// Identifier of a registry slot. Never reused within a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Numeric value, for diagnostics.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// What a slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ResourceKind {
    /// A transaction handle.
    Transaction,
    /// A statement handle.
    Statement,
    /// A blob handle.
    Blob,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    kind: ResourceKind,
    handle: ApiHandle,
    generation: u64,
}

/// The arena.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    next_id: u64,
    generation: u64,
    slots: BTreeMap<ResourceId, Slot>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Starts a new generation; called on every successful attach.
    pub(crate) fn advance_generation(&mut self) {
        self.generation += 1;
    }

    /// Adds a slot with a zero handle in the current generation.
    pub(crate) fn insert(&mut self, kind: ResourceKind) -> ResourceId {
        self.next_id += 1;
        let id = ResourceId(self.next_id);
        self.slots.insert(
            id,
            Slot {
                kind,
                handle: 0,
                generation: self.generation,
            },
        );
        id
    }

    /// Handle stored in `id`, if the slot exists.
    pub(crate) fn handle(&self, id: ResourceId) -> Option<ApiHandle> {
        self.slots.get(&id).map(|slot| slot.handle)
    }

    /// Stores `handle` in `id`; ignored for removed slots.
    pub(crate) fn set_handle(&mut self, id: ResourceId, handle: ApiHandle) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.handle = handle;
        }
    }

    /// Returns `true` if `id` exists and belongs to the current generation.
    pub(crate) fn is_current(&self, id: ResourceId) -> bool {
        self.slots
            .get(&id)
            .is_some_and(|slot| slot.generation == self.generation)
    }

    /// Removes `id`, returning its handle.
    pub(crate) fn remove(&mut self, id: ResourceId) -> Option<ApiHandle> {
        self.slots.remove(&id).map(|slot| slot.handle)
    }

    /// Number of slots of `kind` in the current generation.
    pub(crate) fn live_count(&self, kind: ResourceKind) -> usize {
        self.slots
            .values()
            .filter(|slot| slot.kind == kind && slot.generation == self.generation)
            .count()
    }

    /// Total number of slots, stale ones included.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
