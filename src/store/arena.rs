//! Keyed arena with per-slot locks.
//!
//! Slots are never reused, so an id stays unambiguous for the lifetime of
//! the arena even after the entity it named was removed.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Typed index into an [`Arena`].
pub trait ArenaId: Copy + Eq + Hash + std::fmt::Debug {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

macro_rules! arena_id {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
            pub struct $name(pub u32);

            impl $crate::store::arena::ArenaId for $name {
                fn from_index(index: usize) -> Self {
                    $name(index as u32)
                }

                fn index(self) -> usize {
                    self.0 as usize
                }
            }
        )+
    };
}

pub(crate) use arena_id;

struct Slot<T> {
    key: String,
    value: RwLock<T>,
}

pub struct Arena<I, T> {
    slots: Vec<Option<Slot<T>>>,
    index: HashMap<String, I>,
}

impl<I: ArenaId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<I: ArenaId, T> Arena<I, T> {
    pub fn id_of(&self, key: &str) -> Option<I> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, id: I) -> bool {
        matches!(self.slots.get(id.index()), Some(Some(_)))
    }

    pub fn key(&self, id: I) -> Option<&str> {
        self.slot(id).map(|s| s.key.as_str())
    }

    fn slot(&self, id: I) -> Option<&Slot<T>> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Shared access through the entity lock.
    pub fn read(&self, id: I) -> Option<RwLockReadGuard<'_, T>> {
        self.slot(id)
            .map(|s| s.value.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Exclusive access through the entity lock.
    pub fn write(&self, id: I) -> Option<RwLockWriteGuard<'_, T>> {
        self.slot(id)
            .map(|s| s.value.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Exclusive access without locking, for holders of the store write lock.
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .map(|s| s.value.get_mut().unwrap_or_else(PoisonError::into_inner))
    }

    /// Insert under `key`, replacing nothing: an existing key keeps its id.
    pub fn insert(&mut self, key: String, value: T) -> I {
        if let Some(id) = self.id_of(&key) {
            return id;
        }
        let id = I::from_index(self.slots.len());
        self.index.insert(key.clone(), id);
        self.slots.push(Some(Slot {
            key,
            value: RwLock::new(value),
        }));
        id
    }

    pub fn remove(&mut self, id: I) -> Option<T> {
        let slot = self.slots.get_mut(id.index())?.take()?;
        self.index.remove(&slot.key);
        Some(slot.value.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    /// Live ids in insertion order.
    pub fn ids(&self) -> Vec<I> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| I::from_index(i))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
    }
}
