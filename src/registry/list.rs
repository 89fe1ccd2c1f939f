//! # ObserverRegistry: mutation-tolerant ordered collection.
//!
//! The registry can be modified while it is being iterated, including from
//! inside the callbacks the iteration drives (an observer removing itself or
//! others during delivery).
//!
//! ## Rules
//! - **Identity**: entries are compared with `PartialEq`; no two live slots are equal.
//! - **Order**: live entries keep insertion order.
//! - **Tombstones**: `remove`/`clear` during an active iteration replace slots with
//!   tombstones instead of shrinking the list.
//! - **Compaction**: tombstones are stripped only when the iteration depth returns to zero.
//! - **Existing only**: an iterator visits at most the slots present when it started
//!   (or was rewound); entries added meanwhile are seen by the next iteration.
//! - **No lock across user code**: entries are cloned out of the lock before being yielded,
//!   and removed entries are dropped after the lock is released.

use std::fmt;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::RegistryError;

struct Slots<E> {
    entries: Vec<Option<E>>,
    depth: usize,
}

impl<E> Slots<E> {
    fn compact(&mut self) {
        debug_assert_eq!(self.depth, 0);
        self.entries.retain(Option::is_some);
    }
}

/// Ordered, iteration-safe collection of observers.
pub struct ObserverRegistry<E> {
    slots: Mutex<Slots<E>>,
}

impl<E> Default for ObserverRegistry<E> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(Slots {
                entries: Vec::new(),
                depth: 0,
            }),
        }
    }
}

impl<E: Clone + PartialEq> ObserverRegistry<E> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry` at the tail.
    ///
    /// Adding an entry that is already live is a programmer error: it is logged,
    /// nothing changes, and [`RegistryError::Duplicate`] is returned.
    pub fn add(&self, entry: E) -> Result<(), RegistryError> {
        let mut slots = self.slots.lock();
        if slots.entries.iter().flatten().any(|e| *e == entry) {
            drop(slots);
            warn!(
                error = RegistryError::Duplicate.as_label(),
                "observer added twice; ignoring"
            );
            return Err(RegistryError::Duplicate);
        }
        slots.entries.push(Some(entry));
        Ok(())
    }

    /// Removes `entry` if present. Returns whether a slot was affected.
    pub fn remove(&self, entry: &E) -> bool {
        self.remove_first(|e| e == entry).is_some()
    }

    /// Removes the first live entry matching `pred` and returns it.
    ///
    /// Physically removes the slot when no iteration is active; otherwise
    /// leaves a tombstone so in-flight iterator indices stay valid.
    /// `pred` runs under the registry lock and must not touch the registry.
    pub fn remove_first(&self, mut pred: impl FnMut(&E) -> bool) -> Option<E> {
        let mut slots = self.slots.lock();
        let index = slots
            .entries
            .iter()
            .position(|slot| slot.as_ref().is_some_and(&mut pred))?;
        if slots.depth == 0 {
            slots.entries.remove(index)
        } else {
            slots.entries[index].take()
        }
    }

    /// Removes every live entry matching `pred`; returns how many were removed.
    pub fn remove_all(&self, mut pred: impl FnMut(&E) -> bool) -> usize {
        let removed: Vec<E> = {
            let mut slots = self.slots.lock();
            let mut removed = Vec::new();
            for slot in slots.entries.iter_mut() {
                if slot.as_ref().is_some_and(&mut pred) {
                    removed.extend(slot.take());
                }
            }
            if slots.depth == 0 {
                slots.compact();
            }
            removed
        };
        removed.len()
    }

    /// True if `entry` is a live slot.
    pub fn contains(&self, entry: &E) -> bool {
        self.slots.lock().entries.iter().flatten().any(|e| e == entry)
    }

    /// Removes everything.
    ///
    /// Wipes immediately when no iteration is active, otherwise tombstones every slot.
    pub fn clear(&self) {
        let dropped: Vec<Option<E>> = {
            let mut slots = self.slots.lock();
            if slots.depth == 0 {
                std::mem::take(&mut slots.entries)
            } else {
                slots.entries.iter_mut().map(Option::take).collect()
            }
        };
        drop(dropped);
    }

    /// Returns the live entry stored at slot `index`.
    ///
    /// Out-of-range access is a programmer error: it is logged and yields `None`,
    /// as does a tombstoned slot.
    pub fn get(&self, index: usize) -> Option<E> {
        let slots = self.slots.lock();
        match slots.entries.get(index) {
            Some(slot) => slot.clone(),
            None => {
                debug!(index, len = slots.entries.len(), "observer index out of range");
                None
            }
        }
    }

    /// Returns an iterator over live entries in insertion order.
    ///
    /// The iterator raises the iteration depth until it is exhausted, rewound, or dropped.
    pub fn iter(&self) -> Iter<'_, E> {
        let end = {
            let mut slots = self.slots.lock();
            slots.depth += 1;
            slots.entries.len()
        };
        Iter {
            list: self,
            end,
            index: 0,
            exhausted: false,
        }
    }
}

impl<E> ObserverRegistry<E> {
    /// Number of slots, tombstones included.
    pub fn len(&self) -> usize {
        self.slots.lock().entries.len()
    }

    /// True when there are no slots at all.
    pub fn is_empty(&self) -> bool {
        self.slots.lock().entries.is_empty()
    }

    /// Number of live (non-tombstoned) slots.
    pub fn live_len(&self) -> usize {
        self.slots.lock().entries.iter().flatten().count()
    }

    /// Current iteration depth.
    pub fn depth(&self) -> usize {
        self.slots.lock().depth
    }

    fn end_iteration(&self) {
        let mut slots = self.slots.lock();
        debug_assert!(slots.depth > 0, "iteration depth underflow");
        slots.depth = slots.depth.saturating_sub(1);
        if slots.depth == 0 {
            slots.compact();
        }
    }
}

impl<E> fmt::Debug for ObserverRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        f.debug_struct("ObserverRegistry")
            .field("slots", &slots.entries.len())
            .field("depth", &slots.depth)
            .finish()
    }
}

/// Iterator over the live entries of an [`ObserverRegistry`].
///
/// Yields clones, so the registry stays free to change between steps.
pub struct Iter<'a, E> {
    list: &'a ObserverRegistry<E>,
    end: usize,
    index: usize,
    exhausted: bool,
}

impl<E> Iter<'_, E> {
    /// Restarts the iteration from the first slot, reusing this iterator.
    pub fn rewind(&mut self) {
        self.finish();
        let mut slots = self.list.slots.lock();
        slots.depth += 1;
        self.end = slots.entries.len();
        self.index = 0;
        self.exhausted = false;
    }

    fn finish(&mut self) {
        if !self.exhausted {
            self.exhausted = true;
            self.list.end_iteration();
        }
    }
}

impl<E: Clone> Iterator for Iter<'_, E> {
    type Item = E;

    fn next(&mut self) -> Option<E> {
        if self.exhausted {
            return None;
        }
        let found = {
            let slots = self.list.slots.lock();
            let end = self.end.min(slots.entries.len());
            let mut found = None;
            while self.index < end {
                let slot = &slots.entries[self.index];
                self.index += 1;
                if let Some(entry) = slot {
                    found = Some(entry.clone());
                    break;
                }
            }
            found
        };
        if found.is_none() {
            self.finish();
        }
        found
    }
}

impl<E> Drop for Iter<'_, E> {
    fn drop(&mut self) {
        self.finish();
    }
}
