//! Identifier types for the scheduler.
//!
//! All IDs are lightweight Copy types using newtype pattern for type safety.

use std::fmt;

/// Public reference to a registered computation.
///
/// A key is an arena slot index paired with the generation the slot had when
/// the handle was allocated. Once the handle is removed the slot's generation
/// moves on, so an old key can never resolve to a newer handle that happens to
/// reuse the same slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct TaskKey {
    index: u32,
    generation: u32,
}

impl TaskKey {
    pub fn from_parts(index: usize, generation: u32) -> Self {
        TaskKey {
            index: index as u32,
            generation,
        }
    }

    /// Slot index inside the handle arena.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Pack into a single integer (index in the low half).
    ///
    /// Used where a key has to cross into a host language as a plain number.
    pub fn to_raw(&self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    pub fn from_raw(value: u64) -> Self {
        TaskKey {
            index: value as u32,
            generation: (value >> 32) as u32,
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}v{}", self.index, self.generation)
    }
}
