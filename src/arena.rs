//! Generation-checked arena with free list for handle storage.

use crate::ids::TaskKey;

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<usize>,
    len: usize,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Arena {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Arena {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Allocate a slot for a value that needs to know its own key.
    pub fn alloc_with(&mut self, make: impl FnOnce(TaskKey) -> T) -> TaskKey {
        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index];
            let key = TaskKey::from_parts(index, slot.generation);
            slot.value = Some(make(key));
            key
        } else {
            let index = self.slots.len();
            let key = TaskKey::from_parts(index, 0);
            self.slots.push(Slot {
                generation: 0,
                value: Some(make(key)),
            });
            key
        }
    }

    /// Take the value out of its slot. The slot's generation is bumped so
    /// `key` (and every copy of it) goes stale.
    pub fn remove(&mut self, key: TaskKey) -> Option<T> {
        let slot = self.slots.get_mut(key.index())?;
        if slot.generation != key.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(key.index());
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, key: TaskKey) -> Option<&T> {
        self.slots
            .get(key.index())
            .filter(|slot| slot.generation == key.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, key: TaskKey) -> Option<&mut T> {
        self.slots
            .get_mut(key.index())
            .filter(|slot| slot.generation == key.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, key: TaskKey) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskKey, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (TaskKey::from_parts(index, slot.generation), value))
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = TaskKey> + '_ {
        self.iter().map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}
