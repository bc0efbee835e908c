//! LRU List Module
//!
//! Recency order for the cache engine, kept as a doubly-linked list whose
//! nodes live in an arena and refer to each other by index.
//!
//! - Slot 0 is the head sentinel (most recently used side)
//! - Slot 1 is the tail sentinel (least recently used side)
//!
//! Callers hold [`Handle`]s. A handle carries the generation of the slot it
//! was issued for; once the item is removed the slot's generation moves on
//! and the old handle stops resolving, even if the slot is reused.

const HEAD: usize = 0;
const TAIL: usize = 1;
const FIRST_ITEM_SLOT: usize = 2;

// == Handle ==
/// Stable reference to an item in an [`LruList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: usize,
    generation: u64,
}

#[derive(Debug)]
struct Slot<T> {
    item: Option<T>,
    generation: u64,
    prev: usize,
    next: usize,
}

impl<T> Slot<T> {
    fn sentinel() -> Self {
        Self {
            item: None,
            generation: 0,
            prev: HEAD,
            next: TAIL,
        }
    }
}

// == LRU List ==
/// Arena-backed recency list.
#[derive(Debug)]
pub struct LruList<T> {
    slots: Vec<Slot<T>>,
    /// Vacated slots ready for reuse
    free: Vec<usize>,
    len: usize,
}

impl<T> Default for LruList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LruList<T> {
    // == Constructor ==
    /// Creates an empty list holding only the two sentinels.
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::sentinel(), Slot::sentinel()],
            free: Vec::new(),
            len: 0,
        }
    }

    // == Push Front ==
    /// Inserts an item at the most recently used position.
    pub fn push_front(&mut self, item: T) -> Handle {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::sentinel());
                self.slots.len() - 1
            }
        };

        self.slots[index].item = Some(item);
        self.link_front(index);
        self.len += 1;

        Handle {
            index,
            generation: self.slots[index].generation,
        }
    }

    // == Move To Front ==
    /// Marks an item as most recently used.
    ///
    /// Returns false if the handle is stale.
    pub fn move_to_front(&mut self, handle: Handle) -> bool {
        if !self.is_live(handle) {
            return false;
        }
        if self.slots[HEAD].next != handle.index {
            self.unlink(handle.index);
            self.link_front(handle.index);
        }
        true
    }

    // == Remove ==
    /// Unlinks an item and returns it, invalidating its handle.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        if !self.is_live(handle) {
            return None;
        }
        self.unlink(handle.index);
        self.release(handle.index)
    }

    // == Pop Back ==
    /// Removes and returns the least recently used item.
    pub fn pop_back(&mut self) -> Option<T> {
        let handle = self.back()?;
        self.remove(handle)
    }

    // == Back ==
    /// Handle of the least recently used item, if any.
    pub fn back(&self) -> Option<Handle> {
        self.handle_at(self.slots[TAIL].prev)
    }

    // == Front ==
    /// Handle of the most recently used item, if any.
    pub fn front(&self) -> Option<Handle> {
        self.handle_at(self.slots[HEAD].next)
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        if !self.is_live(handle) {
            return None;
        }
        self.slots[handle.index].item.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        if !self.is_live(handle) {
            return None;
        }
        self.slots[handle.index].item.as_mut()
    }

    // == Clear ==
    /// Drops every item. All outstanding handles become stale.
    pub fn clear(&mut self) {
        let mut index = self.slots[HEAD].next;
        while index != TAIL {
            let next = self.slots[index].next;
            self.release(index);
            index = next;
        }
        self.slots[HEAD].next = TAIL;
        self.slots[TAIL].prev = HEAD;
    }

    // == Iter ==
    /// Iterates items from most to least recently used.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.slots[HEAD].next,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn is_live(&self, handle: Handle) -> bool {
        handle.index >= FIRST_ITEM_SLOT
            && self
                .slots
                .get(handle.index)
                .map(|slot| slot.generation == handle.generation && slot.item.is_some())
                .unwrap_or(false)
    }

    fn handle_at(&self, index: usize) -> Option<Handle> {
        if index < FIRST_ITEM_SLOT {
            return None;
        }
        Some(Handle {
            index,
            generation: self.slots[index].generation,
        })
    }

    fn link_front(&mut self, index: usize) {
        let first = self.slots[HEAD].next;
        self.slots[index].prev = HEAD;
        self.slots[index].next = first;
        self.slots[first].prev = index;
        self.slots[HEAD].next = index;
    }

    fn unlink(&mut self, index: usize) {
        let prev = self.slots[index].prev;
        let next = self.slots[index].next;
        self.slots[prev].next = next;
        self.slots[next].prev = prev;
        self.slots[index].prev = index;
        self.slots[index].next = index;
    }

    /// Takes the item out of an already unlinked slot and recycles the slot.
    fn release(&mut self, index: usize) -> Option<T> {
        let slot = &mut self.slots[index];
        let item = slot.item.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(item)
    }
}

// == Iterator ==
pub struct Iter<'a, T> {
    list: &'a LruList<T>,
    cursor: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == TAIL {
            return None;
        }
        let slot = &self.list.slots[self.cursor];
        self.cursor = slot.next;
        slot.item.as_ref()
    }
}
