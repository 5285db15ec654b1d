//! Generation-checked slot storage for handle-addressed records.

use crate::handle::{Handle, HandleAllocator, HandleKind};

struct Slot<T> {
    generation: u32,
    value: T,
}

/// Dense map from [`Handle`] to a record of one kind.
///
/// Lookups go through the owning [`HandleAllocator`] so a stale handle is
/// caught by assertion instead of silently resolving to a recycled slot.
pub struct SlotStore<K: HandleKind, T> {
    kind: K,
    slots: Vec<Option<Slot<T>>>,
    len: usize,
}

impl<K: HandleKind, T> SlotStore<K, T> {
    /// Create an empty store for records of `kind`.
    pub fn new(kind: K) -> Self {
        Self {
            kind,
            slots: Vec::new(),
            len: 0,
        }
    }

    /// The kind of handle this store accepts.
    pub fn kind(&self) -> K {
        self.kind
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert the record for a freshly allocated handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle has the wrong kind or its slot is occupied.
    pub fn insert(&mut self, handle: Handle<K>, value: T) {
        assert_eq!(handle.kind(), self.kind, "handle kind mismatch");
        let index = handle.index();
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        assert!(
            self.slots[index].is_none(),
            "slot for {:?} already occupied",
            handle
        );
        self.slots[index] = Some(Slot {
            generation: handle.generation(),
            value,
        });
        self.len += 1;
    }

    /// Resolve a handle to its record.
    ///
    /// # Panics
    ///
    /// Panics if the handle is not valid in `allocator` or has no record.
    pub fn get(&self, allocator: &HandleAllocator<K>, handle: Handle<K>) -> &T {
        assert!(allocator.is_valid(handle), "invalid handle {:?}", handle);
        match self.slot(handle) {
            Some(slot) => &slot.value,
            None => panic!("no record for {:?}", handle),
        }
    }

    /// Resolve a handle to its record for in-place mutation.
    ///
    /// # Panics
    ///
    /// Panics if the handle is not valid in `allocator` or has no record.
    pub fn get_mut(&mut self, allocator: &HandleAllocator<K>, handle: Handle<K>) -> &mut T {
        assert!(allocator.is_valid(handle), "invalid handle {:?}", handle);
        let generation = handle.generation();
        match self.slots.get_mut(handle.index()) {
            Some(Some(slot)) if slot.generation == generation => &mut slot.value,
            _ => panic!("no record for {:?}", handle),
        }
    }

    /// Look up a record without consulting the allocator.
    ///
    /// Used on teardown paths where the handle has already been released.
    pub fn try_get(&self, handle: Handle<K>) -> Option<&T> {
        self.slot(handle).map(|slot| &slot.value)
    }

    /// Returns true if a record exists for `handle`.
    pub fn contains(&self, handle: Handle<K>) -> bool {
        self.slot(handle).is_some()
    }

    /// Remove and return the record for `handle`.
    ///
    /// # Panics
    ///
    /// Panics if no record exists for the handle's slot and generation.
    pub fn remove(&mut self, handle: Handle<K>) -> T {
        let generation = handle.generation();
        let taken = self
            .slots
            .get_mut(handle.index())
            .and_then(|slot| slot.take_if(|s| s.generation == generation));
        match taken {
            Some(slot) => {
                self.len -= 1;
                slot.value
            }
            None => panic!("remove of missing record {:?}", handle),
        }
    }

    /// Remove every record, yielding them in slot order.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.len = 0;
        self.slots.drain(..).flatten().map(|slot| slot.value)
    }

    /// Iterate over `(slot index, record)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (i, &s.value)))
    }

    fn slot(&self, handle: Handle<K>) -> Option<&Slot<T>> {
        self.slots
            .get(handle.index())
            .and_then(Option::as_ref)
            .filter(|slot| slot.generation == handle.generation())
    }
}

impl<K: HandleKind, T> std::fmt::Debug for SlotStore<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotStore")
            .field("kind", &self.kind)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::tests::TestKind;

    #[test]
    fn test_insert_get_remove() {
        let mut allocator = HandleAllocator::new(2);
        let mut store = SlotStore::new(TestKind::Texture);

        let a = allocator.allocate(TestKind::Texture);
        store.insert(a, "albedo");
        assert_eq!(*store.get(&allocator, a), "albedo");
        assert_eq!(store.len(), 1);

        *store.get_mut(&allocator, a) = "normal";
        assert_eq!(*store.get(&allocator, a), "normal");

        assert_eq!(store.remove(a), "normal");
        assert!(store.is_empty());
    }

    #[test]
    #[should_panic(expected = "invalid handle")]
    fn test_get_released_handle_panics() {
        let mut allocator = HandleAllocator::new(2);
        let mut store = SlotStore::new(TestKind::Buffer);
        let a = allocator.allocate(TestKind::Buffer);
        store.insert(a, 1u32);
        allocator.release(a);
        let _ = store.get(&allocator, a);
    }

    #[test]
    fn test_stale_generation_not_resolved() {
        let mut allocator = HandleAllocator::new(1);
        let mut store = SlotStore::new(TestKind::Buffer);

        let a = allocator.allocate(TestKind::Buffer);
        store.insert(a, 1u32);
        allocator.release(a);
        store.remove(a);
        allocator.advance();

        let b = allocator.allocate(TestKind::Buffer);
        store.insert(b, 2u32);
        assert_eq!(a.index(), b.index());
        assert!(store.try_get(a).is_none());
        assert_eq!(store.try_get(b), Some(&2));
    }

    #[test]
    #[should_panic(expected = "handle kind mismatch")]
    fn test_wrong_kind_panics() {
        let mut allocator = HandleAllocator::new(1);
        let mut store = SlotStore::new(TestKind::Texture);
        let a = allocator.allocate(TestKind::Buffer);
        store.insert(a, ());
    }

    #[test]
    fn test_drain_empties_store() {
        let mut allocator = HandleAllocator::new(1);
        let mut store = SlotStore::new(TestKind::Texture);
        for i in 0..4 {
            let h = allocator.allocate(TestKind::Texture);
            store.insert(h, i);
        }
        let drained: Vec<_> = store.drain().collect();
        assert_eq!(drained, vec![0, 1, 2, 3]);
        assert!(store.is_empty());
    }
}
