//! Typed handles with frame-delayed recycling.
//!
//! A [`Handle`] is a small copyable value naming a record in a
//! [`SlotStore`](crate::store::SlotStore). It never owns anything itself.
//!
//! # Delayed recycling
//!
//! Command buffers recorded in frame `f` may still reference a handle while
//! the GPU executes them. If the handle's id were reissued immediately after
//! release, a stale command could resolve to an unrelated object. The
//! [`HandleAllocator`] therefore parks released ids in a ring of invalidation
//! buckets and only moves them to the free list after the ring has fully
//! rotated:
//!
//! ```text
//!   release(h) ──► bucket[0]   bucket[1]   ...   bucket[R-1] ──► free list
//!                     ▲                                │
//!                     └──────── advance() rotates ─────┘
//! ```
//!
//! The ring depth `R` must be at least the number of frames in flight.

use std::collections::VecDeque;
use std::fmt;
use std::hash::Hash;

/// Default number of extra ring slots on top of the frames-in-flight count.
pub const DEFAULT_RING_MARGIN: usize = 8;

/// An enumeration of object kinds a [`HandleAllocator`] issues ids for.
///
/// Each kind owns an independent id space.
pub trait HandleKind: Copy + Eq + Ord + Hash + fmt::Debug + Send + Sync + 'static {
    /// Number of distinct kinds.
    const COUNT: usize;

    /// Dense index of this kind in `0..COUNT`.
    fn index(self) -> usize;
}

/// Opaque typed identifier for a stored record.
///
/// Equality and ordering are by `(kind, id, generation)`. The generation is
/// bumped every time an id is reissued, so two simultaneously valid handles
/// never compare equal unless they name the same record.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle<K: HandleKind> {
    kind: K,
    id: u32,
    generation: u32,
}

impl<K: HandleKind> Handle<K> {
    /// Get the kind of object this handle refers to.
    #[inline]
    pub fn kind(&self) -> K {
        self.kind
    }

    /// Get the raw id within the kind's id space.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Get the generation of the id.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Dense slot index for this handle.
    #[inline]
    pub fn index(&self) -> usize {
        self.id as usize
    }
}

impl<K: HandleKind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}v{}", self.kind, self.id, self.generation)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct IdSlot {
    generation: u32,
    active: bool,
}

#[derive(Debug)]
struct KindIds {
    slots: Vec<IdSlot>,
    free: Vec<u32>,
    /// Front is the newest bucket.
    invalidated: VecDeque<Vec<u32>>,
    active_count: usize,
}

impl KindIds {
    fn new(ring_depth: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            invalidated: (0..ring_depth).map(|_| Vec::new()).collect(),
            active_count: 0,
        }
    }
}

/// Issues handles per kind and recycles released ids only after a full ring
/// of [`advance`](Self::advance) calls.
#[derive(Debug)]
pub struct HandleAllocator<K: HandleKind> {
    kinds: Vec<KindIds>,
    ring_depth: usize,
    _kind: std::marker::PhantomData<K>,
}

impl<K: HandleKind> HandleAllocator<K> {
    /// Create an allocator whose invalidation ring has `ring_depth` buckets.
    ///
    /// # Panics
    ///
    /// Panics if `ring_depth` is zero.
    pub fn new(ring_depth: usize) -> Self {
        assert!(ring_depth > 0, "handle ring depth must be at least 1");
        Self {
            kinds: (0..K::COUNT).map(|_| KindIds::new(ring_depth)).collect(),
            ring_depth,
            _kind: std::marker::PhantomData,
        }
    }

    /// Create an allocator sized for `frames_in_flight` plus [`DEFAULT_RING_MARGIN`].
    pub fn for_frames_in_flight(frames_in_flight: usize) -> Self {
        Self::new(frames_in_flight + DEFAULT_RING_MARGIN)
    }

    /// Number of buckets in the invalidation ring.
    pub fn ring_depth(&self) -> usize {
        self.ring_depth
    }

    /// Issue a handle of `kind`, reusing a recycled id when one is free.
    pub fn allocate(&mut self, kind: K) -> Handle<K> {
        let ids = &mut self.kinds[kind.index()];
        let id = match ids.free.pop() {
            Some(id) => {
                let slot = &mut ids.slots[id as usize];
                slot.generation = slot.generation.wrapping_add(1);
                id
            }
            None => {
                ids.slots.push(IdSlot::default());
                (ids.slots.len() - 1) as u32
            }
        };

        let slot = &mut ids.slots[id as usize];
        slot.active = true;
        ids.active_count += 1;

        Handle {
            kind,
            id,
            generation: slot.generation,
        }
    }

    /// Invalidate `handle`. Its id is parked in the newest bucket and only
    /// becomes reusable after `ring_depth` calls to [`advance`](Self::advance).
    ///
    /// # Panics
    ///
    /// Panics if the handle is not currently active (double release or stale
    /// handle).
    pub fn release(&mut self, handle: Handle<K>) {
        assert!(
            self.is_valid(handle),
            "release of inactive handle {:?}",
            handle
        );
        let ids = &mut self.kinds[handle.kind.index()];
        ids.slots[handle.index()].active = false;
        ids.active_count -= 1;
        if let Some(bucket) = ids.invalidated.front_mut() {
            bucket.push(handle.id);
        }
    }

    /// Rotate every kind's invalidation ring by one slot.
    ///
    /// Must be called exactly once per rendered frame, after the frame slot
    /// being reused has been fenced idle.
    pub fn advance(&mut self) {
        for ids in &mut self.kinds {
            if let Some(oldest) = ids.invalidated.pop_back() {
                ids.free.extend(oldest);
            }
            ids.invalidated.push_front(Vec::new());
        }
    }

    /// Check whether `handle` is currently active.
    #[inline]
    pub fn is_valid(&self, handle: Handle<K>) -> bool {
        self.kinds[handle.kind.index()]
            .slots
            .get(handle.index())
            .is_some_and(|slot| slot.active && slot.generation == handle.generation)
    }

    /// Number of active handles of `kind`.
    pub fn active_count(&self, kind: K) -> usize {
        self.kinds[kind.index()].active_count
    }

    /// Number of ids of `kind` ready for immediate reuse.
    pub fn free_count(&self, kind: K) -> usize {
        self.kinds[kind.index()].free.len()
    }

    /// Number of ids of `kind` still aging through the invalidation ring.
    pub fn pending_count(&self, kind: K) -> usize {
        self.kinds[kind.index()]
            .invalidated
            .iter()
            .map(Vec::len)
            .sum()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub(crate) enum TestKind {
        Texture,
        Buffer,
    }

    impl HandleKind for TestKind {
        const COUNT: usize = 2;

        fn index(self) -> usize {
            self as usize
        }
    }

    #[test]
    fn test_allocate_fresh_ids() {
        let mut allocator = HandleAllocator::<TestKind>::new(3);
        let a = allocator.allocate(TestKind::Texture);
        let b = allocator.allocate(TestKind::Texture);
        let c = allocator.allocate(TestKind::Buffer);

        assert_ne!(a, b);
        assert_eq!(a.id(), 0);
        assert_eq!(b.id(), 1);
        // Kinds have independent id spaces
        assert_eq!(c.id(), 0);
        assert!(allocator.is_valid(a));
        assert!(allocator.is_valid(c));
        assert_eq!(allocator.active_count(TestKind::Texture), 2);
    }

    #[test]
    fn test_release_invalidates_immediately() {
        let mut allocator = HandleAllocator::<TestKind>::new(3);
        let a = allocator.allocate(TestKind::Texture);
        allocator.release(a);
        assert!(!allocator.is_valid(a));
        assert_eq!(allocator.pending_count(TestKind::Texture), 1);
        assert_eq!(allocator.free_count(TestKind::Texture), 0);
    }

    #[test]
    #[should_panic(expected = "release of inactive handle")]
    fn test_double_release_panics() {
        let mut allocator = HandleAllocator::<TestKind>::new(3);
        let a = allocator.allocate(TestKind::Buffer);
        allocator.release(a);
        allocator.release(a);
    }

    #[test]
    fn test_ids_recycled_only_after_full_ring() {
        const RING: usize = 4;
        const COUNT: usize = 16;
        let mut allocator = HandleAllocator::<TestKind>::new(RING);

        let handles: Vec<_> = (0..COUNT)
            .map(|_| allocator.allocate(TestKind::Texture))
            .collect();
        for handle in &handles {
            allocator.release(*handle);
        }

        for _ in 0..RING - 1 {
            allocator.advance();
            assert_eq!(allocator.free_count(TestKind::Texture), 0);
            // Fresh ids keep growing while released ones are parked
            let fresh = allocator.allocate(TestKind::Texture);
            assert!(fresh.index() >= COUNT);
            allocator.release(fresh);
        }

        allocator.advance();
        let released: HashSet<u32> = handles.iter().map(Handle::id).collect();
        assert!(allocator.free_count(TestKind::Texture) >= COUNT);
        let reused = allocator.allocate(TestKind::Texture);
        assert!(released.contains(&reused.id()) || reused.index() >= COUNT);
    }

    #[test]
    fn test_exact_ring_depth_frees_all_released() {
        let mut allocator = HandleAllocator::<TestKind>::new(5);
        let handles: Vec<_> = (0..7).map(|_| allocator.allocate(TestKind::Buffer)).collect();
        for handle in &handles {
            allocator.release(*handle);
        }

        for _ in 0..4 {
            allocator.advance();
        }
        assert_eq!(allocator.free_count(TestKind::Buffer), 0);

        allocator.advance();
        assert_eq!(allocator.free_count(TestKind::Buffer), 7);
        assert_eq!(allocator.pending_count(TestKind::Buffer), 0);
    }

    #[test]
    fn test_recycled_handle_has_new_generation() {
        let mut allocator = HandleAllocator::<TestKind>::new(1);
        let a = allocator.allocate(TestKind::Texture);
        allocator.release(a);
        allocator.advance();

        let b = allocator.allocate(TestKind::Texture);
        assert_eq!(a.id(), b.id());
        assert_ne!(a, b);
        assert!(!allocator.is_valid(a));
        assert!(allocator.is_valid(b));
    }

    #[test]
    fn test_no_aliasing_under_random_sequences() {
        // xorshift keeps the sequence deterministic
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        const RING: usize = 3;
        let mut allocator = HandleAllocator::<TestKind>::new(RING);
        let mut live: Vec<Handle<TestKind>> = Vec::new();
        // id -> frame it was released in
        let mut released_at: Vec<(Handle<TestKind>, usize)> = Vec::new();
        let mut frame = 0usize;

        for _ in 0..2000 {
            match next() % 4 {
                0 | 1 => {
                    let kind = if next() % 2 == 0 {
                        TestKind::Texture
                    } else {
                        TestKind::Buffer
                    };
                    let handle = allocator.allocate(kind);
                    for other in &live {
                        assert!(
                            !(other.kind() == handle.kind() && other.id() == handle.id()),
                            "aliased {:?} with {:?}",
                            handle,
                            other
                        );
                    }
                    for (old, at) in &released_at {
                        if old.kind() == handle.kind() && old.id() == handle.id() {
                            assert!(frame - at >= RING, "id reissued too early");
                        }
                    }
                    live.push(handle);
                }
                2 if !live.is_empty() => {
                    let index = (next() as usize) % live.len();
                    let handle = live.swap_remove(index);
                    allocator.release(handle);
                    released_at.retain(|(old, _)| {
                        !(old.kind() == handle.kind() && old.id() == handle.id())
                    });
                    released_at.push((handle, frame));
                }
                _ => {
                    allocator.advance();
                    frame += 1;
                }
            }

            for handle in &live {
                assert!(allocator.is_valid(*handle));
            }
        }
    }

    #[test]
    fn test_debug_format() {
        let mut allocator = HandleAllocator::<TestKind>::new(2);
        let a = allocator.allocate(TestKind::Buffer);
        assert_eq!(format!("{:?}", a), "Buffer#0v0");
    }
}
