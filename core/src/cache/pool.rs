use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use super::{CacheStats, CreateFn, DestroyFn};

/// Pool of interchangeable instances, aged through a ring of free slots.
///
/// ```text
///   request(key):  slot[0] → slot[1] → ... → slot[R-1]   first hit wins,
///                  newest      oldest                    else create
///
///   advance():     destroy slot[R-1], shift every slot one older,
///                  slot[0] = everything handed out since the last advance
/// ```
///
/// An instance handed out by [`request`](Self::request) stays in the active
/// list until the next [`advance`](Self::advance), so it is never given to a
/// second caller in the same frame.
pub struct TemporalPool<K, V, C, E> {
    name: &'static str,
    /// Front is the newest slot.
    slots: VecDeque<HashMap<K, Vec<V>>>,
    active: Vec<(K, V)>,
    create: CreateFn<K, V, C, E>,
    destroy: DestroyFn<V, C>,
    stats: CacheStats,
}

impl<K, V, C, E> TemporalPool<K, V, C, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a pool with `ring_depth` free slots.
    ///
    /// # Panics
    ///
    /// Panics if `ring_depth` is zero.
    pub fn new(
        name: &'static str,
        ring_depth: usize,
        create: CreateFn<K, V, C, E>,
        destroy: DestroyFn<V, C>,
    ) -> Self {
        assert!(ring_depth > 0, "pool ring depth must be at least 1");
        Self {
            name,
            slots: (0..ring_depth).map(|_| HashMap::new()).collect(),
            active: Vec::new(),
            create,
            destroy,
            stats: CacheStats::default(),
        }
    }

    /// Debug name of the pool.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of ring slots.
    pub fn ring_depth(&self) -> usize {
        self.slots.len()
    }

    /// Take a free instance matching `key`, creating one on a total miss.
    pub fn request(&mut self, ctx: &mut C, key: &K) -> Result<V, E> {
        self.request_matching(ctx, key, |_, _| true)
    }

    /// Like [`request`](Self::request), but only reuses free instances for
    /// which `accept` returns true. Rejected instances stay pooled and keep
    /// aging.
    pub fn request_matching<F>(&mut self, ctx: &mut C, key: &K, mut accept: F) -> Result<V, E>
    where
        F: FnMut(&C, &V) -> bool,
    {
        let mut reused = None;
        for slot in self.slots.iter_mut() {
            let Some(free) = slot.get_mut(key) else {
                continue;
            };
            if let Some(position) = free.iter().rposition(|value| accept(ctx, value)) {
                reused = Some(free.swap_remove(position));
                break;
            }
        }

        let value = match reused {
            Some(value) => {
                self.stats.hits += 1;
                value
            }
            None => {
                self.stats.misses += 1;
                log::trace!("{}: creating new instance", self.name);
                (self.create)(ctx, key)?
            }
        };

        self.active.push((key.clone(), value.clone()));
        Ok(value)
    }

    /// Age the ring by one frame.
    ///
    /// Instances left in the oldest slot went a full ring depth unused and are
    /// destroyed. Everything handed out since the previous advance becomes
    /// the newest free slot.
    pub fn advance(&mut self, ctx: &mut C) {
        if let Some(oldest) = self.slots.pop_back() {
            for value in oldest.into_values().flatten() {
                (self.destroy)(ctx, value);
                self.stats.destroyed += 1;
            }
        }

        let mut newest: HashMap<K, Vec<V>> = HashMap::new();
        for (key, value) in self.active.drain(..) {
            newest.entry(key).or_default().push(value);
        }
        self.slots.push_front(newest);
    }

    /// Destroy every instance, pooled or active.
    ///
    /// Only valid once the GPU is idle, e.g. at shutdown.
    pub fn reset(&mut self, ctx: &mut C) {
        let mut values: Vec<V> = self.active.drain(..).map(|(_, value)| value).collect();
        for slot in &mut self.slots {
            values.extend(slot.drain().flat_map(|(_, pooled)| pooled));
        }
        for value in values {
            (self.destroy)(ctx, value);
            self.stats.destroyed += 1;
        }
    }

    /// Number of instances handed out since the last advance.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of free instances across all slots.
    pub fn pooled_count(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| slot.values().map(Vec::len).sum::<usize>())
            .sum()
    }

    /// Snapshot of the pool's counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            resident: self.active_count() + self.pooled_count(),
            ..self.stats
        }
    }
}

impl<K, V, C, E> std::fmt::Debug for TemporalPool<K, V, C, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporalPool")
            .field("name", &self.name)
            .field("ring_depth", &self.slots.len())
            .field("active", &self.active.len())
            .field("pooled", &self.pooled_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal context: counts created ids and records destroyed ones.
    #[derive(Default)]
    struct Device {
        next_id: u32,
        destroyed: Vec<u32>,
    }

    fn pool(depth: usize) -> TemporalPool<&'static str, u32, Device, ()> {
        let _ = env_logger::builder().is_test(true).try_init();
        TemporalPool::new(
            "test",
            depth,
            Box::new(|device: &mut Device, _key: &&'static str| {
                device.next_id += 1;
                Ok(device.next_id)
            }),
            Box::new(|device: &mut Device, value: u32| device.destroyed.push(value)),
        )
    }

    #[test]
    fn test_miss_creates() {
        let mut device = Device::default();
        let mut pool = pool(2);
        let a = pool.request(&mut device, &"rgba8").unwrap();
        let b = pool.request(&mut device, &"rgba8").unwrap();
        // Both active in the same frame, so never shared
        assert_ne!(a, b);
        assert_eq!(pool.stats().misses, 2);
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn test_reuse_after_advance() {
        let mut device = Device::default();
        let mut pool = pool(4);

        let first = pool.request(&mut device, &"rgba8").unwrap();
        pool.advance(&mut device);

        for _ in 0..4 {
            let again = pool.request(&mut device, &"rgba8").unwrap();
            assert_eq!(again, first);
            pool.advance(&mut device);
        }
        assert_eq!(device.next_id, 1);
        assert_eq!(pool.stats().hits, 4);
        assert!(device.destroyed.is_empty());
    }

    #[test]
    fn test_rejected_instances_stay_pooled() {
        let mut device = Device::default();
        let mut pool = pool(3);

        let busy = pool.request(&mut device, &"rgba8").unwrap();
        pool.advance(&mut device);

        let fresh = pool
            .request_matching(&mut device, &"rgba8", |_, value| *value != busy)
            .unwrap();
        assert_ne!(fresh, busy);
        assert_eq!(pool.stats().misses, 2);
        assert_eq!(pool.pooled_count(), 1);

        // The rejected instance is still reusable once accepted
        pool.advance(&mut device);
        let again = pool
            .request_matching(&mut device, &"rgba8", |_, value| *value == busy)
            .unwrap();
        assert_eq!(again, busy);
        assert_eq!(pool.stats().hits, 1);
    }

    #[test]
    fn test_key_mismatch_does_not_reuse() {
        let mut device = Device::default();
        let mut pool = pool(2);
        let a = pool.request(&mut device, &"rgba8").unwrap();
        pool.advance(&mut device);
        let b = pool.request(&mut device, &"depth32").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unused_instances_destroyed_after_ring() {
        let mut device = Device::default();
        let mut pool = pool(3);

        let a = pool.request(&mut device, &"rgba8").unwrap();
        pool.advance(&mut device);
        pool.advance(&mut device);
        pool.advance(&mut device);
        assert!(device.destroyed.is_empty());

        pool.advance(&mut device);
        assert_eq!(device.destroyed, vec![a]);
        assert_eq!(pool.pooled_count(), 0);
    }

    #[test]
    fn test_reset_destroys_active_and_pooled() {
        let mut device = Device::default();
        let mut pool = pool(2);
        pool.request(&mut device, &"a").unwrap();
        pool.advance(&mut device);
        pool.request(&mut device, &"b").unwrap();

        pool.reset(&mut device);
        device.destroyed.sort();
        assert_eq!(device.destroyed, vec![1, 2]);
        assert_eq!(pool.stats().resident, 0);
        assert_eq!(pool.ring_depth(), 2);
    }

    #[test]
    fn test_create_error_propagates() {
        let mut device = Device::default();
        let mut pool: TemporalPool<u32, u32, Device, String> = TemporalPool::new(
            "failing",
            2,
            Box::new(|_: &mut Device, key: &u32| Err(format!("cannot create {}", key))),
            Box::new(|_: &mut Device, _: u32| {}),
        );
        let err = pool.request(&mut device, &7).unwrap_err();
        assert_eq!(err, "cannot create 7");
        assert_eq!(pool.active_count(), 0);
    }
}
