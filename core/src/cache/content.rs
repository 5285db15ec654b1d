use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use super::{CacheStats, CreateFn, DestroyFn};

/// Cache returning the same instance for equal keys until it ages out.
///
/// A hit in any slot moves the entry to the newest slot. Entries not
/// requested for a full ring depth fall off the oldest end and are destroyed,
/// e.g. framebuffers for a window size that is no longer used.
pub struct ContentCache<K, V, C, E> {
    name: &'static str,
    /// Front is the newest slot.
    slots: VecDeque<HashMap<K, V>>,
    create: CreateFn<K, V, C, E>,
    destroy: DestroyFn<V, C>,
    stats: CacheStats,
}

impl<K, V, C, E> ContentCache<K, V, C, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache with `ring_depth` slots.
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
        assert!(ring_depth > 0, "cache ring depth must be at least 1");
        Self {
            name,
            slots: (0..ring_depth).map(|_| HashMap::new()).collect(),
            create,
            destroy,
            stats: CacheStats::default(),
        }
    }

    /// Debug name of the cache.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of ring slots.
    pub fn ring_depth(&self) -> usize {
        self.slots.len()
    }

    /// Return the instance for `key`, creating it if not resident.
    pub fn request(&mut self, ctx: &mut C, key: &K) -> Result<V, E> {
        let found = self
            .slots
            .iter_mut()
            .find_map(|slot| slot.remove(key));

        let value = match found {
            Some(value) => {
                self.stats.hits += 1;
                value
            }
            None => {
                self.stats.misses += 1;
                log::trace!("{}: creating new entry", self.name);
                (self.create)(ctx, key)?
            }
        };

        if let Some(newest) = self.slots.front_mut() {
            newest.insert(key.clone(), value.clone());
        }
        Ok(value)
    }

    /// Look up `key` without refreshing or creating it.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.slots.iter().find_map(|slot| slot.get(key))
    }

    /// Age the ring by one frame, destroying entries in the oldest slot.
    pub fn advance(&mut self, ctx: &mut C) {
        if let Some(oldest) = self.slots.pop_back() {
            for value in oldest.into_values() {
                (self.destroy)(ctx, value);
                self.stats.destroyed += 1;
            }
        }
        self.slots.push_front(HashMap::new());
    }

    /// Destroy every resident entry.
    pub fn reset(&mut self, ctx: &mut C) {
        let values: Vec<V> = self
            .slots
            .iter_mut()
            .flat_map(|slot| slot.drain().map(|(_, value)| value))
            .collect();
        for value in values {
            (self.destroy)(ctx, value);
            self.stats.destroyed += 1;
        }
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.slots.iter().map(HashMap::len).sum()
    }

    /// Returns true if no entry is resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the cache's counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            resident: self.len(),
            ..self.stats
        }
    }
}

impl<K, V, C, E> std::fmt::Debug for ContentCache<K, V, C, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("name", &self.name)
            .field("ring_depth", &self.slots.len())
            .field("resident", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Device {
        created: Vec<(u32, u32)>,
        destroyed: Vec<u64>,
    }

    /// Keys are (width, height); values pack them into one id.
    fn cache(depth: usize) -> ContentCache<(u32, u32), u64, Device, ()> {
        let _ = env_logger::builder().is_test(true).try_init();
        ContentCache::new(
            "framebuffers",
            depth,
            Box::new(|device: &mut Device, key: &(u32, u32)| {
                device.created.push(*key);
                Ok(((key.0 as u64) << 32) | key.1 as u64)
            }),
            Box::new(|device: &mut Device, value: u64| device.destroyed.push(value)),
        )
    }

    #[test]
    fn test_same_key_same_instance() {
        let mut device = Device::default();
        let mut cache = cache(3);

        let a = cache.request(&mut device, &(800, 600)).unwrap();
        let b = cache.request(&mut device, &(800, 600)).unwrap();
        assert_eq!(a, b);

        cache.advance(&mut device);
        let c = cache.request(&mut device, &(800, 600)).unwrap();
        assert_eq!(a, c);
        assert_eq!(device.created.len(), 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn test_touch_refreshes_age() {
        let mut device = Device::default();
        let mut cache = cache(2);

        cache.request(&mut device, &(64, 64)).unwrap();
        for _ in 0..10 {
            cache.advance(&mut device);
            cache.request(&mut device, &(64, 64)).unwrap();
        }
        assert!(device.destroyed.is_empty());
        assert_eq!(device.created.len(), 1);
    }

    #[test]
    fn test_resize_ages_out_old_entry() {
        let mut device = Device::default();
        let mut cache = cache(2);

        let old = cache.request(&mut device, &(800, 600)).unwrap();
        cache.advance(&mut device);

        // Window resized: only the new size is requested from now on
        cache.request(&mut device, &(1024, 768)).unwrap();
        assert!(device.destroyed.is_empty());
        cache.advance(&mut device);
        assert_eq!(device.destroyed, vec![old]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_peek_does_not_create() {
        let mut device = Device::default();
        let mut cache = cache(2);
        assert!(cache.peek(&(1, 1)).is_none());
        cache.request(&mut device, &(1, 1)).unwrap();
        assert!(cache.peek(&(1, 1)).is_some());
    }

    #[test]
    fn test_reset_destroys_everything() {
        let mut device = Device::default();
        let mut cache = cache(4);
        cache.request(&mut device, &(1, 1)).unwrap();
        cache.advance(&mut device);
        cache.request(&mut device, &(2, 2)).unwrap();
        cache.reset(&mut device);
        assert_eq!(device.destroyed.len(), 2);
        assert!(cache.is_empty());
    }
}
