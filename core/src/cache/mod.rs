//! Ring-aged caches for objects the GPU may still be reading.
//!
//! Both caches keep a ring of slots, newest first. Calling `advance` once per
//! frame ages every slot by one; whatever falls off the oldest end has not been
//! requested for a full ring depth and is destroyed. Because the ring is at
//! least as deep as the number of frames in flight, nothing is destroyed or
//! handed out twice while a submitted frame could still reference it.
//!
//! - [`TemporalPool`]: interchangeable instances (scratch textures, buffers).
//!   A request takes any free instance with an equal key.
//! - [`ContentCache`]: one instance per key (render passes, framebuffers,
//!   descriptor sets). A request returns the same instance for an equal key.
//!
//! Creation and destruction are injected as closures that receive a mutable
//! context, so the ring logic stays independent of what is being cached.

mod content;
mod pool;

pub use content::ContentCache;
pub use pool::TemporalPool;

/// Creates a cached value for a key.
pub type CreateFn<K, V, C, E> = Box<dyn FnMut(&mut C, &K) -> Result<V, E> + Send>;

/// Destroys a value that aged out of a cache.
pub type DestroyFn<V, C> = Box<dyn FnMut(&mut C, V) + Send>;

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests served from the ring.
    pub hits: u64,
    /// Requests that had to create a new instance.
    pub misses: u64,
    /// Instances destroyed after aging out or on reset.
    pub destroyed: u64,
    /// Instances currently held (pooled, active or resident).
    pub resident: usize,
}
