//! # ringframe core
//!
//! Frame-ring lifetime primitives for the ringframe renderer.
//!
//! - [`handle`]: typed handles whose ids are recycled only after a full ring
//!   of frames has elapsed
//! - [`store`]: generation-checked slot storage resolving those handles
//! - [`cache`]: ring-aged pools and content-addressed caches
//! - [`profiling`]: optional Tracy instrumentation
//!
//! Nothing here talks to a GPU. The graphics crate plugs raw object creation
//! and destruction into the caches through closures.

pub mod cache;
pub mod handle;
pub mod profiling;
pub mod store;

pub use cache::{CacheStats, ContentCache, TemporalPool};
pub use handle::{Handle, HandleAllocator, HandleKind};
pub use store::SlotStore;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the crate version once at startup.
pub fn init() {
    log::info!("ringframe core v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
