//! # ringframe graphics
//!
//! Frame-ring renderer core: a per-frame render graph on top of a resource
//! lifetime system that never frees anything the GPU may still be using.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`RenderContext`] - owns the backend, the frame ring and every GPU object
//! - [`RenderGraph`] - declarative passes with automatic barriers, ownership
//!   transfers and cross-queue semaphores
//! - [`CommandRecorder`] - command recording with tracked resource states
//! - [`GpuBackend`] - the device abstraction, with a headless
//!   [`DummyBackend`] and an optional Vulkan implementation
//!
//! ## Example
//!
//! ```ignore
//! use ringframe_graphics::{RenderContext, RenderContextConfig, RenderGraph};
//!
//! let mut ctx = RenderContext::with_default_backend(RenderContextConfig::default())?;
//! let mut graph = RenderGraph::new();
//!
//! loop {
//!     ctx.begin_frame()?;
//!     // declare passes...
//!     graph.compile(&mut ctx)?;
//!     graph.evaluate(&mut ctx)?;
//!     graph.clean_up(&mut ctx);
//!     ctx.end_frame()?;
//! }
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod graph;
pub mod recorder;
pub mod resources;
pub mod swapchain;
pub mod sync;
pub mod types;

// Re-export main types for convenience
pub use backend::dummy::DummyBackend;
pub use backend::{GpuBackend, create_backend};
pub use config::RenderContextConfig;
pub use context::{CacheStatistics, ContextStatistics, GpuResources, RenderContext};
pub use error::GraphicsError;
pub use graph::{
    GraphState, GraphStatistics, PassBuilder, PassHandle, PassNode, PassRegistry, PassTiming,
    RenderGraph,
};
pub use recorder::CommandRecorder;
pub use resources::{ResourceHandle, ResourceKind};
pub use swapchain::{AcquiredImage, PresentMode, SwapchainDescriptor, SwapchainImage};
pub use sync::{AccessFlags, ImageLayout, PipelineStages, ResourceState};
pub use types::{
    BufferDescriptor, BufferUsage, ClearValue, Extent3d, QueueKind, TextureDescriptor,
    TextureFormat, TextureUsage,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging-facing state of the graphics crate.
///
/// This should be called once before creating a [`RenderContext`].
pub fn init() {
    ringframe_core::init();
    log::info!("ringframe graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_render_graph_creation() {
        let graph = RenderGraph::new();
        assert_eq!(graph.pass_count(), 0);
        assert_eq!(graph.state(), GraphState::Declaring);
    }

    #[test]
    fn test_dummy_backend() {
        let backend = DummyBackend::new();
        assert_eq!(backend.name(), "Dummy Backend");
    }
}
