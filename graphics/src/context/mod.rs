//! The render context.
//!
//! [`RenderContext`] is the single explicit owner of everything the renderer
//! creates: the backend, the handle allocator and record stores
//! ([`GpuResources`]), the frame ring, and the temporal caches
//! ([`GraphCaches`]). It is passed `&mut` into the render graph and the
//! command recorder, so no locking is needed on any of that state.
//!
//! # Frame lifecycle
//!
//! ```text
//! begin_frame()            wait slot fences, destroy deferred objects,
//!                          recycle descriptor sets, advance handle ring
//!   acquire_next_image()   (optional)
//!   graph: add_pass.. compile evaluate clean_up
//!   present()              (optional)
//! end_frame()              settle ownership transfers, fence the slot,
//!                          advance the frame ring
//! ```

mod caches;
mod resources;

pub use caches::{CacheStatistics, DescriptorSetKey, FramebufferKey, GraphCaches};
pub use resources::GpuResources;

use std::sync::Arc;

use crate::backend::GpuBackend;
use crate::config::RenderContextConfig;
use crate::error::GraphicsError;
use crate::frame::SubmitBatch;
use crate::resources::{
    BufferRecord, ResourceHandle, ResourceKind, ScratchAllocation, TextureRecord,
};
use crate::types::{
    BufferDescriptor, DescriptorSetLayoutDescriptor, DescriptorWrite, PipelineDescriptor,
    QueueKind, RenderPassLayout, TextureDescriptor,
};

/// Snapshot of context-wide counters, for a developer overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextStatistics {
    /// Number of frames ended so far.
    pub frame_number: u64,
    /// Live objects per kind, indexed like [`ResourceKind::ALL`].
    pub live_objects: [usize; 8],
    /// Objects waiting in deferred-destruction queues.
    pub pending_destructions: usize,
    /// Cache counters.
    pub caches: CacheStatistics,
}

impl ContextStatistics {
    /// Live objects of `kind`.
    pub fn live(&self, kind: ResourceKind) -> usize {
        self.live_objects[kind as usize]
    }
}

/// Owner of all renderer state.
pub struct RenderContext {
    pub(crate) resources: GpuResources,
    pub(crate) caches: GraphCaches,
    config: RenderContextConfig,
    pub(crate) in_frame: bool,
    shut_down: bool,
}

impl RenderContext {
    /// Create a context on `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if the configuration is
    /// invalid.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        config: RenderContextConfig,
    ) -> Result<Self, GraphicsError> {
        config.validate()?;
        log::info!(
            "Creating render context '{}' on {} backend ({} frames in flight)",
            config.label,
            backend.name(),
            config.frames_in_flight
        );
        Ok(Self {
            resources: GpuResources::new(backend, &config),
            caches: GraphCaches::new(config.cache_ring_depth()),
            config,
            in_frame: false,
            shut_down: false,
        })
    }

    /// Create a context on the best available backend.
    pub fn with_default_backend(config: RenderContextConfig) -> Result<Self, GraphicsError> {
        Self::new(crate::backend::create_backend()?, config)
    }

    /// The configuration the context was created with.
    pub fn config(&self) -> &RenderContextConfig {
        &self.config
    }

    /// The backend.
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.resources.backend
    }

    /// Resource storage.
    pub fn resources(&self) -> &GpuResources {
        &self.resources
    }

    /// Resource storage, mutably.
    pub fn resources_mut(&mut self) -> &mut GpuResources {
        &mut self.resources
    }

    /// The temporal caches.
    pub fn caches(&self) -> &GraphCaches {
        &self.caches
    }

    /// Borrow the resources and caches at once, for cache requests.
    pub(crate) fn split_mut(&mut self) -> (&mut GpuResources, &mut GraphCaches) {
        (&mut self.resources, &mut self.caches)
    }

    /// Index of the current frame ring slot.
    pub fn frame_index(&self) -> usize {
        self.resources.frames.index()
    }

    /// Number of frames ended so far.
    pub fn frame_number(&self) -> u64 {
        self.resources.frames.frame_number()
    }

    /// Returns true between `begin_frame` and `end_frame`.
    pub fn is_in_frame(&self) -> bool {
        self.in_frame
    }

    /// Start a frame.
    ///
    /// Blocks until the GPU finished the work submitted the last time this
    /// frame slot was used, then releases everything deferred in it.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::DeviceLost`] if the fence wait fails.
    ///
    /// # Panics
    ///
    /// Panics if a frame is already in progress.
    pub fn begin_frame(&mut self) -> Result<(), GraphicsError> {
        ringframe_core::profile_scope!("begin_frame");
        assert!(!self.in_frame, "begin_frame called twice without end_frame");
        assert!(!self.shut_down, "begin_frame after shutdown");

        let backend = self.resources.backend.clone();
        let returned = self.resources.frames.current_mut().begin(backend.as_ref())?;
        self.resources.recycle_descriptor_sets(returned);
        self.resources.handles.advance();
        self.in_frame = true;
        Ok(())
    }

    /// Finish a frame and move to the next ring slot.
    ///
    /// Every queue whose last submission this frame carried no fence gets an
    /// empty fenced submission, so the slot's fences cover all of its work.
    /// A frame with no submissions at all is closed on the graphics queue.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress or an ownership release recorded
    /// this frame was never acquired.
    pub fn end_frame(&mut self) -> Result<(), GraphicsError> {
        ringframe_core::profile_scope!("end_frame");
        assert!(self.in_frame, "end_frame without begin_frame");
        self.resources.ownership.settle();

        let backend = self.resources.backend.clone();
        let frame = self.resources.frames.current_mut();
        let fence = SubmitBatch {
            signal_fence: true,
            ..SubmitBatch::default()
        };
        let unfenced: Vec<QueueKind> = frame.unfenced_queues().collect();
        for queue in unfenced {
            log::trace!("Frame {}: fencing trailing {} work", frame.index(), queue.name());
            frame.submit(backend.as_ref(), queue, &fence)?;
        }
        if !frame.is_fenced() {
            frame.submit(backend.as_ref(), QueueKind::Graphics, &fence)?;
        }

        ringframe_core::profile_plot!(
            "pending destructions",
            self.resources.pending_destructions()
        );
        self.resources.frames.advance();
        self.in_frame = false;
        ringframe_core::frame_mark!();
        Ok(())
    }

    /// Submit command buffers recorded this frame to `queue`.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress.
    pub fn submit(&mut self, queue: QueueKind, batch: &SubmitBatch) -> Result<(), GraphicsError> {
        assert!(self.in_frame, "submit outside of a frame");
        let backend = self.resources.backend.clone();
        self.resources
            .frames
            .current_mut()
            .submit(backend.as_ref(), queue, batch)
    }

    // ------------------------------------------------------------------
    // Resource shortcuts
    // ------------------------------------------------------------------

    /// Create a texture.
    pub fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
    ) -> Result<ResourceHandle, GraphicsError> {
        self.resources.create_texture(descriptor)
    }

    /// Destroy a texture once the current frame slot comes around again.
    pub fn destroy_texture(&mut self, texture: ResourceHandle) {
        self.resources.destroy_texture(texture);
    }

    /// Get a texture record.
    pub fn texture(&self, texture: ResourceHandle) -> &TextureRecord {
        self.resources.texture(texture)
    }

    /// Create a buffer.
    pub fn create_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
    ) -> Result<ResourceHandle, GraphicsError> {
        self.resources.create_buffer(descriptor)
    }

    /// Destroy a buffer once the current frame slot comes around again.
    pub fn destroy_buffer(&mut self, buffer: ResourceHandle) {
        self.resources.destroy_buffer(buffer);
    }

    /// Get a buffer record.
    pub fn buffer(&self, buffer: ResourceHandle) -> &BufferRecord {
        self.resources.buffer(buffer)
    }

    /// Write bytes into a host-visible buffer.
    pub fn write_buffer(
        &mut self,
        buffer: ResourceHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        self.resources.write_buffer(buffer, offset, data)
    }

    /// Create a descriptor set layout.
    pub fn create_descriptor_set_layout(
        &mut self,
        descriptor: &DescriptorSetLayoutDescriptor,
    ) -> Result<ResourceHandle, GraphicsError> {
        self.resources.create_descriptor_set_layout(descriptor)
    }

    /// Create a pipeline. Graphics pipelines are created against the cached
    /// render pass for their attachment layout.
    pub fn create_pipeline(
        &mut self,
        descriptor: &PipelineDescriptor,
    ) -> Result<ResourceHandle, GraphicsError> {
        let render_pass = match &descriptor.kind {
            crate::types::PipelineKind::Compute(_) => None,
            crate::types::PipelineKind::Graphics(state) => {
                Some(self.request_render_pass(&state.render_pass)?)
            }
        };
        self.resources.create_pipeline(descriptor, render_pass)
    }

    /// Destroy a pipeline once the current frame slot comes around again.
    pub fn destroy_pipeline(&mut self, pipeline: ResourceHandle) {
        self.resources.destroy_pipeline(pipeline);
    }

    /// Get the cached render pass for `layout`, creating it on a miss.
    pub fn request_render_pass(
        &mut self,
        layout: &RenderPassLayout,
    ) -> Result<ResourceHandle, GraphicsError> {
        let (resources, caches) = self.split_mut();
        caches.render_passes.request(resources, layout)
    }

    /// Get a cached descriptor set of `layout` with `writes` applied.
    pub fn request_descriptor_set(
        &mut self,
        layout: ResourceHandle,
        writes: &[DescriptorWrite],
    ) -> Result<ResourceHandle, GraphicsError> {
        let (resources, caches) = self.split_mut();
        caches.descriptor_sets.request(
            resources,
            &DescriptorSetKey {
                layout,
                writes: writes.to_vec(),
            },
        )
    }

    /// Allocate per-frame scratch memory.
    pub fn scratch_alloc(
        &mut self,
        size: u64,
        alignment: u64,
    ) -> Result<ScratchAllocation, GraphicsError> {
        self.resources.scratch_alloc(size, alignment)
    }

    /// Allocate per-frame scratch memory holding `data`.
    pub fn scratch_write(
        &mut self,
        data: &[u8],
        alignment: u64,
    ) -> Result<ScratchAllocation, GraphicsError> {
        self.resources.scratch_write(data, alignment)
    }

    /// Context-wide counters.
    pub fn statistics(&self) -> ContextStatistics {
        let mut live_objects = [0; 8];
        for kind in ResourceKind::ALL {
            live_objects[kind as usize] = self.resources.live_objects(kind);
        }
        ContextStatistics {
            frame_number: self.frame_number(),
            live_objects,
            pending_destructions: self.resources.pending_destructions(),
            caches: self.caches.statistics(),
        }
    }

    /// Wait for the GPU and destroy everything.
    ///
    /// Called by `Drop` if not called explicitly; call it directly to see
    /// errors.
    pub fn shutdown(&mut self) -> Result<(), GraphicsError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        self.in_frame = false;
        log::info!("Shutting down render context '{}'", self.config.label);

        let backend = self.resources.backend.clone();
        backend.wait_idle()?;

        let (resources, caches) = self.split_mut();
        caches.reset(resources);

        let chunks: Vec<ResourceHandle> = resources
            .frames
            .iter_mut()
            .flat_map(|frame| frame.scratch_mut().take_chunks())
            .collect();
        for chunk in chunks {
            resources.destroy_buffer(chunk);
        }

        for frame in resources.frames.iter_mut() {
            frame.destroy(backend.as_ref())?;
        }

        resources.free_sets.clear();
        for set in resources.descriptor_sets.drain() {
            backend.destroy_descriptor_set(set.raw);
        }
        for framebuffer in resources.framebuffers.drain() {
            backend.destroy_framebuffer(framebuffer.raw);
        }
        for pipeline in resources.pipelines.drain() {
            backend.destroy_pipeline(pipeline.raw);
        }
        for render_pass in resources.render_passes.drain() {
            backend.destroy_render_pass(render_pass.raw);
        }
        for layout in resources.set_layouts.drain() {
            backend.destroy_descriptor_set_layout(layout.raw);
        }
        // Swapchain image views go before their swapchains.
        for texture in resources.textures.drain() {
            backend.destroy_texture(texture.raw);
        }
        for swapchain in resources.swapchains.drain() {
            backend.destroy_swapchain(swapchain.raw);
        }
        for buffer in resources.buffers.drain() {
            backend.destroy_buffer(buffer.raw);
        }

        log::info!("Render context shut down");
        Ok(())
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Render context shutdown failed: {}", e);
        }
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("label", &self.config.label)
            .field("frame", &self.frame_number())
            .field("in_frame", &self.in_frame)
            .field("resources", &self.resources)
            .finish()
    }
}

static_assertions::assert_impl_all!(RenderContext: Send);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::{DummyBackend, DummyEvent, DummyObjectKind};
    use crate::recorder::CommandRecorder;
    use crate::types::{TextureFormat, TextureUsage};

    fn context() -> (Arc<DummyBackend>, RenderContext) {
        let backend = Arc::new(DummyBackend::new());
        let ctx = RenderContext::new(backend.clone(), RenderContextConfig::default()).unwrap();
        (backend, ctx)
    }

    fn sampled() -> TextureDescriptor {
        TextureDescriptor::new_2d(8, 8, TextureFormat::Rgba8Unorm, TextureUsage::TEXTURE_BINDING)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let backend = Arc::new(DummyBackend::new());
        let result = RenderContext::new(
            backend,
            RenderContextConfig::default().with_frames_in_flight(0),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_frame_is_fenced() {
        let (backend, mut ctx) = context();
        ctx.begin_frame().unwrap();
        ctx.end_frame().unwrap();

        let submits: Vec<_> = backend
            .events()
            .into_iter()
            .filter(|e| matches!(e, DummyEvent::Submit { fence: Some(_), .. }))
            .collect();
        assert_eq!(submits.len(), 1);
        assert_eq!(ctx.frame_number(), 1);
        assert_eq!(ctx.frame_index(), 1);
    }

    #[test]
    fn test_unfenced_queues_fenced_at_end_frame() {
        let backend = Arc::new(DummyBackend::new());
        let mut ctx = RenderContext::new(
            backend.clone(),
            RenderContextConfig::default().with_frame_fences(false),
        )
        .unwrap();
        ctx.begin_frame().unwrap();
        for queue in [QueueKind::Compute, QueueKind::Graphics] {
            let cmd = CommandRecorder::begin(&mut ctx, queue).unwrap().finish().unwrap();
            ctx.submit(
                queue,
                &SubmitBatch {
                    command_buffers: vec![cmd],
                    ..SubmitBatch::default()
                },
            )
            .unwrap();
        }
        ctx.end_frame().unwrap();

        let mut fenced: Vec<QueueKind> = backend
            .events()
            .into_iter()
            .filter_map(|e| match e {
                DummyEvent::Submit {
                    queue,
                    fence: Some(_),
                    ..
                } => Some(queue),
                _ => None,
            })
            .collect();
        fenced.sort();
        assert_eq!(fenced, vec![QueueKind::Graphics, QueueKind::Compute]);
    }

    #[test]
    fn test_frame_retires_when_its_slot_returns() {
        let (_backend, mut ctx) = context();
        ctx.begin_frame().unwrap();
        let frame = ctx.frame_number();
        ctx.end_frame().unwrap();

        ctx.begin_frame().unwrap();
        assert!(!ctx.resources().is_frame_retired(frame));
        ctx.end_frame().unwrap();

        ctx.begin_frame().unwrap();
        assert!(ctx.resources().is_frame_retired(frame));
        ctx.end_frame().unwrap();
    }

    #[test]
    fn test_destroyed_texture_freed_when_slot_returns() {
        let (backend, mut ctx) = context();
        ctx.begin_frame().unwrap();
        let texture = ctx.create_texture(&sampled()).unwrap();
        ctx.destroy_texture(texture);
        ctx.end_frame().unwrap();

        // Slot 1 is still in flight
        ctx.begin_frame().unwrap();
        ctx.end_frame().unwrap();
        assert_eq!(backend.live_objects(DummyObjectKind::Texture), 1);

        // Slot 0 comes around again
        ctx.begin_frame().unwrap();
        assert_eq!(backend.live_objects(DummyObjectKind::Texture), 0);
        ctx.end_frame().unwrap();
    }

    #[test]
    fn test_shutdown_destroys_everything() {
        let (backend, mut ctx) = context();
        ctx.begin_frame().unwrap();
        ctx.create_texture(&sampled()).unwrap();
        ctx.scratch_write(&[1, 2, 3, 4], 16).unwrap();
        ctx.end_frame().unwrap();

        ctx.shutdown().unwrap();
        for kind in [
            DummyObjectKind::Texture,
            DummyObjectKind::Buffer,
            DummyObjectKind::Fence,
            DummyObjectKind::CommandPool,
        ] {
            assert_eq!(backend.live_objects(kind), 0, "{:?} leaked", kind);
        }
        assert!(backend.events().contains(&DummyEvent::WaitIdle));
    }

    #[test]
    #[should_panic(expected = "begin_frame called twice")]
    fn test_nested_begin_panics() {
        let (_backend, mut ctx) = context();
        ctx.begin_frame().unwrap();
        let _ = ctx.begin_frame();
    }

    #[test]
    fn test_fence_failure_surfaces_device_lost() {
        let (backend, mut ctx) = context();
        for _ in 0..2 {
            ctx.begin_frame().unwrap();
            ctx.end_frame().unwrap();
        }
        backend.fail_next_fence_wait();
        assert_eq!(ctx.begin_frame(), Err(GraphicsError::DeviceLost));
    }
}
