//! GPU backend abstraction layer.
//!
//! The renderer core never talks to a graphics API directly. Everything it
//! needs from the device goes through [`GpuBackend`]:
//!
//! - object lifecycle (`create_*` / `destroy_*`)
//! - command recording primitives (`cmd_*`)
//! - submission, fences and semaphores
//! - swapchain acquire and present
//! - capability queries used at setup and compile time
//!
//! # Available Backends
//!
//! - [`dummy::DummyBackend`]: headless, records an event log; used by tests
//! - `vulkan::VulkanBackend` (feature `vulkan-backend`): native Vulkan via ash
//!
//! Destroy calls are only issued once the frame ring has proven the GPU is
//! done with the object, so backends free immediately.

pub mod dummy;
mod objects;

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

use std::sync::Arc;

pub use objects::{
    GpuBuffer, GpuCommandBuffer, GpuCommandPool, GpuDescriptorSet, GpuDescriptorSetLayout,
    GpuFence, GpuFramebuffer, GpuPipeline, GpuRenderPass, GpuSemaphore, GpuSwapchain, GpuTexture,
};

use crate::error::GraphicsError;
use crate::swapchain::SwapchainDescriptor;
use crate::sync::{PipelineStages, QueueTransfer, ResourceState, SubresourceRange};
use crate::types::{
    BufferDescriptor, ClearValue, DescriptorSetLayoutDescriptor, DescriptorType, Extent3d,
    IndexFormat, PipelineDescriptor, QueueKind, RenderPassLayout, ScissorRect, TextureDescriptor,
    TextureFormat, TextureUsage, Viewport,
};

// ============================================================================
// Backend-level call payloads
// ============================================================================

/// Texture barrier with the handle already resolved to the raw object.
#[derive(Debug, Clone, Copy)]
pub struct RawTextureBarrier<'a> {
    /// Texture to transition.
    pub texture: &'a GpuTexture,
    /// State before the barrier.
    pub src: ResourceState,
    /// State after the barrier.
    pub dst: ResourceState,
    /// Affected subresources.
    pub range: SubresourceRange,
    /// Queue family ownership transfer.
    pub transfer: Option<QueueTransfer>,
}

/// Buffer barrier with the handle already resolved to the raw object.
#[derive(Debug, Clone, Copy)]
pub struct RawBufferBarrier<'a> {
    /// Buffer to synchronize.
    pub buffer: &'a GpuBuffer,
    /// State before the barrier.
    pub src: ResourceState,
    /// State after the barrier.
    pub dst: ResourceState,
    /// Queue family ownership transfer.
    pub transfer: Option<QueueTransfer>,
}

/// Parameters for beginning a render pass instance.
#[derive(Debug, Clone, Copy)]
pub struct RenderPassBeginInfo<'a> {
    /// Render pass object.
    pub render_pass: &'a GpuRenderPass,
    /// Framebuffer with the pass's attachments.
    pub framebuffer: &'a GpuFramebuffer,
    /// Render area.
    pub extent: Extent3d,
    /// One clear value per attachment, colors first.
    pub clear_values: &'a [ClearValue],
}

/// Resource bound by a descriptor write.
#[derive(Debug, Clone, Copy)]
pub enum RawDescriptorResource<'a> {
    /// Buffer range.
    Buffer {
        /// Buffer object.
        buffer: &'a GpuBuffer,
        /// Offset in bytes.
        offset: u64,
        /// Range in bytes.
        size: u64,
    },
    /// Whole texture view.
    Texture(&'a GpuTexture),
}

/// Descriptor write with resolved objects.
#[derive(Debug, Clone, Copy)]
pub struct RawDescriptorWrite<'a> {
    /// Target binding.
    pub binding: u32,
    /// Binding type from the layout.
    pub ty: DescriptorType,
    /// Resource to bind.
    pub resource: RawDescriptorResource<'a>,
}

/// Source and destination of a blit between mip levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlitRegion {
    /// Source mip level.
    pub src_mip_level: u32,
    /// Size of the source region.
    pub src_extent: Extent3d,
    /// Destination mip level.
    pub dst_mip_level: u32,
    /// Size of the destination region.
    pub dst_extent: Extent3d,
}

/// One batch of command buffers submitted to a queue.
#[derive(Debug, Default)]
pub struct SubmitInfo<'a> {
    /// Command buffers, executed in order.
    pub command_buffers: Vec<GpuCommandBuffer>,
    /// Semaphores to wait on, with the stages that wait.
    pub wait_semaphores: Vec<(&'a GpuSemaphore, PipelineStages)>,
    /// Semaphores signaled when the batch completes.
    pub signal_semaphores: Vec<&'a GpuSemaphore>,
    /// Fence signaled when the batch completes.
    pub fence: Option<&'a GpuFence>,
}

/// Result of acquiring a swapchain image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Image acquired; the semaphore passed in will be signaled.
    Acquired {
        /// Swapchain image index.
        index: u32,
        /// The swapchain no longer matches the surface exactly.
        suboptimal: bool,
    },
    /// The swapchain must be recreated before use.
    OutOfDate,
}

/// Memory footprint of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryRequirements {
    /// Size in bytes.
    pub size: u64,
    /// Required alignment in bytes.
    pub alignment: u64,
}

/// Limits and properties of the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Human-readable adapter name.
    pub device_name: String,
    /// Largest 2D texture dimension.
    pub max_texture_dimension_2d: u32,
    /// Required alignment of uniform buffer offsets.
    pub min_uniform_buffer_offset_alignment: u64,
    /// Largest push constant block in bytes.
    pub max_push_constants_size: u32,
    /// Whether compute work runs on a separate queue family.
    pub dedicated_compute_queue: bool,
    /// Whether transfers run on a separate queue family.
    pub dedicated_transfer_queue: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            device_name: "unknown".to_string(),
            max_texture_dimension_2d: 16384,
            min_uniform_buffer_offset_alignment: 256,
            max_push_constants_size: 128,
            dedicated_compute_queue: false,
            dedicated_transfer_queue: false,
        }
    }
}

// ============================================================================
// Backend trait
// ============================================================================

/// Capability surface the renderer needs from a graphics API.
///
/// All methods take `&self`; backends use interior mutability where the API
/// requires external synchronization (queues, allocator).
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    // --- queries ---

    /// Queue family index serving `queue`.
    fn queue_family(&self, queue: QueueKind) -> u32;

    /// Whether `format` supports every usage in `usage`.
    fn supports_format(&self, format: TextureFormat, usage: TextureUsage) -> bool;

    /// Device limits.
    fn capabilities(&self) -> DeviceCapabilities;

    /// Memory a texture with `descriptor` would occupy.
    fn texture_memory_requirements(&self, descriptor: &TextureDescriptor) -> MemoryRequirements;

    // --- object lifecycle ---

    /// Create a texture and its default view.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<GpuTexture, GraphicsError>;
    /// Destroy a texture.
    fn destroy_texture(&self, texture: GpuTexture);

    /// Create a buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError>;
    /// Destroy a buffer.
    fn destroy_buffer(&self, buffer: GpuBuffer);
    /// Write bytes into a host-visible buffer.
    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8])
    -> Result<(), GraphicsError>;

    /// Create a render pass for an attachment layout.
    fn create_render_pass(&self, layout: &RenderPassLayout)
    -> Result<GpuRenderPass, GraphicsError>;
    /// Destroy a render pass.
    fn destroy_render_pass(&self, render_pass: GpuRenderPass);

    /// Create a framebuffer binding `attachments` to `render_pass`.
    fn create_framebuffer(
        &self,
        render_pass: &GpuRenderPass,
        attachments: &[&GpuTexture],
        extent: Extent3d,
    ) -> Result<GpuFramebuffer, GraphicsError>;
    /// Destroy a framebuffer.
    fn destroy_framebuffer(&self, framebuffer: GpuFramebuffer);

    /// Create a descriptor set layout.
    fn create_descriptor_set_layout(
        &self,
        descriptor: &DescriptorSetLayoutDescriptor,
    ) -> Result<GpuDescriptorSetLayout, GraphicsError>;
    /// Destroy a descriptor set layout.
    fn destroy_descriptor_set_layout(&self, layout: GpuDescriptorSetLayout);

    /// Allocate a descriptor set of `layout`.
    fn create_descriptor_set(
        &self,
        layout: &GpuDescriptorSetLayout,
    ) -> Result<GpuDescriptorSet, GraphicsError>;
    /// Write resources into a descriptor set.
    fn update_descriptor_set(&self, set: &GpuDescriptorSet, writes: &[RawDescriptorWrite<'_>]);
    /// Free a descriptor set.
    fn destroy_descriptor_set(&self, set: GpuDescriptorSet);

    /// Create a pipeline. Graphics pipelines are built against `render_pass`.
    fn create_pipeline(
        &self,
        descriptor: &PipelineDescriptor,
        set_layouts: &[&GpuDescriptorSetLayout],
        render_pass: Option<&GpuRenderPass>,
    ) -> Result<GpuPipeline, GraphicsError>;
    /// Destroy a pipeline.
    fn destroy_pipeline(&self, pipeline: GpuPipeline);

    // --- synchronization objects ---

    /// Create a fence.
    fn create_fence(&self, signaled: bool) -> Result<GpuFence, GraphicsError>;
    /// Destroy a fence.
    fn destroy_fence(&self, fence: GpuFence);
    /// Block until every fence is signaled. Failure means the device is lost.
    fn wait_fences(&self, fences: &[&GpuFence]) -> Result<(), GraphicsError>;
    /// Return fences to the unsignaled state.
    fn reset_fences(&self, fences: &[&GpuFence]) -> Result<(), GraphicsError>;
    /// Non-blocking fence query.
    fn is_fence_signaled(&self, fence: &GpuFence) -> bool;

    /// Create a binary semaphore.
    fn create_semaphore(&self) -> Result<GpuSemaphore, GraphicsError>;
    /// Destroy a semaphore.
    fn destroy_semaphore(&self, semaphore: GpuSemaphore);

    // --- command pools ---

    /// Create a command pool for `queue`'s family.
    fn create_command_pool(&self, queue: QueueKind) -> Result<GpuCommandPool, GraphicsError>;
    /// Reset every command buffer allocated from `pool`.
    fn reset_command_pool(&self, pool: &GpuCommandPool) -> Result<(), GraphicsError>;
    /// Destroy a pool and its command buffers.
    fn destroy_command_pool(&self, pool: GpuCommandPool);
    /// Allocate a primary command buffer.
    fn allocate_command_buffer(
        &self,
        pool: &GpuCommandPool,
    ) -> Result<GpuCommandBuffer, GraphicsError>;
    /// Begin recording.
    fn begin_command_buffer(&self, cmd: GpuCommandBuffer) -> Result<(), GraphicsError>;
    /// Finish recording.
    fn end_command_buffer(&self, cmd: GpuCommandBuffer) -> Result<(), GraphicsError>;

    // --- commands ---

    /// Record a pipeline barrier.
    fn cmd_pipeline_barrier(
        &self,
        cmd: GpuCommandBuffer,
        textures: &[RawTextureBarrier<'_>],
        buffers: &[RawBufferBarrier<'_>],
    );
    /// Begin a render pass instance.
    fn cmd_begin_render_pass(&self, cmd: GpuCommandBuffer, info: &RenderPassBeginInfo<'_>);
    /// End the current render pass instance.
    fn cmd_end_render_pass(&self, cmd: GpuCommandBuffer);
    /// Bind a pipeline.
    fn cmd_bind_pipeline(&self, cmd: GpuCommandBuffer, pipeline: &GpuPipeline);
    /// Bind a descriptor set at `index` for `pipeline`'s layout.
    fn cmd_bind_descriptor_set(
        &self,
        cmd: GpuCommandBuffer,
        pipeline: &GpuPipeline,
        index: u32,
        set: &GpuDescriptorSet,
    );
    /// Update push constants.
    fn cmd_push_constants(
        &self,
        cmd: GpuCommandBuffer,
        pipeline: &GpuPipeline,
        offset: u32,
        data: &[u8],
    );
    /// Bind a vertex buffer to `slot`.
    fn cmd_bind_vertex_buffer(
        &self,
        cmd: GpuCommandBuffer,
        slot: u32,
        buffer: &GpuBuffer,
        offset: u64,
    );
    /// Bind an index buffer.
    fn cmd_bind_index_buffer(
        &self,
        cmd: GpuCommandBuffer,
        buffer: &GpuBuffer,
        offset: u64,
        format: IndexFormat,
    );
    /// Set the viewport.
    fn cmd_set_viewport(&self, cmd: GpuCommandBuffer, viewport: &Viewport);
    /// Set the scissor rectangle.
    fn cmd_set_scissor(&self, cmd: GpuCommandBuffer, scissor: &ScissorRect);
    /// Non-indexed draw.
    fn cmd_draw(
        &self,
        cmd: GpuCommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );
    /// Indexed draw.
    fn cmd_draw_indexed(
        &self,
        cmd: GpuCommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );
    /// Compute dispatch.
    fn cmd_dispatch(&self, cmd: GpuCommandBuffer, x: u32, y: u32, z: u32);
    /// Buffer to buffer copy.
    fn cmd_copy_buffer(
        &self,
        cmd: GpuCommandBuffer,
        src: &GpuBuffer,
        src_offset: u64,
        dst: &GpuBuffer,
        dst_offset: u64,
        size: u64,
    );
    /// Tightly packed buffer data into one mip level of a texture.
    fn cmd_copy_buffer_to_texture(
        &self,
        cmd: GpuCommandBuffer,
        src: &GpuBuffer,
        src_offset: u64,
        dst: &GpuTexture,
        mip_level: u32,
        extent: Extent3d,
    );
    /// Filtered blit between mip levels or textures.
    fn cmd_blit_texture(
        &self,
        cmd: GpuCommandBuffer,
        src: &GpuTexture,
        dst: &GpuTexture,
        region: &BlitRegion,
    );
    /// Open a debug label region.
    fn cmd_begin_label(&self, cmd: GpuCommandBuffer, label: &str);
    /// Close the innermost debug label region.
    fn cmd_end_label(&self, cmd: GpuCommandBuffer);

    // --- submission ---

    /// Submit a batch to `queue`.
    fn submit(&self, queue: QueueKind, info: &SubmitInfo<'_>) -> Result<(), GraphicsError>;

    /// Block until every queue is idle.
    fn wait_idle(&self) -> Result<(), GraphicsError>;

    // --- swapchain ---

    /// Create a swapchain on the backend's surface, replacing `old` if given.
    fn create_swapchain(
        &self,
        descriptor: &SwapchainDescriptor,
        old: Option<&GpuSwapchain>,
    ) -> Result<GpuSwapchain, GraphicsError>;
    /// Wrap the swapchain's images as textures. They must not be destroyed
    /// individually; [`destroy_texture`](Self::destroy_texture) on them only
    /// releases the view.
    fn swapchain_textures(&self, swapchain: &GpuSwapchain)
    -> Result<Vec<GpuTexture>, GraphicsError>;
    /// Acquire the next image, signaling `signal` when it is ready.
    fn acquire_next_image(
        &self,
        swapchain: &GpuSwapchain,
        signal: &GpuSemaphore,
    ) -> Result<AcquireOutcome, GraphicsError>;
    /// Present image `index` after `wait`. Returns `true` if the swapchain
    /// needs to be recreated.
    fn present(
        &self,
        swapchain: &GpuSwapchain,
        index: u32,
        wait: &GpuSemaphore,
    ) -> Result<bool, GraphicsError>;
    /// Destroy a swapchain.
    fn destroy_swapchain(&self, swapchain: GpuSwapchain);
}

/// Selects and creates the appropriate backend based on available features.
///
/// Tries Vulkan when the `vulkan-backend` feature is on, then falls back to
/// the dummy backend if the `dummy` feature is on.
pub fn create_backend() -> Result<Arc<dyn GpuBackend>, GraphicsError> {
    #[cfg(feature = "vulkan-backend")]
    {
        match vulkan::VulkanBackend::new(&vulkan::VulkanConfig::default()) {
            Ok(backend) => {
                log::info!("Using Vulkan backend (ash)");
                return Ok(Arc::new(backend));
            }
            Err(e) => {
                log::warn!("Failed to create Vulkan backend: {}", e);
            }
        }
    }

    if cfg!(feature = "dummy") {
        log::info!("Using dummy backend");
        Ok(Arc::new(dummy::DummyBackend::new()))
    } else {
        Err(GraphicsError::InitializationFailed(
            "no GPU backend available and the dummy fallback is disabled".to_string(),
        ))
    }
}

/// Check if a real GPU backend is compiled in.
pub fn has_gpu_backend() -> bool {
    cfg!(feature = "vulkan-backend")
}
