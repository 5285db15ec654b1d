//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. Every call is appended
//! to an ordered event log instead, so tests can assert on the exact stream
//! of creates, destroys, barriers and submissions the renderer produced.
//! Fences signal as soon as a submission that carries them is made.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::GraphicsError;
use crate::swapchain::SwapchainDescriptor;
use crate::sync::{PipelineStages, QueueTransfer, ResourceState, SubresourceRange};
use crate::types::{
    BufferDescriptor, ClearValue, DescriptorSetLayoutDescriptor, Extent3d, IndexFormat,
    PipelineDescriptor, QueueKind, RenderPassLayout, ScissorRect, TextureDescriptor,
    TextureFormat, TextureUsage, Viewport,
};

use super::{
    AcquireOutcome, BlitRegion, DeviceCapabilities, GpuBackend, GpuBuffer, GpuCommandBuffer,
    GpuCommandPool, GpuDescriptorSet, GpuDescriptorSetLayout, GpuFence, GpuFramebuffer,
    GpuPipeline, GpuRenderPass, GpuSemaphore, GpuSwapchain, GpuTexture, MemoryRequirements,
    RawBufferBarrier, RawDescriptorWrite, RawTextureBarrier, RenderPassBeginInfo, SubmitInfo,
};

/// Kind of object a create/destroy event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DummyObjectKind {
    Texture,
    Buffer,
    RenderPass,
    Framebuffer,
    DescriptorSetLayout,
    DescriptorSet,
    Pipeline,
    Fence,
    Semaphore,
    CommandPool,
    CommandBuffer,
    Swapchain,
}

/// Texture barrier as seen by the dummy backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DummyTextureBarrier {
    pub texture: u64,
    pub src: ResourceState,
    pub dst: ResourceState,
    pub range: SubresourceRange,
    pub transfer: Option<QueueTransfer>,
}

/// Buffer barrier as seen by the dummy backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DummyBufferBarrier {
    pub buffer: u64,
    pub src: ResourceState,
    pub dst: ResourceState,
    pub transfer: Option<QueueTransfer>,
}

/// A command recorded into a command buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum DummyCommand {
    Begin,
    End,
    Barrier {
        textures: Vec<DummyTextureBarrier>,
        buffers: Vec<DummyBufferBarrier>,
    },
    BeginRenderPass {
        render_pass: u64,
        framebuffer: u64,
        extent: Extent3d,
        clear_values: Vec<ClearValue>,
    },
    EndRenderPass,
    BindPipeline {
        pipeline: u64,
    },
    BindDescriptorSet {
        index: u32,
        set: u64,
    },
    PushConstants {
        offset: u32,
        size: usize,
    },
    BindVertexBuffer {
        slot: u32,
        buffer: u64,
    },
    BindIndexBuffer {
        buffer: u64,
        format: IndexFormat,
    },
    SetViewport,
    SetScissor,
    Draw {
        vertex_count: u32,
        instance_count: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    CopyBuffer {
        src: u64,
        dst: u64,
        size: u64,
    },
    CopyBufferToTexture {
        src: u64,
        dst: u64,
        mip_level: u32,
    },
    Blit {
        src: u64,
        dst: u64,
        region: BlitRegion,
    },
    BeginLabel(String),
    EndLabel,
}

/// One entry of the dummy backend's event log.
#[derive(Debug, Clone, PartialEq)]
pub enum DummyEvent {
    Create {
        kind: DummyObjectKind,
        id: u64,
    },
    Destroy {
        kind: DummyObjectKind,
        id: u64,
    },
    WaitFences {
        fences: Vec<u64>,
    },
    ResetFences {
        fences: Vec<u64>,
    },
    ResetCommandPool {
        pool: u64,
    },
    WriteBuffer {
        buffer: u64,
        offset: u64,
        size: usize,
    },
    UpdateDescriptorSet {
        set: u64,
        bindings: Vec<u32>,
    },
    Command {
        cmd: u64,
        command: DummyCommand,
    },
    Submit {
        queue: QueueKind,
        command_buffers: Vec<u64>,
        waits: Vec<(u64, PipelineStages)>,
        signals: Vec<u64>,
        fence: Option<u64>,
    },
    Acquire {
        swapchain: u64,
        semaphore: u64,
        index: Option<u32>,
    },
    Present {
        swapchain: u64,
        index: u32,
        wait: u64,
    },
    WaitIdle,
}

#[derive(Debug, Default)]
struct DummyState {
    events: Vec<DummyEvent>,
    render_pass_layouts: HashMap<u64, RenderPassLayout>,
    live: HashMap<DummyObjectKind, usize>,
    /// Next image index per swapchain.
    swapchain_cursor: HashMap<u64, u32>,
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    next_id: AtomicU64,
    queue_families: [u32; 3],
    fail_next_fence_wait: AtomicBool,
    surface_out_of_date: AtomicBool,
    state: Mutex<DummyState>,
}

impl DummyBackend {
    /// Create a new dummy backend with one queue family per queue kind.
    pub fn new() -> Self {
        Self::with_queue_families([0, 1, 2])
    }

    /// Create a dummy backend with explicit queue families, indexed by
    /// [`QueueKind::index`]. Equal entries model queues sharing a family.
    pub fn with_queue_families(queue_families: [u32; 3]) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            queue_families,
            fail_next_fence_wait: AtomicBool::new(false),
            surface_out_of_date: AtomicBool::new(false),
            state: Mutex::new(DummyState::default()),
        }
    }

    /// Make the next `wait_fences` call fail as if the device was lost.
    pub fn fail_next_fence_wait(&self) {
        self.fail_next_fence_wait.store(true, Ordering::Release);
    }

    /// Make acquire and present report an out-of-date surface.
    pub fn set_surface_out_of_date(&self, out_of_date: bool) {
        self.surface_out_of_date.store(out_of_date, Ordering::Release);
    }

    /// Snapshot of the event log.
    pub fn events(&self) -> Vec<DummyEvent> {
        self.state.lock().events.clone()
    }

    /// Drain the event log.
    pub fn take_events(&self) -> Vec<DummyEvent> {
        std::mem::take(&mut self.state.lock().events)
    }

    /// Clear the event log.
    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    /// Layout a render pass was created with.
    pub fn render_pass_layout(&self, id: u64) -> Option<RenderPassLayout> {
        self.state.lock().render_pass_layouts.get(&id).cloned()
    }

    /// Number of objects of `kind` created and not yet destroyed.
    pub fn live_objects(&self, kind: DummyObjectKind) -> usize {
        self.state.lock().live.get(&kind).copied().unwrap_or(0)
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn push(&self, event: DummyEvent) {
        self.state.lock().events.push(event);
    }

    fn created(&self, kind: DummyObjectKind) -> u64 {
        let id = self.allocate_id();
        log::trace!("DummyBackend: create {:?} #{}", kind, id);
        let mut state = self.state.lock();
        *state.live.entry(kind).or_insert(0) += 1;
        state.events.push(DummyEvent::Create { kind, id });
        id
    }

    fn destroyed(&self, kind: DummyObjectKind, id: u64) {
        log::trace!("DummyBackend: destroy {:?} #{}", kind, id);
        let mut state = self.state.lock();
        if let Some(count) = state.live.get_mut(&kind) {
            *count = count.saturating_sub(1);
        }
        state.events.push(DummyEvent::Destroy { kind, id });
    }

    fn command(&self, cmd: GpuCommandBuffer, command: DummyCommand) {
        self.push(DummyEvent::Command {
            cmd: cmd.raw_id(),
            command,
        });
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn queue_family(&self, queue: QueueKind) -> u32 {
        self.queue_families[queue.index()]
    }

    fn supports_format(&self, format: TextureFormat, usage: TextureUsage) -> bool {
        // Mirror the common desktop restriction: no storage on depth or sRGB
        let srgb = matches!(
            format,
            TextureFormat::Rgba8UnormSrgb | TextureFormat::Bgra8UnormSrgb
        );
        !(usage.contains(TextureUsage::STORAGE_BINDING) && (format.is_depth_stencil() || srgb))
    }

    fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities {
            device_name: "Dummy Device".to_string(),
            dedicated_compute_queue: self.queue_families[1] != self.queue_families[0],
            dedicated_transfer_queue: self.queue_families[2] != self.queue_families[0],
            ..DeviceCapabilities::default()
        }
    }

    fn texture_memory_requirements(&self, descriptor: &TextureDescriptor) -> MemoryRequirements {
        let size = (0..descriptor.mip_level_count)
            .map(|level| {
                let extent = descriptor.size.mip_level(level);
                u64::from(extent.width)
                    * u64::from(extent.height)
                    * u64::from(extent.depth)
                    * u64::from(descriptor.format.block_size())
            })
            .sum::<u64>()
            * u64::from(descriptor.sample_count);
        MemoryRequirements {
            size,
            alignment: 256,
        }
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<GpuTexture, GraphicsError> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth
        );
        let id = self.created(DummyObjectKind::Texture);
        Ok(GpuTexture::Dummy {
            id,
            extent: descriptor.size,
            format: descriptor.format,
            mip_level_count: descriptor.mip_level_count,
        })
    }

    fn destroy_texture(&self, texture: GpuTexture) {
        self.destroyed(DummyObjectKind::Texture, texture.raw_id());
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size must be non-zero".to_string(),
            ));
        }
        let id = self.created(DummyObjectKind::Buffer);
        Ok(GpuBuffer::Dummy {
            id,
            size: descriptor.size,
        })
    }

    fn destroy_buffer(&self, buffer: GpuBuffer) {
        self.destroyed(DummyObjectKind::Buffer, buffer.raw_id());
    }

    fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        if offset + data.len() as u64 > buffer.size() {
            return Err(GraphicsError::InvalidParameter(format!(
                "write of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                buffer.size()
            )));
        }
        self.push(DummyEvent::WriteBuffer {
            buffer: buffer.raw_id(),
            offset,
            size: data.len(),
        });
        Ok(())
    }

    fn create_render_pass(
        &self,
        layout: &RenderPassLayout,
    ) -> Result<GpuRenderPass, GraphicsError> {
        let id = self.created(DummyObjectKind::RenderPass);
        self.state
            .lock()
            .render_pass_layouts
            .insert(id, layout.clone());
        Ok(GpuRenderPass::Dummy { id })
    }

    fn destroy_render_pass(&self, render_pass: GpuRenderPass) {
        self.destroyed(DummyObjectKind::RenderPass, render_pass.raw_id());
    }

    fn create_framebuffer(
        &self,
        _render_pass: &GpuRenderPass,
        _attachments: &[&GpuTexture],
        _extent: Extent3d,
    ) -> Result<GpuFramebuffer, GraphicsError> {
        let id = self.created(DummyObjectKind::Framebuffer);
        Ok(GpuFramebuffer::Dummy { id })
    }

    fn destroy_framebuffer(&self, framebuffer: GpuFramebuffer) {
        self.destroyed(DummyObjectKind::Framebuffer, framebuffer.raw_id());
    }

    fn create_descriptor_set_layout(
        &self,
        _descriptor: &DescriptorSetLayoutDescriptor,
    ) -> Result<GpuDescriptorSetLayout, GraphicsError> {
        let id = self.created(DummyObjectKind::DescriptorSetLayout);
        Ok(GpuDescriptorSetLayout::Dummy { id })
    }

    fn destroy_descriptor_set_layout(&self, layout: GpuDescriptorSetLayout) {
        self.destroyed(DummyObjectKind::DescriptorSetLayout, layout.raw_id());
    }

    fn create_descriptor_set(
        &self,
        _layout: &GpuDescriptorSetLayout,
    ) -> Result<GpuDescriptorSet, GraphicsError> {
        let id = self.created(DummyObjectKind::DescriptorSet);
        Ok(GpuDescriptorSet::Dummy { id })
    }

    fn update_descriptor_set(&self, set: &GpuDescriptorSet, writes: &[RawDescriptorWrite<'_>]) {
        self.push(DummyEvent::UpdateDescriptorSet {
            set: set.raw_id(),
            bindings: writes.iter().map(|w| w.binding).collect(),
        });
    }

    fn destroy_descriptor_set(&self, set: GpuDescriptorSet) {
        self.destroyed(DummyObjectKind::DescriptorSet, set.raw_id());
    }

    fn create_pipeline(
        &self,
        descriptor: &PipelineDescriptor,
        set_layouts: &[&GpuDescriptorSetLayout],
        render_pass: Option<&GpuRenderPass>,
    ) -> Result<GpuPipeline, GraphicsError> {
        if !descriptor.is_compute() && render_pass.is_none() {
            return Err(GraphicsError::InvalidParameter(
                "graphics pipeline requires a render pass".to_string(),
            ));
        }
        if set_layouts.len() != descriptor.set_layouts.len() {
            return Err(GraphicsError::InvalidParameter(format!(
                "pipeline declares {} set layouts but {} were provided",
                descriptor.set_layouts.len(),
                set_layouts.len()
            )));
        }
        let id = self.created(DummyObjectKind::Pipeline);
        Ok(GpuPipeline::Dummy {
            id,
            compute: descriptor.is_compute(),
        })
    }

    fn destroy_pipeline(&self, pipeline: GpuPipeline) {
        self.destroyed(DummyObjectKind::Pipeline, pipeline.raw_id());
    }

    fn create_fence(&self, signaled: bool) -> Result<GpuFence, GraphicsError> {
        let id = self.created(DummyObjectKind::Fence);
        Ok(GpuFence::Dummy {
            id,
            signaled: Arc::new(AtomicBool::new(signaled)),
        })
    }

    fn destroy_fence(&self, fence: GpuFence) {
        self.destroyed(DummyObjectKind::Fence, fence.raw_id());
    }

    fn wait_fences(&self, fences: &[&GpuFence]) -> Result<(), GraphicsError> {
        self.push(DummyEvent::WaitFences {
            fences: fences.iter().map(|f| f.raw_id()).collect(),
        });
        if self.fail_next_fence_wait.swap(false, Ordering::AcqRel) {
            return Err(GraphicsError::DeviceLost);
        }
        // A fence that was never submitted would block forever on a real device
        if let Some(fence) = fences.iter().find(|f| !f.dummy_is_set()) {
            return Err(GraphicsError::Internal(format!(
                "waiting on fence #{} that was never submitted",
                fence.raw_id()
            )));
        }
        Ok(())
    }

    fn reset_fences(&self, fences: &[&GpuFence]) -> Result<(), GraphicsError> {
        for fence in fences {
            fence.dummy_set(false);
        }
        self.push(DummyEvent::ResetFences {
            fences: fences.iter().map(|f| f.raw_id()).collect(),
        });
        Ok(())
    }

    fn is_fence_signaled(&self, fence: &GpuFence) -> bool {
        fence.dummy_is_set()
    }

    fn create_semaphore(&self) -> Result<GpuSemaphore, GraphicsError> {
        let id = self.created(DummyObjectKind::Semaphore);
        Ok(GpuSemaphore::Dummy { id })
    }

    fn destroy_semaphore(&self, semaphore: GpuSemaphore) {
        self.destroyed(DummyObjectKind::Semaphore, semaphore.raw_id());
    }

    fn create_command_pool(&self, _queue: QueueKind) -> Result<GpuCommandPool, GraphicsError> {
        let id = self.created(DummyObjectKind::CommandPool);
        Ok(GpuCommandPool::Dummy { id })
    }

    fn reset_command_pool(&self, pool: &GpuCommandPool) -> Result<(), GraphicsError> {
        self.push(DummyEvent::ResetCommandPool {
            pool: pool.raw_id(),
        });
        Ok(())
    }

    fn destroy_command_pool(&self, pool: GpuCommandPool) {
        self.destroyed(DummyObjectKind::CommandPool, pool.raw_id());
    }

    fn allocate_command_buffer(
        &self,
        _pool: &GpuCommandPool,
    ) -> Result<GpuCommandBuffer, GraphicsError> {
        let id = self.created(DummyObjectKind::CommandBuffer);
        Ok(GpuCommandBuffer::Dummy { id })
    }

    fn begin_command_buffer(&self, cmd: GpuCommandBuffer) -> Result<(), GraphicsError> {
        self.command(cmd, DummyCommand::Begin);
        Ok(())
    }

    fn end_command_buffer(&self, cmd: GpuCommandBuffer) -> Result<(), GraphicsError> {
        self.command(cmd, DummyCommand::End);
        Ok(())
    }

    fn cmd_pipeline_barrier(
        &self,
        cmd: GpuCommandBuffer,
        textures: &[RawTextureBarrier<'_>],
        buffers: &[RawBufferBarrier<'_>],
    ) {
        self.command(
            cmd,
            DummyCommand::Barrier {
                textures: textures
                    .iter()
                    .map(|b| DummyTextureBarrier {
                        texture: b.texture.raw_id(),
                        src: b.src,
                        dst: b.dst,
                        range: b.range,
                        transfer: b.transfer,
                    })
                    .collect(),
                buffers: buffers
                    .iter()
                    .map(|b| DummyBufferBarrier {
                        buffer: b.buffer.raw_id(),
                        src: b.src,
                        dst: b.dst,
                        transfer: b.transfer,
                    })
                    .collect(),
            },
        );
    }

    fn cmd_begin_render_pass(&self, cmd: GpuCommandBuffer, info: &RenderPassBeginInfo<'_>) {
        self.command(
            cmd,
            DummyCommand::BeginRenderPass {
                render_pass: info.render_pass.raw_id(),
                framebuffer: info.framebuffer.raw_id(),
                extent: info.extent,
                clear_values: info.clear_values.to_vec(),
            },
        );
    }

    fn cmd_end_render_pass(&self, cmd: GpuCommandBuffer) {
        self.command(cmd, DummyCommand::EndRenderPass);
    }

    fn cmd_bind_pipeline(&self, cmd: GpuCommandBuffer, pipeline: &GpuPipeline) {
        self.command(
            cmd,
            DummyCommand::BindPipeline {
                pipeline: pipeline.raw_id(),
            },
        );
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: GpuCommandBuffer,
        _pipeline: &GpuPipeline,
        index: u32,
        set: &GpuDescriptorSet,
    ) {
        self.command(
            cmd,
            DummyCommand::BindDescriptorSet {
                index,
                set: set.raw_id(),
            },
        );
    }

    fn cmd_push_constants(
        &self,
        cmd: GpuCommandBuffer,
        _pipeline: &GpuPipeline,
        offset: u32,
        data: &[u8],
    ) {
        self.command(
            cmd,
            DummyCommand::PushConstants {
                offset,
                size: data.len(),
            },
        );
    }

    fn cmd_bind_vertex_buffer(
        &self,
        cmd: GpuCommandBuffer,
        slot: u32,
        buffer: &GpuBuffer,
        _offset: u64,
    ) {
        self.command(
            cmd,
            DummyCommand::BindVertexBuffer {
                slot,
                buffer: buffer.raw_id(),
            },
        );
    }

    fn cmd_bind_index_buffer(
        &self,
        cmd: GpuCommandBuffer,
        buffer: &GpuBuffer,
        _offset: u64,
        format: IndexFormat,
    ) {
        self.command(
            cmd,
            DummyCommand::BindIndexBuffer {
                buffer: buffer.raw_id(),
                format,
            },
        );
    }

    fn cmd_set_viewport(&self, cmd: GpuCommandBuffer, _viewport: &Viewport) {
        self.command(cmd, DummyCommand::SetViewport);
    }

    fn cmd_set_scissor(&self, cmd: GpuCommandBuffer, _scissor: &ScissorRect) {
        self.command(cmd, DummyCommand::SetScissor);
    }

    fn cmd_draw(
        &self,
        cmd: GpuCommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) {
        self.command(
            cmd,
            DummyCommand::Draw {
                vertex_count,
                instance_count,
            },
        );
    }

    fn cmd_draw_indexed(
        &self,
        cmd: GpuCommandBuffer,
        index_count: u32,
        instance_count: u32,
        _first_index: u32,
        _vertex_offset: i32,
        _first_instance: u32,
    ) {
        self.command(
            cmd,
            DummyCommand::DrawIndexed {
                index_count,
                instance_count,
            },
        );
    }

    fn cmd_dispatch(&self, cmd: GpuCommandBuffer, x: u32, y: u32, z: u32) {
        self.command(cmd, DummyCommand::Dispatch { x, y, z });
    }

    fn cmd_copy_buffer(
        &self,
        cmd: GpuCommandBuffer,
        src: &GpuBuffer,
        _src_offset: u64,
        dst: &GpuBuffer,
        _dst_offset: u64,
        size: u64,
    ) {
        self.command(
            cmd,
            DummyCommand::CopyBuffer {
                src: src.raw_id(),
                dst: dst.raw_id(),
                size,
            },
        );
    }

    fn cmd_copy_buffer_to_texture(
        &self,
        cmd: GpuCommandBuffer,
        src: &GpuBuffer,
        _src_offset: u64,
        dst: &GpuTexture,
        mip_level: u32,
        _extent: Extent3d,
    ) {
        self.command(
            cmd,
            DummyCommand::CopyBufferToTexture {
                src: src.raw_id(),
                dst: dst.raw_id(),
                mip_level,
            },
        );
    }

    fn cmd_blit_texture(
        &self,
        cmd: GpuCommandBuffer,
        src: &GpuTexture,
        dst: &GpuTexture,
        region: &BlitRegion,
    ) {
        self.command(
            cmd,
            DummyCommand::Blit {
                src: src.raw_id(),
                dst: dst.raw_id(),
                region: *region,
            },
        );
    }

    fn cmd_begin_label(&self, cmd: GpuCommandBuffer, label: &str) {
        self.command(cmd, DummyCommand::BeginLabel(label.to_string()));
    }

    fn cmd_end_label(&self, cmd: GpuCommandBuffer) {
        self.command(cmd, DummyCommand::EndLabel);
    }

    fn submit(&self, queue: QueueKind, info: &SubmitInfo<'_>) -> Result<(), GraphicsError> {
        log::trace!(
            "DummyBackend: submit {} command buffers to {} queue",
            info.command_buffers.len(),
            queue.name()
        );
        if let Some(fence) = info.fence {
            fence.dummy_set(true);
        }
        self.push(DummyEvent::Submit {
            queue,
            command_buffers: info.command_buffers.iter().map(|c| c.raw_id()).collect(),
            waits: info
                .wait_semaphores
                .iter()
                .map(|(s, stages)| (s.raw_id(), *stages))
                .collect(),
            signals: info.signal_semaphores.iter().map(|s| s.raw_id()).collect(),
            fence: info.fence.map(GpuFence::raw_id),
        });
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), GraphicsError> {
        self.push(DummyEvent::WaitIdle);
        Ok(())
    }

    fn create_swapchain(
        &self,
        descriptor: &SwapchainDescriptor,
        _old: Option<&GpuSwapchain>,
    ) -> Result<GpuSwapchain, GraphicsError> {
        if descriptor.extent.width == 0 || descriptor.extent.height == 0 {
            return Err(GraphicsError::InvalidParameter(
                "swapchain extent must be non-zero".to_string(),
            ));
        }
        let id = self.created(DummyObjectKind::Swapchain);
        Ok(GpuSwapchain::Dummy {
            id,
            image_count: descriptor.image_count.max(2),
            extent: descriptor.extent,
            format: descriptor.format,
        })
    }

    fn swapchain_textures(
        &self,
        swapchain: &GpuSwapchain,
    ) -> Result<Vec<GpuTexture>, GraphicsError> {
        match swapchain {
            GpuSwapchain::Dummy {
                image_count,
                extent,
                format,
                ..
            } => Ok((0..*image_count)
                .map(|_| GpuTexture::Dummy {
                    id: self.created(DummyObjectKind::Texture),
                    extent: *extent,
                    format: *format,
                    mip_level_count: 1,
                })
                .collect()),
            #[cfg(feature = "vulkan-backend")]
            GpuSwapchain::Vulkan { .. } => Err(GraphicsError::Internal(
                "Vulkan swapchain passed to dummy backend".to_string(),
            )),
        }
    }

    fn acquire_next_image(
        &self,
        swapchain: &GpuSwapchain,
        signal: &GpuSemaphore,
    ) -> Result<AcquireOutcome, GraphicsError> {
        let image_count = match swapchain {
            GpuSwapchain::Dummy { image_count, .. } => *image_count,
            #[cfg(feature = "vulkan-backend")]
            GpuSwapchain::Vulkan { .. } => {
                return Err(GraphicsError::Internal(
                    "Vulkan swapchain passed to dummy backend".to_string(),
                ));
            }
        };

        let mut state = self.state.lock();
        let outcome = if self.surface_out_of_date.load(Ordering::Acquire) {
            AcquireOutcome::OutOfDate
        } else {
            let cursor = state.swapchain_cursor.entry(swapchain.raw_id()).or_insert(0);
            let index = *cursor;
            *cursor = (index + 1) % image_count;
            AcquireOutcome::Acquired {
                index,
                suboptimal: false,
            }
        };
        state.events.push(DummyEvent::Acquire {
            swapchain: swapchain.raw_id(),
            semaphore: signal.raw_id(),
            index: match outcome {
                AcquireOutcome::Acquired { index, .. } => Some(index),
                AcquireOutcome::OutOfDate => None,
            },
        });
        Ok(outcome)
    }

    fn present(
        &self,
        swapchain: &GpuSwapchain,
        index: u32,
        wait: &GpuSemaphore,
    ) -> Result<bool, GraphicsError> {
        self.push(DummyEvent::Present {
            swapchain: swapchain.raw_id(),
            index,
            wait: wait.raw_id(),
        });
        Ok(self.surface_out_of_date.load(Ordering::Acquire))
    }

    fn destroy_swapchain(&self, swapchain: GpuSwapchain) {
        self.state
            .lock()
            .swapchain_cursor
            .remove(&swapchain.raw_id());
        self.destroyed(DummyObjectKind::Swapchain, swapchain.raw_id());
    }
}

static_assertions::assert_impl_all!(DummyBackend: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BufferUsage;

    #[test]
    fn test_dummy_backend_creation() {
        let backend = DummyBackend::new();
        assert_eq!(backend.name(), "Dummy Backend");
        assert_eq!(backend.queue_family(QueueKind::Compute), 1);
        assert!(backend.capabilities().dedicated_compute_queue);
    }

    #[test]
    fn test_create_destroy_logged() {
        let backend = DummyBackend::new();
        let buffer = backend
            .create_buffer(&BufferDescriptor::new(64, BufferUsage::UNIFORM))
            .unwrap();
        let id = buffer.raw_id();
        assert_eq!(backend.live_objects(DummyObjectKind::Buffer), 1);
        backend.destroy_buffer(buffer);
        assert_eq!(backend.live_objects(DummyObjectKind::Buffer), 0);
        assert_eq!(
            backend.events(),
            vec![
                DummyEvent::Create {
                    kind: DummyObjectKind::Buffer,
                    id
                },
                DummyEvent::Destroy {
                    kind: DummyObjectKind::Buffer,
                    id
                },
            ]
        );
    }

    #[test]
    fn test_fence_signaled_on_submit() {
        let backend = DummyBackend::new();
        let fence = backend.create_fence(false).unwrap();
        assert!(!backend.is_fence_signaled(&fence));
        assert!(backend.wait_fences(&[&fence]).is_err());

        backend
            .submit(
                QueueKind::Graphics,
                &SubmitInfo {
                    fence: Some(&fence),
                    ..SubmitInfo::default()
                },
            )
            .unwrap();
        assert!(backend.is_fence_signaled(&fence));
        assert!(backend.wait_fences(&[&fence]).is_ok());

        backend.reset_fences(&[&fence]).unwrap();
        assert!(!backend.is_fence_signaled(&fence));
    }

    #[test]
    fn test_fence_wait_failure_injection() {
        let backend = DummyBackend::new();
        let fence = backend.create_fence(true).unwrap();
        backend.fail_next_fence_wait();
        assert_eq!(
            backend.wait_fences(&[&fence]),
            Err(GraphicsError::DeviceLost)
        );
        assert!(backend.wait_fences(&[&fence]).is_ok());
    }

    #[test]
    fn test_swapchain_cycles_images() {
        let backend = DummyBackend::new();
        let swapchain = backend
            .create_swapchain(
                &SwapchainDescriptor {
                    extent: Extent3d::new_2d(640, 480),
                    format: TextureFormat::Bgra8Unorm,
                    image_count: 3,
                    present_mode: Default::default(),
                },
                None,
            )
            .unwrap();
        let semaphore = backend.create_semaphore().unwrap();
        let indices: Vec<_> = (0..4)
            .map(|_| backend.acquire_next_image(&swapchain, &semaphore).unwrap())
            .collect();
        assert_eq!(
            indices[3],
            AcquireOutcome::Acquired {
                index: 0,
                suboptimal: false
            }
        );

        backend.set_surface_out_of_date(true);
        assert_eq!(
            backend.acquire_next_image(&swapchain, &semaphore).unwrap(),
            AcquireOutcome::OutOfDate
        );
        assert!(backend.present(&swapchain, 0, &semaphore).unwrap());
    }
}
