//! Command recording.
//!
//! A [`CommandRecorder`] records one linear command sequence for one queue in
//! the current frame slot. Handles are resolved against the context as
//! commands are recorded, and every barrier updates the tracked state of the
//! resources it touches, so the next barrier knows where to start from.
//!
//! # Ownership transfers
//!
//! When a resource written on one queue family is next used on another, the
//! source queue records a *release* (destination access none) and the
//! destination queue records a matching *acquire* (source access none).
//! Both halves name the same layout transition. The render graph emits these
//! pairs automatically; hand-recorded pairs go through
//! [`release_texture`](CommandRecorder::release_texture) /
//! [`acquire_texture`](CommandRecorder::acquire_texture) and are checked by
//! the context's [`OwnershipLedger`](crate::sync::OwnershipLedger).

use crate::backend::{
    BlitRegion, GpuCommandBuffer, RawBufferBarrier, RawTextureBarrier, RenderPassBeginInfo,
};
use crate::context::RenderContext;
use crate::error::GraphicsError;
use crate::frame::SubmitBatch;
use crate::resources::ResourceHandle;
use crate::sync::{
    AccessFlags, BufferBarrier, ImageLayout, PipelineStages, QueueTransfer, ResourceState,
    SubresourceRange, TextureBarrier,
};
use crate::types::{
    BufferDescriptor, ClearValue, DescriptorWrite, IndexFormat, QueueKind, ScissorRect, Viewport,
};

/// Role of a barrier with respect to the recording queue's family.
enum TransferRole {
    None,
    Release(QueueTransfer),
    Acquire(QueueTransfer),
}

/// Records commands for one queue.
///
/// Obtained with [`CommandRecorder::begin`] or handed to a pass's execute
/// callback by the render graph.
pub struct CommandRecorder<'a> {
    ctx: &'a mut RenderContext,
    cmd: GpuCommandBuffer,
    queue: QueueKind,
    family: u32,
    render_pass: Option<ResourceHandle>,
    pipeline: Option<ResourceHandle>,
    label_depth: u32,
}

impl<'a> CommandRecorder<'a> {
    /// Start recording a command buffer for `queue` in the current frame.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress.
    pub fn begin(ctx: &'a mut RenderContext, queue: QueueKind) -> Result<Self, GraphicsError> {
        assert!(ctx.in_frame, "command recording outside of a frame");
        let backend = ctx.resources.backend.clone();
        let cmd = ctx
            .resources
            .frames
            .current_mut()
            .command_buffer(backend.as_ref(), queue)?;
        backend.begin_command_buffer(cmd)?;
        Ok(Self {
            ctx,
            cmd,
            queue,
            family: backend.queue_family(queue),
            render_pass: None,
            pipeline: None,
            label_depth: 0,
        })
    }

    /// Finish recording and return the command buffer for submission.
    ///
    /// # Panics
    ///
    /// Panics if a render pass or debug label is still open.
    pub fn finish(self) -> Result<GpuCommandBuffer, GraphicsError> {
        let cmd = self.cmd;
        self.end()?;
        Ok(cmd)
    }

    /// Finish recording and submit on the recorder's queue.
    ///
    /// The submission carries a frame fence when the context is configured
    /// to fence every queue.
    pub fn submit(self) -> Result<(), GraphicsError> {
        let queue = self.queue;
        let cmd = self.cmd;
        let ctx = self.end()?;
        let signal_fence = ctx.config().signal_frame_fences;
        ctx.submit(
            queue,
            &SubmitBatch {
                command_buffers: vec![cmd],
                signal_fence,
                ..SubmitBatch::default()
            },
        )
    }

    fn end(self) -> Result<&'a mut RenderContext, GraphicsError> {
        assert!(
            self.render_pass.is_none(),
            "command buffer finished inside a render pass"
        );
        assert_eq!(self.label_depth, 0, "command buffer finished with open labels");
        self.ctx.resources.backend.end_command_buffer(self.cmd)?;
        Ok(self.ctx)
    }

    /// Queue the commands are recorded for.
    pub fn queue(&self) -> QueueKind {
        self.queue
    }

    /// Raw command buffer.
    pub fn command_buffer(&self) -> GpuCommandBuffer {
        self.cmd
    }

    /// The render context, e.g. for scratch allocations during recording.
    pub fn context(&mut self) -> &mut RenderContext {
        self.ctx
    }

    /// Render pass currently open, if any.
    pub fn active_render_pass(&self) -> Option<ResourceHandle> {
        self.render_pass
    }

    // ------------------------------------------------------------------
    // Debug labels
    // ------------------------------------------------------------------

    /// Open a debug label region.
    pub fn begin_label(&mut self, label: &str) {
        self.ctx.resources.backend.cmd_begin_label(self.cmd, label);
        self.label_depth += 1;
    }

    /// Close the innermost debug label region.
    pub fn end_label(&mut self) {
        assert!(self.label_depth > 0, "end_label without begin_label");
        self.ctx.resources.backend.cmd_end_label(self.cmd);
        self.label_depth -= 1;
    }

    // ------------------------------------------------------------------
    // Barriers
    // ------------------------------------------------------------------

    fn transfer_role(&self, transfer: Option<QueueTransfer>) -> TransferRole {
        match transfer {
            None => TransferRole::None,
            Some(t) if t.src_family == self.family => TransferRole::Release(t),
            Some(t) if t.dst_family == self.family => TransferRole::Acquire(t),
            Some(t) => panic!(
                "ownership transfer {}->{} recorded on {} queue (family {})",
                t.src_family,
                t.dst_family,
                self.queue.name(),
                self.family
            ),
        }
    }

    /// Record a pipeline barrier and update the tracked resource states.
    ///
    /// Barriers carrying a [`QueueTransfer`] whose source family is this
    /// queue's are releases: they leave the tracked state alone until the
    /// matching acquire is recorded on the destination queue.
    ///
    /// # Panics
    ///
    /// Panics inside a render pass, or if an ownership transfer does not
    /// pair up in the context's ledger.
    pub fn pipeline_barrier(&mut self, textures: &[TextureBarrier], buffers: &[BufferBarrier]) {
        if textures.is_empty() && buffers.is_empty() {
            return;
        }
        assert!(
            self.render_pass.is_none(),
            "pipeline barrier recorded inside a render pass"
        );

        {
            let resources = &self.ctx.resources;
            let raw_textures: Vec<RawTextureBarrier<'_>> = textures
                .iter()
                .map(|b| RawTextureBarrier {
                    texture: &resources.textures.get(&resources.handles, b.texture).raw,
                    src: b.src,
                    dst: b.dst,
                    range: b.range,
                    transfer: b.transfer,
                })
                .collect();
            let raw_buffers: Vec<RawBufferBarrier<'_>> = buffers
                .iter()
                .map(|b| RawBufferBarrier {
                    buffer: &resources.buffers.get(&resources.handles, b.buffer).raw,
                    src: b.src,
                    dst: b.dst,
                    transfer: b.transfer,
                })
                .collect();
            resources
                .backend
                .cmd_pipeline_barrier(self.cmd, &raw_textures, &raw_buffers);
        }

        for barrier in textures {
            let role = self.transfer_role(barrier.transfer);
            let resources = &mut self.ctx.resources;
            match role {
                TransferRole::Release(t) => resources.ownership.release(barrier.texture, t),
                TransferRole::Acquire(t) => {
                    resources.ownership.acquire(barrier.texture, t);
                    let record = resources.texture_mut(barrier.texture);
                    record.state = barrier.dst;
                    record.owner = Some(self.queue);
                }
                TransferRole::None => {
                    let record = resources.texture_mut(barrier.texture);
                    record.state = barrier.dst;
                    record.owner = Some(self.queue);
                }
            }
        }
        for barrier in buffers {
            let role = self.transfer_role(barrier.transfer);
            let resources = &mut self.ctx.resources;
            match role {
                TransferRole::Release(t) => resources.ownership.release(barrier.buffer, t),
                TransferRole::Acquire(t) => {
                    resources.ownership.acquire(barrier.buffer, t);
                    let record = resources.buffer_mut(barrier.buffer);
                    record.state = barrier.dst;
                    record.owner = Some(self.queue);
                }
                TransferRole::None => {
                    let record = resources.buffer_mut(barrier.buffer);
                    record.state = barrier.dst;
                    record.owner = Some(self.queue);
                }
            }
        }
    }

    /// Transition a whole texture from its tracked state to `next`.
    pub fn texture_barrier(&mut self, texture: ResourceHandle, next: ResourceState) {
        let current = self.ctx.resources.texture(texture).state;
        self.pipeline_barrier(&[TextureBarrier::new(texture, current, next)], &[]);
    }

    /// Transition part of a texture between explicit states.
    pub fn texture_barrier_range(
        &mut self,
        texture: ResourceHandle,
        src: ResourceState,
        dst: ResourceState,
        range: SubresourceRange,
    ) {
        self.pipeline_barrier(
            &[TextureBarrier::new(texture, src, dst).with_range(range)],
            &[],
        );
    }

    /// Synchronize a buffer from its tracked state to `next`.
    pub fn buffer_barrier(&mut self, buffer: ResourceHandle, next: ResourceState) {
        let current = self.ctx.resources.buffer(buffer).state;
        self.pipeline_barrier(&[], &[BufferBarrier::new(buffer, current, next)]);
    }

    /// Release a texture to `dst_queue`, which will use it in `next` state.
    ///
    /// A no-op when both queues share a family; the acquire then degrades to
    /// a plain barrier.
    pub fn release_texture(
        &mut self,
        texture: ResourceHandle,
        dst_queue: QueueKind,
        next: ResourceState,
    ) {
        let dst_family = self.ctx.resources.backend.queue_family(dst_queue);
        if dst_family == self.family {
            return;
        }
        let current = self.ctx.resources.texture(texture).state;
        self.pipeline_barrier(
            &[TextureBarrier {
                texture,
                src: current,
                dst: release_state(next),
                range: SubresourceRange::ALL,
                transfer: Some(QueueTransfer {
                    src_family: self.family,
                    dst_family,
                }),
            }],
            &[],
        );
    }

    /// Acquire a texture released by `src_queue` and move it to `next`.
    pub fn acquire_texture(
        &mut self,
        texture: ResourceHandle,
        src_queue: QueueKind,
        next: ResourceState,
    ) {
        let src_family = self.ctx.resources.backend.queue_family(src_queue);
        if src_family == self.family {
            self.texture_barrier(texture, next);
            return;
        }
        let current = self.ctx.resources.texture(texture).state;
        self.pipeline_barrier(
            &[TextureBarrier {
                texture,
                src: acquire_state(current),
                dst: next,
                range: SubresourceRange::ALL,
                transfer: Some(QueueTransfer {
                    src_family,
                    dst_family: self.family,
                }),
            }],
            &[],
        );
    }

    /// Release a buffer to `dst_queue`, which will use it in `next` state.
    pub fn release_buffer(
        &mut self,
        buffer: ResourceHandle,
        dst_queue: QueueKind,
        next: ResourceState,
    ) {
        let dst_family = self.ctx.resources.backend.queue_family(dst_queue);
        if dst_family == self.family {
            return;
        }
        let current = self.ctx.resources.buffer(buffer).state;
        self.pipeline_barrier(
            &[],
            &[BufferBarrier {
                buffer,
                src: current,
                dst: release_state(next),
                transfer: Some(QueueTransfer {
                    src_family: self.family,
                    dst_family,
                }),
            }],
        );
    }

    /// Acquire a buffer released by `src_queue` and move it to `next`.
    pub fn acquire_buffer(
        &mut self,
        buffer: ResourceHandle,
        src_queue: QueueKind,
        next: ResourceState,
    ) {
        let src_family = self.ctx.resources.backend.queue_family(src_queue);
        if src_family == self.family {
            self.buffer_barrier(buffer, next);
            return;
        }
        let current = self.ctx.resources.buffer(buffer).state;
        self.pipeline_barrier(
            &[],
            &[BufferBarrier {
                buffer,
                src: acquire_state(current),
                dst: next,
                transfer: Some(QueueTransfer {
                    src_family,
                    dst_family: self.family,
                }),
            }],
        );
    }

    // ------------------------------------------------------------------
    // Render passes
    // ------------------------------------------------------------------

    /// Begin a render pass instance covering the whole framebuffer.
    ///
    /// Also sets the viewport and scissor to the framebuffer extent.
    pub fn begin_render_pass(
        &mut self,
        render_pass: ResourceHandle,
        framebuffer: ResourceHandle,
        clear_values: &[ClearValue],
    ) {
        assert!(
            self.render_pass.is_none(),
            "render pass begun inside another render pass"
        );
        let resources = &self.ctx.resources;
        let pass = resources.render_pass(render_pass);
        let fb = resources.framebuffer(framebuffer);
        assert_eq!(
            fb.render_pass, render_pass,
            "framebuffer was created for a different render pass"
        );
        let backend = &resources.backend;
        backend.cmd_begin_render_pass(
            self.cmd,
            &RenderPassBeginInfo {
                render_pass: &pass.raw,
                framebuffer: &fb.raw,
                extent: fb.extent,
                clear_values,
            },
        );
        backend.cmd_set_viewport(self.cmd, &Viewport::from_extent(fb.extent));
        backend.cmd_set_scissor(self.cmd, &ScissorRect::from_extent(fb.extent));
        self.render_pass = Some(render_pass);
    }

    /// End the current render pass instance.
    pub fn end_render_pass(&mut self) {
        assert!(self.render_pass.is_some(), "end_render_pass without begin");
        self.ctx.resources.backend.cmd_end_render_pass(self.cmd);
        self.render_pass = None;
    }

    // ------------------------------------------------------------------
    // State binding
    // ------------------------------------------------------------------

    /// Bind a pipeline.
    ///
    /// # Panics
    ///
    /// Panics if a graphics pipeline is bound outside a render pass or a
    /// compute pipeline inside one.
    pub fn bind_pipeline(&mut self, pipeline: ResourceHandle) {
        let record = self.ctx.resources.pipeline(pipeline);
        if record.descriptor.is_compute() {
            assert!(
                self.render_pass.is_none(),
                "compute pipeline bound inside a render pass"
            );
        } else {
            assert!(
                self.render_pass.is_some(),
                "graphics pipeline bound outside a render pass"
            );
        }
        self.ctx
            .resources
            .backend
            .cmd_bind_pipeline(self.cmd, &record.raw);
        self.pipeline = Some(pipeline);
    }

    fn bound_pipeline(&self) -> ResourceHandle {
        match self.pipeline {
            Some(pipeline) => pipeline,
            None => panic!("no pipeline bound"),
        }
    }

    /// Bind a descriptor set at `index` for the bound pipeline.
    pub fn bind_descriptor_set(&mut self, index: u32, set: ResourceHandle) {
        let resources = &self.ctx.resources;
        let pipeline = resources.pipeline(self.bound_pipeline());
        let set = resources.descriptor_set(set);
        resources
            .backend
            .cmd_bind_descriptor_set(self.cmd, &pipeline.raw, index, &set.raw);
    }

    /// Bind a descriptor set of `layout` with `writes`, reusing the cached
    /// set for identical contents.
    pub fn bind_cached_descriptor_set(
        &mut self,
        index: u32,
        layout: ResourceHandle,
        writes: &[DescriptorWrite],
    ) -> Result<ResourceHandle, GraphicsError> {
        let set = self.ctx.request_descriptor_set(layout, writes)?;
        self.bind_descriptor_set(index, set);
        Ok(set)
    }

    /// Update push constants of the bound pipeline.
    pub fn push_constants(&mut self, offset: u32, data: &[u8]) {
        let resources = &self.ctx.resources;
        let pipeline = resources.pipeline(self.bound_pipeline());
        assert!(
            offset as usize + data.len() <= pipeline.descriptor.push_constant_size as usize,
            "push constants exceed the pipeline's {} byte block",
            pipeline.descriptor.push_constant_size
        );
        resources
            .backend
            .cmd_push_constants(self.cmd, &pipeline.raw, offset, data);
    }

    /// Bind a vertex buffer to `slot`.
    pub fn bind_vertex_buffer(&mut self, slot: u32, buffer: ResourceHandle, offset: u64) {
        let resources = &self.ctx.resources;
        let buffer = resources.buffer(buffer);
        resources
            .backend
            .cmd_bind_vertex_buffer(self.cmd, slot, &buffer.raw, offset);
    }

    /// Bind an index buffer.
    pub fn bind_index_buffer(&mut self, buffer: ResourceHandle, offset: u64, format: IndexFormat) {
        let resources = &self.ctx.resources;
        let buffer = resources.buffer(buffer);
        resources
            .backend
            .cmd_bind_index_buffer(self.cmd, &buffer.raw, offset, format);
    }

    /// Set the viewport.
    pub fn set_viewport(&mut self, viewport: &Viewport) {
        self.ctx.resources.backend.cmd_set_viewport(self.cmd, viewport);
    }

    /// Set the scissor rectangle.
    pub fn set_scissor(&mut self, scissor: &ScissorRect) {
        self.ctx.resources.backend.cmd_set_scissor(self.cmd, scissor);
    }

    // ------------------------------------------------------------------
    // Draw and dispatch
    // ------------------------------------------------------------------

    fn assert_can_draw(&self) {
        assert!(self.render_pass.is_some(), "draw outside a render pass");
        assert!(self.pipeline.is_some(), "draw without a bound pipeline");
    }

    /// Non-indexed draw.
    pub fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.assert_can_draw();
        self.ctx.resources.backend.cmd_draw(
            self.cmd,
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        );
    }

    /// Indexed draw.
    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        self.assert_can_draw();
        self.ctx.resources.backend.cmd_draw_indexed(
            self.cmd,
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        );
    }

    /// Compute dispatch.
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        assert!(self.render_pass.is_none(), "dispatch inside a render pass");
        assert!(self.pipeline.is_some(), "dispatch without a bound pipeline");
        self.ctx.resources.backend.cmd_dispatch(self.cmd, x, y, z);
    }

    // ------------------------------------------------------------------
    // Transfers
    // ------------------------------------------------------------------

    /// Copy `size` bytes between buffers.
    pub fn copy_buffer(
        &mut self,
        src: ResourceHandle,
        src_offset: u64,
        dst: ResourceHandle,
        dst_offset: u64,
        size: u64,
    ) {
        assert!(self.render_pass.is_none(), "copy inside a render pass");
        let resources = &self.ctx.resources;
        let src = resources.buffer(src);
        let dst = resources.buffer(dst);
        assert!(
            src_offset + size <= src.size() && dst_offset + size <= dst.size(),
            "buffer copy out of bounds"
        );
        resources
            .backend
            .cmd_copy_buffer(self.cmd, &src.raw, src_offset, &dst.raw, dst_offset, size);
    }

    /// Copy tightly packed texels from a buffer into one mip level.
    pub fn copy_buffer_to_texture(
        &mut self,
        src: ResourceHandle,
        src_offset: u64,
        dst: ResourceHandle,
        mip_level: u32,
    ) {
        assert!(self.render_pass.is_none(), "copy inside a render pass");
        let resources = &self.ctx.resources;
        let src = resources.buffer(src);
        let dst = resources.texture(dst);
        assert!(
            mip_level < dst.mip_level_count(),
            "mip level {} out of range",
            mip_level
        );
        let extent = dst.size().mip_level(mip_level);
        resources.backend.cmd_copy_buffer_to_texture(
            self.cmd,
            &src.raw,
            src_offset,
            &dst.raw,
            mip_level,
            extent,
        );
    }

    /// Filtered blit between textures or mip levels.
    pub fn blit_texture(&mut self, src: ResourceHandle, dst: ResourceHandle, region: &BlitRegion) {
        assert!(self.render_pass.is_none(), "blit inside a render pass");
        let resources = &self.ctx.resources;
        let src = resources.texture(src);
        let dst = resources.texture(dst);
        resources
            .backend
            .cmd_blit_texture(self.cmd, &src.raw, &dst.raw, region);
    }

    /// Upload `data` into `buffer` at `offset` and leave it in `next` state.
    ///
    /// Goes through a staging buffer that is destroyed once this frame slot
    /// comes around again.
    pub fn upload_buffer(
        &mut self,
        buffer: ResourceHandle,
        offset: u64,
        data: &[u8],
        next: ResourceState,
    ) -> Result<(), GraphicsError> {
        assert!(!data.is_empty(), "upload of zero bytes");
        let size = data.len() as u64;
        assert!(
            offset + size <= self.ctx.resources.buffer(buffer).size(),
            "upload overflows buffer {:?}",
            buffer
        );

        let staging = self.create_staging(data)?;
        self.buffer_barrier(buffer, ResourceState::TRANSFER_DST);
        self.copy_buffer(staging, 0, buffer, offset, size);
        self.buffer_barrier(buffer, next);
        self.ctx.resources.destroy_buffer(staging);
        Ok(())
    }

    /// Upload tightly packed texels into one mip level of `texture` and
    /// leave the whole texture in `next` state.
    ///
    /// # Panics
    ///
    /// Panics if `data` does not cover the mip level exactly.
    pub fn upload_texture(
        &mut self,
        texture: ResourceHandle,
        mip_level: u32,
        data: &[u8],
        next: ResourceState,
    ) -> Result<(), GraphicsError> {
        let record = self.ctx.resources.texture(texture);
        let extent = record.size().mip_level(mip_level);
        let expected = u64::from(extent.width)
            * u64::from(extent.height)
            * u64::from(extent.depth)
            * u64::from(record.format().block_size());
        assert_eq!(
            data.len() as u64,
            expected,
            "texture upload size does not match mip level {}",
            mip_level
        );

        let staging = self.create_staging(data)?;
        self.texture_barrier(texture, ResourceState::TRANSFER_DST);
        self.copy_buffer_to_texture(staging, 0, texture, mip_level);
        self.texture_barrier(texture, next);
        self.ctx.resources.destroy_buffer(staging);
        Ok(())
    }

    fn create_staging(&mut self, data: &[u8]) -> Result<ResourceHandle, GraphicsError> {
        let resources = &mut self.ctx.resources;
        let staging = resources.create_buffer(&BufferDescriptor::staging(data.len() as u64))?;
        resources.write_buffer(staging, 0, data)?;
        Ok(staging)
    }

    /// Fill mip levels `1..` of `texture` by successively downsampling mip 0,
    /// then move the whole texture to `next`.
    ///
    /// # Panics
    ///
    /// Panics if the texture has a single mip level.
    pub fn generate_mips(&mut self, texture: ResourceHandle, next: ResourceState) {
        let record = self.ctx.resources.texture(texture);
        let mip_count = record.mip_level_count();
        let size = record.size();
        let current = record.state;
        assert!(
            mip_count > 1,
            "generate_mips requires mip_level_count > 1, texture {:?} has {}",
            texture,
            mip_count
        );

        let discard = ResourceState::new(
            current.stages,
            current.access,
            ImageLayout::Undefined,
        );
        self.pipeline_barrier(
            &[
                TextureBarrier::new(texture, current, ResourceState::TRANSFER_SRC)
                    .with_range(SubresourceRange::mip(0)),
                TextureBarrier::new(texture, discard, ResourceState::TRANSFER_DST)
                    .with_range(SubresourceRange::mips(1, mip_count - 1)),
            ],
            &[],
        );

        for level in 1..mip_count {
            self.blit_texture(
                texture,
                texture,
                &BlitRegion {
                    src_mip_level: level - 1,
                    src_extent: size.mip_level(level - 1),
                    dst_mip_level: level,
                    dst_extent: size.mip_level(level),
                },
            );
            self.texture_barrier_range(
                texture,
                ResourceState::TRANSFER_DST,
                ResourceState::TRANSFER_SRC,
                SubresourceRange::mip(level),
            );
        }

        self.texture_barrier_range(
            texture,
            ResourceState::TRANSFER_SRC,
            next,
            SubresourceRange::ALL,
        );
    }
}

/// Destination half of a release: nothing on the source queue waits for it.
fn release_state(next: ResourceState) -> ResourceState {
    ResourceState::new(
        PipelineStages::BOTTOM_OF_PIPE,
        AccessFlags::empty(),
        next.layout,
    )
}

/// Source half of an acquire: the semaphore already ordered the release.
fn acquire_state(current: ResourceState) -> ResourceState {
    ResourceState::new(
        PipelineStages::TOP_OF_PIPE,
        AccessFlags::empty(),
        current.layout,
    )
}

impl std::fmt::Debug for CommandRecorder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRecorder")
            .field("queue", &self.queue)
            .field("family", &self.family)
            .field("render_pass", &self.render_pass)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
