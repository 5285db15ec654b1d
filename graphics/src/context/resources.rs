//! Handle-addressed GPU object storage.

use std::collections::HashMap;
use std::sync::Arc;

use ringframe_core::{HandleAllocator, SlotStore};

use crate::backend::{DeviceCapabilities, GpuBackend, RawDescriptorResource, RawDescriptorWrite};
use crate::config::RenderContextConfig;
use crate::error::GraphicsError;
use crate::frame::{DeferredObject, FrameRing};
use crate::resources::{
    BufferRecord, DescriptorSetLayoutRecord, DescriptorSetRecord, FramebufferRecord,
    PipelineRecord, RenderPassRecord, ResourceHandle, ResourceKind, ScratchAllocation,
    SwapchainRecord, TextureRecord,
};
use crate::sync::OwnershipLedger;
use crate::types::{
    BufferDescriptor, BufferUsage, DescriptorResource, DescriptorSetLayoutDescriptor,
    DescriptorWrite, Extent3d, PipelineDescriptor, RenderPassLayout, TextureDescriptor,
};

/// Every GPU object the renderer owns, plus the frame ring that delays their
/// destruction.
///
/// `destroy_*` never frees immediately: the handle goes into the allocator's
/// delay ring and the raw object into the current frame slot's deferred
/// queue.
pub struct GpuResources {
    pub(crate) backend: Arc<dyn GpuBackend>,
    pub(crate) capabilities: DeviceCapabilities,
    pub(crate) handles: HandleAllocator<ResourceKind>,
    pub(crate) textures: SlotStore<ResourceKind, TextureRecord>,
    pub(crate) buffers: SlotStore<ResourceKind, BufferRecord>,
    pub(crate) render_passes: SlotStore<ResourceKind, RenderPassRecord>,
    pub(crate) framebuffers: SlotStore<ResourceKind, FramebufferRecord>,
    pub(crate) set_layouts: SlotStore<ResourceKind, DescriptorSetLayoutRecord>,
    pub(crate) descriptor_sets: SlotStore<ResourceKind, DescriptorSetRecord>,
    pub(crate) pipelines: SlotStore<ResourceKind, PipelineRecord>,
    pub(crate) swapchains: SlotStore<ResourceKind, SwapchainRecord>,
    pub(crate) frames: FrameRing,
    /// Reusable descriptor sets per layout.
    pub(crate) free_sets: HashMap<ResourceHandle, Vec<ResourceHandle>>,
    pub(crate) ownership: OwnershipLedger,
}

impl GpuResources {
    pub(crate) fn new(backend: Arc<dyn GpuBackend>, config: &RenderContextConfig) -> Self {
        let capabilities = backend.capabilities();
        Self {
            backend,
            capabilities,
            handles: HandleAllocator::new(config.handle_ring_depth()),
            textures: SlotStore::new(ResourceKind::Texture),
            buffers: SlotStore::new(ResourceKind::Buffer),
            render_passes: SlotStore::new(ResourceKind::RenderPass),
            framebuffers: SlotStore::new(ResourceKind::Framebuffer),
            set_layouts: SlotStore::new(ResourceKind::DescriptorSetLayout),
            descriptor_sets: SlotStore::new(ResourceKind::DescriptorSet),
            pipelines: SlotStore::new(ResourceKind::Pipeline),
            swapchains: SlotStore::new(ResourceKind::Swapchain),
            frames: FrameRing::new(config.frames_in_flight, config.scratch_chunk_size),
            free_sets: HashMap::new(),
            ownership: OwnershipLedger::new(),
        }
    }

    /// The backend objects are created on.
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Device limits queried at creation.
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Returns true if `handle` is currently valid.
    pub fn is_valid(&self, handle: ResourceHandle) -> bool {
        self.handles.is_valid(handle)
    }

    /// Number of live objects of `kind`.
    pub fn live_objects(&self, kind: ResourceKind) -> usize {
        self.handles.active_count(kind)
    }

    /// Objects waiting in any frame slot's deferred queue.
    pub fn pending_destructions(&self) -> usize {
        self.frames.iter().map(|f| f.pending_destructions()).sum()
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// Get a texture record.
    pub fn texture(&self, handle: ResourceHandle) -> &TextureRecord {
        self.textures.get(&self.handles, handle)
    }

    /// Get a buffer record.
    pub fn buffer(&self, handle: ResourceHandle) -> &BufferRecord {
        self.buffers.get(&self.handles, handle)
    }

    /// Get a render pass record.
    pub fn render_pass(&self, handle: ResourceHandle) -> &RenderPassRecord {
        self.render_passes.get(&self.handles, handle)
    }

    /// Get a framebuffer record.
    pub fn framebuffer(&self, handle: ResourceHandle) -> &FramebufferRecord {
        self.framebuffers.get(&self.handles, handle)
    }

    /// Get a descriptor set layout record.
    pub fn descriptor_set_layout(&self, handle: ResourceHandle) -> &DescriptorSetLayoutRecord {
        self.set_layouts.get(&self.handles, handle)
    }

    /// Get a descriptor set record.
    pub fn descriptor_set(&self, handle: ResourceHandle) -> &DescriptorSetRecord {
        self.descriptor_sets.get(&self.handles, handle)
    }

    /// Get a pipeline record.
    pub fn pipeline(&self, handle: ResourceHandle) -> &PipelineRecord {
        self.pipelines.get(&self.handles, handle)
    }

    pub(crate) fn texture_mut(&mut self, handle: ResourceHandle) -> &mut TextureRecord {
        self.textures.get_mut(&self.handles, handle)
    }

    pub(crate) fn buffer_mut(&mut self, handle: ResourceHandle) -> &mut BufferRecord {
        self.buffers.get_mut(&self.handles, handle)
    }

    /// Returns true once the fences of `frame` have been waited on, i.e. the
    /// GPU no longer touches anything that frame submitted.
    pub fn is_frame_retired(&self, frame: u64) -> bool {
        frame + self.frames.len() as u64 <= self.frames.frame_number()
    }

    fn defer(&mut self, object: DeferredObject) {
        self.frames.current_mut().defer(object);
    }

    // ------------------------------------------------------------------
    // Textures and buffers
    // ------------------------------------------------------------------

    /// Create a texture.
    ///
    /// # Errors
    ///
    /// Returns an error if the format does not support the requested usage
    /// or the backend fails to allocate.
    pub fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
    ) -> Result<ResourceHandle, GraphicsError> {
        if descriptor.size.width == 0 || descriptor.size.height == 0 || descriptor.size.depth == 0
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} has zero extent",
                descriptor.label
            )));
        }
        if !self
            .backend
            .supports_format(descriptor.format, descriptor.usage)
        {
            return Err(GraphicsError::FeatureNotSupported(format!(
                "format {:?} with usage {:?}",
                descriptor.format, descriptor.usage
            )));
        }

        let raw = self.backend.create_texture(descriptor)?;
        let handle = self.handles.allocate(ResourceKind::Texture);
        self.textures
            .insert(handle, TextureRecord::new(raw, descriptor.clone()));
        log::trace!("Created texture {:?} ({:?})", handle, descriptor.label);
        Ok(handle)
    }

    /// Destroy a texture once the current frame slot comes around again.
    pub fn destroy_texture(&mut self, handle: ResourceHandle) {
        self.handles.release(handle);
        let record = self.textures.remove(handle);
        self.defer(DeferredObject::Texture(record.raw));
    }

    /// Create a buffer.
    pub fn create_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
    ) -> Result<ResourceHandle, GraphicsError> {
        let raw = self.backend.create_buffer(descriptor)?;
        let handle = self.handles.allocate(ResourceKind::Buffer);
        self.buffers
            .insert(handle, BufferRecord::new(raw, descriptor.clone()));
        log::trace!("Created buffer {:?} ({:?})", handle, descriptor.label);
        Ok(handle)
    }

    /// Destroy a buffer once the current frame slot comes around again.
    pub fn destroy_buffer(&mut self, handle: ResourceHandle) {
        self.handles.release(handle);
        let record = self.buffers.remove(handle);
        self.defer(DeferredObject::Buffer(record.raw));
    }

    /// Write bytes into a host-visible buffer.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if the buffer is not
    /// host-visible or the write is out of bounds.
    pub fn write_buffer(
        &mut self,
        handle: ResourceHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        let record = self.buffers.get(&self.handles, handle);
        if !record.descriptor.is_host_visible() {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer {:?} is not host-visible",
                handle
            )));
        }
        if offset + data.len() as u64 > record.size() {
            return Err(GraphicsError::InvalidParameter(format!(
                "write of {} bytes at {} overflows buffer {:?} of {} bytes",
                data.len(),
                offset,
                handle,
                record.size()
            )));
        }
        self.backend.write_buffer(&record.raw, offset, data)
    }

    // ------------------------------------------------------------------
    // Render passes and framebuffers
    // ------------------------------------------------------------------

    /// Create a render pass for an attachment layout.
    pub fn create_render_pass(
        &mut self,
        layout: &RenderPassLayout,
    ) -> Result<ResourceHandle, GraphicsError> {
        let raw = self.backend.create_render_pass(layout)?;
        let handle = self.handles.allocate(ResourceKind::RenderPass);
        self.render_passes.insert(
            handle,
            RenderPassRecord {
                raw,
                layout: layout.clone(),
            },
        );
        Ok(handle)
    }

    /// Destroy a render pass once the current frame slot comes around again.
    pub fn destroy_render_pass(&mut self, handle: ResourceHandle) {
        self.handles.release(handle);
        let record = self.render_passes.remove(handle);
        self.defer(DeferredObject::RenderPass(record.raw));
    }

    /// Create a framebuffer binding `attachments` (colors first) to
    /// `render_pass`.
    ///
    /// # Panics
    ///
    /// Panics if the attachment count does not match the render pass layout.
    pub fn create_framebuffer(
        &mut self,
        render_pass: ResourceHandle,
        attachments: &[ResourceHandle],
        extent: Extent3d,
    ) -> Result<ResourceHandle, GraphicsError> {
        let pass = self.render_passes.get(&self.handles, render_pass);
        assert_eq!(
            pass.layout.attachment_count(),
            attachments.len(),
            "framebuffer attachment count does not match render pass layout"
        );
        let views: Vec<_> = attachments
            .iter()
            .map(|&texture| &self.textures.get(&self.handles, texture).raw)
            .collect();
        let raw = self.backend.create_framebuffer(&pass.raw, &views, extent)?;

        let handle = self.handles.allocate(ResourceKind::Framebuffer);
        self.framebuffers.insert(
            handle,
            FramebufferRecord {
                raw,
                render_pass,
                attachments: attachments.to_vec(),
                extent,
            },
        );
        Ok(handle)
    }

    /// Destroy a framebuffer once the current frame slot comes around again.
    pub fn destroy_framebuffer(&mut self, handle: ResourceHandle) {
        self.handles.release(handle);
        let record = self.framebuffers.remove(handle);
        self.defer(DeferredObject::Framebuffer(record.raw));
    }

    // ------------------------------------------------------------------
    // Descriptor sets
    // ------------------------------------------------------------------

    /// Create a descriptor set layout.
    pub fn create_descriptor_set_layout(
        &mut self,
        descriptor: &DescriptorSetLayoutDescriptor,
    ) -> Result<ResourceHandle, GraphicsError> {
        let raw = self.backend.create_descriptor_set_layout(descriptor)?;
        let handle = self.handles.allocate(ResourceKind::DescriptorSetLayout);
        self.set_layouts.insert(
            handle,
            DescriptorSetLayoutRecord {
                raw,
                descriptor: descriptor.clone(),
            },
        );
        Ok(handle)
    }

    /// Destroy a layout and every pooled set allocated from it.
    ///
    /// Sets still in use must be freed first; sets returned later are
    /// destroyed instead of pooled.
    pub fn destroy_descriptor_set_layout(&mut self, handle: ResourceHandle) {
        for set in self.free_sets.remove(&handle).unwrap_or_default() {
            self.destroy_descriptor_set(set);
        }
        self.handles.release(handle);
        let record = self.set_layouts.remove(handle);
        self.defer(DeferredObject::DescriptorSetLayout(record.raw));
    }

    /// Get a descriptor set of `layout` with `writes` applied.
    ///
    /// Reuses a pooled set when one is free.
    pub fn allocate_descriptor_set(
        &mut self,
        layout: ResourceHandle,
        writes: &[DescriptorWrite],
    ) -> Result<ResourceHandle, GraphicsError> {
        let pooled = self.free_sets.get_mut(&layout).and_then(Vec::pop);
        let set = match pooled {
            Some(set) => set,
            None => {
                let layout_record = self.set_layouts.get(&self.handles, layout);
                let raw = self.backend.create_descriptor_set(&layout_record.raw)?;
                let handle = self.handles.allocate(ResourceKind::DescriptorSet);
                self.descriptor_sets
                    .insert(handle, DescriptorSetRecord { raw, layout });
                handle
            }
        };
        self.update_descriptor_set(set, writes);
        Ok(set)
    }

    /// Write resources into a descriptor set.
    ///
    /// # Panics
    ///
    /// Panics if a write names a binding missing from the set's layout.
    pub fn update_descriptor_set(&mut self, set: ResourceHandle, writes: &[DescriptorWrite]) {
        if writes.is_empty() {
            return;
        }
        let record = self.descriptor_sets.get(&self.handles, set);
        let layout = self.set_layouts.get(&self.handles, record.layout);
        let raw_writes: Vec<RawDescriptorWrite<'_>> = writes
            .iter()
            .map(|write| {
                let binding = layout
                    .descriptor
                    .bindings
                    .iter()
                    .find(|b| b.binding == write.binding);
                let ty = match binding {
                    Some(binding) => binding.ty,
                    None => panic!(
                        "binding {} not present in descriptor set layout {:?}",
                        write.binding, record.layout
                    ),
                };
                let resource = match write.resource {
                    DescriptorResource::Buffer {
                        buffer,
                        offset,
                        size,
                    } => RawDescriptorResource::Buffer {
                        buffer: &self.buffers.get(&self.handles, buffer).raw,
                        offset,
                        size,
                    },
                    DescriptorResource::Texture(texture) => RawDescriptorResource::Texture(
                        &self.textures.get(&self.handles, texture).raw,
                    ),
                };
                RawDescriptorWrite {
                    binding: write.binding,
                    ty,
                    resource,
                }
            })
            .collect();
        self.backend.update_descriptor_set(&record.raw, &raw_writes);
    }

    /// Return a set to its layout's free list once the current frame slot
    /// comes around again. The handle stays valid and is reissued by
    /// [`allocate_descriptor_set`](Self::allocate_descriptor_set).
    pub fn free_descriptor_set(&mut self, set: ResourceHandle) {
        let layout = self.descriptor_sets.get(&self.handles, set).layout;
        self.frames
            .current_mut()
            .defer_descriptor_set_return(layout, set);
    }

    /// Destroy a descriptor set once the current frame slot comes around
    /// again.
    pub fn destroy_descriptor_set(&mut self, handle: ResourceHandle) {
        self.handles.release(handle);
        let record = self.descriptor_sets.remove(handle);
        self.defer(DeferredObject::DescriptorSet(record.raw));
    }

    /// Put sets whose frame slot came around back on their free lists.
    pub(crate) fn recycle_descriptor_sets(&mut self, returned: Vec<(ResourceHandle, ResourceHandle)>) {
        for (layout, set) in returned {
            if self.handles.is_valid(layout) {
                self.free_sets.entry(layout).or_default().push(set);
            } else {
                self.destroy_descriptor_set(set);
            }
        }
    }

    /// Number of pooled sets for `layout`.
    pub fn free_descriptor_sets(&self, layout: ResourceHandle) -> usize {
        self.free_sets.get(&layout).map_or(0, Vec::len)
    }

    // ------------------------------------------------------------------
    // Pipelines
    // ------------------------------------------------------------------

    /// Create a pipeline. Graphics pipelines need a compatible render pass.
    pub fn create_pipeline(
        &mut self,
        descriptor: &PipelineDescriptor,
        render_pass: Option<ResourceHandle>,
    ) -> Result<ResourceHandle, GraphicsError> {
        let layouts: Vec<_> = descriptor
            .set_layouts
            .iter()
            .map(|&layout| &self.set_layouts.get(&self.handles, layout).raw)
            .collect();
        let pass = render_pass.map(|pass| &self.render_passes.get(&self.handles, pass).raw);
        let raw = self.backend.create_pipeline(descriptor, &layouts, pass)?;

        let handle = self.handles.allocate(ResourceKind::Pipeline);
        self.pipelines.insert(
            handle,
            PipelineRecord {
                raw,
                descriptor: descriptor.clone(),
            },
        );
        log::debug!("Created pipeline {:?} ({:?})", handle, descriptor.label);
        Ok(handle)
    }

    /// Destroy a pipeline once the current frame slot comes around again.
    pub fn destroy_pipeline(&mut self, handle: ResourceHandle) {
        self.handles.release(handle);
        let record = self.pipelines.remove(handle);
        self.defer(DeferredObject::Pipeline(record.raw));
    }

    // ------------------------------------------------------------------
    // Scratch memory
    // ------------------------------------------------------------------

    /// Allocate `size` bytes of per-frame scratch memory.
    ///
    /// The allocation is valid until the current frame slot is begun again.
    /// Alignment is raised to the device's uniform offset alignment.
    pub fn scratch_alloc(
        &mut self,
        size: u64,
        alignment: u64,
    ) -> Result<ScratchAllocation, GraphicsError> {
        let alignment = alignment.max(self.capabilities.min_uniform_buffer_offset_alignment);
        if let Some(allocation) = self.frames.current_mut().scratch_mut().allocate(size, alignment)
        {
            return Ok(allocation);
        }

        let capacity = self.frames.current().scratch().required_chunk_size(size);
        let descriptor = BufferDescriptor::new(
            capacity,
            BufferUsage::UNIFORM
                | BufferUsage::STORAGE
                | BufferUsage::MAP_WRITE
                | BufferUsage::COPY_SRC,
        )
        .with_label("scratch");
        let chunk = self.create_buffer(&descriptor)?;
        log::debug!(
            "Frame {}: new scratch chunk of {} bytes",
            self.frames.index(),
            capacity
        );

        let scratch = self.frames.current_mut().scratch_mut();
        scratch.push_chunk(chunk, capacity);
        scratch.allocate(size, alignment).ok_or_else(|| {
            GraphicsError::Internal(format!("scratch chunk too small for {} bytes", size))
        })
    }

    /// Allocate scratch memory and fill it with `data`.
    pub fn scratch_write(
        &mut self,
        data: &[u8],
        alignment: u64,
    ) -> Result<ScratchAllocation, GraphicsError> {
        let allocation = self.scratch_alloc(data.len() as u64, alignment)?;
        self.write_buffer(allocation.buffer, allocation.offset, data)?;
        Ok(allocation)
    }
}

impl std::fmt::Debug for GpuResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuResources")
            .field("backend", &self.backend.name())
            .field("textures", &self.textures.len())
            .field("buffers", &self.buffers.len())
            .field("pipelines", &self.pipelines.len())
            .field("frame", &self.frames.index())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::{DummyBackend, DummyObjectKind};
    use crate::types::{
        DescriptorBinding, DescriptorType, ShaderStages, TextureFormat, TextureUsage,
    };

    fn resources() -> (Arc<DummyBackend>, GpuResources) {
        let backend = Arc::new(DummyBackend::new());
        let resources = GpuResources::new(backend.clone(), &RenderContextConfig::default());
        (backend, resources)
    }

    #[test]
    fn test_destroy_is_deferred() {
        let (backend, mut resources) = resources();
        let texture = resources
            .create_texture(&TextureDescriptor::new_2d(
                4,
                4,
                TextureFormat::Rgba8Unorm,
                TextureUsage::TEXTURE_BINDING,
            ))
            .unwrap();
        resources.destroy_texture(texture);

        assert!(!resources.is_valid(texture));
        assert_eq!(resources.live_objects(ResourceKind::Texture), 0);
        assert_eq!(backend.live_objects(DummyObjectKind::Texture), 1);
        assert_eq!(resources.pending_destructions(), 1);
    }

    #[test]
    fn test_unsupported_format_rejected() {
        let (_backend, mut resources) = resources();
        let result = resources.create_texture(&TextureDescriptor::new_2d(
            4,
            4,
            TextureFormat::Depth32Float,
            TextureUsage::STORAGE_BINDING,
        ));
        assert!(matches!(result, Err(GraphicsError::FeatureNotSupported(_))));
    }

    #[test]
    fn test_write_requires_host_visible() {
        let (_backend, mut resources) = resources();
        let buffer = resources
            .create_buffer(&BufferDescriptor::new(64, BufferUsage::VERTEX))
            .unwrap();
        assert!(matches!(
            resources.write_buffer(buffer, 0, &[0; 4]),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_descriptor_sets_are_pooled() {
        let (_backend, mut resources) = resources();
        let layout = resources
            .create_descriptor_set_layout(&DescriptorSetLayoutDescriptor::new(vec![
                DescriptorBinding::new(0, DescriptorType::UniformBuffer, ShaderStages::VERTEX),
            ]))
            .unwrap();
        let buffer = resources
            .create_buffer(&BufferDescriptor::new(256, BufferUsage::UNIFORM))
            .unwrap();

        let set = resources
            .allocate_descriptor_set(layout, &[DescriptorWrite::buffer(0, buffer, 0, 256)])
            .unwrap();
        resources.free_descriptor_set(set);
        assert_eq!(resources.free_descriptor_sets(layout), 0);

        let returned = resources
            .frames
            .current_mut()
            .begin(resources.backend.as_ref())
            .unwrap();
        resources.recycle_descriptor_sets(returned);
        assert_eq!(resources.free_descriptor_sets(layout), 1);

        let again = resources.allocate_descriptor_set(layout, &[]).unwrap();
        assert_eq!(again, set);
    }

    #[test]
    #[should_panic(expected = "not present in descriptor set layout")]
    fn test_unknown_binding_panics() {
        let (_backend, mut resources) = resources();
        let layout = resources
            .create_descriptor_set_layout(&DescriptorSetLayoutDescriptor::new(vec![]))
            .unwrap();
        let buffer = resources
            .create_buffer(&BufferDescriptor::new(16, BufferUsage::UNIFORM))
            .unwrap();
        resources
            .allocate_descriptor_set(layout, &[DescriptorWrite::buffer(3, buffer, 0, 16)])
            .unwrap();
    }

    #[test]
    fn test_scratch_grows_by_chunks() {
        let (_backend, mut resources) = resources();
        let a = resources.scratch_alloc(16, 16).unwrap();
        let b = resources.scratch_alloc(16, 16).unwrap();
        assert_eq!(a.buffer, b.buffer);
        assert_eq!(b.offset, 256);

        let big = resources.scratch_alloc(4 * 1024 * 1024, 16).unwrap();
        assert_ne!(big.buffer, a.buffer);
        assert_eq!(resources.frames.current().scratch().chunk_count(), 2);
    }
}
