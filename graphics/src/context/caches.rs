//! Temporal caches backing the render graph.

use ringframe_core::{CacheStats, ContentCache, TemporalPool};

use super::GpuResources;
use crate::error::GraphicsError;
use crate::resources::ResourceHandle;
use crate::types::{
    BufferDescriptor, DescriptorWrite, Extent3d, RenderPassLayout, TextureDescriptor,
};

/// Content key of a cached framebuffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FramebufferKey {
    /// Render pass the framebuffer is compatible with.
    pub render_pass: ResourceHandle,
    /// Attached textures, colors first.
    pub attachments: Vec<ResourceHandle>,
    /// Framebuffer size.
    pub extent: Extent3d,
}

/// Content key of a cached descriptor set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorSetKey {
    /// Layout of the set.
    pub layout: ResourceHandle,
    /// Writes applied to a fresh set.
    pub writes: Vec<DescriptorWrite>,
}

type Pool<K> = TemporalPool<K, ResourceHandle, GpuResources, GraphicsError>;
type Cache<K> = ContentCache<K, ResourceHandle, GpuResources, GraphicsError>;

/// Snapshot of every cache's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    /// Graph-owned texture pool.
    pub textures: CacheStats,
    /// Graph-owned buffer pool.
    pub buffers: CacheStats,
    /// Render passes by attachment layout.
    pub render_passes: CacheStats,
    /// Framebuffers by render pass and attachments.
    pub framebuffers: CacheStats,
    /// Descriptor sets by layout and writes.
    pub descriptor_sets: CacheStats,
}

/// The ring-aged caches the render graph resolves objects through.
///
/// All of them age together: [`advance`](Self::advance) is called once per
/// graph clean-up.
pub struct GraphCaches {
    pub(crate) textures: Pool<TextureDescriptor>,
    pub(crate) buffers: Pool<BufferDescriptor>,
    pub(crate) render_passes: Cache<RenderPassLayout>,
    pub(crate) framebuffers: Cache<FramebufferKey>,
    pub(crate) descriptor_sets: Cache<DescriptorSetKey>,
}

impl GraphCaches {
    /// Create the caches with `ring_depth` slots each.
    pub fn new(ring_depth: usize) -> Self {
        Self {
            textures: TemporalPool::new(
                "texture pool",
                ring_depth,
                Box::new(|res: &mut GpuResources, desc: &TextureDescriptor| {
                    res.create_texture(desc)
                }),
                Box::new(|res: &mut GpuResources, texture: ResourceHandle| {
                    res.destroy_texture(texture)
                }),
            ),
            buffers: TemporalPool::new(
                "buffer pool",
                ring_depth,
                Box::new(|res: &mut GpuResources, desc: &BufferDescriptor| {
                    res.create_buffer(desc)
                }),
                Box::new(|res: &mut GpuResources, buffer: ResourceHandle| {
                    res.destroy_buffer(buffer)
                }),
            ),
            render_passes: ContentCache::new(
                "render pass cache",
                ring_depth,
                Box::new(|res: &mut GpuResources, layout: &RenderPassLayout| {
                    res.create_render_pass(layout)
                }),
                Box::new(|res: &mut GpuResources, pass: ResourceHandle| {
                    res.destroy_render_pass(pass)
                }),
            ),
            framebuffers: ContentCache::new(
                "framebuffer cache",
                ring_depth,
                Box::new(|res: &mut GpuResources, key: &FramebufferKey| {
                    res.create_framebuffer(key.render_pass, &key.attachments, key.extent)
                }),
                Box::new(|res: &mut GpuResources, framebuffer: ResourceHandle| {
                    res.destroy_framebuffer(framebuffer)
                }),
            ),
            descriptor_sets: ContentCache::new(
                "descriptor set cache",
                ring_depth,
                Box::new(|res: &mut GpuResources, key: &DescriptorSetKey| {
                    res.allocate_descriptor_set(key.layout, &key.writes)
                }),
                Box::new(|res: &mut GpuResources, set: ResourceHandle| {
                    res.free_descriptor_set(set)
                }),
            ),
        }
    }

    /// Age every cache by one frame.
    pub fn advance(&mut self, resources: &mut GpuResources) {
        self.textures.advance(resources);
        self.buffers.advance(resources);
        self.descriptor_sets.advance(resources);
        self.framebuffers.advance(resources);
        self.render_passes.advance(resources);
    }

    /// Destroy every cached object. Only valid once the GPU is idle.
    pub fn reset(&mut self, resources: &mut GpuResources) {
        self.descriptor_sets.reset(resources);
        self.framebuffers.reset(resources);
        self.render_passes.reset(resources);
        self.textures.reset(resources);
        self.buffers.reset(resources);
    }

    /// Counters of every cache.
    pub fn statistics(&self) -> CacheStatistics {
        CacheStatistics {
            textures: self.textures.stats(),
            buffers: self.buffers.stats(),
            render_passes: self.render_passes.stats(),
            framebuffers: self.framebuffers.stats(),
            descriptor_sets: self.descriptor_sets.stats(),
        }
    }
}

impl std::fmt::Debug for GraphCaches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphCaches")
            .field("textures", &self.textures)
            .field("buffers", &self.buffers)
            .field("render_passes", &self.render_passes)
            .field("framebuffers", &self.framebuffers)
            .field("descriptor_sets", &self.descriptor_sets)
            .finish()
    }
}
