//! Stored GPU resources.
//!
//! Every GPU object the renderer creates is named by a [`ResourceHandle`] and
//! kept as a record in a per-kind [`SlotStore`](ringframe_core::SlotStore):
//! - [`TextureRecord`] - texture plus its last synchronization state
//! - [`BufferRecord`] - buffer plus its last synchronization state
//! - [`RenderPassRecord`], [`FramebufferRecord`] - content-cached pass objects
//! - [`DescriptorSetLayoutRecord`], [`DescriptorSetRecord`] - binding objects
//! - [`PipelineRecord`] - compute and graphics pipelines
//! - [`SwapchainRecord`] - swapchain and its image handles
//!
//! Handles are plain values. Destroying one releases the id into the handle
//! allocator's delay ring and defers the raw object to the current frame slot.

mod buffer;
mod scratch;
mod texture;

pub use buffer::BufferRecord;
pub use scratch::{ScratchAllocation, ScratchAllocator};
pub use texture::TextureRecord;

pub(crate) use scratch::align_up;

use ringframe_core::{Handle, HandleKind};

use crate::backend::{
    GpuDescriptorSet, GpuDescriptorSetLayout, GpuFramebuffer, GpuPipeline, GpuRenderPass,
    GpuSwapchain,
};
use crate::swapchain::SwapchainDescriptor;
use crate::types::{DescriptorSetLayoutDescriptor, Extent3d, PipelineDescriptor, RenderPassLayout};

/// Kind of object a [`ResourceHandle`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Texture,
    Buffer,
    RenderPass,
    Framebuffer,
    DescriptorSetLayout,
    DescriptorSet,
    Pipeline,
    Swapchain,
}

impl ResourceKind {
    /// Every kind, in index order.
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Texture,
        ResourceKind::Buffer,
        ResourceKind::RenderPass,
        ResourceKind::Framebuffer,
        ResourceKind::DescriptorSetLayout,
        ResourceKind::DescriptorSet,
        ResourceKind::Pipeline,
        ResourceKind::Swapchain,
    ];
}

impl HandleKind for ResourceKind {
    const COUNT: usize = 8;

    fn index(self) -> usize {
        self as usize
    }
}

/// Handle to any stored GPU resource.
pub type ResourceHandle = Handle<ResourceKind>;

/// A render pass created for one attachment layout.
#[derive(Debug)]
pub struct RenderPassRecord {
    pub(crate) raw: GpuRenderPass,
    pub(crate) layout: RenderPassLayout,
}

impl RenderPassRecord {
    /// Get the raw backend object.
    pub fn raw(&self) -> &GpuRenderPass {
        &self.raw
    }

    /// Attachment layout the pass was created for.
    pub fn layout(&self) -> &RenderPassLayout {
        &self.layout
    }
}

/// A framebuffer binding concrete textures to a render pass.
#[derive(Debug)]
pub struct FramebufferRecord {
    pub(crate) raw: GpuFramebuffer,
    pub(crate) render_pass: ResourceHandle,
    pub(crate) attachments: Vec<ResourceHandle>,
    pub(crate) extent: Extent3d,
}

impl FramebufferRecord {
    /// Get the raw backend object.
    pub fn raw(&self) -> &GpuFramebuffer {
        &self.raw
    }

    /// Render pass the framebuffer is compatible with.
    pub fn render_pass(&self) -> ResourceHandle {
        self.render_pass
    }

    /// Attached textures, colors first.
    pub fn attachments(&self) -> &[ResourceHandle] {
        &self.attachments
    }

    /// Framebuffer size.
    pub fn extent(&self) -> Extent3d {
        self.extent
    }
}

/// A descriptor set layout.
#[derive(Debug)]
pub struct DescriptorSetLayoutRecord {
    pub(crate) raw: GpuDescriptorSetLayout,
    pub(crate) descriptor: DescriptorSetLayoutDescriptor,
}

impl DescriptorSetLayoutRecord {
    /// Get the raw backend object.
    pub fn raw(&self) -> &GpuDescriptorSetLayout {
        &self.raw
    }

    /// Get the layout descriptor.
    pub fn descriptor(&self) -> &DescriptorSetLayoutDescriptor {
        &self.descriptor
    }
}

/// A descriptor set allocated for one layout.
#[derive(Debug)]
pub struct DescriptorSetRecord {
    pub(crate) raw: GpuDescriptorSet,
    pub(crate) layout: ResourceHandle,
}

impl DescriptorSetRecord {
    /// Get the raw backend object.
    pub fn raw(&self) -> &GpuDescriptorSet {
        &self.raw
    }

    /// Layout the set was allocated for.
    pub fn layout(&self) -> ResourceHandle {
        self.layout
    }
}

/// A compute or graphics pipeline.
#[derive(Debug)]
pub struct PipelineRecord {
    pub(crate) raw: GpuPipeline,
    pub(crate) descriptor: PipelineDescriptor,
}

impl PipelineRecord {
    /// Get the raw backend object.
    pub fn raw(&self) -> &GpuPipeline {
        &self.raw
    }

    /// Get the pipeline descriptor.
    pub fn descriptor(&self) -> &PipelineDescriptor {
        &self.descriptor
    }
}

/// A swapchain and the texture handles wrapping its images.
#[derive(Debug)]
pub struct SwapchainRecord {
    pub(crate) raw: GpuSwapchain,
    pub(crate) descriptor: SwapchainDescriptor,
    pub(crate) images: Vec<ResourceHandle>,
}

impl SwapchainRecord {
    /// Get the raw backend object.
    pub fn raw(&self) -> &GpuSwapchain {
        &self.raw
    }

    /// Parameters the swapchain was created with.
    pub fn descriptor(&self) -> &SwapchainDescriptor {
        &self.descriptor
    }

    /// Texture handles of the swapchain images, by image index.
    pub fn images(&self) -> &[ResourceHandle] {
        &self.images
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_indices_are_dense() {
        for (i, kind) in ResourceKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        assert_eq!(ResourceKind::ALL.len(), ResourceKind::COUNT);
    }
}
