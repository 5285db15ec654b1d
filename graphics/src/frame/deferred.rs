//! Objects waiting for their frame slot to come around again.

use crate::backend::{
    GpuBackend, GpuBuffer, GpuDescriptorSet, GpuDescriptorSetLayout, GpuFramebuffer, GpuPipeline,
    GpuRenderPass, GpuSemaphore, GpuSwapchain, GpuTexture,
};

/// A raw backend object pending destruction.
///
/// The object was last used by work submitted in the frame slot it was
/// deferred into, so it is destroyed once that slot's fences have signaled.
#[derive(Debug)]
pub enum DeferredObject {
    Texture(GpuTexture),
    Buffer(GpuBuffer),
    RenderPass(GpuRenderPass),
    Framebuffer(GpuFramebuffer),
    DescriptorSetLayout(GpuDescriptorSetLayout),
    DescriptorSet(GpuDescriptorSet),
    Pipeline(GpuPipeline),
    Semaphore(GpuSemaphore),
    Swapchain(GpuSwapchain),
}

impl DeferredObject {
    /// Short name of the object kind, for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Texture(_) => "texture",
            Self::Buffer(_) => "buffer",
            Self::RenderPass(_) => "render pass",
            Self::Framebuffer(_) => "framebuffer",
            Self::DescriptorSetLayout(_) => "descriptor set layout",
            Self::DescriptorSet(_) => "descriptor set",
            Self::Pipeline(_) => "pipeline",
            Self::Semaphore(_) => "semaphore",
            Self::Swapchain(_) => "swapchain",
        }
    }

    /// Destroy the object immediately.
    ///
    /// The caller must ensure the GPU is no longer using it.
    pub fn destroy(self, backend: &dyn GpuBackend) {
        match self {
            Self::Texture(texture) => backend.destroy_texture(texture),
            Self::Buffer(buffer) => backend.destroy_buffer(buffer),
            Self::RenderPass(render_pass) => backend.destroy_render_pass(render_pass),
            Self::Framebuffer(framebuffer) => backend.destroy_framebuffer(framebuffer),
            Self::DescriptorSetLayout(layout) => backend.destroy_descriptor_set_layout(layout),
            Self::DescriptorSet(set) => backend.destroy_descriptor_set(set),
            Self::Pipeline(pipeline) => backend.destroy_pipeline(pipeline),
            Self::Semaphore(semaphore) => backend.destroy_semaphore(semaphore),
            Self::Swapchain(swapchain) => backend.destroy_swapchain(swapchain),
        }
    }
}
