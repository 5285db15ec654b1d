//! Raw backend objects.
//!
//! These own API-level objects but never free them on drop. Destruction is
//! always explicit through a `GpuBackend::destroy_*` call, which the frame
//! ring defers until the GPU is done with the object.

#[cfg(feature = "vulkan-backend")]
use ash::vk;
#[cfg(feature = "vulkan-backend")]
use gpu_allocator::vulkan::Allocation;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::{Extent3d, TextureFormat};

/// Raw handle value for logging and the dummy backend's event log.
#[cfg(feature = "vulkan-backend")]
fn vk_raw<H: vk::Handle>(handle: H) -> u64 {
    handle.as_raw()
}

// ============================================================================
// Memory-backed objects
// ============================================================================

/// GPU texture with its default view.
#[allow(clippy::large_enum_variant)]
pub enum GpuTexture {
    /// Dummy backend texture.
    Dummy {
        /// Unique id within the dummy backend.
        id: u64,
        /// Texture size.
        extent: Extent3d,
        /// Texture format.
        format: TextureFormat,
        /// Mip level count.
        mip_level_count: u32,
    },
    /// Vulkan image and view.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        /// Image handle.
        image: vk::Image,
        /// View over every mip and layer.
        view: vk::ImageView,
        /// Backing memory; `None` for swapchain images.
        allocation: Option<Allocation>,
        /// Aspect mask used in barriers and copies.
        aspect: vk::ImageAspectFlags,
        /// Image extent.
        extent: vk::Extent3D,
        /// Mip level count.
        mip_levels: u32,
    },
}

impl GpuTexture {
    /// Raw identifier, unique among live textures of the backend.
    pub fn raw_id(&self) -> u64 {
        match self {
            Self::Dummy { id, .. } => *id,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { image, .. } => vk_raw(*image),
        }
    }
}

impl std::fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy { id, extent, .. } => f
                .debug_struct("GpuTexture::Dummy")
                .field("id", id)
                .field("extent", extent)
                .finish_non_exhaustive(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { image, extent, .. } => f
                .debug_struct("GpuTexture::Vulkan")
                .field("image", image)
                .field("extent", extent)
                .finish_non_exhaustive(),
        }
    }
}

/// GPU buffer.
#[allow(clippy::large_enum_variant)]
pub enum GpuBuffer {
    /// Dummy backend buffer.
    Dummy {
        /// Unique id within the dummy backend.
        id: u64,
        /// Size in bytes.
        size: u64,
    },
    /// Vulkan buffer.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        /// Buffer handle.
        buffer: vk::Buffer,
        /// Backing memory.
        allocation: Option<Allocation>,
        /// Size in bytes.
        size: u64,
    },
}

impl GpuBuffer {
    /// Raw identifier, unique among live buffers of the backend.
    pub fn raw_id(&self) -> u64 {
        match self {
            Self::Dummy { id, .. } => *id,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { buffer, .. } => vk_raw(*buffer),
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        match self {
            Self::Dummy { size, .. } => *size,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { size, .. } => *size,
        }
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy { id, size } => f
                .debug_struct("GpuBuffer::Dummy")
                .field("id", id)
                .field("size", size)
                .finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { buffer, size, .. } => f
                .debug_struct("GpuBuffer::Vulkan")
                .field("buffer", buffer)
                .field("size", size)
                .finish_non_exhaustive(),
        }
    }
}

// ============================================================================
// Plain API objects
// ============================================================================

/// Render pass object.
#[derive(Debug)]
pub enum GpuRenderPass {
    /// Dummy backend render pass.
    Dummy {
        /// Unique id within the dummy backend.
        id: u64,
    },
    /// Vulkan render pass.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vk::RenderPass),
}

/// Framebuffer object.
#[derive(Debug)]
pub enum GpuFramebuffer {
    /// Dummy backend framebuffer.
    Dummy {
        /// Unique id within the dummy backend.
        id: u64,
    },
    /// Vulkan framebuffer.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vk::Framebuffer),
}

/// Descriptor set layout.
#[derive(Debug)]
pub enum GpuDescriptorSetLayout {
    /// Dummy backend layout.
    Dummy {
        /// Unique id within the dummy backend.
        id: u64,
    },
    /// Vulkan layout with the pool sizes one set of it needs.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        /// Layout handle.
        layout: vk::DescriptorSetLayout,
        /// Pool sizes for one set.
        pool_sizes: Vec<vk::DescriptorPoolSize>,
    },
}

/// Descriptor set.
#[derive(Debug)]
pub enum GpuDescriptorSet {
    /// Dummy backend set.
    Dummy {
        /// Unique id within the dummy backend.
        id: u64,
    },
    /// Vulkan set allocated from its own small pool.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        /// Set handle.
        set: vk::DescriptorSet,
        /// Pool the set was allocated from.
        pool: vk::DescriptorPool,
    },
}

/// Compute or graphics pipeline.
#[derive(Debug)]
pub enum GpuPipeline {
    /// Dummy backend pipeline.
    Dummy {
        /// Unique id within the dummy backend.
        id: u64,
        /// Compute pipelines bind to the compute bind point.
        compute: bool,
    },
    /// Vulkan pipeline and its layout.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        /// Pipeline handle.
        pipeline: vk::Pipeline,
        /// Pipeline layout.
        layout: vk::PipelineLayout,
        /// Bind point.
        bind_point: vk::PipelineBindPoint,
    },
}

/// CPU-visible completion signal.
#[derive(Debug)]
pub enum GpuFence {
    /// Dummy fence, signaled on submit.
    Dummy {
        /// Unique id within the dummy backend.
        id: u64,
        /// Signal state.
        signaled: Arc<AtomicBool>,
    },
    /// Vulkan fence.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vk::Fence),
}

impl GpuFence {
    /// Raw identifier.
    pub fn raw_id(&self) -> u64 {
        match self {
            Self::Dummy { id, .. } => *id,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(fence) => vk_raw(*fence),
        }
    }

    pub(crate) fn dummy_set(&self, value: bool) {
        match self {
            Self::Dummy { signaled, .. } => signaled.store(value, Ordering::Release),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(_) => {}
        }
    }

    pub(crate) fn dummy_is_set(&self) -> bool {
        match self {
            Self::Dummy { signaled, .. } => signaled.load(Ordering::Acquire),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(_) => false,
        }
    }
}

/// GPU-to-GPU signal between submissions.
#[derive(Debug)]
pub enum GpuSemaphore {
    /// Dummy semaphore.
    Dummy {
        /// Unique id within the dummy backend.
        id: u64,
    },
    /// Vulkan binary semaphore.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vk::Semaphore),
}

impl GpuSemaphore {
    /// Raw identifier.
    pub fn raw_id(&self) -> u64 {
        match self {
            Self::Dummy { id } => *id,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(semaphore) => vk_raw(*semaphore),
        }
    }
}

/// Command pool tied to one queue family.
#[derive(Debug)]
pub enum GpuCommandPool {
    /// Dummy pool.
    Dummy {
        /// Unique id within the dummy backend.
        id: u64,
    },
    /// Vulkan command pool.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vk::CommandPool),
}

/// Primary command buffer allocated from a [`GpuCommandPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuCommandBuffer {
    /// Dummy command buffer.
    Dummy {
        /// Unique id within the dummy backend.
        id: u64,
    },
    /// Vulkan command buffer.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vk::CommandBuffer),
}

impl GpuCommandBuffer {
    /// Raw identifier.
    pub fn raw_id(&self) -> u64 {
        match self {
            Self::Dummy { id } => *id,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(cmd) => vk_raw(*cmd),
        }
    }
}

/// Swapchain bound to the backend's surface.
#[derive(Debug)]
pub enum GpuSwapchain {
    /// Dummy swapchain cycling through its images.
    Dummy {
        /// Unique id within the dummy backend.
        id: u64,
        /// Number of images.
        image_count: u32,
        /// Image size.
        extent: Extent3d,
        /// Image format.
        format: TextureFormat,
    },
    /// Vulkan swapchain.
    #[cfg(feature = "vulkan-backend")]
    Vulkan {
        /// Swapchain handle.
        swapchain: vk::SwapchainKHR,
        /// Image format.
        format: vk::Format,
        /// Image size.
        extent: vk::Extent2D,
    },
}

impl GpuSwapchain {
    /// Raw identifier.
    pub fn raw_id(&self) -> u64 {
        match self {
            Self::Dummy { id, .. } => *id,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { swapchain, .. } => vk_raw(*swapchain),
        }
    }
}

impl GpuRenderPass {
    /// Raw identifier.
    pub fn raw_id(&self) -> u64 {
        match self {
            Self::Dummy { id } => *id,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(render_pass) => vk_raw(*render_pass),
        }
    }
}

impl GpuFramebuffer {
    /// Raw identifier.
    pub fn raw_id(&self) -> u64 {
        match self {
            Self::Dummy { id } => *id,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(framebuffer) => vk_raw(*framebuffer),
        }
    }
}

impl GpuDescriptorSetLayout {
    /// Raw identifier.
    pub fn raw_id(&self) -> u64 {
        match self {
            Self::Dummy { id } => *id,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { layout, .. } => vk_raw(*layout),
        }
    }
}

impl GpuDescriptorSet {
    /// Raw identifier.
    pub fn raw_id(&self) -> u64 {
        match self {
            Self::Dummy { id } => *id,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { set, .. } => vk_raw(*set),
        }
    }
}

impl GpuPipeline {
    /// Raw identifier.
    pub fn raw_id(&self) -> u64 {
        match self {
            Self::Dummy { id, .. } => *id,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan { pipeline, .. } => vk_raw(*pipeline),
        }
    }
}

impl GpuCommandPool {
    /// Raw identifier.
    pub fn raw_id(&self) -> u64 {
        match self {
            Self::Dummy { id } => *id,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(pool) => vk_raw(*pool),
        }
    }
}

static_assertions::assert_impl_all!(GpuTexture: Send, Sync);
static_assertions::assert_impl_all!(GpuBuffer: Send, Sync);
static_assertions::assert_impl_all!(GpuFence: Send, Sync);
static_assertions::assert_impl_all!(GpuCommandBuffer: Send, Sync);
