//! Swapchain management.
//!
//! # Overview
//!
//! - [`SwapchainDescriptor`] - size, format, image count and present mode
//! - [`PresentMode`] - controls vsync behavior
//! - [`SwapchainImage`] - an acquired image plus the semaphores that order it
//! - [`AcquiredImage`] - result of [`RenderContext::acquire_next_image`]
//!
//! Swapchain images are wrapped as ordinary texture handles so the render
//! graph can import them. The acquire semaphore is taken from the current
//! frame slot; [`RenderGraph::import_swapchain_image`](crate::RenderGraph::import_swapchain_image)
//! makes the first pass touching the image wait on it and the last pass
//! signal the present semaphore.
//!
//! # Example
//!
//! ```ignore
//! let swapchain = ctx.create_swapchain(&SwapchainDescriptor::new(1280, 720))?;
//!
//! ctx.begin_frame()?;
//! match ctx.acquire_next_image(swapchain)? {
//!     AcquiredImage::Image(image) => {
//!         graph.import_swapchain_image("backbuffer", &image);
//!         // ... passes ...
//!         if ctx.present(&image)? {
//!             ctx.resize_swapchain(swapchain, new_extent)?;
//!         }
//!     }
//!     AcquiredImage::OutOfDate => ctx.resize_swapchain(swapchain, new_extent)?,
//! }
//! ctx.end_frame()?;
//! ```

use crate::backend::AcquireOutcome;
use crate::context::RenderContext;
use crate::error::GraphicsError;
use crate::frame::{DeferredObject, SemaphoreId};
use crate::resources::{ResourceHandle, ResourceKind, SwapchainRecord, TextureRecord};
use crate::sync::ResourceState;
use crate::types::{Extent3d, TextureDescriptor, TextureFormat, TextureUsage};

/// Presentation mode for the swapchain.
///
/// Controls how frames are synchronized with the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PresentMode {
    /// No synchronization. May cause tearing but has lowest latency.
    Immediate,
    /// Triple buffering. Low latency without tearing.
    Mailbox,
    /// VSync enabled. No tearing, but may have higher latency.
    #[default]
    Fifo,
    /// VSync with relaxed timing. May tear if a frame is late.
    FifoRelaxed,
}

/// Parameters of a swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapchainDescriptor {
    /// Size of the images.
    pub extent: Extent3d,
    /// Image format.
    pub format: TextureFormat,
    /// Requested number of images. Backends may create more.
    pub image_count: u32,
    /// Presentation mode (vsync behavior).
    pub present_mode: PresentMode,
}

impl SwapchainDescriptor {
    /// Create a descriptor with the default format and FIFO presentation.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: Extent3d::new_2d(width, height),
            format: TextureFormat::Bgra8UnormSrgb,
            image_count: 3,
            present_mode: PresentMode::Fifo,
        }
    }

    /// Set the image format.
    pub fn with_format(mut self, format: TextureFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the requested image count.
    pub fn with_image_count(mut self, count: u32) -> Self {
        self.image_count = count;
        self
    }

    /// Set the presentation mode.
    pub fn with_present_mode(mut self, present_mode: PresentMode) -> Self {
        self.present_mode = present_mode;
        self
    }

    /// Descriptor of the textures wrapping the swapchain images.
    pub fn image_descriptor(&self) -> TextureDescriptor {
        TextureDescriptor::new_2d(
            self.extent.width,
            self.extent.height,
            self.format,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_DST,
        )
        .with_label("swapchain image")
    }
}

/// An image acquired for the current frame.
///
/// Only valid until [`RenderContext::end_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainImage {
    /// Swapchain the image belongs to.
    pub swapchain: ResourceHandle,
    /// Image index within the swapchain.
    pub index: u32,
    /// Texture handle wrapping the image.
    pub texture: ResourceHandle,
    /// Signaled by the presentation engine when the image can be written.
    pub acquire: SemaphoreId,
    /// Signaled by the last pass writing the image; waited on by present.
    pub present: SemaphoreId,
    /// The swapchain no longer matches the surface exactly.
    pub suboptimal: bool,
}

/// Result of [`RenderContext::acquire_next_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquiredImage {
    /// An image is ready to be rendered to.
    Image(SwapchainImage),
    /// The swapchain must be resized before rendering to it.
    OutOfDate,
}

impl RenderContext {
    /// Create a swapchain and wrap its images as textures.
    pub fn create_swapchain(
        &mut self,
        descriptor: &SwapchainDescriptor,
    ) -> Result<ResourceHandle, GraphicsError> {
        let resources = &mut self.resources;
        let raw = resources.backend.create_swapchain(descriptor, None)?;
        let images = resources.wrap_swapchain_images(&raw, descriptor)?;
        log::debug!(
            "Created {}x{} swapchain with {} images",
            descriptor.extent.width,
            descriptor.extent.height,
            images.len()
        );

        let handle = resources.handles.allocate(ResourceKind::Swapchain);
        resources.swapchains.insert(
            handle,
            SwapchainRecord {
                raw,
                descriptor: *descriptor,
                images,
            },
        );
        Ok(handle)
    }

    /// Get the swapchain record.
    pub fn swapchain(&self, handle: ResourceHandle) -> &SwapchainRecord {
        self.resources
            .swapchains
            .get(&self.resources.handles, handle)
    }

    /// Acquire the next image of `swapchain` for the current frame.
    ///
    /// # Panics
    ///
    /// Panics if called outside `begin_frame`/`end_frame`.
    pub fn acquire_next_image(
        &mut self,
        swapchain: ResourceHandle,
    ) -> Result<AcquiredImage, GraphicsError> {
        assert!(self.in_frame, "acquire_next_image outside of a frame");
        let resources = &mut self.resources;
        let backend = resources.backend.clone();
        let frame = resources.frames.current_mut();
        let acquire = frame.semaphore(backend.as_ref())?;
        let record = resources
            .swapchains
            .get(&resources.handles, swapchain);

        let outcome =
            backend.acquire_next_image(&record.raw, frame.semaphore_ref(acquire))?;
        match outcome {
            AcquireOutcome::Acquired { index, suboptimal } => {
                if suboptimal {
                    log::warn!("Swapchain image {} acquired suboptimal", index);
                }
                let texture = record.images[index as usize];
                let present = frame.semaphore(backend.as_ref())?;
                Ok(AcquiredImage::Image(SwapchainImage {
                    swapchain,
                    index,
                    texture,
                    acquire,
                    present,
                    suboptimal,
                }))
            }
            AcquireOutcome::OutOfDate => {
                log::debug!("Swapchain out of date on acquire");
                Ok(AcquiredImage::OutOfDate)
            }
        }
    }

    /// Present an image once its present semaphore is signaled.
    ///
    /// Returns `true` if the swapchain needs to be resized.
    pub fn present(&mut self, image: &SwapchainImage) -> Result<bool, GraphicsError> {
        ringframe_core::profile_scope!("present");
        let resources = &mut self.resources;
        let record = resources.swapchains.get(&resources.handles, image.swapchain);
        let wait = resources.frames.current().semaphore_ref(image.present);
        let needs_resize = resources.backend.present(&record.raw, image.index, wait)?;

        // The presentation engine hands the image back with undefined contents.
        resources
            .textures
            .get_mut(&resources.handles, image.texture)
            .state = ResourceState::UNDEFINED;
        Ok(needs_resize || image.suboptimal)
    }

    /// Recreate `swapchain` at a new size.
    ///
    /// The old swapchain and its image textures are destroyed once the
    /// current frame slot comes around again. The handle stays valid; the
    /// image texture handles change.
    pub fn resize_swapchain(
        &mut self,
        swapchain: ResourceHandle,
        extent: Extent3d,
    ) -> Result<(), GraphicsError> {
        let resources = &mut self.resources;
        let record = resources.swapchains.get(&resources.handles, swapchain);
        let descriptor = SwapchainDescriptor {
            extent,
            ..record.descriptor
        };
        let raw = resources
            .backend
            .create_swapchain(&descriptor, Some(&record.raw))?;
        let images = resources.wrap_swapchain_images(&raw, &descriptor)?;
        log::debug!(
            "Resized swapchain {:?} to {}x{}",
            swapchain,
            extent.width,
            extent.height
        );

        let record = resources.swapchains.get_mut(&resources.handles, swapchain);
        let old_raw = std::mem::replace(&mut record.raw, raw);
        let old_images = std::mem::replace(&mut record.images, images);
        record.descriptor = descriptor;

        for image in old_images {
            resources.destroy_texture(image);
        }
        resources
            .frames
            .current_mut()
            .defer(DeferredObject::Swapchain(old_raw));
        Ok(())
    }

    /// Destroy a swapchain and its image textures.
    pub fn destroy_swapchain(&mut self, swapchain: ResourceHandle) {
        let resources = &mut self.resources;
        resources.handles.release(swapchain);
        let record = resources.swapchains.remove(swapchain);
        for image in record.images {
            resources.destroy_texture(image);
        }
        resources
            .frames
            .current_mut()
            .defer(DeferredObject::Swapchain(record.raw));
    }
}

impl crate::context::GpuResources {
    fn wrap_swapchain_images(
        &mut self,
        raw: &crate::backend::GpuSwapchain,
        descriptor: &SwapchainDescriptor,
    ) -> Result<Vec<ResourceHandle>, GraphicsError> {
        let image_descriptor = descriptor.image_descriptor();
        let textures = self.backend.swapchain_textures(raw)?;
        Ok(textures
            .into_iter()
            .map(|texture| {
                let mut record = TextureRecord::new(texture, image_descriptor.clone());
                record.swapchain_image = true;
                let handle = self.handles.allocate(ResourceKind::Texture);
                self.textures.insert(handle, record);
                handle
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_builder() {
        let desc = SwapchainDescriptor::new(800, 600)
            .with_format(TextureFormat::Rgba8Unorm)
            .with_present_mode(PresentMode::Mailbox)
            .with_image_count(2);
        assert_eq!(desc.extent, Extent3d::new_2d(800, 600));
        assert_eq!(desc.format, TextureFormat::Rgba8Unorm);
        assert_eq!(desc.present_mode, PresentMode::Mailbox);
        assert_eq!(desc.image_count, 2);
    }

    #[test]
    fn test_image_descriptor_is_attachment() {
        let desc = SwapchainDescriptor::new(64, 32).image_descriptor();
        assert!(desc.usage.contains(TextureUsage::RENDER_ATTACHMENT));
        assert_eq!(desc.size, Extent3d::new_2d(64, 32));
    }

    #[test]
    fn test_default_present_mode_is_fifo() {
        assert_eq!(PresentMode::default(), PresentMode::Fifo);
    }
}
