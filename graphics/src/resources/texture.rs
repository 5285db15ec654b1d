//! Texture records.

use crate::backend::GpuTexture;
use crate::sync::ResourceState;
use crate::types::{Extent3d, QueueKind, TextureDescriptor, TextureFormat};

/// A texture as stored in the [`GpuResources`](crate::GpuResources) texture store.
///
/// Besides the raw object the record carries the synchronization state the
/// texture was last left in, so the next frame's graph can import it without
/// the caller tracking layouts by hand.
pub struct TextureRecord {
    pub(crate) raw: GpuTexture,
    pub(crate) descriptor: TextureDescriptor,
    pub(crate) state: ResourceState,
    pub(crate) owner: Option<QueueKind>,
    pub(crate) last_frame: Option<u64>,
    pub(crate) swapchain_image: bool,
}

impl TextureRecord {
    pub(crate) fn new(raw: GpuTexture, descriptor: TextureDescriptor) -> Self {
        Self {
            raw,
            descriptor,
            state: ResourceState::UNDEFINED,
            owner: None,
            last_frame: None,
            swapchain_image: false,
        }
    }

    /// Get the raw backend object.
    pub fn raw(&self) -> &GpuTexture {
        &self.raw
    }

    /// Get the texture descriptor.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Get the texture size.
    pub fn size(&self) -> Extent3d {
        self.descriptor.size
    }

    /// Get the texture format.
    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    /// Get the mip level count.
    pub fn mip_level_count(&self) -> u32 {
        self.descriptor.mip_level_count
    }

    /// State the texture was last transitioned to.
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// Queue that currently owns the texture, if any used it yet.
    pub fn owner(&self) -> Option<QueueKind> {
        self.owner
    }

    /// Number of the last frame a render graph used the texture in.
    pub fn last_used_frame(&self) -> Option<u64> {
        self.last_frame
    }

    /// Returns true for images owned by a swapchain.
    pub fn is_swapchain_image(&self) -> bool {
        self.swapchain_image
    }

    /// Get the texture label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl std::fmt::Debug for TextureRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureRecord")
            .field("label", &self.descriptor.label)
            .field("size", &self.descriptor.size)
            .field("format", &self.descriptor.format)
            .field("state", &self.state)
            .field("owner", &self.owner)
            .field("last_frame", &self.last_frame)
            .finish()
    }
}
