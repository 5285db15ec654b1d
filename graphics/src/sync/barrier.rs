use super::ResourceState;
use crate::resources::ResourceHandle;

/// Mip and array-layer range a texture barrier applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubresourceRange {
    /// First mip level.
    pub base_mip_level: u32,
    /// Number of mip levels; [`SubresourceRange::REMAINING`] for all.
    pub mip_level_count: u32,
    /// First array layer.
    pub base_array_layer: u32,
    /// Number of array layers; [`SubresourceRange::REMAINING`] for all.
    pub array_layer_count: u32,
}

impl SubresourceRange {
    /// Count meaning "up to the end".
    pub const REMAINING: u32 = u32::MAX;

    /// Every mip and layer.
    pub const ALL: Self = Self {
        base_mip_level: 0,
        mip_level_count: Self::REMAINING,
        base_array_layer: 0,
        array_layer_count: Self::REMAINING,
    };

    /// A single mip level of every layer.
    pub const fn mip(level: u32) -> Self {
        Self {
            base_mip_level: level,
            mip_level_count: 1,
            base_array_layer: 0,
            array_layer_count: Self::REMAINING,
        }
    }

    /// Mip levels `base..base + count` of every layer.
    pub const fn mips(base: u32, count: u32) -> Self {
        Self {
            base_mip_level: base,
            mip_level_count: count,
            base_array_layer: 0,
            array_layer_count: Self::REMAINING,
        }
    }
}

impl Default for SubresourceRange {
    fn default() -> Self {
        Self::ALL
    }
}

/// Queue family ownership transfer carried by a barrier.
///
/// The same transfer is recorded twice: as a release on the source queue and
/// as an acquire on the destination queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueTransfer {
    /// Family giving up ownership.
    pub src_family: u32,
    /// Family taking ownership.
    pub dst_family: u32,
}

/// Texture state transition, optionally with a family ownership transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBarrier {
    /// Texture handle.
    pub texture: ResourceHandle,
    /// State before the barrier.
    pub src: ResourceState,
    /// State after the barrier.
    pub dst: ResourceState,
    /// Affected subresources.
    pub range: SubresourceRange,
    /// Ownership transfer, if the barrier is half of a release/acquire pair.
    pub transfer: Option<QueueTransfer>,
}

impl TextureBarrier {
    /// Whole-texture transition on one queue.
    pub fn new(texture: ResourceHandle, src: ResourceState, dst: ResourceState) -> Self {
        Self {
            texture,
            src,
            dst,
            range: SubresourceRange::ALL,
            transfer: None,
        }
    }

    /// Restrict the barrier to `range`.
    pub fn with_range(mut self, range: SubresourceRange) -> Self {
        self.range = range;
        self
    }

    /// Returns true if this barrier transfers queue family ownership.
    pub fn is_ownership_transfer(&self) -> bool {
        self.transfer.is_some()
    }
}

/// Buffer state transition, optionally with a family ownership transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBarrier {
    /// Buffer handle.
    pub buffer: ResourceHandle,
    /// State before the barrier.
    pub src: ResourceState,
    /// State after the barrier.
    pub dst: ResourceState,
    /// Ownership transfer, if the barrier is half of a release/acquire pair.
    pub transfer: Option<QueueTransfer>,
}

impl BufferBarrier {
    /// Whole-buffer transition on one queue.
    pub fn new(buffer: ResourceHandle, src: ResourceState, dst: ResourceState) -> Self {
        Self {
            buffer,
            src,
            dst,
            transfer: None,
        }
    }

    /// Returns true if this barrier transfers queue family ownership.
    pub fn is_ownership_transfer(&self) -> bool {
        self.transfer.is_some()
    }
}
