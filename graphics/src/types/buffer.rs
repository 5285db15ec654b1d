//! Buffer types and descriptors.

use std::hash::{Hash, Hasher};

use bitflags::bitflags;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be used as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be used as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can be used as an indirect buffer.
        const INDIRECT = 1 << 4;
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 5;
        /// Buffer can be copied to.
        const COPY_DST = 1 << 6;
        /// Buffer is mappable for CPU reads.
        const MAP_READ = 1 << 7;
        /// Buffer is mappable for CPU writes.
        const MAP_WRITE = 1 << 8;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a buffer. The label does not take part in equality.
#[derive(Debug, Clone, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Host-visible staging buffer for uploads.
    pub fn staging(size: u64) -> Self {
        Self::new(size, BufferUsage::COPY_SRC | BufferUsage::MAP_WRITE).with_label("staging")
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Returns true if the CPU can write the buffer directly.
    pub fn is_host_visible(&self) -> bool {
        self.usage
            .intersects(BufferUsage::MAP_READ | BufferUsage::MAP_WRITE)
    }
}

impl PartialEq for BufferDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.usage == other.usage
    }
}

impl Eq for BufferDescriptor {}

impl Hash for BufferDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.size.hash(state);
        self.usage.hash(state);
    }
}
