//! Buffer records.

use crate::backend::GpuBuffer;
use crate::sync::ResourceState;
use crate::types::{BufferDescriptor, BufferUsage, QueueKind};

/// A buffer as stored in the [`GpuResources`](crate::GpuResources) buffer store.
pub struct BufferRecord {
    pub(crate) raw: GpuBuffer,
    pub(crate) descriptor: BufferDescriptor,
    pub(crate) state: ResourceState,
    pub(crate) owner: Option<QueueKind>,
    pub(crate) last_frame: Option<u64>,
}

impl BufferRecord {
    pub(crate) fn new(raw: GpuBuffer, descriptor: BufferDescriptor) -> Self {
        Self {
            raw,
            descriptor,
            state: ResourceState::UNDEFINED,
            owner: None,
            last_frame: None,
        }
    }

    /// Get the raw backend object.
    pub fn raw(&self) -> &GpuBuffer {
        &self.raw
    }

    /// Get the buffer descriptor.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Get the buffer usage flags.
    pub fn usage(&self) -> BufferUsage {
        self.descriptor.usage
    }

    /// State the buffer was last synchronized to.
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// Queue that currently owns the buffer, if any used it yet.
    pub fn owner(&self) -> Option<QueueKind> {
        self.owner
    }

    /// Number of the last frame a render graph used the buffer in.
    pub fn last_used_frame(&self) -> Option<u64> {
        self.last_frame
    }

    /// Get the buffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl std::fmt::Debug for BufferRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferRecord")
            .field("label", &self.descriptor.label)
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("owner", &self.owner)
            .field("last_frame", &self.last_frame)
            .finish()
    }
}
