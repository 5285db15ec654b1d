//! Synchronization vocabulary: pipeline stages, access kinds, image layouts
//! and the [`ResourceState`] triple the render graph tracks per resource.
//!
//! A barrier is described as a pair of states. The render graph compares the
//! state a resource was last used in with the state the next pass declares
//! and emits a barrier when they differ or either side writes.

mod barrier;
mod ownership;

pub use barrier::{BufferBarrier, QueueTransfer, SubresourceRange, TextureBarrier};
pub use ownership::{OwnershipLedger, TransferKey};

use bitflags::bitflags;

bitflags! {
    /// Pipeline stages a command waits for or signals.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        /// Start of the pipeline; nothing to wait for.
        const TOP_OF_PIPE = 1 << 0;
        /// Indirect argument fetch.
        const DRAW_INDIRECT = 1 << 1;
        /// Vertex and index fetch.
        const VERTEX_INPUT = 1 << 2;
        /// Vertex shader.
        const VERTEX_SHADER = 1 << 3;
        /// Fragment shader.
        const FRAGMENT_SHADER = 1 << 4;
        /// Early depth/stencil tests.
        const EARLY_FRAGMENT_TESTS = 1 << 5;
        /// Late depth/stencil tests.
        const LATE_FRAGMENT_TESTS = 1 << 6;
        /// Color attachment output.
        const COLOR_ATTACHMENT_OUTPUT = 1 << 7;
        /// Compute shader.
        const COMPUTE_SHADER = 1 << 8;
        /// Copies, blits and clears.
        const TRANSFER = 1 << 9;
        /// End of the pipeline.
        const BOTTOM_OF_PIPE = 1 << 10;
        /// Host reads and writes.
        const HOST = 1 << 11;
        /// Every stage.
        const ALL_COMMANDS = 1 << 12;
    }
}

bitflags! {
    /// Memory access kinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        /// Indirect command read.
        const INDIRECT_COMMAND_READ = 1 << 0;
        /// Index buffer read.
        const INDEX_READ = 1 << 1;
        /// Vertex buffer read.
        const VERTEX_ATTRIBUTE_READ = 1 << 2;
        /// Uniform buffer read.
        const UNIFORM_READ = 1 << 3;
        /// Sampled or storage read in a shader.
        const SHADER_READ = 1 << 4;
        /// Storage write in a shader.
        const SHADER_WRITE = 1 << 5;
        /// Color attachment read (blending, load).
        const COLOR_ATTACHMENT_READ = 1 << 6;
        /// Color attachment write.
        const COLOR_ATTACHMENT_WRITE = 1 << 7;
        /// Depth/stencil read.
        const DEPTH_STENCIL_READ = 1 << 8;
        /// Depth/stencil write.
        const DEPTH_STENCIL_WRITE = 1 << 9;
        /// Transfer read.
        const TRANSFER_READ = 1 << 10;
        /// Transfer write.
        const TRANSFER_WRITE = 1 << 11;
        /// Host read.
        const HOST_READ = 1 << 12;
        /// Host write.
        const HOST_WRITE = 1 << 13;
        /// Any read.
        const MEMORY_READ = 1 << 14;
        /// Any write.
        const MEMORY_WRITE = 1 << 15;
    }
}

impl AccessFlags {
    /// Every flag that denotes a write.
    pub const WRITES: Self = Self::SHADER_WRITE
        .union(Self::COLOR_ATTACHMENT_WRITE)
        .union(Self::DEPTH_STENCIL_WRITE)
        .union(Self::TRANSFER_WRITE)
        .union(Self::HOST_WRITE)
        .union(Self::MEMORY_WRITE);

    /// Returns true if any write access is included.
    pub fn is_write(self) -> bool {
        self.intersects(Self::WRITES)
    }

    /// Returns true if the access contains only reads (or nothing).
    pub fn is_read_only(self) -> bool {
        !self.is_write()
    }
}

/// Image layout a texture is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageLayout {
    /// Contents undefined. Transitioning from here discards them.
    #[default]
    Undefined,
    /// Usable for everything, optimal for nothing. Storage images live here.
    General,
    /// Optimal for color attachment writes.
    ColorAttachment,
    /// Optimal for depth/stencil attachment writes.
    DepthStencilAttachment,
    /// Depth/stencil read-only (testing and sampling).
    DepthStencilReadOnly,
    /// Optimal for shader sampling.
    ShaderReadOnly,
    /// Optimal for transfer source.
    TransferSrc,
    /// Optimal for transfer destination.
    TransferDst,
    /// Ready for presentation.
    Present,
}

impl ImageLayout {
    /// Returns true for layouts a render pass can use as an attachment.
    pub fn is_attachment(self) -> bool {
        matches!(
            self,
            Self::ColorAttachment | Self::DepthStencilAttachment | Self::DepthStencilReadOnly
        )
    }

    /// Returns true for depth/stencil attachment layouts.
    pub fn is_depth_attachment(self) -> bool {
        matches!(
            self,
            Self::DepthStencilAttachment | Self::DepthStencilReadOnly
        )
    }
}

/// How a resource is used: which stages touch it, with which accesses, and
/// (for textures) in which layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceState {
    /// Pipeline stages.
    pub stages: PipelineStages,
    /// Access kinds.
    pub access: AccessFlags,
    /// Image layout. Ignored for buffers.
    pub layout: ImageLayout,
}

impl ResourceState {
    /// Fresh or discarded contents.
    pub const UNDEFINED: Self = Self::new(
        PipelineStages::TOP_OF_PIPE,
        AccessFlags::empty(),
        ImageLayout::Undefined,
    );
    /// Written as a color attachment.
    pub const COLOR_ATTACHMENT: Self = Self::new(
        PipelineStages::COLOR_ATTACHMENT_OUTPUT,
        AccessFlags::COLOR_ATTACHMENT_READ.union(AccessFlags::COLOR_ATTACHMENT_WRITE),
        ImageLayout::ColorAttachment,
    );
    /// Written as a depth/stencil attachment.
    pub const DEPTH_ATTACHMENT: Self = Self::new(
        PipelineStages::EARLY_FRAGMENT_TESTS.union(PipelineStages::LATE_FRAGMENT_TESTS),
        AccessFlags::DEPTH_STENCIL_READ.union(AccessFlags::DEPTH_STENCIL_WRITE),
        ImageLayout::DepthStencilAttachment,
    );
    /// Depth tested without writes.
    pub const DEPTH_READ_ONLY: Self = Self::new(
        PipelineStages::EARLY_FRAGMENT_TESTS.union(PipelineStages::LATE_FRAGMENT_TESTS),
        AccessFlags::DEPTH_STENCIL_READ,
        ImageLayout::DepthStencilReadOnly,
    );
    /// Sampled in a fragment shader.
    pub const FRAGMENT_SAMPLED: Self = Self::new(
        PipelineStages::FRAGMENT_SHADER,
        AccessFlags::SHADER_READ,
        ImageLayout::ShaderReadOnly,
    );
    /// Sampled in a compute shader.
    pub const COMPUTE_SAMPLED: Self = Self::new(
        PipelineStages::COMPUTE_SHADER,
        AccessFlags::SHADER_READ,
        ImageLayout::ShaderReadOnly,
    );
    /// Storage reads in a compute shader.
    pub const COMPUTE_STORAGE_READ: Self = Self::new(
        PipelineStages::COMPUTE_SHADER,
        AccessFlags::SHADER_READ,
        ImageLayout::General,
    );
    /// Storage writes in a compute shader.
    pub const COMPUTE_STORAGE_WRITE: Self = Self::new(
        PipelineStages::COMPUTE_SHADER,
        AccessFlags::SHADER_WRITE,
        ImageLayout::General,
    );
    /// Storage reads and writes in a compute shader.
    pub const COMPUTE_STORAGE_READ_WRITE: Self = Self::new(
        PipelineStages::COMPUTE_SHADER,
        AccessFlags::SHADER_READ.union(AccessFlags::SHADER_WRITE),
        ImageLayout::General,
    );
    /// Read as uniform data by vertex and fragment shaders.
    pub const UNIFORM_READ: Self = Self::new(
        PipelineStages::VERTEX_SHADER.union(PipelineStages::FRAGMENT_SHADER),
        AccessFlags::UNIFORM_READ,
        ImageLayout::Undefined,
    );
    /// Read as vertex or index data.
    pub const VERTEX_INPUT: Self = Self::new(
        PipelineStages::VERTEX_INPUT,
        AccessFlags::VERTEX_ATTRIBUTE_READ.union(AccessFlags::INDEX_READ),
        ImageLayout::Undefined,
    );
    /// Read as indirect arguments.
    pub const INDIRECT_ARGUMENT: Self = Self::new(
        PipelineStages::DRAW_INDIRECT,
        AccessFlags::INDIRECT_COMMAND_READ,
        ImageLayout::Undefined,
    );
    /// Copy or blit source.
    pub const TRANSFER_SRC: Self = Self::new(
        PipelineStages::TRANSFER,
        AccessFlags::TRANSFER_READ,
        ImageLayout::TransferSrc,
    );
    /// Copy or blit destination.
    pub const TRANSFER_DST: Self = Self::new(
        PipelineStages::TRANSFER,
        AccessFlags::TRANSFER_WRITE,
        ImageLayout::TransferDst,
    );
    /// Handed to the presentation engine.
    pub const PRESENT: Self = Self::new(
        PipelineStages::BOTTOM_OF_PIPE,
        AccessFlags::empty(),
        ImageLayout::Present,
    );

    /// Create a state.
    pub const fn new(stages: PipelineStages, access: AccessFlags, layout: ImageLayout) -> Self {
        Self {
            stages,
            access,
            layout,
        }
    }

    /// Returns true if the state writes the resource.
    pub fn is_write(&self) -> bool {
        self.access.is_write()
    }

    /// Returns true if moving from `self` to `next` requires a barrier.
    ///
    /// Identical read-only states can overlap freely. Anything involving a
    /// write, a layout change, or different stages is synchronized.
    pub fn needs_barrier_to(&self, next: &ResourceState) -> bool {
        self != next || self.is_write() || next.is_write()
    }

    /// Same state with a different layout.
    pub const fn with_layout(self, layout: ImageLayout) -> Self {
        Self { layout, ..self }
    }
}

impl Default for ResourceState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_detection() {
        assert!(ResourceState::COLOR_ATTACHMENT.is_write());
        assert!(ResourceState::COMPUTE_STORAGE_WRITE.is_write());
        assert!(ResourceState::TRANSFER_DST.is_write());
        assert!(!ResourceState::FRAGMENT_SAMPLED.is_write());
        assert!(!ResourceState::PRESENT.is_write());
    }

    #[test]
    fn test_read_after_read_needs_no_barrier() {
        let sampled = ResourceState::FRAGMENT_SAMPLED;
        assert!(!sampled.needs_barrier_to(&sampled));
    }

    #[test]
    fn test_write_after_write_same_state_needs_barrier() {
        let storage = ResourceState::COMPUTE_STORAGE_WRITE;
        assert!(storage.needs_barrier_to(&storage));
    }

    #[test]
    fn test_layout_change_needs_barrier() {
        assert!(
            ResourceState::COMPUTE_SAMPLED
                .needs_barrier_to(&ResourceState::COMPUTE_STORAGE_READ)
        );
    }

    #[test]
    fn test_attachment_layouts() {
        assert!(ImageLayout::ColorAttachment.is_attachment());
        assert!(ImageLayout::DepthStencilReadOnly.is_depth_attachment());
        assert!(!ImageLayout::ShaderReadOnly.is_attachment());
    }
}
