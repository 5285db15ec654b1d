//! Pipeline descriptors.
//!
//! Shader compilation is outside the renderer; pipelines are built from
//! SPIR-V words supplied by the caller.

use bitflags::bitflags;

use super::RenderPassLayout;
use crate::resources::ResourceHandle;

bitflags! {
    /// Shader stages a binding or push constant range is visible to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        /// Vertex shader.
        const VERTEX = 1 << 0;
        /// Fragment shader.
        const FRAGMENT = 1 << 1;
        /// Compute shader.
        const COMPUTE = 1 << 2;
    }
}

/// Compiled shader module contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderCode {
    /// SPIR-V words.
    pub spirv: Vec<u32>,
    /// Entry point name.
    pub entry_point: String,
}

impl ShaderCode {
    /// Shader with the conventional `main` entry point.
    pub fn new(spirv: Vec<u32>) -> Self {
        Self {
            spirv,
            entry_point: "main".to_string(),
        }
    }
}

/// Format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// One 32-bit float.
    Float32,
    /// Two 32-bit floats.
    Float32x2,
    /// Three 32-bit floats.
    Float32x3,
    /// Four 32-bit floats.
    Float32x4,
    /// One 32-bit unsigned integer.
    Uint32,
    /// Four 8-bit normalized bytes.
    Unorm8x4,
}

/// One attribute inside a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input location.
    pub location: u32,
    /// Attribute format.
    pub format: VertexFormat,
    /// Byte offset inside a vertex.
    pub offset: u32,
}

/// Layout of one bound vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferLayout {
    /// Bytes between consecutive vertices.
    pub stride: u32,
    /// Attributes read from the buffer.
    pub attributes: Vec<VertexAttribute>,
}

/// Primitive assembly topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Independent triangles.
    #[default]
    TriangleList,
    /// Triangle strip.
    TriangleStrip,
    /// Independent lines.
    LineList,
    /// Points.
    PointList,
}

/// Index element size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    #[default]
    Uint32,
}

/// Fixed-function and shader state of a graphics pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphicsPipelineState {
    /// Vertex shader.
    pub vertex: ShaderCode,
    /// Fragment shader, if any.
    pub fragment: Option<ShaderCode>,
    /// Vertex buffer layouts in binding order.
    pub vertex_buffers: Vec<VertexBufferLayout>,
    /// Primitive topology.
    pub topology: PrimitiveTopology,
    /// Attachment layout the pipeline renders into.
    pub render_pass: RenderPassLayout,
    /// Enable depth testing.
    pub depth_test: bool,
    /// Enable depth writes.
    pub depth_write: bool,
    /// Enable alpha blending on every color attachment.
    pub blend: bool,
}

/// Pipeline flavor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Compute pipeline.
    Compute(ShaderCode),
    /// Graphics pipeline.
    Graphics(Box<GraphicsPipelineState>),
}

/// Descriptor for creating a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Descriptor set layouts, by set index.
    pub set_layouts: Vec<ResourceHandle>,
    /// Size of the push constant block in bytes, visible to every stage.
    pub push_constant_size: u32,
    /// Compute or graphics state.
    pub kind: PipelineKind,
}

impl PipelineDescriptor {
    /// Create a compute pipeline descriptor.
    pub fn compute(shader: ShaderCode, set_layouts: Vec<ResourceHandle>) -> Self {
        Self {
            label: None,
            set_layouts,
            push_constant_size: 0,
            kind: PipelineKind::Compute(shader),
        }
    }

    /// Create a graphics pipeline descriptor.
    pub fn graphics(state: GraphicsPipelineState, set_layouts: Vec<ResourceHandle>) -> Self {
        Self {
            label: None,
            set_layouts,
            push_constant_size: 0,
            kind: PipelineKind::Graphics(Box::new(state)),
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the push constant block size.
    pub fn with_push_constants(mut self, size: u32) -> Self {
        self.push_constant_size = size;
        self
    }

    /// Returns true for compute pipelines.
    pub fn is_compute(&self) -> bool {
        matches!(self.kind, PipelineKind::Compute(_))
    }
}
