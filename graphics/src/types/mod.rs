//! Descriptors and value types shared by the backend, the recorder and the
//! render graph.

mod buffer;
mod common;
mod descriptor;
mod pass;
mod pipeline;
mod texture;

pub use buffer::{BufferDescriptor, BufferUsage};
pub use common::{ClearValue, Extent3d, Offset3d, QueueKind, ScissorRect, Viewport};
pub use descriptor::{
    DescriptorBinding, DescriptorResource, DescriptorSetLayoutDescriptor, DescriptorType,
    DescriptorWrite,
};
pub use pass::{AttachmentDescription, LoadOp, RenderPassLayout, StoreOp};
pub use pipeline::{
    GraphicsPipelineState, IndexFormat, PipelineDescriptor, PipelineKind, PrimitiveTopology,
    ShaderCode, ShaderStages, VertexAttribute, VertexBufferLayout, VertexFormat,
};
pub use texture::{TextureDescriptor, TextureFormat, TextureUsage};
