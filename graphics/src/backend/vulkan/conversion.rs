//! Conversions from renderer types to Vulkan types.

use ash::vk;

use crate::swapchain::PresentMode;
use crate::sync::{AccessFlags, ImageLayout, PipelineStages, SubresourceRange};
use crate::types::{
    BufferUsage, ClearValue, DescriptorType, IndexFormat, LoadOp, PrimitiveTopology,
    ShaderStages, StoreOp, TextureFormat, TextureUsage, VertexFormat,
};

const STAGES: &[(PipelineStages, vk::PipelineStageFlags)] = &[
    (PipelineStages::TOP_OF_PIPE, vk::PipelineStageFlags::TOP_OF_PIPE),
    (PipelineStages::DRAW_INDIRECT, vk::PipelineStageFlags::DRAW_INDIRECT),
    (PipelineStages::VERTEX_INPUT, vk::PipelineStageFlags::VERTEX_INPUT),
    (PipelineStages::VERTEX_SHADER, vk::PipelineStageFlags::VERTEX_SHADER),
    (PipelineStages::FRAGMENT_SHADER, vk::PipelineStageFlags::FRAGMENT_SHADER),
    (
        PipelineStages::EARLY_FRAGMENT_TESTS,
        vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
    ),
    (
        PipelineStages::LATE_FRAGMENT_TESTS,
        vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
    ),
    (
        PipelineStages::COLOR_ATTACHMENT_OUTPUT,
        vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
    ),
    (PipelineStages::COMPUTE_SHADER, vk::PipelineStageFlags::COMPUTE_SHADER),
    (PipelineStages::TRANSFER, vk::PipelineStageFlags::TRANSFER),
    (PipelineStages::BOTTOM_OF_PIPE, vk::PipelineStageFlags::BOTTOM_OF_PIPE),
    (PipelineStages::HOST, vk::PipelineStageFlags::HOST),
    (PipelineStages::ALL_COMMANDS, vk::PipelineStageFlags::ALL_COMMANDS),
];

const ACCESSES: &[(AccessFlags, vk::AccessFlags)] = &[
    (
        AccessFlags::INDIRECT_COMMAND_READ,
        vk::AccessFlags::INDIRECT_COMMAND_READ,
    ),
    (AccessFlags::INDEX_READ, vk::AccessFlags::INDEX_READ),
    (
        AccessFlags::VERTEX_ATTRIBUTE_READ,
        vk::AccessFlags::VERTEX_ATTRIBUTE_READ,
    ),
    (AccessFlags::UNIFORM_READ, vk::AccessFlags::UNIFORM_READ),
    (AccessFlags::SHADER_READ, vk::AccessFlags::SHADER_READ),
    (AccessFlags::SHADER_WRITE, vk::AccessFlags::SHADER_WRITE),
    (
        AccessFlags::COLOR_ATTACHMENT_READ,
        vk::AccessFlags::COLOR_ATTACHMENT_READ,
    ),
    (
        AccessFlags::COLOR_ATTACHMENT_WRITE,
        vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
    ),
    (
        AccessFlags::DEPTH_STENCIL_READ,
        vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
    ),
    (
        AccessFlags::DEPTH_STENCIL_WRITE,
        vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
    ),
    (AccessFlags::TRANSFER_READ, vk::AccessFlags::TRANSFER_READ),
    (AccessFlags::TRANSFER_WRITE, vk::AccessFlags::TRANSFER_WRITE),
    (AccessFlags::HOST_READ, vk::AccessFlags::HOST_READ),
    (AccessFlags::HOST_WRITE, vk::AccessFlags::HOST_WRITE),
    (AccessFlags::MEMORY_READ, vk::AccessFlags::MEMORY_READ),
    (AccessFlags::MEMORY_WRITE, vk::AccessFlags::MEMORY_WRITE),
];

fn stage_flags(stages: PipelineStages) -> vk::PipelineStageFlags {
    STAGES
        .iter()
        .filter(|(ours, _)| stages.contains(*ours))
        .fold(vk::PipelineStageFlags::empty(), |acc, (_, flag)| acc | *flag)
}

/// Stages of the first synchronization scope. Never empty.
pub fn convert_src_stages(stages: PipelineStages) -> vk::PipelineStageFlags {
    let flags = stage_flags(stages);
    if flags.is_empty() {
        vk::PipelineStageFlags::TOP_OF_PIPE
    } else {
        flags
    }
}

/// Stages of the second synchronization scope. Never empty.
pub fn convert_dst_stages(stages: PipelineStages) -> vk::PipelineStageFlags {
    let flags = stage_flags(stages);
    if flags.is_empty() {
        vk::PipelineStageFlags::BOTTOM_OF_PIPE
    } else {
        flags
    }
}

pub fn convert_access(access: AccessFlags) -> vk::AccessFlags {
    ACCESSES
        .iter()
        .filter(|(ours, _)| access.contains(*ours))
        .fold(vk::AccessFlags::empty(), |acc, (_, flag)| acc | *flag)
}

pub fn convert_image_layout(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::ColorAttachment => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilAttachment => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ImageLayout::DepthStencilReadOnly => vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ImageLayout::TransferSrc => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::Present => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

pub fn convert_subresource_range(
    range: &SubresourceRange,
    aspect_mask: vk::ImageAspectFlags,
) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask,
        base_mip_level: range.base_mip_level,
        level_count: range.mip_level_count,
        base_array_layer: range.base_array_layer,
        layer_count: range.array_layer_count,
    }
}

pub fn convert_buffer_usage(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut result = vk::BufferUsageFlags::empty();

    if usage.contains(BufferUsage::VERTEX) {
        result |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    if usage.contains(BufferUsage::INDEX) {
        result |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        result |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE) {
        result |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsage::INDIRECT) {
        result |= vk::BufferUsageFlags::INDIRECT_BUFFER;
    }
    if usage.contains(BufferUsage::COPY_SRC) {
        result |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsage::COPY_DST) {
        result |= vk::BufferUsageFlags::TRANSFER_DST;
    }

    // MAP_READ and MAP_WRITE select the memory location instead
    result
}

pub fn buffer_memory_location(usage: BufferUsage) -> gpu_allocator::MemoryLocation {
    if usage.contains(BufferUsage::MAP_READ) {
        gpu_allocator::MemoryLocation::GpuToCpu
    } else if usage.contains(BufferUsage::MAP_WRITE) {
        gpu_allocator::MemoryLocation::CpuToGpu
    } else {
        gpu_allocator::MemoryLocation::GpuOnly
    }
}

pub fn convert_texture_format(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::R8Unorm => vk::Format::R8_UNORM,
        TextureFormat::Rg8Unorm => vk::Format::R8G8_UNORM,
        TextureFormat::R32Float => vk::Format::R32_SFLOAT,
        TextureFormat::R32Uint => vk::Format::R32_UINT,
        TextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::Rgba8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::Bgra8UnormSrgb => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::Rgba16Float => vk::Format::R16G16B16A16_SFLOAT,
        TextureFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
        TextureFormat::Depth16Unorm => vk::Format::D16_UNORM,
        TextureFormat::Depth24PlusStencil8 => vk::Format::D24_UNORM_S8_UINT,
        TextureFormat::Depth32Float => vk::Format::D32_SFLOAT,
    }
}

pub fn aspect_mask(format: TextureFormat) -> vk::ImageAspectFlags {
    if format.has_stencil() {
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    } else if format.is_depth_stencil() {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// RENDER_ATTACHMENT maps to a color or depth attachment depending on `format`.
pub fn convert_texture_usage(usage: TextureUsage, format: TextureFormat) -> vk::ImageUsageFlags {
    let mut result = vk::ImageUsageFlags::empty();

    if usage.contains(TextureUsage::COPY_SRC) {
        result |= vk::ImageUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(TextureUsage::COPY_DST) {
        result |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if usage.contains(TextureUsage::TEXTURE_BINDING) {
        result |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(TextureUsage::STORAGE_BINDING) {
        result |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(TextureUsage::RENDER_ATTACHMENT) {
        if format.is_depth_stencil() {
            result |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
        } else {
            result |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
        }
    }

    result
}

/// Format features a texture with `usage` needs under optimal tiling.
pub fn required_format_features(
    usage: TextureUsage,
    format: TextureFormat,
) -> vk::FormatFeatureFlags {
    let mut result = vk::FormatFeatureFlags::empty();

    if usage.contains(TextureUsage::COPY_SRC) {
        result |= vk::FormatFeatureFlags::TRANSFER_SRC;
    }
    if usage.contains(TextureUsage::COPY_DST) {
        result |= vk::FormatFeatureFlags::TRANSFER_DST;
    }
    if usage.contains(TextureUsage::TEXTURE_BINDING) {
        result |= vk::FormatFeatureFlags::SAMPLED_IMAGE;
    }
    if usage.contains(TextureUsage::STORAGE_BINDING) {
        result |= vk::FormatFeatureFlags::STORAGE_IMAGE;
    }
    if usage.contains(TextureUsage::RENDER_ATTACHMENT) {
        if format.is_depth_stencil() {
            result |= vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
        } else {
            result |= vk::FormatFeatureFlags::COLOR_ATTACHMENT;
        }
    }

    result
}

pub fn convert_sample_count(count: u32) -> vk::SampleCountFlags {
    match count {
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}

pub fn convert_load_op(op: LoadOp) -> vk::AttachmentLoadOp {
    match op {
        LoadOp::Load => vk::AttachmentLoadOp::LOAD,
        LoadOp::Clear => vk::AttachmentLoadOp::CLEAR,
        LoadOp::DontCare => vk::AttachmentLoadOp::DONT_CARE,
    }
}

pub fn convert_store_op(op: StoreOp) -> vk::AttachmentStoreOp {
    match op {
        StoreOp::Store => vk::AttachmentStoreOp::STORE,
        StoreOp::DontCare => vk::AttachmentStoreOp::DONT_CARE,
    }
}

pub fn convert_clear_value(value: &ClearValue) -> vk::ClearValue {
    match *value {
        ClearValue::Color(float32) => vk::ClearValue {
            color: vk::ClearColorValue { float32 },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
        },
    }
}

pub fn convert_descriptor_type(ty: DescriptorType) -> vk::DescriptorType {
    match ty {
        DescriptorType::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        DescriptorType::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        DescriptorType::SampledTexture => vk::DescriptorType::SAMPLED_IMAGE,
        DescriptorType::StorageTexture => vk::DescriptorType::STORAGE_IMAGE,
    }
}

pub fn convert_shader_stages(stages: ShaderStages) -> vk::ShaderStageFlags {
    let mut result = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStages::VERTEX) {
        result |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStages::FRAGMENT) {
        result |= vk::ShaderStageFlags::FRAGMENT;
    }
    if stages.contains(ShaderStages::COMPUTE) {
        result |= vk::ShaderStageFlags::COMPUTE;
    }
    result
}

pub fn convert_vertex_format(format: VertexFormat) -> vk::Format {
    match format {
        VertexFormat::Float32 => vk::Format::R32_SFLOAT,
        VertexFormat::Float32x2 => vk::Format::R32G32_SFLOAT,
        VertexFormat::Float32x3 => vk::Format::R32G32B32_SFLOAT,
        VertexFormat::Float32x4 => vk::Format::R32G32B32A32_SFLOAT,
        VertexFormat::Uint32 => vk::Format::R32_UINT,
        VertexFormat::Unorm8x4 => vk::Format::R8G8B8A8_UNORM,
    }
}

pub fn convert_topology(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
    }
}

pub fn convert_index_format(format: IndexFormat) -> vk::IndexType {
    match format {
        IndexFormat::Uint16 => vk::IndexType::UINT16,
        IndexFormat::Uint32 => vk::IndexType::UINT32,
    }
}

pub fn convert_present_mode(mode: PresentMode) -> vk::PresentModeKHR {
    match mode {
        PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
        PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentMode::Fifo => vk::PresentModeKHR::FIFO,
        PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ResourceState;

    #[test]
    fn test_empty_stages_are_never_zero() {
        assert_eq!(
            convert_src_stages(PipelineStages::empty()),
            vk::PipelineStageFlags::TOP_OF_PIPE
        );
        assert_eq!(
            convert_dst_stages(PipelineStages::empty()),
            vk::PipelineStageFlags::BOTTOM_OF_PIPE
        );
    }

    #[test]
    fn test_depth_attachment_state() {
        let state = ResourceState::DEPTH_ATTACHMENT;
        assert_eq!(
            convert_src_stages(state.stages),
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
        );
        assert_eq!(
            convert_access(state.access),
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
        );
        assert_eq!(
            convert_image_layout(state.layout),
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        );
    }

    #[test]
    fn test_render_attachment_usage_follows_format() {
        assert_eq!(
            convert_texture_usage(TextureUsage::RENDER_ATTACHMENT, TextureFormat::Depth32Float),
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
        );
        assert_eq!(
            convert_texture_usage(TextureUsage::RENDER_ATTACHMENT, TextureFormat::Rgba8Unorm),
            vk::ImageUsageFlags::COLOR_ATTACHMENT
        );
    }

    #[test]
    fn test_stencil_aspect() {
        assert_eq!(
            aspect_mask(TextureFormat::Depth24PlusStencil8),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(
            aspect_mask(TextureFormat::Bgra8Unorm),
            vk::ImageAspectFlags::COLOR
        );
    }
}
