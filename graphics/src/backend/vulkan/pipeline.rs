//! Render passes, pipeline layouts and pipelines.

use std::ffi::CString;

use ash::vk;

use crate::error::GraphicsError;
use crate::types::{
    AttachmentDescription, GraphicsPipelineState, PipelineDescriptor, PipelineKind,
    RenderPassLayout, ShaderCode,
};

use super::conversion::{
    convert_image_layout, convert_load_op, convert_sample_count, convert_store_op,
    convert_texture_format, convert_topology, convert_vertex_format,
};
use super::map_vk_error;

/// Push constant stages for a pipeline bound at `bind_point`.
pub(super) fn push_constant_stages(bind_point: vk::PipelineBindPoint) -> vk::ShaderStageFlags {
    if bind_point == vk::PipelineBindPoint::COMPUTE {
        vk::ShaderStageFlags::COMPUTE
    } else {
        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
    }
}

fn attachment_description(attachment: &AttachmentDescription) -> vk::AttachmentDescription {
    let (stencil_load, stencil_store) = if attachment.format.has_stencil() {
        (
            convert_load_op(attachment.load_op),
            convert_store_op(attachment.store_op),
        )
    } else {
        (
            vk::AttachmentLoadOp::DONT_CARE,
            vk::AttachmentStoreOp::DONT_CARE,
        )
    };

    vk::AttachmentDescription::default()
        .format(convert_texture_format(attachment.format))
        .samples(convert_sample_count(attachment.sample_count))
        .load_op(convert_load_op(attachment.load_op))
        .store_op(convert_store_op(attachment.store_op))
        .stencil_load_op(stencil_load)
        .stencil_store_op(stencil_store)
        .initial_layout(convert_image_layout(attachment.initial_layout))
        .final_layout(convert_image_layout(attachment.final_layout))
}

/// Single-subpass render pass. Layout transitions outside the attachment
/// layouts are recorded as barriers by the render graph, so no external
/// subpass dependencies are declared.
pub(super) fn create_render_pass(
    device: &ash::Device,
    layout: &RenderPassLayout,
) -> Result<vk::RenderPass, GraphicsError> {
    let attachments: Vec<vk::AttachmentDescription> =
        layout.attachments().map(attachment_description).collect();

    let color_refs: Vec<vk::AttachmentReference> = (0..layout.color_attachments.len())
        .map(|index| vk::AttachmentReference {
            attachment: index as u32,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        })
        .collect();

    let depth_ref = layout
        .depth_stencil_attachment
        .as_ref()
        .map(|depth| vk::AttachmentReference {
            attachment: color_refs.len() as u32,
            layout: if depth.final_layout.is_depth_attachment() {
                convert_image_layout(depth.final_layout)
            } else {
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
            },
        });

    let mut subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs);
    if let Some(depth_ref) = depth_ref.as_ref() {
        subpass = subpass.depth_stencil_attachment(depth_ref);
    }
    let subpasses = [subpass];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses);

    unsafe { device.create_render_pass(&create_info, None) }
        .map_err(|e| map_vk_error(e, "create render pass"))
}

fn create_shader_module(
    device: &ash::Device,
    code: &ShaderCode,
) -> Result<vk::ShaderModule, GraphicsError> {
    let create_info = vk::ShaderModuleCreateInfo::default().code(&code.spirv);
    unsafe { device.create_shader_module(&create_info, None) }
        .map_err(|e| map_vk_error(e, "create shader module"))
}

fn entry_point(code: &ShaderCode) -> Result<CString, GraphicsError> {
    CString::new(code.entry_point.as_str()).map_err(|_| {
        GraphicsError::InvalidParameter(format!(
            "shader entry point '{}' contains a NUL byte",
            code.entry_point
        ))
    })
}

pub(super) fn create_pipeline_layout(
    device: &ash::Device,
    set_layouts: &[vk::DescriptorSetLayout],
    push_constant_size: u32,
    bind_point: vk::PipelineBindPoint,
) -> Result<vk::PipelineLayout, GraphicsError> {
    let ranges = [vk::PushConstantRange {
        stage_flags: push_constant_stages(bind_point),
        offset: 0,
        size: push_constant_size,
    }];
    let ranges: &[vk::PushConstantRange] = if push_constant_size > 0 {
        &ranges
    } else {
        &[]
    };

    let create_info = vk::PipelineLayoutCreateInfo::default()
        .set_layouts(set_layouts)
        .push_constant_ranges(ranges);

    unsafe { device.create_pipeline_layout(&create_info, None) }
        .map_err(|e| map_vk_error(e, "create pipeline layout"))
}

/// Build the pipeline for `descriptor` against an already created layout.
pub(super) fn create_pipeline(
    device: &ash::Device,
    descriptor: &PipelineDescriptor,
    layout: vk::PipelineLayout,
    render_pass: Option<vk::RenderPass>,
) -> Result<vk::Pipeline, GraphicsError> {
    match &descriptor.kind {
        PipelineKind::Compute(shader) => create_compute_pipeline(device, shader, layout),
        PipelineKind::Graphics(state) => {
            let render_pass = render_pass.ok_or_else(|| {
                GraphicsError::InvalidParameter(format!(
                    "graphics pipeline {:?} needs a render pass",
                    descriptor.label
                ))
            })?;
            create_graphics_pipeline(device, state, layout, render_pass)
        }
    }
}

fn create_compute_pipeline(
    device: &ash::Device,
    shader: &ShaderCode,
    layout: vk::PipelineLayout,
) -> Result<vk::Pipeline, GraphicsError> {
    let name = entry_point(shader)?;
    let module = create_shader_module(device, shader)?;

    let stage = vk::PipelineShaderStageCreateInfo::default()
        .stage(vk::ShaderStageFlags::COMPUTE)
        .module(module)
        .name(&name);
    let create_info = [vk::ComputePipelineCreateInfo::default()
        .stage(stage)
        .layout(layout)];

    let result = unsafe {
        device.create_compute_pipelines(vk::PipelineCache::null(), &create_info, None)
    };
    unsafe { device.destroy_shader_module(module, None) };

    let pipelines = result.map_err(|(_, e)| map_vk_error(e, "create compute pipeline"))?;
    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| GraphicsError::Internal("driver returned no pipeline".to_string()))
}

fn create_graphics_pipeline(
    device: &ash::Device,
    state: &GraphicsPipelineState,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
) -> Result<vk::Pipeline, GraphicsError> {
    let vertex_name = entry_point(&state.vertex)?;
    let fragment_name = state.fragment.as_ref().map(entry_point).transpose()?;

    let vertex_module = create_shader_module(device, &state.vertex)?;
    let fragment_module = match state
        .fragment
        .as_ref()
        .map(|code| create_shader_module(device, code))
    {
        Some(Ok(module)) => Some(module),
        Some(Err(e)) => {
            unsafe { device.destroy_shader_module(vertex_module, None) };
            return Err(e);
        }
        None => None,
    };

    let mut stages = vec![
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_module)
            .name(&vertex_name),
    ];
    if let (Some(module), Some(name)) = (fragment_module, fragment_name.as_ref()) {
        stages.push(
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(module)
                .name(name),
        );
    }

    let bindings: Vec<vk::VertexInputBindingDescription> = state
        .vertex_buffers
        .iter()
        .enumerate()
        .map(|(binding, buffer)| vk::VertexInputBindingDescription {
            binding: binding as u32,
            stride: buffer.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        })
        .collect();
    let attributes: Vec<vk::VertexInputAttributeDescription> = state
        .vertex_buffers
        .iter()
        .enumerate()
        .flat_map(|(binding, buffer)| {
            buffer
                .attributes
                .iter()
                .map(move |attribute| vk::VertexInputAttributeDescription {
                    location: attribute.location,
                    binding: binding as u32,
                    format: convert_vertex_format(attribute.format),
                    offset: attribute.offset,
                })
        })
        .collect();
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(convert_topology(state.topology));

    let viewport = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);

    let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0);

    let sample_count = state
        .render_pass
        .attachments()
        .next()
        .map_or(1, |attachment| attachment.sample_count);
    let multisample = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(convert_sample_count(sample_count));

    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(state.depth_test)
        .depth_write_enable(state.depth_write)
        .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL);

    let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = state
        .render_pass
        .color_attachments
        .iter()
        .map(|_| {
            vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(state.blend)
                .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(vk::BlendFactor::ONE)
                .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                .alpha_blend_op(vk::BlendOp::ADD)
        })
        .collect();
    let color_blend =
        vk::PipelineColorBlendStateCreateInfo::default().attachments(&blend_attachments);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let create_info = [vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport)
        .rasterization_state(&rasterization)
        .multisample_state(&multisample)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blend)
        .dynamic_state(&dynamic)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0)];

    let result = unsafe {
        device.create_graphics_pipelines(vk::PipelineCache::null(), &create_info, None)
    };

    unsafe {
        device.destroy_shader_module(vertex_module, None);
        if let Some(module) = fragment_module {
            device.destroy_shader_module(module, None);
        }
    }

    let pipelines = result.map_err(|(_, e)| map_vk_error(e, "create graphics pipeline"))?;
    pipelines
        .into_iter()
        .next()
        .ok_or_else(|| GraphicsError::Internal("driver returned no pipeline".to_string()))
}
