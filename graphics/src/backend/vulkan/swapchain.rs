//! Swapchain creation on the backend's surface.

use ash::vk;

use crate::error::GraphicsError;
use crate::swapchain::SwapchainDescriptor;

use super::conversion::{convert_present_mode, convert_texture_format};
use super::map_vk_error;

/// Surface and the loaders needed to build swapchains on it.
pub(super) struct SurfaceContext<'a> {
    pub surface_loader: &'a ash::khr::surface::Instance,
    pub swapchain_loader: &'a ash::khr::swapchain::Device,
    pub physical_device: vk::PhysicalDevice,
    pub surface: vk::SurfaceKHR,
    pub present_family: u32,
}

/// Swapchain handle plus the parameters it was actually created with.
pub(super) struct CreatedSwapchain {
    pub swapchain: vk::SwapchainKHR,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

pub(super) fn create_swapchain(
    surface: &SurfaceContext<'_>,
    descriptor: &SwapchainDescriptor,
    old: vk::SwapchainKHR,
) -> Result<CreatedSwapchain, GraphicsError> {
    let supported = unsafe {
        surface.surface_loader.get_physical_device_surface_support(
            surface.physical_device,
            surface.present_family,
            surface.surface,
        )
    }
    .map_err(|e| map_vk_error(e, "query surface support"))?;
    if !supported {
        return Err(GraphicsError::FeatureNotSupported(
            "graphics queue family cannot present to the surface".to_string(),
        ));
    }

    let capabilities = unsafe {
        surface
            .surface_loader
            .get_physical_device_surface_capabilities(surface.physical_device, surface.surface)
    }
    .map_err(|e| map_vk_error(e, "query surface capabilities"))?;

    let formats = unsafe {
        surface
            .surface_loader
            .get_physical_device_surface_formats(surface.physical_device, surface.surface)
    }
    .map_err(|e| map_vk_error(e, "query surface formats"))?;

    let wanted = convert_texture_format(descriptor.format);
    let surface_format = match formats.iter().find(|f| f.format == wanted) {
        Some(format) => *format,
        None => {
            let fallback = formats.first().copied().ok_or_else(|| {
                GraphicsError::FeatureNotSupported("surface reports no formats".to_string())
            })?;
            log::warn!(
                "Surface does not support {:?}, using {:?}",
                descriptor.format,
                fallback.format
            );
            fallback
        }
    };

    let present_modes = unsafe {
        surface
            .surface_loader
            .get_physical_device_surface_present_modes(surface.physical_device, surface.surface)
    }
    .map_err(|e| map_vk_error(e, "query present modes"))?;

    let present_mode = convert_present_mode(descriptor.present_mode);
    let present_mode = if present_modes.contains(&present_mode) {
        present_mode
    } else {
        log::warn!(
            "Present mode {:?} unavailable, falling back to FIFO",
            descriptor.present_mode
        );
        vk::PresentModeKHR::FIFO
    };

    let extent = if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: descriptor.extent.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: descriptor.extent.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    };

    let max_images = if capabilities.max_image_count > 0 {
        capabilities.max_image_count
    } else {
        u32::MAX
    };
    let image_count = descriptor
        .image_count
        .clamp(capabilities.min_image_count, max_images);

    let create_info = vk::SwapchainCreateInfoKHR::default()
        .surface(surface.surface)
        .min_image_count(image_count)
        .image_format(surface_format.format)
        .image_color_space(surface_format.color_space)
        .image_extent(extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
        .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        .pre_transform(capabilities.current_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(present_mode)
        .clipped(true)
        .old_swapchain(old);

    let swapchain = unsafe {
        surface
            .swapchain_loader
            .create_swapchain(&create_info, None)
    }
    .map_err(|e| map_vk_error(e, "create swapchain"))?;

    log::debug!(
        "Created swapchain {}x{} ({:?}, {:?}, {} images)",
        extent.width,
        extent.height,
        surface_format.format,
        present_mode,
        image_count
    );

    Ok(CreatedSwapchain {
        swapchain,
        format: surface_format.format,
        extent,
    })
}
