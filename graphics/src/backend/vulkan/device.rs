//! Physical device selection and logical device creation.

use std::ffi::{CStr, c_char};

use ash::vk;

use crate::error::GraphicsError;
use crate::types::QueueKind;

/// Queue family chosen for each [`QueueKind`], indexed by [`QueueKind::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub families: [u32; 3],
}

impl QueueFamilies {
    pub fn family(&self, queue: QueueKind) -> u32 {
        self.families[queue.index()]
    }

    /// Distinct families, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        let mut unique = Vec::with_capacity(3);
        for family in self.families {
            if !unique.contains(&family) {
                unique.push(family);
            }
        }
        unique
    }
}

/// Select the best physical device for rendering.
///
/// Prefers discrete GPUs, then larger maximum texture sizes.
pub fn select_physical_device(
    instance: &ash::Instance,
) -> Result<vk::PhysicalDevice, GraphicsError> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
        GraphicsError::InitializationFailed(format!(
            "Failed to enumerate physical devices: {:?}",
            e
        ))
    })?;

    let mut best: Option<(u32, vk::PhysicalDevice)> = None;
    for device in devices {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        if properties.api_version < super::instance::API_VERSION {
            continue;
        }

        let mut score = match properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
            _ => 0,
        };
        score += properties.limits.max_image_dimension2_d / 1024;

        log::info!(
            "Found GPU: {:?} (type: {:?}, score: {})",
            properties.device_name_as_c_str().unwrap_or(c"unknown"),
            properties.device_type,
            score
        );

        if best.is_none_or(|(best_score, _)| score > best_score) {
            best = Some((score, device));
        }
    }

    best.map(|(_, device)| device)
        .ok_or_else(|| GraphicsError::InitializationFailed("No suitable GPU found".to_string()))
}

/// Pick one family per queue kind.
///
/// Compute prefers a family without graphics, transfer one with neither
/// graphics nor compute. Each falls back to the family above it.
pub fn select_queue_families(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<QueueFamilies, GraphicsError> {
    let properties =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

    let find = |required: vk::QueueFlags, excluded: vk::QueueFlags| {
        properties
            .iter()
            .position(|family| {
                family.queue_count > 0
                    && family.queue_flags.contains(required)
                    && !family.queue_flags.intersects(excluded)
            })
            .map(|index| index as u32)
    };

    let graphics = find(
        vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
        vk::QueueFlags::empty(),
    )
    .ok_or_else(|| {
        GraphicsError::InitializationFailed("No graphics queue family found".to_string())
    })?;
    let compute = find(vk::QueueFlags::COMPUTE, vk::QueueFlags::GRAPHICS).unwrap_or(graphics);
    let transfer = find(
        vk::QueueFlags::TRANSFER,
        vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
    )
    .unwrap_or(compute);

    Ok(QueueFamilies {
        families: [graphics, compute, transfer],
    })
}

/// Whether the device exposes `name`.
pub fn supports_extension(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    name: &CStr,
) -> bool {
    let Ok(extensions) =
        (unsafe { instance.enumerate_device_extension_properties(physical_device) })
    else {
        return false;
    };
    extensions
        .iter()
        .any(|ext| ext.extension_name_as_c_str().is_ok_and(|ext| ext == name))
}

/// Create a logical device with one queue per distinct family.
pub fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    families: &QueueFamilies,
    enable_swapchain: bool,
) -> Result<ash::Device, GraphicsError> {
    let priorities = [1.0f32];
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo<'_>> = families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(&priorities)
        })
        .collect();

    let mut extensions: Vec<*const c_char> = Vec::new();
    if enable_swapchain {
        if supports_extension(instance, physical_device, ash::khr::swapchain::NAME) {
            extensions.push(ash::khr::swapchain::NAME.as_ptr());
        } else {
            log::warn!("VK_KHR_swapchain not supported; presentation disabled");
        }
    }

    #[cfg(target_os = "macos")]
    extensions.push(ash::khr::portability_subset::NAME.as_ptr());

    let features = vk::PhysicalDeviceFeatures::default();
    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extensions)
        .enabled_features(&features);

    unsafe { instance.create_device(physical_device, &create_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create logical device: {:?}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_families_keep_graphics_first() {
        let families = QueueFamilies {
            families: [2, 0, 2],
        };
        assert_eq!(families.unique(), vec![2, 0]);
        assert_eq!(families.family(QueueKind::Transfer), 2);
    }
}
