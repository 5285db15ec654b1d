//! Vulkan instance creation.

use std::ffi::{CStr, CString, c_char};

use ash::vk;

use crate::error::GraphicsError;

use super::VulkanConfig;
use super::debug::DebugMessenger;

/// Render passes and binary semaphores only; 1.2 keeps MoltenVK in reach.
pub(super) const API_VERSION: u32 = vk::make_api_version(0, 1, 2, 0);

const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Create an instance with the extensions `config` asks for.
///
/// The debug messenger is only created when validation was requested and
/// the layer is installed.
pub(super) fn create_instance(
    entry: &ash::Entry,
    config: &VulkanConfig,
) -> Result<(ash::Instance, Option<DebugMessenger>), GraphicsError> {
    let validation = config.validation && has_validation_layer(entry);
    if config.validation && !validation {
        log::warn!("Validation layers requested but not available");
    }

    let app_name = CString::new(config.application_name.as_str()).map_err(|_| {
        GraphicsError::InvalidParameter("application name contains a NUL byte".to_string())
    })?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(c"ringframe")
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(API_VERSION);

    let mut extensions: Vec<*const c_char> = config
        .instance_extensions
        .iter()
        .map(|name| name.as_ptr())
        .collect();
    if validation {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    #[allow(unused_mut)]
    let mut create_flags = vk::InstanceCreateFlags::empty();

    #[cfg(target_os = "macos")]
    {
        extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());
        create_flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    }

    let layers: Vec<*const c_char> = if validation {
        vec![VALIDATION_LAYER_NAME.as_ptr()]
    } else {
        Vec::new()
    };

    let create_info = vk::InstanceCreateInfo::default()
        .flags(create_flags)
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers);

    let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create Vulkan instance: {:?}", e))
    })?;

    let messenger = if validation {
        match DebugMessenger::new(entry, &instance) {
            Ok(messenger) => Some(messenger),
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                return Err(e);
            }
        }
    } else {
        None
    };

    Ok((instance, messenger))
}

fn has_validation_layer(entry: &ash::Entry) -> bool {
    let Ok(layers) = (unsafe { entry.enumerate_instance_layer_properties() }) else {
        return false;
    };

    layers
        .iter()
        .any(|layer| {
            layer
                .layer_name_as_c_str()
                .is_ok_and(|name| name == VALIDATION_LAYER_NAME)
        })
}
