//! Memory for images and buffers, through gpu-allocator.

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use parking_lot::Mutex;

use crate::error::GraphicsError;

pub(super) fn create_allocator(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: &ash::Device,
) -> Result<Allocator, GraphicsError> {
    Allocator::new(&AllocatorCreateDesc {
        instance: instance.clone(),
        device: device.clone(),
        physical_device,
        debug_settings: Default::default(),
        buffer_device_address: false,
        allocation_sizes: gpu_allocator::AllocationSizes::default(),
    })
    .map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create memory allocator: {}", e))
    })
}

fn map_allocation_error(error: gpu_allocator::AllocationError) -> GraphicsError {
    match error {
        gpu_allocator::AllocationError::OutOfMemory => GraphicsError::OutOfMemory,
        other => GraphicsError::ResourceCreationFailed(format!("allocation failed: {}", other)),
    }
}

/// Allocate and bind memory for `image`. The image is left untouched on error.
pub(super) fn allocate_image(
    allocator: &Mutex<Allocator>,
    device: &ash::Device,
    image: vk::Image,
    name: &str,
) -> Result<Allocation, GraphicsError> {
    let requirements = unsafe { device.get_image_memory_requirements(image) };
    let allocation = allocator
        .lock()
        .allocate(&AllocationCreateDesc {
            name,
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })
        .map_err(map_allocation_error)?;

    if let Err(e) =
        unsafe { device.bind_image_memory(image, allocation.memory(), allocation.offset()) }
    {
        free(allocator, allocation);
        return Err(super::map_vk_error(e, "bind image memory"));
    }
    Ok(allocation)
}

/// Allocate and bind memory for `buffer`. The buffer is left untouched on error.
pub(super) fn allocate_buffer(
    allocator: &Mutex<Allocator>,
    device: &ash::Device,
    buffer: vk::Buffer,
    location: MemoryLocation,
    name: &str,
) -> Result<Allocation, GraphicsError> {
    let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
    let allocation = allocator
        .lock()
        .allocate(&AllocationCreateDesc {
            name,
            requirements,
            location,
            linear: true,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })
        .map_err(map_allocation_error)?;

    if let Err(e) =
        unsafe { device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) }
    {
        free(allocator, allocation);
        return Err(super::map_vk_error(e, "bind buffer memory"));
    }
    Ok(allocation)
}

pub(super) fn free(allocator: &Mutex<Allocator>, allocation: Allocation) {
    if let Err(e) = allocator.lock().free(allocation) {
        log::error!("Failed to free GPU allocation: {}", e);
    }
}
