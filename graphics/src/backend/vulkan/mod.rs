//! Native Vulkan backend implementation using ash.
//!
//! The backend either creates its own instance and device
//! ([`VulkanBackend::new`]) or wraps ones the application already owns
//! ([`VulkanBackend::from_raw`]). Memory comes from gpu-allocator in both
//! cases. Each [`QueueKind`] maps to one queue; kinds that share a queue
//! share its submission lock.

mod allocator;
pub(crate) mod conversion;
mod debug;
mod device;
mod instance;
mod pipeline;
mod swapchain;

use std::ffi::{CStr, CString};
use std::mem::ManuallyDrop;

use ash::vk;
use gpu_allocator::vulkan::Allocator;
use parking_lot::Mutex;

use crate::error::GraphicsError;
use crate::swapchain::SwapchainDescriptor;
use crate::types::{
    BufferDescriptor, DescriptorSetLayoutDescriptor, DescriptorType, Extent3d, IndexFormat,
    PipelineDescriptor, QueueKind, RenderPassLayout, ScissorRect, TextureDescriptor,
    TextureFormat, TextureUsage, Viewport,
};

use super::{
    AcquireOutcome, BlitRegion, DeviceCapabilities, GpuBackend, GpuBuffer, GpuCommandBuffer,
    GpuCommandPool, GpuDescriptorSet, GpuDescriptorSetLayout, GpuFence, GpuFramebuffer,
    GpuPipeline, GpuRenderPass, GpuSemaphore, GpuSwapchain, GpuTexture, MemoryRequirements,
    RawBufferBarrier, RawDescriptorResource, RawDescriptorWrite, RawTextureBarrier,
    RenderPassBeginInfo, SubmitInfo,
};

use self::conversion::{
    aspect_mask, buffer_memory_location, convert_access, convert_buffer_usage,
    convert_clear_value, convert_descriptor_type, convert_dst_stages, convert_image_layout,
    convert_index_format, convert_sample_count, convert_shader_stages, convert_src_stages,
    convert_subresource_range, convert_texture_format, convert_texture_usage,
    required_format_features,
};
use self::debug::DebugMessenger;

pub use self::device::QueueFamilies as VulkanQueueFamilies;

/// Map a Vulkan result code to a [`GraphicsError`].
pub(crate) fn map_vk_error(result: vk::Result, what: &str) -> GraphicsError {
    match result {
        vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
            GraphicsError::OutOfMemory
        }
        vk::Result::ERROR_DEVICE_LOST => GraphicsError::DeviceLost,
        vk::Result::ERROR_OUT_OF_DATE_KHR => GraphicsError::SurfaceOutdated,
        vk::Result::ERROR_SURFACE_LOST_KHR => GraphicsError::SurfaceLost,
        other => GraphicsError::Internal(format!("{} failed: {:?}", what, other)),
    }
}

#[cold]
fn foreign(object: &dyn std::fmt::Debug) -> ! {
    panic!("{:?} does not belong to the Vulkan backend", object)
}

fn raw_cmd(cmd: GpuCommandBuffer) -> vk::CommandBuffer {
    match cmd {
        GpuCommandBuffer::Vulkan(cmd) => cmd,
        other => foreign(&other),
    }
}

fn raw_buffer(buffer: &GpuBuffer) -> vk::Buffer {
    match buffer {
        GpuBuffer::Vulkan { buffer, .. } => *buffer,
        other => foreign(other),
    }
}

fn raw_image(texture: &GpuTexture) -> (vk::Image, vk::ImageView, vk::ImageAspectFlags) {
    match texture {
        GpuTexture::Vulkan {
            image,
            view,
            aspect,
            ..
        } => (*image, *view, *aspect),
        other => foreign(other),
    }
}

fn raw_pipeline(
    pipeline: &GpuPipeline,
) -> (vk::Pipeline, vk::PipelineLayout, vk::PipelineBindPoint) {
    match pipeline {
        GpuPipeline::Vulkan {
            pipeline,
            layout,
            bind_point,
        } => (*pipeline, *layout, *bind_point),
        other => foreign(other),
    }
}

fn raw_semaphore(semaphore: &GpuSemaphore) -> vk::Semaphore {
    match semaphore {
        GpuSemaphore::Vulkan(semaphore) => *semaphore,
        other => foreign(other),
    }
}

fn raw_fence(fence: &GpuFence) -> vk::Fence {
    match fence {
        GpuFence::Vulkan(fence) => *fence,
        other => foreign(other),
    }
}

fn raw_render_pass(render_pass: &GpuRenderPass) -> vk::RenderPass {
    match render_pass {
        GpuRenderPass::Vulkan(render_pass) => *render_pass,
        other => foreign(other),
    }
}

fn raw_swapchain(swapchain: &GpuSwapchain) -> (vk::SwapchainKHR, vk::Format, vk::Extent2D) {
    match swapchain {
        GpuSwapchain::Vulkan {
            swapchain,
            format,
            extent,
        } => (*swapchain, *format, *extent),
        other => foreign(other),
    }
}

fn far_corner(extent: &Extent3d) -> vk::Offset3D {
    vk::Offset3D {
        x: extent.width as i32,
        y: extent.height as i32,
        z: extent.depth as i32,
    }
}

/// Settings for a backend that owns its instance and device.
#[derive(Debug, Clone)]
pub struct VulkanConfig {
    /// Application name reported to the driver.
    pub application_name: String,
    /// Enable `VK_LAYER_KHRONOS_validation` when installed.
    pub validation: bool,
    /// Extra instance extensions, typically the platform surface extensions.
    pub instance_extensions: Vec<&'static CStr>,
    /// Enable `VK_KHR_swapchain` on the device when supported.
    pub swapchain: bool,
}

impl Default for VulkanConfig {
    fn default() -> Self {
        Self {
            application_name: "ringframe".to_string(),
            validation: cfg!(debug_assertions),
            instance_extensions: vec![ash::khr::surface::NAME],
            swapchain: true,
        }
    }
}

impl VulkanConfig {
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_instance_extension(mut self, name: &'static CStr) -> Self {
        if !self.instance_extensions.contains(&name) {
            self.instance_extensions.push(name);
        }
        self
    }
}

/// Objects of an application-owned Vulkan device.
///
/// Queues are indexed by [`QueueKind::index`]. Kinds may share a queue.
pub struct VulkanDeviceInfo {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub queue_families: [u32; 3],
    pub queues: [vk::Queue; 3],
    /// Surface to present to, if any.
    pub surface: Option<vk::SurfaceKHR>,
    /// The instance has `VK_EXT_debug_utils` enabled.
    pub debug_utils: bool,
}

struct QueueSlot {
    family: u32,
    queue: vk::Queue,
    lock: usize,
}

/// Vulkan implementation of [`GpuBackend`].
pub struct VulkanBackend {
    entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    queues: [QueueSlot; 3],
    /// One lock per distinct `vk::Queue`.
    queue_locks: Vec<Mutex<()>>,
    /// Dropped by hand before the device.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,
    surface: Option<vk::SurfaceKHR>,
    debug_messenger: Option<DebugMessenger>,
    debug_labels: Option<ash::ext::debug_utils::Device>,
    capabilities: DeviceCapabilities,
    /// Instance, device and surface are destroyed with the backend.
    owned: bool,
}

impl std::fmt::Debug for VulkanBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanBackend")
            .field("device", &self.capabilities.device_name)
            .field("owned", &self.owned)
            .finish_non_exhaustive()
    }
}

impl VulkanBackend {
    /// Create an instance, pick a device and create it.
    pub fn new(config: &VulkanConfig) -> Result<Self, GraphicsError> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            GraphicsError::InitializationFailed(format!("Failed to load Vulkan: {}", e))
        })?;

        let (instance, debug_messenger) = instance::create_instance(&entry, config)?;

        let opened = device::select_physical_device(&instance).and_then(|physical_device| {
            let families = device::select_queue_families(&instance, physical_device)?;
            let device = device::create_logical_device(
                &instance,
                physical_device,
                &families,
                config.swapchain,
            )?;
            Ok((physical_device, families, device))
        });
        let (physical_device, families, device) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                unsafe {
                    if let Some(messenger) = &debug_messenger {
                        messenger.destroy();
                    }
                    instance.destroy_instance(None);
                }
                return Err(e);
            }
        };

        let queues = families
            .families
            .map(|family| unsafe { device.get_device_queue(family, 0) });

        let info = VulkanDeviceInfo {
            entry,
            instance,
            physical_device,
            device,
            queue_families: families.families,
            queues,
            surface: None,
            debug_utils: debug_messenger.is_some(),
        };

        // SAFETY: every object in `info` was created above and is handed over
        let mut backend = unsafe { Self::from_raw(info)? };
        backend.owned = true;
        backend.debug_messenger = debug_messenger;

        log::info!(
            "Vulkan backend initialized on {} (validation: {})",
            backend.capabilities.device_name,
            backend.debug_messenger.is_some()
        );
        Ok(backend)
    }

    /// Wrap an application-owned device.
    ///
    /// # Safety
    ///
    /// Every handle in `info` must be valid and must outlive the backend.
    /// The application keeps ownership and destroys them after the backend
    /// is dropped.
    pub unsafe fn from_raw(info: VulkanDeviceInfo) -> Result<Self, GraphicsError> {
        let allocator =
            allocator::create_allocator(&info.instance, info.physical_device, &info.device)?;

        let mut distinct: Vec<vk::Queue> = Vec::with_capacity(3);
        let queues = std::array::from_fn(|index| {
            let queue = info.queues[index];
            let lock = match distinct.iter().position(|q| *q == queue) {
                Some(lock) => lock,
                None => {
                    distinct.push(queue);
                    distinct.len() - 1
                }
            };
            QueueSlot {
                family: info.queue_families[index],
                queue,
                lock,
            }
        });
        let queue_locks = distinct.iter().map(|_| Mutex::new(())).collect();

        let properties = unsafe {
            info.instance
                .get_physical_device_properties(info.physical_device)
        };
        let families = VulkanQueueFamilies {
            families: info.queue_families,
        };
        let capabilities = DeviceCapabilities {
            device_name: properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string()),
            max_texture_dimension_2d: properties.limits.max_image_dimension2_d,
            min_uniform_buffer_offset_alignment: properties
                .limits
                .min_uniform_buffer_offset_alignment,
            max_push_constants_size: properties.limits.max_push_constants_size,
            dedicated_compute_queue: families.family(QueueKind::Compute)
                != families.family(QueueKind::Graphics),
            dedicated_transfer_queue: families.family(QueueKind::Transfer)
                != families.family(QueueKind::Graphics),
        };

        let surface_loader = ash::khr::surface::Instance::new(&info.entry, &info.instance);
        let swapchain_loader = ash::khr::swapchain::Device::new(&info.instance, &info.device);
        let debug_labels = info
            .debug_utils
            .then(|| ash::ext::debug_utils::Device::new(&info.instance, &info.device));

        Ok(Self {
            entry: info.entry,
            instance: info.instance,
            physical_device: info.physical_device,
            device: info.device,
            queues,
            queue_locks,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            surface_loader,
            swapchain_loader,
            surface: info.surface,
            debug_messenger: None,
            debug_labels,
            capabilities,
            owned: false,
        })
    }

    /// Attach the surface swapchains are created on.
    ///
    /// A backend made by [`new`](Self::new) takes ownership of the surface.
    pub fn with_surface(mut self, surface: vk::SurfaceKHR) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn queue_families(&self) -> VulkanQueueFamilies {
        VulkanQueueFamilies {
            families: self.queues.each_ref().map(|slot| slot.family),
        }
    }

    fn slot(&self, queue: QueueKind) -> &QueueSlot {
        &self.queues[queue.index()]
    }

    fn create_view(
        &self,
        image: vk::Image,
        view_type: vk::ImageViewType,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> Result<vk::ImageView, GraphicsError> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            });
        unsafe { self.device.create_image_view(&create_info, None) }
            .map_err(|e| map_vk_error(e, "create image view"))
    }

    fn image_create_info(descriptor: &TextureDescriptor) -> vk::ImageCreateInfo<'static> {
        let image_type = if descriptor.size.depth > 1 {
            vk::ImageType::TYPE_3D
        } else {
            vk::ImageType::TYPE_2D
        };
        vk::ImageCreateInfo::default()
            .image_type(image_type)
            .format(convert_texture_format(descriptor.format))
            .extent(vk::Extent3D {
                width: descriptor.size.width,
                height: descriptor.size.height,
                depth: descriptor.size.depth.max(1),
            })
            .mip_levels(descriptor.mip_level_count)
            .array_layers(1)
            .samples(convert_sample_count(descriptor.sample_count))
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(convert_texture_usage(descriptor.usage, descriptor.format))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // The allocator frees its memory blocks through the device
            ManuallyDrop::drop(&mut self.allocator);

            if self.owned {
                if let Some(surface) = self.surface.take() {
                    self.surface_loader.destroy_surface(surface, None);
                }
                self.device.destroy_device(None);
                if let Some(messenger) = self.debug_messenger.take() {
                    messenger.destroy();
                }
                self.instance.destroy_instance(None);
            }
        }
        log::info!("Vulkan backend destroyed (owned: {})", self.owned);
    }
}

impl GpuBackend for VulkanBackend {
    fn name(&self) -> &'static str {
        "Vulkan Backend (ash)"
    }

    fn queue_family(&self, queue: QueueKind) -> u32 {
        self.slot(queue).family
    }

    fn supports_format(&self, format: TextureFormat, usage: TextureUsage) -> bool {
        let properties = unsafe {
            self.instance.get_physical_device_format_properties(
                self.physical_device,
                convert_texture_format(format),
            )
        };
        properties
            .optimal_tiling_features
            .contains(required_format_features(usage, format))
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities.clone()
    }

    fn texture_memory_requirements(&self, descriptor: &TextureDescriptor) -> MemoryRequirements {
        let create_info = Self::image_create_info(descriptor);
        match unsafe { self.device.create_image(&create_info, None) } {
            Ok(image) => {
                let requirements = unsafe { self.device.get_image_memory_requirements(image) };
                unsafe { self.device.destroy_image(image, None) };
                MemoryRequirements {
                    size: requirements.size,
                    alignment: requirements.alignment,
                }
            }
            Err(e) => {
                log::warn!("Could not query texture memory requirements: {:?}", e);
                let size = descriptor.size;
                MemoryRequirements {
                    size: u64::from(size.width)
                        * u64::from(size.height)
                        * u64::from(size.depth.max(1))
                        * u64::from(descriptor.format.block_size()),
                    alignment: 1,
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Textures and buffers
    // ------------------------------------------------------------------

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<GpuTexture, GraphicsError> {
        log::trace!(
            "VulkanBackend: creating texture {:?} ({}x{}x{}, {:?})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth,
            descriptor.format
        );

        let create_info = Self::image_create_info(descriptor);
        let image = unsafe { self.device.create_image(&create_info, None) }
            .map_err(|e| map_vk_error(e, "create image"))?;

        let name = descriptor.label.as_deref().unwrap_or("texture");
        let allocation =
            match allocator::allocate_image(&self.allocator, &self.device, image, name) {
                Ok(allocation) => allocation,
                Err(e) => {
                    unsafe { self.device.destroy_image(image, None) };
                    return Err(e);
                }
            };

        let aspect = aspect_mask(descriptor.format);
        let view_type = if create_info.image_type == vk::ImageType::TYPE_3D {
            vk::ImageViewType::TYPE_3D
        } else {
            vk::ImageViewType::TYPE_2D
        };
        let view = match self.create_view(image, view_type, create_info.format, aspect) {
            Ok(view) => view,
            Err(e) => {
                allocator::free(&self.allocator, allocation);
                unsafe { self.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        Ok(GpuTexture::Vulkan {
            image,
            view,
            allocation: Some(allocation),
            aspect,
            extent: create_info.extent,
            mip_levels: descriptor.mip_level_count,
        })
    }

    fn destroy_texture(&self, texture: GpuTexture) {
        match texture {
            GpuTexture::Vulkan {
                image,
                view,
                allocation,
                ..
            } => unsafe {
                self.device.destroy_image_view(view, None);
                // Swapchain images have no allocation and belong to the swapchain
                if let Some(allocation) = allocation {
                    self.device.destroy_image(image, None);
                    allocator::free(&self.allocator, allocation);
                }
            },
            other => foreign(&other),
        }
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size must be non-zero".to_string(),
            ));
        }

        let create_info = vk::BufferCreateInfo::default()
            .size(descriptor.size)
            .usage(convert_buffer_usage(descriptor.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device.create_buffer(&create_info, None) }
            .map_err(|e| map_vk_error(e, "create buffer"))?;

        let allocation = match allocator::allocate_buffer(
            &self.allocator,
            &self.device,
            buffer,
            buffer_memory_location(descriptor.usage),
            descriptor.label.as_deref().unwrap_or("buffer"),
        ) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        Ok(GpuBuffer::Vulkan {
            buffer,
            allocation: Some(allocation),
            size: descriptor.size,
        })
    }

    fn destroy_buffer(&self, buffer: GpuBuffer) {
        match buffer {
            GpuBuffer::Vulkan {
                buffer, allocation, ..
            } => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                if let Some(allocation) = allocation {
                    allocator::free(&self.allocator, allocation);
                }
            }
            other => foreign(&other),
        }
    }

    fn write_buffer(
        &self,
        buffer: &GpuBuffer,
        offset: u64,
        data: &[u8],
    ) -> Result<(), GraphicsError> {
        let GpuBuffer::Vulkan {
            allocation, size, ..
        } = buffer
        else {
            return Err(GraphicsError::Internal(
                "write_buffer called with non-Vulkan buffer".to_string(),
            ));
        };

        if offset + data.len() as u64 > *size {
            return Err(GraphicsError::InvalidParameter(format!(
                "write of {} bytes at offset {} overflows a {} byte buffer",
                data.len(),
                offset,
                size
            )));
        }

        let Some(mapped) = allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr())
        else {
            return Err(GraphicsError::InvalidParameter(
                "buffer is not host visible".to_string(),
            ));
        };

        // SAFETY: the range was checked against the buffer size and the
        // mapping covers the whole allocation
        unsafe {
            let dst = mapped.as_ptr().cast::<u8>().add(offset as usize);
            std::ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len());
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Render passes and framebuffers
    // ------------------------------------------------------------------

    fn create_render_pass(
        &self,
        layout: &RenderPassLayout,
    ) -> Result<GpuRenderPass, GraphicsError> {
        pipeline::create_render_pass(&self.device, layout).map(GpuRenderPass::Vulkan)
    }

    fn destroy_render_pass(&self, render_pass: GpuRenderPass) {
        let render_pass = raw_render_pass(&render_pass);
        unsafe { self.device.destroy_render_pass(render_pass, None) };
    }

    fn create_framebuffer(
        &self,
        render_pass: &GpuRenderPass,
        attachments: &[&GpuTexture],
        extent: Extent3d,
    ) -> Result<GpuFramebuffer, GraphicsError> {
        let views: Vec<vk::ImageView> = attachments
            .iter()
            .map(|texture| raw_image(texture).1)
            .collect();
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(raw_render_pass(render_pass))
            .attachments(&views)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        unsafe { self.device.create_framebuffer(&create_info, None) }
            .map(GpuFramebuffer::Vulkan)
            .map_err(|e| map_vk_error(e, "create framebuffer"))
    }

    fn destroy_framebuffer(&self, framebuffer: GpuFramebuffer) {
        match framebuffer {
            GpuFramebuffer::Vulkan(framebuffer) => unsafe {
                self.device.destroy_framebuffer(framebuffer, None)
            },
            other => foreign(&other),
        }
    }

    // ------------------------------------------------------------------
    // Descriptors
    // ------------------------------------------------------------------

    fn create_descriptor_set_layout(
        &self,
        descriptor: &DescriptorSetLayoutDescriptor,
    ) -> Result<GpuDescriptorSetLayout, GraphicsError> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = descriptor
            .bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.binding)
                    .descriptor_type(convert_descriptor_type(binding.ty))
                    .descriptor_count(1)
                    .stage_flags(convert_shader_stages(binding.stages))
            })
            .collect();

        let mut pool_sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
        for binding in &bindings {
            match pool_sizes
                .iter_mut()
                .find(|size| size.ty == binding.descriptor_type)
            {
                Some(size) => size.descriptor_count += 1,
                None => pool_sizes.push(vk::DescriptorPoolSize {
                    ty: binding.descriptor_type,
                    descriptor_count: 1,
                }),
            }
        }

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let layout = unsafe { self.device.create_descriptor_set_layout(&create_info, None) }
            .map_err(|e| map_vk_error(e, "create descriptor set layout"))?;

        Ok(GpuDescriptorSetLayout::Vulkan { layout, pool_sizes })
    }

    fn destroy_descriptor_set_layout(&self, layout: GpuDescriptorSetLayout) {
        match layout {
            GpuDescriptorSetLayout::Vulkan { layout, .. } => unsafe {
                self.device.destroy_descriptor_set_layout(layout, None)
            },
            other => foreign(&other),
        }
    }

    fn create_descriptor_set(
        &self,
        layout: &GpuDescriptorSetLayout,
    ) -> Result<GpuDescriptorSet, GraphicsError> {
        let GpuDescriptorSetLayout::Vulkan { layout, pool_sizes } = layout else {
            foreign(layout)
        };

        // A layout without bindings still needs a non-empty pool
        let fallback = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
        }];
        let sizes: &[vk::DescriptorPoolSize] = if pool_sizes.is_empty() {
            &fallback
        } else {
            pool_sizes
        };

        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(1)
            .pool_sizes(sizes);
        let pool = unsafe { self.device.create_descriptor_pool(&pool_info, None) }
            .map_err(|e| map_vk_error(e, "create descriptor pool"))?;

        let layouts = [*layout];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        match unsafe { self.device.allocate_descriptor_sets(&allocate_info) } {
            Ok(sets) => Ok(GpuDescriptorSet::Vulkan { set: sets[0], pool }),
            Err(e) => {
                unsafe { self.device.destroy_descriptor_pool(pool, None) };
                Err(map_vk_error(e, "allocate descriptor set"))
            }
        }
    }

    fn update_descriptor_set(&self, set: &GpuDescriptorSet, writes: &[RawDescriptorWrite<'_>]) {
        let GpuDescriptorSet::Vulkan { set, .. } = set else {
            foreign(set)
        };

        enum Info {
            Buffer(vk::DescriptorBufferInfo),
            Image(vk::DescriptorImageInfo),
        }

        let infos: Vec<Info> = writes
            .iter()
            .map(|write| match write.resource {
                RawDescriptorResource::Buffer {
                    buffer,
                    offset,
                    size,
                } => Info::Buffer(vk::DescriptorBufferInfo {
                    buffer: raw_buffer(buffer),
                    offset,
                    range: size,
                }),
                RawDescriptorResource::Texture(texture) => {
                    let layout = if write.ty == DescriptorType::StorageTexture {
                        vk::ImageLayout::GENERAL
                    } else {
                        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
                    };
                    Info::Image(vk::DescriptorImageInfo {
                        sampler: vk::Sampler::null(),
                        image_view: raw_image(texture).1,
                        image_layout: layout,
                    })
                }
            })
            .collect();

        let vk_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .zip(&infos)
            .map(|(write, info)| {
                let base = vk::WriteDescriptorSet::default()
                    .dst_set(*set)
                    .dst_binding(write.binding)
                    .descriptor_type(convert_descriptor_type(write.ty));
                match info {
                    Info::Buffer(info) => base.buffer_info(std::slice::from_ref(info)),
                    Info::Image(info) => base.image_info(std::slice::from_ref(info)),
                }
            })
            .collect();

        unsafe { self.device.update_descriptor_sets(&vk_writes, &[]) };
    }

    fn destroy_descriptor_set(&self, set: GpuDescriptorSet) {
        match set {
            // Destroying the pool frees the set with it
            GpuDescriptorSet::Vulkan { pool, .. } => unsafe {
                self.device.destroy_descriptor_pool(pool, None)
            },
            other => foreign(&other),
        }
    }

    // ------------------------------------------------------------------
    // Pipelines
    // ------------------------------------------------------------------

    fn create_pipeline(
        &self,
        descriptor: &PipelineDescriptor,
        set_layouts: &[&GpuDescriptorSetLayout],
        render_pass: Option<&GpuRenderPass>,
    ) -> Result<GpuPipeline, GraphicsError> {
        let layouts: Vec<vk::DescriptorSetLayout> = set_layouts
            .iter()
            .map(|layout| match layout {
                GpuDescriptorSetLayout::Vulkan { layout, .. } => *layout,
                other => foreign(other),
            })
            .collect();

        let bind_point = if descriptor.is_compute() {
            vk::PipelineBindPoint::COMPUTE
        } else {
            vk::PipelineBindPoint::GRAPHICS
        };

        let layout = pipeline::create_pipeline_layout(
            &self.device,
            &layouts,
            descriptor.push_constant_size,
            bind_point,
        )?;

        match pipeline::create_pipeline(
            &self.device,
            descriptor,
            layout,
            render_pass.map(raw_render_pass),
        ) {
            Ok(pipeline) => Ok(GpuPipeline::Vulkan {
                pipeline,
                layout,
                bind_point,
            }),
            Err(e) => {
                unsafe { self.device.destroy_pipeline_layout(layout, None) };
                Err(e)
            }
        }
    }

    fn destroy_pipeline(&self, pipeline: GpuPipeline) {
        let (pipeline, layout, _) = raw_pipeline(&pipeline);
        unsafe {
            self.device.destroy_pipeline(pipeline, None);
            self.device.destroy_pipeline_layout(layout, None);
        }
    }

    // ------------------------------------------------------------------
    // Synchronization objects
    // ------------------------------------------------------------------

    fn create_fence(&self, signaled: bool) -> Result<GpuFence, GraphicsError> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        unsafe { self.device.create_fence(&create_info, None) }
            .map(GpuFence::Vulkan)
            .map_err(|e| map_vk_error(e, "create fence"))
    }

    fn destroy_fence(&self, fence: GpuFence) {
        let fence = raw_fence(&fence);
        unsafe { self.device.destroy_fence(fence, None) };
    }

    fn wait_fences(&self, fences: &[&GpuFence]) -> Result<(), GraphicsError> {
        if fences.is_empty() {
            return Ok(());
        }
        let raw: Vec<vk::Fence> = fences.iter().map(|fence| raw_fence(fence)).collect();
        unsafe { self.device.wait_for_fences(&raw, true, u64::MAX) }.map_err(|e| {
            log::error!("Fence wait failed: {:?}", e);
            match e {
                vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
                    GraphicsError::OutOfMemory
                }
                _ => GraphicsError::DeviceLost,
            }
        })
    }

    fn reset_fences(&self, fences: &[&GpuFence]) -> Result<(), GraphicsError> {
        if fences.is_empty() {
            return Ok(());
        }
        let raw: Vec<vk::Fence> = fences.iter().map(|fence| raw_fence(fence)).collect();
        unsafe { self.device.reset_fences(&raw) }.map_err(|e| map_vk_error(e, "reset fences"))
    }

    fn is_fence_signaled(&self, fence: &GpuFence) -> bool {
        unsafe { self.device.get_fence_status(raw_fence(fence)) }.unwrap_or(false)
    }

    fn create_semaphore(&self) -> Result<GpuSemaphore, GraphicsError> {
        let create_info = vk::SemaphoreCreateInfo::default();
        unsafe { self.device.create_semaphore(&create_info, None) }
            .map(GpuSemaphore::Vulkan)
            .map_err(|e| map_vk_error(e, "create semaphore"))
    }

    fn destroy_semaphore(&self, semaphore: GpuSemaphore) {
        let semaphore = raw_semaphore(&semaphore);
        unsafe { self.device.destroy_semaphore(semaphore, None) };
    }

    // ------------------------------------------------------------------
    // Command pools and buffers
    // ------------------------------------------------------------------

    fn create_command_pool(&self, queue: QueueKind) -> Result<GpuCommandPool, GraphicsError> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(self.slot(queue).family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        unsafe { self.device.create_command_pool(&create_info, None) }
            .map(GpuCommandPool::Vulkan)
            .map_err(|e| map_vk_error(e, "create command pool"))
    }

    fn reset_command_pool(&self, pool: &GpuCommandPool) -> Result<(), GraphicsError> {
        let GpuCommandPool::Vulkan(pool) = pool else {
            foreign(pool)
        };
        unsafe {
            self.device
                .reset_command_pool(*pool, vk::CommandPoolResetFlags::empty())
        }
        .map_err(|e| map_vk_error(e, "reset command pool"))
    }

    fn destroy_command_pool(&self, pool: GpuCommandPool) {
        match pool {
            GpuCommandPool::Vulkan(pool) => unsafe {
                self.device.destroy_command_pool(pool, None)
            },
            other => foreign(&other),
        }
    }

    fn allocate_command_buffer(
        &self,
        pool: &GpuCommandPool,
    ) -> Result<GpuCommandBuffer, GraphicsError> {
        let GpuCommandPool::Vulkan(pool) = pool else {
            foreign(pool)
        };
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(*pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffers = unsafe { self.device.allocate_command_buffers(&allocate_info) }
            .map_err(|e| map_vk_error(e, "allocate command buffer"))?;
        buffers
            .first()
            .copied()
            .map(GpuCommandBuffer::Vulkan)
            .ok_or_else(|| GraphicsError::Internal("driver returned no command buffer".to_string()))
    }

    fn begin_command_buffer(&self, cmd: GpuCommandBuffer) -> Result<(), GraphicsError> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(raw_cmd(cmd), &begin_info) }
            .map_err(|e| map_vk_error(e, "begin command buffer"))
    }

    fn end_command_buffer(&self, cmd: GpuCommandBuffer) -> Result<(), GraphicsError> {
        unsafe { self.device.end_command_buffer(raw_cmd(cmd)) }
            .map_err(|e| map_vk_error(e, "end command buffer"))
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    fn cmd_pipeline_barrier(
        &self,
        cmd: GpuCommandBuffer,
        textures: &[RawTextureBarrier<'_>],
        buffers: &[RawBufferBarrier<'_>],
    ) {
        if textures.is_empty() && buffers.is_empty() {
            return;
        }

        let mut src_stages = vk::PipelineStageFlags::empty();
        let mut dst_stages = vk::PipelineStageFlags::empty();

        let image_barriers: Vec<vk::ImageMemoryBarrier> = textures
            .iter()
            .map(|barrier| {
                src_stages |= convert_src_stages(barrier.src.stages);
                dst_stages |= convert_dst_stages(barrier.dst.stages);
                let (image, _, aspect) = raw_image(barrier.texture);
                let (src_family, dst_family) = barrier.transfer.map_or(
                    (vk::QUEUE_FAMILY_IGNORED, vk::QUEUE_FAMILY_IGNORED),
                    |t| (t.src_family, t.dst_family),
                );
                vk::ImageMemoryBarrier::default()
                    .src_access_mask(convert_access(barrier.src.access))
                    .dst_access_mask(convert_access(barrier.dst.access))
                    .old_layout(convert_image_layout(barrier.src.layout))
                    .new_layout(convert_image_layout(barrier.dst.layout))
                    .src_queue_family_index(src_family)
                    .dst_queue_family_index(dst_family)
                    .image(image)
                    .subresource_range(convert_subresource_range(&barrier.range, aspect))
            })
            .collect();

        let buffer_barriers: Vec<vk::BufferMemoryBarrier> = buffers
            .iter()
            .map(|barrier| {
                src_stages |= convert_src_stages(barrier.src.stages);
                dst_stages |= convert_dst_stages(barrier.dst.stages);
                let (src_family, dst_family) = barrier.transfer.map_or(
                    (vk::QUEUE_FAMILY_IGNORED, vk::QUEUE_FAMILY_IGNORED),
                    |t| (t.src_family, t.dst_family),
                );
                vk::BufferMemoryBarrier::default()
                    .src_access_mask(convert_access(barrier.src.access))
                    .dst_access_mask(convert_access(barrier.dst.access))
                    .src_queue_family_index(src_family)
                    .dst_queue_family_index(dst_family)
                    .buffer(raw_buffer(barrier.buffer))
                    .offset(0)
                    .size(vk::WHOLE_SIZE)
            })
            .collect();

        unsafe {
            self.device.cmd_pipeline_barrier(
                raw_cmd(cmd),
                src_stages,
                dst_stages,
                vk::DependencyFlags::empty(),
                &[],
                &buffer_barriers,
                &image_barriers,
            );
        }
    }

    fn cmd_begin_render_pass(&self, cmd: GpuCommandBuffer, info: &RenderPassBeginInfo<'_>) {
        let framebuffer = match info.framebuffer {
            GpuFramebuffer::Vulkan(framebuffer) => *framebuffer,
            other => foreign(other),
        };
        let clear_values: Vec<vk::ClearValue> =
            info.clear_values.iter().map(convert_clear_value).collect();
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(raw_render_pass(info.render_pass))
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D {
                    width: info.extent.width,
                    height: info.extent.height,
                },
            })
            .clear_values(&clear_values);
        unsafe {
            self.device
                .cmd_begin_render_pass(raw_cmd(cmd), &begin_info, vk::SubpassContents::INLINE)
        };
    }

    fn cmd_end_render_pass(&self, cmd: GpuCommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(raw_cmd(cmd)) };
    }

    fn cmd_bind_pipeline(&self, cmd: GpuCommandBuffer, pipeline: &GpuPipeline) {
        let (pipeline, _, bind_point) = raw_pipeline(pipeline);
        unsafe {
            self.device
                .cmd_bind_pipeline(raw_cmd(cmd), bind_point, pipeline)
        };
    }

    fn cmd_bind_descriptor_set(
        &self,
        cmd: GpuCommandBuffer,
        pipeline: &GpuPipeline,
        index: u32,
        set: &GpuDescriptorSet,
    ) {
        let (_, layout, bind_point) = raw_pipeline(pipeline);
        let GpuDescriptorSet::Vulkan { set, .. } = set else {
            foreign(set)
        };
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                raw_cmd(cmd),
                bind_point,
                layout,
                index,
                &[*set],
                &[],
            );
        }
    }

    fn cmd_push_constants(
        &self,
        cmd: GpuCommandBuffer,
        pipeline: &GpuPipeline,
        offset: u32,
        data: &[u8],
    ) {
        let (_, layout, bind_point) = raw_pipeline(pipeline);
        unsafe {
            self.device.cmd_push_constants(
                raw_cmd(cmd),
                layout,
                pipeline::push_constant_stages(bind_point),
                offset,
                data,
            );
        }
    }

    fn cmd_bind_vertex_buffer(
        &self,
        cmd: GpuCommandBuffer,
        slot: u32,
        buffer: &GpuBuffer,
        offset: u64,
    ) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(raw_cmd(cmd), slot, &[raw_buffer(buffer)], &[offset]);
        }
    }

    fn cmd_bind_index_buffer(
        &self,
        cmd: GpuCommandBuffer,
        buffer: &GpuBuffer,
        offset: u64,
        format: IndexFormat,
    ) {
        unsafe {
            self.device.cmd_bind_index_buffer(
                raw_cmd(cmd),
                raw_buffer(buffer),
                offset,
                convert_index_format(format),
            );
        }
    }

    fn cmd_set_viewport(&self, cmd: GpuCommandBuffer, viewport: &Viewport) {
        let viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe { self.device.cmd_set_viewport(raw_cmd(cmd), 0, &[viewport]) };
    }

    fn cmd_set_scissor(&self, cmd: GpuCommandBuffer, scissor: &ScissorRect) {
        let scissor = vk::Rect2D {
            offset: vk::Offset2D {
                x: scissor.x,
                y: scissor.y,
            },
            extent: vk::Extent2D {
                width: scissor.width,
                height: scissor.height,
            },
        };
        unsafe { self.device.cmd_set_scissor(raw_cmd(cmd), 0, &[scissor]) };
    }

    fn cmd_draw(
        &self,
        cmd: GpuCommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw(
                raw_cmd(cmd),
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
    }

    fn cmd_draw_indexed(
        &self,
        cmd: GpuCommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed(
                raw_cmd(cmd),
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
    }

    fn cmd_dispatch(&self, cmd: GpuCommandBuffer, x: u32, y: u32, z: u32) {
        unsafe { self.device.cmd_dispatch(raw_cmd(cmd), x, y, z) };
    }

    fn cmd_copy_buffer(
        &self,
        cmd: GpuCommandBuffer,
        src: &GpuBuffer,
        src_offset: u64,
        dst: &GpuBuffer,
        dst_offset: u64,
        size: u64,
    ) {
        let region = vk::BufferCopy {
            src_offset,
            dst_offset,
            size,
        };
        unsafe {
            self.device
                .cmd_copy_buffer(raw_cmd(cmd), raw_buffer(src), raw_buffer(dst), &[region]);
        }
    }

    fn cmd_copy_buffer_to_texture(
        &self,
        cmd: GpuCommandBuffer,
        src: &GpuBuffer,
        src_offset: u64,
        dst: &GpuTexture,
        mip_level: u32,
        extent: Extent3d,
    ) {
        let (image, _, aspect) = raw_image(dst);
        // Copies address one aspect at a time
        let aspect = if aspect.contains(vk::ImageAspectFlags::DEPTH) {
            vk::ImageAspectFlags::DEPTH
        } else {
            aspect
        };
        let region = vk::BufferImageCopy {
            buffer_offset: src_offset,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: aspect,
                mip_level,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D::default(),
            image_extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: extent.depth.max(1),
            },
        };
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                raw_cmd(cmd),
                raw_buffer(src),
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
    }

    fn cmd_blit_texture(
        &self,
        cmd: GpuCommandBuffer,
        src: &GpuTexture,
        dst: &GpuTexture,
        region: &BlitRegion,
    ) {
        let (src_image, _, src_aspect) = raw_image(src);
        let (dst_image, _, dst_aspect) = raw_image(dst);
        let blit = vk::ImageBlit {
            src_subresource: vk::ImageSubresourceLayers {
                aspect_mask: src_aspect,
                mip_level: region.src_mip_level,
                base_array_layer: 0,
                layer_count: 1,
            },
            src_offsets: [vk::Offset3D::default(), far_corner(&region.src_extent)],
            dst_subresource: vk::ImageSubresourceLayers {
                aspect_mask: dst_aspect,
                mip_level: region.dst_mip_level,
                base_array_layer: 0,
                layer_count: 1,
            },
            dst_offsets: [vk::Offset3D::default(), far_corner(&region.dst_extent)],
        };
        // Depth formats only support nearest filtering
        let filter = if src_aspect.contains(vk::ImageAspectFlags::COLOR) {
            vk::Filter::LINEAR
        } else {
            vk::Filter::NEAREST
        };
        unsafe {
            self.device.cmd_blit_image(
                raw_cmd(cmd),
                src_image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                dst_image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit],
                filter,
            );
        }
    }

    fn cmd_begin_label(&self, cmd: GpuCommandBuffer, label: &str) {
        let Some(debug) = &self.debug_labels else {
            return;
        };
        let Ok(name) = CString::new(label) else {
            return;
        };
        let label = vk::DebugUtilsLabelEXT::default().label_name(&name);
        unsafe { debug.cmd_begin_debug_utils_label(raw_cmd(cmd), &label) };
    }

    fn cmd_end_label(&self, cmd: GpuCommandBuffer) {
        if let Some(debug) = &self.debug_labels {
            unsafe { debug.cmd_end_debug_utils_label(raw_cmd(cmd)) };
        }
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    fn submit(&self, queue: QueueKind, info: &SubmitInfo<'_>) -> Result<(), GraphicsError> {
        let command_buffers: Vec<vk::CommandBuffer> =
            info.command_buffers.iter().map(|cmd| raw_cmd(*cmd)).collect();
        let wait_semaphores: Vec<vk::Semaphore> = info
            .wait_semaphores
            .iter()
            .map(|(semaphore, _)| raw_semaphore(semaphore))
            .collect();
        let wait_stages: Vec<vk::PipelineStageFlags> = info
            .wait_semaphores
            .iter()
            .map(|(_, stages)| convert_dst_stages(*stages))
            .collect();
        let signal_semaphores: Vec<vk::Semaphore> = info
            .signal_semaphores
            .iter()
            .map(|semaphore| raw_semaphore(semaphore))
            .collect();
        let fence = info.fence.map_or(vk::Fence::null(), raw_fence);

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let slot = self.slot(queue);
        let _guard = self.queue_locks[slot.lock].lock();
        unsafe { self.device.queue_submit(slot.queue, &[submit_info], fence) }
            .map_err(|e| map_vk_error(e, "queue submit"))
    }

    fn wait_idle(&self) -> Result<(), GraphicsError> {
        // Queues must not be used while the device drains
        let _guards: Vec<_> = self.queue_locks.iter().map(|lock| lock.lock()).collect();
        unsafe { self.device.device_wait_idle() }.map_err(|e| map_vk_error(e, "wait idle"))
    }

    // ------------------------------------------------------------------
    // Swapchain
    // ------------------------------------------------------------------

    fn create_swapchain(
        &self,
        descriptor: &SwapchainDescriptor,
        old: Option<&GpuSwapchain>,
    ) -> Result<GpuSwapchain, GraphicsError> {
        let surface = self.surface.ok_or_else(|| {
            GraphicsError::FeatureNotSupported("backend has no surface".to_string())
        })?;
        let context = swapchain::SurfaceContext {
            surface_loader: &self.surface_loader,
            swapchain_loader: &self.swapchain_loader,
            physical_device: self.physical_device,
            surface,
            present_family: self.slot(QueueKind::Graphics).family,
        };
        let old = old.map_or(vk::SwapchainKHR::null(), |old| raw_swapchain(old).0);
        let created = swapchain::create_swapchain(&context, descriptor, old)?;

        Ok(GpuSwapchain::Vulkan {
            swapchain: created.swapchain,
            format: created.format,
            extent: created.extent,
        })
    }

    fn swapchain_textures(
        &self,
        swapchain: &GpuSwapchain,
    ) -> Result<Vec<GpuTexture>, GraphicsError> {
        let (swapchain, format, extent) = raw_swapchain(swapchain);
        let images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(|e| map_vk_error(e, "get swapchain images"))?;

        let mut textures = Vec::with_capacity(images.len());
        for image in images {
            let view = match self.create_view(
                image,
                vk::ImageViewType::TYPE_2D,
                format,
                vk::ImageAspectFlags::COLOR,
            ) {
                Ok(view) => view,
                Err(e) => {
                    for texture in textures {
                        self.destroy_texture(texture);
                    }
                    return Err(e);
                }
            };
            textures.push(GpuTexture::Vulkan {
                image,
                view,
                allocation: None,
                aspect: vk::ImageAspectFlags::COLOR,
                extent: vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                },
                mip_levels: 1,
            });
        }
        Ok(textures)
    }

    fn acquire_next_image(
        &self,
        swapchain: &GpuSwapchain,
        signal: &GpuSemaphore,
    ) -> Result<AcquireOutcome, GraphicsError> {
        let (swapchain, _, _) = raw_swapchain(swapchain);
        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                swapchain,
                u64::MAX,
                raw_semaphore(signal),
                vk::Fence::null(),
            )
        };
        match result {
            Ok((index, suboptimal)) => Ok(AcquireOutcome::Acquired { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(map_vk_error(e, "acquire next image")),
        }
    }

    fn present(
        &self,
        swapchain: &GpuSwapchain,
        index: u32,
        wait: &GpuSemaphore,
    ) -> Result<bool, GraphicsError> {
        let swapchains = [raw_swapchain(swapchain).0];
        let indices = [index];
        let waits = [raw_semaphore(wait)];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&waits)
            .swapchains(&swapchains)
            .image_indices(&indices);

        let slot = self.slot(QueueKind::Graphics);
        let _guard = self.queue_locks[slot.lock].lock();
        match unsafe { self.swapchain_loader.queue_present(slot.queue, &present_info) } {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(e) => Err(map_vk_error(e, "present")),
        }
    }

    fn destroy_swapchain(&self, swapchain: GpuSwapchain) {
        let (swapchain, _, _) = raw_swapchain(&swapchain);
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
    }
}

static_assertions::assert_impl_all!(VulkanBackend: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            map_vk_error(vk::Result::ERROR_DEVICE_LOST, "submit"),
            GraphicsError::DeviceLost
        );
        assert_eq!(
            map_vk_error(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY, "create image"),
            GraphicsError::OutOfMemory
        );
        assert_eq!(
            map_vk_error(vk::Result::ERROR_OUT_OF_DATE_KHR, "present"),
            GraphicsError::SurfaceOutdated
        );
        assert!(matches!(
            map_vk_error(vk::Result::ERROR_INITIALIZATION_FAILED, "create fence"),
            GraphicsError::Internal(message) if message.contains("create fence")
        ));
    }

    #[test]
    fn test_default_config_enables_surface_extension() {
        let config = VulkanConfig::default()
            .with_instance_extension(ash::khr::surface::NAME)
            .with_validation(false);
        assert_eq!(config.instance_extensions, vec![ash::khr::surface::NAME]);
        assert!(!config.validation);
        assert!(config.swapchain);
    }
}
