//! Descriptor set layouts and writes.

use super::ShaderStages;
use crate::resources::ResourceHandle;

/// Kind of resource bound at a descriptor binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    /// Uniform buffer.
    UniformBuffer,
    /// Read/write storage buffer.
    StorageBuffer,
    /// Image sampled through a separate sampler.
    SampledTexture,
    /// Read/write storage image.
    StorageTexture,
}

/// One binding in a descriptor set layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorBinding {
    /// Binding index in the shader.
    pub binding: u32,
    /// Resource type.
    pub ty: DescriptorType,
    /// Shader stages that can access the binding.
    pub stages: ShaderStages,
}

impl DescriptorBinding {
    /// Create a binding.
    pub fn new(binding: u32, ty: DescriptorType, stages: ShaderStages) -> Self {
        Self {
            binding,
            ty,
            stages,
        }
    }
}

/// Descriptor for creating a descriptor set layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DescriptorSetLayoutDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Bindings in the layout.
    pub bindings: Vec<DescriptorBinding>,
}

impl DescriptorSetLayoutDescriptor {
    /// Create a layout from its bindings.
    pub fn new(bindings: Vec<DescriptorBinding>) -> Self {
        Self {
            label: None,
            bindings,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Resource written into a descriptor binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorResource {
    /// Buffer range bound as uniform or storage buffer.
    Buffer {
        /// Buffer handle.
        buffer: ResourceHandle,
        /// Offset in bytes.
        offset: u64,
        /// Range in bytes.
        size: u64,
    },
    /// Whole texture bound as sampled or storage image.
    Texture(ResourceHandle),
}

/// A single descriptor write. A list of writes plus the layout is the content
/// key of a cached descriptor set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorWrite {
    /// Target binding.
    pub binding: u32,
    /// Resource to bind.
    pub resource: DescriptorResource,
}

impl DescriptorWrite {
    /// Bind a whole texture.
    pub fn texture(binding: u32, texture: ResourceHandle) -> Self {
        Self {
            binding,
            resource: DescriptorResource::Texture(texture),
        }
    }

    /// Bind a buffer range.
    pub fn buffer(binding: u32, buffer: ResourceHandle, offset: u64, size: u64) -> Self {
        Self {
            binding,
            resource: DescriptorResource::Buffer {
                buffer,
                offset,
                size,
            },
        }
    }
}
