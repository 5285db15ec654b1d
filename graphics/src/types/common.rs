//! Common types shared across the graphics system.

// ============================================================================
// Queues
// ============================================================================

/// Hardware queue a pass or command buffer targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum QueueKind {
    /// Universal queue: graphics, compute and transfer.
    #[default]
    Graphics,
    /// Async compute queue.
    Compute,
    /// Dedicated transfer queue.
    Transfer,
}

impl QueueKind {
    /// Every queue kind, in submission-index order.
    pub const ALL: [QueueKind; 3] = [QueueKind::Graphics, QueueKind::Compute, QueueKind::Transfer];

    /// Dense index of this queue kind.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short name used in logs and debug labels.
    pub fn name(self) -> &'static str {
        match self {
            Self::Graphics => "graphics",
            Self::Compute => "compute",
            Self::Transfer => "transfer",
        }
    }
}

// ============================================================================
// Extents
// ============================================================================

/// Size of a texture or copy region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth in pixels (1 for 2D textures).
    pub depth: u32,
}

impl Extent3d {
    /// Create a new 2D extent.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Create a new 3D extent.
    pub fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Extent of mip level `level`, never smaller than one texel.
    pub fn mip_level(&self, level: u32) -> Self {
        Self {
            width: (self.width >> level).max(1),
            height: (self.height >> level).max(1),
            depth: (self.depth >> level).max(1),
        }
    }

    /// Number of mip levels in a full chain down to 1x1.
    pub fn max_mip_levels(&self) -> u32 {
        let largest = self.width.max(self.height).max(self.depth).max(1);
        32 - largest.leading_zeros()
    }
}

/// Texel offset into a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Offset3d {
    /// X offset in texels.
    pub x: i32,
    /// Y offset in texels.
    pub y: i32,
    /// Z offset in texels.
    pub z: i32,
}

// ============================================================================
// Viewport / Scissor
// ============================================================================

/// Viewport with a `[0, 1]` depth range by default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// X coordinate of the top-left corner.
    pub x: f32,
    /// Y coordinate of the top-left corner.
    pub y: f32,
    /// Width of the viewport.
    pub width: f32,
    /// Height of the viewport.
    pub height: f32,
    /// Minimum depth value.
    pub min_depth: f32,
    /// Maximum depth value.
    pub max_depth: f32,
}

impl Viewport {
    /// Create a viewport covering `extent`.
    pub fn from_extent(extent: Extent3d) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Scissor rectangle in framebuffer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScissorRect {
    /// X coordinate of the top-left corner.
    pub x: i32,
    /// Y coordinate of the top-left corner.
    pub y: i32,
    /// Width of the rectangle.
    pub width: u32,
    /// Height of the rectangle.
    pub height: u32,
}

impl ScissorRect {
    /// Create a scissor covering `extent`.
    pub fn from_extent(extent: Extent3d) -> Self {
        Self {
            x: 0,
            y: 0,
            width: extent.width,
            height: extent.height,
        }
    }
}

// ============================================================================
// Clear values
// ============================================================================

/// Value an attachment is cleared to when its load op is [`LoadOp::Clear`](super::LoadOp::Clear).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Clear color attachment with RGBA values.
    Color([f32; 4]),
    /// Clear depth and stencil.
    DepthStencil {
        /// Depth value.
        depth: f32,
        /// Stencil value.
        stencil: u32,
    },
}

impl ClearValue {
    /// Opaque black.
    pub const BLACK: Self = Self::Color([0.0, 0.0, 0.0, 1.0]);
    /// Transparent black.
    pub const TRANSPARENT: Self = Self::Color([0.0; 4]);
    /// Far plane for a `[0, 1]` depth buffer.
    pub const DEPTH_ONE: Self = Self::DepthStencil {
        depth: 1.0,
        stencil: 0,
    };
}

impl Default for ClearValue {
    fn default() -> Self {
        Self::BLACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_extent() {
        let extent = Extent3d::new_2d(256, 64);
        assert_eq!(extent.mip_level(1), Extent3d::new_2d(128, 32));
        assert_eq!(extent.mip_level(7), Extent3d::new_2d(2, 1));
        assert_eq!(extent.mip_level(20), Extent3d::new_2d(1, 1));
    }

    #[test]
    fn test_max_mip_levels() {
        assert_eq!(Extent3d::new_2d(256, 64).max_mip_levels(), 9);
        assert_eq!(Extent3d::new_2d(1, 1).max_mip_levels(), 1);
        assert_eq!(Extent3d::new_2d(300, 200).max_mip_levels(), 9);
    }
}
