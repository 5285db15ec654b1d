//! Render context configuration.

use crate::error::GraphicsError;

/// Default number of frames the CPU may run ahead of the GPU.
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

/// Default size of one scratch allocator chunk.
pub const DEFAULT_SCRATCH_CHUNK_SIZE: u64 = 1024 * 1024;

/// Configuration for a [`RenderContext`](crate::RenderContext).
///
/// # Example
///
/// ```
/// use ringframe_graphics::RenderContextConfig;
///
/// let config = RenderContextConfig::default()
///     .with_frames_in_flight(3)
///     .with_label("editor");
/// assert_eq!(config.handle_ring_depth(), 11);
/// assert_eq!(config.cache_ring_depth(), 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContextConfig {
    /// Number of frame ring slots.
    pub frames_in_flight: usize,
    /// Extra handle-allocator ring slots on top of `frames_in_flight`.
    pub handle_ring_margin: usize,
    /// Extra temporal cache ring slots on top of `frames_in_flight`.
    pub cache_ring_margin: usize,
    /// Size of one per-frame scratch chunk in bytes.
    pub scratch_chunk_size: u64,
    /// Signal a frame fence on the last submission of every queue.
    ///
    /// When disabled, [`end_frame`](crate::RenderContext::end_frame) closes
    /// each queue that received work with an extra empty fenced submission.
    pub signal_frame_fences: bool,
    /// Prefix for debug labels.
    pub label: String,
}

impl Default for RenderContextConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            handle_ring_margin: ringframe_core::handle::DEFAULT_RING_MARGIN,
            cache_ring_margin: 2,
            scratch_chunk_size: DEFAULT_SCRATCH_CHUNK_SIZE,
            signal_frame_fences: true,
            label: "ringframe".to_string(),
        }
    }
}

impl RenderContextConfig {
    /// Set the number of frames in flight.
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Set the handle ring margin.
    pub fn with_handle_ring_margin(mut self, margin: usize) -> Self {
        self.handle_ring_margin = margin;
        self
    }

    /// Set the temporal cache ring margin.
    pub fn with_cache_ring_margin(mut self, margin: usize) -> Self {
        self.cache_ring_margin = margin;
        self
    }

    /// Set the scratch chunk size.
    pub fn with_scratch_chunk_size(mut self, size: u64) -> Self {
        self.scratch_chunk_size = size;
        self
    }

    /// Enable or disable per-queue frame fences.
    pub fn with_frame_fences(mut self, enabled: bool) -> Self {
        self.signal_frame_fences = enabled;
        self
    }

    /// Set the debug label prefix.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Depth of the handle allocator's invalidation ring.
    pub fn handle_ring_depth(&self) -> usize {
        self.frames_in_flight + self.handle_ring_margin
    }

    /// Depth of the temporal caches' rings.
    pub fn cache_ring_depth(&self) -> usize {
        self.frames_in_flight + self.cache_ring_margin
    }

    /// Check the configuration for values the context cannot run with.
    pub fn validate(&self) -> Result<(), GraphicsError> {
        if self.frames_in_flight == 0 {
            return Err(GraphicsError::InvalidParameter(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.scratch_chunk_size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "scratch_chunk_size cannot be zero".to_string(),
            ));
        }
        if self.handle_ring_depth() < self.frames_in_flight
            || self.cache_ring_depth() < self.frames_in_flight
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "ring depths must cover {} frames in flight",
                self.frames_in_flight
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RenderContextConfig::default();
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.handle_ring_depth(), 10);
        assert_eq!(config.cache_ring_depth(), 4);
        assert!(config.signal_frame_fences);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_frames_rejected() {
        let config = RenderContextConfig::default().with_frames_in_flight(0);
        assert!(matches!(
            config.validate(),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_zero_scratch_rejected() {
        let config = RenderContextConfig::default().with_scratch_chunk_size(0);
        assert!(config.validate().is_err());
    }
}
