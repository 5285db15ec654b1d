//! Graphics error types.

use thiserror::Error;

/// Errors surfaced by the renderer.
///
/// Contract violations (stale handles, undeclared graph resources, unmatched
/// ownership transfers) are not represented here; they panic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphicsError {
    /// Failed to initialize the graphics system.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// A requested feature is not supported.
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The GPU device was lost. Fence wait failures end up here.
    #[error("GPU device lost")]
    DeviceLost,
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
    /// The surface is outdated and needs to be reconfigured.
    #[error("surface outdated, needs reconfiguration")]
    SurfaceOutdated,
    /// The surface was lost and needs to be recreated.
    #[error("surface lost, needs recreation")]
    SurfaceLost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = GraphicsError::InitializationFailed("no GPU found".to_string());
        assert_eq!(err.to_string(), "initialization failed: no GPU found");

        let err = GraphicsError::DeviceLost;
        assert_eq!(err.to_string(), "GPU device lost");
    }
}
