//! Renderer error type.

use thiserror::Error;
use triangle_rhi::RhiError;

/// Errors raised while building the renderer.
///
/// The frame loop itself reports [`RhiError`] directly; this type only adds
/// the platform failures that can happen during setup.
#[derive(Error, Debug)]
pub enum RendererError {
    /// GPU-side failure
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// Window or surface failure
    #[error("Platform error: {0}")]
    Platform(#[from] triangle_core::Error),
}

/// Result type alias for renderer setup.
pub type RendererResult<T> = std::result::Result<T, RendererError>;

impl From<RendererError> for triangle_core::Error {
    fn from(err: RendererError) -> Self {
        match err {
            RendererError::Rhi(e) => triangle_core::Error::Vulkan(e.to_string()),
            RendererError::Platform(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rhi_error_flattens_to_vulkan() {
        let err: triangle_core::Error = RendererError::from(RhiError::NoSuitableGpu).into();
        assert!(matches!(err, triangle_core::Error::Vulkan(ref msg) if msg == "No suitable GPU found"));
    }

    #[test]
    fn test_platform_error_passes_through() {
        let err: triangle_core::Error =
            RendererError::from(triangle_core::Error::Window("gone".into())).into();
        assert!(matches!(err, triangle_core::Error::Window(_)));
    }
}
