//! RHI-specific error types.

use thiserror::Error;

/// RHI-specific error type.
///
/// Only unexpected failures end up here. Expected, recoverable outcomes such
/// as a stale swapchain or a fence wait that hit its timeout are reported
/// through status enums instead.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// Failed to load Vulkan
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No physical device meets the minimum requirements
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// Validation was requested but the layer is not installed
    #[error("Validation layer {0} requested but not available")]
    MissingValidationLayer(String),

    /// Shader loading or module creation error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation or query error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Invalid handle, index or argument
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;

    #[test]
    fn test_vk_result_converts() {
        fn fails() -> RhiResult<()> {
            Err(vk::Result::ERROR_DEVICE_LOST)?;
            Ok(())
        }
        assert!(matches!(
            fails(),
            Err(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST))
        ));
    }

    #[test]
    fn test_missing_layer_message() {
        let err = RhiError::MissingValidationLayer("VK_LAYER_KHRONOS_validation".into());
        assert!(err.to_string().contains("VK_LAYER_KHRONOS_validation"));
    }
}
