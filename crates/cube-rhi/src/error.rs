//! RHI-specific error types.

use thiserror::Error;

/// RHI-specific error type.
///
/// Every variant is treated as fatal: failures are either environment
/// preconditions that do not hold (no devices, no suitable device) or
/// resource-creation failures naming the object that could not be built.
/// There is no retry path.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] ash::vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    Allocator(#[from] gpu_allocator::AllocationError),

    /// The environment exposes no physical devices at all
    #[error("No physical devices available")]
    NoPhysicalDevices,

    /// No enumerated device satisfies all suitability predicates
    #[error("No suitable physical device found")]
    NoSuitableDevice,

    /// Surface creation error
    #[error("Failed to create surface: {0}")]
    Surface(String),

    /// Swapchain creation error
    #[error("Failed to create swapchain: {0}")]
    SwapchainCreation(String),

    /// Image view creation error for a specific swapchain image
    #[error("Failed to create image view {index}: {source}")]
    ImageViewCreation {
        index: usize,
        source: ash::vk::Result,
    },

    /// Framebuffer creation error for a specific presentation target
    #[error("Failed to create framebuffer {index}: {source}")]
    FramebufferCreation {
        index: usize,
        source: ash::vk::Result,
    },

    /// Shader loading or module creation error
    #[error("Shader error: {0}")]
    Shader(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Invalid argument or handle
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_image_errors_name_the_index() {
        let err = RhiError::ImageViewCreation {
            index: 2,
            source: ash::vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
        };
        assert!(err.to_string().contains("image view 2"));

        let err = RhiError::FramebufferCreation {
            index: 1,
            source: ash::vk::Result::ERROR_OUT_OF_HOST_MEMORY,
        };
        assert!(err.to_string().contains("framebuffer 1"));
    }

    #[test]
    fn test_vulkan_error_conversion() {
        let err: RhiError = ash::vk::Result::ERROR_DEVICE_LOST.into();
        assert!(matches!(err, RhiError::Vulkan(_)));
    }
}
