//! Negotiated device context.
//!
//! [`DeviceContext`] is the product of capability negotiation: the logical
//! device with its queues, plus every surface decision the rest of the
//! renderer depends on (color format, present mode, extent, depth format).
//! It is created once at startup and read-only thereafter.
//!
//! The selection sub-algorithms are deterministic and order-dependent on
//! purpose: where no preferred entry exists, the surface's first reported
//! entry wins, not a content-optimal one.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::RhiError;
use crate::instance::Instance;
use crate::physical_device::{
    self, DEPTH_FORMAT_CANDIDATES, REQUIRED_DEVICE_EXTENSIONS, SurfaceSupport,
};

/// Everything the swapchain, target builder and scheduler need to know about
/// the negotiated execution environment. Immutable after creation.
pub struct DeviceContext {
    /// The logical device with graphics and present queues.
    device: Arc<Device>,
    /// Selected surface color format and color space.
    surface_format: vk::SurfaceFormatKHR,
    /// Selected present mode.
    present_mode: vk::PresentModeKHR,
    /// Selected draw extent.
    extent: vk::Extent2D,
    /// Selected depth-buffer format.
    depth_format: vk::Format,
}

impl DeviceContext {
    /// Negotiates the execution environment.
    ///
    /// Selects the first suitable physical device, creates the logical device
    /// and queues, and fixes the surface format, present mode and extent.
    ///
    /// # Arguments
    ///
    /// * `instance` - The Vulkan instance
    /// * `surface` - The window surface
    /// * `surface_loader` - The surface extension loader
    /// * `requested_extent` - The application's preferred extent; the surface
    ///   may override it
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::NoPhysicalDevices`] or
    /// [`RhiError::NoSuitableDevice`] from device selection, or any error the
    /// underlying queries and device creation produce.
    pub fn negotiate(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
        requested_extent: vk::Extent2D,
    ) -> Result<Self, RhiError> {
        let physical_device_info = physical_device::select_physical_device(
            instance.handle(),
            surface,
            surface_loader,
            REQUIRED_DEVICE_EXTENSIONS,
            DEPTH_FORMAT_CANDIDATES,
        )?;

        let device = Device::new(instance, &physical_device_info, REQUIRED_DEVICE_EXTENSIONS)?;

        let support = SurfaceSupport::query(physical_device_info.device, surface, surface_loader)?;

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, requested_extent);

        info!(
            "Negotiated context: {}x{}, format {:?}, color space {:?}, present mode {:?}, depth {:?}",
            extent.width,
            extent.height,
            surface_format.format,
            surface_format.color_space,
            present_mode,
            physical_device_info.depth_format
        );

        Ok(Self {
            device,
            surface_format,
            present_mode,
            extent,
            depth_format: physical_device_info.depth_format,
        })
    }

    /// Returns the logical device.
    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Returns the selected surface format and color space.
    #[inline]
    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    /// Returns the selected present mode.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Returns the selected draw extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the aspect ratio of the selected extent.
    #[inline]
    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height as f32
    }

    /// Returns the selected depth-buffer format.
    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }
}

/// Chooses the surface format.
///
/// Prefers B8G8R8A8_SRGB with the SRGB_NONLINEAR color space wherever it
/// appears in the list; otherwise falls back to the first reported entry.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    if let Some(&format) = preferred {
        debug!("Selected preferred surface format: B8G8R8A8_SRGB with SRGB_NONLINEAR");
        return format;
    }

    debug!(
        "Preferred surface format unavailable, using first reported: {:?}",
        formats[0].format
    );
    formats[0]
}

/// Chooses the present mode.
///
/// One scan over the list: MAILBOX (low latency, no tearing) wins immediately
/// wherever it appears; FIFO (vsync'd queue) is remembered as a fallback but
/// the scan keeps looking for MAILBOX; if neither occurs, the first reported
/// mode is used.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    let mut selected = present_modes[0];

    for &mode in present_modes {
        if mode == vk::PresentModeKHR::MAILBOX {
            debug!("Selected MAILBOX present mode");
            return mode;
        }
        if mode == vk::PresentModeKHR::FIFO {
            selected = mode;
        }
    }

    debug!("Selected {:?} present mode", selected);
    selected
}

/// Chooses the swapchain extent.
///
/// When the surface reports a concrete current extent, that value is used
/// verbatim and the request is ignored: the surface dictates the size. The
/// sentinel `u32::MAX` width means any size is accepted, in which case the
/// requested extent is clamped per axis into the surface's limits.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    requested: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        debug!(
            "Using current surface extent: {}x{}",
            capabilities.current_extent.width, capabilities.current_extent.height
        );
        return capabilities.current_extent;
    }

    let extent = vk::Extent2D {
        width: requested.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: requested.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    };

    debug!(
        "Clamped requested extent {}x{} to {}x{}",
        requested.width, requested.height, extent.width, extent.height
    );

    extent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_surface_format_prefers_srgb_pair() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(selected.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_choose_surface_format_requires_matching_color_space() {
        // The right format with the wrong color space does not match the
        // preferred pair; the first entry wins instead.
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            },
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_choose_surface_format_falls_back_to_first() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_choose_present_mode_mailbox_wins_over_earlier_fifo() {
        // MAILBOX appearing after FIFO still wins: the preferred mode is
        // checked across the whole list before settling for the fallback.
        let modes = vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn test_choose_present_mode_fifo_fallback() {
        let modes = vec![
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::FIFO_RELAXED,
        ];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_choose_present_mode_first_entry_when_neither_preferred() {
        let modes = vec![
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::FIFO_RELAXED,
        ];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::IMMEDIATE);
    }

    #[test]
    fn test_choose_extent_uses_current_when_defined() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };

        let extent = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 800,
                height: 800,
            },
        );
        assert_eq!(extent.width, 1920);
        assert_eq!(extent.height, 1080);
    }

    #[test]
    fn test_choose_extent_clamps_to_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 400,
                height: 400,
            },
            max_image_extent: vk::Extent2D {
                width: 1000,
                height: 1000,
            },
            ..Default::default()
        };

        // In range: the requested value is kept
        let extent = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 800,
                height: 800,
            },
        );
        assert_eq!((extent.width, extent.height), (800, 800));

        // Below minimum: clamped up
        let extent = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 50,
                height: 50,
            },
        );
        assert_eq!((extent.width, extent.height), (400, 400));

        // Above maximum: clamped down
        let extent = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 3000,
                height: 3000,
            },
        );
        assert_eq!((extent.width, extent.height), (1000, 1000));
    }

    #[test]
    fn test_choose_extent_clamps_axes_independently() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 400,
                height: 400,
            },
            max_image_extent: vk::Extent2D {
                width: 1000,
                height: 1000,
            },
            ..Default::default()
        };

        let extent = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 50,
                height: 3000,
            },
        );
        assert_eq!((extent.width, extent.height), (400, 1000));
    }
}
