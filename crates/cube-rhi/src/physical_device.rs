//! Physical device (GPU) selection.
//!
//! This module handles GPU enumeration and capability negotiation.
//!
//! # Overview
//!
//! Selection is a predicate-based first-fit search, not a ranking: devices
//! are evaluated in enumeration order and the first one satisfying all four
//! predicates wins, even if a later device would be more capable. The
//! predicates are:
//!
//! 1. Every required device extension is supported
//! 2. Queue families exist for graphics and for presentation to the surface
//! 3. The surface reports at least one format and one present mode
//! 4. A supported depth format exists among the prioritized candidates

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Device extensions every candidate must support.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Depth formats in preference order; the first supported candidate wins.
pub const DEPTH_FORMAT_CANDIDATES: &[vk::Format] = &[
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Queue family indices for the two roles this renderer needs.
///
/// Graphics and presentation may resolve to the same family on many devices;
/// the logical device creation deduplicates them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Index of the first queue family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the first queue family that can present to the surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Checks if both required queue families were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns the unique queue family indices.
    ///
    /// Used during logical device creation to avoid requesting the same
    /// family twice.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);

        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }

        families
    }
}

/// What the surface supports on a given physical device.
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    /// Surface capabilities (image counts, extents, transforms).
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats (format and color space combinations).
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Queries surface support details for a physical device.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> Result<Self, RhiError> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// True when the surface reports at least one format and one present mode.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Outcome of evaluating one device against the four suitability predicates.
#[derive(Clone, Copy, Debug, Default)]
pub struct SuitabilityChecks {
    /// Predicate (a): all required extensions are present.
    pub extensions_ok: bool,
    /// Predicate (b): graphics and present queue families exist.
    pub queues_ok: bool,
    /// Predicate (c): surface reports formats and present modes.
    pub surface_ok: bool,
    /// Predicate (d): the first supported depth format candidate, if any.
    pub depth_format: Option<vk::Format>,
}

impl SuitabilityChecks {
    /// True when every predicate holds.
    #[inline]
    pub fn all_satisfied(&self) -> bool {
        self.extensions_ok && self.queues_ok && self.surface_ok && self.depth_format.is_some()
    }
}

/// Information about a selected physical device.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version).
    pub properties: vk::PhysicalDeviceProperties,
    /// Queue family indices for graphics and presentation.
    pub queue_families: QueueFamilyIndices,
    /// The negotiated depth-buffer format.
    pub depth_format: vk::Format,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("Unknown Device")
        }
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("queue_families", &self.queue_families)
            .field("depth_format", &self.depth_format)
            .finish()
    }
}

/// Selects a physical device for rendering and presentation.
///
/// Devices are evaluated in enumeration order; the first device satisfying
/// all four predicates is selected.
///
/// # Errors
///
/// Returns [`RhiError::NoPhysicalDevices`] if the environment exposes no
/// devices at all, and [`RhiError::NoSuitableDevice`] if none of the
/// enumerated devices satisfies every predicate.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
    required_extensions: &[&CStr],
    depth_format_candidates: &[vk::Format],
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoPhysicalDevices);
    }

    info!("Found {} GPU(s)", devices.len());

    for device in devices {
        if let Some(info) = evaluate_device(
            instance,
            device,
            surface,
            surface_loader,
            required_extensions,
            depth_format_candidates,
        )? {
            info!(
                "Selected GPU '{}' (graphics family {:?}, present family {:?}, depth {:?})",
                info.device_name(),
                info.queue_families.graphics_family,
                info.queue_families.present_family,
                info.depth_format
            );
            return Ok(info);
        }
    }

    warn!("No GPU satisfies all suitability predicates");
    Err(RhiError::NoSuitableDevice)
}

/// Evaluates one device against the four predicates.
///
/// Returns `Ok(Some(info))` when the device is suitable, `Ok(None)` when it
/// is not, and an error only when a query itself fails.
fn evaluate_device(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
    required_extensions: &[&CStr],
    depth_format_candidates: &[vk::Format],
) -> Result<Option<PhysicalDeviceInfo>, RhiError> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let device_name = unsafe {
        CStr::from_ptr(properties.device_name.as_ptr())
            .to_str()
            .unwrap_or("Unknown")
    };

    let available_extensions = unsafe { instance.enumerate_device_extension_properties(device)? };

    let queue_families = find_queue_families(instance, device, surface, surface_loader);

    let extensions_ok = supports_required_extensions(&available_extensions, required_extensions);

    // Surface support is only meaningful on devices that can present at all.
    let surface_ok = if extensions_ok {
        SurfaceSupport::query(device, surface, surface_loader)?.is_adequate()
    } else {
        false
    };

    let checks = SuitabilityChecks {
        extensions_ok,
        queues_ok: queue_families.is_complete(),
        surface_ok,
        depth_format: find_depth_format(depth_format_candidates, |format| unsafe {
            instance.get_physical_device_format_properties(device, format)
        }),
    };

    let (true, Some(depth_format)) = (checks.all_satisfied(), checks.depth_format) else {
        debug!(
            "GPU '{}' skipped: extensions={}, queues={}, surface={}, depth={:?}",
            device_name, checks.extensions_ok, checks.queues_ok, checks.surface_ok,
            checks.depth_format
        );
        return Ok(None);
    };

    Ok(Some(PhysicalDeviceInfo {
        device,
        properties,
        queue_families,
        depth_format,
    }))
}

/// Checks that every required extension appears in the available list.
pub fn supports_required_extensions(
    available: &[vk::ExtensionProperties],
    required: &[&CStr],
) -> bool {
    required.iter().all(|&required_name| {
        available.iter().any(|ext| {
            let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
            name == required_name
        })
    })
}

/// Finds the graphics and presentation queue family indices.
///
/// Scans all queue families once, recording the first index satisfying each
/// role independently; the two roles may land on the same family.
fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();

    for (i, family) in queue_families.iter().enumerate() {
        let i = i as u32;

        if family.queue_count == 0 {
            continue;
        }

        if indices.graphics_family.is_none()
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            indices.graphics_family = Some(i);
        }

        if indices.present_family.is_none() {
            let present_support = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, i, surface)
                    .unwrap_or(false)
            };

            if present_support {
                indices.present_family = Some(i);
            }
        }
    }

    indices
}

/// Scans the depth format candidates in preference order.
///
/// The format-properties lookup is passed in explicitly so the scan has no
/// hidden dependency on a device handle and can be exercised directly.
/// Returns the first candidate supporting depth-stencil attachment with
/// optimal tiling.
pub fn find_depth_format(
    candidates: &[vk::Format],
    mut format_properties: impl FnMut(vk::Format) -> vk::FormatProperties,
) -> Option<vk::Format> {
    candidates.iter().copied().find(|&format| {
        format_properties(format)
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extension(name: &CStr) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        for (dst, src) in props
            .extension_name
            .iter_mut()
            .zip(name.to_bytes_with_nul())
        {
            *dst = *src as std::ffi::c_char;
        }
        props
    }

    #[test]
    fn test_queue_family_indices_default() {
        let indices = QueueFamilyIndices::default();
        assert!(indices.graphics_family.is_none());
        assert!(indices.present_family.is_none());
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_queue_family_indices_complete() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert!(indices.is_complete());
    }

    #[test]
    fn test_queue_family_indices_incomplete() {
        let graphics_only = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
        };
        assert!(!graphics_only.is_complete());

        let present_only = QueueFamilyIndices {
            graphics_family: None,
            present_family: Some(0),
        };
        assert!(!present_only.is_complete());
    }

    #[test]
    fn test_unique_families_deduplicates() {
        let shared = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert_eq!(shared.unique_families(), vec![0]);

        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(split.unique_families(), vec![0, 2]);
    }

    #[test]
    fn test_supports_required_extensions() {
        let available = [
            extension(c"VK_KHR_swapchain"),
            extension(c"VK_EXT_debug_utils"),
        ];

        assert!(supports_required_extensions(
            &available,
            &[c"VK_KHR_swapchain"]
        ));
        assert!(supports_required_extensions(&available, &[]));
        assert!(!supports_required_extensions(
            &available,
            &[c"VK_KHR_ray_tracing_pipeline"]
        ));
        assert!(!supports_required_extensions(
            &available,
            &[c"VK_KHR_swapchain", c"VK_KHR_ray_tracing_pipeline"]
        ));
    }

    #[test]
    fn test_find_depth_format_first_match_wins() {
        // The first candidate lacks depth support, the second and third have it;
        // the scan must retain the second.
        let supported = |format: vk::Format| {
            let mut props = vk::FormatProperties::default();
            if format != vk::Format::D32_SFLOAT {
                props.optimal_tiling_features = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;
            }
            props
        };

        let selected = find_depth_format(DEPTH_FORMAT_CANDIDATES, supported);
        assert_eq!(selected, Some(vk::Format::D32_SFLOAT_S8_UINT));
    }

    #[test]
    fn test_find_depth_format_none_supported() {
        let selected =
            find_depth_format(DEPTH_FORMAT_CANDIDATES, |_| vk::FormatProperties::default());
        assert_eq!(selected, None);
    }

    #[test]
    fn test_suitability_requires_every_predicate() {
        // A device missing a required extension is unsuitable even when
        // everything else holds; a fully compliant device is suitable.
        let missing_extension = SuitabilityChecks {
            extensions_ok: false,
            queues_ok: true,
            surface_ok: true,
            depth_format: Some(vk::Format::D32_SFLOAT),
        };
        assert!(!missing_extension.all_satisfied());

        let compliant = SuitabilityChecks {
            extensions_ok: true,
            queues_ok: true,
            surface_ok: true,
            depth_format: Some(vk::Format::D32_SFLOAT),
        };
        assert!(compliant.all_satisfied());

        let no_depth = SuitabilityChecks {
            extensions_ok: true,
            queues_ok: true,
            surface_ok: true,
            depth_format: None,
        };
        assert!(!no_depth.all_satisfied());
    }

    #[test]
    fn test_surface_support_is_adequate() {
        let adequate = SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(adequate.is_adequate());

        let no_formats = SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(!no_formats.is_adequate());

        let no_modes = SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![],
        };
        assert!(!no_modes.is_adequate());
    }
}
