//! Process-wide render configuration.
//!
//! Everything here is consumed once at startup: the requested drawing
//! extent, the number of frames the CPU may run ahead of the GPU, and
//! whether driver diagnostics are requested.

/// Startup configuration for the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderConfig {
    /// Requested window and swapchain width in pixels.
    ///
    /// The surface may override this; see extent negotiation.
    pub width: u32,
    /// Requested window and swapchain height in pixels.
    pub height: u32,
    /// Maximum number of frames in flight.
    ///
    /// Bounds how far CPU submission may run ahead of GPU execution.
    /// Independent of the swapchain image count.
    pub frames_in_flight: usize,
    /// Whether to request validation layers and attach a diagnostic sink.
    pub diagnostics: bool,
}

impl RenderConfig {
    /// Returns the requested extent as a (width, height) pair.
    #[inline]
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns the aspect ratio of the requested extent.
    #[inline]
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 800,
            frames_in_flight: 2,
            diagnostics: cfg!(debug_assertions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert_eq!(config.extent(), (800, 800));
        assert_eq!(config.frames_in_flight, 2);
    }

    #[test]
    fn test_aspect_ratio() {
        let config = RenderConfig {
            width: 1600,
            height: 900,
            ..Default::default()
        };
        assert!((config.aspect_ratio() - 16.0 / 9.0).abs() < f32::EPSILON);
    }
}
