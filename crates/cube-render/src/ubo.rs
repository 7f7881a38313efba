//! Uniform buffer payload.
//!
//! The shader consumes three matrices; the payload is recomputed every frame
//! as a pure function of elapsed wall-clock time. Layout must match the
//! vertex shader's uniform block exactly.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Transform matrices handed to the vertex shader.
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: view matrix (64 bytes)
/// - Offset 128: projection matrix (64 bytes)
/// - Total size: 192 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct TransformsUbo {
    /// Model matrix (object to world space).
    pub model: Mat4,
    /// View matrix (world to view space).
    pub view: Mat4,
    /// Projection matrix (view to clip space).
    pub proj: Mat4,
}

impl TransformsUbo {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Computes the payload for a point in time.
    ///
    /// The model rotates about +Z at 90 degrees per second of elapsed time;
    /// the camera looks at the origin from (2, 2, -2) with +Z up; the
    /// projection is a 45 degree perspective over the negotiated aspect
    /// ratio with a 0.1..10 depth range (zero-to-one clip depth).
    pub fn at_time(elapsed_secs: f32, aspect_ratio: f32) -> Self {
        let angle = elapsed_secs * 90.0_f32.to_radians();

        Self {
            model: Mat4::from_rotation_z(angle),
            view: Mat4::look_at_rh(Vec3::new(2.0, 2.0, -2.0), Vec3::ZERO, Vec3::Z),
            proj: Mat4::perspective_rh(45.0_f32.to_radians(), aspect_ratio, 0.1, 10.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size() {
        // 3 Mat4 = 3 * 64 = 192 bytes
        assert_eq!(TransformsUbo::SIZE, 192);
    }

    #[test]
    fn test_alignment() {
        // Mat4 requires 16-byte alignment on the GPU side
        assert_eq!(std::mem::align_of::<TransformsUbo>(), 16);
    }

    #[test]
    fn test_model_is_identity_at_time_zero() {
        let ubo = TransformsUbo::at_time(0.0, 1.0);
        assert_eq!(ubo.model, Mat4::IDENTITY);
    }

    #[test]
    fn test_quarter_turn_after_one_second() {
        let ubo = TransformsUbo::at_time(1.0, 1.0);
        let expected = Mat4::from_rotation_z(90.0_f32.to_radians());
        assert!(
            ubo.model
                .to_cols_array()
                .iter()
                .zip(expected.to_cols_array())
                .all(|(a, b)| (a - b).abs() < 1e-6)
        );
    }

    #[test]
    fn test_projection_tracks_aspect_ratio() {
        let square = TransformsUbo::at_time(0.0, 1.0);
        let wide = TransformsUbo::at_time(0.0, 2.0);
        assert!(square.proj.col(0).x > wide.proj.col(0).x);
    }

    #[test]
    fn test_payload_casts_to_bytes() {
        let ubo = TransformsUbo::at_time(0.5, 4.0 / 3.0);
        let bytes: &[u8] = bytemuck::bytes_of(&ubo);
        assert_eq!(bytes.len(), TransformsUbo::SIZE);
    }
}
