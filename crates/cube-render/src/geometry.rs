//! Cube geometry.
//!
//! A unit cube as a plain triangle list, one color per face. No index
//! buffer: vertices shared between triangles are duplicated.

use glam::Vec3;

use cube_rhi::vertex::ColoredVertex;

/// Number of vertices in the cube (6 faces x 2 triangles x 3 vertices).
pub const CUBE_VERTEX_COUNT: u32 = 36;

const RED: Vec3 = Vec3::new(1.0, 0.0, 0.0);
const YELLOW: Vec3 = Vec3::new(1.0, 1.0, 0.0);
const WHITE: Vec3 = Vec3::new(1.0, 1.0, 1.0);
const GREEN: Vec3 = Vec3::new(0.0, 1.0, 0.0);
const MAGENTA: Vec3 = Vec3::new(1.0, 0.0, 1.0);
const CYAN: Vec3 = Vec3::new(0.0, 1.0, 1.0);

/// The cube's vertices, each triplet forming one triangle.
pub const CUBE_VERTICES: [ColoredVertex; CUBE_VERTEX_COUNT as usize] = [
    // -Z face
    ColoredVertex::new(Vec3::new(-0.5, -0.5, -0.5), RED),
    ColoredVertex::new(Vec3::new(-0.5, 0.5, -0.5), RED),
    ColoredVertex::new(Vec3::new(0.5, -0.5, -0.5), RED),
    ColoredVertex::new(Vec3::new(0.5, 0.5, -0.5), RED),
    ColoredVertex::new(Vec3::new(0.5, -0.5, -0.5), RED),
    ColoredVertex::new(Vec3::new(-0.5, 0.5, -0.5), RED),
    // -X face
    ColoredVertex::new(Vec3::new(-0.5, -0.5, -0.5), YELLOW),
    ColoredVertex::new(Vec3::new(-0.5, -0.5, 0.5), YELLOW),
    ColoredVertex::new(Vec3::new(-0.5, 0.5, -0.5), YELLOW),
    ColoredVertex::new(Vec3::new(-0.5, 0.5, 0.5), YELLOW),
    ColoredVertex::new(Vec3::new(-0.5, 0.5, -0.5), YELLOW),
    ColoredVertex::new(Vec3::new(-0.5, -0.5, 0.5), YELLOW),
    // +X face
    ColoredVertex::new(Vec3::new(0.5, -0.5, 0.5), WHITE),
    ColoredVertex::new(Vec3::new(0.5, -0.5, -0.5), WHITE),
    ColoredVertex::new(Vec3::new(0.5, 0.5, 0.5), WHITE),
    ColoredVertex::new(Vec3::new(0.5, 0.5, -0.5), WHITE),
    ColoredVertex::new(Vec3::new(0.5, 0.5, 0.5), WHITE),
    ColoredVertex::new(Vec3::new(0.5, -0.5, -0.5), WHITE),
    // +Z face
    ColoredVertex::new(Vec3::new(-0.5, 0.5, 0.5), GREEN),
    ColoredVertex::new(Vec3::new(-0.5, -0.5, 0.5), GREEN),
    ColoredVertex::new(Vec3::new(0.5, 0.5, 0.5), GREEN),
    ColoredVertex::new(Vec3::new(0.5, -0.5, 0.5), GREEN),
    ColoredVertex::new(Vec3::new(0.5, 0.5, 0.5), GREEN),
    ColoredVertex::new(Vec3::new(-0.5, -0.5, 0.5), GREEN),
    // +Y face
    ColoredVertex::new(Vec3::new(0.5, 0.5, -0.5), MAGENTA),
    ColoredVertex::new(Vec3::new(-0.5, 0.5, -0.5), MAGENTA),
    ColoredVertex::new(Vec3::new(0.5, 0.5, 0.5), MAGENTA),
    ColoredVertex::new(Vec3::new(-0.5, 0.5, 0.5), MAGENTA),
    ColoredVertex::new(Vec3::new(0.5, 0.5, 0.5), MAGENTA),
    ColoredVertex::new(Vec3::new(-0.5, 0.5, -0.5), MAGENTA),
    // -Y face
    ColoredVertex::new(Vec3::new(-0.5, -0.5, 0.5), CYAN),
    ColoredVertex::new(Vec3::new(-0.5, -0.5, -0.5), CYAN),
    ColoredVertex::new(Vec3::new(0.5, -0.5, -0.5), CYAN),
    ColoredVertex::new(Vec3::new(-0.5, -0.5, 0.5), CYAN),
    ColoredVertex::new(Vec3::new(0.5, -0.5, -0.5), CYAN),
    ColoredVertex::new(Vec3::new(0.5, -0.5, 0.5), CYAN),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_count() {
        assert_eq!(CUBE_VERTICES.len(), CUBE_VERTEX_COUNT as usize);
        assert_eq!(CUBE_VERTEX_COUNT % 3, 0);
    }

    #[test]
    fn test_cube_is_unit_sized() {
        for vertex in &CUBE_VERTICES {
            for component in vertex.position.to_array() {
                assert!(component == 0.5 || component == -0.5);
            }
        }
    }

    #[test]
    fn test_each_face_has_one_color() {
        for face in CUBE_VERTICES.chunks(6) {
            let color = face[0].color;
            assert!(face.iter().all(|v| v.color == color));
        }
    }

    #[test]
    fn test_six_distinct_face_colors() {
        let mut colors: Vec<[u32; 3]> = CUBE_VERTICES
            .chunks(6)
            .map(|face| face[0].color.to_array().map(f32::to_bits))
            .collect();
        colors.sort();
        colors.dedup();
        assert_eq!(colors.len(), 6);
    }
}
