//! Vertex format written by geometry builders.

use cgmath::Point3;

/// A vertex of section geometry.
///
/// Positions are section-local (0..=16 on each axis); the renderer offsets them
/// by the section origin.
///
/// # Memory Layout
/// - Position: 3x f32 (12 bytes)
/// - Texture Index: u32 (4 bytes)
/// - Texture Coordinates: [f32; 2] (8 bytes)
///
/// Total size: 24 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SectionVertex {
    position: [f32; 3],
    texture_index: u32,
    tex_coords: [f32; 2],
}

impl SectionVertex {
    pub fn new(pos: Point3<f32>, texture_index: u32, u: f32, v: f32) -> Self {
        Self {
            position: [pos.x, pos.y, pos.z],
            texture_index,
            tex_coords: [u, v],
        }
    }

    pub fn position(&self) -> Point3<f32> {
        Point3::new(self.position[0], self.position[1], self.position[2])
    }
}
