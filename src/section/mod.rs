//! # Section Module
//!
//! Sections are the 16x16x16 block volumes the pipeline builds meshes for. This
//! module provides their addressing (`SectionKey`), the per-section state record
//! (`BuiltSection`) and the GPU-side result of a build (`RenderData`).
//!
//! ## Key Packing
//!
//! A `SectionKey` packs section coordinates into one `i64`:
//! - x: 22 bits at bit 42
//! - z: 22 bits at bit 20
//! - y: 20 bits at bit 0
//!
//! Each field is two's complement, so x and z cover [-2^21, 2^21) and y covers
//! [-2^19, 2^19). Keys are cheap to copy, hash and store in atomics.

use std::fmt;

use cgmath::Point3;

use crate::voxels::block_side::BlockSide;

pub mod built_section;
pub mod relative_pos;
pub mod render_data;

pub use built_section::BuiltSection;
pub use relative_pos::RelativeSortPos;
pub use render_data::{LayerBuffers, RenderData, RenderLayer, SectionRenderState};

/// The dimension (width, height, depth) of a section in blocks.
pub const SECTION_DIMENSION: i32 = 16;
/// Total number of blocks in a section.
pub const SECTION_VOLUME: usize = (SECTION_DIMENSION * SECTION_DIMENSION * SECTION_DIMENSION) as usize;

const XZ_BITS: u32 = 22;
const Y_BITS: u32 = 20;
const X_SHIFT: u32 = 64 - XZ_BITS;
const Z_SHIFT: u32 = Y_BITS;
const XZ_MASK: i64 = (1 << XZ_BITS) - 1;
const Y_MASK: i64 = (1 << Y_BITS) - 1;

/// A packed (x, y, z) section coordinate.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionKey(i64);

impl SectionKey {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        let packed = ((x as i64 & XZ_MASK) << X_SHIFT)
            | ((z as i64 & XZ_MASK) << Z_SHIFT)
            | (y as i64 & Y_MASK);
        Self(packed)
    }

    pub fn from_packed(packed: i64) -> Self {
        Self(packed)
    }

    pub fn packed(self) -> i64 {
        self.0
    }

    pub fn x(self) -> i32 {
        (self.0 >> X_SHIFT) as i32
    }

    pub fn y(self) -> i32 {
        ((self.0 << (64 - Y_BITS)) >> (64 - Y_BITS)) as i32
    }

    pub fn z(self) -> i32 {
        ((self.0 << (64 - Z_SHIFT - XZ_BITS)) >> X_SHIFT) as i32
    }

    /// Section coordinates as a point.
    pub fn position(self) -> Point3<i32> {
        Point3::new(self.x(), self.y(), self.z())
    }

    /// The section containing a world-space point.
    pub fn containing(point: Point3<f64>) -> Self {
        let dimension = SECTION_DIMENSION as f64;
        Self::new(
            (point.x / dimension).floor() as i32,
            (point.y / dimension).floor() as i32,
            (point.z / dimension).floor() as i32,
        )
    }

    /// Block coordinates of the section's minimum corner.
    pub fn origin(self) -> Point3<i32> {
        Point3::new(
            self.x() * SECTION_DIMENSION,
            self.y() * SECTION_DIMENSION,
            self.z() * SECTION_DIMENSION,
        )
    }

    pub fn min_corner(self) -> Point3<f64> {
        self.origin().cast::<f64>().unwrap_or(Point3::new(0.0, 0.0, 0.0))
    }

    pub fn center(self) -> Point3<f64> {
        let half = SECTION_DIMENSION as f64 / 2.0;
        let min = self.min_corner();
        Point3::new(min.x + half, min.y + half, min.z + half)
    }

    pub fn bounding_box(self) -> Aabb {
        let min = self.min_corner();
        let size = SECTION_DIMENSION as f64;
        Aabb {
            min,
            max: Point3::new(min.x + size, min.y + size, min.z + size),
        }
    }

    /// The neighbouring section across `side`.
    pub fn offset(self, side: BlockSide) -> Self {
        let normal = side.normal();
        Self::new(self.x() + normal.x, self.y() + normal.y, self.z() + normal.z)
    }

    /// Squared distance from the section centre to `point`.
    pub fn distance_squared_to(self, point: Point3<f64>) -> f64 {
        let center = self.center();
        let dx = center.x - point.x;
        let dy = center.y - point.y;
        let dz = center.z - point.z;
        dx * dx + dy * dy + dz * dz
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x(), self.y(), self.z())
    }
}

impl fmt::Debug for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SectionKey{}", self)
    }
}

/// Axis-aligned world-space box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    pub fn contains(&self, point: Point3<f64>) -> bool {
        (self.min.x..self.max.x).contains(&point.x)
            && (self.min.y..self.max.y).contains(&point.y)
            && (self.min.z..self.max.z).contains(&point.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing_recovers_coordinates() {
        for (x, y, z) in [
            (0, 0, 0),
            (1, -1, 1),
            (-1, 2, -3),
            ((1 << 21) - 1, (1 << 19) - 1, -(1 << 21)),
            (-(1 << 21), -(1 << 19), (1 << 21) - 1),
        ] {
            let key = SectionKey::new(x, y, z);
            assert_eq!((key.x(), key.y(), key.z()), (x, y, z), "key {:?}", key);
            assert_eq!(SectionKey::from_packed(key.packed()), key);
        }
    }

    #[test]
    fn containing_floors_negative_coordinates() {
        assert_eq!(
            SectionKey::containing(Point3::new(-0.5, 15.9, 16.0)),
            SectionKey::new(-1, 0, 1)
        );
    }

    #[test]
    fn bounding_box_spans_one_section() {
        let key = SectionKey::new(1, -2, 3);
        let bounds = key.bounding_box();

        assert_eq!(bounds.min, Point3::new(16.0, -32.0, 48.0));
        assert_eq!(bounds.max, Point3::new(32.0, -16.0, 64.0));
        assert!(bounds.contains(key.center()));
        assert!(!bounds.contains(bounds.max));
    }

    #[test]
    fn offset_moves_one_section() {
        let key = SectionKey::new(0, 0, 0);
        assert_eq!(key.offset(BlockSide::TOP), SectionKey::new(0, 1, 0));
        assert_eq!(key.offset(BlockSide::FRONT), SectionKey::new(-1, 0, 0));
    }
}
