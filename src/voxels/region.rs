//! # Section Regions
//!
//! A `SectionRegion` is the read-only snapshot a rebuild works from: the
//! section's 16x16x16 blocks plus a one-block border taken from its neighbours,
//! so faces on the section boundary can be culled without touching live world
//! data from a worker thread.
//!
//! ## Layout
//!
//! Blocks are stored as `u8` ids in a flat vector of `REGION_DIMENSION`³ cells
//! in row-major order (x, then z, then y). A parallel bit vector marks which
//! cells hold anything other than air, which makes the emptiness check O(words).

use bitvec::prelude::BitVec;
use cgmath::Point3;

use super::block_type::BlockType;
use crate::section::{SectionKey, SECTION_DIMENSION};

/// Cells per axis including the one-block border on each side.
pub const REGION_DIMENSION: usize = (SECTION_DIMENSION + 2) as usize;
/// Cells in one wrapped plane.
pub const REGION_PLANE_SIZE: usize = REGION_DIMENSION * REGION_DIMENSION;
/// Total cells in a region.
pub const REGION_SIZE: usize = REGION_PLANE_SIZE * REGION_DIMENSION;

#[derive(Clone, Debug)]
pub struct SectionRegion {
    key: SectionKey,
    blocks: Vec<u8>,
    non_air: BitVec,
}

impl SectionRegion {
    /// A region with nothing but air.
    pub fn empty(key: SectionKey) -> Self {
        let mut non_air = BitVec::with_capacity(REGION_SIZE);
        non_air.resize(REGION_SIZE, false);
        Self {
            key,
            blocks: vec![BlockType::AIR.id(); REGION_SIZE],
            non_air,
        }
    }

    /// Captures a region by sampling `sample` at every world block position the
    /// region covers.
    pub fn capture(key: SectionKey, sample: impl Fn(Point3<i32>) -> BlockType) -> Self {
        let mut region = Self::empty(key);
        let origin = key.origin();

        for y in -1..=SECTION_DIMENSION {
            for z in -1..=SECTION_DIMENSION {
                for x in -1..=SECTION_DIMENSION {
                    let block = sample(Point3::new(origin.x + x, origin.y + y, origin.z + z));
                    if block != BlockType::AIR {
                        region.set_block(x, y, z, block);
                    }
                }
            }
        }

        region
    }

    pub fn key(&self) -> SectionKey {
        self.key
    }

    /// Block at section-local coordinates; each axis may range over -1..=16.
    /// Anything outside the captured border reads as air.
    pub fn block_at(&self, x: i32, y: i32, z: i32) -> BlockType {
        match Self::index(x, y, z) {
            Some(index) => BlockType::from_id(self.blocks[index]).unwrap_or(BlockType::AIR),
            None => BlockType::AIR,
        }
    }

    /// Sets a block at section-local coordinates. Out-of-range writes are ignored.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, block: BlockType) {
        if let Some(index) = Self::index(x, y, z) {
            self.blocks[index] = block.id();
            self.non_air.set(index, block != BlockType::AIR);
        }
    }

    /// True when the region, border included, holds nothing but air.
    pub fn is_empty(&self) -> bool {
        self.non_air.not_any()
    }

    fn index(x: i32, y: i32, z: i32) -> Option<usize> {
        let range = -1..=SECTION_DIMENSION;
        if !(range.contains(&x) && range.contains(&y) && range.contains(&z)) {
            return None;
        }
        let (x, y, z) = ((x + 1) as usize, (y + 1) as usize, (z + 1) as usize);
        Some(x + z * REGION_DIMENSION + y * REGION_PLANE_SIZE)
    }
}

/// Something that can snapshot the blocks around a section.
pub trait RegionSource: Send + Sync {
    fn capture(&self, key: SectionKey) -> SectionRegion;
}

impl<F> RegionSource for F
where
    F: Fn(SectionKey) -> SectionRegion + Send + Sync,
{
    fn capture(&self, key: SectionKey) -> SectionRegion {
        self(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_includes_border() {
        let key = SectionKey::new(1, 0, 0);
        // solid at world x == 15, which is the last column of the previous section
        let region = SectionRegion::capture(key, |pos| {
            if pos.x == 15 {
                BlockType::DIRT
            } else {
                BlockType::AIR
            }
        });

        assert_eq!(region.block_at(-1, 4, 4), BlockType::DIRT);
        assert_eq!(region.block_at(0, 4, 4), BlockType::AIR);
        assert!(!region.is_empty());
    }

    #[test]
    fn out_of_range_reads_as_air() {
        let mut region = SectionRegion::empty(SectionKey::new(0, 0, 0));
        region.set_block(17, 0, 0, BlockType::DIRT);

        assert_eq!(region.block_at(17, 0, 0), BlockType::AIR);
        assert_eq!(region.block_at(-2, 0, 0), BlockType::AIR);
        assert!(region.is_empty());
    }

    #[test]
    fn clearing_a_block_updates_emptiness() {
        let mut region = SectionRegion::empty(SectionKey::new(0, 0, 0));
        region.set_block(3, 3, 3, BlockType::WATER);
        assert!(!region.is_empty());

        region.set_block(3, 3, 3, BlockType::AIR);
        assert!(region.is_empty());
    }
}
