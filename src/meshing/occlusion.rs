//! # Section Occlusion
//!
//! For each pair of section faces, whether a line of sight can enter through one
//! and leave through the other. The renderer walks sections outwards from the
//! camera and uses this to skip sections hidden behind solid ground.
//!
//! The table is computed by flood filling the non-opaque cells of a section:
//! every connected open region links all the boundary faces it touches.

use bitvec::prelude::BitVec;

use crate::section::{SECTION_DIMENSION, SECTION_VOLUME};
use crate::voxels::block_side::BlockSide;

/// Sections with fewer opaque cells than this are treated as fully see-through
/// without flood filling.
const MIN_OPAQUE_FOR_FLOOD_FILL: usize = 256;

/// Symmetric 6x6 visibility relation between section faces.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OcclusionTable {
    bits: u64,
}

impl OcclusionTable {
    pub fn none_visible() -> Self {
        Self { bits: 0 }
    }

    pub fn all_visible() -> Self {
        Self {
            bits: (1 << 36) - 1,
        }
    }

    pub fn is_visible_through(&self, from: BlockSide, to: BlockSide) -> bool {
        self.bits & Self::bit(from, to) != 0
    }

    pub fn set_visible(&mut self, a: BlockSide, b: BlockSide) {
        self.bits |= Self::bit(a, b) | Self::bit(b, a);
    }

    fn bit(from: BlockSide, to: BlockSide) -> u64 {
        1 << (from as u64 * 6 + to as u64)
    }
}

/// Index of a section-local cell in the opaque mask (x, then z, then y).
pub fn cell_index(x: i32, y: i32, z: i32) -> usize {
    (x + z * SECTION_DIMENSION + y * SECTION_DIMENSION * SECTION_DIMENSION) as usize
}

/// Computes the occlusion table from a mask of opaque cells laid out by
/// [`cell_index`].
pub fn compute_occlusion(opaque: &BitVec) -> OcclusionTable {
    let opaque_count = opaque.count_ones();

    if opaque_count < MIN_OPAQUE_FOR_FLOOD_FILL {
        return OcclusionTable::all_visible();
    }
    if opaque_count == SECTION_VOLUME {
        return OcclusionTable::none_visible();
    }

    let mut table = OcclusionTable::none_visible();
    let mut visited = opaque.clone();
    let mut stack = Vec::new();
    let max = SECTION_DIMENSION - 1;

    for y in 0..SECTION_DIMENSION {
        for z in 0..SECTION_DIMENSION {
            for x in 0..SECTION_DIMENSION {
                let on_boundary = x == 0 || x == max || y == 0 || y == max || z == 0 || z == max;
                if !on_boundary || visited[cell_index(x, y, z)] {
                    continue;
                }

                let mut touched = [false; 6];
                visited.set(cell_index(x, y, z), true);
                stack.push((x, y, z));

                while let Some((cx, cy, cz)) = stack.pop() {
                    for side in BlockSide::all() {
                        let normal = side.normal();
                        let (nx, ny, nz) = (cx + normal.x, cy + normal.y, cz + normal.z);
                        let outside = !(0..SECTION_DIMENSION).contains(&nx)
                            || !(0..SECTION_DIMENSION).contains(&ny)
                            || !(0..SECTION_DIMENSION).contains(&nz);
                        if outside {
                            touched[side as usize] = true;
                            continue;
                        }

                        let index = cell_index(nx, ny, nz);
                        if !visited[index] {
                            visited.set(index, true);
                            stack.push((nx, ny, nz));
                        }
                    }
                }

                for a in BlockSide::all() {
                    for b in BlockSide::all() {
                        if touched[a as usize] && touched[b as usize] {
                            table.set_visible(a, b);
                        }
                    }
                }
            }
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(opaque: impl Fn(i32, i32, i32) -> bool) -> BitVec {
        let mut bits = BitVec::with_capacity(SECTION_VOLUME);
        bits.resize(SECTION_VOLUME, false);
        for y in 0..SECTION_DIMENSION {
            for z in 0..SECTION_DIMENSION {
                for x in 0..SECTION_DIMENSION {
                    bits.set(cell_index(x, y, z), opaque(x, y, z));
                }
            }
        }
        bits
    }

    #[test]
    fn empty_section_is_see_through() {
        let table = compute_occlusion(&mask(|_, _, _| false));
        assert_eq!(table, OcclusionTable::all_visible());
    }

    #[test]
    fn full_section_blocks_everything() {
        let table = compute_occlusion(&mask(|_, _, _| true));
        assert_eq!(table, OcclusionTable::none_visible());
    }

    #[test]
    fn horizontal_floor_separates_top_from_bottom() {
        let table = compute_occlusion(&mask(|_, y, _| y == 8));

        assert!(!table.is_visible_through(BlockSide::TOP, BlockSide::BOTTOM));
        assert!(table.is_visible_through(BlockSide::TOP, BlockSide::LEFT));
        assert!(table.is_visible_through(BlockSide::BOTTOM, BlockSide::FRONT));
        assert!(table.is_visible_through(BlockSide::LEFT, BlockSide::RIGHT));
    }

    #[test]
    fn visibility_is_symmetric() {
        let mut table = OcclusionTable::none_visible();
        table.set_visible(BlockSide::FRONT, BlockSide::TOP);

        assert!(table.is_visible_through(BlockSide::TOP, BlockSide::FRONT));
        assert!(!table.is_visible_through(BlockSide::TOP, BlockSide::BACK));
    }
}
