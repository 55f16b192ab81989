//! # Block Type Module
//!
//! This module defines the different types of blocks in the voxel world and
//! which render layer each one's faces are drawn in.

use num_derive::FromPrimitive;

use crate::section::RenderLayer;

/// Enumerates all possible block types in the voxel world.
///
/// The `FromPrimitive` derive allows conversion from the compact `u8` ids the
/// region snapshots store.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum BlockType {
    /// An air block, which is non-solid and transparent.
    AIR,

    /// A basic dirt block, used as a common building material.
    DIRT,

    /// A grass block with different textures on top and sides.
    GRASS,

    /// A wooden block with a bark texture on all sides.
    WOOD,

    /// A plain white block, often used for testing.
    WHITE,

    /// A glass block: see-through, but drawn without blending.
    GLASS,

    /// A water block, drawn blended and sorted back to front.
    WATER,
}

impl BlockType {
    /// Converts a stored id back to a block type.
    pub fn from_id(id: u8) -> Option<Self> {
        num_traits::FromPrimitive::from_u8(id)
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    /// Generates a random block type that is neither air nor water.
    pub fn random_solid(rng: &mut fastrand::Rng) -> Self {
        Self::from_id(rng.u8(BlockType::DIRT.id()..=BlockType::GLASS.id())).unwrap_or(BlockType::DIRT)
    }

    /// Layer this block's faces are drawn in; `None` for air.
    pub fn render_layer(self) -> Option<RenderLayer> {
        match self {
            BlockType::AIR => None,
            BlockType::GLASS => Some(RenderLayer::Cutout),
            BlockType::WATER => Some(RenderLayer::Translucent),
            _ => Some(RenderLayer::Solid),
        }
    }

    /// Whether the block fully hides whatever is behind it.
    pub fn is_opaque(self) -> bool {
        matches!(self.render_layer(), Some(RenderLayer::Solid))
    }

    pub fn texture_index(self) -> u32 {
        self.id() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for block in [BlockType::AIR, BlockType::GRASS, BlockType::WATER] {
            assert_eq!(BlockType::from_id(block.id()), Some(block));
        }
        assert_eq!(BlockType::from_id(200), None);
    }

    #[test]
    fn random_solid_is_never_air_or_water() {
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..200 {
            let block = BlockType::random_solid(&mut rng);
            assert_ne!(block, BlockType::AIR);
            assert_ne!(block, BlockType::WATER);
        }
    }

    #[test]
    fn only_solid_blocks_are_opaque() {
        assert!(BlockType::DIRT.is_opaque());
        assert!(!BlockType::GLASS.is_opaque());
        assert!(!BlockType::WATER.is_opaque());
        assert!(!BlockType::AIR.is_opaque());
    }
}
