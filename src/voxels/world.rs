//! # Noise World
//!
//! A procedural world used by the demo binary: 3D Perlin noise carves caves and
//! overhangs out of solid ground, and anything open below the water level is
//! flooded, which gives the pipeline plenty of translucent geometry to sort.

use cgmath::Point3;
use noise::{NoiseFn, Perlin};

use super::block_type::BlockType;
use super::region::{RegionSource, SectionRegion};
use crate::section::SectionKey;

/// Threshold above which Perlin noise is considered solid for terrain generation.
pub const PERLIN_POSITIVE_THRESHOLD: f64 = 0.2;
/// Threshold below which Perlin noise is considered solid for terrain generation.
pub const PERLIN_NEGATIVE_THRESHOLD: f64 = -0.2;
/// Scaling factor applied to world coordinates when sampling Perlin noise.
pub const PERLIN_SCALE_FACTOR: f64 = 0.02;

pub struct NoiseWorld {
    perlin: Perlin,
    seed: u32,
    water_level: i32,
}

impl NoiseWorld {
    pub fn new(seed: u32, water_level: i32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            seed,
            water_level,
        }
    }

    /// Block at a world position. Deterministic for a given seed.
    pub fn block_at(&self, position: Point3<i32>) -> BlockType {
        let sample = self.perlin.get(Self::to_perlin_pos(position, PERLIN_SCALE_FACTOR));

        if !(PERLIN_NEGATIVE_THRESHOLD..=PERLIN_POSITIVE_THRESHOLD).contains(&sample) {
            let mut rng = fastrand::Rng::with_seed(self.position_seed(position));
            BlockType::random_solid(&mut rng)
        } else if position.y < self.water_level {
            BlockType::WATER
        } else {
            BlockType::AIR
        }
    }

    fn to_perlin_pos(pos: Point3<i32>, scale_factor: f64) -> [f64; 3] {
        [
            pos.x as f64 * scale_factor,
            pos.y as f64 * scale_factor,
            pos.z as f64 * scale_factor,
        ]
    }

    fn position_seed(&self, pos: Point3<i32>) -> u64 {
        let x = pos.x as u32 as u64;
        let y = pos.y as u32 as u64;
        let z = pos.z as u32 as u64;
        (x.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ y.wrapping_mul(0xC2B2_AE3D_27D4_EB4F))
            .wrapping_add(z.wrapping_mul(0x1656_67B1_9E37_79F9))
            ^ self.seed as u64
    }
}

impl RegionSource for NoiseWorld {
    fn capture(&self, key: SectionKey) -> SectionRegion {
        SectionRegion::capture(key, |position| self.block_at(position))
    }
}
