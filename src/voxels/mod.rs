//! # Voxels Module
//!
//! World-side data the pipeline consumes: block types, block faces, the
//! read-only region snapshots a rebuild works from, and a procedural world that
//! produces them.

pub mod block_side;
pub mod block_type;
pub mod region;
pub mod world;

pub use block_side::BlockSide;
pub use block_type::BlockType;
pub use region::{RegionSource, SectionRegion};
pub use world::NoiseWorld;
