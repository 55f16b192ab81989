//! Reference geometry builder: one quad per visible block face.

use bitvec::prelude::BitVec;
use cgmath::Point3;

use super::occlusion::{cell_index, compute_occlusion};
use super::sort_state::SortState;
use super::vertex::SectionVertex;
use super::{GeometryBuilder, SectionMesh};
use crate::buffer_state::SectionBuffers;
use crate::error::BuildError;
use crate::section::{RenderLayer, SECTION_DIMENSION, SECTION_VOLUME};
use crate::voxels::block_side::BlockSide;
use crate::voxels::block_type::BlockType;
use crate::voxels::region::SectionRegion;

/// Emits every block face that borders something it should be visible
/// through, sorted into layers by block type. No faces are merged.
#[derive(Debug, Default, Clone, Copy)]
pub struct FaceCullingBuilder;

impl FaceCullingBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl GeometryBuilder for FaceCullingBuilder {
    fn build(
        &self,
        region: &SectionRegion,
        sort_origin: Point3<f32>,
        buffers: &mut SectionBuffers,
    ) -> Result<SectionMesh, BuildError> {
        let mut opaque: BitVec = BitVec::repeat(false, SECTION_VOLUME);

        for y in 0..SECTION_DIMENSION {
            for z in 0..SECTION_DIMENSION {
                for x in 0..SECTION_DIMENSION {
                    let block = region.block_at(x, y, z);
                    let Some(layer) = block.render_layer() else {
                        continue;
                    };
                    if block.is_opaque() {
                        opaque.set(cell_index(x, y, z), true);
                    }

                    for side in BlockSide::all() {
                        let normal = side.normal();
                        let neighbour = region.block_at(x + normal.x, y + normal.y, z + normal.z);
                        if should_draw(block, neighbour) {
                            buffers
                                .layer_mut(layer)
                                .push_quad(face_vertices(x, y, z, block, side));
                        }
                    }
                }
            }
        }

        let translucent = buffers.layer_mut(RenderLayer::Translucent);
        let sort_state = if translucent.is_empty() {
            None
        } else {
            let centroids = (0..translucent.quad_count())
                .map(|quad| translucent.quad_centroid(quad))
                .collect();
            let state = SortState::new(centroids);
            state.sort_into(sort_origin, &mut translucent.indices);
            Some(state)
        };

        Ok(SectionMesh {
            occlusion: compute_occlusion(&opaque),
            sort_state,
        })
    }
}

/// Whether the face of `block` that touches `neighbour` is visible.
pub fn should_draw(block: BlockType, neighbour: BlockType) -> bool {
    if neighbour == BlockType::AIR {
        return true;
    }
    if neighbour.is_opaque() {
        return false;
    }
    block != neighbour
}

/// Corners of one block face in lower-left, lower-right, upper-left,
/// upper-right order, wound so the face points along `side`'s normal.
fn face_vertices(x: i32, y: i32, z: i32, block: BlockType, side: BlockSide) -> [SectionVertex; 4] {
    let (i, j, k) = (x as f32, y as f32, z as f32);
    let [ll, lr, ul, ur] = match side {
        BlockSide::FRONT => [
            Point3::new(i, j, k),
            Point3::new(i, j, k + 1.0),
            Point3::new(i, j + 1.0, k),
            Point3::new(i, j + 1.0, k + 1.0),
        ],
        BlockSide::BACK => [
            Point3::new(i + 1.0, j, k + 1.0),
            Point3::new(i + 1.0, j, k),
            Point3::new(i + 1.0, j + 1.0, k + 1.0),
            Point3::new(i + 1.0, j + 1.0, k),
        ],
        BlockSide::BOTTOM => [
            Point3::new(i, j, k + 1.0),
            Point3::new(i, j, k),
            Point3::new(i + 1.0, j, k + 1.0),
            Point3::new(i + 1.0, j, k),
        ],
        BlockSide::TOP => [
            Point3::new(i, j + 1.0, k),
            Point3::new(i, j + 1.0, k + 1.0),
            Point3::new(i + 1.0, j + 1.0, k),
            Point3::new(i + 1.0, j + 1.0, k + 1.0),
        ],
        BlockSide::LEFT => [
            Point3::new(i + 1.0, j, k),
            Point3::new(i, j, k),
            Point3::new(i + 1.0, j + 1.0, k),
            Point3::new(i, j + 1.0, k),
        ],
        BlockSide::RIGHT => [
            Point3::new(i, j, k + 1.0),
            Point3::new(i + 1.0, j, k + 1.0),
            Point3::new(i, j + 1.0, k + 1.0),
            Point3::new(i + 1.0, j + 1.0, k + 1.0),
        ],
    };

    let texture = block.texture_index();
    [
        SectionVertex::new(ll, texture, 0.0, 1.0),
        SectionVertex::new(lr, texture, 1.0, 1.0),
        SectionVertex::new(ul, texture, 0.0, 0.0),
        SectionVertex::new(ur, texture, 1.0, 0.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meshing::occlusion::OcclusionTable;
    use crate::section::SectionKey;

    fn build(region: &SectionRegion) -> (SectionMesh, SectionBuffers) {
        let mut buffers = SectionBuffers::new(0, 64, 96);
        let mesh = FaceCullingBuilder::new()
            .build(region, Point3::new(8.0, 8.0, 8.0), &mut buffers)
            .unwrap();
        (mesh, buffers)
    }

    #[test]
    fn lone_block_has_six_faces() {
        let mut region = SectionRegion::empty(SectionKey::new(0, 0, 0));
        region.set_block(4, 4, 4, BlockType::DIRT);

        let (mesh, buffers) = build(&region);

        assert_eq!(buffers.layer(RenderLayer::Solid).quad_count(), 6);
        assert!(buffers.layer(RenderLayer::Cutout).is_empty());
        assert!(mesh.sort_state.is_none());
        assert_eq!(mesh.occlusion, OcclusionTable::all_visible());
    }

    #[test]
    fn shared_faces_between_solid_blocks_are_culled() {
        let mut region = SectionRegion::empty(SectionKey::new(0, 0, 0));
        region.set_block(4, 4, 4, BlockType::DIRT);
        region.set_block(5, 4, 4, BlockType::WOOD);

        let (_, buffers) = build(&region);

        assert_eq!(buffers.layer(RenderLayer::Solid).quad_count(), 10);
    }

    #[test]
    fn neighbouring_section_border_culls_faces() {
        let mut region = SectionRegion::empty(SectionKey::new(0, 0, 0));
        region.set_block(0, 0, 0, BlockType::DIRT);
        region.set_block(-1, 0, 0, BlockType::DIRT);

        let (_, buffers) = build(&region);

        assert_eq!(buffers.layer(RenderLayer::Solid).quad_count(), 5);
    }

    #[test]
    fn water_is_translucent_and_sorted() {
        let mut region = SectionRegion::empty(SectionKey::new(0, 0, 0));
        region.set_block(2, 2, 2, BlockType::WATER);
        region.set_block(3, 2, 2, BlockType::WATER);
        region.set_block(2, 3, 2, BlockType::GLASS);

        let (mesh, buffers) = build(&region);
        let translucent = buffers.layer(RenderLayer::Translucent);

        // the shared water face is culled, the face under the glass is not
        assert_eq!(translucent.quad_count(), 10);
        assert_eq!(translucent.indices.len(), 10 * 6);
        assert_eq!(mesh.sort_state.map(|state| state.quad_count()), Some(10));
        assert_eq!(buffers.layer(RenderLayer::Cutout).quad_count(), 6);
    }

    #[test]
    fn face_visibility_rules() {
        assert!(should_draw(BlockType::DIRT, BlockType::AIR));
        assert!(!should_draw(BlockType::WATER, BlockType::DIRT));
        assert!(!should_draw(BlockType::WATER, BlockType::WATER));
        assert!(should_draw(BlockType::WATER, BlockType::GLASS));
        assert!(should_draw(BlockType::DIRT, BlockType::GLASS));
    }
}
