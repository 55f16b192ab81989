//! # Meshing Module
//!
//! The geometry-build step a rebuild task runs on a worker thread. The pipeline
//! treats it as opaque: a [`GeometryBuilder`] reads a captured
//! [`SectionRegion`], writes vertices (and, for the translucent layer, a sorted
//! index order) into the task's scratch buffers, and reports the section's
//! occlusion table and translucent sort metadata.
//!
//! [`FaceCullingBuilder`] is the builder the demo and tests use.

use cgmath::Point3;

use crate::buffer_state::SectionBuffers;
use crate::error::BuildError;
use crate::voxels::region::SectionRegion;

pub mod face_culling;
pub mod occlusion;
pub mod sort_state;
pub mod vertex;

pub use face_culling::FaceCullingBuilder;
pub use occlusion::OcclusionTable;
pub use sort_state::SortState;
pub use vertex::SectionVertex;

/// Everything a build reports besides the geometry itself.
#[derive(Debug, Clone)]
pub struct SectionMesh {
    pub occlusion: OcclusionTable,
    /// Present when the translucent layer has any quads.
    pub sort_state: Option<SortState>,
}

/// Turns a region snapshot into section geometry.
///
/// Called concurrently from worker threads. `sort_origin` is the camera
/// position relative to the section's minimum corner, for the initial
/// translucent index order. Geometry goes into `buffers`, which arrive empty.
pub trait GeometryBuilder: Send + Sync {
    fn build(
        &self,
        region: &SectionRegion,
        sort_origin: Point3<f32>,
        buffers: &mut SectionBuffers,
    ) -> Result<SectionMesh, BuildError>;
}
