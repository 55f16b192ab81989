//! # Render Data
//!
//! The GPU-side result of building a section: one vertex buffer (and possibly
//! an index buffer) per render layer, the section's occlusion table and, when the
//! section has translucent geometry, the metadata needed to re-sort it.
//!
//! A `RenderData` is created by a successful rebuild and published into its
//! section's swap cell. Later uploads may replace individual layer buffers or the
//! translucent index buffer in place; the `RenderData` identity stays the same.
//! `close` releases every buffer it owns, and a second `close` is a no-op, so a
//! `RenderData` can never release a buffer twice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::trace;

use super::{RelativeSortPos, SectionKey};
use crate::buffer_state::gpu::{buffer_label, BufferUsage, GpuBufferHandle, GpuDevice};
use crate::core::MtResource;
use crate::error::GpuError;
use crate::meshing::occlusion::OcclusionTable;
use crate::meshing::sort_state::SortState;
use crate::voxels::block_side::BlockSide;

/// The passes section geometry is split into.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RenderLayer {
    Solid = 0,
    Cutout = 1,
    Translucent = 2,
}

impl RenderLayer {
    pub const COUNT: usize = 3;

    pub fn all() -> [RenderLayer; Self::COUNT] {
        [RenderLayer::Solid, RenderLayer::Cutout, RenderLayer::Translucent]
    }

    pub fn name(self) -> &'static str {
        match self {
            RenderLayer::Solid => "solid",
            RenderLayer::Cutout => "cutout",
            RenderLayer::Translucent => "translucent",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Buffers drawn for one layer of one section.
#[derive(Debug)]
pub struct LayerBuffers {
    pub vertex: GpuBufferHandle,
    /// Present only for layers with a per-section index order (translucent).
    /// Other layers draw with the renderer's shared quad index buffer.
    pub index: Option<GpuBufferHandle>,
    pub index_count: u32,
}

impl LayerBuffers {
    fn close(self, device: &dyn GpuDevice) {
        device.close_buffer(self.vertex);
        if let Some(index) = self.index {
            device.close_buffer(index);
        }
    }
}

pub struct RenderData {
    layers: MtResource<[Option<LayerBuffers>; RenderLayer::COUNT]>,
    occlusion: OcclusionTable,
    sort_state: Option<SortState>,
    sort_position: MtResource<RelativeSortPos>,
    disposed: AtomicBool,
}

impl RenderData {
    pub fn new(
        sort_position: RelativeSortPos,
        occlusion: OcclusionTable,
        sort_state: Option<SortState>,
    ) -> Self {
        Self {
            layers: MtResource::new([None, None, None]),
            occlusion,
            sort_state,
            sort_position: MtResource::new(sort_position),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn has_data(&self) -> bool {
        self.layers.get().iter().any(Option::is_some)
    }

    pub fn has_layer(&self, layer: RenderLayer) -> bool {
        self.layers.get()[layer.index()].is_some()
    }

    pub fn has_translucent_layer(&self) -> bool {
        self.has_layer(RenderLayer::Translucent)
    }

    /// Number of indices to draw for `layer`, if it was uploaded.
    pub fn index_count(&self, layer: RenderLayer) -> Option<u32> {
        self.layers.get()[layer.index()]
            .as_ref()
            .map(|buffers| buffers.index_count)
    }

    /// Runs `f` against the buffers of `layer`, if present.
    pub fn with_layer<R>(&self, layer: RenderLayer, f: impl FnOnce(&LayerBuffers) -> R) -> Option<R> {
        self.layers.get()[layer.index()].as_ref().map(f)
    }

    pub fn is_visible_through(&self, from: BlockSide, to: BlockSide) -> bool {
        self.occlusion.is_visible_through(from, to)
    }

    pub fn occlusion(&self) -> &OcclusionTable {
        &self.occlusion
    }

    pub fn sort_state(&self) -> Option<&SortState> {
        self.sort_state.as_ref()
    }

    pub fn sort_position(&self) -> RelativeSortPos {
        self.sort_position.snapshot()
    }

    /// True when `position` differs from the one the translucent layer was
    /// last sorted for.
    pub fn sort_position_changed(&self, position: RelativeSortPos) -> bool {
        *self.sort_position.get() != position
    }

    pub fn set_sort_position(&self, position: RelativeSortPos) {
        *self.sort_position.get_mut() = position;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Uploads one layer's geometry, reusing its existing buffers where they are
    /// large enough and replacing them otherwise.
    ///
    /// `indices` is the layer's own index order; `None` drops any per-section
    /// index buffer the layer had.
    pub fn upload_layer(
        &self,
        device: &dyn GpuDevice,
        section: SectionKey,
        layer: RenderLayer,
        vertices: &[u8],
        indices: Option<&[u8]>,
        index_count: u32,
    ) -> Result<(), GpuError> {
        let mut layers = self.layers.get_mut();
        let slot = &mut layers[layer.index()];

        match slot {
            None => {
                *slot = Some(Self::create_layer(
                    device,
                    section,
                    layer,
                    vertices,
                    indices,
                    index_count,
                )?);
            }
            Some(buffers) => {
                if buffers.vertex.size() < vertices.len() as u64 {
                    let replacement = device.create_buffer(
                        &buffer_label("vertex", layer.name(), section),
                        BufferUsage::Vertex,
                        vertices,
                    )?;
                    device.close_buffer(std::mem::replace(&mut buffers.vertex, replacement));
                } else {
                    device.write_buffer(&buffers.vertex, vertices)?;
                }

                match indices {
                    Some(indices) => Self::store_indices(device, section, layer, buffers, indices)?,
                    None => {
                        if let Some(index) = buffers.index.take() {
                            device.close_buffer(index);
                        }
                    }
                }

                buffers.index_count = index_count;
            }
        }

        Ok(())
    }

    fn create_layer(
        device: &dyn GpuDevice,
        section: SectionKey,
        layer: RenderLayer,
        vertices: &[u8],
        indices: Option<&[u8]>,
        index_count: u32,
    ) -> Result<LayerBuffers, GpuError> {
        let vertex = device.create_buffer(
            &buffer_label("vertex", layer.name(), section),
            BufferUsage::Vertex,
            vertices,
        )?;

        let index = match indices {
            Some(indices) => match device.create_buffer(
                &buffer_label("index", layer.name(), section),
                BufferUsage::Index,
                indices,
            ) {
                Ok(index) => Some(index),
                Err(e) => {
                    device.close_buffer(vertex);
                    return Err(e);
                }
            },
            None => None,
        };

        Ok(LayerBuffers {
            vertex,
            index,
            index_count,
        })
    }

    /// Uploads a new index order for a layer that is already present, leaving
    /// its vertex buffer untouched. Does nothing if the layer was never uploaded.
    pub fn upload_index_buffer(
        &self,
        device: &dyn GpuDevice,
        section: SectionKey,
        layer: RenderLayer,
        indices: &[u8],
    ) -> Result<(), GpuError> {
        let mut layers = self.layers.get_mut();
        match layers[layer.index()].as_mut() {
            Some(buffers) => Self::store_indices(device, section, layer, buffers, indices),
            None => Ok(()),
        }
    }

    fn store_indices(
        device: &dyn GpuDevice,
        section: SectionKey,
        layer: RenderLayer,
        buffers: &mut LayerBuffers,
        indices: &[u8],
    ) -> Result<(), GpuError> {
        match buffers.index.as_ref() {
            Some(index) if index.size() >= indices.len() as u64 => {
                device.write_buffer(index, indices)
            }
            _ => {
                let replacement = device.create_buffer(
                    &buffer_label("index", layer.name(), section),
                    BufferUsage::Index,
                    indices,
                )?;
                if let Some(previous) = buffers.index.replace(replacement) {
                    device.close_buffer(previous);
                }
                Ok(())
            }
        }
    }

    /// Releases every buffer this render data owns.
    pub fn close(&self, device: &dyn GpuDevice) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut layers = self.layers.get_mut();
        for slot in layers.iter_mut() {
            if let Some(buffers) = slot.take() {
                buffers.close(device);
            }
        }
        trace!("Closed render data");
    }
}

impl std::fmt::Debug for RenderData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderData")
            .field("layers", &*self.layers.get())
            .field("sort_position", &self.sort_position())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// What a section currently renders.
#[derive(Debug, Clone)]
pub enum SectionRenderState {
    /// Nothing to draw and nothing visible through the section.
    Hidden,
    /// Nothing to draw, but fully see-through (e.g. known empty).
    Ready,
    Built(Arc<RenderData>),
}

impl SectionRenderState {
    pub fn render_data(&self) -> Option<&Arc<RenderData>> {
        match self {
            SectionRenderState::Built(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self, SectionRenderState::Hidden)
    }

    pub fn is_visible_through(&self, from: BlockSide, to: BlockSide) -> bool {
        match self {
            SectionRenderState::Hidden => false,
            SectionRenderState::Ready => true,
            SectionRenderState::Built(data) => data.is_visible_through(from, to),
        }
    }

    pub fn has_translucent_layer(&self) -> bool {
        self.render_data()
            .is_some_and(|data| data.has_translucent_layer())
    }
}
